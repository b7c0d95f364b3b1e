mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Bork, BorkLocation, Config, Eitje, Location, Pnl, Postgres, Progress, Schedule, Service,
	Storage, Sync,
};

use std::{collections::HashSet, fs, path::Path};

const ENDPOINT_NAMES: [&str; 4] =
	["time_registration_shifts", "planning_shifts", "revenue_days", "bork_ticket_day"];
const MIN_HTTP_TIMEOUT_MS: u64 = 1_000;
const MAX_HTTP_TIMEOUT_MS: u64 = 60_000;

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.http_bind.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.http_bind must be non-empty.".to_string(),
		});
	}
	if !(-14 * 60..=14 * 60).contains(&cfg.service.utc_offset_minutes) {
		return Err(Error::Validation {
			message: "service.utc_offset_minutes must be within -840..=840.".to_string(),
		});
	}
	if cfg.storage.postgres.dsn.trim().is_empty() {
		return Err(Error::Validation {
			message: "storage.postgres.dsn must be non-empty.".to_string(),
		});
	}
	if cfg.storage.postgres.pool_max_conns == 0 {
		return Err(Error::Validation {
			message: "storage.postgres.pool_max_conns must be greater than zero.".to_string(),
		});
	}

	if let Some(eitje) = cfg.eitje.as_ref() {
		if eitje.base_url.trim().is_empty() {
			return Err(Error::Validation {
				message: "eitje.base_url must be non-empty.".to_string(),
			});
		}

		for (label, value) in [
			("eitje.partner_username", &eitje.partner_username),
			("eitje.partner_password", &eitje.partner_password),
			("eitje.api_username", &eitje.api_username),
			("eitje.api_password", &eitje.api_password),
		] {
			if value.trim().is_empty() {
				return Err(Error::Validation { message: format!("{label} must be non-empty.") });
			}
		}

		validate_timeout("eitje.timeout_ms", eitje.timeout_ms)?;
	}

	validate_timeout("bork.timeout_ms", cfg.bork.timeout_ms)?;

	let mut names = HashSet::new();

	for location in &cfg.locations {
		let name = location.name.trim();

		if name.is_empty() {
			return Err(Error::Validation {
				message: "locations.name must be non-empty.".to_string(),
			});
		}
		if !names.insert(name.to_lowercase()) {
			return Err(Error::Validation {
				message: format!("locations.name {name:?} is configured more than once."),
			});
		}
		if let Some(bork) = location.bork.as_ref() {
			if bork.base_url.trim().is_empty() {
				return Err(Error::Validation {
					message: format!("locations.bork.base_url for {name:?} must be non-empty."),
				});
			}
			if bork.app_id.trim().is_empty() {
				return Err(Error::Validation {
					message: format!("locations.bork.app_id for {name:?} must be non-empty."),
				});
			}
		}
	}

	if cfg.sync.max_attempts == 0 {
		return Err(Error::Validation {
			message: "sync.max_attempts must be greater than zero.".to_string(),
		});
	}
	if cfg.sync.max_backoff_ms < cfg.sync.base_backoff_ms {
		return Err(Error::Validation {
			message: "sync.max_backoff_ms must be at least sync.base_backoff_ms.".to_string(),
		});
	}
	if cfg.sync.max_range_days == 0 {
		return Err(Error::Validation {
			message: "sync.max_range_days must be greater than zero.".to_string(),
		});
	}
	if cfg.sync.max_concurrent_lanes == 0 {
		return Err(Error::Validation {
			message: "sync.max_concurrent_lanes must be greater than zero.".to_string(),
		});
	}
	if !cfg.pnl.margin_percent.is_finite()
		|| cfg.pnl.margin_percent <= 0.0
		|| cfg.pnl.margin_percent > 100.0
	{
		return Err(Error::Validation {
			message: "pnl.margin_percent must be in the range (0, 100].".to_string(),
		});
	}
	if cfg.schedule.enabled {
		if cfg.schedule.interval_minutes == 0 {
			return Err(Error::Validation {
				message: "schedule.interval_minutes must be greater than zero.".to_string(),
			});
		}
		if cfg.schedule.endpoints.is_empty() {
			return Err(Error::Validation {
				message: "schedule.endpoints must be non-empty when enabled.".to_string(),
			});
		}
	}

	for endpoint in &cfg.schedule.endpoints {
		if !ENDPOINT_NAMES.contains(&endpoint.as_str()) {
			return Err(Error::Validation {
				message: format!(
					"schedule.endpoints contains unknown endpoint {endpoint:?}; expected one of {}.",
					ENDPOINT_NAMES.join(", ")
				),
			});
		}
	}

	Ok(())
}

fn validate_timeout(label: &str, timeout_ms: u64) -> Result<()> {
	if !(MIN_HTTP_TIMEOUT_MS..=MAX_HTTP_TIMEOUT_MS).contains(&timeout_ms) {
		return Err(Error::Validation {
			message: format!(
				"{label} must be between {MIN_HTTP_TIMEOUT_MS} and {MAX_HTTP_TIMEOUT_MS}."
			),
		});
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	// A fully blank [eitje] block is treated as "not configured".
	if cfg.eitje.as_ref().map(|eitje| eitje.base_url.trim().is_empty()).unwrap_or(false) {
		cfg.eitje = None;
	}
	if let Some(eitje) = cfg.eitje.as_mut() {
		eitje.base_url = eitje.base_url.trim().trim_end_matches('/').to_string();
	}

	for location in &mut cfg.locations {
		location.name = location.name.trim().to_string();

		if let Some(bork) = location.bork.as_mut() {
			bork.base_url = bork.base_url.trim().trim_end_matches('/').to_string();
			bork.app_id = bork.app_id.trim().to_string();
		}
	}

	for endpoint in &mut cfg.schedule.endpoints {
		*endpoint = endpoint.trim().to_ascii_lowercase();
	}
}
