use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub eitje: Option<Eitje>,
	#[serde(default)]
	pub bork: Bork,
	#[serde(default)]
	pub locations: Vec<Location>,
	#[serde(default)]
	pub sync: Sync,
	#[serde(default)]
	pub progress: Progress,
	#[serde(default)]
	pub pnl: Pnl,
	#[serde(default)]
	pub schedule: Schedule,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Service {
	pub http_bind: String,
	pub log_level: String,
	/// Offset of the venues' wall clock from UTC. Decides what "today" means for progress and
	/// scheduled windows.
	#[serde(default)]
	pub utc_offset_minutes: i16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Storage {
	pub postgres: Postgres,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Postgres {
	pub dsn: String,
	pub pool_max_conns: u32,
}

/// Eitje authenticates with four static header values instead of a token exchange.
#[derive(Debug, Clone, Deserialize)]
pub struct Eitje {
	pub base_url: String,
	pub partner_username: String,
	pub partner_password: String,
	pub api_username: String,
	pub api_password: String,
	#[serde(default = "default_timeout_ms")]
	pub timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Bork {
	#[serde(default = "default_timeout_ms")]
	pub timeout_ms: u64,
}
impl Default for Bork {
	fn default() -> Self {
		Self { timeout_ms: default_timeout_ms() }
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct Location {
	pub name: String,
	#[serde(default)]
	pub eitje_environment_ids: Vec<i64>,
	pub bork: Option<BorkLocation>,
}

/// Each Bork venue has its own base URL and `appid` key.
#[derive(Debug, Clone, Deserialize)]
pub struct BorkLocation {
	pub base_url: String,
	pub app_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Sync {
	pub max_attempts: u32,
	pub base_backoff_ms: u64,
	pub max_backoff_ms: u64,
	pub request_delay_ms: u64,
	pub max_range_days: u32,
	pub max_concurrent_lanes: u32,
}
impl Default for Sync {
	fn default() -> Self {
		Self {
			max_attempts: 3,
			base_backoff_ms: 500,
			max_backoff_ms: 8_000,
			request_delay_ms: 100,
			max_range_days: 93,
			max_concurrent_lanes: 2,
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Progress {
	pub cache_ttl_seconds: u64,
}
impl Default for Progress {
	fn default() -> Self {
		Self { cache_ttl_seconds: 30 }
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Pnl {
	pub margin_percent: f64,
}
impl Default for Pnl {
	fn default() -> Self {
		Self { margin_percent: 1.0 }
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Schedule {
	pub enabled: bool,
	pub interval_minutes: u64,
	pub lookback_days: u32,
	pub endpoints: Vec<String>,
}
impl Default for Schedule {
	fn default() -> Self {
		Self {
			enabled: false,
			interval_minutes: 60,
			lookback_days: 2,
			endpoints: vec![
				"time_registration_shifts".to_string(),
				"planning_shifts".to_string(),
				"revenue_days".to_string(),
				"bork_ticket_day".to_string(),
			],
		}
	}
}

fn default_timeout_ms() -> u64 {
	20_000
}
