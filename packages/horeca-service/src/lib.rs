pub mod aggregate;
pub mod backfill;
pub mod pnl;
pub mod process;
pub mod progress;
pub mod retry;
pub mod sync;
pub mod timestamp;

mod error;
mod fetch;

pub use error::{Error, Result};

use std::{future::Future, pin::Pin, sync::Arc};

use time::{Date, Duration, OffsetDateTime};

pub use aggregate::AggregateReport;
pub use backfill::BackfillReport;
use horeca_config::Config;
use horeca_domain::Endpoint;
use horeca_providers::{
	Page,
	bork::{self, BorkTicket},
	eitje::{self, EitjeEnvironment, EitjeRecord},
};
use horeca_storage::db::Db;
pub use pnl::{PnlAggregateRequest, PnlAggregateResponse, PnlMonthReport};
pub use process::{ProcessEndpointRequest, ProcessEndpointResponse, ProcessReport};
pub use progress::{ProgressAction, ProgressQuery, ProgressResponse};
pub use retry::RetryPolicy;
pub use sync::{JobStage, SyncError, SyncReport, SyncRequest};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait EitjeSource
where
	Self: Send + Sync,
{
	fn fetch_environments<'a>(
		&'a self,
		cfg: &'a horeca_config::Eitje,
	) -> BoxFuture<'a, horeca_providers::Result<Vec<EitjeEnvironment>>>;

	fn fetch_day<'a>(
		&'a self,
		cfg: &'a horeca_config::Eitje,
		endpoint: Endpoint,
		day: Date,
	) -> BoxFuture<'a, horeca_providers::Result<Page<EitjeRecord>>>;
}

pub trait BorkSource
where
	Self: Send + Sync,
{
	fn fetch_ticket_day<'a>(
		&'a self,
		cfg: &'a horeca_config::Bork,
		location: &'a horeca_config::BorkLocation,
		day: Date,
	) -> BoxFuture<'a, horeca_providers::Result<Page<BorkTicket>>>;
}

#[derive(Clone)]
pub struct Sources {
	pub eitje: Arc<dyn EitjeSource>,
	pub bork: Arc<dyn BorkSource>,
}
impl Sources {
	pub fn new(eitje: Arc<dyn EitjeSource>, bork: Arc<dyn BorkSource>) -> Self {
		Self { eitje, bork }
	}
}

impl Default for Sources {
	fn default() -> Self {
		let source = Arc::new(DefaultSources);

		Self { eitje: source.clone(), bork: source }
	}
}

struct DefaultSources;
impl EitjeSource for DefaultSources {
	fn fetch_environments<'a>(
		&'a self,
		cfg: &'a horeca_config::Eitje,
	) -> BoxFuture<'a, horeca_providers::Result<Vec<EitjeEnvironment>>> {
		Box::pin(eitje::fetch_environments(cfg))
	}

	fn fetch_day<'a>(
		&'a self,
		cfg: &'a horeca_config::Eitje,
		endpoint: Endpoint,
		day: Date,
	) -> BoxFuture<'a, horeca_providers::Result<Page<EitjeRecord>>> {
		Box::pin(eitje::fetch_day(cfg, endpoint, day))
	}
}

impl BorkSource for DefaultSources {
	fn fetch_ticket_day<'a>(
		&'a self,
		cfg: &'a horeca_config::Bork,
		location: &'a horeca_config::BorkLocation,
		day: Date,
	) -> BoxFuture<'a, horeca_providers::Result<Page<BorkTicket>>> {
		Box::pin(bork::fetch_ticket_day(cfg, location, day))
	}
}

pub struct HorecaService {
	pub cfg: Config,
	pub db: Db,
	pub sources: Sources,
	progress_cache: progress::ProgressCache,
}
impl HorecaService {
	pub fn new(cfg: Config, db: Db) -> Self {
		Self::with_sources(cfg, db, Sources::default())
	}

	pub fn with_sources(cfg: Config, db: Db, sources: Sources) -> Self {
		let progress_cache = progress::ProgressCache::new(cfg.progress.cache_ttl_seconds);

		Self { cfg, db, sources, progress_cache }
	}

	/// Calendar date on the venues' wall clock.
	pub fn today(&self) -> Date {
		venue_today(OffsetDateTime::now_utc(), self.cfg.service.utc_offset_minutes)
	}

	/// Probes the Eitje credentials without touching any date-scoped resource.
	pub async fn eitje_connection(&self) -> Result<ConnectionReport> {
		let cfg = self.eitje_cfg()?;
		let environments = self.sources.eitje.fetch_environments(cfg).await?;

		Ok(ConnectionReport { success: true, environment_count: environments.len(), environments })
	}

	pub(crate) fn eitje_cfg(&self) -> Result<&horeca_config::Eitje> {
		self.cfg.eitje.as_ref().ok_or_else(|| Error::Configuration {
			message: "Eitje credentials are not configured.".to_string(),
		})
	}
}

#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionReport {
	pub success: bool,
	pub environment_count: usize,
	pub environments: Vec<EitjeEnvironment>,
}

pub(crate) fn venue_today(now_utc: OffsetDateTime, utc_offset_minutes: i16) -> Date {
	(now_utc + Duration::minutes(i64::from(utc_offset_minutes))).date()
}

#[cfg(test)]
mod tests {
	use time::macros::{date, datetime};

	use super::*;

	#[test]
	fn venue_today_follows_the_configured_offset() {
		let late_evening = datetime!(2024-03-31 22:30 UTC);

		assert_eq!(venue_today(late_evening, 0), date!(2024 - 03 - 31));
		assert_eq!(venue_today(late_evening, 120), date!(2024 - 04 - 01));
		assert_eq!(venue_today(datetime!(2024-04-01 00:30 UTC), -60), date!(2024 - 03 - 31));
	}
}
