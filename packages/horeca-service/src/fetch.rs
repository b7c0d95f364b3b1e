//! Fetch lanes.
//!
//! A lane walks one (endpoint, location) pair through the requested range one day at a time.
//! Lanes run concurrently up to the configured bound; inside a lane calls are strictly sequential
//! with a fixed delay between them, so a (endpoint, date, location) unit is never fetched twice at
//! once.

use std::{sync::Arc, time::Duration};

use time::Date;
use tokio::sync::{Semaphore, mpsc};
use uuid::Uuid;

use crate::{
	BorkSource, EitjeSource,
	retry::{self, RetryPolicy},
};
use horeca_domain::{Endpoint, calendar::DateRange};
use horeca_providers::{Page, bork::BorkTicket, eitje::EitjeRecord};

const CHANNEL_CAPACITY: usize = 16;

/// Walks a date range one unit (day) at a time.
#[derive(Debug, Clone)]
pub(crate) struct DayPager {
	next: Option<Date>,
	end: Date,
}
impl DayPager {
	pub(crate) fn new(range: DateRange) -> Self {
		Self { next: Some(range.start), end: range.end }
	}

	pub(crate) fn next_unit(&mut self) -> Option<Date> {
		let current = self.next.filter(|day| *day <= self.end)?;

		self.next = current.next_day();

		Some(current)
	}
}

#[derive(Clone)]
pub(crate) enum LaneSource {
	Eitje { cfg: horeca_config::Eitje, source: Arc<dyn EitjeSource> },
	Bork { cfg: horeca_config::Bork, location: horeca_config::BorkLocation, source: Arc<dyn BorkSource> },
}

#[derive(Clone)]
pub(crate) struct Lane {
	pub(crate) endpoint: Endpoint,
	/// Canonical location for vendors that are addressed per venue.
	pub(crate) location: Option<LaneLocation>,
	pub(crate) source: LaneSource,
}

#[derive(Debug, Clone)]
pub(crate) struct LaneLocation {
	pub(crate) location_id: Uuid,
	pub(crate) name: String,
}

#[derive(Debug)]
pub(crate) enum UnitBatch {
	Eitje(Page<EitjeRecord>),
	Bork(Page<BorkTicket>),
}

#[derive(Debug)]
pub(crate) struct UnitOutcome {
	pub(crate) endpoint: Endpoint,
	pub(crate) location: Option<LaneLocation>,
	pub(crate) date: Date,
	pub(crate) attempts: u32,
	pub(crate) result: horeca_providers::Result<UnitBatch>,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct FetchPlan {
	pub(crate) range: DateRange,
	pub(crate) policy: RetryPolicy,
	pub(crate) request_delay: Duration,
	pub(crate) max_lanes: usize,
}

/// Starts every lane and returns the stream of per-unit outcomes. The stream ends once all lanes
/// have walked the whole range.
pub(crate) fn spawn_lanes(lanes: Vec<Lane>, plan: FetchPlan) -> mpsc::Receiver<UnitOutcome> {
	let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
	let permits = Arc::new(Semaphore::new(plan.max_lanes.max(1)));

	for lane in lanes {
		let tx = tx.clone();
		let permits = permits.clone();

		tokio::spawn(async move {
			let Ok(_permit) = permits.acquire_owned().await else {
				return;
			};

			run_lane(lane, plan, tx).await;
		});
	}

	rx
}

async fn run_lane(lane: Lane, plan: FetchPlan, tx: mpsc::Sender<UnitOutcome>) {
	let mut pager = DayPager::new(plan.range);
	let mut first = true;

	while let Some(date) = pager.next_unit() {
		if !first && !plan.request_delay.is_zero() {
			tokio::time::sleep(plan.request_delay).await;
		}

		first = false;

		let attempted = retry::retry_with_backoff(
			plan.policy,
			horeca_providers::Error::is_transient,
			|_| fetch_unit(&lane.source, lane.endpoint, date),
		)
		.await;

		if let Err(err) = &attempted.result {
			tracing::warn!(
				endpoint = %lane.endpoint,
				date = %date,
				location = lane.location.as_ref().map(|location| location.name.as_str()),
				attempts = attempted.attempts,
				error = %err,
				"Fetch unit failed."
			);
		}

		let outcome = UnitOutcome {
			endpoint: lane.endpoint,
			location: lane.location.clone(),
			date,
			attempts: attempted.attempts,
			result: attempted.result,
		};

		if tx.send(outcome).await.is_err() {
			break;
		}
	}
}

async fn fetch_unit(
	source: &LaneSource,
	endpoint: Endpoint,
	date: Date,
) -> horeca_providers::Result<UnitBatch> {
	match source {
		LaneSource::Eitje { cfg, source } =>
			source.fetch_day(cfg, endpoint, date).await.map(UnitBatch::Eitje),
		LaneSource::Bork { cfg, location, source } =>
			source.fetch_ticket_day(cfg, location, date).await.map(UnitBatch::Bork),
	}
}

#[cfg(test)]
mod tests {
	use std::sync::Mutex;

	use time::macros::date;

	use super::*;
	use crate::BoxFuture;
	use horeca_providers::eitje::EitjeEnvironment;

	struct FlakyEitje {
		failing_day: Date,
		calls: Mutex<Vec<Date>>,
	}
	impl EitjeSource for FlakyEitje {
		fn fetch_environments<'a>(
			&'a self,
			_cfg: &'a horeca_config::Eitje,
		) -> BoxFuture<'a, horeca_providers::Result<Vec<EitjeEnvironment>>> {
			Box::pin(async { Ok(Vec::new()) })
		}

		fn fetch_day<'a>(
			&'a self,
			_cfg: &'a horeca_config::Eitje,
			_endpoint: Endpoint,
			day: Date,
		) -> BoxFuture<'a, horeca_providers::Result<Page<EitjeRecord>>> {
			if let Ok(mut calls) = self.calls.lock() {
				calls.push(day);
			}

			let failing = day == self.failing_day;

			Box::pin(async move {
				if failing {
					Err(horeca_providers::Error::Timeout { url: "stub".to_string() })
				} else {
					Ok(Page::empty())
				}
			})
		}
	}

	fn eitje_cfg() -> horeca_config::Eitje {
		horeca_config::Eitje {
			base_url: "http://stub".to_string(),
			partner_username: "p".to_string(),
			partner_password: "p".to_string(),
			api_username: "a".to_string(),
			api_password: "a".to_string(),
			timeout_ms: 1_000,
		}
	}

	#[test]
	fn pager_yields_each_day_once() {
		let mut pager = DayPager::new(DateRange { start: date!(2024 - 02 - 28), end: date!(2024 - 03 - 01) });
		let mut days = Vec::new();

		while let Some(day) = pager.next_unit() {
			days.push(day);
		}

		assert_eq!(days, vec![date!(2024 - 02 - 28), date!(2024 - 02 - 29), date!(2024 - 03 - 01)]);
		assert_eq!(pager.next_unit(), None);
	}

	#[tokio::test]
	async fn one_failing_day_does_not_stop_the_lane() {
		let source = Arc::new(FlakyEitje { failing_day: date!(2024 - 01 - 03), calls: Mutex::new(Vec::new()) });
		let lane = Lane {
			endpoint: Endpoint::TimeRegistrationShifts,
			location: None,
			source: LaneSource::Eitje { cfg: eitje_cfg(), source: source.clone() },
		};
		let plan = FetchPlan {
			range: DateRange { start: date!(2024 - 01 - 01), end: date!(2024 - 01 - 05) },
			policy: RetryPolicy { max_attempts: 3, base_delay: Duration::ZERO, max_delay: Duration::ZERO },
			request_delay: Duration::ZERO,
			max_lanes: 2,
		};
		let mut rx = spawn_lanes(vec![lane], plan);
		let mut ok = Vec::new();
		let mut failed = Vec::new();

		while let Some(outcome) = rx.recv().await {
			match outcome.result {
				Ok(_) => ok.push(outcome.date),
				Err(err) => failed.push((outcome.date, outcome.attempts, err.is_transient())),
			}
		}

		assert_eq!(ok.len(), 4);
		assert_eq!(failed, vec![(date!(2024 - 01 - 03), 3, true)]);

		let calls = source.calls.lock().expect("Call log poisoned.").len();

		assert_eq!(calls, 7);
	}
}
