//! Scheduled sync trigger.
//!
//! Every configured endpoint is synced over a trailing window of days through the regular sync
//! entry point. A failed run is retried sooner than the regular interval, with doubling backoff.

use std::{collections::HashMap, time::Duration as StdDuration};

use time::{Duration, OffsetDateTime};
use tokio::time as tokio_time;

use crate::{Error, Result};
use horeca_domain::{Endpoint, calendar::DateRange};
use horeca_service::{HorecaService, SyncRequest};
use horeca_storage::schedule::{self, ScheduleRun};

const BASE_BACKOFF_MS: i64 = 30_000;
const MAX_BACKOFF_MS: i64 = 30 * 60_000;
const MAX_STORED_ERROR_CHARS: usize = 1_024;

pub struct WorkerState {
	pub service: HorecaService,
	pub endpoints: Vec<Endpoint>,
}
impl WorkerState {
	pub fn new(service: HorecaService) -> Result<Self> {
		let endpoints = parse_endpoints(&service.cfg.schedule.endpoints)?;

		Ok(Self { service, endpoints })
	}
}

pub async fn run_scheduler(state: WorkerState) -> Result<()> {
	let schedule = &state.service.cfg.schedule;

	if !schedule.enabled {
		tracing::warn!("Scheduled sync is disabled; set schedule.enabled to run it.");

		return Ok(());
	}

	let interval = Duration::minutes(schedule.interval_minutes.max(1) as i64);
	let mut failures: HashMap<Endpoint, u32> = HashMap::new();
	let mut due: HashMap<Endpoint, OffsetDateTime> = HashMap::new();

	tracing::info!(
		endpoints = state.endpoints.len(),
		interval_minutes = schedule.interval_minutes,
		lookback_days = schedule.lookback_days,
		"Scheduler started."
	);

	loop {
		let now = OffsetDateTime::now_utc();

		for endpoint in &state.endpoints {
			if due.get(endpoint).is_some_and(|at| *at > now) {
				continue;
			}

			let failed = failures.entry(*endpoint).or_default();
			let next_run_at = match run_endpoint_once(&state, *endpoint, now, interval, *failed).await {
				Ok(next_run_at) => {
					*failed = 0;

					next_run_at
				},
				Err(next_run_at) => {
					*failed += 1;

					next_run_at
				},
			};

			due.insert(*endpoint, next_run_at);
		}

		let now = OffsetDateTime::now_utc();
		let wake_at = due.values().min().copied().unwrap_or(now + interval);

		tokio_time::sleep(to_std_duration(wake_at - now)).await;
	}
}

/// Runs one sync and records it. Both arms carry the time the endpoint is due again.
async fn run_endpoint_once(
	state: &WorkerState,
	endpoint: Endpoint,
	now: OffsetDateTime,
	interval: Duration,
	previous_failures: u32,
) -> std::result::Result<OffsetDateTime, OffsetDateTime> {
	let window = sync_window(state.service.today(), state.service.cfg.schedule.lookback_days);
	let request = SyncRequest { start_date: window.start, end_date: window.end };
	let outcome = state.service.sync(endpoint, request).await;
	let (status, error, ok) = match &outcome {
		Ok(report) if report.success => ("done", None, true),
		Ok(report) => {
			let summary = report
				.error
				.as_deref()
				.or_else(|| report.errors.first().map(|err| err.message.as_str()))
				.unwrap_or("");

			("failed", Some(sanitize_error(summary)), false)
		},
		Err(err) => ("failed", Some(sanitize_error(&err.to_string())), false),
	};
	let next_run_at =
		if ok { now + interval } else { now + backoff_for_attempt(previous_failures + 1).min(interval) };

	match &outcome {
		Ok(report) => tracing::info!(
			endpoint = %endpoint,
			start = %window.start,
			end = %window.end,
			records_added = report.records_added,
			records_updated = report.records_updated,
			errors = report.errors.len(),
			%next_run_at,
			"Scheduled sync finished."
		),
		Err(err) => tracing::error!(endpoint = %endpoint, error = %err, %next_run_at, "Scheduled sync failed."),
	}

	let run = ScheduleRun {
		endpoint: endpoint.as_str(),
		last_run_at: now,
		next_run_at,
		status,
		error: error.as_deref(),
	};

	if let Err(err) = schedule::record_run(&state.service.db.pool, &run).await {
		tracing::error!(endpoint = %endpoint, error = %err, "Failed to record schedule state.");
	}

	if ok { Ok(next_run_at) } else { Err(next_run_at) }
}

fn parse_endpoints(names: &[String]) -> Result<Vec<Endpoint>> {
	let mut endpoints = Vec::with_capacity(names.len());

	for name in names {
		let endpoint: Endpoint = name.parse().map_err(|err: horeca_domain::UnknownEndpoint| {
			Error::Validation(format!("schedule.endpoints: {err}"))
		})?;

		if !endpoints.contains(&endpoint) {
			endpoints.push(endpoint);
		}
	}

	if endpoints.is_empty() {
		return Err(Error::Validation("schedule.endpoints must not be empty.".to_string()));
	}

	Ok(endpoints)
}

/// Trailing window ending today, `lookback_days` days back.
fn sync_window(today: time::Date, lookback_days: u32) -> DateRange {
	let start = today - Duration::days(i64::from(lookback_days));

	DateRange { start, end: today }
}

fn backoff_for_attempt(attempt: u32) -> Duration {
	let exp = attempt.max(1).saturating_sub(1).min(6);
	let base = BASE_BACKOFF_MS.saturating_mul(1 << exp);

	Duration::milliseconds(base.min(MAX_BACKOFF_MS))
}

fn to_std_duration(duration: Duration) -> StdDuration {
	let millis = duration.whole_milliseconds();

	if millis <= 0 {
		return StdDuration::from_millis(0);
	}

	StdDuration::from_millis(millis as u64)
}

/// Redacts credential-looking words and caps the length before the text is persisted.
fn sanitize_error(text: &str) -> String {
	let mut parts = Vec::new();

	for raw in text.split_whitespace() {
		let lowered = raw.to_ascii_lowercase();
		let mut word = raw.to_string();

		for key in ["appid", "app_id", "password", "secret", "token"] {
			if lowered.contains(key) && (lowered.contains('=') || lowered.contains(':')) {
				let sep = if raw.contains('=') { '=' } else { ':' };
				let prefix = raw.split(sep).next().unwrap_or(raw);

				word = format!("{prefix}{sep}[REDACTED]");

				break;
			}
		}

		parts.push(word);
	}

	let mut out = parts.join(" ");

	if out.chars().count() > MAX_STORED_ERROR_CHARS {
		out = out.chars().take(MAX_STORED_ERROR_CHARS).collect();
		out.push_str("...");
	}

	out
}

#[cfg(test)]
mod tests {
	use time::macros::date;

	use super::*;

	#[test]
	fn backoff_doubles_and_caps() {
		assert_eq!(backoff_for_attempt(1), Duration::seconds(30));
		assert_eq!(backoff_for_attempt(2), Duration::seconds(60));
		assert_eq!(backoff_for_attempt(4), Duration::seconds(240));
		assert_eq!(backoff_for_attempt(20), Duration::minutes(30));
	}

	#[test]
	fn window_covers_lookback_and_today() {
		let window = sync_window(date!(2024 - 03 - 01), 2);

		assert_eq!(window.start, date!(2024 - 02 - 28));
		assert_eq!(window.end, date!(2024 - 03 - 01));
		assert_eq!(window.days(), 3);
	}

	#[test]
	fn endpoints_are_parsed_once_each() {
		let names = vec![
			"revenue_days".to_string(),
			"bork-ticket-day".to_string(),
			"revenue_days".to_string(),
		];

		assert_eq!(
			parse_endpoints(&names).expect("Endpoints should parse."),
			vec![Endpoint::RevenueDays, Endpoint::BorkTicketDay]
		);
		assert!(parse_endpoints(&["inventory".to_string()]).is_err());
		assert!(parse_endpoints(&[]).is_err());
	}

	#[test]
	fn stored_errors_hide_credentials() {
		let message = "GET https://bork.invalid/ticket/day.json/20240101?appid=abc123 failed password=hunter2";
		let sanitized = sanitize_error(message);

		assert!(!sanitized.contains("hunter2"));
		assert!(!sanitized.contains("abc123"));
		assert!(sanitized.contains("password=[REDACTED]"));
		assert!(sanitize_error(&"x".repeat(2_000)).ends_with("..."));
	}

	#[test]
	fn negative_durations_sleep_zero() {
		assert_eq!(to_std_duration(Duration::seconds(-5)), StdDuration::ZERO);
		assert_eq!(to_std_duration(Duration::milliseconds(1_500)), StdDuration::from_millis(1_500));
	}
}
