//! Sync orchestration: fetch, store raw, process, aggregate.

use std::{collections::HashMap, time::Duration};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::{Date, OffsetDateTime};

use crate::{
	Error, HorecaService, Result,
	fetch::{self, FetchPlan, Lane, LaneLocation, LaneSource, UnitBatch, UnitOutcome},
	retry::RetryPolicy,
};
use horeca_domain::{Endpoint, Vendor, calendar::DateRange, payload};
use horeca_providers::{
	Rejected,
	bork::BorkTicket,
	eitje::{EitjeEnvironment, EitjeRecord, EnvironmentRef},
};
use horeca_storage::{
	locations,
	models::LocationRow,
	raw::{self, NewRawRecord, UpsertOutcome},
	schedule,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStage {
	Pending,
	Fetching,
	Storing,
	Processing,
	Aggregating,
	Done,
	Failed,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRequest {
	#[serde(with = "horeca_domain::time_serde")]
	pub start_date: Date,
	#[serde(with = "horeca_domain::time_serde")]
	pub end_date: Date,
}

/// One unit or record that did not make it through a stage.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncError {
	pub stage: JobStage,
	pub kind: &'static str,
	#[serde(with = "horeca_domain::time_serde::option")]
	pub date: Option<Date>,
	pub location: Option<String>,
	pub attempts: u32,
	pub message: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
	pub success: bool,
	/// Set only when no unit could be fetched.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
	pub endpoint: Endpoint,
	pub stage: JobStage,
	pub range: DateRange,
	pub records_processed: u64,
	pub records_added: u64,
	pub records_updated: u64,
	pub records_unchanged: u64,
	pub aggregated: u64,
	pub errors: Vec<SyncError>,
	#[serde(with = "crate::timestamp")]
	pub sync_time: OffsetDateTime,
	#[serde(with = "horeca_domain::time_serde::option")]
	pub last_sync_date: Option<Date>,
	#[serde(with = "crate::timestamp::option")]
	pub next_sync_date: Option<OffsetDateTime>,
}

#[derive(Debug, Default)]
struct StoreTally {
	added: u64,
	updated: u64,
	unchanged: u64,
	units_ok: u64,
	units_failed: u64,
	last_date: Option<Date>,
}

/// How Eitje environments translate into the `location_ref` stored next to raw records.
#[derive(Debug, Default)]
struct EnvironmentNames {
	/// Environment ids pinned to a canonical location in configuration.
	pinned: HashMap<i64, String>,
	/// Names reported by the environment probe.
	vendor: HashMap<i64, String>,
}
impl EnvironmentNames {
	fn new(locations: &[LocationRow], environments: &[EitjeEnvironment]) -> Self {
		let mut pinned = HashMap::new();

		for location in locations {
			for id in &location.eitje_environment_ids {
				pinned.entry(*id).or_insert_with(|| location.name.clone());
			}
		}

		let vendor = environments.iter().map(|env| (env.id, env.name.clone())).collect();

		Self { pinned, vendor }
	}

	/// Pinned canonical name, then the probed vendor name, then whatever the record carries.
	fn resolve(
		&self,
		environment_id: Option<i64>,
		environment: Option<&EnvironmentRef>,
	) -> Option<String> {
		let id = environment_id.or_else(|| environment.and_then(|env| env.id));

		if let Some(id) = id
			&& let Some(name) = self.pinned.get(&id).or_else(|| self.vendor.get(&id))
		{
			return Some(name.clone());
		}
		if let Some(name) = environment
			.and_then(|env| env.name.as_deref())
			.map(str::trim)
			.filter(|name| !name.is_empty())
		{
			return Some(name.to_string());
		}

		id.map(|id| id.to_string())
	}
}

impl HorecaService {
	/// Syncs one endpoint over an inclusive date range and reports what happened per stage.
	///
	/// Failed units and records are collected in `errors`; only request validation, missing
	/// configuration and location bootstrap failures return `Err`.
	pub async fn sync(&self, endpoint: Endpoint, req: SyncRequest) -> Result<SyncReport> {
		let range = DateRange::new(req.start_date, req.end_date)?;

		if range.days() > self.cfg.sync.max_range_days {
			return Err(Error::InvalidRequest {
				message: format!(
					"Range spans {} days; at most {} days are allowed per sync.",
					range.days(),
					self.cfg.sync.max_range_days
				),
			});
		}

		let lanes = self.build_lanes(endpoint)?;
		let sync_time = OffsetDateTime::now_utc();
		let mut errors = Vec::new();
		let mut stage = JobStage::Pending;

		log_stage(endpoint, range, stage);

		let mut conn = self.db.pool.acquire().await?;
		let known_locations =
			locations::sync_locations(&mut conn, &self.cfg.locations, sync_time).await?;

		drop(conn);

		let names = match endpoint.vendor() {
			Vendor::Eitje => self.environment_names(&known_locations).await,
			Vendor::Bork => EnvironmentNames::default(),
		};

		stage = JobStage::Fetching;
		log_stage(endpoint, range, stage);

		let plan = FetchPlan {
			range,
			policy: RetryPolicy::from_config(&self.cfg.sync),
			request_delay: Duration::from_millis(self.cfg.sync.request_delay_ms),
			max_lanes: self.cfg.sync.max_concurrent_lanes as usize,
		};
		let mut outcomes = fetch::spawn_lanes(lanes, plan);
		let mut tally = StoreTally::default();

		while let Some(outcome) = outcomes.recv().await {
			self.store_unit(outcome, &names, sync_time, &mut tally, &mut errors).await;
		}

		stage = JobStage::Processing;
		log_stage(endpoint, range, stage);

		let mut records_processed = 0;

		match self.process_range(endpoint, range).await {
			Ok(report) => {
				records_processed = report.records_processed;

				errors.extend(report.errors);
			},
			Err(err) => errors.push(stage_error(JobStage::Processing, &err)),
		}

		stage = JobStage::Aggregating;
		log_stage(endpoint, range, stage);

		let mut aggregated = 0;

		match self.aggregate_range(range, None).await {
			Ok(report) => {
				aggregated = report.rows_changed;

				errors.extend(report.errors);
			},
			Err(err) => errors.push(stage_error(JobStage::Aggregating, &err)),
		}

		self.progress_cache.invalidate(endpoint);

		let success = tally.units_ok > 0 || tally.units_failed == 0;
		let error = (!success).then(|| failure_summary(&tally, &errors));

		stage = if success { JobStage::Done } else { JobStage::Failed };
		log_stage(endpoint, range, stage);

		let stored_next_run = match schedule::get_state(&self.db.pool, endpoint.as_str()).await {
			Ok(state) => state.and_then(|state| state.next_run_at),
			Err(err) => {
				tracing::warn!(endpoint = %endpoint, error = %err, "Failed to read schedule state.");

				None
			},
		};
		let next_sync_date =
			upcoming_run(&self.cfg.schedule, endpoint, stored_next_run, OffsetDateTime::now_utc());

		if !errors.is_empty() {
			tracing::warn!(
				endpoint = %endpoint,
				errors = errors.len(),
				units_ok = tally.units_ok,
				units_failed = tally.units_failed,
				"Sync finished with partial failures."
			);
		}

		Ok(SyncReport {
			success,
			error,
			endpoint,
			stage,
			range,
			records_processed,
			records_added: tally.added,
			records_updated: tally.updated,
			records_unchanged: tally.unchanged,
			aggregated,
			errors,
			sync_time,
			last_sync_date: tally.last_date,
			next_sync_date,
		})
	}

	fn build_lanes(&self, endpoint: Endpoint) -> Result<Vec<Lane>> {
		match endpoint.vendor() {
			Vendor::Eitje => {
				let cfg = self.eitje_cfg()?.clone();

				Ok(vec![Lane {
					endpoint,
					location: None,
					source: LaneSource::Eitje { cfg, source: self.sources.eitje.clone() },
				}])
			},
			Vendor::Bork => {
				let lanes: Vec<Lane> = self
					.cfg
					.locations
					.iter()
					.filter_map(|location| {
						let bork = location.bork.clone()?;
						let location_id = locations::location_id_for(&location.name);
						let name = location.name.trim().to_string();

						Some(Lane {
							endpoint,
							location: Some(LaneLocation { location_id, name }),
							source: LaneSource::Bork {
								cfg: self.cfg.bork.clone(),
								location: bork,
								source: self.sources.bork.clone(),
							},
						})
					})
					.collect();

				if lanes.is_empty() {
					return Err(Error::Configuration {
						message: "No location has Bork credentials configured.".to_string(),
					});
				}

				Ok(lanes)
			},
		}
	}

	async fn environment_names(&self, known: &[LocationRow]) -> EnvironmentNames {
		let environments = match self.eitje_cfg() {
			Ok(cfg) => match self.sources.eitje.fetch_environments(cfg).await {
				Ok(environments) => environments,
				Err(err) => {
					tracing::warn!(error = %err, "Eitje environment probe failed; storing raw environment references.");

					Vec::new()
				},
			},
			Err(_) => Vec::new(),
		};

		EnvironmentNames::new(known, &environments)
	}

	async fn store_unit(
		&self,
		outcome: UnitOutcome,
		names: &EnvironmentNames,
		now: OffsetDateTime,
		tally: &mut StoreTally,
		errors: &mut Vec<SyncError>,
	) {
		let UnitOutcome { endpoint, location, date, attempts, result } = outcome;
		let location_name = location.as_ref().map(|location| location.name.clone());
		let batch = match result {
			Ok(batch) => batch,
			Err(err) => {
				tally.units_failed += 1;

				errors.push(SyncError {
					stage: JobStage::Fetching,
					kind: provider_kind(&err),
					date: Some(date),
					location: location_name,
					attempts,
					message: err.to_string(),
				});

				return;
			},
		};

		tally.units_ok += 1;
		tally.last_date = tally.last_date.max(Some(date));

		match batch {
			UnitBatch::Eitje(page) => {
				push_rejected(errors, &page.rejected, date, location_name.as_deref());

				for record in &page.items {
					let stored = self.store_eitje_record(endpoint, record, date, names, now).await;

					tally_outcome(stored, tally, errors, date, None);
				}
			},
			UnitBatch::Bork(page) => {
				push_rejected(errors, &page.rejected, date, location_name.as_deref());

				let Some(location) = location else {
					return;
				};
				let stored = self.store_ticket_day(&page.items, date, &location, now).await;

				tally_outcome(stored, tally, errors, date, Some(location.name));
			},
		}
	}

	async fn store_eitje_record(
		&self,
		endpoint: Endpoint,
		record: &EitjeRecord,
		requested: Date,
		names: &EnvironmentNames,
		now: OffsetDateTime,
	) -> Result<UpsertOutcome> {
		let payload = record.to_payload()?;
		let external_id = record.external_id();
		let location_ref = match record {
			EitjeRecord::Shift(shift) => names.resolve(shift.environment_id, shift.environment.as_ref()),
			EitjeRecord::RevenueDay(day) => names.resolve(day.environment_id, day.environment.as_ref()),
		};
		let new = NewRawRecord {
			endpoint,
			external_id: Some(external_id.as_str()),
			record_date: record.date().unwrap_or(requested),
			location_ref: location_ref.as_deref(),
			payload: &payload,
		};
		let (_, outcome) = raw::upsert_raw(&self.db.pool, &new, now).await?;

		Ok(outcome)
	}

	/// One raw record per (date, venue). Quiet days store an empty ticket list so the day still
	/// counts as fetched.
	async fn store_ticket_day(
		&self,
		tickets: &[BorkTicket],
		date: Date,
		location: &LaneLocation,
		now: OffsetDateTime,
	) -> Result<UpsertOutcome> {
		let tickets = serde_json::to_value(tickets).map_err(|err| Error::Provider {
			message: format!("Failed to encode Bork tickets: {err}"),
		})?;
		let mut body = Map::new();

		body.insert(payload::BORK_TICKETS_KEY.to_string(), tickets);

		let payload = Value::Object(body);
		let location_ref = location.location_id.to_string();
		let new = NewRawRecord {
			endpoint: Endpoint::BorkTicketDay,
			external_id: None,
			record_date: date,
			location_ref: Some(location_ref.as_str()),
			payload: &payload,
		};
		let (_, outcome) = raw::upsert_raw(&self.db.pool, &new, now).await?;

		Ok(outcome)
	}
}

fn tally_outcome(
	stored: Result<UpsertOutcome>,
	tally: &mut StoreTally,
	errors: &mut Vec<SyncError>,
	date: Date,
	location: Option<String>,
) {
	match stored {
		Ok(UpsertOutcome::Inserted) => tally.added += 1,
		Ok(UpsertOutcome::Updated) => tally.updated += 1,
		Ok(UpsertOutcome::Unchanged) => tally.unchanged += 1,
		Err(err) => errors.push(SyncError {
			stage: JobStage::Storing,
			kind: service_kind(&err),
			date: Some(date),
			location,
			attempts: 1,
			message: err.to_string(),
		}),
	}
}

fn push_rejected(errors: &mut Vec<SyncError>, rejected: &[Rejected], date: Date, location: Option<&str>) {
	for item in rejected {
		errors.push(SyncError {
			stage: JobStage::Fetching,
			kind: "parse",
			date: Some(date),
			location: location.map(str::to_string),
			attempts: 1,
			message: format!("Record {} skipped: {}", item.index, item.message),
		});
	}
}

fn failure_summary(tally: &StoreTally, errors: &[SyncError]) -> String {
	let first = errors
		.iter()
		.find(|err| err.stage == JobStage::Fetching)
		.map(|err| err.message.as_str())
		.unwrap_or("no details");

	format!("All {} fetch units failed; first failure: {first}", tally.units_failed)
}

/// When the scheduler will next run `endpoint`. A stored time that is already due belongs to
/// the run in progress, so the next one is a full interval after `now`.
fn upcoming_run(
	schedule: &horeca_config::Schedule,
	endpoint: Endpoint,
	stored: Option<OffsetDateTime>,
	now: OffsetDateTime,
) -> Option<OffsetDateTime> {
	let scheduled = schedule.enabled
		&& schedule.endpoints.iter().any(|name| name.parse::<Endpoint>().ok() == Some(endpoint));

	if !scheduled {
		return None;
	}

	match stored {
		Some(at) if at > now => Some(at),
		_ => Some(now + time::Duration::minutes(schedule.interval_minutes.max(1) as i64)),
	}
}

fn stage_error(stage: JobStage, err: &Error) -> SyncError {
	tracing::error!(stage = ?stage, error = %err, "Sync stage failed.");

	SyncError {
		stage,
		kind: service_kind(err),
		date: None,
		location: None,
		attempts: 1,
		message: err.to_string(),
	}
}

fn log_stage(endpoint: Endpoint, range: DateRange, stage: JobStage) {
	tracing::info!(endpoint = %endpoint, start = %range.start, end = %range.end, stage = ?stage, "Sync stage.");
}

pub(crate) fn provider_kind(err: &horeca_providers::Error) -> &'static str {
	match err {
		horeca_providers::Error::Upstream { .. } if err.is_transient() => "upstream_transient",
		horeca_providers::Error::Upstream { .. } => "upstream_permanent",
		other => other.kind(),
	}
}

pub(crate) fn service_kind(err: &Error) -> &'static str {
	match err {
		Error::InvalidRequest { .. } => "validation",
		Error::Configuration { .. } => "configuration",
		Error::NotFound { .. } => "not_found",
		Error::Provider { .. } => "provider",
		Error::Storage { .. } => "storage",
	}
}
