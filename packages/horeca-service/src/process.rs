//! Raw to processed normalization.
//!
//! Every raw record is normalized on its own and its processed rows are replaced inside one
//! transaction. A record that cannot be normalized is reported and skipped; it never aborts the
//! range.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
	Error, HorecaService, Result,
	aggregate::AggregateReport,
	sync::{JobStage, SyncError},
};
use horeca_domain::{
	Endpoint, calendar, location_match,
	payload::BORK_TICKETS_KEY,
	rollup::{round_cents, round_hours},
	time_serde,
};
use horeca_providers::{
	bork::BorkTicket,
	eitje::{EitjeRevenueDay, EitjeShift},
};
use horeca_storage::{
	locations,
	models::{LocationRow, ProcessedRecord, RawRecord},
	processed, raw,
};

const MINUTES_PER_DAY: i64 = 24 * 60;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessReport {
	pub endpoint: Endpoint,
	pub range: calendar::DateRange,
	pub raw_records: u64,
	pub records_processed: u64,
	pub errors: Vec<SyncError>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessEndpointRequest {
	pub endpoint: Endpoint,
	pub year: i32,
	pub month: u8,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessEndpointResponse {
	pub success: bool,
	pub endpoint: Endpoint,
	pub range: calendar::DateRange,
	pub processed: ProcessReport,
	pub aggregated: AggregateReport,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RecordFailure {
	pub(crate) kind: &'static str,
	pub(crate) message: String,
}
impl RecordFailure {
	fn parse(message: impl Into<String>) -> Self {
		Self { kind: "parse", message: message.into() }
	}

	fn location(message: impl Into<String>) -> Self {
		Self { kind: "location", message: message.into() }
	}
}

/// Canonical locations in configuration order, so earlier entries win name-match ties.
pub(crate) struct LocationIndex {
	rows: Vec<LocationRow>,
	names: Vec<String>,
}
impl LocationIndex {
	pub(crate) fn new(mut rows: Vec<LocationRow>, order: &[horeca_config::Location]) -> Self {
		rows.sort_by_key(|row| {
			order
				.iter()
				.position(|location| locations::location_id_for(&location.name) == row.location_id)
				.unwrap_or(usize::MAX)
		});

		let names = rows.iter().map(|row| row.name.clone()).collect();

		Self { rows, names }
	}

	/// Bork refs are canonical ids. Eitje refs are pinned environment ids or names, which go
	/// through the ordered name matcher.
	pub(crate) fn resolve(&self, endpoint: Endpoint, location_ref: Option<&str>) -> Option<Uuid> {
		let raw_ref = location_ref.map(str::trim).filter(|value| !value.is_empty())?;

		if endpoint == Endpoint::BorkTicketDay {
			let id = Uuid::parse_str(raw_ref).ok()?;

			return self.rows.iter().find(|row| row.location_id == id).map(|row| row.location_id);
		}
		if let Ok(environment_id) = raw_ref.parse::<i64>()
			&& let Some(row) =
				self.rows.iter().find(|row| row.eitje_environment_ids.contains(&environment_id))
		{
			return Some(row.location_id);
		}

		location_match::match_location(raw_ref, &self.names).map(|hit| self.rows[hit.index].location_id)
	}
}

impl HorecaService {
	/// Normalizes every raw record of `endpoint` in range.
	pub async fn process_range(
		&self,
		endpoint: Endpoint,
		range: calendar::DateRange,
	) -> Result<ProcessReport> {
		let index = LocationIndex::new(locations::list_locations(&self.db.pool).await?, &self.cfg.locations);
		let raws = raw::list_raw_in_range(&self.db.pool, endpoint, range).await?;
		let now = OffsetDateTime::now_utc();
		let mut report = ProcessReport {
			endpoint,
			range,
			raw_records: raws.len() as u64,
			records_processed: 0,
			errors: Vec::new(),
		};

		for raw in &raws {
			let records = match normalize_raw(endpoint, raw, &index, now) {
				Ok(records) => records,
				Err(failure) => {
					tracing::warn!(
						endpoint = %endpoint,
						raw_id = %raw.raw_id,
						date = %raw.record_date,
						kind = failure.kind,
						message = %failure.message,
						"Raw record skipped."
					);
					report.errors.push(SyncError {
						stage: JobStage::Processing,
						kind: failure.kind,
						date: Some(raw.record_date),
						location: raw.location_ref.clone(),
						attempts: 1,
						message: failure.message,
					});

					continue;
				},
			};
			let mut tx = self.db.pool.begin().await?;

			processed::replace_for_raw(&mut *tx, raw.raw_id, &records).await?;
			tx.commit().await?;

			report.records_processed += records.len() as u64;
		}

		tracing::info!(
			endpoint = %endpoint,
			raw_records = report.raw_records,
			records_processed = report.records_processed,
			errors = report.errors.len(),
			"Processing finished."
		);

		Ok(report)
	}

	/// Re-runs processing and aggregation for one month without fetching.
	pub async fn process_endpoint(&self, req: ProcessEndpointRequest) -> Result<ProcessEndpointResponse> {
		let range = calendar::expected_range(req.year, req.month, self.today())?.ok_or_else(|| {
			Error::InvalidRequest {
				message: format!("{}-{:02} has not started yet.", req.year, req.month),
			}
		})?;
		let mut conn = self.db.pool.acquire().await?;

		locations::sync_locations(&mut conn, &self.cfg.locations, OffsetDateTime::now_utc()).await?;

		drop(conn);

		let processed = self.process_range(req.endpoint, range).await?;
		let aggregated = self.aggregate_range(range, None).await?;

		self.progress_cache.invalidate(req.endpoint);

		Ok(ProcessEndpointResponse { success: true, endpoint: req.endpoint, range, processed, aggregated })
	}
}

pub(crate) fn normalize_raw(
	endpoint: Endpoint,
	raw: &RawRecord,
	index: &LocationIndex,
	now: OffsetDateTime,
) -> std::result::Result<Vec<ProcessedRecord>, RecordFailure> {
	let location_id = index.resolve(endpoint, raw.location_ref.as_deref()).ok_or_else(|| {
		RecordFailure::location(format!(
			"Location reference {:?} does not match any configured location.",
			raw.location_ref.as_deref().unwrap_or_default()
		))
	})?;

	match endpoint {
		Endpoint::TimeRegistrationShifts | Endpoint::PlanningShifts =>
			normalize_shift(endpoint, raw, location_id, now).map(|record| vec![record]),
		Endpoint::RevenueDays => normalize_revenue_day(raw, location_id, now).map(|record| vec![record]),
		Endpoint::BorkTicketDay => normalize_ticket_day(raw, location_id, now),
	}
}

fn normalize_shift(
	endpoint: Endpoint,
	raw: &RawRecord,
	location_id: Uuid,
	now: OffsetDateTime,
) -> std::result::Result<ProcessedRecord, RecordFailure> {
	let shift: EitjeShift = serde_json::from_value(raw.payload.clone())
		.map_err(|err| RecordFailure::parse(format!("Shift payload is malformed: {err}")))?;
	let hours = match shift.hours_worked {
		Some(hours) => hours,
		None => match (shift.start_time.as_deref(), shift.end_time.as_deref()) {
			(Some(start), Some(end)) => shift_hours(start, end, shift.break_duration).ok_or_else(|| {
				RecordFailure::parse(format!("Shift times {start:?}..{end:?} are not readable."))
			})?,
			_ =>
				return Err(RecordFailure::parse(
					"Shift has neither hours_worked nor start and end times.",
				)),
		},
	};
	let natural_key = raw.external_id.clone().unwrap_or_else(|| shift.id.to_string());
	let mut record = blank_record(endpoint, &natural_key, raw, location_id, now);

	record.record_date = shift.date.unwrap_or(raw.record_date);
	record.team_id = shift.team_id;
	record.user_id = shift.user_id;
	record.hours_worked = Some(round_hours(hours.max(0.0)));
	record.wage_cost = Some(round_cents(shift.wage_cost.unwrap_or(0.0)));

	Ok(record)
}

fn normalize_revenue_day(
	raw: &RawRecord,
	location_id: Uuid,
	now: OffsetDateTime,
) -> std::result::Result<ProcessedRecord, RecordFailure> {
	let day: EitjeRevenueDay = serde_json::from_value(raw.payload.clone())
		.map_err(|err| RecordFailure::parse(format!("Revenue day payload is malformed: {err}")))?;
	let excl = day.revenue_excl_vat.or(day.total_revenue);
	let incl = day.revenue_incl_vat.or_else(|| Some(excl? + day.vat_amount?)).or(excl);
	let vat = day.vat_amount.or_else(|| Some(incl? - excl?));
	let natural_key = raw.external_id.clone().unwrap_or_else(|| day.id.to_string());
	let mut record = blank_record(Endpoint::RevenueDays, &natural_key, raw, location_id, now);

	record.record_date = day.date.unwrap_or(raw.record_date);
	record.revenue_excl_vat = excl.map(round_cents);
	record.revenue_incl_vat = incl.map(round_cents);
	record.vat_amount = vat.map(round_cents);
	record.transaction_count = day.transaction_count;
	record.payment_methods = day.payment_methods.map(|methods| {
		let mut map = Map::new();

		for (method, amount) in methods.0 {
			map.insert(method, Value::from(amount));
		}

		Value::Object(map)
	});

	Ok(record)
}

/// One processed row per ticket line, keyed by date, location, ticket and line position.
fn normalize_ticket_day(
	raw: &RawRecord,
	location_id: Uuid,
	now: OffsetDateTime,
) -> std::result::Result<Vec<ProcessedRecord>, RecordFailure> {
	let tickets = match raw.payload.get(BORK_TICKETS_KEY) {
		Some(value) => serde_json::from_value::<Vec<BorkTicket>>(value.clone())
			.map_err(|err| RecordFailure::parse(format!("Ticket-day payload is malformed: {err}")))?,
		None => Vec::new(),
	};
	let day = time_serde::format_date(raw.record_date);
	let mut records = Vec::new();

	for (ticket_index, ticket) in tickets.iter().enumerate() {
		let ticket_ref = ticket
			.ticket_number
			.as_deref()
			.map(str::trim)
			.filter(|value| !value.is_empty())
			.map(str::to_string)
			.unwrap_or_else(|| format!("#{ticket_index}"));

		for (line_index, line) in ticket.lines.iter().enumerate() {
			let natural_key =
				format!("{day}:{location_id}:{ticket_index}:{ticket_ref}:{line_index}");
			let mut record =
				blank_record(Endpoint::BorkTicketDay, &natural_key, raw, location_id, now);
			let excl = line.revenue_ex_vat;
			let incl = line.revenue_inc_vat.or(line.total_price);
			let vat = line.vat_amount.or_else(|| Some(incl? - excl?));

			record.quantity = line.quantity;
			record.product_name = line.product_name.clone();
			record.category = line.category.clone();
			record.payment_method = ticket.payment_method.clone();
			record.ticket_ref = Some(ticket_ref.clone());
			record.revenue_excl_vat = excl.map(round_cents);
			record.revenue_incl_vat = incl.map(round_cents);
			record.vat_amount = vat.map(round_cents);
			record.cost_price = line.cost_price.map(round_cents);

			records.push(record);
		}
	}

	Ok(records)
}

fn blank_record(
	endpoint: Endpoint,
	natural_key: &str,
	raw: &RawRecord,
	location_id: Uuid,
	now: OffsetDateTime,
) -> ProcessedRecord {
	ProcessedRecord {
		processed_id: processed::processed_id_for(endpoint, natural_key),
		endpoint: endpoint.as_str().to_string(),
		record_date: raw.record_date,
		location_id,
		team_id: None,
		user_id: None,
		hours_worked: None,
		wage_cost: None,
		revenue_excl_vat: None,
		revenue_incl_vat: None,
		vat_amount: None,
		quantity: None,
		product_name: None,
		category: None,
		payment_method: None,
		ticket_ref: None,
		transaction_count: None,
		cost_price: None,
		payment_methods: None,
		source_raw_id: raw.raw_id,
		processed_at: now,
	}
}

/// Worked hours between two clock readings minus the break, rolling past midnight.
pub(crate) fn shift_hours(start: &str, end: &str, break_minutes: Option<f64>) -> Option<f64> {
	let start = minute_of_day(start)?;
	let end = minute_of_day(end)?;
	let mut span = end - start;

	if span < 0 {
		span += MINUTES_PER_DAY;
	}

	let worked = span as f64 - break_minutes.unwrap_or(0.0).max(0.0);

	Some((worked / 60.0).max(0.0))
}

/// Accepts `HH:MM`, `HH:MM:SS` and date-times with a `T` or space separator.
fn minute_of_day(raw: &str) -> Option<i64> {
	let trimmed = raw.trim();
	let clock = match trimmed.split_once('T') {
		Some((_, clock)) => clock,
		None => trimmed.rsplit(' ').next()?,
	};
	let mut parts = clock.split(':');
	let hours: i64 = parts.next()?.trim().parse().ok()?;
	let minutes: i64 = parts.next()?.chars().take(2).collect::<String>().parse().ok()?;

	if !(0..24).contains(&hours) || !(0..60).contains(&minutes) {
		return None;
	}

	Some(hours * 60 + minutes)
}
