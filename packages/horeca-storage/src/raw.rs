//! Raw vendor records, one row per natural key.

use std::collections::BTreeSet;

use serde_json::Value;
use sqlx::PgExecutor;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::{Error, Result, models::RawRecord};
use horeca_domain::{Endpoint, KeyShape, calendar::DateRange, payload};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
	Inserted,
	Updated,
	/// Same key and same trimmed payload; only `ingested_at` moved.
	Unchanged,
}

#[derive(Debug, Clone)]
pub struct NewRawRecord<'a> {
	pub endpoint: Endpoint,
	pub external_id: Option<&'a str>,
	pub record_date: Date,
	pub location_ref: Option<&'a str>,
	pub payload: &'a Value,
}

/// `{endpoint}:id:{external_id}` for id-keyed endpoints, `{endpoint}:day:{date}:{location}` for
/// ticket-day endpoints.
pub fn natural_key(record: &NewRawRecord<'_>) -> Result<String> {
	match record.endpoint.key_shape() {
		KeyShape::ExternalId => {
			let external_id = record
				.external_id
				.map(str::trim)
				.filter(|id| !id.is_empty())
				.ok_or_else(|| {
					Error::InvalidArgument(format!(
						"{} records require an external id.",
						record.endpoint
					))
				})?;

			Ok(format!("{}:id:{external_id}", record.endpoint))
		},
		KeyShape::DateLocation => {
			let location_ref = record
				.location_ref
				.map(str::trim)
				.filter(|location| !location.is_empty())
				.ok_or_else(|| {
					Error::InvalidArgument(format!(
						"{} records require a location reference.",
						record.endpoint
					))
				})?;

			Ok(format!(
				"{}:day:{}:{location_ref}",
				record.endpoint,
				horeca_domain::time_serde::format_date(record.record_date)
			))
		},
	}
}

pub fn raw_id_for(natural_key: &str) -> Uuid {
	Uuid::new_v5(&Uuid::NAMESPACE_OID, natural_key.as_bytes())
}

pub fn payload_hash(payload: &Value) -> Result<String> {
	let bytes = serde_json::to_vec(payload)?;

	Ok(blake3::hash(&bytes).to_hex().to_string())
}

/// Trims the payload to the endpoint's allow-list and upserts it under its natural key.
///
/// Re-ingesting a key overwrites `payload` and `ingested_at` and never adds a row.
pub async fn upsert_raw<'e, E>(
	executor: E,
	record: &NewRawRecord<'_>,
	now: OffsetDateTime,
) -> Result<(Uuid, UpsertOutcome)>
where
	E: PgExecutor<'e>,
{
	let key = natural_key(record)?;
	let raw_id = raw_id_for(&key);
	let trimmed = payload::trim_payload(record.endpoint, record.payload);
	let hash = payload_hash(&trimmed)?;
	let previous_hash: Option<String> = sqlx::query_scalar(
		"\
WITH previous AS (
	SELECT payload_hash
	FROM raw_records
	WHERE raw_id = $1
)
INSERT INTO raw_records (
	raw_id,
	endpoint,
	external_id,
	record_date,
	location_ref,
	payload,
	payload_hash,
	ingested_at
)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
ON CONFLICT (raw_id) DO UPDATE
SET
	record_date = EXCLUDED.record_date,
	location_ref = EXCLUDED.location_ref,
	payload = EXCLUDED.payload,
	payload_hash = EXCLUDED.payload_hash,
	ingested_at = EXCLUDED.ingested_at
RETURNING (SELECT payload_hash FROM previous)",
	)
	.bind(raw_id)
	.bind(record.endpoint.as_str())
	.bind(record.external_id)
	.bind(record.record_date)
	.bind(record.location_ref)
	.bind(&trimmed)
	.bind(hash.as_str())
	.bind(now)
	.fetch_one(executor)
	.await?;
	let outcome = match previous_hash {
		None => UpsertOutcome::Inserted,
		Some(previous) if previous == hash => UpsertOutcome::Unchanged,
		Some(_) => UpsertOutcome::Updated,
	};

	Ok((raw_id, outcome))
}

/// Whether any raw record exists for the endpoint and date, optionally for one location only.
pub async fn raw_exists<'e, E>(
	executor: E,
	endpoint: Endpoint,
	date: Date,
	location_ref: Option<&str>,
) -> Result<bool>
where
	E: PgExecutor<'e>,
{
	let exists = sqlx::query_scalar(
		"\
SELECT EXISTS (
	SELECT 1
	FROM raw_records
	WHERE endpoint = $1
		AND record_date = $2
		AND ($3::text IS NULL OR location_ref = $3)
)",
	)
	.bind(endpoint.as_str())
	.bind(date)
	.bind(location_ref)
	.fetch_one(executor)
	.await?;

	Ok(exists)
}

pub async fn list_raw_dates<'e, E>(
	executor: E,
	endpoint: Endpoint,
	range: DateRange,
) -> Result<BTreeSet<Date>>
where
	E: PgExecutor<'e>,
{
	let dates: Vec<Date> = sqlx::query_scalar(
		"\
SELECT DISTINCT record_date
FROM raw_records
WHERE endpoint = $1
	AND record_date BETWEEN $2 AND $3",
	)
	.bind(endpoint.as_str())
	.bind(range.start)
	.bind(range.end)
	.fetch_all(executor)
	.await?;

	Ok(dates.into_iter().collect())
}

pub async fn list_raw_in_range<'e, E>(
	executor: E,
	endpoint: Endpoint,
	range: DateRange,
) -> Result<Vec<RawRecord>>
where
	E: PgExecutor<'e>,
{
	let rows = sqlx::query_as::<_, RawRecord>(
		"\
SELECT
	raw_id,
	endpoint,
	external_id,
	record_date,
	location_ref,
	payload,
	payload_hash,
	ingested_at
FROM raw_records
WHERE endpoint = $1
	AND record_date BETWEEN $2 AND $3
ORDER BY record_date, raw_id",
	)
	.bind(endpoint.as_str())
	.bind(range.start)
	.bind(range.end)
	.fetch_all(executor)
	.await?;

	Ok(rows)
}
