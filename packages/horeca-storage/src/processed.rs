//! Normalized records. Rows are owned by the raw record they were derived from.

use std::collections::BTreeSet;

use sqlx::{PgConnection, PgExecutor};
use time::Date;
use uuid::Uuid;

use crate::{Result, models::ProcessedRecord};
use horeca_domain::{Endpoint, calendar::DateRange};

pub fn processed_id_for(endpoint: Endpoint, natural_key: &str) -> Uuid {
	let name = format!("{endpoint}:processed:{natural_key}");

	Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes())
}

/// Replaces every processed row derived from `source_raw_id` with `records`.
///
/// Rows whose natural key no longer appears (a ticket line removed upstream) are deleted; the rest
/// are upserted by `processed_id`. Run inside a transaction so readers never see a half-replaced
/// set.
pub async fn replace_for_raw(
	conn: &mut PgConnection,
	source_raw_id: Uuid,
	records: &[ProcessedRecord],
) -> Result<u64> {
	let keep: Vec<Uuid> = records.iter().map(|record| record.processed_id).collect();

	sqlx::query(
		"\
DELETE FROM processed_records
WHERE source_raw_id = $1
	AND NOT (processed_id = ANY($2))",
	)
	.bind(source_raw_id)
	.bind(&keep)
	.execute(&mut *conn)
	.await?;

	let mut written = 0;

	for record in records {
		written += upsert_processed(&mut *conn, record).await?;
	}

	Ok(written)
}

pub async fn upsert_processed<'e, E>(executor: E, record: &ProcessedRecord) -> Result<u64>
where
	E: PgExecutor<'e>,
{
	let result = sqlx::query(
		"\
INSERT INTO processed_records (
	processed_id,
	endpoint,
	record_date,
	location_id,
	team_id,
	user_id,
	hours_worked,
	wage_cost,
	revenue_excl_vat,
	revenue_incl_vat,
	vat_amount,
	quantity,
	product_name,
	category,
	payment_method,
	ticket_ref,
	transaction_count,
	cost_price,
	payment_methods,
	source_raw_id,
	processed_at
)
VALUES (
	$1,
	$2,
	$3,
	$4,
	$5,
	$6,
	$7,
	$8,
	$9,
	$10,
	$11,
	$12,
	$13,
	$14,
	$15,
	$16,
	$17,
	$18,
	$19,
	$20,
	$21
)
ON CONFLICT (processed_id) DO UPDATE
SET
	record_date = EXCLUDED.record_date,
	location_id = EXCLUDED.location_id,
	team_id = EXCLUDED.team_id,
	user_id = EXCLUDED.user_id,
	hours_worked = EXCLUDED.hours_worked,
	wage_cost = EXCLUDED.wage_cost,
	revenue_excl_vat = EXCLUDED.revenue_excl_vat,
	revenue_incl_vat = EXCLUDED.revenue_incl_vat,
	vat_amount = EXCLUDED.vat_amount,
	quantity = EXCLUDED.quantity,
	product_name = EXCLUDED.product_name,
	category = EXCLUDED.category,
	payment_method = EXCLUDED.payment_method,
	ticket_ref = EXCLUDED.ticket_ref,
	transaction_count = EXCLUDED.transaction_count,
	cost_price = EXCLUDED.cost_price,
	payment_methods = EXCLUDED.payment_methods,
	source_raw_id = EXCLUDED.source_raw_id,
	processed_at = EXCLUDED.processed_at",
	)
	.bind(record.processed_id)
	.bind(record.endpoint.as_str())
	.bind(record.record_date)
	.bind(record.location_id)
	.bind(record.team_id)
	.bind(record.user_id)
	.bind(record.hours_worked)
	.bind(record.wage_cost)
	.bind(record.revenue_excl_vat)
	.bind(record.revenue_incl_vat)
	.bind(record.vat_amount)
	.bind(record.quantity)
	.bind(record.product_name.as_deref())
	.bind(record.category.as_deref())
	.bind(record.payment_method.as_deref())
	.bind(record.ticket_ref.as_deref())
	.bind(record.transaction_count)
	.bind(record.cost_price)
	.bind(record.payment_methods.as_ref())
	.bind(record.source_raw_id)
	.bind(record.processed_at)
	.execute(executor)
	.await?;

	Ok(result.rows_affected())
}

pub async fn list_processed_dates<'e, E>(
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
FROM processed_records
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

/// Every processed row of the given endpoints in range, ordered so rollups see a stable sequence.
pub async fn list_processed_in_range<'e, E>(
	executor: E,
	endpoints: &[Endpoint],
	range: DateRange,
	location_id: Option<Uuid>,
) -> Result<Vec<ProcessedRecord>>
where
	E: PgExecutor<'e>,
{
	let endpoints: Vec<&str> = endpoints.iter().map(|endpoint| endpoint.as_str()).collect();
	let rows = sqlx::query_as::<_, ProcessedRecord>(
		"\
SELECT
	processed_id,
	endpoint,
	record_date,
	location_id,
	team_id,
	user_id,
	hours_worked,
	wage_cost,
	revenue_excl_vat,
	revenue_incl_vat,
	vat_amount,
	quantity,
	product_name,
	category,
	payment_method,
	ticket_ref,
	transaction_count,
	cost_price,
	payment_methods,
	source_raw_id,
	processed_at
FROM processed_records
WHERE endpoint = ANY($1)
	AND record_date BETWEEN $2 AND $3
	AND ($4::uuid IS NULL OR location_id = $4)
ORDER BY location_id, record_date, processed_id",
	)
	.bind(&endpoints)
	.bind(range.start)
	.bind(range.end)
	.bind(location_id)
	.fetch_all(executor)
	.await?;

	Ok(rows)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn processed_ids_are_scoped_by_endpoint() {
		let registered = processed_id_for(Endpoint::TimeRegistrationShifts, "42");
		let planned = processed_id_for(Endpoint::PlanningShifts, "42");

		assert_ne!(registered, planned);
		assert_eq!(registered, processed_id_for(Endpoint::TimeRegistrationShifts, "42"));
	}
}
