//! Ledger input rows and the monthly summaries computed from them.

use sqlx::PgExecutor;
use uuid::Uuid;

use crate::{
	Result,
	models::{PnlLedgerEntry, PnlMonthlySummary},
};

pub async fn insert_ledger_entry<'e, E>(executor: E, entry: &PnlLedgerEntry) -> Result<()>
where
	E: PgExecutor<'e>,
{
	sqlx::query(
		"\
INSERT INTO pnl_ledger_entries (
	entry_id,
	location_id,
	year,
	month,
	category,
	subcategory,
	gl_account,
	amount,
	imported_at
)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
	)
	.bind(entry.entry_id)
	.bind(entry.location_id)
	.bind(entry.year)
	.bind(entry.month)
	.bind(entry.category.as_str())
	.bind(entry.subcategory.as_deref())
	.bind(entry.gl_account.as_deref())
	.bind(entry.amount)
	.bind(entry.imported_at)
	.execute(executor)
	.await?;

	Ok(())
}

/// Ledger rows of one month in insertion order, so deduplication keeps the earliest import.
pub async fn list_ledger_entries<'e, E>(
	executor: E,
	location_id: Uuid,
	year: i32,
	month: i32,
) -> Result<Vec<PnlLedgerEntry>>
where
	E: PgExecutor<'e>,
{
	let rows = sqlx::query_as::<_, PnlLedgerEntry>(
		"\
SELECT
	entry_id,
	location_id,
	year,
	month,
	category,
	subcategory,
	gl_account,
	amount,
	imported_at
FROM pnl_ledger_entries
WHERE location_id = $1
	AND year = $2
	AND month = $3
ORDER BY imported_at, entry_id",
	)
	.bind(location_id)
	.bind(year)
	.bind(month)
	.fetch_all(executor)
	.await?;

	Ok(rows)
}

/// Distinct (year, month) periods with ledger rows for a location, oldest first.
pub async fn list_ledger_periods<'e, E>(
	executor: E,
	location_id: Uuid,
	year: Option<i32>,
) -> Result<Vec<(i32, i32)>>
where
	E: PgExecutor<'e>,
{
	let rows = sqlx::query_as::<_, (i32, i32)>(
		"\
SELECT DISTINCT year, month
FROM pnl_ledger_entries
WHERE location_id = $1
	AND ($2::integer IS NULL OR year = $2)
ORDER BY year, month",
	)
	.bind(location_id)
	.bind(year)
	.fetch_all(executor)
	.await?;

	Ok(rows)
}

pub async fn upsert_monthly_summary<'e, E>(executor: E, row: &PnlMonthlySummary) -> Result<bool>
where
	E: PgExecutor<'e>,
{
	let result = sqlx::query(
		"\
INSERT INTO pnl_monthly_summaries (
	location_id,
	year,
	month,
	revenue,
	cost_of_sales,
	labor,
	other_costs,
	financial_items,
	resultaat,
	ledger_resultaat,
	reference_resultaat,
	percentage_difference,
	within_margin,
	unmapped_rows,
	duplicates_skipped,
	last_aggregated_at
)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
ON CONFLICT (location_id, year, month) DO UPDATE
SET
	revenue = EXCLUDED.revenue,
	cost_of_sales = EXCLUDED.cost_of_sales,
	labor = EXCLUDED.labor,
	other_costs = EXCLUDED.other_costs,
	financial_items = EXCLUDED.financial_items,
	resultaat = EXCLUDED.resultaat,
	ledger_resultaat = EXCLUDED.ledger_resultaat,
	reference_resultaat = EXCLUDED.reference_resultaat,
	percentage_difference = EXCLUDED.percentage_difference,
	within_margin = EXCLUDED.within_margin,
	unmapped_rows = EXCLUDED.unmapped_rows,
	duplicates_skipped = EXCLUDED.duplicates_skipped,
	last_aggregated_at = EXCLUDED.last_aggregated_at
WHERE (
	pnl_monthly_summaries.revenue,
	pnl_monthly_summaries.cost_of_sales,
	pnl_monthly_summaries.labor,
	pnl_monthly_summaries.other_costs,
	pnl_monthly_summaries.financial_items,
	pnl_monthly_summaries.resultaat,
	pnl_monthly_summaries.ledger_resultaat,
	pnl_monthly_summaries.reference_resultaat,
	pnl_monthly_summaries.percentage_difference,
	pnl_monthly_summaries.within_margin,
	pnl_monthly_summaries.unmapped_rows,
	pnl_monthly_summaries.duplicates_skipped
) IS DISTINCT FROM (
	EXCLUDED.revenue,
	EXCLUDED.cost_of_sales,
	EXCLUDED.labor,
	EXCLUDED.other_costs,
	EXCLUDED.financial_items,
	EXCLUDED.resultaat,
	EXCLUDED.ledger_resultaat,
	EXCLUDED.reference_resultaat,
	EXCLUDED.percentage_difference,
	EXCLUDED.within_margin,
	EXCLUDED.unmapped_rows,
	EXCLUDED.duplicates_skipped
)",
	)
	.bind(row.location_id)
	.bind(row.year)
	.bind(row.month)
	.bind(row.revenue)
	.bind(row.cost_of_sales)
	.bind(row.labor)
	.bind(row.other_costs)
	.bind(row.financial_items)
	.bind(row.resultaat)
	.bind(row.ledger_resultaat)
	.bind(row.reference_resultaat)
	.bind(row.percentage_difference)
	.bind(row.within_margin)
	.bind(row.unmapped_rows)
	.bind(row.duplicates_skipped)
	.bind(row.last_aggregated_at)
	.execute(executor)
	.await?;

	Ok(result.rows_affected() > 0)
}

pub async fn get_monthly_summary<'e, E>(
	executor: E,
	location_id: Uuid,
	year: i32,
	month: i32,
) -> Result<Option<PnlMonthlySummary>>
where
	E: PgExecutor<'e>,
{
	let row = sqlx::query_as::<_, PnlMonthlySummary>(
		"\
SELECT
	location_id,
	year,
	month,
	revenue,
	cost_of_sales,
	labor,
	other_costs,
	financial_items,
	resultaat,
	ledger_resultaat,
	reference_resultaat,
	percentage_difference,
	within_margin,
	unmapped_rows,
	duplicates_skipped,
	last_aggregated_at
FROM pnl_monthly_summaries
WHERE location_id = $1
	AND year = $2
	AND month = $3",
	)
	.bind(location_id)
	.bind(year)
	.bind(month)
	.fetch_optional(executor)
	.await?;

	Ok(row)
}
