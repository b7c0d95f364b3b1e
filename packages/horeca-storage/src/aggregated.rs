//! Rollup tables.
//!
//! Writes are full replacements guarded by `IS DISTINCT FROM`: a row whose recomputed values equal
//! the stored ones is left untouched, `last_aggregated_at` included. Prune helpers remove keys in a
//! range that no longer have any processed facts behind them.

use sqlx::PgExecutor;
use time::Date;
use uuid::Uuid;

use crate::{
	Result,
	models::{
		LaborDayAggregate, LaborTeamDayAggregate, RevenueDayAggregate, SalesCategoryDayAggregate,
		SalesDayAggregate,
	},
};
use horeca_domain::calendar::DateRange;

/// Returns whether the row was inserted or changed.
pub async fn upsert_labor_day<'e, E>(executor: E, row: &LaborDayAggregate) -> Result<bool>
where
	E: PgExecutor<'e>,
{
	let result = sqlx::query(
		"\
INSERT INTO labor_day_aggregates (
	location_id,
	work_date,
	total_hours_worked,
	total_wage_cost,
	employee_count,
	shift_count,
	planned_hours,
	planned_wage_cost,
	planned_shift_count,
	last_aggregated_at
)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
ON CONFLICT (location_id, work_date) DO UPDATE
SET
	total_hours_worked = EXCLUDED.total_hours_worked,
	total_wage_cost = EXCLUDED.total_wage_cost,
	employee_count = EXCLUDED.employee_count,
	shift_count = EXCLUDED.shift_count,
	planned_hours = EXCLUDED.planned_hours,
	planned_wage_cost = EXCLUDED.planned_wage_cost,
	planned_shift_count = EXCLUDED.planned_shift_count,
	last_aggregated_at = EXCLUDED.last_aggregated_at
WHERE (
	labor_day_aggregates.total_hours_worked,
	labor_day_aggregates.total_wage_cost,
	labor_day_aggregates.employee_count,
	labor_day_aggregates.shift_count,
	labor_day_aggregates.planned_hours,
	labor_day_aggregates.planned_wage_cost,
	labor_day_aggregates.planned_shift_count
) IS DISTINCT FROM (
	EXCLUDED.total_hours_worked,
	EXCLUDED.total_wage_cost,
	EXCLUDED.employee_count,
	EXCLUDED.shift_count,
	EXCLUDED.planned_hours,
	EXCLUDED.planned_wage_cost,
	EXCLUDED.planned_shift_count
)",
	)
	.bind(row.location_id)
	.bind(row.work_date)
	.bind(row.total_hours_worked)
	.bind(row.total_wage_cost)
	.bind(row.employee_count)
	.bind(row.shift_count)
	.bind(row.planned_hours)
	.bind(row.planned_wage_cost)
	.bind(row.planned_shift_count)
	.bind(row.last_aggregated_at)
	.execute(executor)
	.await?;

	Ok(result.rows_affected() > 0)
}

pub async fn upsert_labor_team_day<'e, E>(executor: E, row: &LaborTeamDayAggregate) -> Result<bool>
where
	E: PgExecutor<'e>,
{
	let result = sqlx::query(
		"\
INSERT INTO labor_team_day_aggregates (
	location_id,
	work_date,
	team_id,
	total_hours_worked,
	total_wage_cost,
	employee_count,
	shift_count,
	planned_hours,
	planned_wage_cost,
	planned_shift_count,
	last_aggregated_at
)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
ON CONFLICT (location_id, work_date, team_id) DO UPDATE
SET
	total_hours_worked = EXCLUDED.total_hours_worked,
	total_wage_cost = EXCLUDED.total_wage_cost,
	employee_count = EXCLUDED.employee_count,
	shift_count = EXCLUDED.shift_count,
	planned_hours = EXCLUDED.planned_hours,
	planned_wage_cost = EXCLUDED.planned_wage_cost,
	planned_shift_count = EXCLUDED.planned_shift_count,
	last_aggregated_at = EXCLUDED.last_aggregated_at
WHERE (
	labor_team_day_aggregates.total_hours_worked,
	labor_team_day_aggregates.total_wage_cost,
	labor_team_day_aggregates.employee_count,
	labor_team_day_aggregates.shift_count,
	labor_team_day_aggregates.planned_hours,
	labor_team_day_aggregates.planned_wage_cost,
	labor_team_day_aggregates.planned_shift_count
) IS DISTINCT FROM (
	EXCLUDED.total_hours_worked,
	EXCLUDED.total_wage_cost,
	EXCLUDED.employee_count,
	EXCLUDED.shift_count,
	EXCLUDED.planned_hours,
	EXCLUDED.planned_wage_cost,
	EXCLUDED.planned_shift_count
)",
	)
	.bind(row.location_id)
	.bind(row.work_date)
	.bind(row.team_id)
	.bind(row.total_hours_worked)
	.bind(row.total_wage_cost)
	.bind(row.employee_count)
	.bind(row.shift_count)
	.bind(row.planned_hours)
	.bind(row.planned_wage_cost)
	.bind(row.planned_shift_count)
	.bind(row.last_aggregated_at)
	.execute(executor)
	.await?;

	Ok(result.rows_affected() > 0)
}

pub async fn upsert_revenue_day<'e, E>(executor: E, row: &RevenueDayAggregate) -> Result<bool>
where
	E: PgExecutor<'e>,
{
	let result = sqlx::query(
		"\
INSERT INTO revenue_day_aggregates (
	location_id,
	revenue_date,
	total_revenue_excl_vat,
	total_revenue_incl_vat,
	total_vat,
	transaction_count,
	payment_methods,
	last_aggregated_at
)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
ON CONFLICT (location_id, revenue_date) DO UPDATE
SET
	total_revenue_excl_vat = EXCLUDED.total_revenue_excl_vat,
	total_revenue_incl_vat = EXCLUDED.total_revenue_incl_vat,
	total_vat = EXCLUDED.total_vat,
	transaction_count = EXCLUDED.transaction_count,
	payment_methods = EXCLUDED.payment_methods,
	last_aggregated_at = EXCLUDED.last_aggregated_at
WHERE (
	revenue_day_aggregates.total_revenue_excl_vat,
	revenue_day_aggregates.total_revenue_incl_vat,
	revenue_day_aggregates.total_vat,
	revenue_day_aggregates.transaction_count,
	revenue_day_aggregates.payment_methods
) IS DISTINCT FROM (
	EXCLUDED.total_revenue_excl_vat,
	EXCLUDED.total_revenue_incl_vat,
	EXCLUDED.total_vat,
	EXCLUDED.transaction_count,
	EXCLUDED.payment_methods
)",
	)
	.bind(row.location_id)
	.bind(row.revenue_date)
	.bind(row.total_revenue_excl_vat)
	.bind(row.total_revenue_incl_vat)
	.bind(row.total_vat)
	.bind(row.transaction_count)
	.bind(&row.payment_methods)
	.bind(row.last_aggregated_at)
	.execute(executor)
	.await?;

	Ok(result.rows_affected() > 0)
}

pub async fn upsert_sales_day<'e, E>(executor: E, row: &SalesDayAggregate) -> Result<bool>
where
	E: PgExecutor<'e>,
{
	let result = sqlx::query(
		"\
INSERT INTO sales_day_aggregates (
	location_id,
	sales_date,
	total_revenue_excl_vat,
	total_revenue_incl_vat,
	total_vat,
	total_cost_price,
	item_count,
	ticket_count,
	payment_methods,
	last_aggregated_at
)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
ON CONFLICT (location_id, sales_date) DO UPDATE
SET
	total_revenue_excl_vat = EXCLUDED.total_revenue_excl_vat,
	total_revenue_incl_vat = EXCLUDED.total_revenue_incl_vat,
	total_vat = EXCLUDED.total_vat,
	total_cost_price = EXCLUDED.total_cost_price,
	item_count = EXCLUDED.item_count,
	ticket_count = EXCLUDED.ticket_count,
	payment_methods = EXCLUDED.payment_methods,
	last_aggregated_at = EXCLUDED.last_aggregated_at
WHERE (
	sales_day_aggregates.total_revenue_excl_vat,
	sales_day_aggregates.total_revenue_incl_vat,
	sales_day_aggregates.total_vat,
	sales_day_aggregates.total_cost_price,
	sales_day_aggregates.item_count,
	sales_day_aggregates.ticket_count,
	sales_day_aggregates.payment_methods
) IS DISTINCT FROM (
	EXCLUDED.total_revenue_excl_vat,
	EXCLUDED.total_revenue_incl_vat,
	EXCLUDED.total_vat,
	EXCLUDED.total_cost_price,
	EXCLUDED.item_count,
	EXCLUDED.ticket_count,
	EXCLUDED.payment_methods
)",
	)
	.bind(row.location_id)
	.bind(row.sales_date)
	.bind(row.total_revenue_excl_vat)
	.bind(row.total_revenue_incl_vat)
	.bind(row.total_vat)
	.bind(row.total_cost_price)
	.bind(row.item_count)
	.bind(row.ticket_count)
	.bind(&row.payment_methods)
	.bind(row.last_aggregated_at)
	.execute(executor)
	.await?;

	Ok(result.rows_affected() > 0)
}

pub async fn upsert_sales_category_day<'e, E>(
	executor: E,
	row: &SalesCategoryDayAggregate,
) -> Result<bool>
where
	E: PgExecutor<'e>,
{
	let result = sqlx::query(
		"\
INSERT INTO sales_category_day_aggregates (
	location_id,
	sales_date,
	category,
	quantity,
	revenue_excl_vat,
	revenue_incl_vat,
	last_aggregated_at
)
VALUES ($1, $2, $3, $4, $5, $6, $7)
ON CONFLICT (location_id, sales_date, category) DO UPDATE
SET
	quantity = EXCLUDED.quantity,
	revenue_excl_vat = EXCLUDED.revenue_excl_vat,
	revenue_incl_vat = EXCLUDED.revenue_incl_vat,
	last_aggregated_at = EXCLUDED.last_aggregated_at
WHERE (
	sales_category_day_aggregates.quantity,
	sales_category_day_aggregates.revenue_excl_vat,
	sales_category_day_aggregates.revenue_incl_vat
) IS DISTINCT FROM (
	EXCLUDED.quantity,
	EXCLUDED.revenue_excl_vat,
	EXCLUDED.revenue_incl_vat
)",
	)
	.bind(row.location_id)
	.bind(row.sales_date)
	.bind(row.category.as_str())
	.bind(row.quantity)
	.bind(row.revenue_excl_vat)
	.bind(row.revenue_incl_vat)
	.bind(row.last_aggregated_at)
	.execute(executor)
	.await?;

	Ok(result.rows_affected() > 0)
}

/// Keys kept by a prune, as parallel arrays.
#[derive(Debug, Clone, Default)]
pub struct KeepKeys {
	pub location_ids: Vec<Uuid>,
	pub dates: Vec<Date>,
}
impl KeepKeys {
	pub fn push(&mut self, location_id: Uuid, date: Date) {
		self.location_ids.push(location_id);
		self.dates.push(date);
	}
}

#[derive(Debug, Clone, Default)]
pub struct KeepTeamKeys {
	pub location_ids: Vec<Uuid>,
	pub dates: Vec<Date>,
	pub team_ids: Vec<i64>,
}
impl KeepTeamKeys {
	pub fn push(&mut self, location_id: Uuid, date: Date, team_id: i64) {
		self.location_ids.push(location_id);
		self.dates.push(date);
		self.team_ids.push(team_id);
	}
}

#[derive(Debug, Clone, Default)]
pub struct KeepCategoryKeys {
	pub location_ids: Vec<Uuid>,
	pub dates: Vec<Date>,
	pub categories: Vec<String>,
}
impl KeepCategoryKeys {
	pub fn push(&mut self, location_id: Uuid, date: Date, category: &str) {
		self.location_ids.push(location_id);
		self.dates.push(date);
		self.categories.push(category.to_string());
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayTable {
	Labor,
	Revenue,
	Sales,
}
impl DayTable {
	fn table_and_date_column(self) -> (&'static str, &'static str) {
		match self {
			Self::Labor => ("labor_day_aggregates", "work_date"),
			Self::Revenue => ("revenue_day_aggregates", "revenue_date"),
			Self::Sales => ("sales_day_aggregates", "sales_date"),
		}
	}
}

/// Deletes (location, date) rows in range that are not in `keep`.
pub async fn prune_days<'e, E>(
	executor: E,
	table: DayTable,
	range: DateRange,
	location_id: Option<Uuid>,
	keep: &KeepKeys,
) -> Result<u64>
where
	E: PgExecutor<'e>,
{
	let (table, date_column) = table.table_and_date_column();
	let sql = format!(
		"\
DELETE FROM {table}
WHERE {date_column} BETWEEN $1 AND $2
	AND ($3::uuid IS NULL OR location_id = $3)
	AND (location_id, {date_column}) NOT IN (
		SELECT keep.location_id, keep.day
		FROM UNNEST($4::uuid[], $5::date[]) AS keep(location_id, day)
	)"
	);
	let result = sqlx::query(&sql)
		.bind(range.start)
		.bind(range.end)
		.bind(location_id)
		.bind(&keep.location_ids)
		.bind(&keep.dates)
		.execute(executor)
		.await?;

	Ok(result.rows_affected())
}

pub async fn prune_team_days<'e, E>(
	executor: E,
	range: DateRange,
	location_id: Option<Uuid>,
	keep: &KeepTeamKeys,
) -> Result<u64>
where
	E: PgExecutor<'e>,
{
	let result = sqlx::query(
		"\
DELETE FROM labor_team_day_aggregates
WHERE work_date BETWEEN $1 AND $2
	AND ($3::uuid IS NULL OR location_id = $3)
	AND (location_id, work_date, team_id) NOT IN (
		SELECT keep.location_id, keep.day, keep.team_id
		FROM UNNEST($4::uuid[], $5::date[], $6::bigint[]) AS keep(location_id, day, team_id)
	)",
	)
	.bind(range.start)
	.bind(range.end)
	.bind(location_id)
	.bind(&keep.location_ids)
	.bind(&keep.dates)
	.bind(&keep.team_ids)
	.execute(executor)
	.await?;

	Ok(result.rows_affected())
}

pub async fn prune_category_days<'e, E>(
	executor: E,
	range: DateRange,
	location_id: Option<Uuid>,
	keep: &KeepCategoryKeys,
) -> Result<u64>
where
	E: PgExecutor<'e>,
{
	let result = sqlx::query(
		"\
DELETE FROM sales_category_day_aggregates
WHERE sales_date BETWEEN $1 AND $2
	AND ($3::uuid IS NULL OR location_id = $3)
	AND (location_id, sales_date, category) NOT IN (
		SELECT keep.location_id, keep.day, keep.category
		FROM UNNEST($4::uuid[], $5::date[], $6::text[]) AS keep(location_id, day, category)
	)",
	)
	.bind(range.start)
	.bind(range.end)
	.bind(location_id)
	.bind(&keep.location_ids)
	.bind(&keep.dates)
	.bind(&keep.categories)
	.execute(executor)
	.await?;

	Ok(result.rows_affected())
}

pub async fn list_labor_days<'e, E>(
	executor: E,
	range: DateRange,
	location_id: Option<Uuid>,
) -> Result<Vec<LaborDayAggregate>>
where
	E: PgExecutor<'e>,
{
	let rows = sqlx::query_as::<_, LaborDayAggregate>(
		"\
SELECT
	location_id,
	work_date,
	total_hours_worked,
	total_wage_cost,
	employee_count,
	shift_count,
	planned_hours,
	planned_wage_cost,
	planned_shift_count,
	last_aggregated_at
FROM labor_day_aggregates
WHERE work_date BETWEEN $1 AND $2
	AND ($3::uuid IS NULL OR location_id = $3)
ORDER BY location_id, work_date",
	)
	.bind(range.start)
	.bind(range.end)
	.bind(location_id)
	.fetch_all(executor)
	.await?;

	Ok(rows)
}

pub async fn list_revenue_days<'e, E>(
	executor: E,
	range: DateRange,
	location_id: Option<Uuid>,
) -> Result<Vec<RevenueDayAggregate>>
where
	E: PgExecutor<'e>,
{
	let rows = sqlx::query_as::<_, RevenueDayAggregate>(
		"\
SELECT
	location_id,
	revenue_date,
	total_revenue_excl_vat,
	total_revenue_incl_vat,
	total_vat,
	transaction_count,
	payment_methods,
	last_aggregated_at
FROM revenue_day_aggregates
WHERE revenue_date BETWEEN $1 AND $2
	AND ($3::uuid IS NULL OR location_id = $3)
ORDER BY location_id, revenue_date",
	)
	.bind(range.start)
	.bind(range.end)
	.bind(location_id)
	.fetch_all(executor)
	.await?;

	Ok(rows)
}

pub async fn list_sales_days<'e, E>(
	executor: E,
	range: DateRange,
	location_id: Option<Uuid>,
) -> Result<Vec<SalesDayAggregate>>
where
	E: PgExecutor<'e>,
{
	let rows = sqlx::query_as::<_, SalesDayAggregate>(
		"\
SELECT
	location_id,
	sales_date,
	total_revenue_excl_vat,
	total_revenue_incl_vat,
	total_vat,
	total_cost_price,
	item_count,
	ticket_count,
	payment_methods,
	last_aggregated_at
FROM sales_day_aggregates
WHERE sales_date BETWEEN $1 AND $2
	AND ($3::uuid IS NULL OR location_id = $3)
ORDER BY location_id, sales_date",
	)
	.bind(range.start)
	.bind(range.end)
	.bind(location_id)
	.fetch_all(executor)
	.await?;

	Ok(rows)
}

pub async fn list_sales_categories<'e, E>(
	executor: E,
	range: DateRange,
	location_id: Option<Uuid>,
) -> Result<Vec<SalesCategoryDayAggregate>>
where
	E: PgExecutor<'e>,
{
	let rows = sqlx::query_as::<_, SalesCategoryDayAggregate>(
		"\
SELECT
	location_id,
	sales_date,
	category,
	quantity,
	revenue_excl_vat,
	revenue_incl_vat,
	last_aggregated_at
FROM sales_category_day_aggregates
WHERE sales_date BETWEEN $1 AND $2
	AND ($3::uuid IS NULL OR location_id = $3)
ORDER BY location_id, sales_date, category",
	)
	.bind(range.start)
	.bind(range.end)
	.bind(location_id)
	.fetch_all(executor)
	.await?;

	Ok(rows)
}
