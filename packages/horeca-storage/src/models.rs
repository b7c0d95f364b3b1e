use serde_json::Value;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LocationRow {
	pub location_id: Uuid,
	pub name: String,
	pub eitje_environment_ids: Vec<i64>,
	pub has_bork: bool,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RawRecord {
	pub raw_id: Uuid,
	pub endpoint: String,
	pub external_id: Option<String>,
	pub record_date: Date,
	pub location_ref: Option<String>,
	pub payload: Value,
	pub payload_hash: String,
	pub ingested_at: OffsetDateTime,
}

/// Normalized row. Which optional columns are set depends on the endpoint.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct ProcessedRecord {
	pub processed_id: Uuid,
	pub endpoint: String,
	pub record_date: Date,
	pub location_id: Uuid,
	pub team_id: Option<i64>,
	pub user_id: Option<i64>,
	pub hours_worked: Option<f64>,
	pub wage_cost: Option<f64>,
	pub revenue_excl_vat: Option<f64>,
	pub revenue_incl_vat: Option<f64>,
	pub vat_amount: Option<f64>,
	pub quantity: Option<f64>,
	pub product_name: Option<String>,
	pub category: Option<String>,
	pub payment_method: Option<String>,
	pub ticket_ref: Option<String>,
	pub transaction_count: Option<i64>,
	pub cost_price: Option<f64>,
	pub payment_methods: Option<Value>,
	pub source_raw_id: Uuid,
	pub processed_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct LaborDayAggregate {
	pub location_id: Uuid,
	pub work_date: Date,
	pub total_hours_worked: f64,
	pub total_wage_cost: f64,
	pub employee_count: i32,
	pub shift_count: i32,
	pub planned_hours: f64,
	pub planned_wage_cost: f64,
	pub planned_shift_count: i32,
	pub last_aggregated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct LaborTeamDayAggregate {
	pub location_id: Uuid,
	pub work_date: Date,
	pub team_id: i64,
	pub total_hours_worked: f64,
	pub total_wage_cost: f64,
	pub employee_count: i32,
	pub shift_count: i32,
	pub planned_hours: f64,
	pub planned_wage_cost: f64,
	pub planned_shift_count: i32,
	pub last_aggregated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct RevenueDayAggregate {
	pub location_id: Uuid,
	pub revenue_date: Date,
	pub total_revenue_excl_vat: f64,
	pub total_revenue_incl_vat: f64,
	pub total_vat: f64,
	pub transaction_count: i64,
	pub payment_methods: Value,
	pub last_aggregated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct SalesDayAggregate {
	pub location_id: Uuid,
	pub sales_date: Date,
	pub total_revenue_excl_vat: f64,
	pub total_revenue_incl_vat: f64,
	pub total_vat: f64,
	pub total_cost_price: f64,
	pub item_count: f64,
	pub ticket_count: i32,
	pub payment_methods: Value,
	pub last_aggregated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct SalesCategoryDayAggregate {
	pub location_id: Uuid,
	pub sales_date: Date,
	pub category: String,
	pub quantity: f64,
	pub revenue_excl_vat: f64,
	pub revenue_incl_vat: f64,
	pub last_aggregated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct PnlLedgerEntry {
	pub entry_id: Uuid,
	pub location_id: Uuid,
	pub year: i32,
	pub month: i32,
	pub category: String,
	pub subcategory: Option<String>,
	pub gl_account: Option<String>,
	pub amount: f64,
	pub imported_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct PnlMonthlySummary {
	pub location_id: Uuid,
	pub year: i32,
	pub month: i32,
	pub revenue: f64,
	pub cost_of_sales: f64,
	pub labor: f64,
	pub other_costs: f64,
	pub financial_items: f64,
	pub resultaat: f64,
	pub ledger_resultaat: Option<f64>,
	pub reference_resultaat: Option<f64>,
	pub percentage_difference: Option<f64>,
	pub within_margin: Option<bool>,
	pub unmapped_rows: i32,
	pub duplicates_skipped: i32,
	pub last_aggregated_at: OffsetDateTime,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ScheduleState {
	pub endpoint: String,
	pub last_run_at: Option<OffsetDateTime>,
	pub next_run_at: Option<OffsetDateTime>,
	pub last_status: Option<String>,
	pub last_error: Option<String>,
	pub updated_at: OffsetDateTime,
}
