//! Processed to aggregated rollups.
//!
//! Every key touched in range is recomputed from the full processed fact set; previous aggregate
//! rows are never read back as input.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::{
	HorecaService, Result,
	sync::{JobStage, SyncError},
};
use horeca_domain::{
	Endpoint,
	calendar::DateRange,
	rollup::{self, LaborFact, LaborRollup, RevenueFact, SalesLineFact},
};
use horeca_storage::{
	aggregated::{self, DayTable, KeepCategoryKeys, KeepKeys, KeepTeamKeys},
	models::{
		LaborDayAggregate, LaborTeamDayAggregate, ProcessedRecord, RevenueDayAggregate,
		SalesCategoryDayAggregate, SalesDayAggregate,
	},
	processed,
};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateReport {
	pub range: DateRange,
	pub location_id: Option<Uuid>,
	/// Keys recomputed across all rollup tables.
	pub rows_computed: u64,
	/// Rows inserted or rewritten because a value changed.
	pub rows_changed: u64,
	pub rows_pruned: u64,
	pub errors: Vec<SyncError>,
}

/// Rows derived from one processed snapshot, in key order.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct DayRows {
	pub(crate) labor: Vec<LaborDayAggregate>,
	pub(crate) labor_teams: Vec<LaborTeamDayAggregate>,
	pub(crate) revenue: Vec<RevenueDayAggregate>,
	pub(crate) sales: Vec<SalesDayAggregate>,
	pub(crate) sales_categories: Vec<SalesCategoryDayAggregate>,
}
impl DayRows {
	fn len(&self) -> usize {
		self.labor.len()
			+ self.labor_teams.len()
			+ self.revenue.len()
			+ self.sales.len()
			+ self.sales_categories.len()
	}
}

type DayKey = (Uuid, Date);

impl HorecaService {
	/// Recomputes every rollup in range, optionally for one location only.
	pub async fn aggregate_range(
		&self,
		range: DateRange,
		location_id: Option<Uuid>,
	) -> Result<AggregateReport> {
		let records =
			processed::list_processed_in_range(&self.db.pool, &Endpoint::ALL, range, location_id)
				.await?;
		let now = OffsetDateTime::now_utc();
		let (rows, errors) = derive_day_rows(&records, now);
		let mut changed = 0;
		let mut pruned = 0;
		let mut tx = self.db.pool.begin().await?;
		let mut labor_keys = KeepKeys::default();
		let mut team_keys = KeepTeamKeys::default();
		let mut revenue_keys = KeepKeys::default();
		let mut sales_keys = KeepKeys::default();
		let mut category_keys = KeepCategoryKeys::default();

		for row in &rows.labor {
			labor_keys.push(row.location_id, row.work_date);

			changed += u64::from(aggregated::upsert_labor_day(&mut *tx, row).await?);
		}
		for row in &rows.labor_teams {
			team_keys.push(row.location_id, row.work_date, row.team_id);

			changed += u64::from(aggregated::upsert_labor_team_day(&mut *tx, row).await?);
		}
		for row in &rows.revenue {
			revenue_keys.push(row.location_id, row.revenue_date);

			changed += u64::from(aggregated::upsert_revenue_day(&mut *tx, row).await?);
		}
		for row in &rows.sales {
			sales_keys.push(row.location_id, row.sales_date);

			changed += u64::from(aggregated::upsert_sales_day(&mut *tx, row).await?);
		}
		for row in &rows.sales_categories {
			category_keys.push(row.location_id, row.sales_date, &row.category);

			changed += u64::from(aggregated::upsert_sales_category_day(&mut *tx, row).await?);
		}

		pruned +=
			aggregated::prune_days(&mut *tx, DayTable::Labor, range, location_id, &labor_keys).await?;
		pruned += aggregated::prune_team_days(&mut *tx, range, location_id, &team_keys).await?;
		pruned +=
			aggregated::prune_days(&mut *tx, DayTable::Revenue, range, location_id, &revenue_keys)
				.await?;
		pruned +=
			aggregated::prune_days(&mut *tx, DayTable::Sales, range, location_id, &sales_keys).await?;
		pruned += aggregated::prune_category_days(&mut *tx, range, location_id, &category_keys).await?;

		tx.commit().await?;

		tracing::info!(
			start = %range.start,
			end = %range.end,
			processed = records.len(),
			rows = rows.len(),
			changed,
			pruned,
			"Aggregation finished."
		);

		Ok(AggregateReport {
			range,
			location_id,
			rows_computed: rows.len() as u64,
			rows_changed: changed,
			rows_pruned: pruned,
			errors,
		})
	}
}

/// Groups processed facts per (location, date) and rolls each family up.
pub(crate) fn derive_day_rows(
	records: &[ProcessedRecord],
	now: OffsetDateTime,
) -> (DayRows, Vec<SyncError>) {
	let mut labor: BTreeMap<DayKey, Vec<LaborFact>> = BTreeMap::new();
	let mut revenue: BTreeMap<DayKey, Vec<RevenueFact>> = BTreeMap::new();
	let mut sales: BTreeMap<DayKey, Vec<SalesLineFact>> = BTreeMap::new();
	let mut errors = Vec::new();

	for record in records {
		let key = (record.location_id, record.record_date);
		let endpoint = match record.endpoint.parse::<Endpoint>() {
			Ok(endpoint) => endpoint,
			Err(err) => {
				errors.push(SyncError {
					stage: JobStage::Aggregating,
					kind: "parse",
					date: Some(record.record_date),
					location: Some(record.location_id.to_string()),
					attempts: 1,
					message: err.to_string(),
				});

				continue;
			},
		};

		match endpoint {
			Endpoint::TimeRegistrationShifts | Endpoint::PlanningShifts =>
				labor.entry(key).or_default().push(LaborFact {
					team_id: record.team_id,
					user_id: record.user_id,
					hours_worked: record.hours_worked.unwrap_or(0.0),
					wage_cost: record.wage_cost.unwrap_or(0.0),
					planned: endpoint == Endpoint::PlanningShifts,
				}),
			Endpoint::RevenueDays => revenue.entry(key).or_default().push(RevenueFact {
				revenue_excl_vat: record.revenue_excl_vat.unwrap_or(0.0),
				revenue_incl_vat: record.revenue_incl_vat.unwrap_or(0.0),
				vat_amount: record.vat_amount.unwrap_or(0.0),
				transaction_count: record.transaction_count.unwrap_or(0),
				payment_methods: payment_pairs(record.payment_methods.as_ref()),
			}),
			Endpoint::BorkTicketDay => sales.entry(key).or_default().push(SalesLineFact {
				ticket_ref: record.ticket_ref.clone().unwrap_or_default(),
				category: record.category.clone(),
				quantity: record.quantity.unwrap_or(0.0),
				revenue_excl_vat: record.revenue_excl_vat.unwrap_or(0.0),
				revenue_incl_vat: record.revenue_incl_vat.unwrap_or(0.0),
				vat_amount: record.vat_amount.unwrap_or(0.0),
				cost_price: record.cost_price.unwrap_or(0.0),
				payment_method: record.payment_method.clone(),
			}),
		}
	}

	let mut rows = DayRows::default();

	for ((location_id, work_date), facts) in &labor {
		rows.labor.push(labor_row(*location_id, *work_date, &rollup::rollup_labor(facts), now));

		for (team_id, team) in rollup::rollup_labor_by_team(facts) {
			let day = labor_row(*location_id, *work_date, &team, now);

			rows.labor_teams.push(LaborTeamDayAggregate {
				location_id: day.location_id,
				work_date: day.work_date,
				team_id,
				total_hours_worked: day.total_hours_worked,
				total_wage_cost: day.total_wage_cost,
				employee_count: day.employee_count,
				shift_count: day.shift_count,
				planned_hours: day.planned_hours,
				planned_wage_cost: day.planned_wage_cost,
				planned_shift_count: day.planned_shift_count,
				last_aggregated_at: now,
			});
		}
	}
	for ((location_id, revenue_date), facts) in &revenue {
		let rollup = rollup::rollup_revenue(facts);

		rows.revenue.push(RevenueDayAggregate {
			location_id: *location_id,
			revenue_date: *revenue_date,
			total_revenue_excl_vat: rollup.total_revenue_excl_vat,
			total_revenue_incl_vat: rollup.total_revenue_incl_vat,
			total_vat: rollup.total_vat,
			transaction_count: rollup.transaction_count,
			payment_methods: amounts_object(&rollup.payment_methods),
			last_aggregated_at: now,
		});
	}
	for ((location_id, sales_date), lines) in &sales {
		let rollup = rollup::rollup_sales(lines);

		rows.sales.push(SalesDayAggregate {
			location_id: *location_id,
			sales_date: *sales_date,
			total_revenue_excl_vat: rollup.total_revenue_excl_vat,
			total_revenue_incl_vat: rollup.total_revenue_incl_vat,
			total_vat: rollup.total_vat,
			total_cost_price: rollup.total_cost_price,
			item_count: rollup.item_count,
			ticket_count: rollup.ticket_count,
			payment_methods: amounts_object(&rollup.payment_methods),
			last_aggregated_at: now,
		});

		for (category, totals) in rollup.categories {
			rows.sales_categories.push(SalesCategoryDayAggregate {
				location_id: *location_id,
				sales_date: *sales_date,
				category,
				quantity: totals.quantity,
				revenue_excl_vat: totals.revenue_excl_vat,
				revenue_incl_vat: totals.revenue_incl_vat,
				last_aggregated_at: now,
			});
		}
	}

	(rows, errors)
}

fn labor_row(
	location_id: Uuid,
	work_date: Date,
	rollup: &LaborRollup,
	now: OffsetDateTime,
) -> LaborDayAggregate {
	LaborDayAggregate {
		location_id,
		work_date,
		total_hours_worked: rollup.total_hours_worked,
		total_wage_cost: rollup.total_wage_cost,
		employee_count: rollup.employee_count,
		shift_count: rollup.shift_count,
		planned_hours: rollup.planned_hours,
		planned_wage_cost: rollup.planned_wage_cost,
		planned_shift_count: rollup.planned_shift_count,
		last_aggregated_at: now,
	}
}

fn payment_pairs(value: Option<&Value>) -> Vec<(String, f64)> {
	let Some(Value::Object(map)) = value else {
		return Vec::new();
	};

	map.iter().filter_map(|(method, amount)| Some((method.clone(), amount.as_f64()?))).collect()
}

fn amounts_object(amounts: &BTreeMap<String, f64>) -> Value {
	let mut map = Map::new();

	for (key, amount) in amounts {
		map.insert(key.clone(), Value::from(*amount));
	}

	Value::Object(map)
}

#[cfg(test)]
mod tests {
	use serde_json::json;
	use time::macros::{date, datetime};

	use super::*;

	fn base(endpoint: Endpoint, id: u8, location_id: Uuid, date: Date) -> ProcessedRecord {
		ProcessedRecord {
			processed_id: Uuid::from_bytes([id; 16]),
			endpoint: endpoint.as_str().to_string(),
			record_date: date,
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
			source_raw_id: Uuid::nil(),
			processed_at: datetime!(2024-01-06 03:00 UTC),
		}
	}

	fn shift(
		id: u8,
		location_id: Uuid,
		user: i64,
		team: i64,
		hours: f64,
		planned: bool,
	) -> ProcessedRecord {
		let endpoint =
			if planned { Endpoint::PlanningShifts } else { Endpoint::TimeRegistrationShifts };
		let mut record = base(endpoint, id, location_id, date!(2024 - 01 - 05));

		record.user_id = Some(user);
		record.team_id = Some(team);
		record.hours_worked = Some(hours);
		record.wage_cost = Some(hours * 15.0);

		record
	}

	#[test]
	fn labor_rollups_split_registered_and_planned() {
		let bea = Uuid::from_bytes([9; 16]);
		let records = vec![
			shift(1, bea, 7, 1, 6.5, false),
			shift(2, bea, 8, 1, 4.0, false),
			shift(3, bea, 7, 2, 1.5, false),
			shift(4, bea, 9, 2, 5.0, true),
		];
		let now = datetime!(2024-01-06 04:00 UTC);
		let (rows, errors) = derive_day_rows(&records, now);

		assert!(errors.is_empty());
		assert_eq!(rows.labor.len(), 1);
		assert_eq!(rows.labor[0].total_hours_worked, 12.0);
		assert_eq!(rows.labor[0].employee_count, 2);
		assert_eq!(rows.labor[0].shift_count, 3);
		assert_eq!(rows.labor[0].planned_hours, 5.0);
		assert_eq!(rows.labor_teams.len(), 2);
		assert_eq!(rows.labor_teams[1].team_id, 2);
		assert_eq!(rows.labor_teams[1].planned_shift_count, 1);
	}

	#[test]
	fn sales_and_revenue_roll_up_per_location_and_day() {
		let bea = Uuid::from_bytes([9; 16]);
		let kins = Uuid::from_bytes([3; 16]);
		let mut pils = base(Endpoint::BorkTicketDay, 1, bea, date!(2024 - 01 - 05));

		pils.ticket_ref = Some("7".to_string());
		pils.category = Some("Bier".to_string());
		pils.quantity = Some(2.0);
		pils.revenue_incl_vat = Some(7.0);
		pils.payment_method = Some("PIN".to_string());

		let mut nuts = pils.clone();

		nuts.processed_id = Uuid::from_bytes([2; 16]);
		nuts.category = None;
		nuts.quantity = Some(1.0);
		nuts.revenue_incl_vat = Some(3.0);

		let mut day = base(Endpoint::RevenueDays, 5, kins, date!(2024 - 01 - 05));

		day.revenue_excl_vat = Some(1000.0);
		day.revenue_incl_vat = Some(1090.0);
		day.payment_methods = Some(json!({ "pin": 800.0, "Cash": 290.0 }));

		let (rows, _) = derive_day_rows(&[pils, nuts, day], datetime!(2024-01-06 04:00 UTC));

		assert_eq!(rows.sales.len(), 1);
		assert_eq!(rows.sales[0].ticket_count, 1);
		assert_eq!(rows.sales[0].item_count, 3.0);
		assert_eq!(rows.sales[0].payment_methods, json!({ "pin": 10.0 }));
		assert_eq!(rows.sales_categories.len(), 2);
		assert_eq!(rows.revenue.len(), 1);
		assert_eq!(rows.revenue[0].location_id, kins);
		assert_eq!(rows.revenue[0].payment_methods, json!({ "cash": 290.0, "pin": 800.0 }));
	}

	#[test]
	fn identical_input_yields_identical_rows() {
		let bea = Uuid::from_bytes([9; 16]);
		let records = vec![shift(1, bea, 7, 1, 6.5, false), shift(2, bea, 8, 1, 4.25, true)];
		let now = datetime!(2024-01-06 04:00 UTC);

		assert_eq!(derive_day_rows(&records, now), derive_day_rows(&records, now));
	}
}
