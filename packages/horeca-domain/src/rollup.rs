//! Deterministic per-(location, date) rollups.
//!
//! Every function here recomputes from the full fact set it is handed; callers must pass every
//! processed fact in scope for the key, never a previous rollup. Sums are rounded so repeated runs
//! over identically ordered input produce identical values.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

pub const UNCATEGORIZED: &str = "Uncategorized";
pub const UNKNOWN_PAYMENT_METHOD: &str = "unknown";

#[derive(Debug, Clone, PartialEq)]
pub struct LaborFact {
	pub team_id: Option<i64>,
	pub user_id: Option<i64>,
	pub hours_worked: f64,
	pub wage_cost: f64,
	pub planned: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LaborRollup {
	pub total_hours_worked: f64,
	pub total_wage_cost: f64,
	pub employee_count: i32,
	pub shift_count: i32,
	pub planned_hours: f64,
	pub planned_wage_cost: f64,
	pub planned_shift_count: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RevenueFact {
	pub revenue_excl_vat: f64,
	pub revenue_incl_vat: f64,
	pub vat_amount: f64,
	pub transaction_count: i64,
	pub payment_methods: Vec<(String, f64)>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RevenueRollup {
	pub total_revenue_excl_vat: f64,
	pub total_revenue_incl_vat: f64,
	pub total_vat: f64,
	pub transaction_count: i64,
	pub payment_methods: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SalesLineFact {
	pub ticket_ref: String,
	pub category: Option<String>,
	pub quantity: f64,
	pub revenue_excl_vat: f64,
	pub revenue_incl_vat: f64,
	pub vat_amount: f64,
	pub cost_price: f64,
	pub payment_method: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CategoryRollup {
	pub quantity: f64,
	pub revenue_excl_vat: f64,
	pub revenue_incl_vat: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SalesRollup {
	pub total_revenue_excl_vat: f64,
	pub total_revenue_incl_vat: f64,
	pub total_vat: f64,
	pub total_cost_price: f64,
	pub item_count: f64,
	pub ticket_count: i32,
	pub payment_methods: BTreeMap<String, f64>,
	pub categories: BTreeMap<String, CategoryRollup>,
}

pub fn rollup_labor(facts: &[LaborFact]) -> LaborRollup {
	let mut out = LaborRollup::default();
	let mut users = BTreeSet::new();

	for fact in facts {
		if fact.planned {
			out.planned_hours += fact.hours_worked;
			out.planned_wage_cost += fact.wage_cost;
			out.planned_shift_count += 1;

			continue;
		}

		out.total_hours_worked += fact.hours_worked;
		out.total_wage_cost += fact.wage_cost;
		out.shift_count += 1;

		if let Some(user_id) = fact.user_id {
			users.insert(user_id);
		}
	}

	out.employee_count = users.len() as i32;
	out.total_hours_worked = round_hours(out.total_hours_worked);
	out.total_wage_cost = round_cents(out.total_wage_cost);
	out.planned_hours = round_hours(out.planned_hours);
	out.planned_wage_cost = round_cents(out.planned_wage_cost);

	out
}

/// Per-team rollups. Facts without a team only count toward the location-wide rollup.
pub fn rollup_labor_by_team(facts: &[LaborFact]) -> BTreeMap<i64, LaborRollup> {
	let mut grouped: BTreeMap<i64, Vec<LaborFact>> = BTreeMap::new();

	for fact in facts {
		if let Some(team_id) = fact.team_id {
			grouped.entry(team_id).or_default().push(fact.clone());
		}
	}

	grouped.into_iter().map(|(team_id, facts)| (team_id, rollup_labor(&facts))).collect()
}

pub fn rollup_revenue(facts: &[RevenueFact]) -> RevenueRollup {
	let mut out = RevenueRollup::default();

	for fact in facts {
		out.total_revenue_excl_vat += fact.revenue_excl_vat;
		out.total_revenue_incl_vat += fact.revenue_incl_vat;
		out.total_vat += fact.vat_amount;
		out.transaction_count += fact.transaction_count;

		for (method, amount) in &fact.payment_methods {
			*out.payment_methods.entry(payment_label(Some(method))).or_default() += amount;
		}
	}

	out.total_revenue_excl_vat = round_cents(out.total_revenue_excl_vat);
	out.total_revenue_incl_vat = round_cents(out.total_revenue_incl_vat);
	out.total_vat = round_cents(out.total_vat);

	for amount in out.payment_methods.values_mut() {
		*amount = round_cents(*amount);
	}

	out
}

pub fn rollup_sales(lines: &[SalesLineFact]) -> SalesRollup {
	let mut out = SalesRollup::default();
	let mut tickets = BTreeSet::new();

	for line in lines {
		out.total_revenue_excl_vat += line.revenue_excl_vat;
		out.total_revenue_incl_vat += line.revenue_incl_vat;
		out.total_vat += line.vat_amount;
		out.total_cost_price += line.cost_price;
		out.item_count += line.quantity;

		tickets.insert(line.ticket_ref.as_str());

		*out.payment_methods.entry(payment_label(line.payment_method.as_deref())).or_default() +=
			line.revenue_incl_vat;

		let category = line
			.category
			.as_deref()
			.map(str::trim)
			.filter(|value| !value.is_empty())
			.unwrap_or(UNCATEGORIZED)
			.to_string();
		let entry = out.categories.entry(category).or_default();

		entry.quantity += line.quantity;
		entry.revenue_excl_vat += line.revenue_excl_vat;
		entry.revenue_incl_vat += line.revenue_incl_vat;
	}

	out.ticket_count = tickets.len() as i32;
	out.total_revenue_excl_vat = round_cents(out.total_revenue_excl_vat);
	out.total_revenue_incl_vat = round_cents(out.total_revenue_incl_vat);
	out.total_vat = round_cents(out.total_vat);
	out.total_cost_price = round_cents(out.total_cost_price);
	out.item_count = round_hours(out.item_count);

	for amount in out.payment_methods.values_mut() {
		*amount = round_cents(*amount);
	}
	for category in out.categories.values_mut() {
		category.quantity = round_hours(category.quantity);
		category.revenue_excl_vat = round_cents(category.revenue_excl_vat);
		category.revenue_incl_vat = round_cents(category.revenue_incl_vat);
	}

	out
}

pub fn round_cents(value: f64) -> f64 {
	(value * 100.0).round() / 100.0
}

pub fn round_hours(value: f64) -> f64 {
	(value * 10_000.0).round() / 10_000.0
}

fn payment_label(method: Option<&str>) -> String {
	method
		.map(|value| value.trim().to_lowercase())
		.filter(|value| !value.is_empty())
		.unwrap_or_else(|| UNKNOWN_PAYMENT_METHOD.to_string())
}

#[cfg(test)]
mod tests {
	use super::*;

	fn shift(team: Option<i64>, user: Option<i64>, hours: f64, cost: f64, planned: bool) -> LaborFact {
		LaborFact { team_id: team, user_id: user, hours_worked: hours, wage_cost: cost, planned }
	}

	#[test]
	fn labor_counts_distinct_users_and_separates_planning() {
		let facts = vec![
			shift(Some(1), Some(10), 4.0, 60.0, false),
			shift(Some(1), Some(10), 3.5, 52.5, false),
			shift(Some(2), Some(11), 8.0, 120.0, false),
			shift(Some(2), Some(12), 6.0, 90.0, true),
		];
		let rollup = rollup_labor(&facts);

		assert_eq!(rollup.total_hours_worked, 15.5);
		assert_eq!(rollup.total_wage_cost, 232.5);
		assert_eq!(rollup.employee_count, 2);
		assert_eq!(rollup.shift_count, 3);
		assert_eq!(rollup.planned_hours, 6.0);
		assert_eq!(rollup.planned_shift_count, 1);

		let by_team = rollup_labor_by_team(&facts);

		assert_eq!(by_team.len(), 2);
		assert_eq!(by_team[&1].shift_count, 2);
		assert_eq!(by_team[&2].planned_shift_count, 1);
	}

	#[test]
	fn sales_group_by_category_and_count_tickets_once() {
		let line = |ticket: &str, category: Option<&str>, qty: f64, incl: f64, method: &str| {
			SalesLineFact {
				ticket_ref: ticket.to_string(),
				category: category.map(str::to_string),
				quantity: qty,
				revenue_excl_vat: round_cents(incl / 1.09),
				revenue_incl_vat: incl,
				vat_amount: round_cents(incl - incl / 1.09),
				cost_price: 0.0,
				payment_method: Some(method.to_string()),
			}
		};
		let rollup = rollup_sales(&[
			line("1", Some("Bier"), 2.0, 10.0, "PIN"),
			line("1", Some("Bier"), 1.0, 5.0, "pin"),
			line("2", None, 1.0, 3.5, "Cash"),
		]);

		assert_eq!(rollup.ticket_count, 2);
		assert_eq!(rollup.item_count, 4.0);
		assert_eq!(rollup.total_revenue_incl_vat, 18.5);
		assert_eq!(rollup.payment_methods["pin"], 15.0);
		assert_eq!(rollup.payment_methods["cash"], 3.5);
		assert_eq!(rollup.categories["Bier"].quantity, 3.0);
		assert_eq!(rollup.categories[UNCATEGORIZED].revenue_incl_vat, 3.5);
	}

	#[test]
	fn recomputing_the_same_facts_is_stable() {
		let facts = vec![RevenueFact {
			revenue_excl_vat: 0.1,
			revenue_incl_vat: 0.2,
			vat_amount: 0.1,
			transaction_count: 3,
			payment_methods: vec![("Cash".to_string(), 0.1), ("cash".to_string(), 0.2)],
		}];

		assert_eq!(rollup_revenue(&facts), rollup_revenue(&facts));
		assert_eq!(rollup_revenue(&facts).payment_methods["cash"], 0.3);
	}
}
