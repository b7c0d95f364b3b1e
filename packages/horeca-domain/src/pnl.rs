//! Profit-and-loss bucketing.
//!
//! Ledger amounts are signed: revenue is positive, costs are negative. The bucket of a ledger row
//! is decided by one static rule table, first on the category/subcategory text and then on the
//! general-ledger account number.

use std::collections::HashSet;

use serde::Serialize;

use crate::rollup::round_cents;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PnlBucket {
	Revenue,
	CostOfSales,
	Labor,
	OtherCosts,
	FinancialItems,
	/// Ledger-reported bottom line. Used as a reference value, never summed into the result.
	Result,
}

/// Keyword rules, matched in order against the lowercased category, then subcategory.
pub const CATEGORY_RULES: &[(&str, PnlBucket)] = &[
	("financ", PnlBucket::FinancialItems),
	("rente", PnlBucket::FinancialItems),
	("interest", PnlBucket::FinancialItems),
	("resultaat", PnlBucket::Result),
	("net result", PnlBucket::Result),
	("kostprijs", PnlBucket::CostOfSales),
	("inkoop", PnlBucket::CostOfSales),
	("cost of sales", PnlBucket::CostOfSales),
	("cost of goods", PnlBucket::CostOfSales),
	("personeel", PnlBucket::Labor),
	("lonen", PnlBucket::Labor),
	("salaris", PnlBucket::Labor),
	("sociale lasten", PnlBucket::Labor),
	("pensioen", PnlBucket::Labor),
	("labor", PnlBucket::Labor),
	("labour", PnlBucket::Labor),
	("wages", PnlBucket::Labor),
	("huisvesting", PnlBucket::OtherCosts),
	("afschrijving", PnlBucket::OtherCosts),
	("overige kosten", PnlBucket::OtherCosts),
	("marketing", PnlBucket::OtherCosts),
	("energie", PnlBucket::OtherCosts),
	("onderhoud", PnlBucket::OtherCosts),
	("kosten", PnlBucket::OtherCosts),
	("expenses", PnlBucket::OtherCosts),
	("costs", PnlBucket::OtherCosts),
	("omzet", PnlBucket::Revenue),
	("opbrengst", PnlBucket::Revenue),
	("revenue", PnlBucket::Revenue),
	("turnover", PnlBucket::Revenue),
	("sales", PnlBucket::Revenue),
];

/// Inclusive ranges over the leading four digits of a general-ledger account.
pub const GL_ACCOUNT_RULES: &[(u32, u32, PnlBucket)] = &[
	(4000, 4199, PnlBucket::Labor),
	(4200, 4899, PnlBucket::OtherCosts),
	(4900, 4999, PnlBucket::FinancialItems),
	(7000, 7999, PnlBucket::CostOfSales),
	(8000, 8999, PnlBucket::Revenue),
];

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerRow {
	pub category: String,
	pub subcategory: Option<String>,
	pub gl_account: Option<String>,
	pub amount: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PnlTotals {
	pub revenue: f64,
	pub cost_of_sales: f64,
	pub labor: f64,
	pub other_costs: f64,
	pub financial_items: f64,
	pub resultaat: f64,
	/// Sum of ledger rows that state the result themselves, when any exist.
	pub ledger_resultaat: Option<f64>,
	pub duplicates_skipped: u32,
	pub unmapped: Vec<LedgerRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarginCheck {
	pub calculated: f64,
	pub reference: f64,
	pub difference: f64,
	pub percentage_difference: f64,
	pub margin_percent: f64,
	pub within_margin: bool,
}

pub fn classify(category: &str, subcategory: Option<&str>, gl_account: Option<&str>) -> Option<PnlBucket> {
	for text in [Some(category), subcategory].into_iter().flatten() {
		let lowered = text.trim().to_lowercase();

		if lowered.is_empty() {
			continue;
		}
		if let Some((_, bucket)) =
			CATEGORY_RULES.iter().find(|(keyword, _)| lowered.contains(keyword))
		{
			return Some(*bucket);
		}
	}

	let account = gl_account_prefix(gl_account?)?;

	GL_ACCOUNT_RULES
		.iter()
		.find(|(start, end, _)| (*start..=*end).contains(&account))
		.map(|(_, _, bucket)| *bucket)
}

/// Keeps the first occurrence of each (category, subcategory, gl_account, amount) tuple.
///
/// Re-imported ledgers can repeat rows verbatim; summing both copies would double the bucket.
pub fn dedupe_ledger(rows: &[LedgerRow]) -> (Vec<&LedgerRow>, u32) {
	let mut seen = HashSet::new();
	let mut kept = Vec::with_capacity(rows.len());
	let mut skipped = 0;

	for row in rows {
		let key = (
			row.category.as_str(),
			row.subcategory.as_deref(),
			row.gl_account.as_deref(),
			amount_cents(row.amount),
		);

		if seen.insert(key) {
			kept.push(row);
		} else {
			skipped += 1;
		}
	}

	(kept, skipped)
}

pub fn compute_totals(rows: &[LedgerRow]) -> PnlTotals {
	let (kept, duplicates_skipped) = dedupe_ledger(rows);
	let mut totals = PnlTotals { duplicates_skipped, ..PnlTotals::default() };
	let mut ledger_resultaat: Option<f64> = None;

	for row in kept {
		match classify(&row.category, row.subcategory.as_deref(), row.gl_account.as_deref()) {
			Some(PnlBucket::Revenue) => totals.revenue += row.amount,
			Some(PnlBucket::CostOfSales) => totals.cost_of_sales += row.amount,
			Some(PnlBucket::Labor) => totals.labor += row.amount,
			Some(PnlBucket::OtherCosts) => totals.other_costs += row.amount,
			Some(PnlBucket::FinancialItems) => totals.financial_items += row.amount,
			Some(PnlBucket::Result) => *ledger_resultaat.get_or_insert(0.0) += row.amount,
			None => totals.unmapped.push(row.clone()),
		}
	}

	totals.revenue = round_cents(totals.revenue);
	totals.cost_of_sales = round_cents(totals.cost_of_sales);
	totals.labor = round_cents(totals.labor);
	totals.other_costs = round_cents(totals.other_costs);
	totals.financial_items = round_cents(totals.financial_items);
	totals.resultaat = resultaat(
		totals.revenue,
		totals.cost_of_sales,
		totals.labor,
		totals.other_costs,
		totals.financial_items,
	);
	totals.ledger_resultaat = ledger_resultaat.map(round_cents);

	totals
}

pub fn resultaat(
	revenue: f64,
	cost_of_sales: f64,
	labor: f64,
	other_costs: f64,
	financial_items: f64,
) -> f64 {
	round_cents(revenue + cost_of_sales + labor + other_costs + financial_items)
}

/// Compares a computed result to an externally supplied one.
///
/// The relative difference is taken against the computed value. A computed value of zero only
/// validates against a zero reference.
pub fn validate_margin(calculated: f64, reference: f64, margin_percent: f64) -> MarginCheck {
	let difference = round_cents((calculated - reference).abs());
	let percentage_difference = if calculated.abs() < 0.005 {
		if difference < 0.005 { 0.0 } else { 100.0 }
	} else {
		(difference / calculated.abs() * 100.0 * 100.0).round() / 100.0
	};

	MarginCheck {
		calculated,
		reference,
		difference,
		percentage_difference,
		margin_percent,
		within_margin: percentage_difference <= margin_percent,
	}
}

fn amount_cents(amount: f64) -> i64 {
	(amount * 100.0).round() as i64
}

fn gl_account_prefix(raw: &str) -> Option<u32> {
	let digits: String = raw.trim().chars().take_while(char::is_ascii_digit).take(4).collect();

	if digits.len() < 4 {
		return None;
	}

	digits.parse().ok()
}
