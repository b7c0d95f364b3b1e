//! Monthly profit-and-loss summaries from imported ledger rows.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{Error, HorecaService, Result};
use horeca_domain::{
	calendar,
	pnl::{self, LedgerRow, MarginCheck, PnlTotals},
};
use horeca_storage::{
	locations,
	models::{PnlLedgerEntry, PnlMonthlySummary},
	pnl as pnl_store,
};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PnlAggregateRequest {
	pub location_id: Uuid,
	/// Required for a single month. Narrows `aggregate_all` to one year when present.
	#[serde(default)]
	pub year: Option<i32>,
	#[serde(default)]
	pub month: Option<u8>,
	#[serde(default)]
	pub aggregate_all: bool,
	/// Externally reported result for a single month. Ledger "resultaat" lines are used when absent.
	#[serde(default)]
	pub reference_resultaat: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PnlAggregateResponse {
	pub success: bool,
	pub location_id: Uuid,
	pub months: Vec<PnlMonthReport>,
	/// Months whose result is outside the accepted margin.
	pub discrepancies: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PnlMonthReport {
	pub year: i32,
	pub month: u8,
	pub ledger_rows: usize,
	pub totals: PnlTotals,
	pub margin: Option<MarginCheck>,
	pub changed: bool,
}

impl HorecaService {
	pub async fn pnl_aggregate(&self, req: PnlAggregateRequest) -> Result<PnlAggregateResponse> {
		let single = match (req.aggregate_all, req.year, req.month) {
			(true, _, _) => None,
			(false, Some(year), Some(month)) => {
				calendar::month_from_number(month)?;

				Some((year, month))
			},
			(false, _, _) =>
				return Err(Error::InvalidRequest {
					message: "Either year and month or aggregateAll is required.".to_string(),
				}),
		};

		if locations::get_location(&self.db.pool, req.location_id).await?.is_none() {
			return Err(Error::NotFound {
				message: format!("Location {} is not known.", req.location_id),
			});
		}

		let periods: Vec<(i32, u8)> = match single {
			Some(period) => vec![period],
			None => pnl_store::list_ledger_periods(&self.db.pool, req.location_id, req.year)
				.await?
				.into_iter()
				.filter_map(|(year, month)| Some((year, u8::try_from(month).ok()?)))
				.collect(),
		};
		let reference = if req.aggregate_all { None } else { req.reference_resultaat };
		let now = OffsetDateTime::now_utc();
		let mut reports = Vec::with_capacity(periods.len());
		let mut discrepancies = 0;

		for (year, month) in periods {
			let entries =
				pnl_store::list_ledger_entries(&self.db.pool, req.location_id, year, i32::from(month))
					.await?;
			let (summary, mut report) = summarize_month(
				req.location_id,
				year,
				month,
				&entries,
				reference,
				self.cfg.pnl.margin_percent,
				now,
			);

			report.changed = pnl_store::upsert_monthly_summary(&self.db.pool, &summary).await?;

			if let Some(check) = report.margin.as_ref().filter(|check| !check.within_margin) {
				discrepancies += 1;

				tracing::warn!(
					location_id = %req.location_id,
					year,
					month,
					calculated = check.calculated,
					reference = check.reference,
					percentage_difference = check.percentage_difference,
					"P&L result outside margin."
				);
			}
			if !report.totals.unmapped.is_empty() {
				tracing::warn!(
					location_id = %req.location_id,
					year,
					month,
					unmapped = report.totals.unmapped.len(),
					"Ledger rows without a P&L bucket."
				);
			}

			reports.push(report);
		}

		Ok(PnlAggregateResponse {
			success: true,
			location_id: req.location_id,
			months: reports,
			discrepancies,
		})
	}
}

pub(crate) fn summarize_month(
	location_id: Uuid,
	year: i32,
	month: u8,
	entries: &[PnlLedgerEntry],
	reference: Option<f64>,
	margin_percent: f64,
	now: OffsetDateTime,
) -> (PnlMonthlySummary, PnlMonthReport) {
	let rows: Vec<LedgerRow> = entries
		.iter()
		.map(|entry| LedgerRow {
			category: entry.category.clone(),
			subcategory: entry.subcategory.clone(),
			gl_account: entry.gl_account.clone(),
			amount: entry.amount,
		})
		.collect();
	let totals = pnl::compute_totals(&rows);
	let reference = reference.or(totals.ledger_resultaat);
	let margin = reference.map(|reference| pnl::validate_margin(totals.resultaat, reference, margin_percent));
	let summary = PnlMonthlySummary {
		location_id,
		year,
		month: i32::from(month),
		revenue: totals.revenue,
		cost_of_sales: totals.cost_of_sales,
		labor: totals.labor,
		other_costs: totals.other_costs,
		financial_items: totals.financial_items,
		resultaat: totals.resultaat,
		ledger_resultaat: totals.ledger_resultaat,
		reference_resultaat: reference,
		percentage_difference: margin.as_ref().map(|check| check.percentage_difference),
		within_margin: margin.as_ref().map(|check| check.within_margin),
		unmapped_rows: totals.unmapped.len() as i32,
		duplicates_skipped: totals.duplicates_skipped as i32,
		last_aggregated_at: now,
	};
	let report =
		PnlMonthReport { year, month, ledger_rows: entries.len(), totals, margin, changed: false };

	(summary, report)
}

#[cfg(test)]
mod tests {
	use time::macros::datetime;

	use super::*;

	fn entry(index: u8, category: &str, gl_account: Option<&str>, amount: f64) -> PnlLedgerEntry {
		PnlLedgerEntry {
			entry_id: Uuid::from_bytes([index; 16]),
			location_id: Uuid::nil(),
			year: 2024,
			month: 3,
			category: category.to_string(),
			subcategory: None,
			gl_account: gl_account.map(str::to_string),
			amount,
			imported_at: datetime!(2024-04-02 09:00 UTC),
		}
	}

	fn march() -> Vec<PnlLedgerEntry> {
		vec![
			entry(1, "Omzet", Some("8000"), 100_000.0),
			entry(2, "Inkoopwaarde", Some("7000"), -40_000.0),
			entry(3, "Personeelskosten", Some("4000"), -30_000.0),
			entry(4, "Huisvestingskosten", Some("4300"), -25_000.0),
		]
	}

	#[test]
	fn caller_reference_is_checked_against_the_margin() {
		let now = datetime!(2024-04-02 10:00 UTC);
		let (summary, report) = summarize_month(Uuid::nil(), 2024, 3, &march(), Some(5_040.0), 1.0, now);

		assert_eq!(summary.resultaat, 5_000.0);
		assert_eq!(summary.within_margin, Some(true));
		assert_eq!(report.margin.map(|check| check.percentage_difference), Some(0.8));

		let (summary, _) = summarize_month(Uuid::nil(), 2024, 3, &march(), Some(5_200.0), 1.0, now);

		assert_eq!(summary.percentage_difference, Some(4.0));
		assert_eq!(summary.within_margin, Some(false));
	}

	#[test]
	fn ledger_result_lines_are_the_fallback_reference() {
		let mut entries = march();

		entries.push(entry(5, "Resultaat", None, 4_990.0));
		entries.push(entry(6, "Omzet", Some("8000"), 100_000.0));

		let (summary, report) =
			summarize_month(Uuid::nil(), 2024, 3, &entries, None, 1.0, datetime!(2024-04-02 10:00 UTC));

		assert_eq!(summary.duplicates_skipped, 1);
		assert_eq!(summary.revenue, 100_000.0);
		assert_eq!(summary.reference_resultaat, Some(4_990.0));
		assert_eq!(summary.within_margin, Some(true));
		assert_eq!(report.ledger_rows, 6);
	}

	#[test]
	fn months_without_reference_skip_validation() {
		let (summary, report) =
			summarize_month(Uuid::nil(), 2024, 3, &march(), None, 1.0, datetime!(2024-04-02 10:00 UTC));

		assert!(report.margin.is_none());
		assert_eq!(summary.within_margin, None);
		assert_eq!(summary.unmapped_rows, 0);
	}
}
