use std::collections::BTreeSet;

use time::{Date, macros::date};

use horeca_domain::{
	Endpoint,
	calendar::{self, DateRange},
	location_match::{self, MatchStrategy},
	pnl::{self, LedgerRow},
};

fn days(year_month: (i32, time::Month), day_numbers: impl IntoIterator<Item = u8>) -> BTreeSet<Date> {
	day_numbers
		.into_iter()
		.map(|day| {
			Date::from_calendar_date(year_month.0, year_month.1, day).expect("Valid test date.")
		})
		.collect()
}

fn ledger(category: &str, amount: f64) -> LedgerRow {
	LedgerRow {
		category: category.to_string(),
		subcategory: None,
		gl_account: None,
		amount,
	}
}

#[test]
fn month_with_gap_reports_one_missing_range() {
	let processed = days((2024, time::Month::January), (1..=10).chain(15..=31));
	let progress = calendar::monthly_progress(
		Endpoint::TimeRegistrationShifts,
		2024,
		1,
		date!(2024 - 03 - 01),
		&processed,
		&processed,
	)
	.expect("Valid month.");

	assert_eq!(
		progress.missing_ranges,
		vec![DateRange { start: date!(2024 - 01 - 11), end: date!(2024 - 01 - 14) }]
	);
	assert_eq!(progress.synced_days, 27);
	assert_eq!(progress.total_days, 31);
	assert!(!progress.is_complete);
}

#[test]
fn fully_covered_month_is_complete() {
	let processed = days((2024, time::Month::April), 1..=30);
	let progress = calendar::monthly_progress(
		Endpoint::RevenueDays,
		2024,
		4,
		date!(2024 - 06 - 15),
		&BTreeSet::new(),
		&processed,
	)
	.expect("Valid month.");

	assert!(progress.is_complete);
	assert!(progress.missing_ranges.is_empty());
	assert_eq!(progress.synced_days, 30);
	assert_eq!(progress.raw_days, 0);
}

#[test]
fn current_month_counts_up_to_today_only() {
	let processed = days((2024, time::Month::May), 1..=9);
	let progress = calendar::monthly_progress(
		Endpoint::BorkTicketDay,
		2024,
		5,
		date!(2024 - 05 - 10),
		&processed,
		&processed,
	)
	.expect("Valid month.");

	assert_eq!(progress.total_days, 10);
	assert_eq!(
		progress.missing_ranges,
		vec![DateRange { start: date!(2024 - 05 - 10), end: date!(2024 - 05 - 10) }]
	);
}

#[test]
fn future_month_is_empty_and_incomplete() {
	let progress = calendar::monthly_progress(
		Endpoint::PlanningShifts,
		2030,
		1,
		date!(2024 - 05 - 10),
		&BTreeSet::new(),
		&BTreeSet::new(),
	)
	.expect("Valid month.");

	assert_eq!(progress.total_days, 0);
	assert!(!progress.is_complete);
}

#[test]
fn punctuated_vendor_name_matches_canonical_location() {
	let locations = ["Van Kinsbergen", "Bar Bea", "L'Amour Toujours"];
	let hit = location_match::match_location("Bar-Bea", &locations).expect("Expected a match.");

	assert_eq!(hit.index, 1);
	assert_eq!(hit.strategy, MatchStrategy::Normalized);
}

#[test]
fn duplicate_ledger_tuples_are_summed_once() {
	let rows = vec![
		ledger("Overige bedrijfskosten A", -10_158.0),
		ledger("Overige bedrijfskosten A", -10_158.0),
		ledger("Overige bedrijfskosten B", -14_790.0),
		ledger("Overige bedrijfskosten B", -14_790.0),
	];
	let totals = pnl::compute_totals(&rows);

	assert_eq!(totals.other_costs, -24_948.0);
	assert_eq!(totals.duplicates_skipped, 2);
}

#[test]
fn resultaat_margin_accepts_small_and_rejects_large_differences() {
	let rows = vec![
		ledger("Netto-omzet", 100_000.0),
		ledger("Kostprijs van de omzet", -40_000.0),
		ledger("Personeelskosten", -30_000.0),
		ledger("Overige bedrijfskosten", -25_000.0),
	];
	let totals = pnl::compute_totals(&rows);

	assert_eq!(totals.resultaat, 5_000.0);

	let close = pnl::validate_margin(totals.resultaat, 5_040.0, 1.0);

	assert_eq!(close.percentage_difference, 0.8);
	assert!(close.within_margin);

	let far = pnl::validate_margin(totals.resultaat, 5_200.0, 1.0);

	assert_eq!(far.percentage_difference, 4.0);
	assert!(!far.within_margin);
}
