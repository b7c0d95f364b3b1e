use std::sync::atomic::Ordering;

use time::macros::date;

use horeca_domain::Endpoint;
use horeca_service::SyncRequest;

use super::StubEitje;

#[tokio::test]
#[ignore = "Requires external Postgres. Set HORECA_PG_DSN to run."]
async fn backfill_fills_every_gap_of_a_past_month() {
	let Some(test_db) = super::test_db().await else {
		eprintln!(
			"Skipping backfill_fills_every_gap_of_a_past_month; set HORECA_PG_DSN to run this test."
		);

		return;
	};
	let eitje = StubEitje::new(true);
	let service =
		super::build_service(super::test_config(test_db.dsn().to_string()), eitje.clone()).await;
	let seeded = service
		.sync(
			Endpoint::TimeRegistrationShifts,
			SyncRequest { start_date: date!(2024 - 01 - 01), end_date: date!(2024 - 01 - 05) },
		)
		.await
		.expect("Seeding sync failed.");

	assert_eq!(seeded.errors.len(), 1);

	eitje.failing.store(false, Ordering::SeqCst);

	let report = service
		.backfill_month(Endpoint::TimeRegistrationShifts, 2024, 1)
		.await
		.expect("Backfill failed.");

	assert!(report.success());
	assert_eq!(report.ranges.len(), 2);
	assert_eq!(report.reports.iter().map(|sync| sync.records_added).sum::<u64>(), 27);

	let progress = service
		.monthly_progress(Endpoint::TimeRegistrationShifts, 2024, 1)
		.await
		.expect("Progress failed.");

	assert!(progress.is_complete);
	assert_eq!(progress.synced_days, 31);
	assert!(progress.missing_ranges.is_empty());

	let again = service
		.backfill_month(Endpoint::TimeRegistrationShifts, 2024, 1)
		.await
		.expect("Second backfill failed.");

	assert!(again.ranges.is_empty());
	assert!(again.reports.is_empty());

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}
