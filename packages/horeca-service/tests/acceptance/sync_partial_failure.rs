use std::sync::atomic::Ordering;

use time::macros::date;

use horeca_domain::{Endpoint, calendar::DateRange};
use horeca_service::{JobStage, ProgressAction, ProgressQuery, ProgressResponse, SyncRequest};
use horeca_storage::{aggregated, locations};

use super::{FAILING_DAY, StubEitje};

#[tokio::test]
#[ignore = "Requires external Postgres. Set HORECA_PG_DSN to run."]
async fn failed_day_is_reported_and_the_rest_is_aggregated_once() {
	let Some(test_db) = super::test_db().await else {
		eprintln!(
			"Skipping failed_day_is_reported_and_the_rest_is_aggregated_once; set HORECA_PG_DSN to run this test."
		);

		return;
	};
	let eitje = StubEitje::new(true);
	let service =
		super::build_service(super::test_config(test_db.dsn().to_string()), eitje.clone()).await;
	let range = DateRange { start: date!(2024 - 01 - 01), end: date!(2024 - 01 - 05) };
	let request = SyncRequest { start_date: range.start, end_date: range.end };
	let report = service
		.sync(Endpoint::TimeRegistrationShifts, request.clone())
		.await
		.expect("Sync failed.");

	assert!(report.success);
	assert!(report.error.is_none());
	assert_eq!(report.stage, JobStage::Done);
	assert_eq!(report.records_added, 4);
	assert_eq!(report.records_processed, 4);
	assert_eq!(report.last_sync_date, Some(date!(2024 - 01 - 05)));
	assert_eq!(report.errors.len(), 1);
	assert_eq!(report.errors[0].stage, JobStage::Fetching);
	assert_eq!(report.errors[0].date, Some(FAILING_DAY));
	assert_eq!(report.errors[0].attempts, 3);
	// Four good days plus three attempts at the failing one.
	assert_eq!(eitje.calls.load(Ordering::SeqCst), 7);

	let bea = locations::location_id_for("Bar Bea");
	let first = aggregated::list_labor_days(&service.db.pool, range, Some(bea))
		.await
		.expect("Failed to list labor aggregates.");

	assert_eq!(
		first.iter().map(|row| row.work_date).collect::<Vec<_>>(),
		vec![date!(2024 - 01 - 01), date!(2024 - 01 - 02), date!(2024 - 01 - 04), date!(2024 - 01 - 05)]
	);
	assert!(first.iter().all(|row| row.total_hours_worked == 8.0 && row.total_wage_cost == 120.0));
	assert!(first.iter().all(|row| row.employee_count == 1 && row.shift_count == 1));

	let rerun = service.aggregate_range(range, None).await.expect("Re-aggregation failed.");

	assert_eq!(rerun.rows_changed, 0);
	assert_eq!(rerun.rows_pruned, 0);

	let second = aggregated::list_labor_days(&service.db.pool, range, Some(bea))
		.await
		.expect("Failed to list labor aggregates.");

	assert_eq!(first, second);

	let resync =
		service.sync(Endpoint::TimeRegistrationShifts, request).await.expect("Second sync failed.");

	assert_eq!(resync.records_added, 0);
	assert_eq!(resync.records_unchanged, 4);
	assert_eq!(resync.aggregated, 0);

	let progress = service
		.progress(ProgressQuery {
			endpoint: Some(Endpoint::TimeRegistrationShifts),
			year: Some(2024),
			month: Some(1),
			action: ProgressAction::Monthly,
			date: None,
		})
		.await
		.expect("Progress failed.");
	let ProgressResponse::Monthly(progress) = progress else {
		panic!("Expected a monthly progress response.");
	};

	assert_eq!(progress.synced_days, 4);
	assert_eq!(progress.total_days, 31);
	assert!(!progress.is_complete);
	assert_eq!(
		progress.missing_ranges,
		vec![
			DateRange { start: FAILING_DAY, end: FAILING_DAY },
			DateRange { start: date!(2024 - 01 - 06), end: date!(2024 - 01 - 31) },
		]
	);

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set HORECA_PG_DSN to run."]
async fn sync_with_every_unit_failing_carries_a_top_level_error() {
	let Some(test_db) = super::test_db().await else {
		eprintln!(
			"Skipping sync_with_every_unit_failing_carries_a_top_level_error; set HORECA_PG_DSN to run this test."
		);

		return;
	};
	let service =
		super::build_service(super::test_config(test_db.dsn().to_string()), StubEitje::new(true))
			.await;
	let request = SyncRequest { start_date: FAILING_DAY, end_date: FAILING_DAY };
	let report =
		service.sync(Endpoint::TimeRegistrationShifts, request).await.expect("Sync failed.");

	assert!(!report.success);
	assert_eq!(report.stage, JobStage::Failed);
	assert_eq!(report.records_added, 0);
	assert!(report.error.as_deref().is_some_and(|error| error.contains("timed out")));

	let body = serde_json::to_value(&report).expect("Report should serialize.");

	assert_eq!(body["success"], false);
	assert!(body["error"].is_string());
	assert_eq!(body["errors"].as_array().map(Vec::len), Some(1));

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}
