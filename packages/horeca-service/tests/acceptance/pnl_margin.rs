use time::OffsetDateTime;
use uuid::Uuid;

use horeca_service::{Error, PnlAggregateRequest};
use horeca_storage::{locations, models::PnlLedgerEntry, pnl};

use super::StubEitje;

fn ledger_row(location_id: Uuid, category: &str, gl_account: &str, amount: f64) -> PnlLedgerEntry {
	PnlLedgerEntry {
		entry_id: Uuid::new_v4(),
		location_id,
		year: 2024,
		month: 3,
		category: category.to_string(),
		subcategory: None,
		gl_account: Some(gl_account.to_string()),
		amount,
		imported_at: OffsetDateTime::now_utc(),
	}
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set HORECA_PG_DSN to run."]
async fn monthly_summary_reports_discrepancies_beyond_the_margin() {
	let Some(test_db) = super::test_db().await else {
		eprintln!(
			"Skipping monthly_summary_reports_discrepancies_beyond_the_margin; set HORECA_PG_DSN to run this test."
		);

		return;
	};
	let cfg = super::test_config(test_db.dsn().to_string());
	let service = super::build_service(cfg, StubEitje::new(false)).await;
	let mut conn = service.db.pool.acquire().await.expect("Failed to acquire connection.");

	locations::sync_locations(&mut conn, &service.cfg.locations, OffsetDateTime::now_utc())
		.await
		.expect("Failed to register locations.");

	drop(conn);

	let bea = locations::location_id_for("Bar Bea");

	for entry in [
		ledger_row(bea, "Omzet", "8000", 100_000.0),
		ledger_row(bea, "Omzet", "8000", 100_000.0),
		ledger_row(bea, "Inkoopwaarde", "7000", -40_000.0),
		ledger_row(bea, "Personeelskosten", "4000", -30_000.0),
		ledger_row(bea, "Huisvestingskosten", "4300", -25_000.0),
	] {
		pnl::insert_ledger_entry(&service.db.pool, &entry).await.expect("Failed to insert ledger row.");
	}

	let request = PnlAggregateRequest {
		location_id: bea,
		year: Some(2024),
		month: Some(3),
		aggregate_all: false,
		reference_resultaat: Some(5_200.0),
	};
	let off = service.pnl_aggregate(request.clone()).await.expect("P&L aggregation failed.");

	assert_eq!(off.discrepancies, 1);
	assert_eq!(off.months.len(), 1);
	assert_eq!(off.months[0].totals.resultaat, 5_000.0);
	assert_eq!(off.months[0].totals.duplicates_skipped, 1);
	assert!(off.months[0].changed);

	let close = service
		.pnl_aggregate(PnlAggregateRequest { reference_resultaat: Some(5_040.0), ..request.clone() })
		.await
		.expect("P&L aggregation failed.");

	assert_eq!(close.discrepancies, 0);
	assert!(close.months[0].changed);

	let stored = pnl::get_monthly_summary(&service.db.pool, bea, 2024, 3)
		.await
		.expect("Failed to read summary.")
		.expect("Summary should exist.");

	assert_eq!(stored.within_margin, Some(true));
	assert_eq!(stored.percentage_difference, Some(0.8));
	assert_eq!(stored.duplicates_skipped, 1);

	let repeat = service
		.pnl_aggregate(PnlAggregateRequest { reference_resultaat: Some(5_040.0), ..request.clone() })
		.await
		.expect("P&L aggregation failed.");

	assert!(!repeat.months[0].changed);

	let all = service
		.pnl_aggregate(PnlAggregateRequest {
			year: None,
			month: None,
			aggregate_all: true,
			reference_resultaat: None,
			..request
		})
		.await
		.expect("P&L aggregation failed.");

	assert_eq!(all.months.len(), 1);
	assert!(all.months[0].margin.is_none());

	let unknown = service
		.pnl_aggregate(PnlAggregateRequest {
			location_id: Uuid::new_v4(),
			year: Some(2024),
			month: Some(3),
			aggregate_all: false,
			reference_resultaat: None,
		})
		.await;

	assert!(matches!(unknown, Err(Error::NotFound { .. })));

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}
