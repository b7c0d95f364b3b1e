use serde_json::json;
use time::{OffsetDateTime, macros::date};

use horeca_config::{Location, Postgres};
use horeca_domain::calendar::DateRange;
use horeca_storage::{
	aggregated,
	db::Db,
	locations,
	models::{RevenueDayAggregate, SalesCategoryDayAggregate, SalesDayAggregate},
};
use horeca_testkit::TestDatabase;

async fn test_db() -> Option<(TestDatabase, Db)> {
	let base_dsn = horeca_testkit::env_dsn()?;
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let cfg = Postgres { dsn: test_db.dsn().to_string(), pool_max_conns: 2 };
	let db = Db::connect(&cfg).await.expect("Failed to connect to Postgres.");

	db.ensure_schema().await.expect("Failed to ensure schema.");

	Some((test_db, db))
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set HORECA_PG_DSN to run."]
async fn unchanged_rollups_are_not_rewritten() {
	let Some((test_db, db)) = test_db().await else {
		eprintln!("Skipping unchanged_rollups_are_not_rewritten; set HORECA_PG_DSN to run this test.");

		return;
	};
	let now = OffsetDateTime::now_utc();
	let mut conn = db.pool.acquire().await.expect("Failed to acquire connection.");
	let known = locations::sync_locations(
		&mut conn,
		&[Location { name: "Bar Bea".to_string(), eitje_environment_ids: vec![101], bork: None }],
		now,
	)
	.await
	.expect("Failed to register locations.");

	drop(conn);

	let bea = known[0].location_id;
	let day = date!(2024 - 02 - 10);
	let revenue = RevenueDayAggregate {
		location_id: bea,
		revenue_date: day,
		total_revenue_excl_vat: 1_000.0,
		total_revenue_incl_vat: 1_090.0,
		total_vat: 90.0,
		transaction_count: 42,
		payment_methods: json!({ "pin": 900.0, "cash": 190.0 }),
		last_aggregated_at: now,
	};
	let sales = SalesDayAggregate {
		location_id: bea,
		sales_date: day,
		total_revenue_excl_vat: 500.0,
		total_revenue_incl_vat: 545.0,
		total_vat: 45.0,
		total_cost_price: 120.0,
		item_count: 37.0,
		ticket_count: 12,
		payment_methods: json!({ "pin": 545.0 }),
		last_aggregated_at: now,
	};
	let category = SalesCategoryDayAggregate {
		location_id: bea,
		sales_date: day,
		category: "Bier".to_string(),
		quantity: 20.0,
		revenue_excl_vat: 90.0,
		revenue_incl_vat: 109.0,
		last_aggregated_at: now,
	};

	assert!(aggregated::upsert_revenue_day(&db.pool, &revenue).await.expect("Revenue upsert."));
	assert!(aggregated::upsert_sales_day(&db.pool, &sales).await.expect("Sales upsert."));
	assert!(
		aggregated::upsert_sales_category_day(&db.pool, &category).await.expect("Category upsert.")
	);

	let later = now + time::Duration::minutes(5);

	assert!(
		!aggregated::upsert_revenue_day(&db.pool, &RevenueDayAggregate {
			last_aggregated_at: later,
			..revenue.clone()
		})
		.await
		.expect("Repeat revenue upsert.")
	);
	assert!(
		!aggregated::upsert_sales_day(&db.pool, &SalesDayAggregate {
			last_aggregated_at: later,
			..sales.clone()
		})
		.await
		.expect("Repeat sales upsert.")
	);
	assert!(
		aggregated::upsert_sales_category_day(&db.pool, &SalesCategoryDayAggregate {
			quantity: 21.0,
			last_aggregated_at: later,
			..category.clone()
		})
		.await
		.expect("Changed category upsert.")
	);

	let february = DateRange { start: date!(2024 - 02 - 01), end: date!(2024 - 02 - 29) };
	let revenue_rows = aggregated::list_revenue_days(&db.pool, february, Some(bea))
		.await
		.expect("Failed to list revenue days.");
	let sales_rows =
		aggregated::list_sales_days(&db.pool, february, None).await.expect("Failed to list sales.");
	let category_rows = aggregated::list_sales_categories(&db.pool, february, Some(bea))
		.await
		.expect("Failed to list categories.");

	assert_eq!(revenue_rows.len(), 1);
	assert_eq!(revenue_rows[0].transaction_count, 42);
	assert_eq!(revenue_rows[0].payment_methods, revenue.payment_methods);
	assert!(revenue_rows[0].last_aggregated_at < later);
	assert_eq!(sales_rows.len(), 1);
	assert_eq!(sales_rows[0].ticket_count, 12);
	assert!(sales_rows[0].last_aggregated_at < later);
	assert_eq!(category_rows.len(), 1);
	assert_eq!(category_rows[0].quantity, 21.0);

	let march = DateRange { start: date!(2024 - 03 - 01), end: date!(2024 - 03 - 31) };

	assert!(
		aggregated::list_revenue_days(&db.pool, march, None)
			.await
			.expect("Failed to list revenue days.")
			.is_empty()
	);

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}
