mod acceptance {
	mod backfill;
	mod pnl_margin;
	mod sync_partial_failure;

	use std::sync::{
		Arc,
		atomic::{AtomicBool, AtomicUsize, Ordering},
	};

	use serde_json::json;
	use time::{Date, macros::date};

	use horeca_domain::{Endpoint, time_serde};
	use horeca_providers::{
		Page,
		bork::BorkTicket,
		eitje::{EitjeEnvironment, EitjeRecord, EitjeShift},
	};
	use horeca_service::{BorkSource, BoxFuture, EitjeSource, HorecaService, Sources};
	use horeca_storage::db::Db;
	use horeca_testkit::TestDatabase;

	pub const BAR_BEA_ENVIRONMENT: i64 = 101;
	pub const FAILING_DAY: Date = date!(2024 - 01 - 03);

	pub async fn test_db() -> Option<TestDatabase> {
		let base_dsn = horeca_testkit::env_dsn()?;
		let db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");

		Some(db)
	}

	pub fn test_config(dsn: String) -> horeca_config::Config {
		horeca_config::Config {
			service: horeca_config::Service {
				http_bind: "127.0.0.1:0".to_string(),
				log_level: "info".to_string(),
				utc_offset_minutes: 60,
			},
			storage: horeca_config::Storage {
				postgres: horeca_config::Postgres { dsn, pool_max_conns: 4 },
			},
			eitje: Some(horeca_config::Eitje {
				base_url: "http://eitje.invalid".to_string(),
				partner_username: "partner".to_string(),
				partner_password: "secret".to_string(),
				api_username: "api".to_string(),
				api_password: "secret".to_string(),
				timeout_ms: 5_000,
			}),
			bork: horeca_config::Bork::default(),
			locations: vec![
				horeca_config::Location {
					name: "Bar Bea".to_string(),
					eitje_environment_ids: vec![BAR_BEA_ENVIRONMENT],
					bork: None,
				},
				horeca_config::Location {
					name: "Van Kinsbergen".to_string(),
					eitje_environment_ids: Vec::new(),
					bork: None,
				},
			],
			sync: horeca_config::Sync {
				max_attempts: 3,
				base_backoff_ms: 0,
				max_backoff_ms: 0,
				request_delay_ms: 0,
				max_range_days: 31,
				max_concurrent_lanes: 2,
			},
			progress: horeca_config::Progress::default(),
			pnl: horeca_config::Pnl::default(),
			schedule: horeca_config::Schedule::default(),
		}
	}

	pub async fn build_service(cfg: horeca_config::Config, eitje: Arc<StubEitje>) -> HorecaService {
		let db = Db::connect(&cfg.storage.postgres).await.expect("Failed to connect to Postgres.");

		db.ensure_schema().await.expect("Failed to ensure schema.");

		HorecaService::with_sources(cfg, db, Sources::new(eitje, Arc::new(QuietBork)))
	}

	/// One eight-hour shift per day at Bar Bea. The failing day times out while `failing` is set.
	pub struct StubEitje {
		pub failing: AtomicBool,
		pub calls: AtomicUsize,
	}
	impl StubEitje {
		pub fn new(failing: bool) -> Arc<Self> {
			Arc::new(Self { failing: AtomicBool::new(failing), calls: AtomicUsize::new(0) })
		}
	}
	impl EitjeSource for StubEitje {
		fn fetch_environments<'a>(
			&'a self,
			_cfg: &'a horeca_config::Eitje,
		) -> BoxFuture<'a, horeca_providers::Result<Vec<EitjeEnvironment>>> {
			Box::pin(async {
				Ok(vec![EitjeEnvironment { id: BAR_BEA_ENVIRONMENT, name: "Bar-Bea BV".to_string() }])
			})
		}

		fn fetch_day<'a>(
			&'a self,
			_cfg: &'a horeca_config::Eitje,
			endpoint: Endpoint,
			day: Date,
		) -> BoxFuture<'a, horeca_providers::Result<Page<EitjeRecord>>> {
			self.calls.fetch_add(1, Ordering::SeqCst);

			let failing = day == FAILING_DAY && self.failing.load(Ordering::SeqCst);

			Box::pin(async move {
				if failing {
					return Err(horeca_providers::Error::Timeout {
						url: "http://eitje.invalid/time_registration_shifts".to_string(),
					});
				}
				if endpoint != Endpoint::TimeRegistrationShifts {
					return Ok(Page::empty());
				}

				let shift: EitjeShift = serde_json::from_value(json!({
					"id": 10_000 + i64::from(day.ordinal()),
					"user_id": 7,
					"team_id": 3,
					"hours_worked": 8.0,
					"wage_cost": 120.0,
					"date": time_serde::format_date(day),
					"environment_id": BAR_BEA_ENVIRONMENT,
				}))
				.expect("Stub shift should parse.");

				Ok(Page { items: vec![EitjeRecord::Shift(shift)], rejected: Vec::new() })
			})
		}
	}

	pub struct QuietBork;
	impl BorkSource for QuietBork {
		fn fetch_ticket_day<'a>(
			&'a self,
			_cfg: &'a horeca_config::Bork,
			_location: &'a horeca_config::BorkLocation,
			_day: Date,
		) -> BoxFuture<'a, horeca_providers::Result<Page<BorkTicket>>> {
			Box::pin(async { Ok(Page::empty()) })
		}
	}
}
