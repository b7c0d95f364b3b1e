use std::sync::Arc;

use horeca_service::HorecaService;
use horeca_storage::db::Db;

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<HorecaService>,
}
impl AppState {
	pub async fn new(config: horeca_config::Config) -> color_eyre::Result<Self> {
		let db = Db::connect(&config.storage.postgres).await?;

		db.ensure_schema().await?;

		Ok(Self::from_service(HorecaService::new(config, db)))
	}

	pub fn from_service(service: HorecaService) -> Self {
		Self { service: Arc::new(service) }
	}
}
