pub mod worker;

mod error;

pub use error::{Error, Result};

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use horeca_domain::Endpoint;
use horeca_service::HorecaService;
use horeca_storage::db::Db;

#[derive(Debug, Parser)]
#[command(
	version = horeca_cli::VERSION,
	rename_all = "kebab",
	styles = horeca_cli::styles(),
)]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: PathBuf,
	#[command(subcommand)]
	pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
	/// Run the scheduled sync loop. This is the default.
	Run,
	/// Sync every missing day of one endpoint and month, then exit.
	Backfill {
		#[arg(long)]
		endpoint: Endpoint,
		#[arg(long)]
		year: i32,
		#[arg(long, value_parser = clap::value_parser!(u8).range(1..=12))]
		month: u8,
	},
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = horeca_config::load(&args.config)?;
	let filter =
		EnvFilter::try_new(&config.service.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

	tracing_subscriber::fmt().with_env_filter(filter).init();

	let db = Db::connect(&config.storage.postgres).await?;

	db.ensure_schema().await?;

	let service = HorecaService::new(config, db);

	match args.command.unwrap_or(Command::Run) {
		Command::Run => {
			let state = worker::WorkerState::new(service)?;

			worker::run_scheduler(state).await?;
		},
		Command::Backfill { endpoint, year, month } => {
			let report = service.backfill_month(endpoint, year, month).await?;
			let errors: usize = report.reports.iter().map(|sync| sync.errors.len()).sum();

			tracing::info!(
				endpoint = %endpoint,
				year,
				month,
				windows = report.ranges.len(),
				errors,
				success = report.success(),
				"Backfill finished."
			);
		},
	}

	Ok(())
}
