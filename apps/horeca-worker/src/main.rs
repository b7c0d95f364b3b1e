use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = horeca_worker::Args::parse();

	horeca_worker::run(args).await
}
