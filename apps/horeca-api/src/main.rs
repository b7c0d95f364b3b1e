use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = horeca_api::Args::parse();

	horeca_api::run(args).await
}
