use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	sibyl_cli::run(sibyl_cli::Args::parse()).await
}
