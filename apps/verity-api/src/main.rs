use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = verity_api::Args::parse();

	verity_api::run(args).await
}
