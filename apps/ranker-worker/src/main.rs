use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;
	let args = ranker_worker::Args::parse();
	ranker_worker::run(args).await
}
