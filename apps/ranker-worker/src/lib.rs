pub mod worker;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use ranker_service::RankingService;
use ranker_storage::db::Db;

#[derive(Debug, Parser)]
#[command(
	version = ranker_cli::VERSION,
	rename_all = "kebab",
	styles = ranker_cli::styles(),
)]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: std::path::PathBuf,
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = ranker_config::load(&args.config)?;
	let filter = EnvFilter::try_new(&config.service.log_level)
		.unwrap_or_else(|_| EnvFilter::new("info"));

	tracing_subscriber::fmt().with_env_filter(filter).init();

	let db = Db::connect(&config.storage.postgres).await?;

	db.ensure_schema().await?;

	let state = worker::WorkerState {
		service: RankingService::with_postgres(config.ranking, db.clone()),
		db,
		scheduler: config.scheduler,
		events: config.events,
	};

	worker::run_worker(state).await
}
