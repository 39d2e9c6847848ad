use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub ranking: Ranking,
	pub scheduler: Scheduler,
	pub events: Events,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Service {
	/// `tracing_subscriber::EnvFilter` directive, e.g. "info,ranker_service=debug".
	pub log_level: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Storage {
	pub postgres: Postgres,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Postgres {
	pub dsn: String,
	pub pool_max_conns: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Ranking {
	/// COMPLETED snapshots older than this are due for a scheduled recalculation.
	#[serde(default = "default_freshness_window_hours")]
	pub freshness_window_hours: u32,
	#[serde(default = "default_top_k")]
	pub default_top_k: u32,
	#[serde(default = "default_max_top_k")]
	pub max_top_k: u32,
	/// A CALCULATING claim older than this may be taken over by another caller.
	#[serde(default = "default_calculation_lease_seconds")]
	pub calculation_lease_seconds: u32,
	#[serde(default)]
	pub bulk: RankingBulk,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RankingBulk {
	/// Width used for high priority batches. Normal uses half of it, low runs serially.
	pub max_concurrency: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Scheduler {
	pub sweep_interval_seconds: u32,
	pub sweep_batch_size: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Events {
	pub poll_interval_ms: u64,
	pub claim_lease_seconds: u32,
	pub max_attempts: u32,
}

impl Default for Ranking {
	fn default() -> Self {
		Self {
			freshness_window_hours: default_freshness_window_hours(),
			default_top_k: default_top_k(),
			max_top_k: default_max_top_k(),
			calculation_lease_seconds: default_calculation_lease_seconds(),
			bulk: RankingBulk::default(),
		}
	}
}

impl Default for RankingBulk {
	fn default() -> Self {
		Self { max_concurrency: 4 }
	}
}

fn default_freshness_window_hours() -> u32 {
	24
}

fn default_top_k() -> u32 {
	5
}

fn default_max_top_k() -> u32 {
	100
}

fn default_calculation_lease_seconds() -> u32 {
	900
}
