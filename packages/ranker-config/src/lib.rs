mod error;
mod types;

pub use error::{Error, Result};
pub use types::{Config, Events, Postgres, Ranking, RankingBulk, Scheduler, Service, Storage};

use std::{fs, path::Path};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.log_level.is_empty() {
		return Err(Error::Validation {
			message: "service.log_level must be non-empty.".to_string(),
		});
	}
	if cfg.storage.postgres.dsn.is_empty() {
		return Err(Error::Validation {
			message: "storage.postgres.dsn must be non-empty.".to_string(),
		});
	}
	if cfg.storage.postgres.pool_max_conns == 0 {
		return Err(Error::Validation {
			message: "storage.postgres.pool_max_conns must be greater than zero.".to_string(),
		});
	}
	if cfg.ranking.freshness_window_hours == 0 {
		return Err(Error::Validation {
			message: "ranking.freshness_window_hours must be greater than zero.".to_string(),
		});
	}
	if cfg.ranking.default_top_k == 0 {
		return Err(Error::Validation {
			message: "ranking.default_top_k must be greater than zero.".to_string(),
		});
	}
	if cfg.ranking.default_top_k > cfg.ranking.max_top_k {
		return Err(Error::Validation {
			message: "ranking.default_top_k must not exceed ranking.max_top_k.".to_string(),
		});
	}
	if cfg.ranking.calculation_lease_seconds == 0 {
		return Err(Error::Validation {
			message: "ranking.calculation_lease_seconds must be greater than zero.".to_string(),
		});
	}
	if cfg.ranking.bulk.max_concurrency == 0 {
		return Err(Error::Validation {
			message: "ranking.bulk.max_concurrency must be greater than zero.".to_string(),
		});
	}
	if cfg.scheduler.sweep_interval_seconds == 0 {
		return Err(Error::Validation {
			message: "scheduler.sweep_interval_seconds must be greater than zero.".to_string(),
		});
	}
	if cfg.scheduler.sweep_batch_size == 0 {
		return Err(Error::Validation {
			message: "scheduler.sweep_batch_size must be greater than zero.".to_string(),
		});
	}
	if cfg.events.poll_interval_ms == 0 {
		return Err(Error::Validation {
			message: "events.poll_interval_ms must be greater than zero.".to_string(),
		});
	}
	if cfg.events.claim_lease_seconds == 0 {
		return Err(Error::Validation {
			message: "events.claim_lease_seconds must be greater than zero.".to_string(),
		});
	}
	if cfg.events.max_attempts == 0 {
		return Err(Error::Validation {
			message: "events.max_attempts must be greater than zero.".to_string(),
		});
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	cfg.service.log_level = cfg.service.log_level.trim().to_string();
	cfg.storage.postgres.dsn = cfg.storage.postgres.dsn.trim().to_string();
}
