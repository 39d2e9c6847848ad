use serde::Serialize;
use uuid::Uuid;

use ranker_domain::{CandidateRanking, JobRankingMetadata, RankingStatus, scoring_config_version};

use crate::{Error, RankingService, Result};

#[derive(Clone, Debug, Serialize)]
pub struct TopCandidatesResponse {
	pub job_id: Uuid,
	pub candidates: Vec<CandidateRanking>,
	pub metadata: JobRankingMetadata,
}

#[derive(Clone, Debug, Serialize)]
pub struct JobRankingStatus {
	pub job_id: Uuid,
	/// `None` when the job has never been calculated.
	pub metadata: Option<JobRankingMetadata>,
	pub is_stale: bool,
	/// Version of the job's effective config as it is now, if one resolves.
	pub current_scoring_config_version: Option<String>,
	/// The snapshot was produced with a config version other than the current one.
	pub config_drift: bool,
}

impl RankingService {
	/// Serves the top of the persisted snapshot. Never computes scores.
	///
	/// A job that is STALE or was never calculated yields no candidates and STALE metadata.
	/// `limit` defaults to `ranking.default_top_k` and is clamped to `ranking.max_top_k`.
	pub async fn top_candidates(
		&self,
		job_id: Uuid,
		limit: Option<u32>,
	) -> Result<TopCandidatesResponse> {
		let limit = self.resolve_limit(limit)?;
		let snapshot = self.stores.rankings.snapshot(job_id, limit).await?;
		let Some(metadata) = snapshot.metadata else {
			return Ok(TopCandidatesResponse {
				job_id,
				candidates: Vec::new(),
				metadata: JobRankingMetadata::never_calculated(job_id),
			});
		};
		let candidates =
			if metadata.status == RankingStatus::Stale { Vec::new() } else { snapshot.rankings };

		Ok(TopCandidatesResponse { job_id, candidates, metadata })
	}

	pub async fn job_ranking_status(&self, job_id: Uuid) -> Result<JobRankingStatus> {
		let snapshot = self.stores.rankings.snapshot(job_id, 0).await?;
		let current_scoring_config_version = self
			.stores
			.configs
			.effective_config(job_id)
			.await?
			.map(|config| scoring_config_version(&config));
		let is_stale = match &snapshot.metadata {
			Some(metadata) => metadata.status == RankingStatus::Stale || snapshot.has_stale_rows,
			None => true,
		};
		let snapshot_version = snapshot
			.metadata
			.as_ref()
			.and_then(|metadata| metadata.scoring_config_version.as_deref());
		let config_drift = match (snapshot_version, current_scoring_config_version.as_deref()) {
			(Some(produced), Some(current)) => produced != current,
			(Some(_), None) => true,
			(None, _) => false,
		};

		Ok(JobRankingStatus {
			job_id,
			metadata: snapshot.metadata,
			is_stale,
			current_scoring_config_version,
			config_drift,
		})
	}

	fn resolve_limit(&self, limit: Option<u32>) -> Result<u32> {
		match limit {
			None => Ok(self.cfg.default_top_k.min(self.cfg.max_top_k)),
			Some(0) => Err(Error::InvalidRequest {
				message: "limit must be greater than zero.".to_string(),
			}),
			Some(limit) => Ok(limit.min(self.cfg.max_top_k)),
		}
	}
}
