use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use ranker_domain::TriggerEvent;

use crate::{RankingService, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvalidationRequest {
	pub target: InvalidationTarget,
	pub trigger: TriggerEvent,
}

/// What changed. Each variant selects the jobs whose snapshot it makes outdated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum InvalidationTarget {
	Job(Uuid),
	/// The bound job, or every job without its own config when this is the default.
	ScoringConfig(Uuid),
	/// Every job the applicant has submitted an assessment for.
	Applicant(Uuid),
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct InvalidationReport {
	/// Jobs the target resolved to, in ascending order.
	pub affected_jobs: Vec<Uuid>,
	/// Affected jobs that had a snapshot to mark stale.
	pub jobs_marked: u64,
}

impl RankingService {
	/// Marks the targeted jobs STALE and flags their rows, as one atomic write.
	///
	/// Idempotent. Jobs never calculated are left alone. A job that is mid-calculation becomes
	/// STALE and the running pass will not be able to commit.
	pub async fn invalidate(&self, request: InvalidationRequest) -> Result<InvalidationReport> {
		self.invalidate_all(&[request.target], request.trigger).await
	}

	/// Marks the union of the jobs every target resolves to, in one write.
	pub(crate) async fn invalidate_all(
		&self,
		targets: &[InvalidationTarget],
		trigger: TriggerEvent,
	) -> Result<InvalidationReport> {
		let mut affected_jobs = Vec::new();

		for target in targets {
			affected_jobs.extend(self.resolve_target(*target).await?);
		}

		affected_jobs.sort_unstable();
		affected_jobs.dedup();

		let jobs_marked = self
			.stores
			.rankings
			.mark_stale(&affected_jobs, trigger, OffsetDateTime::now_utc())
			.await?;

		tracing::info!(
			invalidation = ?targets,
			trigger = %trigger,
			affected_jobs = affected_jobs.len(),
			jobs_marked,
			"Rankings invalidated."
		);

		Ok(InvalidationReport { affected_jobs, jobs_marked })
	}

	pub(crate) async fn resolve_target(&self, target: InvalidationTarget) -> Result<Vec<Uuid>> {
		match target {
			InvalidationTarget::Job(job_id) => Ok(vec![job_id]),
			InvalidationTarget::ScoringConfig(scoring_config_id) =>
				self.stores.configs.jobs_governed_by(scoring_config_id).await,
			InvalidationTarget::Applicant(applicant_id) =>
				self.stores.assessments.jobs_with_submissions_from(applicant_id).await,
		}
	}
}
