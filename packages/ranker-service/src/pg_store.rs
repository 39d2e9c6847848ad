use time::OffsetDateTime;
use uuid::Uuid;

use ranker_domain::{
	ApplicantSubmission, AssessmentQuestion, CandidateRanking, JobRankingMetadata, ScoringConfig,
	TriggerEvent, resolve_effective_config,
};
use ranker_storage::{
	assessments,
	db::Db,
	rankings::{self, CompletedCalculation},
	scoring_configs,
};

use crate::{
	AssessmentSource, BoxFuture, CalculationClaim, RankingRepository, RankingSnapshot, Result,
	ScoringConfigSource,
};

/// Postgres-backed implementation of every store the service needs.
pub struct PgStore {
	pub db: Db,
}
impl PgStore {
	pub fn new(db: Db) -> Self {
		Self { db }
	}

	async fn snapshot_inner(&self, job_id: Uuid, limit: u32) -> Result<RankingSnapshot> {
		let mut tx = self.db.pool.begin().await?;

		// One snapshot for all three reads so metadata and rows come from the same commit.
		sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
			.execute(&mut *tx)
			.await?;

		let metadata = rankings::fetch_metadata(&mut *tx, job_id)
			.await?
			.map(JobRankingMetadata::try_from)
			.transpose()?;
		let top = if limit == 0 {
			Vec::new()
		} else {
			rankings::fetch_top_rankings(&mut *tx, job_id, limit)
				.await?
				.into_iter()
				.map(CandidateRanking::try_from)
				.collect::<Result<Vec<_>, _>>()?
		};
		let has_stale_rows = rankings::has_stale_rankings(&mut *tx, job_id).await?;

		tx.commit().await?;

		Ok(RankingSnapshot { metadata, rankings: top, has_stale_rows })
	}
}

impl AssessmentSource for PgStore {
	fn latest_submissions<'a>(
		&'a self,
		job_id: Uuid,
	) -> BoxFuture<'a, Result<Vec<ApplicantSubmission>>> {
		Box::pin(async move {
			Ok(assessments::fetch_latest_submissions(&self.db.pool, job_id).await?)
		})
	}

	fn questions_by_ids<'a>(
		&'a self,
		question_ids: &'a [Uuid],
	) -> BoxFuture<'a, Result<Vec<AssessmentQuestion>>> {
		Box::pin(async move {
			Ok(assessments::fetch_questions_by_ids(&self.db.pool, question_ids).await?)
		})
	}

	fn jobs_with_submissions_from<'a>(
		&'a self,
		applicant_id: Uuid,
	) -> BoxFuture<'a, Result<Vec<Uuid>>> {
		Box::pin(async move {
			Ok(assessments::jobs_with_submissions_from(&self.db.pool, applicant_id).await?)
		})
	}
}

impl ScoringConfigSource for PgStore {
	fn effective_config<'a>(
		&'a self,
		job_id: Uuid,
	) -> BoxFuture<'a, Result<Option<ScoringConfig>>> {
		Box::pin(async move {
			let configs = scoring_configs::fetch_candidate_configs(&self.db.pool, job_id).await?;

			Ok(resolve_effective_config(job_id, &configs).cloned())
		})
	}

	fn scoring_config<'a>(
		&'a self,
		scoring_config_id: Uuid,
	) -> BoxFuture<'a, Result<Option<ScoringConfig>>> {
		Box::pin(async move {
			Ok(scoring_configs::fetch_scoring_config(&self.db.pool, scoring_config_id).await?)
		})
	}

	fn jobs_governed_by<'a>(
		&'a self,
		scoring_config_id: Uuid,
	) -> BoxFuture<'a, Result<Vec<Uuid>>> {
		Box::pin(async move {
			Ok(scoring_configs::jobs_governed_by(&self.db.pool, scoring_config_id).await?)
		})
	}
}

impl RankingRepository for PgStore {
	fn claim_calculation<'a>(&'a self, claim: CalculationClaim) -> BoxFuture<'a, Result<bool>> {
		Box::pin(async move {
			Ok(rankings::claim_calculation(
				&self.db,
				claim.job_id,
				claim.trigger,
				claim.claim_token,
				claim.now,
				claim.lease,
			)
			.await?)
		})
	}

	fn complete_calculation<'a>(
		&'a self,
		job_id: Uuid,
		calculation: CompletedCalculation<'a>,
	) -> BoxFuture<'a, Result<bool>> {
		Box::pin(async move {
			Ok(rankings::complete_calculation(&self.db, job_id, &calculation).await?)
		})
	}

	fn fail_calculation<'a>(
		&'a self,
		job_id: Uuid,
		claim_token: Uuid,
		message: &'a str,
		now: OffsetDateTime,
	) -> BoxFuture<'a, Result<bool>> {
		Box::pin(async move {
			Ok(rankings::fail_calculation(&self.db, job_id, claim_token, message, now).await?)
		})
	}

	fn mark_stale<'a>(
		&'a self,
		job_ids: &'a [Uuid],
		trigger: TriggerEvent,
		now: OffsetDateTime,
	) -> BoxFuture<'a, Result<u64>> {
		Box::pin(async move {
			let marked = rankings::mark_jobs_stale(&self.db, job_ids, trigger, now).await?;

			Ok(marked)
		})
	}

	fn snapshot<'a>(&'a self, job_id: Uuid, limit: u32) -> BoxFuture<'a, Result<RankingSnapshot>> {
		Box::pin(self.snapshot_inner(job_id, limit))
	}

	fn jobs_needing_recalculation<'a>(
		&'a self,
		completed_before: OffsetDateTime,
		claimed_before: OffsetDateTime,
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<Uuid>>> {
		Box::pin(async move {
			let job_ids = rankings::list_jobs_needing_recalculation(
				&self.db.pool,
				completed_before,
				claimed_before,
				limit,
			)
			.await?;

			Ok(job_ids)
		})
	}
}
