use std::{collections::BTreeSet, time::Instant};

use serde::Serialize;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use ranker_domain::{
	CandidateRanking, RankedCandidate, ScoredCandidate, TriggerEvent, assign_ranks,
	compute_score, index_questions, scoring_config_version,
};
use ranker_storage::rankings::CompletedCalculation;

use crate::{CalculationClaim, Error, RankingService, Result};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RankingCalculationResult {
	pub job_id: Uuid,
	pub total_candidates: u32,
	pub calculation_duration_ms: u64,
	pub scoring_config_version: String,
	/// Answers left out because they reference unknown questions or repeat a question.
	pub skipped_answers: u32,
}

impl RankingService {
	/// Recomputes and replaces the job's ranking snapshot.
	///
	/// Fails with [`Error::AlreadyCalculating`] while another pass holds the job. Any other
	/// failure after the claim moves the job to ERROR and leaves the previous rows in place.
	pub async fn recalculate(
		&self,
		job_id: Uuid,
		trigger: TriggerEvent,
	) -> Result<RankingCalculationResult> {
		let started = Instant::now();
		let claim = CalculationClaim {
			job_id,
			trigger,
			claim_token: Uuid::new_v4(),
			now: OffsetDateTime::now_utc(),
			lease: Duration::seconds(i64::from(self.cfg.calculation_lease_seconds)),
		};

		if !self.stores.rankings.claim_calculation(claim).await? {
			tracing::warn!(%job_id, %trigger, "Rejected overlapping ranking recalculation.");

			return Err(Error::AlreadyCalculating { job_id });
		}

		tracing::info!(%job_id, %trigger, "Ranking recalculation started.");

		match self.run_claimed(job_id, claim.claim_token, started).await {
			Ok(result) => {
				tracing::info!(
					%job_id,
					%trigger,
					total_candidates = result.total_candidates,
					duration_ms = result.calculation_duration_ms,
					scoring_config_version = %result.scoring_config_version,
					skipped_answers = result.skipped_answers,
					"Ranking recalculation completed."
				);

				Ok(result)
			},
			Err(err @ Error::CalculationSuperseded { .. }) => {
				tracing::warn!(
					%job_id,
					%trigger,
					"Ranking recalculation superseded by invalidation."
				);

				Err(err)
			},
			Err(err) => {
				self.record_failure(job_id, claim.claim_token, &err).await;

				Err(err)
			},
		}
	}

	async fn run_claimed(
		&self,
		job_id: Uuid,
		claim_token: Uuid,
		started: Instant,
	) -> Result<RankingCalculationResult> {
		let config = self
			.stores
			.configs
			.effective_config(job_id)
			.await?
			.ok_or(Error::ConfigNotFound { job_id })?;
		let version = scoring_config_version(&config);
		let submissions = self.stores.assessments.latest_submissions(job_id).await?;
		let question_ids = submissions
			.iter()
			.flat_map(|submission| submission.answers.iter().map(|answer| answer.question_id))
			.collect::<BTreeSet<_>>()
			.into_iter()
			.collect::<Vec<_>>();
		let questions =
			index_questions(self.stores.assessments.questions_by_ids(&question_ids).await?);
		let now = OffsetDateTime::now_utc();
		let mut skipped_answers = 0_u32;
		let mut scored = Vec::with_capacity(submissions.len());

		for submission in submissions {
			let breakdown = compute_score(
				&submission.answers,
				&questions,
				&config,
				submission.submitted_at,
				now,
			);

			for issue in &breakdown.issues {
				tracing::warn!(
					%job_id,
					applicant_id = %submission.applicant_id,
					assessment_id = %issue.assessment_id,
					question_id = %issue.question_id,
					issue = issue.kind.as_str(),
					"Skipped inconsistent assessment answer."
				);
			}

			skipped_answers =
				skipped_answers.saturating_add(saturating_u32(breakdown.issues.len()));

			scored.push(ScoredCandidate {
				applicant_id: submission.applicant_id,
				assessment_id: submission.assessment_id,
				breakdown,
			});
		}

		let rankings = assign_ranks(scored)
			.into_iter()
			.map(|ranked| to_candidate_ranking(job_id, ranked, &version, now))
			.collect::<Vec<_>>();
		let total_candidates = saturating_u32(rankings.len());
		let calculation_duration_ms =
			u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
		let completed = self
			.stores
			.rankings
			.complete_calculation(
				job_id,
				CompletedCalculation {
					claim_token,
					scoring_config_version: &version,
					calculated_at: now,
					duration_ms: calculation_duration_ms,
					rankings: &rankings,
				},
			)
			.await?;

		if !completed {
			return Err(Error::CalculationSuperseded { job_id });
		}

		Ok(RankingCalculationResult {
			job_id,
			total_candidates,
			calculation_duration_ms,
			scoring_config_version: version,
			skipped_answers,
		})
	}

	async fn record_failure(&self, job_id: Uuid, claim_token: Uuid, err: &Error) {
		let message = err.to_string();
		let recorded = self
			.stores
			.rankings
			.fail_calculation(job_id, claim_token, &message, OffsetDateTime::now_utc())
			.await;

		match recorded {
			Ok(true) => {
				tracing::error!(%job_id, error = %message, "Ranking recalculation failed.");
			},
			Ok(false) => {
				tracing::warn!(
					%job_id,
					error = %message,
					"Ranking recalculation failed after its claim was released."
				);
			},
			Err(store_err) => {
				tracing::error!(
					%job_id,
					error = %message,
					store_error = %store_err,
					"Failed to record ranking recalculation failure."
				);
			},
		}
	}
}

fn to_candidate_ranking(
	job_id: Uuid,
	ranked: RankedCandidate,
	version: &str,
	calculated_at: OffsetDateTime,
) -> CandidateRanking {
	let breakdown = ranked.breakdown;

	CandidateRanking {
		job_id,
		applicant_id: ranked.applicant_id,
		assessment_id: ranked.assessment_id,
		rank: ranked.rank,
		score: breakdown.score,
		max_possible_score: breakdown.max_possible_score,
		percentage: breakdown.percentage,
		correct_answers: breakdown.correct_answers,
		incorrect_answers: breakdown.incorrect_answers,
		recency_bonus: breakdown.recency_bonus,
		scoring_config_version: version.to_string(),
		calculated_at,
		is_stale: false,
	}
}

fn saturating_u32(value: usize) -> u32 {
	u32::try_from(value).unwrap_or(u32::MAX)
}
