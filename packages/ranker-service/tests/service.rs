use std::sync::Arc;

use time::{Duration, OffsetDateTime};
use tokio::sync::{Notify, Semaphore};
use uuid::Uuid;

use ranker_config::Ranking;
use ranker_domain::{
	Answer, ApplicantAssessment, ApplicantSubmission, AssessmentQuestion, CandidateRanking,
	ConfigBinding, JobRankingMetadata, RankingStatus, ScoringConfig, TriggerEvent,
};
use ranker_service::{
	AssessmentSource, BoxFuture, BulkJobResult, BulkPriority, Error, InvalidationRequest,
	InvalidationTarget, MemoryStore, RankingEvent, RankingService, Result, Stores,
};

struct Fixture {
	store: Arc<MemoryStore>,
	service: RankingService,
	weights: Vec<AssessmentQuestion>,
}
impl Fixture {
	fn new() -> Self {
		let store = Arc::new(MemoryStore::new());
		let service = RankingService::in_memory(Ranking::default(), store.clone());
		let weights = [2.0, 1.0, 1.0].into_iter().map(|weight| question(&store, weight)).collect();

		Self { store, service, weights }
	}

	fn job(&self) -> Uuid {
		let job_id = Uuid::new_v4();

		self.store.add_job(job_id);

		job_id
	}

	/// Submits one assessment answering the three fixture questions with `correct`.
	fn submit(
		&self,
		job_id: Uuid,
		applicant_id: Uuid,
		submitted_at: OffsetDateTime,
		correct: [bool; 3],
	) -> Uuid {
		let assessment_id = Uuid::new_v4();
		let answers = self
			.weights
			.iter()
			.zip(correct)
			.map(|(question, is_correct)| answer(assessment_id, question.question_id, is_correct))
			.collect();

		self.store.put_assessment(
			ApplicantAssessment {
				applicant_assessment_id: assessment_id,
				applicant_id,
				job_id,
				template_id: Uuid::nil(),
				submitted_at: Some(submitted_at),
			},
			answers,
		);

		assessment_id
	}

	fn put_config(&self, binding: ConfigBinding, fraction: f64) -> Uuid {
		let config = scoring_config(binding, fraction);
		let id = config.scoring_config_id;

		self.store.put_scoring_config(config).expect("Failed to store scoring config.");

		id
	}
}

fn question(store: &MemoryStore, weight: f64) -> AssessmentQuestion {
	let question = AssessmentQuestion {
		question_id: Uuid::new_v4(),
		weight,
		correct_answer: "b".to_string(),
		negative_weight: None,
	};

	store.add_question(question.clone());

	question
}

fn answer(assessment_id: Uuid, question_id: Uuid, is_correct: bool) -> Answer {
	Answer {
		question_id,
		applicant_assessment_id: assessment_id,
		raw_answer: if is_correct { "b".to_string() } else { "a".to_string() },
		is_correct,
	}
}

fn scoring_config(binding: ConfigBinding, fraction: f64) -> ScoringConfig {
	ScoringConfig {
		scoring_config_id: Uuid::new_v4(),
		binding,
		negative_marking_fraction: fraction,
		recency_window_days: None,
		recency_boost_percent: None,
		updated_at: OffsetDateTime::now_utc(),
	}
}

fn ago(days: i64) -> OffsetDateTime {
	OffsetDateTime::now_utc() - Duration::days(days)
}

fn assert_close(actual: f64, expected: f64) {
	assert!((actual - expected).abs() < 1e-9, "Expected {expected}, got {actual}.");
}

/// Blocks `latest_submissions` until released, so a test can act while a pass holds its claim.
struct GatedAssessments {
	inner: Arc<MemoryStore>,
	entered: Notify,
	release: Semaphore,
}
impl GatedAssessments {
	fn new(inner: Arc<MemoryStore>) -> Self {
		Self { inner, entered: Notify::new(), release: Semaphore::new(0) }
	}
}
impl AssessmentSource for GatedAssessments {
	fn latest_submissions<'a>(
		&'a self,
		job_id: Uuid,
	) -> BoxFuture<'a, Result<Vec<ApplicantSubmission>>> {
		Box::pin(async move {
			self.entered.notify_one();

			let _permit = self.release.acquire().await.expect("Gate semaphore closed.");

			self.inner.latest_submissions(job_id).await
		})
	}

	fn questions_by_ids<'a>(
		&'a self,
		question_ids: &'a [Uuid],
	) -> BoxFuture<'a, Result<Vec<AssessmentQuestion>>> {
		self.inner.questions_by_ids(question_ids)
	}

	fn jobs_with_submissions_from<'a>(
		&'a self,
		applicant_id: Uuid,
	) -> BoxFuture<'a, Result<Vec<Uuid>>> {
		self.inner.jobs_with_submissions_from(applicant_id)
	}
}

fn gated_service(store: &Arc<MemoryStore>) -> (Arc<GatedAssessments>, RankingService) {
	let gate = Arc::new(GatedAssessments::new(store.clone()));
	let stores = Stores::new(gate.clone(), store.clone(), store.clone());

	(gate, RankingService::new(Ranking::default(), stores))
}

#[tokio::test]
async fn recalculation_ranks_latest_submission_per_applicant() {
	let fx = Fixture::new();
	let job_id = fx.job();
	let (alice, bob, carol) = (Uuid::from_u128(1), Uuid::from_u128(2), Uuid::from_u128(3));

	fx.put_config(ConfigBinding::Default, 0.25);
	fx.submit(job_id, alice, ago(9), [false, false, false]);
	fx.submit(job_id, alice, ago(3), [true, true, true]);
	fx.submit(job_id, bob, ago(2), [true, true, false]);
	fx.submit(job_id, carol, ago(1), [false, true, true]);

	let result = fx
		.service
		.recalculate(job_id, TriggerEvent::Manual)
		.await
		.expect("Failed to recalculate.");

	assert_eq!(result.total_candidates, 3);
	assert_eq!(result.skipped_answers, 0);

	let rows = fx.store.rankings(job_id);
	let order = rows.iter().map(|row| (row.rank, row.applicant_id)).collect::<Vec<_>>();

	assert_eq!(order, vec![(1, alice), (2, bob), (3, carol)]);
	assert_close(rows[0].score, 4.0);
	assert_close(rows[1].score, 2.75);
	assert_close(rows[1].percentage, 68.75);
	assert_close(rows[2].score, 1.5);
	assert!(rows.iter().all(|row| row.scoring_config_version == result.scoring_config_version));

	let metadata = fx.store.metadata(job_id).expect("Expected metadata.");

	assert_eq!(metadata.status, RankingStatus::Completed);
	assert_eq!(metadata.total_candidates, 3);
	assert_eq!(metadata.trigger_event.as_deref(), Some("manual"));
	assert!(metadata.last_calculated_at.is_some());
	assert_eq!(metadata.scoring_config_version, Some(result.scoring_config_version));
}

#[tokio::test]
async fn recency_bonus_is_applied_inside_window() {
	let fx = Fixture::new();
	let job_id = fx.job();
	let mut config = scoring_config(ConfigBinding::Job(job_id), 0.25);

	config.recency_window_days = Some(7);
	config.recency_boost_percent = Some(10.0);
	fx.store.put_scoring_config(config).expect("Failed to store scoring config.");
	fx.submit(job_id, Uuid::new_v4(), ago(2), [true, true, false]);
	fx.service.recalculate(job_id, TriggerEvent::Manual).await.expect("Failed to recalculate.");

	let rows = fx.store.rankings(job_id);

	assert_close(rows[0].recency_bonus, 0.275);
	assert_close(rows[0].score, 3.025);
}

#[tokio::test]
async fn equal_scores_rank_by_applicant_id() {
	let fx = Fixture::new();
	let job_id = fx.job();

	fx.put_config(ConfigBinding::Default, 0.0);

	for applicant in [30_u128, 10, 20] {
		fx.submit(job_id, Uuid::from_u128(applicant), ago(1), [true, false, true]);
	}

	fx.service.recalculate(job_id, TriggerEvent::Manual).await.expect("Failed to recalculate.");

	let applicants =
		fx.store.rankings(job_id).iter().map(|row| row.applicant_id.as_u128()).collect::<Vec<_>>();

	assert_eq!(applicants, vec![10, 20, 30]);
}

#[tokio::test]
async fn repeated_recalculation_is_idempotent() {
	let fx = Fixture::new();
	let job_id = fx.job();

	fx.put_config(ConfigBinding::Default, 0.5);
	fx.submit(job_id, Uuid::new_v4(), ago(1), [true, false, false]);
	fx.submit(job_id, Uuid::new_v4(), ago(4), [false, true, true]);
	fx.service.recalculate(job_id, TriggerEvent::Manual).await.expect("Failed to recalculate.");

	let first = fx.store.rankings(job_id);

	fx.service.recalculate(job_id, TriggerEvent::Manual).await.expect("Failed to recalculate.");

	let second = fx.store.rankings(job_id);
	let strip = |rows: Vec<CandidateRanking>| {
		rows.into_iter()
			.map(|row| (row.rank, row.applicant_id, row.score.to_bits(), row.percentage.to_bits()))
			.collect::<Vec<_>>()
	};

	assert_eq!(strip(first), strip(second));
}

#[tokio::test]
async fn unknown_questions_are_skipped_not_fatal() {
	let fx = Fixture::new();
	let job_id = fx.job();
	let assessment_id = Uuid::new_v4();

	fx.put_config(ConfigBinding::Default, 0.25);
	fx.store.put_assessment(
		ApplicantAssessment {
			applicant_assessment_id: assessment_id,
			applicant_id: Uuid::new_v4(),
			job_id,
			template_id: Uuid::nil(),
			submitted_at: Some(ago(1)),
		},
		vec![
			answer(assessment_id, fx.weights[0].question_id, true),
			answer(assessment_id, Uuid::new_v4(), true),
		],
	);

	let result = fx
		.service
		.recalculate(job_id, TriggerEvent::AssessmentSubmitted)
		.await
		.expect("Failed to recalculate.");

	assert_eq!(result.skipped_answers, 1);
	assert_close(fx.store.rankings(job_id)[0].max_possible_score, 2.0);
}

#[tokio::test]
async fn job_without_submissions_completes_empty() {
	let fx = Fixture::new();
	let job_id = fx.job();

	fx.put_config(ConfigBinding::Default, 0.25);

	let result =
		fx.service.recalculate(job_id, TriggerEvent::Manual).await.expect("Failed to recalculate.");

	assert_eq!(result.total_candidates, 0);
	assert_eq!(fx.store.metadata(job_id).map(|m| m.status), Some(RankingStatus::Completed));
}

#[tokio::test]
async fn unknown_job_is_not_found() {
	let fx = Fixture::new();

	fx.put_config(ConfigBinding::Default, 0.25);

	let err = fx.service.recalculate(Uuid::new_v4(), TriggerEvent::Manual).await.unwrap_err();

	assert!(matches!(err, Error::NotFound { .. }), "Unexpected error: {err}.");
}

#[tokio::test]
async fn missing_config_moves_job_to_error_and_keeps_rows() {
	let fx = Fixture::new();
	let job_id = fx.job();
	let config_id = fx.put_config(ConfigBinding::Job(job_id), 0.25);

	fx.submit(job_id, Uuid::new_v4(), ago(1), [true, true, true]);
	fx.service.recalculate(job_id, TriggerEvent::Manual).await.expect("Failed to recalculate.");

	let before = fx.store.rankings(job_id);

	fx.store.remove_scoring_config(config_id);

	let err = fx.service.recalculate(job_id, TriggerEvent::Manual).await.unwrap_err();

	assert!(matches!(err, Error::ConfigNotFound { job_id: id } if id == job_id));
	assert!(!err.is_retryable());

	let metadata = fx.store.metadata(job_id).expect("Expected metadata.");

	assert_eq!(metadata.status, RankingStatus::Error);
	assert!(metadata.error_message.is_some_and(|message| message.contains("scoring config")));
	assert_eq!(fx.store.rankings(job_id), before);
}

#[tokio::test]
async fn stale_job_serves_no_candidates() {
	let fx = Fixture::new();
	let job_id = fx.job();

	fx.put_config(ConfigBinding::Default, 0.25);
	fx.submit(job_id, Uuid::new_v4(), ago(1), [true, true, true]);
	fx.service.recalculate(job_id, TriggerEvent::Manual).await.expect("Failed to recalculate.");

	let top = fx.service.top_candidates(job_id, Some(5)).await.expect("Failed top-k.");

	assert_eq!(top.candidates.len(), 1);

	fx.service
		.invalidate(InvalidationRequest {
			target: InvalidationTarget::Job(job_id),
			trigger: TriggerEvent::JobChanged,
		})
		.await
		.expect("Failed to invalidate.");

	let top = fx.service.top_candidates(job_id, Some(5)).await.expect("Failed top-k.");

	assert!(top.candidates.is_empty());
	assert_eq!(top.metadata.status, RankingStatus::Stale);
	assert!(fx.store.rankings(job_id).iter().all(|row| row.is_stale));
}

#[tokio::test]
async fn never_calculated_job_reports_stale() {
	let fx = Fixture::new();
	let job_id = fx.job();
	let top = fx.service.top_candidates(job_id, None).await.expect("Failed top-k.");

	assert!(top.candidates.is_empty());
	assert_eq!(top.metadata.status, RankingStatus::Stale);
	assert!(top.metadata.last_calculated_at.is_none());

	let status = fx.service.job_ranking_status(job_id).await.expect("Failed status.");

	assert!(status.metadata.is_none());
	assert!(status.is_stale);
	assert!(!status.config_drift);
}

#[tokio::test]
async fn top_candidates_limit_defaults_and_clamps() {
	let fx = Fixture::new();
	let job_id = fx.job();

	fx.put_config(ConfigBinding::Default, 0.25);

	for _ in 0..7 {
		fx.submit(job_id, Uuid::new_v4(), ago(1), [true, false, true]);
	}

	fx.service.recalculate(job_id, TriggerEvent::Manual).await.expect("Failed to recalculate.");

	let top = fx.service.top_candidates(job_id, None).await.expect("Failed top-k.");
	let ranks = top.candidates.iter().map(|row| row.rank).collect::<Vec<_>>();

	assert_eq!(ranks, vec![1, 2, 3, 4, 5]);

	let err = fx.service.top_candidates(job_id, Some(0)).await.unwrap_err();

	assert!(matches!(err, Error::InvalidRequest { .. }));

	let cfg = Ranking { max_top_k: 2, default_top_k: 2, ..Ranking::default() };
	let narrow = RankingService::in_memory(cfg, fx.store.clone());
	let top = narrow.top_candidates(job_id, Some(50)).await.expect("Failed top-k.");

	assert_eq!(top.candidates.len(), 2);
}

#[tokio::test]
async fn default_config_invalidation_reaches_fallback_jobs_only() {
	let fx = Fixture::new();
	let default_id = fx.put_config(ConfigBinding::Default, 0.25);
	let bound_job = fx.job();
	let bound_id = fx.put_config(ConfigBinding::Job(bound_job), 0.5);
	let fallback_jobs = [fx.job(), fx.job()];

	for job_id in fallback_jobs.iter().copied().chain([bound_job]) {
		fx.submit(job_id, Uuid::new_v4(), ago(1), [true, true, false]);
		fx.service.recalculate(job_id, TriggerEvent::Manual).await.expect("Failed to recalculate.");
	}

	let report = fx
		.service
		.invalidate(InvalidationRequest {
			target: InvalidationTarget::ScoringConfig(default_id),
			trigger: TriggerEvent::ScoringConfigChanged,
		})
		.await
		.expect("Failed to invalidate.");
	let mut expected = fallback_jobs.to_vec();

	expected.sort();

	assert_eq!(report.affected_jobs, expected);
	assert_eq!(report.jobs_marked, 2);
	assert_eq!(fx.store.metadata(bound_job).map(|m| m.status), Some(RankingStatus::Completed));

	let report = fx
		.service
		.invalidate(InvalidationRequest {
			target: InvalidationTarget::ScoringConfig(bound_id),
			trigger: TriggerEvent::ScoringConfigChanged,
		})
		.await
		.expect("Failed to invalidate.");

	assert_eq!(report.affected_jobs, vec![bound_job]);
	assert_eq!(fx.store.metadata(bound_job).map(|m| m.status), Some(RankingStatus::Stale));
}

#[tokio::test]
async fn applicant_invalidation_targets_submitted_jobs() {
	let fx = Fixture::new();
	let applicant_id = Uuid::new_v4();
	let applied = fx.job();
	let untouched = fx.job();
	let draft_only = fx.job();

	fx.put_config(ConfigBinding::Default, 0.25);
	fx.submit(applied, applicant_id, ago(1), [true, true, true]);
	fx.submit(untouched, Uuid::new_v4(), ago(1), [true, true, true]);
	fx.store.put_assessment(
		ApplicantAssessment {
			applicant_assessment_id: Uuid::new_v4(),
			applicant_id,
			job_id: draft_only,
			template_id: Uuid::nil(),
			submitted_at: None,
		},
		Vec::new(),
	);

	for job_id in [applied, untouched, draft_only] {
		fx.service.recalculate(job_id, TriggerEvent::Manual).await.expect("Failed to recalculate.");
	}

	let report = fx
		.service
		.invalidate(InvalidationRequest {
			target: InvalidationTarget::Applicant(applicant_id),
			trigger: TriggerEvent::AssessmentSubmitted,
		})
		.await
		.expect("Failed to invalidate.");

	assert_eq!(report.affected_jobs, vec![applied]);
	assert_eq!(fx.store.metadata(untouched).map(|m| m.status), Some(RankingStatus::Completed));
	assert_eq!(fx.store.metadata(draft_only).map(|m| m.status), Some(RankingStatus::Completed));
}

#[tokio::test]
async fn invalidation_is_idempotent_and_skips_uncalculated_jobs() {
	let fx = Fixture::new();
	let job_id = fx.job();
	let never = fx.job();

	fx.put_config(ConfigBinding::Default, 0.25);
	fx.submit(job_id, Uuid::new_v4(), ago(1), [true, true, true]);
	fx.service.recalculate(job_id, TriggerEvent::Manual).await.expect("Failed to recalculate.");

	let request = InvalidationRequest {
		target: InvalidationTarget::Job(job_id),
		trigger: TriggerEvent::Manual,
	};

	fx.service.invalidate(request).await.expect("Failed to invalidate.");

	let rows = fx.store.rankings(job_id);
	let metadata = fx.store.metadata(job_id);

	fx.service.invalidate(request).await.expect("Failed to invalidate.");

	assert_eq!(fx.store.rankings(job_id), rows);
	assert_eq!(fx.store.metadata(job_id), metadata);

	let report = fx
		.service
		.invalidate(InvalidationRequest {
			target: InvalidationTarget::Job(never),
			trigger: TriggerEvent::Manual,
		})
		.await
		.expect("Failed to invalidate.");

	assert_eq!(report.jobs_marked, 0);
	assert!(fx.store.metadata(never).is_none());
}

#[tokio::test]
async fn status_reports_row_staleness_and_config_drift() {
	let fx = Fixture::new();
	let job_id = fx.job();
	let config = scoring_config(ConfigBinding::Default, 0.25);

	fx.store.put_scoring_config(config.clone()).expect("Failed to store scoring config.");
	fx.submit(job_id, Uuid::new_v4(), ago(1), [true, false, true]);
	fx.service.recalculate(job_id, TriggerEvent::Manual).await.expect("Failed to recalculate.");

	let status = fx.service.job_ranking_status(job_id).await.expect("Failed status.");

	assert!(!status.is_stale);
	assert!(!status.config_drift);
	assert_eq!(
		status.current_scoring_config_version,
		status.metadata.as_ref().and_then(|m| m.scoring_config_version.clone())
	);

	let edited = ScoringConfig {
		negative_marking_fraction: 0.5,
		updated_at: config.updated_at + Duration::seconds(1),
		..config
	};

	fx.store.put_scoring_config(edited).expect("Failed to store scoring config.");

	let status = fx.service.job_ranking_status(job_id).await.expect("Failed status.");

	assert!(status.config_drift);
	assert!(!status.is_stale, "Drift alone does not flip the stale flag.");
}

#[tokio::test]
async fn overlapping_recalculation_is_rejected() {
	let store = Arc::new(MemoryStore::new());
	let job_id = Uuid::new_v4();
	let (gate, service) = gated_service(&store);

	store.add_job(job_id);
	store
		.put_scoring_config(scoring_config(ConfigBinding::Default, 0.25))
		.expect("Failed to store scoring config.");

	let (first, second) = tokio::join!(service.recalculate(job_id, TriggerEvent::Manual), async {
		gate.entered.notified().await;

		let second = service.recalculate(job_id, TriggerEvent::Manual).await;

		gate.release.add_permits(1);

		second
	});

	assert!(first.is_ok(), "First pass failed: {first:?}.");
	assert!(matches!(second, Err(Error::AlreadyCalculating { .. })));
	assert!(second.is_err_and(|err| err.is_retryable()));
	assert_eq!(store.metadata(job_id).map(|m| m.status), Some(RankingStatus::Completed));
}

#[tokio::test]
async fn invalidation_during_pass_supersedes_it() {
	let fx = Fixture::new();
	let job_id = fx.job();
	let (gate, gated) = gated_service(&fx.store);

	fx.put_config(ConfigBinding::Default, 0.25);
	fx.submit(job_id, Uuid::from_u128(1), ago(1), [true, true, true]);
	fx.service.recalculate(job_id, TriggerEvent::Manual).await.expect("Failed to recalculate.");
	fx.submit(job_id, Uuid::from_u128(2), ago(0), [true, true, false]);

	let (pass, _) = tokio::join!(gated.recalculate(job_id, TriggerEvent::Manual), async {
		gate.entered.notified().await;
		fx.service
			.invalidate(InvalidationRequest {
				target: InvalidationTarget::Job(job_id),
				trigger: TriggerEvent::AssessmentSubmitted,
			})
			.await
			.expect("Failed to invalidate.");
		gate.release.add_permits(1);
	});

	assert!(matches!(pass, Err(Error::CalculationSuperseded { .. })));

	let rows = fx.store.rankings(job_id);

	assert_eq!(rows.len(), 1, "The superseded pass must not write rows.");
	assert!(rows[0].is_stale);
	assert_eq!(fx.store.metadata(job_id).map(|m| m.status), Some(RankingStatus::Stale));

	let result =
		fx.service.recalculate(job_id, TriggerEvent::Manual).await.expect("Failed to recalculate.");

	assert_eq!(result.total_candidates, 2);
}

#[tokio::test]
async fn abandoned_claim_is_taken_over_after_lease() {
	let fx = Fixture::new();
	let job_id = fx.job();
	let mut metadata = JobRankingMetadata::never_calculated(job_id);

	metadata.status = RankingStatus::Calculating;
	fx.put_config(ConfigBinding::Default, 0.25);
	fx.store.restore_metadata(metadata.clone(), OffsetDateTime::now_utc());

	let err = fx.service.recalculate(job_id, TriggerEvent::Manual).await.unwrap_err();

	assert!(matches!(err, Error::AlreadyCalculating { .. }));

	fx.store.restore_metadata(metadata, OffsetDateTime::now_utc() - Duration::hours(1));
	fx.service.recalculate(job_id, TriggerEvent::Manual).await.expect("Failed to take over.");
}

#[tokio::test]
async fn sweep_recovers_claims_past_their_lease() {
	let fx = Fixture::new();
	let abandoned = fx.job();
	let live = fx.job();
	let now = OffsetDateTime::now_utc();

	fx.put_config(ConfigBinding::Default, 0.25);
	fx.submit(abandoned, Uuid::new_v4(), ago(3), [true, false, true]);

	for (job_id, claimed_at) in [(abandoned, now - Duration::days(2)), (live, now)] {
		let metadata = JobRankingMetadata {
			status: RankingStatus::Calculating,
			..JobRankingMetadata::never_calculated(job_id)
		};

		fx.store.restore_metadata(metadata, claimed_at);
	}

	let due = fx.service.list_jobs_needing_recalculation(10).await.expect("Failed to list jobs.");

	assert_eq!(due, vec![abandoned]);

	let report = fx.service.schedule_stale_job_recalculations(10).await.expect("Failed sweep.");

	assert_eq!((report.considered, report.succeeded, report.failed), (1, 1, 0));
	assert_eq!(fx.store.metadata(abandoned).map(|m| m.status), Some(RankingStatus::Completed));
	assert_eq!(fx.store.rankings(abandoned).len(), 1);
	assert_eq!(fx.store.metadata(live).map(|m| m.status), Some(RankingStatus::Calculating));
}

#[tokio::test]
async fn bulk_isolates_failures_and_keeps_input_order() {
	let fx = Fixture::new();
	let first = fx.job();
	let orphan = fx.job();
	let last = fx.job();

	fx.put_config(ConfigBinding::Job(first), 0.25);
	fx.put_config(ConfigBinding::Job(last), 0.25);

	let job_ids = [first, orphan, first, last];
	let report =
		fx.service.process_bulk_rankings(&job_ids, TriggerEvent::Manual, BulkPriority::High).await;
	let order = report.outcomes.iter().map(|outcome| outcome.job_id).collect::<Vec<_>>();

	assert_eq!(order, vec![first, orphan, last]);
	assert_eq!(report.succeeded, 2);
	assert_eq!(report.failed, 1);
	assert!(matches!(
		report.outcomes[1].result,
		BulkJobResult::Failed { retryable: false, .. }
	));
	assert_eq!(fx.store.metadata(orphan).map(|m| m.status), Some(RankingStatus::Error));
	assert_eq!(fx.store.metadata(last).map(|m| m.status), Some(RankingStatus::Completed));
}

fn completed(job_id: Uuid, last_calculated_at: OffsetDateTime) -> JobRankingMetadata {
	JobRankingMetadata {
		status: RankingStatus::Completed,
		last_calculated_at: Some(last_calculated_at),
		..JobRankingMetadata::never_calculated(job_id)
	}
}

#[tokio::test]
async fn jobs_needing_recalculation_are_ordered() {
	let fx = Fixture::new();
	let now = OffsetDateTime::now_utc();
	let ids = (1..=5_u128).map(Uuid::from_u128).collect::<Vec<_>>();
	let mut errored = completed(ids[2], now - Duration::days(5));
	let mut stale = completed(ids[1], now - Duration::days(1));

	errored.status = RankingStatus::Error;
	stale.status = RankingStatus::Stale;
	fx.store.restore_metadata(completed(ids[0], now - Duration::days(2)), now);
	fx.store.restore_metadata(stale, now);
	fx.store.restore_metadata(errored, now);
	fx.store.restore_metadata(completed(ids[3], now - Duration::hours(1)), now);
	fx.store.restore_metadata(completed(ids[4], now - Duration::days(3)), now);

	let due = fx.service.list_jobs_needing_recalculation(10).await.expect("Failed to list jobs.");

	assert_eq!(due, vec![ids[2], ids[1], ids[4], ids[0]]);

	let due = fx.service.list_jobs_needing_recalculation(2).await.expect("Failed to list jobs.");

	assert_eq!(due, vec![ids[2], ids[1]]);
}

#[tokio::test]
async fn sweep_recalculates_due_jobs() {
	let fx = Fixture::new();
	let stale_job = fx.job();
	let fresh_job = fx.job();

	fx.put_config(ConfigBinding::Default, 0.25);
	fx.submit(stale_job, Uuid::new_v4(), ago(1), [true, true, true]);
	fx.service.recalculate(stale_job, TriggerEvent::Manual).await.expect("Failed to recalculate.");
	fx.service.recalculate(fresh_job, TriggerEvent::Manual).await.expect("Failed to recalculate.");
	fx.service
		.invalidate(InvalidationRequest {
			target: InvalidationTarget::Job(stale_job),
			trigger: TriggerEvent::AssessmentSubmitted,
		})
		.await
		.expect("Failed to invalidate.");

	let report = fx.service.schedule_stale_job_recalculations(10).await.expect("Failed sweep.");

	assert_eq!((report.considered, report.succeeded, report.failed), (1, 1, 0));

	let metadata = fx.store.metadata(stale_job).expect("Expected metadata.");

	assert_eq!(metadata.status, RankingStatus::Completed);
	assert_eq!(metadata.trigger_event.as_deref(), Some("scheduled_sweep"));

	let report = fx.service.schedule_stale_job_recalculations(10).await.expect("Failed sweep.");

	assert_eq!(report.considered, 0);
}

#[tokio::test]
async fn submission_event_ranks_a_new_job() {
	let fx = Fixture::new();
	let job_id = fx.job();
	let applicant_id = Uuid::new_v4();

	fx.put_config(ConfigBinding::Default, 0.25);
	fx.submit(job_id, applicant_id, ago(0), [true, true, false]);

	let outcome = fx
		.service
		.handle_event(RankingEvent::AssessmentSubmitted { applicant_id, job_id })
		.await
		.expect("Failed to handle event.");

	assert_eq!(outcome.jobs_marked, 0);
	assert_eq!(outcome.recalculation.succeeded, 1);

	let top = fx.service.top_candidates(job_id, None).await.expect("Failed top-k.");

	assert_eq!(top.candidates.len(), 1);
	assert_eq!(top.metadata.trigger_event.as_deref(), Some("assessment_submitted"));
}

#[tokio::test]
async fn config_change_event_refreshes_governed_jobs() {
	let fx = Fixture::new();
	let default_id = fx.put_config(ConfigBinding::Default, 0.25);
	let jobs = [fx.job(), fx.job()];

	for job_id in jobs {
		fx.submit(job_id, Uuid::new_v4(), ago(1), [true, false, false]);
		fx.service.recalculate(job_id, TriggerEvent::Manual).await.expect("Failed to recalculate.");
	}

	let outcome = fx
		.service
		.handle_event(RankingEvent::ScoringConfigChanged {
			scoring_config_id: default_id,
			job_id: None,
		})
		.await
		.expect("Failed to handle event.");

	assert_eq!(outcome.jobs_marked, 2);
	assert_eq!(outcome.recalculation.succeeded, 2);

	for job_id in jobs {
		let status = fx.service.job_ranking_status(job_id).await.expect("Failed status.");

		assert!(!status.is_stale);
		assert_eq!(
			status.metadata.and_then(|m| m.trigger_event).as_deref(),
			Some("scoring_config_changed")
		);
	}
}

#[tokio::test]
async fn deleted_job_config_event_still_reaches_its_job() {
	let fx = Fixture::new();
	let job_id = fx.job();
	let bystander = fx.job();
	let bound_id = fx.put_config(ConfigBinding::Job(job_id), 0.0);

	fx.put_config(ConfigBinding::Default, 0.5);

	for id in [job_id, bystander] {
		fx.submit(id, Uuid::new_v4(), ago(1), [true, false, true]);
		fx.service.recalculate(id, TriggerEvent::Manual).await.expect("Failed to recalculate.");
	}

	assert_close(fx.store.rankings(job_id)[0].score, 3.0);

	fx.store.remove_scoring_config(bound_id);

	let outcome = fx
		.service
		.handle_event(RankingEvent::ScoringConfigChanged {
			scoring_config_id: bound_id,
			job_id: Some(job_id),
		})
		.await
		.expect("Failed to handle event.");

	assert_eq!(outcome.jobs_marked, 1);
	assert_eq!(outcome.recalculation.succeeded, 1);
	assert_close(fx.store.rankings(job_id)[0].score, 2.5);
	assert_eq!(
		fx.store.metadata(bystander).and_then(|m| m.trigger_event).as_deref(),
		Some("manual")
	);
}
