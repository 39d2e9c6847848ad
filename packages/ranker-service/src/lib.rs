pub mod bulk;
pub mod events;
pub mod invalidate;
pub mod memory_store;
pub mod pg_store;
pub mod query;
pub mod recalculate;
pub mod sweep;

mod error;

pub use bulk::{BulkJobOutcome, BulkJobResult, BulkPriority, BulkReport};
pub use error::{Error, Result};
pub use events::{EventOutcome, RankingEvent};
pub use invalidate::{InvalidationReport, InvalidationRequest, InvalidationTarget};
pub use memory_store::MemoryStore;
pub use pg_store::PgStore;
pub use query::{JobRankingStatus, TopCandidatesResponse};
pub use recalculate::RankingCalculationResult;
pub use sweep::SweepReport;

use std::{future::Future, pin::Pin, sync::Arc};

use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use ranker_config::Ranking;
use ranker_domain::{
	ApplicantSubmission, AssessmentQuestion, CandidateRanking, JobRankingMetadata, ScoringConfig,
	TriggerEvent,
};
use ranker_storage::{db::Db, rankings::CompletedCalculation};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Read-only view of submitted assessments.
pub trait AssessmentSource
where
	Self: Send + Sync,
{
	/// Latest submitted assessment per applicant for the job, with answers, ordered by applicant.
	fn latest_submissions<'a>(
		&'a self,
		job_id: Uuid,
	) -> BoxFuture<'a, Result<Vec<ApplicantSubmission>>>;

	fn questions_by_ids<'a>(
		&'a self,
		question_ids: &'a [Uuid],
	) -> BoxFuture<'a, Result<Vec<AssessmentQuestion>>>;

	fn jobs_with_submissions_from<'a>(
		&'a self,
		applicant_id: Uuid,
	) -> BoxFuture<'a, Result<Vec<Uuid>>>;
}

/// Read-only view of scoring configurations.
pub trait ScoringConfigSource
where
	Self: Send + Sync,
{
	/// Job-specific config if present, else the global default.
	fn effective_config<'a>(&'a self, job_id: Uuid) -> BoxFuture<'a, Result<Option<ScoringConfig>>>;

	fn scoring_config<'a>(
		&'a self,
		scoring_config_id: Uuid,
	) -> BoxFuture<'a, Result<Option<ScoringConfig>>>;

	/// Jobs whose effective config is `scoring_config_id`.
	fn jobs_governed_by<'a>(&'a self, scoring_config_id: Uuid) -> BoxFuture<'a, Result<Vec<Uuid>>>;
}

/// Persistence of ranking rows and per-job metadata.
///
/// Every method is atomic on its own. Completion and failure only take effect while the caller
/// still holds the claim it was granted.
pub trait RankingRepository
where
	Self: Send + Sync,
{
	fn claim_calculation<'a>(&'a self, claim: CalculationClaim) -> BoxFuture<'a, Result<bool>>;

	fn complete_calculation<'a>(
		&'a self,
		job_id: Uuid,
		calculation: CompletedCalculation<'a>,
	) -> BoxFuture<'a, Result<bool>>;

	fn fail_calculation<'a>(
		&'a self,
		job_id: Uuid,
		claim_token: Uuid,
		message: &'a str,
		now: OffsetDateTime,
	) -> BoxFuture<'a, Result<bool>>;

	/// Returns how many jobs had a metadata row to mark.
	fn mark_stale<'a>(
		&'a self,
		job_ids: &'a [Uuid],
		trigger: TriggerEvent,
		now: OffsetDateTime,
	) -> BoxFuture<'a, Result<u64>>;

	/// Consistent read of the metadata, up to `limit` non-stale rows by rank, and whether any
	/// stored row is stale.
	fn snapshot<'a>(&'a self, job_id: Uuid, limit: u32) -> BoxFuture<'a, Result<RankingSnapshot>>;

	/// STALE, ERROR and CALCULATING claims older than `claimed_before` first, then COMPLETED
	/// snapshots older than `completed_before`.
	fn jobs_needing_recalculation<'a>(
		&'a self,
		completed_before: OffsetDateTime,
		claimed_before: OffsetDateTime,
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<Uuid>>>;
}

#[derive(Clone, Copy, Debug)]
pub struct CalculationClaim {
	pub job_id: Uuid,
	pub trigger: TriggerEvent,
	pub claim_token: Uuid,
	pub now: OffsetDateTime,
	/// A CALCULATING claim older than this is considered abandoned.
	pub lease: Duration,
}

#[derive(Clone, Debug, Default)]
pub struct RankingSnapshot {
	pub metadata: Option<JobRankingMetadata>,
	pub rankings: Vec<CandidateRanking>,
	pub has_stale_rows: bool,
}

#[derive(Clone)]
pub struct Stores {
	pub assessments: Arc<dyn AssessmentSource>,
	pub configs: Arc<dyn ScoringConfigSource>,
	pub rankings: Arc<dyn RankingRepository>,
}
impl Stores {
	pub fn new(
		assessments: Arc<dyn AssessmentSource>,
		configs: Arc<dyn ScoringConfigSource>,
		rankings: Arc<dyn RankingRepository>,
	) -> Self {
		Self { assessments, configs, rankings }
	}

	/// Uses one backend for all three roles.
	pub fn shared<S>(store: Arc<S>) -> Self
	where
		S: AssessmentSource + ScoringConfigSource + RankingRepository + 'static,
	{
		Self { assessments: store.clone(), configs: store.clone(), rankings: store }
	}
}

/// The ranking orchestrator: the only component that moves a job between ranking states.
pub struct RankingService {
	pub cfg: Ranking,
	pub stores: Stores,
}
impl RankingService {
	pub fn new(cfg: Ranking, stores: Stores) -> Self {
		Self { cfg, stores }
	}

	pub fn with_postgres(cfg: Ranking, db: Db) -> Self {
		Self::new(cfg, Stores::shared(Arc::new(PgStore::new(db))))
	}

	pub fn in_memory(cfg: Ranking, store: Arc<MemoryStore>) -> Self {
		Self::new(cfg, Stores::shared(store))
	}
}
