use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::PgExecutor;
use time::OffsetDateTime;
use uuid::Uuid;

use ranker_domain::TriggerEvent;

use crate::{BulkPriority, BulkReport, Error, InvalidationTarget, RankingService, Result};

/// A change elsewhere in the system that makes rankings outdated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RankingEvent {
	AssessmentSubmitted {
		applicant_id: Uuid,
		job_id: Uuid,
	},
	/// `job_id` names the job a job-specific config was bound to. It still reaches that job after
	/// the config row itself is gone.
	ScoringConfigChanged {
		scoring_config_id: Uuid,
		#[serde(default, skip_serializing_if = "Option::is_none")]
		job_id: Option<Uuid>,
	},
	JobChanged {
		job_id: Uuid,
	},
}
impl RankingEvent {
	pub const fn kind(&self) -> &'static str {
		match self {
			Self::AssessmentSubmitted { .. } => "assessment_submitted",
			Self::ScoringConfigChanged { .. } => "scoring_config_changed",
			Self::JobChanged { .. } => "job_changed",
		}
	}

	pub const fn trigger(&self) -> TriggerEvent {
		match self {
			Self::AssessmentSubmitted { .. } => TriggerEvent::AssessmentSubmitted,
			Self::ScoringConfigChanged { .. } => TriggerEvent::ScoringConfigChanged,
			Self::JobChanged { .. } => TriggerEvent::JobChanged,
		}
	}

	/// New submissions are what recruiters wait for. A config change may fan out to every job.
	pub const fn priority(&self) -> BulkPriority {
		match self {
			Self::AssessmentSubmitted { .. } => BulkPriority::High,
			Self::JobChanged { .. } => BulkPriority::Normal,
			Self::ScoringConfigChanged { .. } => BulkPriority::Low,
		}
	}

	pub fn invalidation_targets(&self) -> Vec<InvalidationTarget> {
		match *self {
			Self::AssessmentSubmitted { job_id, .. } | Self::JobChanged { job_id } =>
				vec![InvalidationTarget::Job(job_id)],
			Self::ScoringConfigChanged { scoring_config_id, job_id } => {
				let mut targets = vec![InvalidationTarget::ScoringConfig(scoring_config_id)];

				targets.extend(job_id.map(InvalidationTarget::Job));

				targets
			},
		}
	}

	pub fn to_payload(&self) -> Result<Value> {
		serde_json::to_value(self).map_err(|err| Error::InvalidRequest {
			message: format!("Failed to encode ranking event: {err}."),
		})
	}

	pub fn from_payload(payload: Value) -> Result<Self> {
		serde_json::from_value(payload).map_err(|err| Error::InvalidRequest {
			message: format!("Malformed ranking event payload: {err}."),
		})
	}
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EventOutcome {
	pub jobs_marked: u64,
	pub recalculation: BulkReport,
}

impl RankingService {
	/// Invalidates the jobs the event touches, then recalculates them at the event's priority.
	///
	/// Only a failed invalidation is an error. Jobs whose recalculation fails stay STALE or ERROR
	/// and are picked up by the next sweep.
	pub async fn handle_event(&self, event: RankingEvent) -> Result<EventOutcome> {
		let trigger = event.trigger();
		let invalidation = self.invalidate_all(&event.invalidation_targets(), trigger).await?;
		let recalculation = self
			.process_bulk_rankings(&invalidation.affected_jobs, trigger, event.priority())
			.await;

		Ok(EventOutcome { jobs_marked: invalidation.jobs_marked, recalculation })
	}
}

/// Queues an event in the `ranking_events` outbox, typically inside the producer's transaction.
pub async fn enqueue<'e, E>(executor: E, event: &RankingEvent) -> Result<Uuid>
where
	E: PgExecutor<'e>,
{
	let payload = event.to_payload()?;
	let event_id = ranker_storage::events::enqueue_ranking_event(
		executor,
		event.kind(),
		&payload,
		OffsetDateTime::now_utc(),
	)
	.await?;

	Ok(event_id)
}
