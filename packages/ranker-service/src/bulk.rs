use std::collections::HashSet;

use futures::{StreamExt, stream};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use ranker_domain::TriggerEvent;

use crate::{RankingCalculationResult, RankingService};

/// Selects how many jobs of one batch are recalculated at the same time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BulkPriority {
	/// One job at a time.
	Low,
	/// Half of `ranking.bulk.max_concurrency`, at least one.
	#[default]
	Normal,
	/// The full `ranking.bulk.max_concurrency`.
	High,
}
impl BulkPriority {
	pub fn concurrency(self, max_concurrency: u32) -> usize {
		let max = usize::try_from(max_concurrency).unwrap_or(usize::MAX).max(1);

		match self {
			Self::Low => 1,
			Self::Normal => (max / 2).max(1),
			Self::High => max,
		}
	}
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BulkJobOutcome {
	pub job_id: Uuid,
	pub result: BulkJobResult,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BulkJobResult {
	Completed(RankingCalculationResult),
	Failed { message: String, retryable: bool },
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct BulkReport {
	/// One entry per distinct job id, in input order.
	pub outcomes: Vec<BulkJobOutcome>,
	pub succeeded: u32,
	pub failed: u32,
}

impl RankingService {
	/// Recalculates every job independently. A failing job never aborts the others.
	pub async fn process_bulk_rankings(
		&self,
		job_ids: &[Uuid],
		trigger: TriggerEvent,
		priority: BulkPriority,
	) -> BulkReport {
		let mut seen = HashSet::with_capacity(job_ids.len());
		let unique =
			job_ids.iter().copied().filter(|job_id| seen.insert(*job_id)).collect::<Vec<_>>();
		let width = priority.concurrency(self.cfg.bulk.max_concurrency);
		let mut finished = stream::iter(unique.into_iter().enumerate())
			.map(|(idx, job_id)| async move {
				let result = match self.recalculate(job_id, trigger).await {
					Ok(result) => BulkJobResult::Completed(result),
					Err(err) => {
						tracing::warn!(%job_id, %trigger, error = %err, "Bulk ranking job failed.");

						BulkJobResult::Failed {
							message: err.to_string(),
							retryable: err.is_retryable(),
						}
					},
				};

				(idx, BulkJobOutcome { job_id, result })
			})
			.buffer_unordered(width)
			.collect::<Vec<_>>()
			.await;

		finished.sort_by_key(|(idx, _)| *idx);

		let mut report = BulkReport::default();

		for (_, outcome) in finished {
			match outcome.result {
				BulkJobResult::Completed(_) => report.succeeded += 1,
				BulkJobResult::Failed { .. } => report.failed += 1,
			}

			report.outcomes.push(outcome);
		}

		tracing::info!(
			%trigger,
			?priority,
			concurrency = width,
			succeeded = report.succeeded,
			failed = report.failed,
			"Bulk ranking batch finished."
		);

		report
	}
}
