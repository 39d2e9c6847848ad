use serde::Serialize;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use ranker_domain::TriggerEvent;

use crate::{BulkPriority, RankingService, Result};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
	pub considered: u32,
	pub succeeded: u32,
	pub failed: u32,
}

impl RankingService {
	/// STALE, ERROR and abandoned CALCULATING jobs first, then COMPLETED jobs older than the
	/// freshness window, oldest first.
	///
	/// A CALCULATING job is abandoned once its claim is older than `calculation_lease_seconds`.
	pub async fn list_jobs_needing_recalculation(&self, limit: u32) -> Result<Vec<Uuid>> {
		let now = OffsetDateTime::now_utc();
		let window = Duration::hours(i64::from(self.cfg.freshness_window_hours));
		let lease = Duration::seconds(i64::from(self.cfg.calculation_lease_seconds));

		self.stores.rankings.jobs_needing_recalculation(now - window, now - lease, limit).await
	}

	/// One scheduler tick: recalculates up to `batch_size` jobs that need it.
	pub async fn schedule_stale_job_recalculations(&self, batch_size: u32) -> Result<SweepReport> {
		let job_ids = self.list_jobs_needing_recalculation(batch_size).await?;

		if job_ids.is_empty() {
			return Ok(SweepReport::default());
		}

		let bulk = self
			.process_bulk_rankings(&job_ids, TriggerEvent::ScheduledSweep, BulkPriority::Normal)
			.await;
		let report = SweepReport {
			considered: u32::try_from(job_ids.len()).unwrap_or(u32::MAX),
			succeeded: bulk.succeeded,
			failed: bulk.failed,
		};

		tracing::info!(
			considered = report.considered,
			succeeded = report.succeeded,
			failed = report.failed,
			"Stale ranking sweep finished."
		);

		Ok(report)
	}
}
