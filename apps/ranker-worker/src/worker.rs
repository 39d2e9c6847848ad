//! Drains the `ranking_events` outbox and runs the periodic stale-job sweep.

use std::time::Duration as StdDuration;

use color_eyre::Result;
use time::{Duration, OffsetDateTime};
use tokio::time as tokio_time;

use ranker_config::{Events, Scheduler};
use ranker_service::{RankingEvent, RankingService};
use ranker_storage::{db::Db, events, models::RankingEventEntry};

const BASE_BACKOFF_MS: i64 = 500;
const MAX_BACKOFF_MS: i64 = 30_000;
const MAX_EVENT_ERROR_CHARS: usize = 1_024;

pub struct WorkerState {
	pub service: RankingService,
	pub db: Db,
	pub scheduler: Scheduler,
	pub events: Events,
}

pub async fn run_worker(state: WorkerState) -> Result<()> {
	let poll_interval = StdDuration::from_millis(state.events.poll_interval_ms.max(1));
	let sweep_interval = Duration::seconds(i64::from(state.scheduler.sweep_interval_seconds));
	let mut last_sweep: Option<OffsetDateTime> = None;

	tracing::info!(
		poll_interval_ms = state.events.poll_interval_ms,
		sweep_interval_seconds = state.scheduler.sweep_interval_seconds,
		"Ranking worker started."
	);

	loop {
		let processed = match process_ranking_event_once(&state).await {
			Ok(processed) => processed,
			Err(err) => {
				tracing::error!(error = %err, "Ranking event processing failed.");

				false
			},
		};
		let now = OffsetDateTime::now_utc();

		if last_sweep.is_none_or(|at| now - at >= sweep_interval) {
			let batch_size = state.scheduler.sweep_batch_size;

			if let Err(err) = state.service.schedule_stale_job_recalculations(batch_size).await {
				tracing::error!(error = %err, "Stale ranking sweep failed.");
			}

			last_sweep = Some(now);
		}
		// Keep draining while the outbox has work.
		if !processed {
			tokio_time::sleep(poll_interval).await;
		}
	}
}

/// Claims and handles at most one event. Returns whether an event was claimed.
async fn process_ranking_event_once(state: &WorkerState) -> Result<bool> {
	let now = OffsetDateTime::now_utc();
	let lease = Duration::seconds(i64::from(state.events.claim_lease_seconds));
	let Some(entry) = events::claim_next_ranking_event(&state.db, now, lease).await? else {
		return Ok(false);
	};
	let attempts = entry.attempts.saturating_add(1);
	let event = match decode_event(&entry) {
		Ok(event) => event,
		Err(message) => {
			events::mark_ranking_event_dead(
				&state.db,
				entry.event_id,
				attempts,
				&truncate_error(&message),
				OffsetDateTime::now_utc(),
			)
			.await?;
			tracing::error!(
				event_id = %entry.event_id,
				error = %message,
				"Dropped undecodable ranking event."
			);

			return Ok(true);
		},
	};

	match state.service.handle_event(event).await {
		Ok(outcome) => {
			events::mark_ranking_event_done(&state.db, entry.event_id, OffsetDateTime::now_utc())
				.await?;
			tracing::info!(
				event_id = %entry.event_id,
				kind = event.kind(),
				jobs_marked = outcome.jobs_marked,
				succeeded = outcome.recalculation.succeeded,
				failed = outcome.recalculation.failed,
				"Ranking event handled."
			);
		},
		Err(err) => {
			let message = truncate_error(&err.to_string());
			let now = OffsetDateTime::now_utc();

			if attempts >= max_attempts(&state.events) {
				events::mark_ranking_event_dead(&state.db, entry.event_id, attempts, &message, now)
					.await?;
				tracing::error!(
					event_id = %entry.event_id,
					attempts,
					error = %err,
					"Ranking event exhausted its attempts."
				);
			} else {
				let available_at = now + backoff_for_attempt(attempts);

				events::mark_ranking_event_failed(
					&state.db,
					entry.event_id,
					attempts,
					&message,
					available_at,
					now,
				)
				.await?;
				tracing::warn!(
					event_id = %entry.event_id,
					attempts,
					error = %err,
					"Ranking event failed. Will retry."
				);
			}
		},
	}

	Ok(true)
}

fn decode_event(entry: &RankingEventEntry) -> std::result::Result<RankingEvent, String> {
	let event = RankingEvent::from_payload(entry.payload.clone()).map_err(|err| err.to_string())?;

	if event.kind() != entry.kind {
		return Err(format!(
			"Event kind column {:?} does not match payload kind {:?}.",
			entry.kind,
			event.kind()
		));
	}

	Ok(event)
}

fn max_attempts(cfg: &Events) -> i32 {
	i32::try_from(cfg.max_attempts).unwrap_or(i32::MAX).max(1)
}

fn backoff_for_attempt(attempt: i32) -> Duration {
	let exp = attempt.max(1).saturating_sub(1).min(6);
	let capped = BASE_BACKOFF_MS.saturating_mul(1 << exp).min(MAX_BACKOFF_MS);

	Duration::milliseconds(capped)
}

fn truncate_error(text: &str) -> String {
	text.chars().take(MAX_EVENT_ERROR_CHARS).collect()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn backoff_doubles_then_caps() {
		assert_eq!(backoff_for_attempt(0), Duration::milliseconds(500));
		assert_eq!(backoff_for_attempt(1), Duration::milliseconds(500));
		assert_eq!(backoff_for_attempt(2), Duration::milliseconds(1_000));
		assert_eq!(backoff_for_attempt(4), Duration::milliseconds(4_000));
		assert_eq!(backoff_for_attempt(7), Duration::milliseconds(30_000));
		assert_eq!(backoff_for_attempt(i32::MAX), Duration::milliseconds(30_000));
	}

	#[test]
	fn error_text_is_bounded() {
		let long = "x".repeat(MAX_EVENT_ERROR_CHARS * 2);

		assert_eq!(truncate_error(&long).chars().count(), MAX_EVENT_ERROR_CHARS);
		assert_eq!(truncate_error("short"), "short");
	}

	#[test]
	fn attempts_floor_at_one() {
		let cfg = Events { poll_interval_ms: 500, claim_lease_seconds: 30, max_attempts: 0 };

		assert_eq!(max_attempts(&cfg), 1);
	}
}
