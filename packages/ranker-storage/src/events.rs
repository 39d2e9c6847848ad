use serde_json::Value;
use sqlx::PgExecutor;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::{Result, db::Db, models::RankingEventEntry};

/// Queues an event for the worker. Accepts any executor so producers can enqueue inside their
/// own write transaction.
pub async fn enqueue_ranking_event<'e, E>(
	executor: E,
	kind: &str,
	payload: &Value,
	now: OffsetDateTime,
) -> Result<Uuid>
where
	E: PgExecutor<'e>,
{
	let event_id = Uuid::new_v4();

	sqlx::query(
		"\
INSERT INTO ranking_events (event_id, kind, payload, status, available_at, created_at, updated_at)
VALUES ($1, $2, $3, 'PENDING', $4, $4, $4)",
	)
	.bind(event_id)
	.bind(kind)
	.bind(payload)
	.bind(now)
	.execute(executor)
	.await?;

	Ok(event_id)
}

/// Claims the oldest available event and leases it for `lease`.
///
/// A CLAIMED event whose lease ran out is available again, so a crashed worker does not strand
/// its event.
pub async fn claim_next_ranking_event(
	db: &Db,
	now: OffsetDateTime,
	lease: Duration,
) -> Result<Option<RankingEventEntry>> {
	let mut tx = db.pool.begin().await?;
	let row = sqlx::query_as::<_, RankingEventEntry>(
		"\
SELECT
	event_id,
	kind,
	payload,
	status,
	attempts,
	last_error,
	available_at,
	created_at,
	updated_at
FROM ranking_events
WHERE status IN ('PENDING', 'FAILED', 'CLAIMED') AND available_at <= $1
ORDER BY available_at ASC, created_at ASC
LIMIT 1
FOR UPDATE SKIP LOCKED",
	)
	.bind(now)
	.fetch_optional(&mut *tx)
	.await?;
	let event = if let Some(mut event) = row {
		let lease_until = now + lease;

		sqlx::query(
			"\
UPDATE ranking_events
SET status = 'CLAIMED', available_at = $1, updated_at = $2
WHERE event_id = $3",
		)
		.bind(lease_until)
		.bind(now)
		.bind(event.event_id)
		.execute(&mut *tx)
		.await?;

		event.status = "CLAIMED".to_string();
		event.available_at = lease_until;
		event.updated_at = now;

		Some(event)
	} else {
		None
	};

	tx.commit().await?;

	Ok(event)
}

pub async fn mark_ranking_event_done(db: &Db, event_id: Uuid, now: OffsetDateTime) -> Result<()> {
	sqlx::query("UPDATE ranking_events SET status = 'DONE', updated_at = $1 WHERE event_id = $2")
		.bind(now)
		.bind(event_id)
		.execute(&db.pool)
		.await?;

	Ok(())
}

/// Records a failed attempt. The event becomes claimable again at `available_at`.
pub async fn mark_ranking_event_failed(
	db: &Db,
	event_id: Uuid,
	attempts: i32,
	error_text: &str,
	available_at: OffsetDateTime,
	now: OffsetDateTime,
) -> Result<()> {
	sqlx::query(
		"\
UPDATE ranking_events
SET
	status = 'FAILED',
	attempts = $1,
	last_error = $2,
	available_at = $3,
	updated_at = $4
WHERE event_id = $5",
	)
	.bind(attempts)
	.bind(error_text)
	.bind(available_at)
	.bind(now)
	.bind(event_id)
	.execute(&db.pool)
	.await?;

	Ok(())
}

/// Parks an event that exhausted its attempts or cannot be decoded. DEAD events are never claimed.
pub async fn mark_ranking_event_dead(
	db: &Db,
	event_id: Uuid,
	attempts: i32,
	error_text: &str,
	now: OffsetDateTime,
) -> Result<()> {
	sqlx::query(
		"\
UPDATE ranking_events
SET
	status = 'DEAD',
	attempts = $1,
	last_error = $2,
	updated_at = $3
WHERE event_id = $4",
	)
	.bind(attempts)
	.bind(error_text)
	.bind(now)
	.bind(event_id)
	.execute(&db.pool)
	.await?;

	Ok(())
}
