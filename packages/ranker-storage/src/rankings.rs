use sqlx::{PgExecutor, Postgres, Transaction};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use ranker_domain::{CandidateRanking, TriggerEvent};

use crate::{
	Error, Result,
	db::Db,
	models::{CandidateRankingRow, JobRankingMetadataRow},
};

const METADATA_COLUMNS: &str = "\
job_id,
	status,
	total_candidates,
	last_calculated_at,
	calculation_duration_ms,
	scoring_config_version,
	trigger_event,
	error_message,
	claim_token,
	updated_at";

/// Ranking rows written by one finished calculation pass.
pub struct CompletedCalculation<'a> {
	pub claim_token: Uuid,
	pub scoring_config_version: &'a str,
	pub calculated_at: OffsetDateTime,
	pub duration_ms: u64,
	pub rankings: &'a [CandidateRanking],
}

/// Moves a job to CALCULATING under a fresh claim token.
///
/// Creates the metadata row when the job has never been calculated. Returns `false` when
/// another pass holds a claim younger than `lease`.
pub async fn claim_calculation(
	db: &Db,
	job_id: Uuid,
	trigger: TriggerEvent,
	claim_token: Uuid,
	now: OffsetDateTime,
	lease: Duration,
) -> Result<bool> {
	let claimed: Option<Uuid> = sqlx::query_scalar(
		"\
INSERT INTO job_ranking_metadata (
	job_id,
	status,
	total_candidates,
	trigger_event,
	claim_token,
	created_at,
	updated_at
)
VALUES ($1, 'CALCULATING', 0, $2, $3, $4, $4)
ON CONFLICT (job_id) DO UPDATE
SET
	status = 'CALCULATING',
	trigger_event = EXCLUDED.trigger_event,
	claim_token = EXCLUDED.claim_token,
	updated_at = EXCLUDED.updated_at
WHERE job_ranking_metadata.status <> 'CALCULATING'
	OR job_ranking_metadata.updated_at < $5
RETURNING job_id",
	)
	.bind(job_id)
	.bind(trigger.as_str())
	.bind(claim_token)
	.bind(now)
	.bind(now - lease)
	.fetch_optional(&db.pool)
	.await
	.map_err(|err| {
		if err.as_database_error().is_some_and(|db_err| db_err.is_foreign_key_violation()) {
			Error::NotFound(format!("Job {job_id} does not exist."))
		} else {
			Error::Sqlx(err)
		}
	})?;

	Ok(claimed.is_some())
}

/// Replaces every ranking row of the job and moves it to COMPLETED, all in one transaction.
///
/// Returns `false` and writes nothing when the claim was lost, either to an invalidation or to a
/// lease takeover.
pub async fn complete_calculation(
	db: &Db,
	job_id: Uuid,
	calculation: &CompletedCalculation<'_>,
) -> Result<bool> {
	let total_candidates = i32::try_from(calculation.rankings.len()).map_err(|_| {
		Error::InvalidArgument(format!("Too many candidates for job {job_id}."))
	})?;
	let duration_ms = i64::try_from(calculation.duration_ms).map_err(|_| {
		Error::InvalidArgument("Calculation duration is out of range.".to_string())
	})?;
	let mut tx = db.pool.begin().await?;
	let updated = sqlx::query(
		"\
UPDATE job_ranking_metadata
SET
	status = 'COMPLETED',
	total_candidates = $2,
	last_calculated_at = $3,
	calculation_duration_ms = $4,
	scoring_config_version = $5,
	error_message = NULL,
	claim_token = NULL,
	updated_at = $3
WHERE job_id = $1
	AND status = 'CALCULATING'
	AND claim_token = $6",
	)
	.bind(job_id)
	.bind(total_candidates)
	.bind(calculation.calculated_at)
	.bind(duration_ms)
	.bind(calculation.scoring_config_version)
	.bind(calculation.claim_token)
	.execute(&mut *tx)
	.await?;

	if updated.rows_affected() == 0 {
		tx.rollback().await?;

		return Ok(false);
	}

	replace_rankings_tx(&mut tx, job_id, calculation).await?;

	tx.commit().await?;

	Ok(true)
}

async fn replace_rankings_tx(
	tx: &mut Transaction<'_, Postgres>,
	job_id: Uuid,
	calculation: &CompletedCalculation<'_>,
) -> Result<()> {
	let rows = calculation.rankings;
	let mut applicant_ids = Vec::with_capacity(rows.len());
	let mut assessment_ids = Vec::with_capacity(rows.len());
	let mut ranks = Vec::with_capacity(rows.len());
	let mut scores = Vec::with_capacity(rows.len());
	let mut max_scores = Vec::with_capacity(rows.len());
	let mut percentages = Vec::with_capacity(rows.len());
	let mut correct = Vec::with_capacity(rows.len());
	let mut incorrect = Vec::with_capacity(rows.len());
	let mut bonuses = Vec::with_capacity(rows.len());

	for row in rows {
		if row.job_id != job_id {
			return Err(Error::InvalidArgument(format!(
				"Ranking for applicant {} belongs to job {}, not {job_id}.",
				row.applicant_id, row.job_id
			)));
		}

		applicant_ids.push(row.applicant_id);
		assessment_ids.push(row.assessment_id);
		ranks.push(to_i32("rank", row.rank)?);
		scores.push(row.score);
		max_scores.push(row.max_possible_score);
		percentages.push(row.percentage);
		correct.push(to_i32("correct_answers", row.correct_answers)?);
		incorrect.push(to_i32("incorrect_answers", row.incorrect_answers)?);
		bonuses.push(row.recency_bonus);
	}

	sqlx::query("DELETE FROM candidate_rankings WHERE job_id = $1")
		.bind(job_id)
		.execute(&mut **tx)
		.await?;

	if rows.is_empty() {
		return Ok(());
	}

	sqlx::query(
		"\
INSERT INTO candidate_rankings (
	job_id,
	applicant_id,
	assessment_id,
	rank,
	score,
	max_possible_score,
	percentage,
	correct_answers,
	incorrect_answers,
	recency_bonus,
	scoring_config_version,
	calculated_at,
	is_stale
)
SELECT
	$1,
	applicant_id,
	assessment_id,
	rank,
	score,
	max_possible_score,
	percentage,
	correct_answers,
	incorrect_answers,
	recency_bonus,
	$11,
	$12,
	false
FROM unnest(
	$2::uuid[],
	$3::uuid[],
	$4::int4[],
	$5::float8[],
	$6::float8[],
	$7::float8[],
	$8::int4[],
	$9::int4[],
	$10::float8[]
) AS t(
	applicant_id,
	assessment_id,
	rank,
	score,
	max_possible_score,
	percentage,
	correct_answers,
	incorrect_answers,
	recency_bonus
)",
	)
	.bind(job_id)
	.bind(&applicant_ids)
	.bind(&assessment_ids)
	.bind(&ranks)
	.bind(&scores)
	.bind(&max_scores)
	.bind(&percentages)
	.bind(&correct)
	.bind(&incorrect)
	.bind(&bonuses)
	.bind(calculation.scoring_config_version)
	.bind(calculation.calculated_at)
	.execute(&mut **tx)
	.await?;

	Ok(())
}

/// Moves a claimed job to ERROR. Prior ranking rows are left untouched.
pub async fn fail_calculation(
	db: &Db,
	job_id: Uuid,
	claim_token: Uuid,
	message: &str,
	now: OffsetDateTime,
) -> Result<bool> {
	let updated = sqlx::query(
		"\
UPDATE job_ranking_metadata
SET
	status = 'ERROR',
	error_message = $3,
	claim_token = NULL,
	updated_at = $4
WHERE job_id = $1
	AND status = 'CALCULATING'
	AND claim_token = $2",
	)
	.bind(job_id)
	.bind(claim_token)
	.bind(message)
	.bind(now)
	.execute(&db.pool)
	.await?;

	Ok(updated.rows_affected() > 0)
}

/// Marks the jobs STALE and flags all of their ranking rows, atomically.
///
/// Jobs without a metadata row are skipped. Returns how many metadata rows were marked.
pub async fn mark_jobs_stale(
	db: &Db,
	job_ids: &[Uuid],
	trigger: TriggerEvent,
	now: OffsetDateTime,
) -> Result<u64> {
	if job_ids.is_empty() {
		return Ok(0);
	}

	let mut tx = db.pool.begin().await?;
	let marked = sqlx::query(
		"\
UPDATE job_ranking_metadata
SET
	status = 'STALE',
	trigger_event = $2,
	claim_token = NULL,
	updated_at = $3
WHERE job_id = ANY($1)",
	)
	.bind(job_ids)
	.bind(trigger.as_str())
	.bind(now)
	.execute(&mut *tx)
	.await?;

	sqlx::query(
		"UPDATE candidate_rankings SET is_stale = true WHERE job_id = ANY($1) AND NOT is_stale",
	)
	.bind(job_ids)
	.execute(&mut *tx)
	.await?;

	tx.commit().await?;

	Ok(marked.rows_affected())
}

pub async fn fetch_metadata<'e, E>(
	executor: E,
	job_id: Uuid,
) -> Result<Option<JobRankingMetadataRow>>
where
	E: PgExecutor<'e>,
{
	let sql = format!("SELECT\n\t{METADATA_COLUMNS}\nFROM job_ranking_metadata\nWHERE job_id = $1");
	let row = sqlx::query_as::<_, JobRankingMetadataRow>(&sql)
		.bind(job_id)
		.fetch_optional(executor)
		.await?;

	Ok(row)
}

/// Non-stale rankings of one job, best rank first.
pub async fn fetch_top_rankings<'e, E>(
	executor: E,
	job_id: Uuid,
	limit: u32,
) -> Result<Vec<CandidateRankingRow>>
where
	E: PgExecutor<'e>,
{
	let rows = sqlx::query_as::<_, CandidateRankingRow>(
		"\
SELECT
	job_id,
	applicant_id,
	assessment_id,
	rank,
	score,
	max_possible_score,
	percentage,
	correct_answers,
	incorrect_answers,
	recency_bonus,
	scoring_config_version,
	calculated_at,
	is_stale
FROM candidate_rankings
WHERE job_id = $1 AND NOT is_stale
ORDER BY rank ASC
LIMIT $2",
	)
	.bind(job_id)
	.bind(i64::from(limit))
	.fetch_all(executor)
	.await?;

	Ok(rows)
}

pub async fn has_stale_rankings<'e, E>(executor: E, job_id: Uuid) -> Result<bool>
where
	E: PgExecutor<'e>,
{
	let stale: bool = sqlx::query_scalar(
		"SELECT EXISTS (SELECT 1 FROM candidate_rankings WHERE job_id = $1 AND is_stale)",
	)
	.bind(job_id)
	.fetch_one(executor)
	.await?;

	Ok(stale)
}

/// STALE, ERROR and abandoned CALCULATING jobs first, then COMPLETED jobs last calculated before
/// `completed_before`, oldest first.
///
/// A CALCULATING job counts as abandoned once its claim was last touched before `claimed_before`.
pub async fn list_jobs_needing_recalculation<'e, E>(
	executor: E,
	completed_before: OffsetDateTime,
	claimed_before: OffsetDateTime,
	limit: u32,
) -> Result<Vec<Uuid>>
where
	E: PgExecutor<'e>,
{
	let job_ids: Vec<Uuid> = sqlx::query_scalar(
		"\
SELECT job_id
FROM job_ranking_metadata
WHERE status IN ('STALE', 'ERROR')
	OR (status = 'CALCULATING' AND updated_at < $2)
	OR (status = 'COMPLETED' AND last_calculated_at < $1)
ORDER BY
	CASE WHEN status = 'COMPLETED' THEN 1 ELSE 0 END,
	last_calculated_at ASC NULLS FIRST,
	job_id ASC
LIMIT $3",
	)
	.bind(completed_before)
	.bind(claimed_before)
	.bind(i64::from(limit))
	.fetch_all(executor)
	.await?;

	Ok(job_ids)
}

fn to_i32(column: &str, value: u32) -> Result<i32> {
	i32::try_from(value)
		.map_err(|_| Error::InvalidArgument(format!("Ranking {column} is out of range: {value}.")))
}
