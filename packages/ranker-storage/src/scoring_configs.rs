use sqlx::PgExecutor;
use uuid::Uuid;

use ranker_domain::ScoringConfig;

use crate::{Result, models::ScoringConfigRow};

const CONFIG_COLUMNS: &str = "\
scoring_config_id,
	is_default,
	job_id,
	negative_marking_fraction,
	recency_window_days,
	recency_boost_percent,
	updated_at";

/// The job's own config and the global default, whichever exist. Resolution between the two is
/// left to the caller.
pub async fn fetch_candidate_configs<'e, E>(
	executor: E,
	job_id: Uuid,
) -> Result<Vec<ScoringConfig>>
where
	E: PgExecutor<'e>,
{
	let sql = format!(
		"SELECT\n\t{CONFIG_COLUMNS}\nFROM scoring_configs\nWHERE job_id = $1 OR is_default"
	);
	let rows = sqlx::query_as::<_, ScoringConfigRow>(&sql).bind(job_id).fetch_all(executor).await?;

	rows.into_iter().map(ScoringConfig::try_from).collect()
}

pub async fn fetch_scoring_config<'e, E>(
	executor: E,
	scoring_config_id: Uuid,
) -> Result<Option<ScoringConfig>>
where
	E: PgExecutor<'e>,
{
	let sql =
		format!("SELECT\n\t{CONFIG_COLUMNS}\nFROM scoring_configs\nWHERE scoring_config_id = $1");
	let row = sqlx::query_as::<_, ScoringConfigRow>(&sql)
		.bind(scoring_config_id)
		.fetch_optional(executor)
		.await?;

	row.map(ScoringConfig::try_from).transpose()
}

/// Jobs whose effective config is `scoring_config_id`: the job it is bound to, or every job
/// without its own config when it is the default.
pub async fn jobs_governed_by<'e, E>(executor: E, scoring_config_id: Uuid) -> Result<Vec<Uuid>>
where
	E: PgExecutor<'e>,
{
	let job_ids: Vec<Uuid> = sqlx::query_scalar(
		"\
SELECT j.job_id
FROM jobs j
JOIN scoring_configs c ON c.scoring_config_id = $1
WHERE j.job_id = c.job_id
	OR (
		c.is_default
		AND NOT EXISTS (SELECT 1 FROM scoring_configs own WHERE own.job_id = j.job_id)
	)
ORDER BY j.job_id",
	)
	.bind(scoring_config_id)
	.fetch_all(executor)
	.await?;

	Ok(job_ids)
}
