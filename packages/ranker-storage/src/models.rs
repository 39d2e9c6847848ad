use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

use ranker_domain::{
	AssessmentQuestion, CandidateRanking, ConfigBinding, JobRankingMetadata, RankingStatus,
	ScoringConfig,
};

use crate::{Error, Result};

#[derive(Debug, sqlx::FromRow)]
pub struct CandidateRankingRow {
	pub job_id: Uuid,
	pub applicant_id: Uuid,
	pub assessment_id: Uuid,
	pub rank: i32,
	pub score: f64,
	pub max_possible_score: f64,
	pub percentage: f64,
	pub correct_answers: i32,
	pub incorrect_answers: i32,
	pub recency_bonus: f64,
	pub scoring_config_version: String,
	pub calculated_at: OffsetDateTime,
	pub is_stale: bool,
}
impl TryFrom<CandidateRankingRow> for CandidateRanking {
	type Error = Error;

	fn try_from(row: CandidateRankingRow) -> Result<Self> {
		Ok(Self {
			job_id: row.job_id,
			applicant_id: row.applicant_id,
			assessment_id: row.assessment_id,
			rank: non_negative("candidate_rankings.rank", row.rank)?,
			score: row.score,
			max_possible_score: row.max_possible_score,
			percentage: row.percentage,
			correct_answers: non_negative(
				"candidate_rankings.correct_answers",
				row.correct_answers,
			)?,
			incorrect_answers: non_negative(
				"candidate_rankings.incorrect_answers",
				row.incorrect_answers,
			)?,
			recency_bonus: row.recency_bonus,
			scoring_config_version: row.scoring_config_version,
			calculated_at: row.calculated_at,
			is_stale: row.is_stale,
		})
	}
}

#[derive(Debug, sqlx::FromRow)]
pub struct JobRankingMetadataRow {
	pub job_id: Uuid,
	pub status: String,
	pub total_candidates: i32,
	pub last_calculated_at: Option<OffsetDateTime>,
	pub calculation_duration_ms: Option<i64>,
	pub scoring_config_version: Option<String>,
	pub trigger_event: Option<String>,
	pub error_message: Option<String>,
	pub claim_token: Option<Uuid>,
	pub updated_at: OffsetDateTime,
}
impl TryFrom<JobRankingMetadataRow> for JobRankingMetadata {
	type Error = Error;

	fn try_from(row: JobRankingMetadataRow) -> Result<Self> {
		let status = row
			.status
			.parse::<RankingStatus>()
			.map_err(|err| Error::Corrupt(err.to_string()))?;
		let calculation_duration_ms = row
			.calculation_duration_ms
			.map(|ms| {
				u64::try_from(ms).map_err(|_| {
					Error::Corrupt(format!("Negative calculation duration for job {}.", row.job_id))
				})
			})
			.transpose()?;

		Ok(Self {
			job_id: row.job_id,
			status,
			total_candidates: non_negative(
				"job_ranking_metadata.total_candidates",
				row.total_candidates,
			)?,
			last_calculated_at: row.last_calculated_at,
			calculation_duration_ms,
			scoring_config_version: row.scoring_config_version,
			trigger_event: row.trigger_event,
			error_message: row.error_message,
		})
	}
}

#[derive(Debug, sqlx::FromRow)]
pub struct ScoringConfigRow {
	pub scoring_config_id: Uuid,
	pub is_default: bool,
	pub job_id: Option<Uuid>,
	pub negative_marking_fraction: f64,
	pub recency_window_days: Option<i32>,
	pub recency_boost_percent: Option<f64>,
	pub updated_at: OffsetDateTime,
}
impl TryFrom<ScoringConfigRow> for ScoringConfig {
	type Error = Error;

	fn try_from(row: ScoringConfigRow) -> Result<Self> {
		let binding = ConfigBinding::from_columns(row.is_default, row.job_id).ok_or_else(|| {
			Error::Corrupt(format!(
				"Scoring config {} must be either the default or bound to one job.",
				row.scoring_config_id
			))
		})?;
		let recency_window_days = row
			.recency_window_days
			.map(|days| non_negative("scoring_configs.recency_window_days", days))
			.transpose()?;

		Ok(Self {
			scoring_config_id: row.scoring_config_id,
			binding,
			negative_marking_fraction: row.negative_marking_fraction,
			recency_window_days,
			recency_boost_percent: row.recency_boost_percent,
			updated_at: row.updated_at,
		})
	}
}

#[derive(Debug, sqlx::FromRow)]
pub struct QuestionRow {
	pub question_id: Uuid,
	pub weight: f64,
	pub correct_answer: String,
	pub negative_weight: Option<f64>,
}
impl From<QuestionRow> for AssessmentQuestion {
	fn from(row: QuestionRow) -> Self {
		Self {
			question_id: row.question_id,
			weight: row.weight,
			correct_answer: row.correct_answer,
			negative_weight: row.negative_weight,
		}
	}
}

/// One answer of an applicant's latest submission, or a bare submission row when the
/// assessment has no answers.
#[derive(Debug, sqlx::FromRow)]
pub struct LatestAnswerRow {
	pub applicant_id: Uuid,
	pub applicant_assessment_id: Uuid,
	pub submitted_at: OffsetDateTime,
	pub question_id: Option<Uuid>,
	pub raw_answer: Option<String>,
	pub is_correct: Option<bool>,
}

#[derive(Debug, sqlx::FromRow)]
pub struct RankingEventEntry {
	pub event_id: Uuid,
	pub kind: String,
	pub payload: Value,
	pub status: String,
	pub attempts: i32,
	pub last_error: Option<String>,
	pub available_at: OffsetDateTime,
	pub created_at: OffsetDateTime,
	pub updated_at: OffsetDateTime,
}

fn non_negative(column: &str, value: i32) -> Result<u32> {
	u32::try_from(value).map_err(|_| Error::Corrupt(format!("{column} is negative: {value}.")))
}
