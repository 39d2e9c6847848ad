use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// One submitted answer. Immutable once its assessment is submitted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Answer {
	pub question_id: Uuid,
	pub applicant_assessment_id: Uuid,
	pub raw_answer: String,
	pub is_correct: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AssessmentQuestion {
	pub question_id: Uuid,
	pub weight: f64,
	pub correct_answer: String,
	/// Replaces `weight * negative_marking_fraction` as the penalty for a wrong answer.
	pub negative_weight: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ApplicantAssessment {
	pub applicant_assessment_id: Uuid,
	pub applicant_id: Uuid,
	pub job_id: Uuid,
	pub template_id: Uuid,
	#[serde(with = "time::serde::rfc3339::option")]
	pub submitted_at: Option<OffsetDateTime>,
}

/// The latest submitted assessment of one applicant for one job, with its answers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ApplicantSubmission {
	pub applicant_id: Uuid,
	pub assessment_id: Uuid,
	#[serde(with = "time::serde::rfc3339")]
	pub submitted_at: OffsetDateTime,
	pub answers: Vec<Answer>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "job_id", rename_all = "snake_case")]
pub enum ConfigBinding {
	Default,
	Job(Uuid),
}
impl ConfigBinding {
	pub fn from_columns(is_default: bool, job_id: Option<Uuid>) -> Option<Self> {
		match (is_default, job_id) {
			(true, None) => Some(Self::Default),
			(false, Some(job_id)) => Some(Self::Job(job_id)),
			_ => None,
		}
	}

	pub fn is_default(self) -> bool {
		matches!(self, Self::Default)
	}

	pub fn job_id(self) -> Option<Uuid> {
		match self {
			Self::Default => None,
			Self::Job(job_id) => Some(job_id),
		}
	}
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
	pub scoring_config_id: Uuid,
	pub binding: ConfigBinding,
	pub negative_marking_fraction: f64,
	pub recency_window_days: Option<u32>,
	pub recency_boost_percent: Option<f64>,
	#[serde(with = "time::serde::rfc3339")]
	pub updated_at: OffsetDateTime,
}
impl ScoringConfig {
	/// Both knobs must be present for the recency bonus to apply.
	pub fn recency(&self) -> Option<(u32, f64)> {
		match (self.recency_window_days, self.recency_boost_percent) {
			(Some(days), Some(percent)) => Some((days, percent)),
			_ => None,
		}
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RankingStatus {
	Calculating,
	Completed,
	Stale,
	Error,
}
impl RankingStatus {
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Calculating => "CALCULATING",
			Self::Completed => "COMPLETED",
			Self::Stale => "STALE",
			Self::Error => "ERROR",
		}
	}
}

impl fmt::Display for RankingStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for RankingStatus {
	type Err = UnknownLabel;

	fn from_str(raw: &str) -> Result<Self, Self::Err> {
		match raw {
			"CALCULATING" => Ok(Self::Calculating),
			"COMPLETED" => Ok(Self::Completed),
			"STALE" => Ok(Self::Stale),
			"ERROR" => Ok(Self::Error),
			other => Err(UnknownLabel { kind: "ranking status", value: other.to_string() }),
		}
	}
}

/// What caused a recalculation or an invalidation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerEvent {
	AssessmentSubmitted,
	ScoringConfigChanged,
	JobChanged,
	Manual,
	ScheduledSweep,
}
impl TriggerEvent {
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::AssessmentSubmitted => "assessment_submitted",
			Self::ScoringConfigChanged => "scoring_config_changed",
			Self::JobChanged => "job_changed",
			Self::Manual => "manual",
			Self::ScheduledSweep => "scheduled_sweep",
		}
	}
}

impl fmt::Display for TriggerEvent {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for TriggerEvent {
	type Err = UnknownLabel;

	fn from_str(raw: &str) -> Result<Self, Self::Err> {
		match raw {
			"assessment_submitted" => Ok(Self::AssessmentSubmitted),
			"scoring_config_changed" => Ok(Self::ScoringConfigChanged),
			"job_changed" => Ok(Self::JobChanged),
			"manual" => Ok(Self::Manual),
			"scheduled_sweep" => Ok(Self::ScheduledSweep),
			other => Err(UnknownLabel { kind: "trigger event", value: other.to_string() }),
		}
	}
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnknownLabel {
	pub kind: &'static str,
	pub value: String,
}

impl fmt::Display for UnknownLabel {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "Unknown {} {:?}.", self.kind, self.value)
	}
}

impl std::error::Error for UnknownLabel {}

/// Persisted ranking row. Unique per `(job_id, applicant_id)`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CandidateRanking {
	pub job_id: Uuid,
	pub applicant_id: Uuid,
	pub assessment_id: Uuid,
	pub rank: u32,
	pub score: f64,
	pub max_possible_score: f64,
	pub percentage: f64,
	pub correct_answers: u32,
	pub incorrect_answers: u32,
	pub recency_bonus: f64,
	pub scoring_config_version: String,
	#[serde(with = "time::serde::rfc3339")]
	pub calculated_at: OffsetDateTime,
	pub is_stale: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JobRankingMetadata {
	pub job_id: Uuid,
	pub status: RankingStatus,
	pub total_candidates: u32,
	#[serde(with = "time::serde::rfc3339::option")]
	pub last_calculated_at: Option<OffsetDateTime>,
	pub calculation_duration_ms: Option<u64>,
	pub scoring_config_version: Option<String>,
	pub trigger_event: Option<String>,
	pub error_message: Option<String>,
}
impl JobRankingMetadata {
	/// Placeholder reported for a job that has never been calculated.
	pub fn never_calculated(job_id: Uuid) -> Self {
		Self {
			job_id,
			status: RankingStatus::Stale,
			total_candidates: 0,
			last_calculated_at: None,
			calculation_duration_ms: None,
			scoring_config_version: None,
			trigger_event: None,
			error_message: None,
		}
	}
}

/// Job-specific configuration first, then the global default.
pub fn resolve_effective_config(job_id: Uuid, configs: &[ScoringConfig]) -> Option<&ScoringConfig> {
	configs
		.iter()
		.find(|config| config.binding == ConfigBinding::Job(job_id))
		.or_else(|| configs.iter().find(|config| config.binding.is_default()))
}
