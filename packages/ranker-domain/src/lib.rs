pub mod model;
pub mod ranking;
pub mod scoring;
pub mod version;

pub use model::{
	Answer, ApplicantAssessment, ApplicantSubmission, AssessmentQuestion, CandidateRanking,
	ConfigBinding, JobRankingMetadata, RankingStatus, ScoringConfig, TriggerEvent,
	UnknownLabel, resolve_effective_config,
};
pub use ranking::{RankedCandidate, ScoredCandidate, assign_ranks, latest_per_applicant};
pub use scoring::{
	AnswerIssue, AnswerIssueKind, QuestionIndex, ScoreBreakdown, compute_score, index_questions,
};
pub use version::scoring_config_version;
