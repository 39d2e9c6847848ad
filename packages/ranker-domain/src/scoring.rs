use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::model::{Answer, AssessmentQuestion, ScoringConfig};

pub type QuestionIndex = HashMap<Uuid, AssessmentQuestion>;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
	/// Final score including the recency bonus. Not floored at zero.
	pub score: f64,
	pub max_possible_score: f64,
	pub percentage: f64,
	pub correct_answers: u32,
	pub incorrect_answers: u32,
	pub recency_bonus: f64,
	/// Answers left out of the score because the assessment data is inconsistent.
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub issues: Vec<AnswerIssue>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerIssue {
	pub assessment_id: Uuid,
	pub question_id: Uuid,
	pub kind: AnswerIssueKind,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerIssueKind {
	UnknownQuestion,
	DuplicateAnswer,
}
impl AnswerIssueKind {
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::UnknownQuestion => "unknown_question",
			Self::DuplicateAnswer => "duplicate_answer",
		}
	}
}

pub fn index_questions<I>(questions: I) -> QuestionIndex
where
	I: IntoIterator<Item = AssessmentQuestion>,
{
	questions.into_iter().map(|question| (question.question_id, question)).collect()
}

/// Scores one assessment. Pure: `now` is supplied by the caller.
pub fn compute_score(
	answers: &[Answer],
	questions: &QuestionIndex,
	config: &ScoringConfig,
	submitted_at: OffsetDateTime,
	now: OffsetDateTime,
) -> ScoreBreakdown {
	let mut out = ScoreBreakdown::default();
	let mut seen = HashSet::with_capacity(answers.len());

	for answer in answers {
		let Some(question) = questions.get(&answer.question_id) else {
			out.issues.push(AnswerIssue {
				assessment_id: answer.applicant_assessment_id,
				question_id: answer.question_id,
				kind: AnswerIssueKind::UnknownQuestion,
			});

			continue;
		};

		if !seen.insert(answer.question_id) {
			out.issues.push(AnswerIssue {
				assessment_id: answer.applicant_assessment_id,
				question_id: answer.question_id,
				kind: AnswerIssueKind::DuplicateAnswer,
			});

			continue;
		}

		out.max_possible_score += question.weight;

		if answer.is_correct {
			out.score += question.weight;
			out.correct_answers += 1;
		} else {
			out.score -= incorrect_penalty(question, config);
			out.incorrect_answers += 1;
		}
	}

	if let Some((window_days, boost_percent)) = config.recency()
		&& now - submitted_at <= Duration::days(i64::from(window_days))
	{
		out.recency_bonus = out.score * boost_percent / 100.0;
		out.score += out.recency_bonus;
	}

	out.percentage = if out.max_possible_score > 0.0 {
		out.score / out.max_possible_score * 100.0
	} else {
		0.0
	};

	out
}

fn incorrect_penalty(question: &AssessmentQuestion, config: &ScoringConfig) -> f64 {
	match question.negative_weight {
		Some(penalty) => penalty,
		None => question.weight * config.negative_marking_fraction,
	}
}
