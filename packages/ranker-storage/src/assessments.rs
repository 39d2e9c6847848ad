use sqlx::PgExecutor;
use uuid::Uuid;

use ranker_domain::{Answer, ApplicantSubmission, AssessmentQuestion};

use crate::{
	Result,
	models::{LatestAnswerRow, QuestionRow},
};

/// Latest submitted assessment of every applicant for the job, answers included, in one query.
///
/// Ties on `submitted_at` go to the greatest assessment id. Results are ordered by applicant id.
pub async fn fetch_latest_submissions<'e, E>(
	executor: E,
	job_id: Uuid,
) -> Result<Vec<ApplicantSubmission>>
where
	E: PgExecutor<'e>,
{
	let rows = sqlx::query_as::<_, LatestAnswerRow>(
		"\
WITH latest AS (
	SELECT DISTINCT ON (applicant_id)
		applicant_id,
		applicant_assessment_id,
		submitted_at
	FROM applicant_assessments
	WHERE job_id = $1 AND submitted_at IS NOT NULL
	ORDER BY applicant_id, submitted_at DESC, applicant_assessment_id DESC
)
SELECT
	l.applicant_id,
	l.applicant_assessment_id,
	l.submitted_at,
	a.question_id,
	a.raw_answer,
	a.is_correct
FROM latest l
LEFT JOIN assessment_answers a ON a.applicant_assessment_id = l.applicant_assessment_id
ORDER BY l.applicant_id ASC, a.created_at ASC NULLS FIRST, a.answer_id ASC",
	)
	.bind(job_id)
	.fetch_all(executor)
	.await?;

	Ok(group_submissions(rows))
}

fn group_submissions(rows: Vec<LatestAnswerRow>) -> Vec<ApplicantSubmission> {
	let mut out: Vec<ApplicantSubmission> = Vec::new();

	for row in rows {
		if out.last().is_none_or(|last| last.assessment_id != row.applicant_assessment_id) {
			out.push(ApplicantSubmission {
				applicant_id: row.applicant_id,
				assessment_id: row.applicant_assessment_id,
				submitted_at: row.submitted_at,
				answers: Vec::new(),
			});
		}

		let Some(current) = out.last_mut() else { continue };

		if let (Some(question_id), Some(raw_answer), Some(is_correct)) =
			(row.question_id, row.raw_answer, row.is_correct)
		{
			current.answers.push(Answer {
				question_id,
				applicant_assessment_id: row.applicant_assessment_id,
				raw_answer,
				is_correct,
			});
		}
	}

	out
}

pub async fn fetch_questions_by_ids<'e, E>(
	executor: E,
	question_ids: &[Uuid],
) -> Result<Vec<AssessmentQuestion>>
where
	E: PgExecutor<'e>,
{
	if question_ids.is_empty() {
		return Ok(Vec::new());
	}

	let rows = sqlx::query_as::<_, QuestionRow>(
		"\
SELECT
	question_id,
	weight,
	correct_answer,
	negative_weight
FROM assessment_questions
WHERE question_id = ANY($1)",
	)
	.bind(question_ids)
	.fetch_all(executor)
	.await?;

	Ok(rows.into_iter().map(AssessmentQuestion::from).collect())
}

/// Jobs for which the applicant has at least one submitted assessment.
pub async fn jobs_with_submissions_from<'e, E>(
	executor: E,
	applicant_id: Uuid,
) -> Result<Vec<Uuid>>
where
	E: PgExecutor<'e>,
{
	let job_ids: Vec<Uuid> = sqlx::query_scalar(
		"\
SELECT DISTINCT job_id
FROM applicant_assessments
WHERE applicant_id = $1 AND submitted_at IS NOT NULL
ORDER BY job_id",
	)
	.bind(applicant_id)
	.fetch_all(executor)
	.await?;

	Ok(job_ids)
}
