use std::{cmp::Ordering, collections::HashMap};

use uuid::Uuid;

use crate::{model::ApplicantAssessment, scoring::ScoreBreakdown};

#[derive(Clone, Debug, PartialEq)]
pub struct ScoredCandidate {
	pub applicant_id: Uuid,
	pub assessment_id: Uuid,
	pub breakdown: ScoreBreakdown,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RankedCandidate {
	pub rank: u32,
	pub applicant_id: Uuid,
	pub assessment_id: Uuid,
	pub breakdown: ScoreBreakdown,
}

/// Dense ranks `1..=n`: score descending, ties broken by ascending applicant id.
pub fn assign_ranks(mut candidates: Vec<ScoredCandidate>) -> Vec<RankedCandidate> {
	candidates.sort_by(compare_candidates);

	candidates
		.into_iter()
		.enumerate()
		.map(|(idx, candidate)| RankedCandidate {
			rank: idx as u32 + 1,
			applicant_id: candidate.applicant_id,
			assessment_id: candidate.assessment_id,
			breakdown: candidate.breakdown,
		})
		.collect()
}

fn compare_candidates(a: &ScoredCandidate, b: &ScoredCandidate) -> Ordering {
	b.breakdown
		.score
		.total_cmp(&a.breakdown.score)
		.then_with(|| a.applicant_id.cmp(&b.applicant_id))
}

/// Picks each applicant's latest submitted assessment for one job.
///
/// Unsubmitted assessments are ignored. When two submissions share a timestamp the greater
/// assessment id wins, matching the `DISTINCT ON` ordering used by the Postgres store.
pub fn latest_per_applicant<'a, I>(job_id: Uuid, assessments: I) -> Vec<&'a ApplicantAssessment>
where
	I: IntoIterator<Item = &'a ApplicantAssessment>,
{
	let mut latest: HashMap<Uuid, &'a ApplicantAssessment> = HashMap::new();

	for assessment in assessments {
		if assessment.job_id != job_id || assessment.submitted_at.is_none() {
			continue;
		}

		let replace = match latest.get(&assessment.applicant_id) {
			Some(current) => submission_key(assessment) > submission_key(current),
			None => true,
		};

		if replace {
			latest.insert(assessment.applicant_id, assessment);
		}
	}

	let mut out = latest.into_values().collect::<Vec<_>>();

	out.sort_by_key(|assessment| assessment.applicant_id);

	out
}

fn submission_key(assessment: &ApplicantAssessment) -> (Option<time::OffsetDateTime>, Uuid) {
	(assessment.submitted_at, assessment.applicant_assessment_id)
}
