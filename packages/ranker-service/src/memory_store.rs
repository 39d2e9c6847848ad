//! In-process store for single-instance deployments and tests.
//!
//! All state sits behind one mutex, so each trait method is atomic with respect to the others.
//! The seeding methods stand in for the components that own jobs, assessments and configs.

use std::{
	collections::{BTreeSet, HashMap},
	future,
	sync::{Mutex, MutexGuard},
};

use time::OffsetDateTime;
use uuid::Uuid;

use ranker_domain::{
	Answer, ApplicantAssessment, ApplicantSubmission, AssessmentQuestion, CandidateRanking,
	ConfigBinding, JobRankingMetadata, RankingStatus, ScoringConfig, TriggerEvent,
	latest_per_applicant, resolve_effective_config,
};
use ranker_storage::rankings::CompletedCalculation;

use crate::{
	AssessmentSource, BoxFuture, CalculationClaim, Error, RankingRepository, RankingSnapshot,
	Result, ScoringConfigSource,
};

#[derive(Default)]
pub struct MemoryStore {
	state: Mutex<State>,
}

#[derive(Default)]
struct State {
	jobs: BTreeSet<Uuid>,
	questions: HashMap<Uuid, AssessmentQuestion>,
	assessments: HashMap<Uuid, ApplicantAssessment>,
	answers: HashMap<Uuid, Vec<Answer>>,
	configs: HashMap<Uuid, ScoringConfig>,
	metadata: HashMap<Uuid, MetadataEntry>,
	rankings: HashMap<Uuid, Vec<CandidateRanking>>,
}

struct MetadataEntry {
	metadata: JobRankingMetadata,
	claim_token: Option<Uuid>,
	updated_at: OffsetDateTime,
}

impl MemoryStore {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn add_job(&self, job_id: Uuid) {
		self.lock().jobs.insert(job_id);
	}

	/// Deletes the job together with its assessments, bound config, metadata and rankings.
	pub fn remove_job(&self, job_id: Uuid) {
		let mut state = self.lock();
		let removed = state
			.assessments
			.values()
			.filter(|assessment| assessment.job_id == job_id)
			.map(|assessment| assessment.applicant_assessment_id)
			.collect::<Vec<_>>();

		for assessment_id in removed {
			state.assessments.remove(&assessment_id);
			state.answers.remove(&assessment_id);
		}

		state.jobs.remove(&job_id);
		state.configs.retain(|_, config| config.binding != ConfigBinding::Job(job_id));
		state.metadata.remove(&job_id);
		state.rankings.remove(&job_id);
	}

	pub fn add_question(&self, question: AssessmentQuestion) {
		self.lock().questions.insert(question.question_id, question);
	}

	/// Records an assessment and its answers. The job is registered if it is new.
	pub fn put_assessment(&self, assessment: ApplicantAssessment, answers: Vec<Answer>) {
		let mut state = self.lock();

		state.jobs.insert(assessment.job_id);
		state.answers.insert(assessment.applicant_assessment_id, answers);
		state.assessments.insert(assessment.applicant_assessment_id, assessment);
	}

	/// Inserts or replaces a config, keeping a single default and at most one config per job.
	pub fn put_scoring_config(&self, config: ScoringConfig) -> Result<()> {
		let mut state = self.lock();
		let clash = state.configs.values().find(|existing| {
			existing.scoring_config_id != config.scoring_config_id
				&& existing.binding == config.binding
		});

		if let Some(existing) = clash {
			return Err(Error::InvalidRequest {
				message: format!(
					"Scoring config {} already holds binding {:?}.",
					existing.scoring_config_id, config.binding
				),
			});
		}
		if let ConfigBinding::Job(job_id) = config.binding {
			state.jobs.insert(job_id);
		}

		state.configs.insert(config.scoring_config_id, config);

		Ok(())
	}

	pub fn remove_scoring_config(&self, scoring_config_id: Uuid) -> Option<ScoringConfig> {
		self.lock().configs.remove(&scoring_config_id)
	}

	/// Loads a metadata row as-is, e.g. when restoring persisted state.
	pub fn restore_metadata(&self, metadata: JobRankingMetadata, updated_at: OffsetDateTime) {
		let mut state = self.lock();

		state.jobs.insert(metadata.job_id);
		state
			.metadata
			.insert(metadata.job_id, MetadataEntry { metadata, claim_token: None, updated_at });
	}

	pub fn metadata(&self, job_id: Uuid) -> Option<JobRankingMetadata> {
		self.lock().metadata.get(&job_id).map(|entry| entry.metadata.clone())
	}

	/// Every stored ranking row of the job, stale or not, by rank.
	pub fn rankings(&self, job_id: Uuid) -> Vec<CandidateRanking> {
		self.lock().rankings.get(&job_id).cloned().unwrap_or_default()
	}

	fn lock(&self) -> MutexGuard<'_, State> {
		self.state.lock().unwrap_or_else(|err| err.into_inner())
	}
}

impl State {
	fn latest_submissions(&self, job_id: Uuid) -> Vec<ApplicantSubmission> {
		latest_per_applicant(job_id, self.assessments.values())
			.into_iter()
			.filter_map(|assessment| {
				Some(ApplicantSubmission {
					applicant_id: assessment.applicant_id,
					assessment_id: assessment.applicant_assessment_id,
					submitted_at: assessment.submitted_at?,
					answers: self
						.answers
						.get(&assessment.applicant_assessment_id)
						.cloned()
						.unwrap_or_default(),
				})
			})
			.collect()
	}

	fn jobs_governed_by(&self, scoring_config_id: Uuid) -> Vec<Uuid> {
		let Some(config) = self.configs.get(&scoring_config_id) else {
			return Vec::new();
		};

		match config.binding {
			ConfigBinding::Job(job_id) => vec![job_id],
			ConfigBinding::Default => {
				let bound = self
					.configs
					.values()
					.filter_map(|config| config.binding.job_id())
					.collect::<BTreeSet<_>>();

				self.jobs.iter().copied().filter(|job_id| !bound.contains(job_id)).collect()
			},
		}
	}

	fn claim(&mut self, claim: CalculationClaim) -> Result<bool> {
		if !self.jobs.contains(&claim.job_id) {
			return Err(Error::NotFound {
				message: format!("Job {} does not exist.", claim.job_id),
			});
		}

		let entry = self.metadata.entry(claim.job_id).or_insert_with(|| MetadataEntry {
			metadata: JobRankingMetadata::never_calculated(claim.job_id),
			claim_token: None,
			updated_at: claim.now,
		});

		if entry.metadata.status == RankingStatus::Calculating
			&& entry.updated_at >= claim.now - claim.lease
		{
			return Ok(false);
		}

		entry.metadata.status = RankingStatus::Calculating;
		entry.metadata.trigger_event = Some(claim.trigger.to_string());
		entry.claim_token = Some(claim.claim_token);
		entry.updated_at = claim.now;

		Ok(true)
	}

	fn holds_claim(&self, job_id: Uuid, claim_token: Uuid) -> bool {
		self.metadata.get(&job_id).is_some_and(|entry| {
			entry.metadata.status == RankingStatus::Calculating
				&& entry.claim_token == Some(claim_token)
		})
	}

	fn complete(&mut self, job_id: Uuid, calculation: &CompletedCalculation<'_>) -> Result<bool> {
		if !self.holds_claim(job_id, calculation.claim_token) {
			return Ok(false);
		}
		if let Some(row) = calculation.rankings.iter().find(|row| row.job_id != job_id) {
			return Err(Error::InvalidRequest {
				message: format!(
					"Ranking for applicant {} belongs to job {}, not {job_id}.",
					row.applicant_id, row.job_id
				),
			});
		}

		let mut rows = calculation.rankings.to_vec();

		for row in &mut rows {
			row.scoring_config_version = calculation.scoring_config_version.to_string();
			row.calculated_at = calculation.calculated_at;
			row.is_stale = false;
		}

		rows.sort_by_key(|row| row.rank);

		let total_candidates = u32::try_from(rows.len()).unwrap_or(u32::MAX);

		self.rankings.insert(job_id, rows);

		if let Some(entry) = self.metadata.get_mut(&job_id) {
			entry.metadata.status = RankingStatus::Completed;
			entry.metadata.total_candidates = total_candidates;
			entry.metadata.last_calculated_at = Some(calculation.calculated_at);
			entry.metadata.calculation_duration_ms = Some(calculation.duration_ms);
			entry.metadata.scoring_config_version =
				Some(calculation.scoring_config_version.to_string());
			entry.metadata.error_message = None;
			entry.claim_token = None;
			entry.updated_at = calculation.calculated_at;
		}

		Ok(true)
	}

	fn fail(
		&mut self,
		job_id: Uuid,
		claim_token: Uuid,
		message: &str,
		now: OffsetDateTime,
	) -> bool {
		if !self.holds_claim(job_id, claim_token) {
			return false;
		}

		let Some(entry) = self.metadata.get_mut(&job_id) else { return false };

		entry.metadata.status = RankingStatus::Error;
		entry.metadata.error_message = Some(message.to_string());
		entry.claim_token = None;
		entry.updated_at = now;

		true
	}

	fn mark_stale(&mut self, job_ids: &[Uuid], trigger: TriggerEvent, now: OffsetDateTime) -> u64 {
		let mut marked = 0;

		for job_id in job_ids.iter().collect::<BTreeSet<_>>() {
			let Some(entry) = self.metadata.get_mut(job_id) else { continue };

			entry.metadata.status = RankingStatus::Stale;
			entry.metadata.trigger_event = Some(trigger.to_string());
			entry.claim_token = None;
			entry.updated_at = now;
			marked += 1;

			if let Some(rows) = self.rankings.get_mut(job_id) {
				rows.iter_mut().for_each(|row| row.is_stale = true);
			}
		}

		marked
	}

	fn snapshot(&self, job_id: Uuid, limit: u32) -> RankingSnapshot {
		let rows = self.rankings.get(&job_id).map(Vec::as_slice).unwrap_or_default();
		let take = usize::try_from(limit).unwrap_or(usize::MAX);

		RankingSnapshot {
			metadata: self.metadata.get(&job_id).map(|entry| entry.metadata.clone()),
			rankings: rows.iter().filter(|row| !row.is_stale).take(take).cloned().collect(),
			has_stale_rows: rows.iter().any(|row| row.is_stale),
		}
	}

	fn jobs_needing_recalculation(
		&self,
		completed_before: OffsetDateTime,
		claimed_before: OffsetDateTime,
		limit: u32,
	) -> Vec<Uuid> {
		let mut due = self
			.metadata
			.values()
			.filter_map(|entry| {
				let metadata = &entry.metadata;
				let group = match metadata.status {
					RankingStatus::Stale | RankingStatus::Error => 0,
					RankingStatus::Calculating if entry.updated_at < claimed_before => 0,
					RankingStatus::Completed
						if metadata.last_calculated_at.is_some_and(|at| at < completed_before) =>
						1,
					_ => return None,
				};

				Some((group, metadata.last_calculated_at, metadata.job_id))
			})
			.collect::<Vec<_>>();

		due.sort();

		due.into_iter()
			.take(usize::try_from(limit).unwrap_or(usize::MAX))
			.map(|(_, _, job_id)| job_id)
			.collect()
	}
}

fn ready<'a, T>(value: T) -> BoxFuture<'a, T>
where
	T: Send + 'a,
{
	Box::pin(future::ready(value))
}

impl AssessmentSource for MemoryStore {
	fn latest_submissions<'a>(
		&'a self,
		job_id: Uuid,
	) -> BoxFuture<'a, Result<Vec<ApplicantSubmission>>> {
		ready(Ok(self.lock().latest_submissions(job_id)))
	}

	fn questions_by_ids<'a>(
		&'a self,
		question_ids: &'a [Uuid],
	) -> BoxFuture<'a, Result<Vec<AssessmentQuestion>>> {
		let state = self.lock();

		ready(Ok(question_ids.iter().filter_map(|id| state.questions.get(id).cloned()).collect()))
	}

	fn jobs_with_submissions_from<'a>(
		&'a self,
		applicant_id: Uuid,
	) -> BoxFuture<'a, Result<Vec<Uuid>>> {
		let jobs = self
			.lock()
			.assessments
			.values()
			.filter(|assessment| {
				assessment.applicant_id == applicant_id && assessment.submitted_at.is_some()
			})
			.map(|assessment| assessment.job_id)
			.collect::<BTreeSet<_>>();

		ready(Ok(jobs.into_iter().collect()))
	}
}

impl ScoringConfigSource for MemoryStore {
	fn effective_config<'a>(
		&'a self,
		job_id: Uuid,
	) -> BoxFuture<'a, Result<Option<ScoringConfig>>> {
		let configs = self.lock().configs.values().cloned().collect::<Vec<_>>();

		ready(Ok(resolve_effective_config(job_id, &configs).cloned()))
	}

	fn scoring_config<'a>(
		&'a self,
		scoring_config_id: Uuid,
	) -> BoxFuture<'a, Result<Option<ScoringConfig>>> {
		ready(Ok(self.lock().configs.get(&scoring_config_id).cloned()))
	}

	fn jobs_governed_by<'a>(
		&'a self,
		scoring_config_id: Uuid,
	) -> BoxFuture<'a, Result<Vec<Uuid>>> {
		ready(Ok(self.lock().jobs_governed_by(scoring_config_id)))
	}
}

impl RankingRepository for MemoryStore {
	fn claim_calculation<'a>(&'a self, claim: CalculationClaim) -> BoxFuture<'a, Result<bool>> {
		ready(self.lock().claim(claim))
	}

	fn complete_calculation<'a>(
		&'a self,
		job_id: Uuid,
		calculation: CompletedCalculation<'a>,
	) -> BoxFuture<'a, Result<bool>> {
		ready(self.lock().complete(job_id, &calculation))
	}

	fn fail_calculation<'a>(
		&'a self,
		job_id: Uuid,
		claim_token: Uuid,
		message: &'a str,
		now: OffsetDateTime,
	) -> BoxFuture<'a, Result<bool>> {
		ready(Ok(self.lock().fail(job_id, claim_token, message, now)))
	}

	fn mark_stale<'a>(
		&'a self,
		job_ids: &'a [Uuid],
		trigger: TriggerEvent,
		now: OffsetDateTime,
	) -> BoxFuture<'a, Result<u64>> {
		ready(Ok(self.lock().mark_stale(job_ids, trigger, now)))
	}

	fn snapshot<'a>(&'a self, job_id: Uuid, limit: u32) -> BoxFuture<'a, Result<RankingSnapshot>> {
		ready(Ok(self.lock().snapshot(job_id, limit)))
	}

	fn jobs_needing_recalculation<'a>(
		&'a self,
		completed_before: OffsetDateTime,
		claimed_before: OffsetDateTime,
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<Uuid>>> {
		let state = self.lock();

		ready(Ok(state.jobs_needing_recalculation(completed_before, claimed_before, limit)))
	}
}
