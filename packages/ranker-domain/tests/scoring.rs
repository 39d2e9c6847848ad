use time::{Duration, OffsetDateTime, macros::datetime};
use uuid::Uuid;

use ranker_domain::{
	Answer, AnswerIssueKind, AssessmentQuestion, ConfigBinding, QuestionIndex, ScoringConfig,
	compute_score, index_questions,
};

const NOW: OffsetDateTime = datetime!(2025-03-10 12:00 UTC);

fn question(weight: f64) -> AssessmentQuestion {
	AssessmentQuestion {
		question_id: Uuid::new_v4(),
		weight,
		correct_answer: "b".to_string(),
		negative_weight: None,
	}
}

fn answer(assessment_id: Uuid, question: &AssessmentQuestion, is_correct: bool) -> Answer {
	Answer {
		question_id: question.question_id,
		applicant_assessment_id: assessment_id,
		raw_answer: if is_correct { "b".to_string() } else { "a".to_string() },
		is_correct,
	}
}

fn config(fraction: f64, window_days: Option<u32>, boost_percent: Option<f64>) -> ScoringConfig {
	ScoringConfig {
		scoring_config_id: Uuid::new_v4(),
		binding: ConfigBinding::Default,
		negative_marking_fraction: fraction,
		recency_window_days: window_days,
		recency_boost_percent: boost_percent,
		updated_at: datetime!(2025-01-01 00:00 UTC),
	}
}

fn weighted_fixture() -> (Vec<Answer>, QuestionIndex) {
	let assessment_id = Uuid::new_v4();
	let questions = vec![question(2.0), question(1.0), question(1.0)];
	let answers = vec![
		answer(assessment_id, &questions[0], true),
		answer(assessment_id, &questions[1], true),
		answer(assessment_id, &questions[2], false),
	];

	(answers, index_questions(questions))
}

fn assert_close(actual: f64, expected: f64) {
	assert!((actual - expected).abs() < 1e-9, "Expected {expected}, got {actual}.");
}

#[test]
fn negative_marking_reduces_score() {
	let (answers, questions) = weighted_fixture();
	let cfg = config(0.25, None, None);
	let breakdown = compute_score(&answers, &questions, &cfg, NOW - Duration::days(40), NOW);

	assert_close(breakdown.score, 2.75);
	assert_close(breakdown.max_possible_score, 4.0);
	assert_close(breakdown.percentage, 68.75);
	assert_eq!(breakdown.correct_answers, 2);
	assert_eq!(breakdown.incorrect_answers, 1);
	assert_close(breakdown.recency_bonus, 0.0);
	assert!(breakdown.issues.is_empty());
}

#[test]
fn recency_bonus_applies_inside_window() {
	let (answers, questions) = weighted_fixture();
	let breakdown = compute_score(
		&answers,
		&questions,
		&config(0.25, Some(7), Some(10.0)),
		NOW - Duration::days(2),
		NOW,
	);

	assert_close(breakdown.recency_bonus, 0.275);
	assert_close(breakdown.score, 3.025);
	assert_close(breakdown.percentage, 3.025 / 4.0 * 100.0);
}

#[test]
fn recency_bonus_applies_on_window_boundary() {
	let (answers, questions) = weighted_fixture();
	let breakdown = compute_score(
		&answers,
		&questions,
		&config(0.25, Some(7), Some(10.0)),
		NOW - Duration::days(7),
		NOW,
	);

	assert_close(breakdown.recency_bonus, 0.275);
}

#[test]
fn recency_bonus_skipped_outside_window() {
	let (answers, questions) = weighted_fixture();
	let breakdown = compute_score(
		&answers,
		&questions,
		&config(0.25, Some(7), Some(10.0)),
		NOW - Duration::days(7) - Duration::seconds(1),
		NOW,
	);

	assert_close(breakdown.recency_bonus, 0.0);
	assert_close(breakdown.score, 2.75);
}

#[test]
fn recency_bonus_requires_both_knobs() {
	let (answers, questions) = weighted_fixture();
	let submitted_at = NOW - Duration::hours(1);

	for cfg in [config(0.25, Some(7), None), config(0.25, None, Some(10.0))] {
		let breakdown = compute_score(&answers, &questions, &cfg, submitted_at, NOW);

		assert_close(breakdown.recency_bonus, 0.0);
		assert_close(breakdown.score, 2.75);
	}
}

#[test]
fn question_negative_weight_overrides_fraction() {
	let assessment_id = Uuid::new_v4();
	let mut harsh = question(1.0);

	harsh.negative_weight = Some(0.5);

	let plain = question(3.0);
	let answers = vec![answer(assessment_id, &plain, true), answer(assessment_id, &harsh, false)];
	let questions = index_questions(vec![plain, harsh]);
	let breakdown =
		compute_score(&answers, &questions, &config(0.25, None, None), NOW, NOW);

	assert_close(breakdown.score, 2.5);
	assert_close(breakdown.max_possible_score, 4.0);
}

#[test]
fn score_is_not_floored_at_zero() {
	let assessment_id = Uuid::new_v4();
	let questions = vec![question(2.0), question(2.0)];
	let answers = vec![
		answer(assessment_id, &questions[0], false),
		answer(assessment_id, &questions[1], false),
	];
	let breakdown =
		compute_score(&answers, &index_questions(questions), &config(0.5, None, None), NOW, NOW);

	assert_close(breakdown.score, -2.0);
	assert_close(breakdown.percentage, -50.0);
	assert_eq!(breakdown.incorrect_answers, 2);
}

#[test]
fn zero_max_score_yields_zero_percentage() {
	let assessment_id = Uuid::new_v4();
	let free = question(0.0);
	let answers = vec![answer(assessment_id, &free, true)];
	let breakdown =
		compute_score(&answers, &index_questions(vec![free]), &config(0.25, None, None), NOW, NOW);

	assert_close(breakdown.max_possible_score, 0.0);
	assert_close(breakdown.percentage, 0.0);

	let empty = compute_score(&[], &QuestionIndex::new(), &config(0.25, None, None), NOW, NOW);

	assert_eq!(empty.correct_answers, 0);
	assert_close(empty.percentage, 0.0);
}

#[test]
fn unknown_question_is_skipped_and_reported() {
	let (mut answers, questions) = weighted_fixture();
	let assessment_id = answers[0].applicant_assessment_id;
	let orphan = Uuid::new_v4();

	answers.push(Answer {
		question_id: orphan,
		applicant_assessment_id: assessment_id,
		raw_answer: "c".to_string(),
		is_correct: true,
	});

	let breakdown =
		compute_score(&answers, &questions, &config(0.25, None, None), NOW, NOW);

	assert_close(breakdown.score, 2.75);
	assert_close(breakdown.max_possible_score, 4.0);
	assert_eq!(breakdown.issues.len(), 1);
	assert_eq!(breakdown.issues[0].question_id, orphan);
	assert_eq!(breakdown.issues[0].kind, AnswerIssueKind::UnknownQuestion);
}

#[test]
fn duplicate_answer_counts_once() {
	let (mut answers, questions) = weighted_fixture();
	let mut repeat = answers[2].clone();

	repeat.is_correct = true;
	answers.push(repeat);

	let breakdown =
		compute_score(&answers, &questions, &config(0.25, None, None), NOW, NOW);

	assert_close(breakdown.score, 2.75);
	assert_eq!(breakdown.correct_answers, 2);
	assert_eq!(breakdown.issues.len(), 1);
	assert_eq!(breakdown.issues[0].kind, AnswerIssueKind::DuplicateAnswer);
}

#[test]
fn percentage_tracks_score_over_max() {
	let assessment_id = Uuid::new_v4();
	let questions = (1..=6).map(|weight| question(weight as f64 * 0.7)).collect::<Vec<_>>();
	let answers = questions
		.iter()
		.enumerate()
		.map(|(idx, q)| answer(assessment_id, q, idx % 3 != 0))
		.collect::<Vec<_>>();
	let breakdown = compute_score(
		&answers,
		&index_questions(questions),
		&config(0.3, Some(30), Some(5.0)),
		NOW - Duration::days(1),
		NOW,
	);

	assert_close(breakdown.percentage, breakdown.score / breakdown.max_possible_score * 100.0);
}

#[test]
fn breakdown_serializes_without_empty_issues() {
	let (answers, questions) = weighted_fixture();
	let breakdown =
		compute_score(&answers, &questions, &config(0.25, None, None), NOW, NOW);
	let value = serde_json::to_value(&breakdown).expect("Failed to encode breakdown.");

	assert!(value.get("issues").is_none());
	assert_eq!(value["correct_answers"], 2);
}
