pub fn render_schema() -> String {
	expand_includes(include_str!("../../../sql/init.sql"))
}

fn expand_includes(sql: &str) -> String {
	let mut out = String::new();

	for line in sql.lines() {
		match line.trim().strip_prefix("\\ir ").map(str::trim) {
			Some(path) => match included_file(path) {
				Some(body) => out.push_str(body),
				None => out.push_str(line),
			},
			None => out.push_str(line),
		}

		out.push('\n');
	}

	out
}

fn included_file(path: &str) -> Option<&'static str> {
	let body = match path {
		"00_extensions.sql" => include_str!("../../../sql/00_extensions.sql"),
		"tables/001_jobs.sql" => include_str!("../../../sql/tables/001_jobs.sql"),
		"tables/002_applicants.sql" => include_str!("../../../sql/tables/002_applicants.sql"),
		"tables/003_assessment_questions.sql" =>
			include_str!("../../../sql/tables/003_assessment_questions.sql"),
		"tables/004_applicant_assessments.sql" =>
			include_str!("../../../sql/tables/004_applicant_assessments.sql"),
		"tables/005_assessment_answers.sql" =>
			include_str!("../../../sql/tables/005_assessment_answers.sql"),
		"tables/006_scoring_configs.sql" =>
			include_str!("../../../sql/tables/006_scoring_configs.sql"),
		"tables/007_candidate_rankings.sql" =>
			include_str!("../../../sql/tables/007_candidate_rankings.sql"),
		"tables/008_job_ranking_metadata.sql" =>
			include_str!("../../../sql/tables/008_job_ranking_metadata.sql"),
		"tables/009_ranking_events.sql" =>
			include_str!("../../../sql/tables/009_ranking_events.sql"),
		_ => return None,
	};

	Some(body)
}
