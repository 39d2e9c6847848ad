use crate::model::ScoringConfig;

const VERSION_SCHEMA: &[u8] = b"scoring-config:v1";

/// Stable content hash of the fields that influence scores, plus the last-modified time.
///
/// Rankings carry the version they were produced with, so a mismatch against the current value
/// reveals config drift even when no invalidation event was delivered.
pub fn scoring_config_version(config: &ScoringConfig) -> String {
	let mut hasher = blake3::Hasher::new();

	hasher.update(VERSION_SCHEMA);
	hasher.update(config.scoring_config_id.as_bytes());
	hasher.update(&config.negative_marking_fraction.to_le_bytes());

	match config.recency_window_days {
		Some(days) => hasher.update(&[1]).update(&days.to_le_bytes()),
		None => hasher.update(&[0]),
	};
	match config.recency_boost_percent {
		Some(percent) => hasher.update(&[1]).update(&percent.to_le_bytes()),
		None => hasher.update(&[0]),
	};

	hasher.update(&config.updated_at.unix_timestamp_nanos().to_le_bytes());

	hasher.finalize().to_hex().to_string()
}
