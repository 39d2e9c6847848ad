use uuid::Uuid;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("No job-specific or default scoring config resolves for job {job_id}.")]
	ConfigNotFound { job_id: Uuid },
	#[error("Rankings for job {job_id} are already being calculated.")]
	AlreadyCalculating { job_id: Uuid },
	#[error("Ranking calculation for job {job_id} was superseded before it could be committed.")]
	CalculationSuperseded { job_id: Uuid },
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Not found: {message}")]
	NotFound { message: String },
	#[error("Storage error: {message}")]
	Storage { message: String },
}
impl Error {
	/// Whether the same request may succeed when retried later without any other change.
	pub fn is_retryable(&self) -> bool {
		matches!(
			self,
			Self::AlreadyCalculating { .. }
				| Self::CalculationSuperseded { .. }
				| Self::Storage { .. }
		)
	}
}

impl From<sqlx::Error> for Error {
	fn from(err: sqlx::Error) -> Self {
		Self::Storage { message: err.to_string() }
	}
}

impl From<ranker_storage::Error> for Error {
	fn from(err: ranker_storage::Error) -> Self {
		match err {
			ranker_storage::Error::Sqlx(inner) => Self::Storage { message: inner.to_string() },
			ranker_storage::Error::InvalidArgument(message) => Self::InvalidRequest { message },
			ranker_storage::Error::NotFound(message) => Self::NotFound { message },
			ranker_storage::Error::Corrupt(message) => Self::Storage { message },
		}
	}
}
