pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Evidence store unavailable: {message}")]
	StoreUnavailable { message: String },
	#[error("Classification failed: {message}")]
	Classification { message: String },
	#[error("Generation failed: {message}")]
	Generation { message: String },
	#[error("Stage {stage} timed out after {timeout_ms} ms.")]
	Timeout { stage: &'static str, timeout_ms: u64 },
	#[error("Request cancelled during {stage}.")]
	Cancelled { stage: &'static str },
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Stage {stage} failed: {source}")]
	Stage { stage: &'static str, source: Box<Error> },
}
impl Error {
	/// The innermost error, looking through [`Error::Stage`] wrappers.
	pub fn root(&self) -> &Self {
		match self {
			Self::Stage { source, .. } => source.root(),
			other => other,
		}
	}

	pub fn is_cancelled(&self) -> bool {
		matches!(self.root(), Self::Cancelled { .. })
	}
}

impl From<verity_storage::Error> for Error {
	fn from(err: verity_storage::Error) -> Self {
		Self::StoreUnavailable { message: err.to_string() }
	}
}
