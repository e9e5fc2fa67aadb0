pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Reqwest(#[from] reqwest::Error),
	#[error(transparent)]
	SerdeJson(#[from] serde_json::Error),
	#[error(transparent)]
	InvalidHeaderName(#[from] reqwest::header::InvalidHeaderName),
	#[error(transparent)]
	InvalidHeaderValue(#[from] reqwest::header::InvalidHeaderValue),
	#[error("{message}")]
	InvalidConfig { message: String },
	#[error("{message}")]
	InvalidResponse { message: String },
	#[error("Label {label:?} is outside the {schema} schema.")]
	Label { schema: &'static str, label: String },
}
impl Error {
	/// Transport failures, throttling and server errors are worth another attempt.
	pub fn is_retryable(&self) -> bool {
		match self {
			Self::Reqwest(err) => match err.status() {
				Some(status) => status.is_server_error() || matches!(status.as_u16(), 408 | 429),
				None => !err.is_builder(),
			},
			Self::InvalidResponse { .. } => true,
			_ => false,
		}
	}
}
