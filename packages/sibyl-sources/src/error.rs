pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Reqwest(#[from] reqwest::Error),
	#[error(transparent)]
	InvalidHeaderValue(#[from] reqwest::header::InvalidHeaderValue),
	#[error("Authentication failed: {message}")]
	Auth { message: String },
	#[error("Upstream returned status {status}: {message}")]
	Upstream { status: u16, message: String },
	#[error("{message}")]
	InvalidResponse { message: String },
}
impl Error {
	/// Rate-limit and server-unavailable classes are worth a bounded retry;
	/// everything else is surfaced immediately.
	pub fn is_transient(&self) -> bool {
		match self {
			Self::Upstream { status, .. } => matches!(status, 429 | 502 | 503 | 504),
			Self::Reqwest(err) => err.is_timeout() || err.is_connect(),
			_ => false,
		}
	}
}
