pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Reqwest(#[from] reqwest::Error),
	#[error(transparent)]
	InvalidHeaderValue(#[from] reqwest::header::InvalidHeaderValue),
	#[error("{message}")]
	InvalidResponse { message: String },
	/// Permission-class rejection; the message carries the upstream body so
	/// callers can tell a model rejection from other denials.
	#[error("Permission denied: {message}")]
	PermissionDenied { message: String },
	#[error("Upstream returned status {status}: {message}")]
	Upstream { status: u16, message: String },
}
