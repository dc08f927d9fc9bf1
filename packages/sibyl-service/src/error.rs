pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("The index catalog must contain at least one index.")]
	EmptyCatalog,
	#[error("Index '{tag}' has dimension {actual}; the service is configured for {expected}.")]
	CatalogDimension { tag: String, expected: usize, actual: usize },
	#[error(transparent)]
	Index(#[from] sibyl_index::Error),
	#[error("Embedding provider failed: {message}")]
	Embedding { message: String },
	#[error("Embedding provider returned {actual} vectors for {expected} inputs.")]
	EmbeddingCount { expected: usize, actual: usize },
	/// The generation upstream rejected the requested model; the synthesis
	/// step retries exactly once against the fallback model.
	#[error("The requested model was rejected: {message}")]
	ModelUnavailable { message: String },
	#[error("Generation failed: {message}")]
	Generation { message: String },
	#[error("Tracker refresh failed: {message}")]
	Tracker { message: String },
}
