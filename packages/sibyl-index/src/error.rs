pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Io(#[from] std::io::Error),
	#[error("Failed to decode metadata line {line}.")]
	Metadata { line: usize, source: serde_json::Error },
	#[error("Failed to encode metadata.")]
	EncodeMetadata { source: serde_json::Error },
	#[error("Vector dimension mismatch (expected {expected}, got {actual}).")]
	DimensionMismatch { expected: usize, actual: usize },
	#[error("Vector count mismatch between index and metadata ({vectors} vectors, {metadata} metadata rows).")]
	CountMismatch { vectors: usize, metadata: usize },
	#[error("Unsupported similarity metric tag {tag}.")]
	UnsupportedMetric { tag: u8 },
	#[error("Corrupt index file: {message}")]
	CorruptIndex { message: String },
}
