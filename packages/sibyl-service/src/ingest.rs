use tracing::debug;

use sibyl_config::Config;
use sibyl_domain::Record;
use sibyl_index::VectorIndex;

use crate::{EmbeddingProvider, Error, Result};

/// Embed record documents in fixed-size batches and build a fresh index. The
/// returned vector count and dimensions are verified before every append, so
/// a misbehaving embedding upstream fails the build instead of corrupting it.
pub async fn build_index(
	cfg: &Config,
	embedding: &dyn EmbeddingProvider,
	records: Vec<Record>,
) -> Result<VectorIndex<Record>> {
	let mut index = VectorIndex::new(cfg.index.dimensions as usize);
	let batch_size = cfg.providers.embedding.batch_size.max(1) as usize;
	let documents: Vec<String> = records.iter().map(Record::embedding_document).collect();

	for start in (0..records.len()).step_by(batch_size) {
		let end = (start + batch_size).min(records.len());
		let batch = &documents[start..end];
		let vectors = embedding.embed(&cfg.providers.embedding, batch).await?;
		if vectors.len() != batch.len() {
			return Err(Error::EmbeddingCount { expected: batch.len(), actual: vectors.len() });
		}
		index.add(&vectors, records[start..end].to_vec())?;
		debug!(indexed = end, total = records.len(), "Embedded record batch.");
	}

	Ok(index)
}
