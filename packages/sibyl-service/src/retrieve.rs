use std::{cmp::Ordering, collections::HashSet, path::Path};

use sibyl_domain::{Record, RetrievalHit};
use sibyl_index::VectorIndex;

use crate::{AnswerService, Error, Result};

/// One named vector index in the service's catalog. The tag becomes the
/// origin stamp on hits when several indices are merged.
pub struct SourceIndex {
	pub tag: String,
	pub index: VectorIndex<Record>,
}
impl SourceIndex {
	pub fn new(tag: impl Into<String>, index: VectorIndex<Record>) -> Self {
		Self { tag: tag.into(), index }
	}

	pub fn load(tag: impl Into<String>, stem: &Path) -> Result<Self> {
		Ok(Self { tag: tag.into(), index: VectorIndex::load(stem)? })
	}
}

impl AnswerService {
	/// Embed the question once and query every index in the catalog. A single
	/// index returns its own ordering; several indices are merged by score
	/// ascending, each hit stamped with its origin tag, then truncated to
	/// `top_k`. The merge is deterministic: equal scores keep catalog order.
	pub(crate) async fn retrieve(&self, question: &str, top_k: usize) -> Result<Vec<RetrievalHit>> {
		let texts = [question.to_string()];
		let vectors = self.providers.embedding.embed(&self.cfg.providers.embedding, &texts).await?;
		if vectors.len() != 1 {
			return Err(Error::EmbeddingCount { expected: 1, actual: vectors.len() });
		}
		let query = &vectors[0];

		if let [only] = self.catalog.as_slice() {
			let found = only.index.search(query, top_k)?;
			return Ok(found
				.into_iter()
				.map(|(score, meta)| RetrievalHit::new(meta.clone(), score))
				.collect());
		}

		let mut merged = Vec::new();
		for source in &self.catalog {
			for (score, meta) in source.index.search(query, top_k)? {
				let mut hit = RetrievalHit::new(meta.clone(), score);
				hit.origin = Some(source.tag.clone());
				merged.push(hit);
			}
		}
		merged.sort_by(|a, b| a.score.partial_cmp(&b.score).unwrap_or(Ordering::Equal));
		merged.truncate(top_k);

		Ok(merged)
	}
}

/// Collapse hits sharing an identity key, first occurrence winning. Hits the
/// record kind cannot identify are kept as-is.
pub fn dedup_hits(hits: Vec<RetrievalHit>) -> Vec<RetrievalHit> {
	let mut seen = HashSet::new();
	let mut out = Vec::with_capacity(hits.len());
	for hit in hits {
		if let Some(key) = hit.identity_key() {
			if !seen.insert(key) {
				continue;
			}
		}
		out.push(hit);
	}

	out
}
