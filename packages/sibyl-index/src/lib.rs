mod error;

pub use error::{Error, Result};

use std::{
	fs::File,
	io::{BufRead, BufReader, BufWriter, Read, Write},
	path::{Path, PathBuf},
};

use serde::{Serialize, de::DeserializeOwned};

const MAGIC: [u8; 8] = *b"SIBYLIX1";
const METRIC_COSINE: u8 = 1;

/// Flat cosine-distance index over fixed-dimension vectors with a JSON-lines
/// metadata sidecar. Vectors are L2-normalized on insert; `search` returns
/// distances where lower means more similar, ascending.
///
/// Persistence is a pair of files per stem: `<stem>.vec` (binary header +
/// f32 rows) and `<stem>.jsonl` (one metadata object per row). The row counts
/// of the two files must always agree; `load` treats a mismatch as fatal.
pub struct VectorIndex<M> {
	dim: usize,
	vectors: Vec<f32>,
	metas: Vec<M>,
}

impl<M> VectorIndex<M> {
	pub fn new(dim: usize) -> Self {
		Self { dim, vectors: Vec::new(), metas: Vec::new() }
	}

	pub fn dim(&self) -> usize {
		self.dim
	}

	pub fn len(&self) -> usize {
		self.metas.len()
	}

	pub fn is_empty(&self) -> bool {
		self.metas.is_empty()
	}

	pub fn metadata(&self) -> &[M] {
		&self.metas
	}

	pub fn add(&mut self, vectors: &[Vec<f32>], metas: Vec<M>) -> Result<()> {
		if vectors.len() != metas.len() {
			return Err(Error::CountMismatch { vectors: vectors.len(), metadata: metas.len() });
		}
		for vector in vectors {
			if vector.len() != self.dim {
				return Err(Error::DimensionMismatch {
					expected: self.dim,
					actual: vector.len(),
				});
			}
		}

		for vector in vectors {
			self.vectors.extend(normalized(vector));
		}
		self.metas.extend(metas);

		Ok(())
	}

	/// Up to `k` nearest rows by cosine distance, ascending; ties broken by
	/// insertion order so results are deterministic.
	pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(f32, &M)>> {
		if query.len() != self.dim {
			return Err(Error::DimensionMismatch { expected: self.dim, actual: query.len() });
		}

		let query = normalized(query);
		let mut scored: Vec<(f32, usize)> = self
			.metas
			.iter()
			.enumerate()
			.map(|(row, _)| {
				let offset = row * self.dim;
				let dot: f32 = self.vectors[offset..offset + self.dim]
					.iter()
					.zip(query.iter())
					.map(|(a, b)| a * b)
					.sum();
				(1.0 - dot, row)
			})
			.collect();
		scored.sort_by(|a, b| {
			a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal).then(a.1.cmp(&b.1))
		});
		scored.truncate(k);

		Ok(scored.into_iter().map(|(score, row)| (score, &self.metas[row])).collect())
	}
}

impl<M: Serialize> VectorIndex<M> {
	pub fn save(&self, stem: &Path) -> Result<()> {
		let mut vec_file = BufWriter::new(File::create(vector_path(stem))?);
		vec_file.write_all(&MAGIC)?;
		vec_file.write_all(&[METRIC_COSINE])?;
		vec_file.write_all(&(self.dim as u32).to_le_bytes())?;
		vec_file.write_all(&(self.metas.len() as u64).to_le_bytes())?;
		for value in &self.vectors {
			vec_file.write_all(&value.to_le_bytes())?;
		}
		vec_file.flush()?;

		let mut meta_file = BufWriter::new(File::create(metadata_path(stem))?);
		for meta in &self.metas {
			let line =
				serde_json::to_string(meta).map_err(|err| Error::EncodeMetadata { source: err })?;
			meta_file.write_all(line.as_bytes())?;
			meta_file.write_all(b"\n")?;
		}
		meta_file.flush()?;

		Ok(())
	}
}

impl<M: DeserializeOwned> VectorIndex<M> {
	pub fn load(stem: &Path) -> Result<Self> {
		let mut vec_file = BufReader::new(File::open(vector_path(stem))?);

		let mut magic = [0_u8; 8];
		vec_file.read_exact(&mut magic)?;
		if magic != MAGIC {
			return Err(Error::CorruptIndex {
				message: "Unrecognized vector file header.".to_string(),
			});
		}

		let mut metric = [0_u8; 1];
		vec_file.read_exact(&mut metric)?;
		if metric[0] != METRIC_COSINE {
			return Err(Error::UnsupportedMetric { tag: metric[0] });
		}

		let mut dim_bytes = [0_u8; 4];
		vec_file.read_exact(&mut dim_bytes)?;
		let dim = u32::from_le_bytes(dim_bytes) as usize;
		if dim == 0 {
			return Err(Error::CorruptIndex {
				message: "Vector dimension must be greater than zero.".to_string(),
			});
		}

		let mut count_bytes = [0_u8; 8];
		vec_file.read_exact(&mut count_bytes)?;
		let count = u64::from_le_bytes(count_bytes) as usize;

		let mut vectors = Vec::with_capacity(count * dim);
		let mut value_bytes = [0_u8; 4];
		for _ in 0..count * dim {
			vec_file.read_exact(&mut value_bytes).map_err(|_| Error::CorruptIndex {
				message: "Vector file is shorter than its header claims.".to_string(),
			})?;
			vectors.push(f32::from_le_bytes(value_bytes));
		}

		let meta_file = BufReader::new(File::open(metadata_path(stem))?);
		let mut metas = Vec::with_capacity(count);
		for (number, line) in meta_file.lines().enumerate() {
			let line = line?;
			if line.trim().is_empty() {
				continue;
			}
			let meta = serde_json::from_str(&line)
				.map_err(|err| Error::Metadata { line: number + 1, source: err })?;
			metas.push(meta);
		}

		if metas.len() != count {
			return Err(Error::CountMismatch { vectors: count, metadata: metas.len() });
		}

		Ok(Self { dim, vectors, metas })
	}
}

pub fn vector_path(stem: &Path) -> PathBuf {
	stem.with_extension("vec")
}

pub fn metadata_path(stem: &Path) -> PathBuf {
	stem.with_extension("jsonl")
}

fn normalized(vector: &[f32]) -> Vec<f32> {
	let norm = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
	if norm > 0.0 && norm.is_finite() {
		vector.iter().map(|value| value / norm).collect()
	} else {
		vector.to_vec()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn normalizes_to_unit_length() {
		let vector = normalized(&[3.0, 4.0]);
		assert!((vector[0] - 0.6).abs() < 1e-6);
		assert!((vector[1] - 0.8).abs() < 1e-6);
	}

	#[test]
	fn zero_vectors_pass_through() {
		assert_eq!(normalized(&[0.0, 0.0]), vec![0.0, 0.0]);
	}
}
