mod error;

pub use error::{Error, Result};

use flagstate_domain::text;
use flagstate_storage::models::Chunk;

/// Deterministic bag-of-words embedding: every keyword is hashed into one bucket and the
/// result is L2-normalized. All components are non-negative, so cosine scores land in [0, 1].
pub fn hash_embed(input: &str, dim: usize) -> Vec<f32> {
	let mut vector = vec![0.0_f32; dim.max(1)];

	for keyword in text::keywords(input) {
		let hash = blake3::hash(keyword.as_bytes());
		let mut bytes = [0_u8; 8];

		bytes.copy_from_slice(&hash.as_bytes()[..8]);

		let bucket = (u64::from_le_bytes(bytes) % vector.len() as u64) as usize;

		vector[bucket] += 1.0;
	}

	let norm = vector.iter().map(|value| value * value).sum::<f32>().sqrt();

	if norm > 0.0 {
		for value in &mut vector {
			*value /= norm;
		}
	}

	vector
}

pub fn cosine(left: &[f32], right: &[f32]) -> f32 {
	let dot: f32 = left.iter().zip(right).map(|(a, b)| a * b).sum();
	let left_norm = left.iter().map(|value| value * value).sum::<f32>().sqrt();
	let right_norm = right.iter().map(|value| value * value).sum::<f32>().sqrt();

	if left_norm == 0.0 || right_norm == 0.0 {
		return 0.0;
	}

	(dot / (left_norm * right_norm)).clamp(0.0, 1.0)
}

/// Shorthand for a fixture chunk with a stored chunk id.
pub fn chunk(
	chunk_id: &str,
	document_id: &str,
	document_name: &str,
	category: &str,
	text: &str,
) -> Chunk {
	Chunk {
		chunk_id: Some(chunk_id.to_string()),
		document_id: document_id.to_string(),
		document_name: document_name.to_string(),
		category: category.to_string(),
		text: text.to_string(),
		page_number: Some(1),
		chunk_index: 0,
		similarity: 0.0,
		source_url: None,
	}
}

/// Brute-force cosine index over fixture chunks, used in place of a vector database.
#[derive(Debug, Clone)]
pub struct InMemoryIndex {
	dim: usize,
	rows: Vec<(Vec<f32>, Chunk)>,
}
impl InMemoryIndex {
	pub fn new(dim: usize) -> Self {
		Self { dim: dim.max(1), rows: Vec::new() }
	}

	pub fn dim(&self) -> usize {
		self.dim
	}

	pub fn len(&self) -> usize {
		self.rows.len()
	}

	pub fn is_empty(&self) -> bool {
		self.rows.is_empty()
	}

	pub fn embed(&self, input: &str) -> Vec<f32> {
		hash_embed(input, self.dim)
	}

	/// Indexes the chunk under the embedding of its name and text.
	pub fn insert(&mut self, chunk: Chunk) {
		let vector = self.embed(&format!("{} {}", chunk.document_name, chunk.text));

		self.rows.push((vector, chunk));
	}

	pub fn with_chunks(dim: usize, chunks: impl IntoIterator<Item = Chunk>) -> Self {
		let mut index = Self::new(dim);

		for chunk in chunks {
			index.insert(chunk);
		}

		index
	}

	/// Rows at or above `threshold`, best first; ties keep insertion order.
	pub fn search(
		&self,
		vector: &[f32],
		threshold: f32,
		limit: usize,
		category: Option<&str>,
	) -> Result<Vec<Chunk>> {
		if vector.len() != self.dim {
			return Err(Error::Message(format!(
				"Query vector has {} dimensions, index expects {}.",
				vector.len(),
				self.dim
			)));
		}

		let mut scored: Vec<Chunk> = self
			.rows
			.iter()
			.filter(|(_, chunk)| category.is_none_or(|category| chunk.category == category))
			.map(|(row_vector, chunk)| Chunk {
				similarity: cosine(vector, row_vector),
				..chunk.clone()
			})
			.filter(|chunk| chunk.similarity >= threshold)
			.collect();

		scored.sort_by(|left, right| right.similarity.total_cmp(&left.similarity));
		scored.truncate(limit);

		Ok(scored)
	}

	/// Case-insensitive substring match against document names.
	pub fn find_by_document_name(&self, needle: &str, limit: usize) -> Vec<Chunk> {
		let needle = needle.trim().to_lowercase();

		if needle.is_empty() {
			return Vec::new();
		}

		self.rows
			.iter()
			.filter(|(_, chunk)| chunk.document_name.to_lowercase().contains(needle.as_str()))
			.take(limit)
			.map(|(_, chunk)| chunk.clone())
			.collect()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn identical_text_scores_one() {
		let left = hash_embed("yacht registration malta", 64);
		let right = hash_embed("Malta yacht registration", 64);

		assert!((cosine(&left, &right) - 1.0).abs() < 1e-5);
	}

	#[test]
	fn search_applies_threshold_category_and_limit() {
		let index = InMemoryIndex::with_chunks(64, [
			chunk("a", "d1", "Malta Act", "malta", "yacht registration"),
			chunk("b", "d2", "France Code", "france", "yacht registration"),
			chunk("c", "d3", "Crew Guide", "malta", "seafarer wages"),
		]);
		let query = index.embed("yacht registration");
		let rows = index.search(&query, 0.3, 10, Some("malta")).expect("Search failed.");

		assert_eq!(rows.len(), 1);
		assert_eq!(rows[0].identity(), "a");
		assert!(index.search(&query, 0.3, 0, None).expect("Search failed.").is_empty());
		assert!(index.search(&[1.0], 0.3, 10, None).is_err());
	}

	#[test]
	fn document_name_lookup_is_case_insensitive() {
		let index =
			InMemoryIndex::with_chunks(16, [chunk("a", "d1", "LY3 Large Yacht Code", "uk", "t")]);

		assert_eq!(index.find_by_document_name("ly3", 5).len(), 1);
		assert!(index.find_by_document_name("", 5).is_empty());
	}
}
