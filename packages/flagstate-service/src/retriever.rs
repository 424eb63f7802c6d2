use std::collections::{BTreeMap, HashSet};

use crate::{
	EmbeddingProvider, Result, VectorStore,
	diagnostics::{CascadeStage, CascadeStep, CascadeTrace},
	model::cmp_f32_desc,
};
use flagstate_domain::{jurisdiction, text};
use flagstate_storage::models::Chunk;

const WIDENING_FACTOR: u32 = 3;

/// What to search for in one cascade.
#[derive(Debug, Clone, Copy)]
pub struct SearchPlan<'a> {
	pub query: &'a str,
	pub category: Option<&'a str>,
	pub limit: u32,
	pub threshold: f32,
	/// Canonical jurisdiction; rows detected as another jurisdiction are dropped before scoring.
	pub jurisdiction: Option<&'a str>,
}

#[derive(Debug, Clone)]
pub struct CascadeOutcome {
	pub chunks: Vec<Chunk>,
	pub trace: CascadeTrace,
}

/// Vector search with an adaptive widening cascade. Each step runs only when the previous one
/// came back empty, and each uses an equal-or-lower threshold and equal-or-broader filters.
pub struct VectorRetriever<'a> {
	embedding: &'a dyn EmbeddingProvider,
	store: &'a dyn VectorStore,
	policy: &'a flagstate_config::Retrieval,
}
impl<'a> VectorRetriever<'a> {
	pub fn new(
		embedding: &'a dyn EmbeddingProvider,
		store: &'a dyn VectorStore,
		policy: &'a flagstate_config::Retrieval,
	) -> Self {
		Self { embedding, store, policy }
	}

	pub async fn retrieve(&self, label: &str, plan: &SearchPlan<'_>) -> Result<CascadeOutcome> {
		let mut trace =
			CascadeTrace { label: label.to_string(), steps: Vec::new(), dominance_widened: false };

		if plan.limit == 0 || plan.query.trim().is_empty() {
			return Ok(CascadeOutcome { chunks: Vec::new(), trace });
		}

		let vector = self.embedding.embed(plan.query).await?;
		let primary = Attempt {
			stage: CascadeStage::Primary,
			threshold: plan.threshold.clamp(0.0, 1.0),
			category: plan.category,
			jurisdiction: plan.jurisdiction,
			limit: plan.limit,
		};
		let mut chunks = self.attempt(&vector, &primary, &mut trace).await?;
		let mut last = primary;

		if chunks.is_empty() {
			let relaxed = Attempt {
				stage: CascadeStage::Relaxed,
				threshold: (last.threshold - self.policy.relaxed_threshold_delta).max(0.0),
				category: None,
				..last
			};

			tracing::debug!(
				label,
				threshold = relaxed.threshold,
				"Primary search empty, relaxing."
			);

			chunks = self.attempt(&vector, &relaxed, &mut trace).await?;
			last = relaxed;
		}

		let mut last_vector = vector;

		if chunks.is_empty() {
			let keyword_query = text::keyword_query(plan.query);

			if keyword_query.is_empty() {
				tracing::debug!(label, "No keywords left after stop-word removal.");
			} else {
				let keyword = Attempt {
					stage: CascadeStage::Keyword,
					threshold: last.threshold.min(self.policy.keyword_threshold),
					..last
				};
				let keyword_vector = if keyword_query == plan.query.trim() {
					last_vector.clone()
				} else {
					self.embedding.embed(&keyword_query).await?
				};

				tracing::debug!(
					label,
					keyword_query = %keyword_query,
					threshold = keyword.threshold,
					"Retrying with keyword query."
				);

				chunks = self.attempt(&keyword_vector, &keyword, &mut trace).await?;
				last = keyword;

				if !chunks.is_empty() {
					last_vector = keyword_vector;
				}
			}
		}
		if chunks.is_empty() {
			let last_resort = Attempt {
				stage: CascadeStage::LastResort,
				threshold: last.threshold.min(self.policy.last_resort_threshold),
				category: None,
				jurisdiction: None,
				limit: last.limit,
			};

			tracing::info!(label, threshold = last_resort.threshold, "Last-resort search.");

			chunks = self.attempt(&last_vector, &last_resort, &mut trace).await?;
			last = last_resort;
		}
		if let Some(dominant) = self.dominant_document(&chunks) {
			let widening = Attempt {
				stage: CascadeStage::DominanceWidening,
				category: None,
				limit: last.limit.saturating_mul(WIDENING_FACTOR),
				..last
			};

			tracing::info!(label, dominant = %dominant, "One document dominates, widening search.");

			let wider = self.attempt(&last_vector, &widening, &mut trace).await?;

			chunks = merge_preferring_others(chunks, wider, &dominant, plan.limit as usize);
			trace.dominance_widened = true;
		}

		Ok(CascadeOutcome { chunks, trace })
	}

	async fn attempt(
		&self,
		vector: &[f32],
		attempt: &Attempt<'_>,
		trace: &mut CascadeTrace,
	) -> Result<Vec<Chunk>> {
		let rows =
			self.store.search(vector, attempt.threshold, attempt.limit, attempt.category).await?;
		let total = rows.len();
		let mut kept = prefilter_jurisdiction(rows, attempt.jurisdiction);

		sort_by_similarity(&mut kept);
		kept.truncate(attempt.limit as usize);
		trace.steps.push(CascadeStep {
			stage: attempt.stage,
			threshold: attempt.threshold,
			category_filter: attempt.category.is_some(),
			jurisdiction_filter: attempt.jurisdiction.is_some(),
			rows: kept.len(),
			prefiltered: total.saturating_sub(kept.len()),
		});

		Ok(kept)
	}

	fn dominant_document(&self, chunks: &[Chunk]) -> Option<String> {
		if chunks.len() < self.policy.dominance_min_rows as usize || chunks.is_empty() {
			return None;
		}

		let mut counts: BTreeMap<&str, usize> = BTreeMap::new();

		for chunk in chunks {
			*counts.entry(chunk.document_key()).or_default() += 1;
		}

		let (document, count) = counts
			.into_iter()
			.max_by(|left, right| left.1.cmp(&right.1).then_with(|| right.0.cmp(left.0)))?;
		let share = count as f32 / chunks.len() as f32;

		(share > self.policy.dominance_ratio).then(|| document.to_string())
	}
}

#[derive(Debug, Clone, Copy)]
struct Attempt<'a> {
	stage: CascadeStage,
	threshold: f32,
	category: Option<&'a str>,
	jurisdiction: Option<&'a str>,
	limit: u32,
}

/// Drops rows whose detected jurisdiction differs from `target`. Rows with no detectable
/// jurisdiction are kept.
pub fn prefilter_jurisdiction(rows: Vec<Chunk>, target: Option<&str>) -> Vec<Chunk> {
	let Some(target) = target else { return rows };

	rows.into_iter()
		.filter(|chunk| {
			jurisdiction::detect_for_document(&chunk.category, &chunk.document_name)
				.is_none_or(|detected| detected == target)
		})
		.collect()
}

fn sort_by_similarity(chunks: &mut [Chunk]) {
	chunks.sort_by(|left, right| {
		cmp_f32_desc(left.similarity, right.similarity)
			.then_with(|| left.identity().cmp(&right.identity()))
	});
}

/// Merges a widened search into the original rows. Rows from other documents fill the budget
/// first; the dominant document keeps at least half of it when it has that many rows.
fn merge_preferring_others(
	original: Vec<Chunk>,
	wider: Vec<Chunk>,
	dominant: &str,
	limit: usize,
) -> Vec<Chunk> {
	let mut seen = HashSet::new();
	let mut others = Vec::new();
	let mut dominant_rows = Vec::new();

	for chunk in original.into_iter().chain(wider) {
		if !seen.insert(chunk.identity()) {
			continue;
		}

		if chunk.document_key() == dominant {
			dominant_rows.push(chunk);
		} else {
			others.push(chunk);
		}
	}

	sort_by_similarity(&mut others);
	sort_by_similarity(&mut dominant_rows);

	let dominant_floor = dominant_rows.len().min((limit / 2).max(1));
	let others_take = others.len().min(limit.saturating_sub(dominant_floor));
	let dominant_take = dominant_rows.len().min(limit.saturating_sub(others_take));
	let mut merged: Vec<Chunk> = others.into_iter().take(others_take).collect();

	merged.extend(dominant_rows.into_iter().take(dominant_take));
	sort_by_similarity(&mut merged);

	merged
}

#[cfg(test)]
mod tests {
	use super::*;

	fn row(id: &str, document: &str, similarity: f32) -> Chunk {
		Chunk {
			chunk_id: Some(id.to_string()),
			document_id: document.to_string(),
			document_name: document.to_string(),
			category: "general".to_string(),
			text: "text".to_string(),
			page_number: None,
			chunk_index: 0,
			similarity,
			source_url: None,
		}
	}

	#[test]
	fn merge_prefers_other_documents_but_keeps_dominant_floor() {
		let original = vec![row("a1", "A", 0.9), row("a2", "A", 0.8), row("a3", "A", 0.7)];
		let wider = vec![row("a1", "A", 0.9), row("b1", "B", 0.5), row("c1", "C", 0.4)];
		let merged = merge_preferring_others(original, wider, "A", 4);
		let ids: Vec<_> = merged.iter().map(Chunk::identity).collect();

		assert_eq!(ids, vec!["a1", "a2", "b1", "c1"]);
	}

	#[test]
	fn prefilter_keeps_unknown_and_matching_rows() {
		let mut malta = row("m", "Merchant Shipping Act", 0.5);
		let mut france = row("f", "Code des transports", 0.5);

		malta.category = "malta".to_string();
		france.category = "france".to_string();

		let kept = prefilter_jurisdiction(
			vec![malta, france, row("u", "Commentary", 0.5)],
			Some("Malta"),
		);
		let ids: Vec<_> = kept.iter().map(Chunk::identity).collect();

		assert_eq!(ids, vec!["m", "u"]);
	}
}
