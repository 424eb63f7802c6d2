use std::collections::{HashMap, HashSet};

use flagstate_config::{Diversity, DiversityWindow};

use crate::model::{RankedChunk, cmp_ranked};

/// Orders a filtered candidate list under a soft same-document penalty, then makes sure every
/// configured prefix window holds enough distinct documents.
pub struct DiversitySelector<'a> {
	policy: &'a Diversity,
}
impl<'a> DiversitySelector<'a> {
	pub fn new(policy: &'a Diversity) -> Self {
		Self { policy }
	}

	pub fn select(&self, candidates: Vec<RankedChunk>, top_k: usize) -> Vec<RankedChunk> {
		if candidates.is_empty() || top_k == 0 {
			return Vec::new();
		}

		let (mut selected, mut pool) = self.penalized_order(candidates, top_k);
		let mut previous_size = 0_usize;

		for window in &self.policy.windows {
			enforce_window(&mut selected, &mut pool, window, previous_size);

			previous_size = window.size as usize;
		}

		selected
	}

	/// Greedy pick by `score * (1 - penalty)^n`, where `n` counts chunks of the same document
	/// already picked. The penalized score replaces the combined score.
	fn penalized_order(
		&self,
		mut candidates: Vec<RankedChunk>,
		top_k: usize,
	) -> (Vec<RankedChunk>, Vec<RankedChunk>) {
		let keep = 1.0 - self.policy.same_document_penalty;
		let mut per_document: HashMap<String, i32> = HashMap::new();
		let mut selected = Vec::with_capacity(top_k.min(candidates.len()));

		candidates.sort_by(cmp_ranked);

		while selected.len() < top_k && !candidates.is_empty() {
			let mut best_idx = 0;
			let mut best_score = f32::NEG_INFINITY;

			for (idx, candidate) in candidates.iter().enumerate() {
				let seen = per_document.get(candidate.document_key()).copied().unwrap_or(0);
				let adjusted = candidate.combined_score * keep.powi(seen);

				// Strictly greater keeps the earlier, better-ranked candidate on ties.
				if adjusted > best_score {
					best_idx = idx;
					best_score = adjusted;
				}
			}

			let mut picked = candidates.remove(best_idx);

			*per_document.entry(picked.document_key().to_string()).or_default() += 1;
			picked.combined_score = best_score;

			selected.push(picked);
		}

		(selected, candidates)
	}
}

/// Swaps low-scoring duplicates inside `window` for the best chunks of unseen documents, taken
/// from the rest of the list or from the unselected pool. Positions before `protected` belong
/// to a smaller, already satisfied window and are never touched.
fn enforce_window(
	selected: &mut Vec<RankedChunk>,
	pool: &mut Vec<RankedChunk>,
	window: &DiversityWindow,
	protected: usize,
) {
	let prefix = (window.size as usize).min(selected.len());
	let required = (window.min_documents as usize).min(prefix);

	loop {
		let present: HashSet<&str> =
			selected[..prefix].iter().map(RankedChunk::document_key).collect();

		if present.len() >= required {
			return;
		}

		let Some(victim) = lowest_duplicate(&selected[..prefix], protected) else { return };
		let tail_best = best_new_document(&selected[prefix..], &present).map(|idx| idx + prefix);
		let pool_best = best_new_document(pool, &present);

		match (tail_best, pool_best) {
			(Some(tail), Some(from_pool))
				if cmp_ranked(&pool[from_pool], &selected[tail]).is_lt() =>
			{
				swap_in_from_pool(selected, pool, victim, from_pool, prefix);
			},
			(Some(tail), _) => selected.swap(victim, tail),
			(None, Some(from_pool)) => swap_in_from_pool(selected, pool, victim, from_pool, prefix),
			(None, None) => return,
		}
	}
}

/// Lowest-scoring entry at or after `protected` whose document also appears elsewhere in the
/// window.
fn lowest_duplicate(window: &[RankedChunk], protected: usize) -> Option<usize> {
	let mut counts: HashMap<&str, usize> = HashMap::new();

	for item in window {
		*counts.entry(item.document_key()).or_default() += 1;
	}

	(protected..window.len())
		.filter(|idx| counts.get(window[*idx].document_key()).copied().unwrap_or(0) > 1)
		.max_by(|left, right| cmp_ranked(&window[*left], &window[*right]).then(left.cmp(right)))
}

fn best_new_document(items: &[RankedChunk], present: &HashSet<&str>) -> Option<usize> {
	items
		.iter()
		.enumerate()
		.filter(|(_, item)| !present.contains(item.document_key()))
		.min_by(|left, right| cmp_ranked(left.1, right.1).then(left.0.cmp(&right.0)))
		.map(|(idx, _)| idx)
}

/// The pool chunk takes the victim's slot; the victim moves just past the window and the list
/// keeps its length, returning its last entry to the pool.
fn swap_in_from_pool(
	selected: &mut Vec<RankedChunk>,
	pool: &mut Vec<RankedChunk>,
	victim: usize,
	from_pool: usize,
	prefix: usize,
) {
	let incoming = pool.remove(from_pool);
	let outgoing = std::mem::replace(&mut selected[victim], incoming);
	let len = selected.len();

	selected.insert(prefix.min(len), outgoing);

	if let Some(overflow) = selected.pop() {
		pool.push(overflow);
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use flagstate_storage::models::Chunk;

	fn ranked(id: &str, document: &str, score: f32) -> RankedChunk {
		let mut ranked = RankedChunk::unscored(Chunk {
			chunk_id: Some(id.to_string()),
			document_id: document.to_string(),
			document_name: document.to_string(),
			category: "general".to_string(),
			text: "text".to_string(),
			page_number: None,
			chunk_index: 0,
			similarity: score,
			source_url: None,
		});

		ranked.combined_score = score;

		ranked
	}

	fn distinct_documents(items: &[RankedChunk]) -> usize {
		items.iter().map(RankedChunk::document_key).collect::<HashSet<_>>().len()
	}

	#[test]
	fn soft_penalty_interleaves_close_documents() {
		let policy = Diversity { same_document_penalty: 0.5, windows: Vec::new() };
		let out = DiversitySelector::new(&policy).select(
			vec![ranked("a1", "A", 1.0), ranked("a2", "A", 0.9), ranked("b1", "B", 0.8)],
			3,
		);
		let ids: Vec<_> = out.iter().map(|item| item.identity.as_str()).collect();

		assert_eq!(ids, vec!["a1", "b1", "a2"]);
	}

	#[test]
	fn penalty_is_soft_not_a_cap() {
		let policy = Diversity { same_document_penalty: 0.15, windows: Vec::new() };
		let out = DiversitySelector::new(&policy)
			.select((0..5).map(|i| ranked(&format!("a{i}"), "A", 1.0)).collect(), 5);

		assert_eq!(out.len(), 5);
	}

	#[test]
	fn windows_pull_in_other_documents() {
		let policy = Diversity::default();
		let mut candidates: Vec<RankedChunk> =
			(0..20).map(|i| ranked(&format!("a{i:02}"), "A", 0.99 - i as f32 * 0.001)).collect();

		for (idx, document) in ["B", "C", "D", "E", "F"].iter().enumerate() {
			candidates.push(ranked(&format!("{document}1"), document, 0.01 - idx as f32 * 0.001));
		}

		let policy = Diversity { same_document_penalty: 0.0, ..policy };
		let out = DiversitySelector::new(&policy).select(candidates, 20);

		assert_eq!(out.len(), 20);
		assert!(distinct_documents(&out[..10]) >= 3);
		assert!(distinct_documents(&out[..20]) >= 5);
	}

	#[test]
	fn short_supply_of_documents_is_not_an_error() {
		let policy = Diversity { same_document_penalty: 0.0, ..Diversity::default() };
		let out = DiversitySelector::new(&policy)
			.select((0..12).map(|i| ranked(&format!("a{i:02}"), "A", 0.5)).collect(), 10);

		assert_eq!(out.len(), 10);
		assert_eq!(distinct_documents(&out), 1);
	}

	#[test]
	fn admissible_set_is_preserved() {
		let policy = Diversity::default();
		let candidates: Vec<RankedChunk> = (0..15)
			.map(|i| ranked(&format!("c{i:02}"), ["A", "B"][i % 2], 1.0 - i as f32 * 0.01))
			.collect();
		let input: HashSet<String> = candidates.iter().map(|item| item.identity.clone()).collect();
		let out = DiversitySelector::new(&policy).select(candidates, 15);

		assert_eq!(out.len(), 15);
		assert!(out.iter().all(|item| input.contains(&item.identity)));
	}
}
