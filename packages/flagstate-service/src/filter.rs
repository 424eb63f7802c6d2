use flagstate_config::Filter;
use flagstate_domain::{
	DocumentType,
	jurisdiction::{self, JurisdictionMatch},
};

use crate::model::{FilterMode, RankedChunk, sort_ranked};

#[derive(Debug, Clone, Default)]
pub struct FilterOutcome {
	pub kept: Vec<RankedChunk>,
	/// Identities removed by either pass.
	pub eliminated: Vec<String>,
	/// Identities kept at a reduced score.
	pub downranked: Vec<String>,
}

pub struct PostRankFilter<'a> {
	policy: &'a Filter,
	mode: FilterMode,
}
impl<'a> PostRankFilter<'a> {
	pub fn new(policy: &'a Filter, mode: FilterMode) -> Self {
		Self { policy, mode }
	}

	pub fn min_score(&self, document_type: DocumentType) -> f32 {
		let min_scores = &self.policy.min_scores;

		match document_type {
			DocumentType::PrimaryLegalCode => min_scores.primary_legal_code,
			DocumentType::NationalRegistryGuidance => min_scores.national_registry_guidance,
			DocumentType::AuthoritativeCommentary => min_scores.authoritative_commentary,
			DocumentType::GenericCommentary => min_scores.generic_commentary,
		}
	}

	/// Applies the document-type floor in every mode, then the jurisdiction pass against
	/// `target`. Chunks with no detectable jurisdiction always pass the second step.
	pub fn apply(&self, candidates: Vec<RankedChunk>, target: Option<&str>) -> FilterOutcome {
		let mut outcome = FilterOutcome::default();

		for mut candidate in candidates {
			if candidate.combined_score < self.min_score(candidate.document_type) {
				outcome.eliminated.push(candidate.identity.clone());

				continue;
			}

			match jurisdiction::compare(candidate.jurisdiction.as_deref(), target) {
				JurisdictionMatch::Mismatch => match self.mode {
					FilterMode::Strict => {
						outcome.eliminated.push(candidate.identity.clone());

						continue;
					},
					FilterMode::Balanced => {
						candidate.combined_score *= self.policy.balanced_down_weight;
						candidate.downranked = true;

						outcome.downranked.push(candidate.identity.clone());
					},
				},
				JurisdictionMatch::Match | JurisdictionMatch::Unknown => {},
			}

			outcome.kept.push(candidate);
		}

		sort_ranked(&mut outcome.kept);

		if !outcome.eliminated.is_empty() || !outcome.downranked.is_empty() {
			tracing::debug!(
				mode = self.mode.as_str(),
				eliminated = outcome.eliminated.len(),
				downranked = outcome.downranked.len(),
				"Post-rank filter applied."
			);
		}

		outcome
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use flagstate_storage::models::Chunk;

	fn ranked(id: &str, name: &str, category: &str, score: f32) -> RankedChunk {
		let mut ranked = RankedChunk::unscored(Chunk {
			chunk_id: Some(id.to_string()),
			document_id: id.to_string(),
			document_name: name.to_string(),
			category: category.to_string(),
			text: "text".to_string(),
			page_number: None,
			chunk_index: 0,
			similarity: score,
			source_url: None,
		});

		ranked.combined_score = score;

		ranked
	}

	#[test]
	fn document_type_floor_applies_in_both_modes() {
		let policy = Filter::default();

		for mode in [FilterMode::Strict, FilterMode::Balanced] {
			let outcome = PostRankFilter::new(&policy, mode).apply(
				vec![
					ranked("act", "Shipping Act", "general", 0.25),
					ranked("blog", "Blog post", "general", 0.25),
				],
				None,
			);

			assert_eq!(outcome.kept.len(), 1);
			assert_eq!(outcome.kept[0].identity, "act");
			assert_eq!(outcome.eliminated, vec!["blog"]);
		}
	}

	#[test]
	fn strict_mode_eliminates_mismatched_jurisdictions() {
		let policy = Filter::default();
		let outcome = PostRankFilter::new(&policy, FilterMode::Strict).apply(
			vec![
				ranked("mt", "Shipping Act", "malta", 0.9),
				ranked("fr", "Shipping Act", "france", 0.9),
				ranked("none", "Shipping Act", "general", 0.9),
			],
			Some("Malta"),
		);
		let kept: Vec<_> = outcome.kept.iter().map(|item| item.identity.as_str()).collect();

		assert_eq!(kept, vec!["mt", "none"]);
		assert_eq!(outcome.eliminated, vec!["fr"]);
	}

	#[test]
	fn balanced_mode_down_weights_mismatches() {
		let policy = Filter::default();
		let outcome = PostRankFilter::new(&policy, FilterMode::Balanced)
			.apply(vec![ranked("fr", "Shipping Act", "france", 0.9)], Some("Malta"));

		assert_eq!(outcome.kept.len(), 1);
		assert!((outcome.kept[0].combined_score - 0.9 * policy.balanced_down_weight).abs() < 1e-6);
		assert!(outcome.kept[0].downranked);
		assert_eq!(outcome.downranked, vec!["fr"]);
	}
}
