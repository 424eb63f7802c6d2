use flagstate_config::Ranking;
use flagstate_domain::{
	DocumentType, QueryContext,
	jurisdiction::{self, JurisdictionMatch},
	legal_code, text,
};
use flagstate_storage::models::Chunk;

use crate::model::{RankedChunk, sort_ranked};

/// Named multiplicative stages, applied in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoostStage {
	DocumentType,
	QueryCode,
	Jurisdiction,
	ContextTags,
}
impl BoostStage {
	pub const DEFAULT_CHAIN: [Self; 4] =
		[Self::DocumentType, Self::QueryCode, Self::Jurisdiction, Self::ContextTags];

	pub fn multiplier(
		self,
		candidate: &RankedChunk,
		signals: &QuerySignals<'_>,
		ranking: &Ranking,
	) -> f32 {
		match self {
			Self::DocumentType => document_type_weight(candidate.document_type, ranking),
			Self::QueryCode => {
				let haystack =
					format!("{} {}", candidate.chunk.document_name, candidate.chunk.category);
				let cited = signals
					.context
					.cited_codes
					.iter()
					.any(|code| legal_code::mentions_code(&haystack, code));

				if cited { ranking.code_boost } else { 1.0 }
			},
			Self::Jurisdiction => {
				let candidate = candidate.jurisdiction.as_deref();

				match jurisdiction::compare(candidate, signals.jurisdiction) {
					JurisdictionMatch::Match => ranking.jurisdiction_match_boost,
					JurisdictionMatch::Mismatch => ranking.jurisdiction_mismatch_penalty,
					JurisdictionMatch::Unknown => 1.0,
				}
			},
			Self::ContextTags => {
				let matched = signals.context.matched_tag_count(&candidate.chunk.text);

				(1.0 + ranking.tag_boost_step * matched as f32).min(ranking.tag_boost_cap)
			},
		}
	}
}

pub fn document_type_weight(document_type: DocumentType, ranking: &Ranking) -> f32 {
	let weights = &ranking.document_type_boosts;

	match document_type {
		DocumentType::PrimaryLegalCode => weights.primary_legal_code,
		DocumentType::NationalRegistryGuidance => weights.national_registry_guidance,
		DocumentType::AuthoritativeCommentary => weights.authoritative_commentary,
		DocumentType::GenericCommentary => weights.generic_commentary,
	}
}

/// Query-side inputs shared by every candidate.
#[derive(Debug, Clone)]
pub struct QuerySignals<'a> {
	pub context: &'a QueryContext,
	/// Target jurisdiction: the caller's hint, else the one named in the question.
	pub jurisdiction: Option<&'a str>,
	terms: Vec<QueryTerm>,
}
impl<'a> QuerySignals<'a> {
	pub fn new(query: &str, context: &'a QueryContext, jurisdiction: Option<&'a str>) -> Self {
		let terms = text::keywords(query)
			.into_iter()
			.map(|term| {
				let mut forms = vec![term.clone()];

				forms.extend(text::synonyms(&term).into_iter().map(str::to_string));

				QueryTerm { forms }
			})
			.collect();

		Self { context, jurisdiction: jurisdiction.or(context.jurisdiction.as_deref()), terms }
	}
}

#[derive(Debug, Clone)]
struct QueryTerm {
	forms: Vec<String>,
}

pub struct LexicalReranker<'a> {
	ranking: &'a Ranking,
	chain: Vec<BoostStage>,
}
impl<'a> LexicalReranker<'a> {
	pub fn new(ranking: &'a Ranking) -> Self {
		Self::with_chain(ranking, BoostStage::DEFAULT_CHAIN.to_vec())
	}

	pub fn with_chain(ranking: &'a Ranking, chain: Vec<BoostStage>) -> Self {
		Self { ranking, chain }
	}

	/// Scores and sorts `candidates`, keeping at most `limit`.
	pub fn rerank(
		&self,
		signals: &QuerySignals<'_>,
		candidates: Vec<Chunk>,
		limit: usize,
	) -> Vec<RankedChunk> {
		let mut ranked: Vec<RankedChunk> =
			candidates.into_iter().map(|chunk| self.score(signals, chunk)).collect();

		sort_ranked(&mut ranked);
		ranked.truncate(limit);

		ranked
	}

	pub fn score(&self, signals: &QuerySignals<'_>, chunk: Chunk) -> RankedChunk {
		let mut ranked = RankedChunk::unscored(chunk);
		let lexical = lexical_score(
			signals,
			&format!("{} {}", ranked.chunk.document_name, ranked.chunk.text),
			self.ranking,
		);
		let base = ranked.chunk.similarity * self.ranking.vector_weight
			+ lexical * self.ranking.lexical_weight;
		let boosted = self
			.chain
			.iter()
			.fold(base, |score, stage| score * stage.multiplier(&ranked, signals, self.ranking));

		ranked.lexical_score = lexical;
		ranked.base_score = base;
		ranked.combined_score = boosted.max(base.min(self.ranking.score_floor));

		ranked
	}
}

/// Term coverage blended with capped term density. Both count a term as present when it or any
/// of its synonyms appears as a phrase.
pub fn lexical_score(signals: &QuerySignals<'_>, content: &str, ranking: &Ranking) -> f32 {
	if signals.terms.is_empty() {
		return 0.0;
	}

	let normalized = text::normalized_phrase_text(content);
	let cap = ranking.density_cap.max(1) as usize;
	let mut covered = 0_usize;
	let mut density_sum = 0.0_f32;

	for term in &signals.terms {
		let occurrences: usize =
			term.forms.iter().map(|form| phrase_occurrences(&normalized, form)).sum();

		if occurrences > 0 {
			covered += 1;
		}

		density_sum += occurrences.min(cap) as f32 / cap as f32;
	}

	let total = signals.terms.len() as f32;
	let coverage = covered as f32 / total;
	let density = density_sum / total;

	coverage * ranking.coverage_weight + density * ranking.density_weight
}

fn phrase_occurrences(normalized: &str, phrase: &str) -> usize {
	let needle = text::normalized_phrase_text(phrase);

	if needle.trim().is_empty() {
		return 0;
	}

	// Needles are space-padded, so adjacent matches share a space; step over it.
	let mut count = 0;
	let mut start = 0;

	while let Some(found) = normalized[start..].find(needle.as_str()) {
		count += 1;
		start += found + needle.len() - 1;
	}

	count
}

#[cfg(test)]
mod tests {
	use super::*;

	fn chunk(name: &str, category: &str, body: &str, similarity: f32) -> Chunk {
		Chunk {
			chunk_id: Some(format!("{name}-{body}")),
			document_id: name.to_string(),
			document_name: name.to_string(),
			category: category.to_string(),
			text: body.to_string(),
			page_number: Some(1),
			chunk_index: 0,
			similarity,
			source_url: None,
		}
	}

	#[test]
	fn counts_adjacent_phrase_occurrences() {
		let normalized = text::normalized_phrase_text("vat vat vat");

		assert_eq!(phrase_occurrences(&normalized, "vat"), 3);
	}

	#[test]
	fn lexical_score_blends_coverage_and_density() {
		let ranking = Ranking::default();
		let context = QueryContext::default();
		let signals = QuerySignals::new("vat crew", &context, None);
		let full = lexical_score(&signals, "VAT rules. Seafarer VAT.", &ranking);

		// vat: covered, 2 of 3; crew (via seafarer): covered, 1 of 3.
		let expected = 0.6 + 0.4 * ((2.0 / 3.0 + 1.0 / 3.0) / 2.0);

		assert!((full - expected).abs() < 1e-5);
		assert_eq!(lexical_score(&signals, "unrelated", &ranking), 0.0);
	}

	#[test]
	fn cited_code_in_document_name_gets_code_boost() {
		let ranking = Ranking::default();
		let context = QueryContext {
			cited_codes: ["SOLAS".to_string()].into_iter().collect(),
			..Default::default()
		};
		let signals = QuerySignals::new("fire safety", &context, None);
		let reranker = LexicalReranker::with_chain(&ranking, vec![BoostStage::QueryCode]);
		let cited = reranker.score(&signals, chunk("SOLAS Chapter II-2", "general", "fire", 0.5));
		let other = reranker.score(&signals, chunk("Fire guide", "general", "fire", 0.5));

		assert!((cited.combined_score - cited.base_score * ranking.code_boost).abs() < 1e-5);
		assert!((other.combined_score - other.base_score).abs() < 1e-5);
	}

	#[test]
	fn jurisdiction_mismatch_is_soft_and_floored() {
		let ranking = Ranking::default();
		let context = QueryContext::default();
		let signals = QuerySignals::new("registration", &context, Some("Malta"));
		let reranker = LexicalReranker::with_chain(&ranking, vec![BoostStage::Jurisdiction]);
		let matched = reranker.score(&signals, chunk("Act", "malta", "registration", 0.8));
		let mismatched = reranker.score(&signals, chunk("Act", "france", "registration", 0.8));
		let unknown = reranker.score(&signals, chunk("Act", "general", "registration", 0.8));

		assert!((matched.combined_score - matched.base_score * 1.25).abs() < 1e-5);
		assert!((mismatched.combined_score - mismatched.base_score * 0.4).abs() < 1e-5);
		assert!((unknown.combined_score - unknown.base_score).abs() < 1e-5);

		let tiny = reranker.score(&signals, chunk("Act", "france", "other", 0.1));

		assert!(tiny.combined_score > 0.0);
		assert!(tiny.combined_score >= tiny.base_score.min(ranking.score_floor));
	}

	#[test]
	fn rerank_orders_by_score_then_similarity_then_identity() {
		let ranking = Ranking::default();
		let context = QueryContext::default();
		let signals = QuerySignals::new("survey", &context, None);
		let reranker = LexicalReranker::new(&ranking);
		let ranked = reranker.rerank(
			&signals,
			vec![
				chunk("Blog", "general", "nothing", 0.5),
				chunk("Blog", "general", "survey", 0.5),
				chunk("Blog", "general", "survey", 0.5),
			],
			2,
		);

		assert_eq!(ranked.len(), 2);
		assert!(ranked[0].chunk.text.contains("survey"));
		assert!(ranked[0].combined_score >= ranked[1].combined_score);
	}
}
