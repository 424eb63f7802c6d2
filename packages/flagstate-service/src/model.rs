use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::diagnostics::RetrievalDiagnostics;
use flagstate_domain::{DocumentType, jurisdiction};
use flagstate_storage::models::Chunk;

/// A chunk plus the scores derived for it during one request.
#[derive(Debug, Clone, Serialize)]
pub struct RankedChunk {
	pub chunk: Chunk,
	pub identity: String,
	/// Final score after boosts, filters, penalties, and pass weighting. Not bounded above by 1.
	pub combined_score: f32,
	/// Similarity and lexical blend before any multiplier.
	pub base_score: f32,
	pub lexical_score: f32,
	pub document_type: DocumentType,
	pub jurisdiction: Option<String>,
	pub pass_weight: f32,
	pub downranked: bool,
}
impl RankedChunk {
	/// Wraps a chunk with its similarity as the only signal.
	pub fn unscored(chunk: Chunk) -> Self {
		let identity = chunk.identity();
		let document_type = DocumentType::classify(&chunk.document_name, &chunk.category);
		let jurisdiction = jurisdiction::detect_for_document(&chunk.category, &chunk.document_name)
			.map(str::to_string);
		let similarity = chunk.similarity;

		Self {
			chunk,
			identity,
			combined_score: similarity,
			base_score: similarity,
			lexical_score: 0.0,
			document_type,
			jurisdiction,
			pass_weight: 1.0,
			downranked: false,
		}
	}

	pub fn document_key(&self) -> &str {
		self.chunk.document_key()
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterMode {
	Strict,
	Balanced,
}
impl FilterMode {
	pub fn parse(raw: &str) -> Option<Self> {
		match raw.trim().to_ascii_lowercase().as_str() {
			"strict" => Some(Self::Strict),
			"balanced" => Some(Self::Balanced),
			_ => None,
		}
	}

	pub fn as_str(self) -> &'static str {
		match self {
			Self::Strict => "strict",
			Self::Balanced => "balanced",
		}
	}
}

/// One call to `retrieve`. Unset options fall back to the `[retrieval]` config section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetrievalRequest {
	pub question: String,
	pub category: Option<String>,
	pub top_k: Option<u32>,
	pub threshold: Option<f32>,
	pub rerank: Option<bool>,
	pub jurisdiction_hint: Option<String>,
	pub filter_mode: Option<FilterMode>,
}
impl RetrievalRequest {
	pub fn new(question: impl Into<String>) -> Self {
		Self { question: question.into(), ..Default::default() }
	}

	pub fn with_category(mut self, category: impl Into<String>) -> Self {
		self.category = Some(category.into());

		self
	}

	pub fn with_top_k(mut self, top_k: u32) -> Self {
		self.top_k = Some(top_k);

		self
	}

	pub fn with_threshold(mut self, threshold: f32) -> Self {
		self.threshold = Some(threshold);

		self
	}

	pub fn with_rerank(mut self, rerank: bool) -> Self {
		self.rerank = Some(rerank);

		self
	}

	pub fn with_jurisdiction_hint(mut self, hint: impl Into<String>) -> Self {
		self.jurisdiction_hint = Some(hint.into());

		self
	}

	pub fn with_filter_mode(mut self, mode: FilterMode) -> Self {
		self.filter_mode = Some(mode);

		self
	}
}

#[derive(Debug, Clone, Serialize)]
pub struct RetrievalResult {
	pub chunks: Vec<RankedChunk>,
	pub diagnostics: RetrievalDiagnostics,
}
impl RetrievalResult {
	pub fn identities(&self) -> Vec<&str> {
		self.chunks.iter().map(|ranked| ranked.identity.as_str()).collect()
	}
}

pub fn cmp_f32_desc(a: f32, b: f32) -> Ordering {
	match (a.is_nan(), b.is_nan()) {
		(true, true) => Ordering::Equal,
		(true, false) => Ordering::Greater,
		(false, true) => Ordering::Less,
		(false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
	}
}

/// Score descending, then similarity descending, then identity ascending. The identity
/// tie-break keeps repeated runs identical.
pub fn cmp_ranked(left: &RankedChunk, right: &RankedChunk) -> Ordering {
	cmp_f32_desc(left.combined_score, right.combined_score)
		.then_with(|| cmp_f32_desc(left.chunk.similarity, right.chunk.similarity))
		.then_with(|| left.identity.cmp(&right.identity))
}

pub fn sort_ranked(items: &mut [RankedChunk]) {
	items.sort_by(cmp_ranked);
}
