use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub providers: Providers,
	#[serde(default)]
	pub retrieval: Retrieval,
	#[serde(default)]
	pub ranking: Ranking,
	#[serde(default)]
	pub filter: Filter,
	#[serde(default)]
	pub diversity: Diversity,
	#[serde(default)]
	pub multi_pass: MultiPass,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Service {
	pub log_level: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Storage {
	pub qdrant: Qdrant,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Qdrant {
	pub url: String,
	pub collection: String,
	pub vector_dim: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Providers {
	pub embedding: EmbeddingProviderConfig,
	#[serde(default)]
	pub retry: Retry,
	#[serde(default)]
	pub cache: EmbeddingCache,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub dimensions: u32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Retry {
	pub max_attempts: u32,
	pub base_delay_ms: u64,
	pub max_delay_ms: u64,
	/// Fraction of the computed delay that may be added as jitter.
	pub jitter_ratio: f32,
}
impl Default for Retry {
	fn default() -> Self {
		Self { max_attempts: 3, base_delay_ms: 200, max_delay_ms: 5_000, jitter_ratio: 0.25 }
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EmbeddingCache {
	pub enabled: bool,
	pub ttl_secs: u64,
	pub max_entries: usize,
}
impl Default for EmbeddingCache {
	fn default() -> Self {
		Self { enabled: true, ttl_secs: 3_600, max_entries: 4_096 }
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Retrieval {
	pub top_k: u32,
	pub threshold: f32,
	pub rerank: bool,
	pub over_fetch_factor: u32,
	pub relaxed_threshold_delta: f32,
	pub keyword_threshold: f32,
	pub last_resort_threshold: f32,
	/// Share of rows one document may hold before a widening search is issued.
	pub dominance_ratio: f32,
	pub dominance_min_rows: u32,
	pub filter_mode: String,
	/// Pins the year used to derive vessel age. Defaults to the current UTC year.
	pub reference_year: Option<i32>,
	pub timeout_ms: Option<u64>,
}
impl Default for Retrieval {
	fn default() -> Self {
		Self {
			top_k: 20,
			threshold: 0.6,
			rerank: true,
			over_fetch_factor: 2,
			relaxed_threshold_delta: 0.15,
			keyword_threshold: 0.35,
			last_resort_threshold: 0.2,
			dominance_ratio: 0.8,
			dominance_min_rows: 5,
			filter_mode: "balanced".to_string(),
			reference_year: None,
			timeout_ms: None,
		}
	}
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct DocumentTypeWeights {
	pub primary_legal_code: f32,
	pub national_registry_guidance: f32,
	pub authoritative_commentary: f32,
	pub generic_commentary: f32,
}
impl DocumentTypeWeights {
	pub fn as_array(&self) -> [(&'static str, f32); 4] {
		[
			("primary_legal_code", self.primary_legal_code),
			("national_registry_guidance", self.national_registry_guidance),
			("authoritative_commentary", self.authoritative_commentary),
			("generic_commentary", self.generic_commentary),
		]
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Ranking {
	pub vector_weight: f32,
	pub lexical_weight: f32,
	pub coverage_weight: f32,
	pub density_weight: f32,
	pub density_cap: u32,
	pub score_floor: f32,
	pub code_boost: f32,
	pub jurisdiction_match_boost: f32,
	pub jurisdiction_mismatch_penalty: f32,
	pub tag_boost_step: f32,
	pub tag_boost_cap: f32,
	pub document_type_boosts: DocumentTypeWeights,
}
impl Default for Ranking {
	fn default() -> Self {
		Self {
			vector_weight: 0.5,
			lexical_weight: 0.5,
			coverage_weight: 0.6,
			density_weight: 0.4,
			density_cap: 3,
			score_floor: 0.05,
			code_boost: 2.0,
			jurisdiction_match_boost: 1.25,
			jurisdiction_mismatch_penalty: 0.4,
			tag_boost_step: 0.05,
			tag_boost_cap: 1.2,
			document_type_boosts: DocumentTypeWeights {
				primary_legal_code: 1.3,
				national_registry_guidance: 1.15,
				authoritative_commentary: 1.0,
				generic_commentary: 0.85,
			},
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Filter {
	pub balanced_down_weight: f32,
	pub min_scores: DocumentTypeWeights,
}
impl Default for Filter {
	fn default() -> Self {
		Self {
			balanced_down_weight: 0.3,
			min_scores: DocumentTypeWeights {
				primary_legal_code: 0.2,
				national_registry_guidance: 0.25,
				authoritative_commentary: 0.3,
				generic_commentary: 0.4,
			},
		}
	}
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct DiversityWindow {
	pub size: u32,
	pub min_documents: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Diversity {
	pub same_document_penalty: f32,
	pub windows: Vec<DiversityWindow>,
}
impl Default for Diversity {
	fn default() -> Self {
		Self {
			same_document_penalty: 0.15,
			windows: vec![
				DiversityWindow { size: 10, min_documents: 3 },
				DiversityWindow { size: 20, min_documents: 5 },
			],
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MultiPass {
	pub max_passes: u32,
	pub complex_word_threshold: u32,
	pub pass_weights: Vec<f32>,
	pub aspect_threshold_delta: f32,
	pub per_document_cap: u32,
}
impl Default for MultiPass {
	fn default() -> Self {
		Self {
			max_passes: 3,
			complex_word_threshold: 25,
			pass_weights: vec![1.0, 0.85, 0.7],
			aspect_threshold_delta: 0.1,
			per_document_cap: 2,
		}
	}
}
