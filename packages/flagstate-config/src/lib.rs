mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Config, Diversity, DiversityWindow, DocumentTypeWeights, EmbeddingCache,
	EmbeddingProviderConfig, Filter, MultiPass, Providers, Qdrant, Ranking, Retrieval, Retry,
	Service, Storage,
};

use std::{fs, path::Path};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;
	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);
	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.providers.embedding.dimensions == 0 {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must be greater than zero.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions != cfg.storage.qdrant.vector_dim {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must match storage.qdrant.vector_dim."
				.to_string(),
		});
	}
	if cfg.providers.embedding.api_key.trim().is_empty() {
		return Err(Error::Validation {
			message: "Provider embedding api_key must be non-empty.".to_string(),
		});
	}
	if cfg.storage.qdrant.collection.trim().is_empty() {
		return Err(Error::Validation {
			message: "storage.qdrant.collection must be non-empty.".to_string(),
		});
	}
	if cfg.providers.retry.max_attempts == 0 {
		return Err(Error::Validation {
			message: "providers.retry.max_attempts must be greater than zero.".to_string(),
		});
	}
	if cfg.providers.retry.base_delay_ms > cfg.providers.retry.max_delay_ms {
		return Err(Error::Validation {
			message: "providers.retry.base_delay_ms must not exceed providers.retry.max_delay_ms."
				.to_string(),
		});
	}
	if !(0.0..=1.0).contains(&cfg.providers.retry.jitter_ratio) {
		return Err(Error::Validation {
			message: "providers.retry.jitter_ratio must be in the range 0.0-1.0.".to_string(),
		});
	}
	if cfg.providers.cache.enabled {
		if cfg.providers.cache.ttl_secs == 0 {
			return Err(Error::Validation {
				message: "providers.cache.ttl_secs must be greater than zero.".to_string(),
			});
		}
		if cfg.providers.cache.max_entries == 0 {
			return Err(Error::Validation {
				message: "providers.cache.max_entries must be greater than zero.".to_string(),
			});
		}
	}

	validate_retrieval(cfg)?;
	validate_ranking(cfg)?;

	if !(0.0..=1.0).contains(&cfg.filter.balanced_down_weight) {
		return Err(Error::Validation {
			message: "filter.balanced_down_weight must be in the range 0.0-1.0.".to_string(),
		});
	}

	for (label, value) in cfg.filter.min_scores.as_array() {
		if !value.is_finite() || value < 0.0 {
			return Err(Error::Validation {
				message: format!("filter.min_scores.{label} must be a finite number >= 0."),
			});
		}
	}

	if !(0.0..1.0).contains(&cfg.diversity.same_document_penalty) {
		return Err(Error::Validation {
			message: "diversity.same_document_penalty must be in the range 0.0-1.0 (exclusive)."
				.to_string(),
		});
	}

	let mut previous_size = 0_u32;

	for window in &cfg.diversity.windows {
		if window.size <= previous_size {
			return Err(Error::Validation {
				message: "diversity.windows must be sorted by strictly increasing size."
					.to_string(),
			});
		}
		if window.min_documents == 0 || window.min_documents > window.size {
			return Err(Error::Validation {
				message: "diversity.windows.min_documents must be in the range 1-size."
					.to_string(),
			});
		}

		previous_size = window.size;
	}

	validate_multi_pass(cfg)
}

fn validate_retrieval(cfg: &Config) -> Result<()> {
	let retrieval = &cfg.retrieval;

	if retrieval.top_k == 0 {
		return Err(Error::Validation {
			message: "retrieval.top_k must be greater than zero.".to_string(),
		});
	}
	if retrieval.over_fetch_factor == 0 {
		return Err(Error::Validation {
			message: "retrieval.over_fetch_factor must be greater than zero.".to_string(),
		});
	}

	for (label, value) in [
		("retrieval.threshold", retrieval.threshold),
		("retrieval.keyword_threshold", retrieval.keyword_threshold),
		("retrieval.last_resort_threshold", retrieval.last_resort_threshold),
		("retrieval.relaxed_threshold_delta", retrieval.relaxed_threshold_delta),
	] {
		if !value.is_finite() || !(0.0..=1.0).contains(&value) {
			return Err(Error::Validation {
				message: format!("{label} must be in the range 0.0-1.0."),
			});
		}
	}

	if retrieval.last_resort_threshold > retrieval.keyword_threshold {
		return Err(Error::Validation {
			message: "retrieval.last_resort_threshold must not exceed retrieval.keyword_threshold."
				.to_string(),
		});
	}
	if !(retrieval.dominance_ratio > 0.0 && retrieval.dominance_ratio <= 1.0) {
		return Err(Error::Validation {
			message: "retrieval.dominance_ratio must be in the range (0.0, 1.0].".to_string(),
		});
	}
	if !matches!(retrieval.filter_mode.as_str(), "strict" | "balanced") {
		return Err(Error::Validation {
			message: "retrieval.filter_mode must be one of strict or balanced.".to_string(),
		});
	}
	if let Some(year) = retrieval.reference_year
		&& !(1950..=9999).contains(&year)
	{
		return Err(Error::Validation {
			message: "retrieval.reference_year must be 1950 or later.".to_string(),
		});
	}
	if retrieval.timeout_ms == Some(0) {
		return Err(Error::Validation {
			message: "retrieval.timeout_ms must be greater than zero when set.".to_string(),
		});
	}

	Ok(())
}

fn validate_ranking(cfg: &Config) -> Result<()> {
	let ranking = &cfg.ranking;

	for (label, value) in [
		("ranking.vector_weight", ranking.vector_weight),
		("ranking.lexical_weight", ranking.lexical_weight),
		("ranking.coverage_weight", ranking.coverage_weight),
		("ranking.density_weight", ranking.density_weight),
	] {
		if !value.is_finite() || !(0.0..=1.0).contains(&value) {
			return Err(Error::Validation {
				message: format!("{label} must be in the range 0.0-1.0."),
			});
		}
	}

	if (ranking.vector_weight + ranking.lexical_weight - 1.0).abs() > 1e-3 {
		return Err(Error::Validation {
			message: "ranking.vector_weight and ranking.lexical_weight must sum to 1.0."
				.to_string(),
		});
	}
	if (ranking.coverage_weight + ranking.density_weight - 1.0).abs() > 1e-3 {
		return Err(Error::Validation {
			message: "ranking.coverage_weight and ranking.density_weight must sum to 1.0."
				.to_string(),
		});
	}
	if ranking.density_cap == 0 {
		return Err(Error::Validation {
			message: "ranking.density_cap must be greater than zero.".to_string(),
		});
	}
	if !(ranking.score_floor > 0.0 && ranking.score_floor < 1.0) {
		return Err(Error::Validation {
			message: "ranking.score_floor must be in the range (0.0, 1.0).".to_string(),
		});
	}
	if ranking.code_boost < 1.0 || ranking.jurisdiction_match_boost < 1.0 {
		return Err(Error::Validation {
			message: "ranking.code_boost and ranking.jurisdiction_match_boost must be >= 1.0."
				.to_string(),
		});
	}
	if !(ranking.jurisdiction_mismatch_penalty > 0.0 && ranking.jurisdiction_mismatch_penalty < 1.0)
	{
		return Err(Error::Validation {
			message: "ranking.jurisdiction_mismatch_penalty must be in the range (0.0, 1.0)."
				.to_string(),
		});
	}
	if ranking.tag_boost_step < 0.0 || ranking.tag_boost_cap < 1.0 {
		return Err(Error::Validation {
			message: "ranking.tag_boost_step must be >= 0 and ranking.tag_boost_cap >= 1.0."
				.to_string(),
		});
	}

	for (label, value) in ranking.document_type_boosts.as_array() {
		if !value.is_finite() || value <= 0.0 {
			return Err(Error::Validation {
				message: format!("ranking.document_type_boosts.{label} must be greater than zero."),
			});
		}
	}

	Ok(())
}

fn validate_multi_pass(cfg: &Config) -> Result<()> {
	let multi_pass = &cfg.multi_pass;

	if multi_pass.max_passes == 0 || multi_pass.max_passes > 3 {
		return Err(Error::Validation {
			message: "multi_pass.max_passes must be in the range 1-3.".to_string(),
		});
	}
	if multi_pass.pass_weights.len() < multi_pass.max_passes as usize {
		return Err(Error::Validation {
			message: "multi_pass.pass_weights must have one weight per pass.".to_string(),
		});
	}
	if multi_pass.pass_weights.iter().any(|weight| !(*weight > 0.0 && *weight <= 1.0)) {
		return Err(Error::Validation {
			message: "multi_pass.pass_weights must be in the range (0.0, 1.0].".to_string(),
		});
	}
	if multi_pass.pass_weights.windows(2).any(|pair| pair[1] > pair[0]) {
		return Err(Error::Validation {
			message: "multi_pass.pass_weights must be non-increasing.".to_string(),
		});
	}
	if multi_pass.per_document_cap == 0 {
		return Err(Error::Validation {
			message: "multi_pass.per_document_cap must be greater than zero.".to_string(),
		});
	}
	if !(0.0..=1.0).contains(&multi_pass.aspect_threshold_delta) {
		return Err(Error::Validation {
			message: "multi_pass.aspect_threshold_delta must be in the range 0.0-1.0."
				.to_string(),
		});
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	cfg.retrieval.filter_mode = cfg.retrieval.filter_mode.trim().to_lowercase();

	if cfg.service.log_level.trim().is_empty() {
		cfg.service.log_level = "info".to_string();
	}
}
