use std::{sync::Arc, time::Duration};

use reqwest::Client;
use serde_json::Value;

use crate::{EmbeddingCache, Error, Result, RetryPolicy};
use flagstate_config::EmbeddingProviderConfig;

/// HTTP embedding client for OpenAI-compatible `/embeddings` endpoints.
#[derive(Debug, Clone)]
pub struct EmbeddingClient {
	cfg: EmbeddingProviderConfig,
	client: Client,
	retry: RetryPolicy,
	cache: Option<Arc<EmbeddingCache>>,
}
impl EmbeddingClient {
	pub fn new(cfg: &EmbeddingProviderConfig, retry: RetryPolicy) -> Result<Self> {
		let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;

		Ok(Self { cfg: cfg.clone(), client, retry, cache: None })
	}

	pub fn from_config(cfg: &flagstate_config::Providers) -> Result<Self> {
		let client = Self::new(&cfg.embedding, RetryPolicy::from_config(&cfg.retry))?;

		Ok(match EmbeddingCache::from_config(&cfg.cache) {
			Some(cache) => client.with_cache(Arc::new(cache)),
			None => client,
		})
	}

	pub fn with_cache(mut self, cache: Arc<EmbeddingCache>) -> Self {
		self.cache = Some(cache);

		self
	}

	pub async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
		let key = EmbeddingCache::key(&self.cfg.model, text);

		if let Some(vector) = self.cache.as_ref().and_then(|cache| cache.get(&key)) {
			tracing::debug!(model = %self.cfg.model, "Embedding cache hit.");

			return Ok(vector);
		}

		let texts = vec![text.to_string()];
		let mut vectors = self.retry.run(&key, |_| embed(&self.client, &self.cfg, &texts)).await?;
		let vector = vectors.pop().ok_or_else(|| Error::InvalidResponse {
			message: "Embedding response contained no vectors.".to_string(),
		})?;

		if vector.len() != self.cfg.dimensions as usize {
			return Err(Error::InvalidResponse {
				message: format!(
					"Embedding dimension mismatch: expected {}, got {}.",
					self.cfg.dimensions,
					vector.len()
				),
			});
		}
		if let Some(cache) = self.cache.as_ref() {
			cache.insert(key, vector.clone());
		}

		Ok(vector)
	}
}

pub async fn embed(
	client: &Client,
	cfg: &EmbeddingProviderConfig,
	texts: &[String],
) -> Result<Vec<Vec<f32>>> {
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let body = serde_json::json!({
		"model": cfg.model,
		"input": texts,
		"dimensions": cfg.dimensions,
	});
	let res = client
		.post(url)
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?;
	let status = res.status();

	if !status.is_success() {
		let body = res.text().await.unwrap_or_default();

		return Err(Error::Status { status: status.as_u16(), body });
	}

	let json: Value = res.json().await?;

	parse_embedding_response(json)
}

pub fn parse_embedding_response(json: Value) -> Result<Vec<Vec<f32>>> {
	let data = json.get("data").and_then(|v| v.as_array()).ok_or_else(|| {
		Error::InvalidResponse { message: "Embedding response is missing data array.".to_string() }
	})?;
	let mut indexed: Vec<(usize, Vec<f32>)> = Vec::with_capacity(data.len());

	for (fallback_index, item) in data.iter().enumerate() {
		let index = item
			.get("index")
			.and_then(|v| v.as_u64())
			.map(|v| v as usize)
			.unwrap_or(fallback_index);
		let embedding = item.get("embedding").and_then(|v| v.as_array()).ok_or_else(|| {
			Error::InvalidResponse {
				message: "Embedding item missing embedding array.".to_string(),
			}
		})?;
		let mut vec = Vec::with_capacity(embedding.len());

		for value in embedding {
			let number = value.as_f64().ok_or_else(|| Error::InvalidResponse {
				message: "Embedding value must be numeric.".to_string(),
			})?;

			vec.push(number as f32);
		}

		indexed.push((index, vec));
	}

	indexed.sort_by_key(|(index, _)| *index);

	Ok(indexed.into_iter().map(|(_, vec)| vec).collect())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_embeddings_in_index_order() {
		let json = serde_json::json!({
			"data": [
				{ "index": 1, "embedding": [2.0, 3.0] },
				{ "index": 0, "embedding": [0.5, 1.5] }
			]
		});
		let parsed = parse_embedding_response(json).expect("parse failed");

		assert_eq!(parsed.len(), 2);
		assert_eq!(parsed[0], vec![0.5, 1.5]);
		assert_eq!(parsed[1], vec![2.0, 3.0]);
	}

	#[test]
	fn rejects_non_numeric_values() {
		let json = serde_json::json!({ "data": [{ "embedding": ["x"] }] });

		assert!(matches!(parse_embedding_response(json), Err(Error::InvalidResponse { .. })));
	}
}
