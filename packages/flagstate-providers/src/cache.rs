use std::time::Duration;

use moka::sync::Cache;

/// In-process embedding cache keyed by a blake3 hash of model and text. Entries live for a fixed
/// TTL and the entry count is bounded.
#[derive(Debug, Clone)]
pub struct EmbeddingCache {
	cache: Cache<String, Vec<f32>>,
}
impl EmbeddingCache {
	pub fn new(ttl: Duration, max_entries: u64) -> Self {
		let cache = Cache::builder().max_capacity(max_entries.max(1)).time_to_live(ttl).build();

		Self { cache }
	}

	pub fn from_config(cfg: &flagstate_config::EmbeddingCache) -> Option<Self> {
		cfg.enabled.then(|| Self::new(Duration::from_secs(cfg.ttl_secs), cfg.max_entries as u64))
	}

	pub fn key(model: &str, text: &str) -> String {
		let mut hasher = blake3::Hasher::new();

		hasher.update(model.as_bytes());
		hasher.update(&[0]);
		hasher.update(text.as_bytes());

		hasher.finalize().to_hex().to_string()
	}

	pub fn get(&self, key: &str) -> Option<Vec<f32>> {
		self.cache.get(key)
	}

	pub fn insert(&self, key: String, vector: Vec<f32>) {
		self.cache.insert(key, vector);
	}

	/// Entry count after pending evictions and expirations are applied.
	pub fn len(&self) -> u64 {
		self.cache.run_pending_tasks();

		self.cache.entry_count()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn hits_return_the_stored_vector() {
		let cache = EmbeddingCache::new(Duration::from_secs(60), 4);

		cache.insert("a".to_string(), vec![1.0, 2.0]);

		assert_eq!(cache.get("a"), Some(vec![1.0, 2.0]));
		assert_eq!(cache.get("b"), None);
	}

	#[test]
	fn entries_expire_after_ttl() {
		let cache = EmbeddingCache::new(Duration::from_millis(50), 4);

		cache.insert("a".to_string(), vec![1.0]);
		std::thread::sleep(Duration::from_millis(120));

		assert_eq!(cache.get("a"), None);
		assert!(cache.is_empty());
	}

	#[test]
	fn entry_count_stays_bounded() {
		let cache = EmbeddingCache::new(Duration::from_secs(60), 2);

		for idx in 0..16 {
			cache.insert(format!("k{idx}"), vec![idx as f32]);
		}

		assert!(cache.len() <= 2);
	}

	#[test]
	fn keys_depend_on_model_and_text() {
		assert_eq!(EmbeddingCache::key("m", "text"), EmbeddingCache::key("m", "text"));
		assert_ne!(EmbeddingCache::key("m", "text"), EmbeddingCache::key("n", "text"));
	}
}
