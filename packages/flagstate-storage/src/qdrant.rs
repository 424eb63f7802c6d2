use qdrant_client::{
	Qdrant,
	qdrant::{Condition, Filter, Query, QueryPointsBuilder, ScrollPointsBuilder},
};

use crate::{
	Error, Result,
	models::{Chunk, FIELD_CATEGORY, FIELD_DOCUMENT_NAME},
};

pub struct QdrantStore {
	pub client: Qdrant,
	pub collection: String,
	pub vector_dim: u32,
}
impl QdrantStore {
	pub fn new(cfg: &flagstate_config::Qdrant) -> Result<Self> {
		let client = Qdrant::from_url(&cfg.url).build()?;

		Ok(Self { client, collection: cfg.collection.clone(), vector_dim: cfg.vector_dim })
	}

	/// Nearest-neighbour search. Rows come back in store order; callers must not assume that
	/// order is final.
	pub async fn search(
		&self,
		vector: &[f32],
		threshold: f32,
		limit: u32,
		category: Option<&str>,
	) -> Result<Vec<Chunk>> {
		if vector.len() != self.vector_dim as usize {
			return Err(Error::InvalidArgument(format!(
				"Query vector has {} dimensions, collection expects {}.",
				vector.len(),
				self.vector_dim
			)));
		}
		if limit == 0 {
			return Ok(Vec::new());
		}

		let mut search = QueryPointsBuilder::new(self.collection.clone())
			.query(Query::new_nearest(vector.to_vec()))
			.score_threshold(threshold)
			.limit(limit as u64)
			.with_payload(true);

		if let Some(category) = category.filter(|category| !category.trim().is_empty()) {
			search = search.filter(Filter::must([Condition::matches(
				FIELD_CATEGORY,
				category.to_string(),
			)]));
		}

		let response = self.client.query(search).await?;

		Ok(response
			.result
			.iter()
			.filter_map(|point| Chunk::from_payload(point.id.as_ref(), &point.payload, point.score))
			.collect())
	}

	/// Chunks whose document name contains `needle` as full-text tokens. Lookup rows carry no
	/// similarity of their own and come back with zero.
	pub async fn find_by_document_name(&self, needle: &str, limit: u32) -> Result<Vec<Chunk>> {
		if needle.trim().is_empty() || limit == 0 {
			return Ok(Vec::new());
		}

		let scroll = ScrollPointsBuilder::new(self.collection.clone())
			.filter(Filter::must([Condition::matches_text(FIELD_DOCUMENT_NAME, needle.trim())]))
			.limit(limit)
			.with_payload(true);
		let response = self.client.scroll(scroll).await?;

		Ok(response
			.result
			.iter()
			.filter_map(|point| Chunk::from_payload(point.id.as_ref(), &point.payload, 0.0))
			.collect())
	}
}
