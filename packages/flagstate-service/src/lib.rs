pub mod cancel;
pub mod diagnostics;
pub mod diversity;
pub mod filter;
pub mod format;
pub mod model;
pub mod orchestrator;
pub mod rerank;
pub mod retrieve;
pub mod retriever;

mod error;

pub use cancel::{CancellationToken, Deadline};
pub use diagnostics::{
	CascadeStage, CascadeStep, CascadeTrace, PassStat, PassStatus, RetrievalDiagnostics, Strategy,
};
pub use diversity::DiversitySelector;
pub use error::{Error, Result};
pub use filter::{FilterOutcome, PostRankFilter};
pub use format::{format_chunk, format_context, unique_document_ids};
pub use model::{FilterMode, RankedChunk, RetrievalRequest, RetrievalResult};
pub use orchestrator::MultiPassOrchestrator;
pub use rerank::{BoostStage, LexicalReranker, QuerySignals};
pub use retriever::{CascadeOutcome, SearchPlan, VectorRetriever};

use std::{future::Future, pin::Pin, sync::Arc};

use flagstate_config::Config;
use flagstate_domain::{QueryContextExtractor, QueryExpander};
use flagstate_providers::EmbeddingClient;
use flagstate_storage::{models::Chunk, qdrant::QdrantStore};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	fn embed<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<Vec<f32>>>;
}

pub trait VectorStore
where
	Self: Send + Sync,
{
	fn search<'a>(
		&'a self,
		vector: &'a [f32],
		threshold: f32,
		limit: u32,
		category: Option<&'a str>,
	) -> BoxFuture<'a, Result<Vec<Chunk>>>;
}

/// Optional document-name lookup used to pull in documents named after a cited legal code.
pub trait MetadataLookup
where
	Self: Send + Sync,
{
	fn find_by_document_name<'a>(
		&'a self,
		needle: &'a str,
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<Chunk>>>;
}

#[derive(Clone)]
pub struct Providers {
	pub embedding: Arc<dyn EmbeddingProvider>,
	pub store: Arc<dyn VectorStore>,
	pub metadata: Option<Arc<dyn MetadataLookup>>,
}
impl Providers {
	pub fn new(embedding: Arc<dyn EmbeddingProvider>, store: Arc<dyn VectorStore>) -> Self {
		Self { embedding, store, metadata: None }
	}

	pub fn with_metadata(mut self, metadata: Arc<dyn MetadataLookup>) -> Self {
		self.metadata = Some(metadata);

		self
	}
}

/// Entry point of the retrieval core. Holds no per-request state.
pub struct RetrievalService {
	pub cfg: Config,
	pub providers: Providers,
	extractor: QueryContextExtractor,
	expander: QueryExpander,
}
impl RetrievalService {
	pub fn new(cfg: Config, providers: Providers) -> Self {
		let extractor = match cfg.retrieval.reference_year {
			Some(year) => QueryContextExtractor::new(year),
			None => QueryContextExtractor::current(),
		};

		Self { cfg, providers, extractor, expander: QueryExpander::default() }
	}

	pub fn extractor(&self) -> &QueryContextExtractor {
		&self.extractor
	}

	pub fn expander(&self) -> &QueryExpander {
		&self.expander
	}
}

impl EmbeddingProvider for EmbeddingClient {
	fn embed<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<Vec<f32>>> {
		Box::pin(async move { Ok(self.embed_one(text).await?) })
	}
}

impl VectorStore for QdrantStore {
	fn search<'a>(
		&'a self,
		vector: &'a [f32],
		threshold: f32,
		limit: u32,
		category: Option<&'a str>,
	) -> BoxFuture<'a, Result<Vec<Chunk>>> {
		Box::pin(async move {
			Ok(QdrantStore::search(self, vector, threshold, limit, category).await?)
		})
	}
}

impl MetadataLookup for QdrantStore {
	fn find_by_document_name<'a>(
		&'a self,
		needle: &'a str,
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<Chunk>>> {
		Box::pin(async move { Ok(QdrantStore::find_by_document_name(self, needle, limit).await?) })
	}
}
