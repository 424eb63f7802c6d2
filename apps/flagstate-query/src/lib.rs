use std::{path::PathBuf, sync::Arc};

use clap::Parser;
use tracing_subscriber::EnvFilter;

use flagstate_providers::EmbeddingClient;
use flagstate_service::{
	FilterMode, Providers, RetrievalRequest, RetrievalService, format_context,
	unique_document_ids,
};
use flagstate_storage::qdrant::QdrantStore;

#[derive(Debug, Parser)]
#[command(
	version = flagstate_cli::VERSION,
	rename_all = "kebab",
	styles = flagstate_cli::styles(),
)]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: PathBuf,
	#[arg(long, short = 'q')]
	pub question: String,
	/// Restricts the first search to one jurisdiction category tag.
	#[arg(long)]
	pub category: Option<String>,
	#[arg(long)]
	pub top_k: Option<u32>,
	#[arg(long)]
	pub threshold: Option<f32>,
	#[arg(long)]
	pub jurisdiction: Option<String>,
	#[arg(long)]
	pub strict: bool,
	#[arg(long)]
	pub no_rerank: bool,
	/// Prints the full result, diagnostics included, as JSON.
	#[arg(long)]
	pub json: bool,
}
impl Args {
	fn request(&self) -> RetrievalRequest {
		let mut request = RetrievalRequest::new(self.question.clone());

		request.category = self.category.clone();
		request.top_k = self.top_k;
		request.threshold = self.threshold;
		request.jurisdiction_hint = self.jurisdiction.clone();

		if self.strict {
			request.filter_mode = Some(FilterMode::Strict);
		}
		if self.no_rerank {
			request.rerank = Some(false);
		}

		request
	}
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = flagstate_config::load(&args.config)?;

	init_tracing(&config);

	let embedding = EmbeddingClient::from_config(&config.providers)?;
	let store = Arc::new(QdrantStore::new(&config.storage.qdrant)?);
	let providers = Providers::new(Arc::new(embedding), store.clone()).with_metadata(store);
	let service = RetrievalService::new(config, providers);
	let result = service.retrieve(args.request()).await?;

	if args.json {
		println!("{}", serde_json::to_string_pretty(&result)?);

		return Ok(());
	}

	tracing::info!(
		trace_id = %result.diagnostics.trace_id,
		sources = ?unique_document_ids(&result.chunks),
		"Retrieved context."
	);

	println!("{}", format_context(&result.chunks));

	Ok(())
}

fn init_tracing(config: &flagstate_config::Config) {
	let filter =
		EnvFilter::try_new(&config.service.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

	tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}
