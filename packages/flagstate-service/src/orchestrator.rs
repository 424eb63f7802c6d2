use std::collections::{HashMap, HashSet};

use crate::{
	Error, Providers, Result,
	cancel::{CancellationToken, Deadline},
	diagnostics::{CascadeTrace, PassStat, PassStatus, RetrievalDiagnostics},
	diversity::DiversitySelector,
	filter::PostRankFilter,
	model::{FilterMode, RankedChunk, cmp_ranked, sort_ranked},
	rerank::{LexicalReranker, QuerySignals},
	retriever::{SearchPlan, VectorRetriever, prefilter_jurisdiction},
};
use flagstate_config::Config;
use flagstate_domain::{Aspect, Expansion, QueryContext, legal_code, text};
use flagstate_storage::models::Chunk;

/// Request options after defaults are applied and the jurisdiction hint is canonicalized.
#[derive(Debug, Clone)]
pub struct ResolvedRequest {
	pub question: String,
	pub category: Option<String>,
	pub top_k: usize,
	/// Candidates kept per pass before filtering and diversity selection.
	pub fetch_k: u32,
	pub threshold: f32,
	pub rerank: bool,
	pub jurisdiction: Option<String>,
	pub filter_mode: FilterMode,
}

/// One retrieve, score, and filter run for a single derived query.
#[derive(Debug, Clone, PartialEq)]
pub struct PassPlan {
	pub label: String,
	pub query: String,
	pub threshold: f32,
	pub weight: f32,
	/// Legal code whose documents are also looked up by name and merged into this pass.
	pub lookup_code: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PassOutput {
	pub ranked: Vec<RankedChunk>,
	pub trace: CascadeTrace,
	pub candidates: usize,
	pub eliminated: usize,
	pub downranked: usize,
	pub degradations: Vec<String>,
}

enum PassOutcome {
	Completed(PassOutput),
	Failed(Error),
	Cancelled(&'static str),
}

/// Plans and runs the passes of one request and merges what they return.
pub struct MultiPassOrchestrator<'a> {
	cfg: &'a Config,
	providers: &'a Providers,
}
impl<'a> MultiPassOrchestrator<'a> {
	pub fn new(cfg: &'a Config, providers: &'a Providers) -> Self {
		Self { cfg, providers }
	}

	pub fn is_complex(&self, question: &str, context: &QueryContext) -> bool {
		text::word_count(question) > self.cfg.multi_pass.complex_word_threshold as usize
			|| context.cited_codes.len() >= 2
	}

	fn pass_weight(&self, stage: usize) -> f32 {
		let weights = &self.cfg.multi_pass.pass_weights;

		weights.get(stage).or_else(|| weights.last()).copied().unwrap_or(1.0)
	}

	/// Direct query, then the lexically enriched query, then one query per cited code.
	/// `max_passes` caps the number of these stages, not the number of code queries.
	pub fn plan_passes(
		&self,
		request: &ResolvedRequest,
		context: &QueryContext,
		expansion: &Expansion,
	) -> Vec<PassPlan> {
		let stages = self.cfg.multi_pass.max_passes.max(1) as usize;
		let mut passes = vec![PassPlan {
			label: "direct".to_string(),
			query: request.question.clone(),
			threshold: request.threshold,
			weight: self.pass_weight(0),
			lookup_code: None,
		}];

		if stages >= 2 {
			let enriched = expansion.enriched_query();

			if enriched != request.question.trim() {
				passes.push(PassPlan {
					label: "enriched".to_string(),
					query: enriched,
					threshold: request.threshold,
					weight: self.pass_weight(1),
					lookup_code: None,
				});
			}
		}
		if stages >= 3 {
			for code in &context.cited_codes {
				let mut query = legal_code::search_phrase(code);

				if let Some(year) = context.build_year {
					query.push_str(&format!(" {year}"));
				}

				passes.push(PassPlan {
					label: format!("code:{code}"),
					query,
					threshold: request.threshold,
					weight: self.pass_weight(2),
					lookup_code: Some(code.clone()),
				});
			}
		}

		passes
	}

	pub fn plan_aspect_passes(
		&self,
		request: &ResolvedRequest,
		aspects: &[Aspect],
	) -> Vec<PassPlan> {
		let threshold = (request.threshold - self.cfg.multi_pass.aspect_threshold_delta).max(0.0);

		aspects
			.iter()
			.map(|aspect| PassPlan {
				label: format!("aspect:{}", aspect.kind.as_str()),
				query: aspect.query.clone(),
				threshold,
				weight: aspect.weight,
				lookup_code: None,
			})
			.collect()
	}

	/// A single direct pass. Its failure is the caller's failure.
	pub async fn run_single(
		&self,
		request: &ResolvedRequest,
		context: &QueryContext,
		cancel: &CancellationToken,
		deadline: Deadline,
		diagnostics: &mut RetrievalDiagnostics,
	) -> Result<Vec<RankedChunk>> {
		let passes = vec![PassPlan {
			label: "direct".to_string(),
			query: request.question.clone(),
			threshold: request.threshold,
			weight: 1.0,
			lookup_code: None,
		}];
		let outputs = self.run_all(request, context, &passes, cancel, deadline, diagnostics).await?;
		let ranked = outputs.into_iter().flat_map(|(_, output)| output.ranked).collect();

		Ok(self.select(ranked, request.top_k))
	}

	pub async fn run_multi_pass(
		&self,
		request: &ResolvedRequest,
		context: &QueryContext,
		expansion: &Expansion,
		cancel: &CancellationToken,
		deadline: Deadline,
		diagnostics: &mut RetrievalDiagnostics,
	) -> Result<Vec<RankedChunk>> {
		let passes = self.plan_passes(request, context, expansion);

		tracing::info!(
			trace_id = %diagnostics.trace_id,
			passes = passes.len(),
			"Running multi-pass retrieval."
		);

		let outputs = self.run_all(request, context, &passes, cancel, deadline, diagnostics).await?;
		let merged = merge_passes(
			outputs.into_iter().map(|(pass, output)| (pass.weight, output.ranked)).collect(),
		);

		Ok(self.select(merged, request.top_k))
	}

	pub async fn run_multi_aspect(
		&self,
		request: &ResolvedRequest,
		context: &QueryContext,
		aspects: &[Aspect],
		cancel: &CancellationToken,
		deadline: Deadline,
		diagnostics: &mut RetrievalDiagnostics,
	) -> Result<Vec<RankedChunk>> {
		let passes = self.plan_aspect_passes(request, aspects);

		tracing::info!(
			trace_id = %diagnostics.trace_id,
			aspects = passes.len(),
			"Running multi-aspect retrieval."
		);

		let outputs = self.run_all(request, context, &passes, cancel, deadline, diagnostics).await?;
		let lists = outputs
			.into_iter()
			.map(|(pass, output)| apply_weight(output.ranked, pass.weight))
			.collect();
		let cap = self.cfg.multi_pass.per_document_cap.max(1) as usize;
		let mut selected = select_balanced(lists, request.top_k, cap);

		sort_ranked(&mut selected);

		let len = selected.len();

		Ok(self.select(selected, len))
	}

	fn select(&self, mut ranked: Vec<RankedChunk>, top_k: usize) -> Vec<RankedChunk> {
		sort_ranked(&mut ranked);

		DiversitySelector::new(&self.cfg.diversity).select(ranked, top_k)
	}

	/// Runs every pass concurrently and joins them. Each pass races the shared cancellation
	/// token and the deadline, so cancelling stops all in-flight siblings.
	async fn run_all(
		&self,
		request: &ResolvedRequest,
		context: &QueryContext,
		passes: &[PassPlan],
		cancel: &CancellationToken,
		deadline: Deadline,
		diagnostics: &mut RetrievalDiagnostics,
	) -> Result<Vec<(PassPlan, PassOutput)>> {
		let runs = passes.iter().map(|pass| async move {
			tokio::select! {
				biased;
				_ = cancel.cancelled() => PassOutcome::Cancelled("cancelled by caller"),
				_ = deadline.elapsed() => PassOutcome::Cancelled("deadline exceeded"),
				result = self.run_pass(request, context, pass) => match result {
					Ok(output) => PassOutcome::Completed(output),
					Err(err) => PassOutcome::Failed(err),
				},
			}
		});
		let outcomes = futures::future::join_all(runs).await;
		let mut completed = Vec::new();
		let mut first_error = None;
		let mut cancellation = None;

		for (pass, outcome) in passes.iter().zip(outcomes) {
			match outcome {
				PassOutcome::Completed(output) => {
					diagnostics.passes.push(PassStat {
						label: pass.label.clone(),
						weight: pass.weight,
						status: PassStatus::Completed,
						candidates: output.candidates,
					});
					diagnostics.eliminated += output.eliminated;
					diagnostics.downranked += output.downranked;
					diagnostics.cascades.push(output.trace.clone());

					for message in &output.degradations {
						diagnostics.degrade(message.clone());
					}

					completed.push((pass.clone(), output));
				},
				PassOutcome::Failed(err) => {
					tracing::warn!(pass = %pass.label, error = %err, "Retrieval pass failed.");

					diagnostics.passes.push(PassStat {
						label: pass.label.clone(),
						weight: pass.weight,
						status: PassStatus::Failed,
						candidates: 0,
					});

					if first_error.is_none() {
						first_error = Some((pass.label.clone(), err));
					}
				},
				PassOutcome::Cancelled(reason) => {
					diagnostics.passes.push(PassStat {
						label: pass.label.clone(),
						weight: pass.weight,
						status: PassStatus::Cancelled,
						candidates: 0,
					});

					cancellation.get_or_insert(reason);
				},
			}
		}

		if completed.is_empty() {
			if let Some(reason) = cancellation {
				return Err(Error::Cancelled { message: reason.to_string() });
			}
			if let Some((_, err)) = first_error {
				return Err(err);
			}

			return Ok(completed);
		}
		if let Some((label, err)) = first_error {
			diagnostics.degrade(format!("Pass {label} failed: {err}"));
		}
		if let Some(reason) = cancellation {
			diagnostics.degrade(format!("Some passes did not finish: {reason}."));
		}

		Ok(completed)
	}

	async fn run_pass(
		&self,
		request: &ResolvedRequest,
		context: &QueryContext,
		pass: &PassPlan,
	) -> Result<PassOutput> {
		let retriever = VectorRetriever::new(
			self.providers.embedding.as_ref(),
			self.providers.store.as_ref(),
			&self.cfg.retrieval,
		);
		let plan = SearchPlan {
			query: &pass.query,
			category: request.category.as_deref(),
			limit: request.fetch_k,
			threshold: pass.threshold,
			jurisdiction: request.jurisdiction.as_deref(),
		};
		let outcome = retriever.retrieve(&pass.label, &plan).await?;
		let mut chunks = outcome.chunks;
		let mut degradations = Vec::new();

		if let Some(code) = pass.lookup_code.as_deref()
			&& let Some(metadata) = self.providers.metadata.as_ref()
		{
			match metadata.find_by_document_name(code, request.fetch_k).await {
				Ok(rows) => {
					let rows = prefilter_jurisdiction(rows, request.jurisdiction.as_deref());

					merge_lookup_rows(&mut chunks, rows, pass.threshold);
				},
				Err(err) => degradations.push(format!("Document lookup for {code} failed: {err}")),
			}
		}

		let candidates = chunks.len();
		let fetch_k = request.fetch_k as usize;
		let ranked = if request.rerank {
			let signals = QuerySignals::new(&pass.query, context, request.jurisdiction.as_deref());

			LexicalReranker::new(&self.cfg.ranking).rerank(&signals, chunks, fetch_k)
		} else {
			let mut ranked: Vec<RankedChunk> =
				chunks.into_iter().map(RankedChunk::unscored).collect();

			sort_ranked(&mut ranked);
			ranked.truncate(fetch_k);

			ranked
		};
		let filtered = PostRankFilter::new(&self.cfg.filter, request.filter_mode)
			.apply(ranked, request.jurisdiction.as_deref());

		tracing::debug!(
			pass = %pass.label,
			candidates,
			kept = filtered.kept.len(),
			"Retrieval pass finished."
		);

		Ok(PassOutput {
			ranked: filtered.kept,
			trace: outcome.trace,
			candidates,
			eliminated: filtered.eliminated.len(),
			downranked: filtered.downranked.len(),
			degradations,
		})
	}
}

/// Adds name-matched rows that the vector search did not return. They carry no similarity of
/// their own, so they enter at the pass threshold and must earn their rank through boosts.
fn merge_lookup_rows(chunks: &mut Vec<Chunk>, rows: Vec<Chunk>, threshold: f32) {
	let mut seen: HashSet<String> = chunks.iter().map(Chunk::identity).collect();

	for mut row in rows {
		if !seen.insert(row.identity()) {
			continue;
		}

		row.similarity = row.similarity.max(threshold);

		chunks.push(row);
	}
}

fn apply_weight(mut ranked: Vec<RankedChunk>, weight: f32) -> Vec<RankedChunk> {
	for item in &mut ranked {
		item.combined_score *= weight;
		item.pass_weight = weight;
	}

	ranked
}

/// Weights each pass, keeps the best weighted copy of every identity, and sorts. On equal
/// weighted scores the earlier pass wins.
pub fn merge_passes(passes: Vec<(f32, Vec<RankedChunk>)>) -> Vec<RankedChunk> {
	let mut best: HashMap<String, RankedChunk> = HashMap::new();

	for (weight, ranked) in passes {
		for item in apply_weight(ranked, weight) {
			match best.get(&item.identity) {
				Some(existing) if existing.combined_score >= item.combined_score => {},
				_ => {
					best.insert(item.identity.clone(), item);
				},
			}
		}
	}

	let mut merged: Vec<RankedChunk> = best.into_values().collect();

	sort_ranked(&mut merged);

	merged
}

/// Two-round selection across aspect lists. Round one gives every aspect up to
/// `ceil(target / aspects)` slots; round two fills what is left from all lists by score. Both
/// rounds skip duplicates and hold each document to `per_document_cap` chunks.
pub fn select_balanced(
	lists: Vec<Vec<RankedChunk>>,
	target: usize,
	per_document_cap: usize,
) -> Vec<RankedChunk> {
	if lists.is_empty() || target == 0 {
		return Vec::new();
	}

	let per_aspect = target.div_ceil(lists.len());
	let mut state = Selection::new(target, per_document_cap);

	for list in &lists {
		let mut taken = 0;

		for item in list {
			if taken >= per_aspect || state.is_full() {
				break;
			}
			if state.try_take(item) {
				taken += 1;
			}
		}
	}

	let mut rest: Vec<&RankedChunk> = lists.iter().flatten().collect();

	rest.sort_by(|left, right| cmp_ranked(left, right));

	for item in rest {
		if state.is_full() {
			break;
		}

		state.try_take(item);
	}

	state.selected
}

struct Selection {
	target: usize,
	cap: usize,
	selected: Vec<RankedChunk>,
	seen: HashSet<String>,
	per_document: HashMap<String, usize>,
}
impl Selection {
	fn new(target: usize, cap: usize) -> Self {
		Self {
			target,
			cap,
			selected: Vec::with_capacity(target),
			seen: HashSet::new(),
			per_document: HashMap::new(),
		}
	}

	fn is_full(&self) -> bool {
		self.selected.len() >= self.target
	}

	fn try_take(&mut self, item: &RankedChunk) -> bool {
		if self.seen.contains(&item.identity) {
			return false;
		}

		let count = self.per_document.entry(item.document_key().to_string()).or_default();

		if *count >= self.cap {
			return false;
		}

		*count += 1;

		self.seen.insert(item.identity.clone());
		self.selected.push(item.clone());

		true
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn ranked(identity: &str, document_id: &str, score: f32) -> RankedChunk {
		let mut item = RankedChunk::unscored(Chunk {
			chunk_id: Some(identity.to_string()),
			document_id: document_id.to_string(),
			document_name: format!("{document_id} notes"),
			category: "general".to_string(),
			text: "text".to_string(),
			page_number: Some(1),
			chunk_index: 0,
			similarity: 0.7,
			source_url: None,
		});

		item.combined_score = score;

		item
	}

	#[test]
	fn earlier_pass_wins_on_equal_raw_score() {
		let first = (1.0, vec![ranked("a", "d1", 0.8)]);
		let second = (0.85, vec![ranked("b", "d2", 0.8)]);
		let merged = merge_passes(vec![first, second]);

		assert_eq!(merged[0].identity, "a");
		assert_eq!(merged[1].identity, "b");
		assert!((merged[1].combined_score - 0.68).abs() < 1e-6);
		assert_eq!(merged[1].pass_weight, 0.85);
	}

	#[test]
	fn merge_keeps_highest_weighted_copy() {
		let late = (0.7, vec![ranked("a", "d1", 0.9)]);
		let early = (1.0, vec![ranked("a", "d1", 0.8)]);
		let merged = merge_passes(vec![late, early]);

		assert_eq!(merged.len(), 1);
		assert!((merged[0].combined_score - 0.8).abs() < 1e-6);
		assert_eq!(merged[0].pass_weight, 1.0);
	}

	#[test]
	fn balanced_selection_gives_every_aspect_slots() {
		let lists: Vec<Vec<RankedChunk>> = (0..4)
			.map(|aspect| {
				(0..10)
					.map(|idx| {
						let top = if aspect == 0 { 0.99 } else { 0.5 };
						let score = top - idx as f32 * 0.01;

						ranked(
							&format!("a{aspect}-{idx}"),
							&format!("a{aspect}-doc{}", idx / 2),
							score,
						)
					})
					.collect()
			})
			.collect();
		let selected = select_balanced(lists, 15, 2);

		assert_eq!(selected.len(), 15);

		for aspect in 0..4 {
			let prefix = format!("a{aspect}-");
			let count = selected.iter().filter(|item| item.identity.starts_with(&prefix)).count();

			assert!(count >= 2, "aspect {aspect} got {count} slots");
		}

		let mut per_document: HashMap<&str, usize> = HashMap::new();

		for item in &selected {
			*per_document.entry(item.document_key()).or_default() += 1;
		}

		assert!(per_document.values().all(|count| *count <= 2));
	}

	#[test]
	fn duplicates_across_aspects_are_taken_once() {
		let shared = ranked("shared", "d1", 0.9);
		let selected =
			select_balanced(vec![vec![shared.clone()], vec![shared, ranked("x", "d2", 0.5)]], 5, 2);

		assert_eq!(selected.iter().filter(|item| item.identity == "shared").count(), 1);
		assert_eq!(selected.len(), 2);
	}

	#[test]
	fn lookup_rows_enter_at_the_threshold_once() {
		let mut chunks = vec![ranked("a", "d1", 0.0).chunk];
		let mut row = ranked("b", "d2", 0.0).chunk;

		row.similarity = 0.0;

		merge_lookup_rows(&mut chunks, vec![ranked("a", "d1", 0.0).chunk, row], 0.6);

		assert_eq!(chunks.len(), 2);
		assert_eq!(chunks[1].similarity, 0.6);
	}
}
