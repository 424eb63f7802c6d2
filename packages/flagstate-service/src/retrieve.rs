use std::time::Duration;

use crate::{
	Error, RetrievalService, Result,
	cancel::{CancellationToken, Deadline},
	diagnostics::{RetrievalDiagnostics, Strategy},
	model::{FilterMode, RetrievalRequest, RetrievalResult},
	orchestrator::{MultiPassOrchestrator, ResolvedRequest},
};
use flagstate_domain::{Expansion, jurisdiction};

impl RetrievalService {
	/// Runs one retrieval with no caller-side cancellation. The configured timeout still
	/// applies.
	pub async fn retrieve(&self, req: RetrievalRequest) -> Result<RetrievalResult> {
		self.retrieve_with_cancel(req, &CancellationToken::new()).await
	}

	pub async fn retrieve_with_cancel(
		&self,
		req: RetrievalRequest,
		cancel: &CancellationToken,
	) -> Result<RetrievalResult> {
		let request = self.resolve(req)?;
		let context = self.extractor().extract(&request.question);
		let expansion = self.expander().expand(&request.question);
		let orchestrator = MultiPassOrchestrator::new(&self.cfg, &self.providers);
		let strategy = if expansion.is_multi_aspect() {
			Strategy::MultiAspect
		} else if orchestrator.is_complex(&request.question, &context) {
			Strategy::MultiPass
		} else {
			Strategy::Single
		};
		let mut diagnostics = RetrievalDiagnostics::new(strategy, context.clone());
		let deadline = Deadline::after(self.cfg.retrieval.timeout_ms.map(Duration::from_millis));

		tracing::info!(
			trace_id = %diagnostics.trace_id,
			strategy = ?strategy,
			top_k = request.top_k,
			jurisdiction = request.jurisdiction.as_deref().unwrap_or(""),
			"Retrieval started."
		);

		let chunks = match &expansion {
			Expansion::MultiAspect { aspects, .. } =>
				orchestrator
					.run_multi_aspect(
						&request,
						&context,
						aspects,
						cancel,
						deadline,
						&mut diagnostics,
					)
					.await?,
			Expansion::Lexical { .. } if strategy == Strategy::MultiPass =>
				orchestrator
					.run_multi_pass(
						&request,
						&context,
						&expansion,
						cancel,
						deadline,
						&mut diagnostics,
					)
					.await?,
			Expansion::Lexical { .. } =>
				orchestrator
					.run_single(&request, &context, cancel, deadline, &mut diagnostics)
					.await?,
		};

		tracing::info!(
			trace_id = %diagnostics.trace_id,
			returned = chunks.len(),
			eliminated = diagnostics.eliminated,
			downranked = diagnostics.downranked,
			degradations = diagnostics.degradations.len(),
			"Retrieval finished."
		);

		Ok(RetrievalResult { chunks, diagnostics })
	}

	fn resolve(&self, req: RetrievalRequest) -> Result<ResolvedRequest> {
		let defaults = &self.cfg.retrieval;
		let question = req.question.trim().to_string();

		if question.is_empty() {
			return Err(Error::InvalidRequest {
				message: "question must be non-empty.".to_string(),
			});
		}

		let top_k = req.top_k.unwrap_or(defaults.top_k);

		if top_k == 0 {
			return Err(Error::InvalidRequest {
				message: "top_k must be greater than zero.".to_string(),
			});
		}

		let threshold = req.threshold.unwrap_or(defaults.threshold);

		if !threshold.is_finite() || !(0.0..=1.0).contains(&threshold) {
			return Err(Error::InvalidRequest {
				message: "threshold must be in the range 0.0-1.0.".to_string(),
			});
		}

		let rerank = req.rerank.unwrap_or(defaults.rerank);
		let fetch_k =
			if rerank { top_k.saturating_mul(defaults.over_fetch_factor.max(1)) } else { top_k };
		let filter_mode = match req.filter_mode {
			Some(mode) => mode,
			None => FilterMode::parse(&defaults.filter_mode).ok_or_else(|| {
				Error::InvalidRequest {
					message: format!("Unknown filter mode {:?}.", defaults.filter_mode),
				}
			})?,
		};
		let category = req
			.category
			.map(|category| category.trim().to_string())
			.filter(|category| !category.is_empty());

		Ok(ResolvedRequest {
			question,
			category,
			top_k: top_k as usize,
			fetch_k,
			threshold,
			rerank,
			jurisdiction: req.jurisdiction_hint.as_deref().and_then(canonical_jurisdiction),
			filter_mode,
		})
	}
}

/// Maps a caller hint onto the taxonomy name, keeping unknown hints verbatim.
pub fn canonical_jurisdiction(hint: &str) -> Option<String> {
	let hint = hint.trim();

	if hint.is_empty() {
		return None;
	}

	Some(jurisdiction::detect(hint).map(str::to_string).unwrap_or_else(|| hint.to_string()))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn hints_are_canonicalized() {
		assert_eq!(canonical_jurisdiction(" maltese "), Some("Malta".to_string()));
		assert_eq!(canonical_jurisdiction("Atlantis"), Some("Atlantis".to_string()));
		assert_eq!(canonical_jurisdiction("  "), None);
	}
}
