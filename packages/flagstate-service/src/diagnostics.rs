use serde::Serialize;
use uuid::Uuid;

use flagstate_domain::QueryContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
	Single,
	MultiPass,
	MultiAspect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CascadeStage {
	Primary,
	Relaxed,
	Keyword,
	LastResort,
	DominanceWidening,
}

/// One search issued by the fallback cascade.
#[derive(Debug, Clone, Serialize)]
pub struct CascadeStep {
	pub stage: CascadeStage,
	pub threshold: f32,
	pub category_filter: bool,
	pub jurisdiction_filter: bool,
	pub rows: usize,
	pub prefiltered: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct CascadeTrace {
	pub label: String,
	pub steps: Vec<CascadeStep>,
	pub dominance_widened: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PassStatus {
	Completed,
	Failed,
	Cancelled,
}

#[derive(Debug, Clone, Serialize)]
pub struct PassStat {
	pub label: String,
	pub weight: f32,
	pub status: PassStatus,
	pub candidates: usize,
}

/// Observability only. Nothing downstream branches on these values.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievalDiagnostics {
	pub trace_id: Uuid,
	pub strategy: Strategy,
	pub context: QueryContext,
	pub cascades: Vec<CascadeTrace>,
	pub eliminated: usize,
	pub downranked: usize,
	pub passes: Vec<PassStat>,
	pub degradations: Vec<String>,
}
impl RetrievalDiagnostics {
	pub fn new(strategy: Strategy, context: QueryContext) -> Self {
		Self {
			trace_id: Uuid::new_v4(),
			strategy,
			context,
			cascades: Vec::new(),
			eliminated: 0,
			downranked: 0,
			passes: Vec::new(),
			degradations: Vec::new(),
		}
	}

	pub fn degrade(&mut self, message: impl Into<String>) {
		let message = message.into();

		tracing::warn!(trace_id = %self.trace_id, degradation = %message, "Retrieval degraded.");

		self.degradations.push(message);
	}
}
