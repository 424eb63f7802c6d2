use std::collections::HashSet;

use flagstate_storage::models::Chunk;

use crate::model::RankedChunk;

const BLOCK_SEPARATOR: &str = "\n\n";

/// `[Document: name (category), Page p]` followed by the chunk text on the next line.
pub fn format_chunk(chunk: &Chunk) -> String {
	let page = chunk.page_number.map(|page| page.to_string());

	format!(
		"[Document: {} ({}), Page {}]\n{}",
		chunk.document_name,
		chunk.category,
		page.as_deref().unwrap_or("N/A"),
		chunk.text
	)
}

/// Renders an ordered chunk list as attributed blocks for the generation stage. Pure: the same
/// list always yields the same text.
pub fn format_context(chunks: &[RankedChunk]) -> String {
	let blocks: Vec<String> = chunks.iter().map(|ranked| format_chunk(&ranked.chunk)).collect();

	blocks.join(BLOCK_SEPARATOR)
}

/// Distinct source document ids in first-seen order.
pub fn unique_document_ids(chunks: &[RankedChunk]) -> Vec<String> {
	let mut seen = HashSet::new();

	chunks
		.iter()
		.map(|ranked| ranked.chunk.document_id.as_str())
		.filter(|id| seen.insert(*id))
		.map(str::to_string)
		.collect()
}
