use std::collections::HashMap;

use qdrant_client::qdrant::{PointId, Value, point_id::PointIdOptions, value::Kind};
use serde::Serialize;

pub const FIELD_CHUNK_ID: &str = "chunk_id";
pub const FIELD_DOCUMENT_ID: &str = "document_id";
pub const FIELD_DOCUMENT_NAME: &str = "document_name";
pub const FIELD_CATEGORY: &str = "category";
pub const FIELD_TEXT: &str = "text";
pub const FIELD_PAGE_NUMBER: &str = "page_number";
pub const FIELD_CHUNK_INDEX: &str = "chunk_index";
pub const FIELD_SOURCE_URL: &str = "source_url";

/// One passage returned by the vector store. Never mutated after construction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Chunk {
	pub chunk_id: Option<String>,
	pub document_id: String,
	pub document_name: String,
	pub category: String,
	pub text: String,
	pub page_number: Option<i32>,
	pub chunk_index: i32,
	pub similarity: f32,
	pub source_url: Option<String>,
}
impl Chunk {
	/// Stable identity used for deduplication: the stored chunk id, else a composite of the
	/// document id, page, and chunk index.
	pub fn identity(&self) -> String {
		match self.chunk_id.as_deref().map(str::trim) {
			Some(id) if !id.is_empty() => id.to_string(),
			_ => {
				let page = self.page_number.map(|page| page.to_string());

				format!(
					"{}:{}:{}",
					self.document_id,
					page.as_deref().unwrap_or("-"),
					self.chunk_index
				)
			},
		}
	}

	/// Document key used for per-document counting. Falls back to the name when the id is empty.
	pub fn document_key(&self) -> &str {
		if self.document_id.is_empty() { &self.document_name } else { &self.document_id }
	}

	/// Builds a chunk from a point payload. Returns `None` when the payload has no text, since
	/// such a row cannot ground anything.
	pub fn from_payload(
		point_id: Option<&PointId>,
		payload: &HashMap<String, Value>,
		similarity: f32,
	) -> Option<Self> {
		let text = payload_string(payload, FIELD_TEXT).filter(|text| !text.trim().is_empty())?;
		let document_name = payload_string(payload, FIELD_DOCUMENT_NAME).unwrap_or_default();
		let document_id = payload_string(payload, FIELD_DOCUMENT_ID)
			.filter(|id| !id.is_empty())
			.unwrap_or_else(|| document_name.clone());
		let chunk_id =
			payload_string(payload, FIELD_CHUNK_ID).or_else(|| point_id.and_then(point_id_string));

		Some(Self {
			chunk_id,
			document_id,
			document_name,
			category: payload_string(payload, FIELD_CATEGORY).unwrap_or_default(),
			text,
			page_number: payload_i32(payload, FIELD_PAGE_NUMBER),
			chunk_index: payload_i32(payload, FIELD_CHUNK_INDEX).unwrap_or(0),
			similarity: if similarity.is_finite() { similarity.clamp(0.0, 1.0) } else { 0.0 },
			source_url: payload_string(payload, FIELD_SOURCE_URL),
		})
	}
}

pub fn payload_string(payload: &HashMap<String, Value>, key: &str) -> Option<String> {
	let value = payload.get(key)?;

	match &value.kind {
		Some(Kind::StringValue(text)) => Some(text.to_string()),
		Some(Kind::IntegerValue(value)) => Some(value.to_string()),
		_ => None,
	}
}

pub fn payload_i32(payload: &HashMap<String, Value>, key: &str) -> Option<i32> {
	let value = payload.get(key)?;

	match &value.kind {
		Some(Kind::IntegerValue(value)) => i32::try_from(*value).ok(),
		Some(Kind::DoubleValue(value)) =>
			if value.fract() == 0.0 {
				i32::try_from(*value as i64).ok()
			} else {
				None
			},
		Some(Kind::StringValue(text)) => text.trim().parse().ok(),
		_ => None,
	}
}

fn point_id_string(point_id: &PointId) -> Option<String> {
	match point_id.point_id_options.as_ref()? {
		PointIdOptions::Num(num) => Some(num.to_string()),
		PointIdOptions::Uuid(uuid) => Some(uuid.clone()),
	}
}
