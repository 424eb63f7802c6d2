use serde::Serialize;

use crate::{legal_code, text};

const PRIMARY_CUES: &[&str] = &[
	"act", "code", "convention", "decree", "directive", "law", "ordinance", "regulation",
	"regulations", "statute", "statutory instrument",
];
const REGISTRY_CUES: &[&str] = &[
	"circular", "flag state", "guidance notice", "information notice", "marine notice",
	"merchant shipping notice", "msn", "registry", "registration guide", "ship registry",
];
const AUTHORITATIVE_CUES: &[&str] = &[
	"class society", "classification society", "commentary", "explanatory", "handbook",
	"iacs", "imo guidance", "practice note",
];

/// Authority tier of a source document, highest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
	PrimaryLegalCode,
	NationalRegistryGuidance,
	AuthoritativeCommentary,
	GenericCommentary,
}
impl DocumentType {
	pub fn classify(document_name: &str, category: &str) -> Self {
		let combined = format!("{document_name} {category}");
		let normalized = text::normalized_phrase_text(&combined);

		// Registry guidance often cites a code in its title, so it is checked first.
		if has_any(&normalized, REGISTRY_CUES) {
			return Self::NationalRegistryGuidance;
		}
		if has_any(&normalized, PRIMARY_CUES) || !legal_code::detect_codes(&combined).is_empty() {
			return Self::PrimaryLegalCode;
		}
		if has_any(&normalized, AUTHORITATIVE_CUES) {
			return Self::AuthoritativeCommentary;
		}

		Self::GenericCommentary
	}
}

fn has_any(normalized: &str, cues: &[&str]) -> bool {
	cues.iter().any(|cue| text::contains_phrase(normalized, cue))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn classifies_by_authority_cues() {
		assert_eq!(
			DocumentType::classify("Merchant Shipping Act 1973", "malta"),
			DocumentType::PrimaryLegalCode
		);
		assert_eq!(
			DocumentType::classify("Ship Registry Guidance for Owners", "cayman-islands"),
			DocumentType::NationalRegistryGuidance
		);
		assert_eq!(
			DocumentType::classify("P&I Club Handbook", "general"),
			DocumentType::AuthoritativeCommentary
		);
		assert_eq!(
			DocumentType::classify("Yachting blog post", "general"),
			DocumentType::GenericCommentary
		);
	}

	#[test]
	fn cited_instrument_names_count_as_primary() {
		assert_eq!(
			DocumentType::classify("SOLAS consolidated", ""),
			DocumentType::PrimaryLegalCode
		);
	}
}
