use std::collections::HashSet;

use unicode_segmentation::UnicodeSegmentation;

const STOP_WORDS: &[&str] = &[
	"a", "about", "after", "all", "also", "am", "an", "and", "any", "are", "as", "at", "be",
	"been", "before", "being", "between", "both", "but", "by", "can", "could", "do", "does",
	"doing", "during", "each", "for", "from", "had", "has", "have", "having", "he", "her",
	"here", "his", "how", "i", "if", "in", "into", "is", "it", "its", "just", "me", "might",
	"more", "most", "must", "my", "need", "no", "nor", "not", "now", "of", "on", "once", "only",
	"or", "other", "our", "out", "over", "own", "please", "same", "shall", "she", "should", "so",
	"some", "such", "than", "that", "the", "their", "them", "then", "there", "these", "they",
	"this", "those", "through", "to", "too", "under", "until", "up", "very", "was", "we", "were",
	"what", "when", "where", "which", "while", "who", "whom", "why", "will", "with", "would",
	"you", "your",
];

// Each group is a set of interchangeable terms; lookups are bidirectional within a group.
const SYNONYM_GROUPS: &[&[&str]] = &[
	&["registration", "registry", "register", "flagging"],
	&["flag", "ensign"],
	&["vat", "value added tax"],
	&["import", "importation", "temporary admission"],
	&["export", "exportation"],
	&["crew", "seafarer", "seafarers", "manning"],
	&["charter", "chartering", "commercial use"],
	&["survey", "inspection"],
	&["tonnage", "gross tonnage"],
	&["tax", "taxation", "duty"],
	&["deregistration", "deletion", "closure of registry"],
	&["owner", "ownership"],
	&["yacht", "vessel", "superyacht"],
	&["certificate", "certification"],
	&["requirements", "obligations"],
];

pub fn is_stop_word(token: &str) -> bool {
	STOP_WORDS.binary_search(&token).is_ok()
}

/// Lowercased word tokens of at least two characters, in text order, duplicates kept.
pub fn tokenize(text: &str) -> Vec<String> {
	let mut out = Vec::new();

	for word in text.unicode_words() {
		let token = word.to_lowercase();

		if token.chars().count() < 2 {
			continue;
		}

		out.push(token);
	}

	out
}

/// Distinct non-stop-word tokens in first-seen order.
pub fn keywords(text: &str) -> Vec<String> {
	let mut out = Vec::new();
	let mut seen = HashSet::new();

	for token in tokenize(text) {
		if is_stop_word(token.as_str()) {
			continue;
		}
		if seen.insert(token.clone()) {
			out.push(token);
		}
	}

	out
}

pub fn keyword_query(text: &str) -> String {
	keywords(text).join(" ")
}

/// Tokens re-joined with single spaces and padded, so phrase lookups can match on word
/// boundaries with a plain `contains(" phrase ")`.
pub fn normalized_phrase_text(text: &str) -> String {
	let tokens = tokenize(text);
	let mut out = String::with_capacity(text.len() + 2);

	out.push(' ');

	for token in tokens {
		out.push_str(token.as_str());
		out.push(' ');
	}

	out
}

pub fn contains_phrase(normalized: &str, phrase: &str) -> bool {
	let needle = normalized_phrase_text(phrase);

	if needle.trim().is_empty() {
		return false;
	}

	normalized.contains(needle.as_str())
}

pub fn synonyms(term: &str) -> Vec<&'static str> {
	let mut out = Vec::new();

	for group in SYNONYM_GROUPS {
		if !group.contains(&term) {
			continue;
		}

		for candidate in group.iter() {
			if *candidate != term && !out.contains(candidate) {
				out.push(*candidate);
			}
		}
	}

	out
}

pub fn word_count(text: &str) -> usize {
	text.unicode_words().count()
}
