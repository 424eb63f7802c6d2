use std::sync::LazyLock;

use regex::Regex;

// Ordered: more specific names precede names they contain ("British Virgin Islands" before
// "United Kingdom"), because detection returns the first entry that matches.
const TAXONOMY: &[(&str, &[&str])] = &[
	("British Virgin Islands", &["british virgin islands", "bvi"]),
	("Cayman Islands", &["cayman islands", "cayman", "caymanian", "cisr"]),
	("Marshall Islands", &["marshall islands", "rmi", "marshallese"]),
	("Cook Islands", &["cook islands"]),
	("Isle of Man", &["isle of man", "manx"]),
	("Saint Vincent and the Grenadines", &["saint vincent", "st vincent", "grenadines"]),
	("Antigua and Barbuda", &["antigua", "barbuda"]),
	("New Zealand", &["new zealand"]),
	("Hong Kong", &["hong kong"]),
	("Malta", &["malta", "maltese", "transport malta", "valletta"]),
	("United Kingdom", &["united kingdom", "uk", "great britain", "british", "mca"]),
	("Gibraltar", &["gibraltar"]),
	("Jersey", &["jersey"]),
	("Guernsey", &["guernsey"]),
	("Bermuda", &["bermuda"]),
	("France", &["france", "french"]),
	("Monaco", &["monaco", "monegasque"]),
	("Italy", &["italy", "italian"]),
	("Spain", &["spain", "spanish"]),
	("Portugal", &["portugal", "portuguese", "madeira"]),
	("Greece", &["greece", "greek", "hellenic"]),
	("Croatia", &["croatia", "croatian"]),
	("Montenegro", &["montenegro", "montenegrin"]),
	("Cyprus", &["cyprus", "cypriot"]),
	("Netherlands", &["netherlands", "dutch", "holland"]),
	("Belgium", &["belgium", "belgian"]),
	("Germany", &["germany", "german"]),
	("Luxembourg", &["luxembourg"]),
	("Norway", &["norway", "norwegian"]),
	("Denmark", &["denmark", "danish"]),
	("Sweden", &["sweden", "swedish"]),
	("Turkey", &["turkey", "turkish", "turkiye"]),
	("Panama", &["panama", "panamanian"]),
	("Liberia", &["liberia", "liberian"]),
	("Bahamas", &["bahamas", "bahamian"]),
	("Belize", &["belize"]),
	("Jamaica", &["jamaica", "jamaican"]),
	("Singapore", &["singapore"]),
	("Australia", &["australia", "australian"]),
	("United States", &["united states", "usa", "american", "uscg"]),
];

static PATTERNS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
	TAXONOMY
		.iter()
		.filter_map(|(canonical, aliases)| {
			alias_pattern(aliases).map(|pattern| (*canonical, pattern))
		})
		.collect()
});

/// Compiles a case-insensitive, word-bounded alternation over the aliases. Spaces inside an
/// alias accept an optional period and then any run of whitespace, hyphens, or underscores.
pub fn alias_pattern(aliases: &[&str]) -> Option<Regex> {
	let alternatives: Vec<String> = aliases
		.iter()
		.map(|alias| {
			alias
				.split_whitespace()
				.map(regex::escape)
				.collect::<Vec<_>>()
				.join(r"\.?[\s\-_]+")
		})
		.collect();

	if alternatives.is_empty() {
		return None;
	}

	Regex::new(&format!(r"(?i)\b(?:{})\b", alternatives.join("|"))).ok()
}

/// First taxonomy entry whose pattern matches anywhere in `text`.
pub fn detect(text: &str) -> Option<&'static str> {
	PATTERNS.iter().find(|(_, pattern)| pattern.is_match(text)).map(|(canonical, _)| *canonical)
}

/// Every distinct jurisdiction in `text`, ordered by the position of its first mention.
///
/// Entries are scanned in taxonomy order and each claims the text it matched, so a broader
/// alias inside an already claimed name ("british" in "British Virgin Islands") is ignored.
pub fn find_all(text: &str) -> Vec<(usize, &'static str)> {
	let mut claimed: Vec<(usize, usize)> = Vec::new();
	let mut out: Vec<(usize, &'static str)> = Vec::new();

	for (canonical, pattern) in PATTERNS.iter() {
		let first_free = pattern.find_iter(text).find(|found| {
			!claimed.iter().any(|(start, end)| found.start() < *end && *start < found.end())
		});
		let Some(found) = first_free else { continue };

		for other in pattern.find_iter(text) {
			claimed.push((other.start(), other.end()));
		}

		out.push((found.start(), *canonical));
	}

	out.sort_by(|left, right| left.0.cmp(&right.0).then_with(|| left.1.cmp(right.1)));

	out
}

/// Jurisdiction attached to stored content: the category tag first, then the document name.
pub fn detect_for_document(category: &str, document_name: &str) -> Option<&'static str> {
	detect(&category.replace(['_', '/'], " ")).or_else(|| detect(document_name))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JurisdictionMatch {
	Match,
	Mismatch,
	Unknown,
}

pub fn compare(candidate: Option<&str>, target: Option<&str>) -> JurisdictionMatch {
	match (candidate, target) {
		(Some(candidate), Some(target)) if candidate == target => JurisdictionMatch::Match,
		(Some(_), Some(_)) => JurisdictionMatch::Mismatch,
		_ => JurisdictionMatch::Unknown,
	}
}
