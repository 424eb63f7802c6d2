use std::{collections::BTreeSet, sync::LazyLock};

use regex::Regex;

use crate::jurisdiction::alias_pattern;

const ALIASES: &[(&str, &[&str])] = &[
	("MLC", &["mlc", "mlc 2006", "maritime labour convention", "maritime labor convention"]),
	("SOLAS", &["solas", "safety of life at sea"]),
	("MARPOL", &["marpol"]),
	("COLREG", &["colreg", "colregs", "collision regulations"]),
	("LY3", &["ly3", "large yacht code"]),
	("REG-YC", &["reg yc", "red ensign group yacht code", "reg yacht code"]),
	("PYC", &["pyc", "passenger yacht code"]),
	("ISM", &["ism", "ism code", "international safety management"]),
	("ISPS", &["isps", "isps code"]),
	("STCW", &["stcw"]),
	("LL66", &["ll66", "load line", "load lines", "load line convention"]),
	("ITC69", &["itc69", "itc 69", "tonnage convention"]),
	("VAT-DIRECTIVE", &["vat directive", "directive 2006/112"]),
	("UNCLOS", &["unclos", "law of the sea"]),
	("BWM", &["bwm", "bwm convention", "ballast water management"]),
];

static PATTERNS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
	ALIASES
		.iter()
		.filter_map(|(canonical, aliases)| {
			alias_pattern(aliases).map(|pattern| (*canonical, pattern))
		})
		.collect()
});

/// Canonical identifiers of every legal instrument mentioned in `text`.
pub fn detect_codes(text: &str) -> BTreeSet<String> {
	PATTERNS
		.iter()
		.filter(|(_, pattern)| pattern.is_match(text))
		.map(|(canonical, _)| canonical.to_string())
		.collect()
}

/// Whether `text` literally names the instrument `code` through any of its aliases.
pub fn mentions_code(text: &str, code: &str) -> bool {
	PATTERNS
		.iter()
		.find(|(canonical, _)| *canonical == code)
		.map(|(_, pattern)| pattern.is_match(text))
		.unwrap_or_else(|| text.to_lowercase().contains(code.to_lowercase().as_str()))
}

/// `code` followed by its longest alias, used as the search phrase for it.
pub fn search_phrase(code: &str) -> String {
	ALIASES
		.iter()
		.find(|(canonical, _)| *canonical == code)
		.and_then(|(_, aliases)| aliases.iter().max_by_key(|alias| alias.len()))
		.map(|alias| format!("{code} {alias}"))
		.unwrap_or_else(|| code.to_string())
}
