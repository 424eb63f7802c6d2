use std::collections::BTreeSet;

use serde::Serialize;

use crate::{jurisdiction, text};

pub const MAX_VARIANTS: usize = 5;
pub const MAX_ASPECTS: usize = 4;

const DIRECT_ASPECT_WEIGHT: f32 = 1.0;
const INFERRED_ASPECT_WEIGHT: f32 = 0.85;

const EXIT_CUES: &[&str] = &[
	"leave", "leaving", "exit", "exiting", "deregister", "deregistering", "deregistration",
	"deletion", "delete", "reflag", "reflagging", "move", "moving", "relocate", "relocating",
	"transfer", "transferring", "out of",
];
const ENTRY_CUES: &[&str] = &[
	"register", "registering", "registration", "flag in", "import", "importing", "importation",
	"enter", "entering", "entry", "bring into", "bringing into",
];
const TECHNICAL_CUES: &[&str] = &[
	"survey", "inspection", "certificate", "certificates", "certification", "safety",
	"compliance", "technical", "manning", "load line", "tonnage measurement",
];
const FISCAL_CUES: &[&str] = &[
	"vat", "tax", "taxes", "taxation", "import duty", "customs", "fiscal", "levy",
	"temporary admission",
];
const VESSEL_CUES: &[&str] =
	&["yacht", "superyacht", "vessel", "ship", "boat", "motor yacht", "sailing yacht"];
const SOURCE_MARKERS: &[&str] = &["from"];
const TARGET_MARKERS: &[&str] = &["to", "into", "in", "under"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AspectKind {
	Exit,
	Entry,
	TechnicalCompliance,
	Fiscal,
}
impl AspectKind {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Exit => "exit",
			Self::Entry => "entry",
			Self::TechnicalCompliance => "technical_compliance",
			Self::Fiscal => "fiscal",
		}
	}
}

/// One independently searchable legal sub-topic of a question.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Aspect {
	pub kind: AspectKind,
	pub name: String,
	pub keywords: BTreeSet<String>,
	pub weight: f32,
	pub query: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Expansion {
	Lexical { original: String, variants: Vec<String>, keywords: Vec<String> },
	MultiAspect { original: String, aspects: Vec<Aspect> },
}
impl Expansion {
	pub fn original(&self) -> &str {
		match self {
			Self::Lexical { original, .. } | Self::MultiAspect { original, .. } => original,
		}
	}

	pub fn is_multi_aspect(&self) -> bool {
		matches!(self, Self::MultiAspect { .. })
	}

	/// The original question followed by expansion terms it does not already contain.
	pub fn enriched_query(&self) -> String {
		let (original, extra): (&str, Vec<String>) = match self {
			Self::Lexical { original, keywords, .. } => {
				let extra = keywords
					.iter()
					.flat_map(|keyword| text::synonyms(keyword).into_iter().take(1))
					.map(str::to_string)
					.collect();

				(original, extra)
			},
			Self::MultiAspect { original, aspects } => {
				let extra =
					aspects.iter().flat_map(|aspect| aspect.keywords.iter().cloned()).collect();

				(original, extra)
			},
		};
		let normalized = text::normalized_phrase_text(original);
		let mut out = original.trim().to_string();
		let mut seen = BTreeSet::new();

		for term in extra {
			if text::contains_phrase(&normalized, &term) || !seen.insert(term.clone()) {
				continue;
			}

			out.push(' ');
			out.push_str(term.as_str());
		}

		out
	}
}

#[derive(Debug, Clone, Copy)]
pub struct QueryExpander {
	max_variants: usize,
}
impl QueryExpander {
	pub fn new(max_variants: usize) -> Self {
		Self { max_variants: max_variants.min(MAX_VARIANTS) }
	}

	pub fn expand(&self, question: &str) -> Expansion {
		let original = question.trim().to_string();

		if let Some(aspects) = detect_aspects(&original) {
			return Expansion::MultiAspect { original, aspects };
		}

		let variants = lexical_variants(&original, self.max_variants);
		let keywords = text::keywords(&original);

		Expansion::Lexical { original, variants, keywords }
	}
}
impl Default for QueryExpander {
	fn default() -> Self {
		Self::new(MAX_VARIANTS)
	}
}

struct Endpoints {
	source: Option<&'static str>,
	target: Option<&'static str>,
}

/// Exit and entry are the independently triggered aspects and both must fire. Technical
/// and fiscal aspects ride along on movement between flags, at full weight when the question
/// names them and at the inferred weight when only a vessel is mentioned.
fn detect_aspects(question: &str) -> Option<Vec<Aspect>> {
	let normalized = text::normalized_phrase_text(question);
	let endpoints = endpoints(question);
	let has = |cues: &[&str]| cues.iter().any(|cue| text::contains_phrase(&normalized, cue));
	let exit = endpoints.source.filter(|_| has(EXIT_CUES));
	let entry = endpoints.target.filter(|_| has(ENTRY_CUES));
	let (Some(source), Some(target)) = (exit, entry) else { return None };
	let vessel = has(VESSEL_CUES);
	let technical = has(TECHNICAL_CUES);
	let fiscal = has(FISCAL_CUES);
	let mut aspects = Vec::with_capacity(MAX_ASPECTS);

	aspects.push(exit_aspect(source));
	aspects.push(entry_aspect(target));

	if technical || vessel {
		let weight = if technical { DIRECT_ASPECT_WEIGHT } else { INFERRED_ASPECT_WEIGHT };

		aspects.push(technical_aspect(target, weight));
	}
	if fiscal || vessel {
		let weight = if fiscal { DIRECT_ASPECT_WEIGHT } else { INFERRED_ASPECT_WEIGHT };

		aspects.push(fiscal_aspect(target, weight));
	}

	aspects.truncate(MAX_ASPECTS);

	Some(aspects)
}

fn endpoints(question: &str) -> Endpoints {
	let found = jurisdiction::find_all(question);
	let preceded_by = |position: usize, markers: &[&str]| {
		let before = text::tokenize(&question[..position]);

		before.iter().rev().take(2).any(|token| markers.contains(&token.as_str()))
	};
	let explicit_source =
		found.iter().find(|(position, _)| preceded_by(*position, SOURCE_MARKERS)).map(|(_, n)| *n);
	let explicit_target = found
		.iter()
		.filter(|(_, name)| Some(*name) != explicit_source)
		.find(|(position, _)| preceded_by(*position, TARGET_MARKERS))
		.map(|(_, name)| *name);
	let names = || found.iter().map(|(_, name)| *name);
	let source = explicit_source.or_else(|| names().find(|name| Some(*name) != explicit_target));
	let target = explicit_target.or_else(|| names().rev().find(|name| Some(*name) != source));

	Endpoints { source, target }
}

fn exit_aspect(source: &str) -> Aspect {
	build_aspect(
		AspectKind::Exit,
		format!("exit from {source}"),
		&["deregistration", "deletion", "closure of registry"],
		DIRECT_ASPECT_WEIGHT,
		format!(
			"{source} deregistration deletion from the registry closure of registry \
			 transfer of flag requirements"
		),
	)
}

fn entry_aspect(target: &str) -> Aspect {
	build_aspect(
		AspectKind::Entry,
		format!("entry into {target}"),
		&["registration", "registry", "flag"],
		DIRECT_ASPECT_WEIGHT,
		format!("{target} registration requirements flag registry documents eligibility"),
	)
}

fn technical_aspect(focus: &str, weight: f32) -> Aspect {
	build_aspect(
		AspectKind::TechnicalCompliance,
		format!("technical compliance {focus}").trim().to_string(),
		&["survey", "certificate", "safety"],
		weight,
		format!("{focus} technical compliance survey inspection safety certificates manning")
			.trim()
			.to_string(),
	)
}

fn fiscal_aspect(focus: &str, weight: f32) -> Aspect {
	build_aspect(
		AspectKind::Fiscal,
		format!("fiscal {focus}").trim().to_string(),
		&["vat", "tax", "duty"],
		weight,
		format!("{focus} VAT import duty taxation temporary admission customs").trim().to_string(),
	)
}

fn build_aspect(
	kind: AspectKind,
	name: String,
	base_keywords: &[&str],
	weight: f32,
	query: String,
) -> Aspect {
	let mut keywords: BTreeSet<String> = base_keywords.iter().map(|k| k.to_string()).collect();

	keywords.extend(text::keywords(&name));

	Aspect { kind, name, keywords, weight, query }
}

fn lexical_variants(question: &str, limit: usize) -> Vec<String> {
	let tokens = text::tokenize(question);
	let base = tokens.join(" ");
	let mut out = Vec::new();

	'outer: for (idx, token) in tokens.iter().enumerate() {
		if text::is_stop_word(token) {
			continue;
		}

		for synonym in text::synonyms(token) {
			if out.len() >= limit {
				break 'outer;
			}

			let mut replaced = tokens.clone();

			replaced[idx] = synonym.to_string();

			let variant = replaced.join(" ");

			if variant != base && !out.contains(&variant) {
				out.push(variant);
			}
		}
	}

	out
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn simple_question_expands_lexically() {
		let expansion = QueryExpander::default().expand("What is the VAT rate for yacht charter?");
		let Expansion::Lexical { variants, keywords, .. } = &expansion else {
			panic!("Expected a lexical expansion.");
		};

		assert!(!variants.is_empty());
		assert!(variants.len() <= MAX_VARIANTS);
		assert!(variants.iter().any(|variant| variant.contains("value added tax")));
		assert!(keywords.contains(&"vat".to_string()));
	}

	#[test]
	fn single_aspect_does_not_decompose() {
		let expansion = QueryExpander::default().expand("How do I register a yacht in Malta?");

		assert!(!expansion.is_multi_aspect());
	}

	#[test]
	fn topic_cues_without_movement_do_not_decompose() {
		let expander = QueryExpander::default();

		assert!(
			!expander
				.expand("What safety duty does the owner of a yacht in Malta have?")
				.is_multi_aspect()
		);
		assert!(
			!expander
				.expand("Survey certificates and VAT position for a Malta yacht")
				.is_multi_aspect()
		);
	}

	#[test]
	fn movement_between_flags_decomposes_into_aspects() {
		let expansion = QueryExpander::default()
			.expand("Moving my yacht from the Cayman Islands to register in Malta");
		let Expansion::MultiAspect { aspects, .. } = &expansion else {
			panic!("Expected a multi-aspect expansion.");
		};
		let kinds: Vec<_> = aspects.iter().map(|aspect| aspect.kind).collect();

		assert_eq!(kinds, vec![
			AspectKind::Exit,
			AspectKind::Entry,
			AspectKind::TechnicalCompliance,
			AspectKind::Fiscal
		]);
		assert_eq!(aspects[0].name, "exit from Cayman Islands");
		assert_eq!(aspects[1].name, "entry into Malta");
		assert!(aspects[2].query.starts_with("Malta"));
		assert_eq!(aspects[3].weight, INFERRED_ASPECT_WEIGHT);
	}

	#[test]
	fn enriched_query_appends_missing_terms_once() {
		let expansion = QueryExpander::default().expand("crew rules for charter");
		let enriched = expansion.enriched_query();

		assert!(enriched.starts_with("crew rules for charter"));
		assert!(enriched.contains("seafarer"));
		assert!(enriched.contains("chartering"));
		assert_eq!(enriched, expansion.enriched_query());
	}

	#[test]
	fn variants_are_capped() {
		let variants = lexical_variants("yacht registration crew tax charter survey", 3);

		assert_eq!(variants.len(), 3);
	}
}
