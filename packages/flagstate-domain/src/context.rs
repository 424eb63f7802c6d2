use std::{collections::BTreeSet, sync::LazyLock};

use regex::{Captures, Regex};
use serde::Serialize;
use time::OffsetDateTime;

use crate::{jurisdiction, legal_code, text};

pub const TAG_LARGE_VESSEL: &str = "large vessel";
pub const TAG_HEIGHTENED_REGIME: &str = "heightened-regime applicable";
pub const TAG_ENHANCED_INSPECTION: &str = "enhanced inspection";
pub const TAG_AGE_SCRUTINY: &str = "age-related scrutiny";

pub const MIN_SIZE_METERS: f32 = 24.0;
pub const MAX_SIZE_METERS: f32 = 200.0;
pub const MIN_BUILD_YEAR: i32 = 1950;

const FEET_TO_METERS: f32 = 0.3048;
const LARGE_VESSEL_METERS: f32 = 24.0;
const HEIGHTENED_REGIME_METERS: f32 = 50.0;
const HEIGHTENED_REGIME_TONNAGE: u32 = 500;
const ENHANCED_INSPECTION_AGE: u32 = 15;
const AGE_SCRUTINY_AGE: u32 = 25;
const MAX_AGE_YEARS: u32 = 150;

const TAG_CUES: &[(&str, &[&str])] = &[
	(TAG_LARGE_VESSEL, &["large yacht", "24 metres", "24 meters", "24m", "load line", "ly3"]),
	(TAG_HEIGHTENED_REGIME, &["500 gt", "500 gross", "solas", "ism", "mlc", "isps", "50 metres"]),
	(TAG_ENHANCED_INSPECTION, &["inspection", "survey", "surveyor", "condition survey"]),
	(TAG_AGE_SCRUTINY, &["age", "older vessels", "years old", "renewal survey", "built before"]),
];

static METERS: LazyLock<Option<Regex>> = LazyLock::new(|| {
	Regex::new(
		r"(?i)(?:^|[^\d.,])(\d{1,3}(?:\.\d+)?)\s*-?\s*(?:m|mtr|mtrs|meters?|metres?)\b",
	)
	.ok()
});
static FEET: LazyLock<Option<Regex>> = LazyLock::new(|| {
	Regex::new(r"(?i)(?:^|[^\d.,])(\d{1,3}(?:\.\d+)?)\s*(?:-\s*)?(?:(?:ft|feet|foot)\b|')").ok()
});
static BUILD_YEAR: LazyLock<Option<Regex>> = LazyLock::new(|| {
	Regex::new(
		concat!(
			r"(?i)\b(?:built|constructed|launched|delivered|year\s+of\s+build|build\s+year)\b",
			r"(?:\s+(?:in|during|circa|around|is|of))?\s*:?\s*((?:19|20)\d{2})\b",
			r"|\b((?:19|20)\d{2})[\s\-]*built\b",
		),
	)
	.ok()
});
static AGE: LazyLock<Option<Regex>> = LazyLock::new(|| {
	Regex::new(r"(?i)\b(\d{1,3})[\s\-]*(?:years?|yrs?)[\s\-]*old\b|\baged?\s+(?:of\s+)?(\d{1,3})\b")
		.ok()
});
static TONNAGE: LazyLock<Option<Regex>> = LazyLock::new(|| {
	Regex::new(
		concat!(
			r"(?i)(?:^|[^\d.,])(\d{1,3}(?:,\d{3})+|\d+)\s*",
			r"(?:gt|grt|gross\s+register(?:ed)?\s+tons?|gross\s+tonnage|gross\s+tons?",
			r"|tons?|tonnes?)\b",
		),
	)
	.ok()
});

/// Structured signals pulled from a question. Every field is optional and absence never
/// blocks retrieval.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryContext {
	pub approximate_size_meters: Option<f32>,
	pub build_year: Option<i32>,
	pub approximate_age_years: Option<u32>,
	pub jurisdiction: Option<String>,
	pub tonnage: Option<u32>,
	pub cited_codes: BTreeSet<String>,
	pub derived_tags: BTreeSet<String>,
}
impl QueryContext {
	pub fn has_tag(&self, tag: &str) -> bool {
		self.derived_tags.contains(tag)
	}

	/// Number of derived tags whose cue phrases appear in `content`.
	pub fn matched_tag_count(&self, content: &str) -> usize {
		if self.derived_tags.is_empty() {
			return 0;
		}

		let normalized = text::normalized_phrase_text(content);

		TAG_CUES
			.iter()
			.filter(|(tag, _)| self.derived_tags.contains(*tag))
			.filter(|(_, cues)| cues.iter().any(|cue| text::contains_phrase(&normalized, cue)))
			.count()
	}
}

#[derive(Debug, Clone, Copy)]
pub struct QueryContextExtractor {
	reference_year: i32,
}
impl QueryContextExtractor {
	pub fn new(reference_year: i32) -> Self {
		Self { reference_year: reference_year.max(MIN_BUILD_YEAR) }
	}

	pub fn current() -> Self {
		Self::new(OffsetDateTime::now_utc().year())
	}

	pub fn extract(&self, question: &str) -> QueryContext {
		let approximate_size_meters = extract_size_meters(question);
		let build_year = self.extract_build_year(question);
		let approximate_age_years = match build_year {
			Some(year) => Some((self.reference_year - year).max(0) as u32),
			None => extract_age_phrase(question),
		};
		let jurisdiction =
			jurisdiction::find_all(question).first().map(|(_, name)| (*name).to_string());
		let tonnage = extract_tonnage(question);
		let cited_codes = legal_code::detect_codes(question);
		let mut context = QueryContext {
			approximate_size_meters,
			build_year,
			approximate_age_years,
			jurisdiction,
			tonnage,
			cited_codes,
			derived_tags: BTreeSet::new(),
		};

		context.derived_tags = derive_tags(&context);

		context
	}

	fn extract_build_year(&self, question: &str) -> Option<i32> {
		let pattern = BUILD_YEAR.as_ref()?;

		pattern.captures_iter(question).find_map(|captures| {
			let year = first_group(&captures, &[1, 2])?.parse::<i32>().ok()?;

			(MIN_BUILD_YEAR..=self.reference_year).contains(&year).then_some(year)
		})
	}
}

pub fn derive_tags(context: &QueryContext) -> BTreeSet<String> {
	let mut tags = BTreeSet::new();
	let size = context.approximate_size_meters;
	let age = context.approximate_age_years;

	if size.is_some_and(|value| value > LARGE_VESSEL_METERS) {
		tags.insert(TAG_LARGE_VESSEL.to_string());
	}
	if size.is_some_and(|value| value >= HEIGHTENED_REGIME_METERS)
		|| context.tonnage.is_some_and(|value| value >= HEIGHTENED_REGIME_TONNAGE)
	{
		tags.insert(TAG_HEIGHTENED_REGIME.to_string());
	}
	if age.is_some_and(|value| value > ENHANCED_INSPECTION_AGE) {
		tags.insert(TAG_ENHANCED_INSPECTION.to_string());
	}
	if age.is_some_and(|value| value > AGE_SCRUTINY_AGE) {
		tags.insert(TAG_AGE_SCRUTINY.to_string());
	}

	tags
}

fn extract_size_meters(question: &str) -> Option<f32> {
	let mut candidates: Vec<(usize, f32)> = Vec::new();

	if let Some(pattern) = METERS.as_ref() {
		for captures in pattern.captures_iter(question) {
			if let Some((start, value)) = numeric_group(&captures, 1) {
				candidates.push((start, value));
			}
		}
	}
	if let Some(pattern) = FEET.as_ref() {
		for captures in pattern.captures_iter(question) {
			if let Some((start, value)) = numeric_group(&captures, 1) {
				candidates.push((start, value * FEET_TO_METERS));
			}
		}
	}

	candidates.sort_by_key(|(start, _)| *start);
	candidates
		.into_iter()
		.map(|(_, value)| value)
		.find(|value| (MIN_SIZE_METERS..=MAX_SIZE_METERS).contains(value))
}

fn extract_age_phrase(question: &str) -> Option<u32> {
	let pattern = AGE.as_ref()?;

	pattern.captures_iter(question).find_map(|captures| {
		let age = first_group(&captures, &[1, 2])?.parse::<u32>().ok()?;

		(age <= MAX_AGE_YEARS).then_some(age)
	})
}

fn extract_tonnage(question: &str) -> Option<u32> {
	let pattern = TONNAGE.as_ref()?;

	pattern
		.captures_iter(question)
		.find_map(|captures| captures.get(1)?.as_str().replace(',', "").parse::<u32>().ok())
}

fn first_group<'a>(captures: &Captures<'a>, groups: &[usize]) -> Option<&'a str> {
	groups.iter().find_map(|idx| captures.get(*idx)).map(|found| found.as_str())
}

fn numeric_group(captures: &Captures<'_>, group: usize) -> Option<(usize, f32)> {
	let found = captures.get(group)?;
	let value = found.as_str().parse::<f32>().ok()?;

	value.is_finite().then_some((found.start(), value))
}

#[cfg(test)]
mod tests {
	use super::*;

	fn extractor() -> QueryContextExtractor {
		QueryContextExtractor::new(2026)
	}

	#[test]
	fn size_and_build_year_drive_tags() {
		let context = extractor().extract("50m vessel built 2000");

		assert_eq!(context.approximate_size_meters, Some(50.0));
		assert_eq!(context.build_year, Some(2000));
		assert_eq!(context.approximate_age_years, Some(26));
		assert!(context.has_tag(TAG_LARGE_VESSEL));
		assert!(context.has_tag(TAG_HEIGHTENED_REGIME));
		assert!(context.has_tag(TAG_ENHANCED_INSPECTION));
		assert!(context.has_tag(TAG_AGE_SCRUTINY));
	}

	#[test]
	fn feet_are_converted_and_out_of_range_sizes_dropped() {
		let context = extractor().extract("My 100 ft yacht");
		let size = context.approximate_size_meters.expect("Expected a size.");

		assert!((size - 30.48).abs() < 0.01);
		assert_eq!(extractor().extract("A 12m sailing boat").approximate_size_meters, None);
		assert_eq!(extractor().extract("A 450 metre tanker").approximate_size_meters, None);
	}

	#[test]
	fn feet_units_need_a_word_boundary() {
		assert_eq!(extractor().extract("a 100 footprint survey").approximate_size_meters, None);
		assert_eq!(extractor().extract("upload 30 ftp files").approximate_size_meters, None);
		assert!(extractor().extract("an 80' motor yacht").approximate_size_meters.is_some());
	}

	#[test]
	fn out_of_range_size_does_not_hide_a_later_valid_one() {
		let context = extractor().extract("Tender of 8m carried aboard a 60m yacht");

		assert_eq!(context.approximate_size_meters, Some(60.0));
	}

	#[test]
	fn build_year_is_bounded() {
		assert_eq!(extractor().extract("built in 1920").build_year, None);
		assert_eq!(extractor().extract("built in 2031").build_year, None);
		assert_eq!(extractor().extract("a 2012-built yacht").build_year, Some(2012));
	}

	#[test]
	fn explicit_age_is_used_without_a_build_year() {
		let context = extractor().extract("the vessel is 18 years old");

		assert_eq!(context.build_year, None);
		assert_eq!(context.approximate_age_years, Some(18));
		assert!(context.has_tag(TAG_ENHANCED_INSPECTION));
		assert!(!context.has_tag(TAG_AGE_SCRUTINY));
	}

	#[test]
	fn tonnage_alone_triggers_heightened_regime() {
		let context = extractor().extract("A yacht of 1,200 GT under the Malta flag");

		assert_eq!(context.tonnage, Some(1_200));
		assert_eq!(context.jurisdiction.as_deref(), Some("Malta"));
		assert!(context.has_tag(TAG_HEIGHTENED_REGIME));
		assert!(!context.has_tag(TAG_LARGE_VESSEL));
	}

	#[test]
	fn cited_codes_are_canonical() {
		let context = extractor().extract("Which SOLAS and MLC 2006 rules apply?");

		assert_eq!(context.cited_codes.iter().cloned().collect::<Vec<_>>(), vec!["MLC", "SOLAS"]);
	}

	#[test]
	fn unmatched_question_yields_empty_context() {
		let context = extractor().extract("hello there");

		assert_eq!(context, QueryContext::default());
	}

	#[test]
	fn tag_cues_count_matching_tags() {
		let context = extractor().extract("50m vessel built 2000");

		assert_eq!(context.matched_tag_count("Renewal survey of large yacht hulls"), 3);
		assert_eq!(context.matched_tag_count("Crew wages"), 0);
	}
}
