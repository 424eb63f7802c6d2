use flagstate_domain::{
	AspectKind, DocumentType, Expansion, QueryContextExtractor, QueryExpander,
	context::{TAG_HEIGHTENED_REGIME, TAG_LARGE_VESSEL},
	jurisdiction, legal_code,
};

#[test]
fn fifty_metre_vessel_built_2000_gets_size_age_and_regime_tags() {
	let context = QueryContextExtractor::new(2026).extract("50m vessel built 2000");

	assert_eq!(context.approximate_size_meters, Some(50.0));
	assert_eq!(context.approximate_age_years, Some(26));
	assert!(context.derived_tags.contains(TAG_LARGE_VESSEL));
	assert!(context.derived_tags.contains(TAG_HEIGHTENED_REGIME));
}

#[test]
fn extraction_is_deterministic_and_serializable() {
	let extractor = QueryContextExtractor::new(2026);
	let question = "Can a 40 metre yacht built in 2010 under the Marshall Islands flag follow MLC?";
	let first = extractor.extract(question);
	let second = extractor.extract(question);

	assert_eq!(first, second);
	assert_eq!(first.jurisdiction.as_deref(), Some("Marshall Islands"));
	assert_eq!(first.approximate_age_years, Some(16));

	let json = serde_json::to_value(&first).expect("Failed to serialize context.");

	assert_eq!(json["cited_codes"], serde_json::json!(["MLC"]));
	assert_eq!(json["build_year"], serde_json::json!(2010));
}

#[test]
fn first_mentioned_jurisdiction_wins() {
	let context =
		QueryContextExtractor::new(2026).extract("Is a French owner able to flag in Malta?");

	assert_eq!(context.jurisdiction.as_deref(), Some("France"));
}

#[test]
fn expansion_falls_back_to_lexical_without_two_aspects() {
	let expansion = QueryExpander::default().expand("MLC crew requirements");

	match expansion {
		Expansion::Lexical { original, variants, keywords } => {
			assert_eq!(original, "MLC crew requirements");
			assert!(variants.len() <= 5);
			assert_eq!(keywords, vec!["mlc", "crew", "requirements"]);
		},
		Expansion::MultiAspect { .. } => panic!("Expected a lexical expansion."),
	}
}

#[test]
fn named_topics_on_a_flag_move_carry_full_weight() {
	let expansion = QueryExpander::default()
		.expand("Survey certificates when leaving the Cayman Islands to register in Malta");

	let Expansion::MultiAspect { aspects, .. } = expansion else {
		panic!("Expected a multi-aspect expansion.");
	};
	let kinds: Vec<_> = aspects.iter().map(|aspect| aspect.kind).collect();

	assert_eq!(kinds, vec![AspectKind::Exit, AspectKind::Entry, AspectKind::TechnicalCompliance]);
	assert_eq!(aspects[2].weight, 1.0);
	assert!(aspects[2].query.starts_with("Malta"));
}

#[test]
fn document_jurisdiction_and_type_come_from_category_then_name() {
	assert_eq!(jurisdiction::detect_for_document("malta", "Yacht Code"), Some("Malta"));
	assert_eq!(
		DocumentType::classify("Transport Malta Merchant Shipping Notice 12", "malta"),
		DocumentType::NationalRegistryGuidance
	);
	assert!(legal_code::mentions_code("Large Yacht Code (LY3)", "LY3"));
}
