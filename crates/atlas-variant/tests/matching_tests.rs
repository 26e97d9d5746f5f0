//! Integration tests for consumer-side variant selection

use atlas_variant::ecosystem::{
    bundling, library_elements, usage, BUNDLING, LIBRARY_ELEMENTS, USAGE,
};
use atlas_variant::schema::PreferOrder;
use atlas_variant::{
    standard_schema, Attribute, AttributeContainer, AttributeSchema, CandidateStatus,
    Capability, ConsumerRequest, EcosystemAttributes, FailureKind, MatchingEngine, ModuleId,
    ModuleVariants, Reason, ResolvedVariant, SourceUnit, Variant, VariantError,
};
use pretty_assertions::assert_eq;
use rstest::rstest;
use std::path::PathBuf;
use std::sync::Arc;

fn module() -> ModuleId {
    ModuleId::new("com.foo", "bar", "1.0")
}

fn variant(name: &str, attributes: &[(&Attribute<String>, &str)]) -> ResolvedVariant {
    let builder = attributes
        .iter()
        .fold(Variant::builder(name, module()), |builder, (attribute, value)| {
            builder.attribute(*attribute, *value)
        });
    ResolvedVariant::standalone(builder.build().unwrap())
}

fn request(attributes: &[(&Attribute<String>, &str)]) -> ConsumerRequest {
    let mut container = AttributeContainer::new();
    for (attribute, value) in attributes {
        container.insert(*attribute, *value).unwrap();
    }
    ConsumerRequest::new(container)
}

fn exact_usage_schema() -> AttributeSchema {
    let mut builder = AttributeSchema::builder();
    builder.attribute(&USAGE).unwrap();
    builder.build().unwrap()
}

#[rstest]
#[case(usage::API, "v1")]
#[case(usage::RUNTIME, "v2")]
fn test_exact_match_selects_requested_usage(#[case] requested: &str, #[case] expected: &str) {
    let schema = exact_usage_schema();
    let candidates = vec![
        variant("v1", &[(&USAGE, usage::API)]),
        variant("v2", &[(&USAGE, usage::RUNTIME)]),
    ];

    let selected = MatchingEngine::new(&schema)
        .select(&request(&[(&USAGE, requested)]), &candidates)
        .unwrap();
    assert_eq!(selected.name(), expected);
}

#[test]
fn test_bundling_rule_breaks_tie() {
    let mut builder = AttributeSchema::builder();
    builder.attribute(&USAGE).unwrap();
    builder
        .with_disambiguation(&BUNDLING, PreferOrder::new([bundling::EXTERNAL]))
        .unwrap();
    let schema = builder.build().unwrap();
    let candidates = vec![
        variant("v1", &[(&USAGE, usage::API), (&BUNDLING, bundling::EXTERNAL)]),
        variant("v2", &[(&USAGE, usage::API), (&BUNDLING, bundling::EMBEDDED)]),
    ];

    let selected = MatchingEngine::new(&schema)
        .select(&request(&[(&USAGE, usage::API)]), &candidates)
        .unwrap();
    assert_eq!(selected.name(), "v1");
}

#[test]
fn test_no_compatible_variant_lists_every_candidate() {
    let schema = exact_usage_schema();
    let candidates = vec![
        variant("v1", &[(&USAGE, usage::API)]),
        variant("v2", &[(&USAGE, usage::RUNTIME)]),
    ];

    let err = MatchingEngine::new(&schema)
        .select(&request(&[(&USAGE, "documentation")]), &candidates)
        .unwrap_err();

    assert!(matches!(err, VariantError::NoCompatibleVariant(_)));
    let report = err.report().unwrap();
    assert_eq!(report.kind, FailureKind::NoCompatibleVariant);
    assert_eq!(report.candidates.len(), 2);
    for candidate in &report.candidates {
        assert_eq!(candidate.status, CandidateStatus::Incompatible);
        assert_eq!(candidate.failed_attributes(), vec!["usage"]);
    }

    let text = report.to_string();
    assert!(text.contains("v1"));
    assert!(text.contains("requested documentation, found api"));
}

#[test]
fn test_missing_attribute_is_incompatible_by_default() {
    let schema = exact_usage_schema();
    let candidates = vec![variant("bare", &[])];

    let err = MatchingEngine::new(&schema)
        .select(&request(&[(&USAGE, usage::API)]), &candidates)
        .unwrap_err();
    let report = err.report().unwrap();
    let check = report.candidate("bare").unwrap().check("usage").unwrap();
    assert_eq!(check.reason, Reason::Incompatible);
    assert_eq!(check.candidate, None);
}

#[test]
fn test_report_serializes_to_json() {
    let schema = exact_usage_schema();
    let candidates = vec![variant("v1", &[(&USAGE, usage::API)])];

    let err = MatchingEngine::new(&schema)
        .select(&request(&[(&USAGE, usage::RUNTIME)]), &candidates)
        .unwrap_err();
    let json: serde_json::Value =
        serde_json::from_str(&err.report().unwrap().to_json().unwrap()).unwrap();

    assert_eq!(json["kind"], "no-compatible-variant");
    assert_eq!(json["candidates"][0]["name"], "v1");
    assert_eq!(json["candidates"][0]["checks"][0]["reason"], "incompatible");
}

fn api_jar_attributes() -> AttributeContainer {
    let mut details = EcosystemAttributes::new();
    details
        .library()
        .providing_api()
        .as_jar()
        .with_external_dependencies();
    details.into_container().unwrap()
}

#[test]
fn test_compile_classpath_prefers_jar_over_classes() {
    let schema = standard_schema().unwrap();
    let mut module_variants = ModuleVariants::new(module());
    module_variants
        .insert(
            Variant::builder("apiElements", module())
                .attributes(api_jar_attributes())
                .secondary(
                    Variant::builder("classes", module())
                        .attribute(&LIBRARY_ELEMENTS, library_elements::CLASSES)
                        .build()
                        .unwrap(),
                )
                .build()
                .unwrap(),
        )
        .unwrap();

    let engine = MatchingEngine::new(&schema);
    let selected = engine
        .select_from(&ConsumerRequest::compile_classpath(), &module_variants)
        .unwrap();
    assert_eq!(selected.name(), "apiElements");

    let mut classes = AttributeContainer::new();
    classes.insert(&USAGE, usage::API).unwrap();
    classes.insert(&LIBRARY_ELEMENTS, library_elements::CLASSES).unwrap();
    let selected = engine
        .select_from(&ConsumerRequest::new(classes), &module_variants)
        .unwrap();
    assert_eq!(selected.name(), "apiElements-classes");
}

#[derive(Debug)]
struct Sources(&'static str);

impl SourceUnit for Sources {
    fn name(&self) -> &str {
        self.0
    }

    fn output_locations(&self) -> Vec<PathBuf> {
        vec![PathBuf::from(format!("build/classes/{}", self.0))]
    }
}

fn fixtures_capability() -> Capability {
    Capability::new("com.foo", "bar-test-fixtures", "1.0")
}

fn module_with_fixtures() -> ModuleVariants {
    let mut variants = ModuleVariants::new(module());
    variants
        .create_outgoing_elements("apiElements", |builder| {
            builder
                .for_api()
                .from_source_unit(Arc::new(Sources("main")))
                .with_class_directory_variant();
        })
        .unwrap();
    variants
        .create_outgoing_elements("testFixturesApiElements", |builder| {
            builder
                .for_api()
                .with_capabilities(vec![fixtures_capability()])
                .from_source_unit(Arc::new(Sources("testFixtures")))
                .with_class_directory_variant();
        })
        .unwrap();
    variants
}

#[rstest]
#[case(None, "apiElements-classes")]
#[case(Some(fixtures_capability()), "testFixturesApiElements-classes")]
fn test_capability_selects_between_classes_variants(
    #[case] capability: Option<Capability>,
    #[case] expected: &str,
) {
    let schema = standard_schema().unwrap();
    let variants = module_with_fixtures();
    let mut request = request(&[
        (&USAGE, usage::API),
        (&LIBRARY_ELEMENTS, library_elements::CLASSES),
    ]);
    if let Some(capability) = capability {
        request = request.with_capability(capability);
    }

    let selected = MatchingEngine::new(&schema)
        .select_from(&request, &variants)
        .unwrap();
    assert_eq!(selected.name(), expected);
}

#[test]
fn test_runtime_request_rejects_api_only_variant() {
    let schema = standard_schema().unwrap();
    let candidates = vec![variant("apiElements", &[(&USAGE, usage::API)])];

    let err = MatchingEngine::new(&schema)
        .select(&ConsumerRequest::runtime_classpath(), &candidates)
        .unwrap_err();
    assert!(matches!(err, VariantError::NoCompatibleVariant(_)));
}

#[test]
fn test_ambiguity_is_reported_with_differing_attributes() {
    let schema = exact_usage_schema();
    let shading = Attribute::<String>::named("shading");
    let candidates = vec![
        variant("shaded", &[(&USAGE, usage::API), (&shading, "yes")]),
        variant("plain", &[(&USAGE, usage::API), (&shading, "no")]),
    ];

    let err = MatchingEngine::new(&schema)
        .select(&request(&[(&USAGE, usage::API)]), &candidates)
        .unwrap_err();

    assert!(matches!(err, VariantError::AmbiguousVariant(_)));
    let report = err.report().unwrap();
    assert_eq!(report.tied(), vec!["plain", "shaded"]);
    assert_eq!(report.differing.keys().collect::<Vec<_>>(), vec!["shading"]);
}
