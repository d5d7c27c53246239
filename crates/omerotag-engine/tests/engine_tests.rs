//! End-to-end tests for omerotag-engine: rule evaluation against a snapshot graph,
//! reconciliation, dry runs and error propagation.

use omerotag_core::{CapabilityRegistry, Error};
use omerotag_engine::memory::{FailOn, StoreStats};
use omerotag_engine::*;
use omerotag_rules::{compile, CompiledRules, RuleRecord};
use pretty_assertions::assert_eq;
use serde_json::{json, Value as Json};

struct Fixture {
    store: MemoryStore,
    registry: CapabilityRegistry,
    rules: CompiledRules,
}

impl Fixture {
    fn new(graph: Json, rules: &str) -> Self {
        let store = MemoryStore::from_snapshot(serde_json::from_value(graph).unwrap()).unwrap();
        let mut registry = CapabilityRegistry::new();
        registry.install(&store).unwrap();
        let records: Vec<RuleRecord> = serde_yaml::from_str(rules).unwrap();
        let rules = compile(records, &registry).unwrap();
        Self {
            store,
            registry,
            rules,
        }
    }

    fn engine(&self) -> Engine<'_> {
        Engine::new(&self.store, &self.store, &self.registry, &self.rules)
    }

    fn apply(&self) -> RunSummary {
        self.engine()
            .run(RunMode::Apply, &mut TagCache::new())
            .unwrap()
    }

    fn tags_on(&self, id: i64) -> Vec<String> {
        self.store.tag_values(id).unwrap()
    }
}

const PATIENT_AND_SIZE: &str = r#"
- capture: '^(P\d+)_'
  format: 'patient-{}'
  object: slide
- name: large
  rules:
    - attribute_path: [slide, image, sizeX]
      operation: gt
      value: 5000
"#;

fn slide_with_width(width: f64) -> Json {
    json!({
        "objects": [
            {"id": 1, "type": "slide", "name": "P7_sample.svs", "children": {"images": [2]}},
            {"id": 2, "type": "image", "name": "main", "fields": {"sizeX": width, "sizeY": 4000}}
        ]
    })
}

// ===========================================================================
// Apply mode
// ===========================================================================

#[test]
fn slide_gets_patient_and_size_tags() {
    let fx = Fixture::new(slide_with_width(6000.0), PATIENT_AND_SIZE);
    let summary = fx.apply();

    assert_eq!(summary.objects(), 1);
    let outcome = &summary.outcomes[0];
    assert_eq!(outcome.name, "P7_sample.svs");
    assert!(outcome.decision.false_tags.is_empty());
    assert_eq!(
        outcome.decision.true_tags.iter().cloned().collect::<Vec<_>>(),
        vec!["large".to_string(), "patient-P7".to_string()]
    );
    assert_eq!(fx.tags_on(1), vec!["large", "patient-P7"]);
    assert_eq!(summary.links_added, 2);
    assert_eq!(fx.store.stats().unwrap().tags_created, 2);
}

#[test]
fn absolute_rule_removes_a_stale_tag() {
    let mut graph = slide_with_width(300.0);
    graph["tags"] = json!([{"id": 10, "value": "large"}]);
    graph["links"] = json!([{"id": 1, "parent": 1, "tag": 10}]);
    let fx = Fixture::new(graph, PATIENT_AND_SIZE);

    let summary = fx.apply();
    assert_eq!(summary.links_removed, 1);
    assert_eq!(
        summary.outcomes[0].reconciliation.as_ref().unwrap().links_removed,
        vec!["large".to_string()]
    );
    assert_eq!(fx.tags_on(1), vec!["patient-P7"]);
}

#[test]
fn non_absolute_rule_leaves_existing_tag_alone() {
    let mut graph = slide_with_width(300.0);
    graph["tags"] = json!([{"id": 10, "value": "wide"}]);
    graph["links"] = json!([{"id": 1, "parent": 1, "tag": 10}]);
    let fx = Fixture::new(
        graph,
        r#"
- name: wide
  absolute: false
  rules:
    - attribute_path: [slide, image, sizeX]
      operation: ge
      value: 1000
"#,
    );

    let summary = fx.apply();
    assert!(summary.outcomes[0].decision.is_empty());
    assert_eq!(fx.tags_on(1), vec!["wide"]);
}

#[test]
fn true_tag_wins_over_false_tag() {
    let mut graph = slide_with_width(6000.0);
    graph["tags"] = json!([{"id": 10, "value": "big"}]);
    graph["links"] = json!([{"id": 1, "parent": 1, "tag": 10}]);
    let fx = Fixture::new(
        graph,
        r#"
- name: big
  rules:
    - attribute_path: [slide, image, sizeX]
      operation: gt
      value: 5000
- name: big
  rules:
    - attribute_path: [slide, image, sizeY]
      operation: gt
      value: 9000
"#,
    );

    let summary = fx.apply();
    let decision = &summary.outcomes[0].decision;
    assert!(decision.true_tags.contains("big"));
    assert!(decision.false_tags.contains("big"));
    assert_eq!(summary.links_removed, 0);
    assert_eq!(summary.links_added, 0);
    assert_eq!(fx.tags_on(1), vec!["big"]);
}

#[test]
fn second_run_changes_nothing() {
    let fx = Fixture::new(slide_with_width(6000.0), PATIENT_AND_SIZE);
    fx.apply();
    let after_first = fx.store.stats().unwrap();

    let again = fx.apply();
    assert_eq!(again.links_added, 0);
    assert_eq!(again.links_removed, 0);
    assert_eq!(fx.store.stats().unwrap(), after_first);
}

#[test]
fn existing_tag_entity_is_reused() {
    let mut graph = slide_with_width(6000.0);
    graph["tags"] = json!([{"id": 10, "value": "large", "description": "made by hand"}]);
    let fx = Fixture::new(graph, PATIENT_AND_SIZE);

    let mut cache = TagCache::new();
    fx.engine().run(RunMode::Apply, &mut cache).unwrap();
    assert_eq!(cache.get("large").unwrap().id, 10);
    assert_eq!(cache.len(), 2);
    assert_eq!(fx.store.stats().unwrap().tags_created, 1);
}

#[test]
fn created_tags_carry_the_configured_description() {
    let fx = Fixture::new(slide_with_width(6000.0), PATIENT_AND_SIZE);
    let mut cache = TagCache::new();
    fx.engine()
        .with_tag_description("from rules")
        .run(RunMode::Apply, &mut cache)
        .unwrap();
    assert_eq!(cache.get("large").unwrap().description, "from rules");
}

// ===========================================================================
// Evaluation details
// ===========================================================================

#[test]
fn match_is_an_unanchored_search() {
    let fx = Fixture::new(
        json!({
            "objects": [
                {"id": 1, "type": "slide", "name": "s1", "children": {"images": [2]}},
                {"id": 2, "type": "image", "name": "i", "fields": {"stain": "stained H&E v2"}}
            ]
        }),
        r#"
- name: he
  rules:
    - attribute_path: [slide, image, stain]
      operation: match
      value: 'H&E'
"#,
    );
    fx.apply();
    assert_eq!(fx.tags_on(1), vec!["he"]);
}

#[test]
fn failing_child_is_skipped_and_siblings_still_count() {
    let fx = Fixture::new(
        json!({
            "objects": [
                {"id": 1, "type": "slide", "name": "s1", "children": {"images": [2, 3]}},
                {"id": 2, "type": "image", "name": "blank", "fields": {"stain": null}},
                {"id": 3, "type": "image", "name": "good", "fields": {"stain": "H&E"}}
            ]
        }),
        r#"
- name: he
  rules:
    - attribute_path: [slide, image, stain]
      operation: match
      value: '^H&E$'
"#,
    );
    let summary = fx.apply();
    assert_eq!(
        summary.outcomes[0].decision.true_tags.len(),
        1,
        "null stain must not abort the slide"
    );
    assert_eq!(fx.tags_on(1), vec!["he"]);
}

#[test]
fn child_of_the_wrong_type_contributes_nothing() {
    let fx = Fixture::new(
        json!({
            "objects": [
                {"id": 1, "type": "slide", "name": "s1", "children": {"images": [2, 3]}},
                {"id": 2, "type": "image", "name": "i", "fields": {"sizeX": 100}},
                {"id": 3, "type": "label", "name": "l", "fields": {"sizeX": 9000}}
            ]
        }),
        PATIENT_AND_SIZE,
    );
    let summary = fx.apply();
    assert!(summary.outcomes[0].decision.true_tags.is_empty());
    assert!(summary.outcomes[0].decision.false_tags.contains("large"));
}

#[test]
fn boxed_values_are_unwrapped_before_comparison() {
    let fx = Fixture::new(
        json!({
            "objects": [
                {"id": 1, "type": "slide", "name": "s1", "children": {"images": [2]}},
                {"id": 2, "type": "image", "name": "i", "fields": {"pixelSize": {"value": 0.25, "unit": "MICROMETER"}}}
            ]
        }),
        r#"
- name: high-res
  rules:
    - attribute_path: [slide, image, pixelSize]
      operation: lt
      value: '0.5'
"#,
    );
    fx.apply();
    assert_eq!(fx.tags_on(1), vec!["high-res"]);
}

#[test]
fn nested_levels_are_judged_where_their_attributes_live() {
    let fx = Fixture::new(
        json!({
            "objects": [
                {"id": 1, "type": "slide", "name": "s1", "children": {"images": [2]}},
                {"id": 2, "type": "image", "name": "i", "fields": {"sizeX": 6000}, "children": {"channels": [3, 4]}},
                {"id": 3, "type": "channel", "name": "c0", "fields": {"wavelength": 488}},
                {"id": 4, "type": "channel", "name": "c1", "fields": {"wavelength": 561}}
            ]
        }),
        r#"
- name: green
  absolute: false
  rules:
    - attribute_path: [slide, image, channel, wavelength]
      operation: eq
      value: 488
- name: large
  rules:
    - attribute_path: [slide, image, sizeX]
      operation: gt
      value: 5000
"#,
    );
    assert_eq!(fx.rules.path_tree.node_count(), 5);
    fx.apply();
    assert_eq!(fx.tags_on(1), vec!["green", "large"]);
}

#[test]
fn conditions_on_one_level_must_all_hold() {
    let fx = Fixture::new(
        slide_with_width(6000.0),
        r#"
- name: huge
  rules:
    - attribute_path: [slide, image, sizeX]
      operation: gt
      value: 5000
    - attribute_path: [slide, image, sizeY]
      operation: gt
      value: 5000
"#,
    );
    let summary = fx.apply();
    let decision = &summary.outcomes[0].decision;
    assert!(decision.true_tags.is_empty());
    assert!(decision.false_tags.contains("huge"));
    assert!(fx.tags_on(1).is_empty());
}

const BIG_HE: &str = r#"
- name: big-he
  rules:
    - attribute_path: [slide, stain]
      operation: match
      value: 'H&E'
    - attribute_path: [slide, image, sizeX]
      operation: gt
      value: 5000
"#;

fn stained_slide_with_width(width: f64) -> Json {
    json!({
        "objects": [
            {"id": 1, "type": "slide", "name": "s1", "fields": {"stain": "H&E"}, "children": {"images": [2]}},
            {"id": 2, "type": "image", "name": "i", "fields": {"sizeX": width}}
        ],
        "tags": [{"id": 10, "value": "big-he"}],
        "links": [{"id": 1, "parent": 1, "tag": 10}]
    })
}

#[test]
fn conditions_across_levels_must_all_hold() {
    let fx = Fixture::new(stained_slide_with_width(300.0), BIG_HE);
    let summary = fx.apply();

    let decision = &summary.outcomes[0].decision;
    assert!(!decision.true_tags.contains("big-he"));
    assert!(decision.false_tags.contains("big-he"));
    assert_eq!(summary.links_removed, 1);
    assert!(fx.tags_on(1).is_empty());
}

#[test]
fn cross_level_rule_holds_when_every_level_agrees() {
    let fx = Fixture::new(stained_slide_with_width(6000.0), BIG_HE);
    let summary = fx.apply();

    let decision = &summary.outcomes[0].decision;
    assert!(decision.true_tags.contains("big-he"));
    assert!(decision.false_tags.is_empty());
    assert_eq!(fx.tags_on(1), vec!["big-he"]);
}

#[test]
fn cross_level_rule_fails_on_the_parent_attribute() {
    let mut graph = stained_slide_with_width(6000.0);
    graph["objects"][0]["fields"]["stain"] = json!("PAS");
    let fx = Fixture::new(graph, BIG_HE);
    fx.apply();
    assert!(fx.tags_on(1).is_empty());
}

#[test]
fn slides_without_images_still_get_their_own_tags() {
    let fx = Fixture::new(
        json!({
            "objects": [
                {"id": 1, "type": "slide", "name": "P1_a.svs", "fields": {"stain": "PAS"}, "children": {"images": [4]}},
                {"id": 2, "type": "slide", "name": "P2_b.svs", "fields": {"stain": "H&E"}},
                {"id": 3, "type": "slide", "name": "P3_c.svs", "fields": {"stain": "H&E"}, "children": {"images": []}},
                {"id": 4, "type": "image", "name": "i", "fields": {"sizeX": 6000}}
            ]
        }),
        r#"
- capture: '^(P\d+)_'
  object: slide
- name: he
  rules:
    - attribute_path: [slide, stain]
      operation: match
      value: 'H&E'
- name: large
  rules:
    - attribute_path: [slide, image, sizeX]
      operation: gt
      value: 5000
"#,
    );
    let summary = fx.apply();
    assert_eq!(summary.objects(), 3);

    assert_eq!(fx.tags_on(1), vec!["P1", "large"]);
    assert_eq!(fx.tags_on(2), vec!["P2", "he"]);
    assert_eq!(fx.tags_on(3), vec!["P3", "he"]);
    for outcome in &summary.outcomes {
        assert!(
            !outcome.decision.false_tags.contains("large"),
            "{} has no images to judge",
            outcome.name
        );
    }
}

#[test]
fn incomparable_condition_only_skips_its_own_rule() {
    let fx = Fixture::new(
        json!({
            "objects": [
                {"id": 1, "type": "slide", "name": "s1", "children": {"images": [2]}},
                {"id": 2, "type": "image", "name": "i", "fields": {"sizeX": 6000, "stain": null}}
            ]
        }),
        r#"
- name: large
  rules:
    - attribute_path: [slide, image, sizeX]
      operation: gt
      value: 5000
- name: he
  rules:
    - attribute_path: [slide, image, stain]
      operation: match
      value: 'H&E'
"#,
    );
    let summary = fx.apply();

    let decision = &summary.outcomes[0].decision;
    assert_eq!(
        decision.true_tags.iter().cloned().collect::<Vec<_>>(),
        vec!["large".to_string()]
    );
    assert!(decision.false_tags.is_empty());
    assert_eq!(fx.tags_on(1), vec!["large"]);
}

#[test]
fn name_rules_only_apply_to_their_object_type() {
    let fx = Fixture::new(
        json!({
            "objects": [
                {"id": 1, "type": "slide", "name": "P1_a.svs", "children": {"images": [2]}},
                {"id": 2, "type": "image", "name": "P2_b.tiff"}
            ]
        }),
        r#"
- capture: '^(P\d+)_'
  object: image
"#,
    );
    let summary = fx.apply();
    assert_eq!(summary.objects(), 1);
    assert_eq!(summary.outcomes[0].kind, "image");
    assert!(fx.tags_on(1).is_empty());
    assert_eq!(fx.tags_on(2), vec!["P2"]);
}

// ===========================================================================
// Dry run and failures
// ===========================================================================

#[test]
fn dry_run_writes_report_and_mutates_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tags.csv");
    let fx = Fixture::new(slide_with_width(6000.0), PATIENT_AND_SIZE);

    let mut report = DryRunReport::append(&path).unwrap();
    let summary = fx
        .engine()
        .run(RunMode::DryRun(&mut report), &mut TagCache::new())
        .unwrap();

    assert!(summary.outcomes[0].reconciliation.is_none());
    assert_eq!(report.rows(), 1);
    assert_eq!(fx.store.stats().unwrap(), StoreStats::default());
    assert!(fx.tags_on(1).is_empty());

    let text = std::fs::read_to_string(&path).unwrap();
    assert_eq!(
        text.lines().collect::<Vec<_>>(),
        vec![
            "Slide Name,True Tags,False Tags",
            "P7_sample.svs,\"large, patient-P7\",",
        ]
    );
}

#[test]
fn store_failures_abort_the_run() {
    let fx = Fixture::new(slide_with_width(6000.0), PATIENT_AND_SIZE);
    fx.store.fail_on(FailOn::CreateTag).unwrap();
    let err = fx
        .engine()
        .run(RunMode::Apply, &mut TagCache::new())
        .unwrap_err();
    assert!(matches!(err, Error::Store(_)));
}

#[test]
fn outcome_summary_line_lists_changes() {
    let fx = Fixture::new(slide_with_width(6000.0), PATIENT_AND_SIZE);
    let summary = fx.apply();
    assert_eq!(
        summary.outcomes[0].to_string(),
        "slide P7_sample.svs: +[large, patient-P7] -[]"
    );
}
