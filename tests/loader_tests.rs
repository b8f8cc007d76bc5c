//! Loader Tests
//!
//! Reference resolution, loading diagnostics in strict and flexible mode, and
//! structural equality of loaded schemas.

use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::fs;
use std::sync::Arc;
use url::Url;

use familiar_jsonschema::loader::{FileFetcher, IssueCode, LoaderOptions, SchemaLoader, Severity};
use familiar_jsonschema::{Draft, JsonSchema, SchemaError, SchemaKeyword, LoadingReport};

fn fixture(text: &str) -> Value {
    serde_json::from_str(text).unwrap()
}

fn loading_report(err: SchemaError) -> LoadingReport {
    match err {
        SchemaError::Loading(report) => report,
        other => panic!("expected a loading error, got {other:?}"),
    }
}

fn codes(report: &LoadingReport) -> Vec<IssueCode> {
    report.all().iter().map(|issue| issue.code).collect()
}

// =============================================================================
// References
// =============================================================================

#[test]
fn test_pointer_refs_share_nodes() {
    let graph = SchemaLoader::new()
        .load(&json!({
            "definitions": {"name": {"type": "string"}},
            "properties": {
                "first": {"$ref": "#/definitions/name"},
                "last": {"$ref": "#/definitions/name"}
            }
        }))
        .unwrap();
    let root = graph.root();
    let first = root.property("first").unwrap().reference().unwrap();
    let last = root.property("last").unwrap().reference().unwrap();
    assert_eq!(first.id(), last.id());
    assert_eq!(first.id(), root.definition("name").unwrap().id());
}

#[test]
fn test_escaped_pointer_segments() {
    let graph = SchemaLoader::new()
        .load(&json!({
            "definitions": {"a/b": {"type": "string"}, "c%d": {"type": "integer"}},
            "properties": {
                "x": {"$ref": "#/definitions/a~1b"},
                "y": {"$ref": "#/definitions/c%25d"}
            }
        }))
        .unwrap();
    let root = graph.root();
    assert_eq!(
        root.property("x").unwrap().reference().unwrap().id(),
        root.definition("a/b").unwrap().id()
    );
    assert_eq!(
        root.property("y").unwrap().reference().unwrap().id(),
        root.definition("c%d").unwrap().id()
    );
}

#[test]
fn test_plain_name_fragment() {
    let graph = SchemaLoader::new()
        .load(&json!({
            "properties": {"item": {"$ref": "#item"}},
            "definitions": {"item": {"$id": "#item", "type": "string"}}
        }))
        .unwrap();
    let root = graph.root();
    let target = root.property("item").unwrap().reference().unwrap();
    assert_eq!(target.id(), root.definition("item").unwrap().id());
    assert_eq!(target.location().scope.as_str(), "json-schema:///#item");
}

#[test]
fn test_plain_name_in_fixture() {
    let graph = SchemaLoader::new().load(&fixture(include_str!("fixtures/person.json"))).unwrap();
    let root = graph.root();
    assert_eq!(root.location().document.as_str(), "http://example.com/person.json");
    let address = root.property("address").unwrap().reference().unwrap();
    assert_eq!(address.id(), root.definition("address").unwrap().id());
    assert_eq!(address.location().pointer.to_string(), "/definitions/address");
}

#[test]
fn test_nested_ids_rebase_scope() {
    let mut loader = SchemaLoader::new();
    loader
        .preload("http://example.com/a/sub/item.json", json!({"type": "string"}))
        .unwrap();
    let graph = loader
        .load(&json!({
            "$schema": "http://json-schema.org/draft-04/schema#",
            "id": "http://example.com/a/root.json",
            "properties": {
                "x": {
                    "id": "sub/",
                    "properties": {"y": {"$ref": "item.json"}}
                }
            }
        }))
        .unwrap();
    let x = graph.root().property("x").unwrap();
    assert_eq!(x.location().scope.as_str(), "http://example.com/a/sub/");
    let y = x.property("y").unwrap().reference().unwrap();
    assert_eq!(y.location().document.as_str(), "http://example.com/a/sub/item.json");
    assert!(matches!(y.keyword("type"), Some(SchemaKeyword::TypeSet(_))));
}

#[test]
fn test_relative_ref_into_preloaded_document() {
    let mut loader = SchemaLoader::new();
    loader
        .preload(
            "http://example.com/common.json",
            json!({"definitions": {"positive": {"type": "integer", "minimum": 1}}}),
        )
        .unwrap();
    let graph = loader
        .load(&json!({
            "$id": "http://example.com/root.json",
            "properties": {"n": {"$ref": "common.json#/definitions/positive"}}
        }))
        .unwrap();
    let compiled = JsonSchema::from_graph(graph).unwrap();
    assert!(compiled.is_valid(&json!({"n": 3})));
    assert!(!compiled.is_valid(&json!({"n": 0})));
}

#[test]
fn test_file_fetcher_resolves_file_refs() {
    let dir = tempfile::tempdir().unwrap();
    let defs = dir.path().join("defs.json");
    fs::write(&defs, r#"{"definitions": {"id": {"type": "integer"}}}"#).unwrap();
    let mut target = Url::from_file_path(fs::canonicalize(&defs).unwrap()).unwrap();
    target.set_fragment(Some("/definitions/id"));

    let loader = SchemaLoader::new().with_fetcher(Arc::new(FileFetcher));
    let graph = loader.load(&json!({"$ref": target.as_str()})).unwrap();
    let compiled = JsonSchema::from_graph(graph).unwrap();
    assert!(compiled.is_valid(&json!(7)));
    assert!(!compiled.is_valid(&json!("7")));
}

#[test]
fn test_load_file_uses_file_uri() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("schema.json");
    fs::write(&path, r##"{"definitions": {"s": {"type": "string"}}, "items": {"$ref": "#/definitions/s"}}"##).unwrap();

    let graph = SchemaLoader::new().load_file(&path).unwrap();
    assert_eq!(graph.root().location().document.scheme(), "file");
    assert!(graph.root().keyword("items").is_some());
}

// =============================================================================
// Fatal issues
// =============================================================================

#[test]
fn test_unresolvable_ref_is_fatal_even_when_flexible() {
    let err = SchemaLoader::new()
        .load(&json!({"properties": {"a": {"$ref": "#/definitions/missing"}}}))
        .unwrap_err();
    let report = loading_report(err);
    assert_eq!(codes(&report), vec![IssueCode::UnresolvableRef]);
    assert_eq!(report.all()[0].location, "#/properties/a");
}

#[test]
fn test_unknown_plain_name_is_unresolvable() {
    let err = SchemaLoader::new()
        .load(&json!({"properties": {"a": {"$ref": "#nowhere"}}}))
        .unwrap_err();
    assert_eq!(codes(&loading_report(err)), vec![IssueCode::UnresolvableRef]);
}

#[test]
fn test_fetch_failure_is_fatal() {
    let err = SchemaLoader::new()
        .load(&json!({"$ref": "http://example.com/missing.json"}))
        .unwrap_err();
    let report = loading_report(err);
    assert_eq!(codes(&report), vec![IssueCode::FetchFailed]);
    assert_eq!(report.all()[0].level, Severity::Error);
}

#[test]
fn test_in_place_cycle_is_rejected() {
    let err = SchemaLoader::new()
        .load(&json!({
            "definitions": {
                "a": {"allOf": [{"$ref": "#/definitions/b"}]},
                "b": {"anyOf": [{"$ref": "#/definitions/a"}]}
            }
        }))
        .unwrap_err();
    let report = loading_report(err);
    assert_eq!(report.with_code(IssueCode::SchemaCycle).count(), 1);
}

#[test]
fn test_recursion_through_properties_is_allowed() {
    let graph = SchemaLoader::new()
        .load(&json!({"properties": {"x": {"$ref": "#"}}}))
        .unwrap();
    let root = graph.root();
    let x = root.property("x").unwrap().reference().unwrap();
    assert_eq!(x.id(), root.id());
}

// =============================================================================
// Strict and flexible modes
// =============================================================================

#[test]
fn test_flexible_mode_collects_every_issue() {
    let schema = fixture(include_str!("fixtures/invalid_keywords.json"));
    let report = loading_report(SchemaLoader::new().load(&schema).unwrap_err());

    assert!(report.with_code(IssueCode::InvalidKeyword).count() >= 3);
    assert_eq!(report.with_code(IssueCode::InvalidSchema).count(), 1);
    let unknown: Vec<_> = report.with_code(IssueCode::UnknownKeyword).collect();
    assert_eq!(unknown.len(), 1);
    assert_eq!(unknown[0].level, Severity::Warning);
    assert_eq!(unknown[0].arguments, vec![json!("frobnicate")]);
    assert!(report.format_all().contains("error(s)"));
}

#[test]
fn test_strict_mode_stops_at_first_error() {
    let schema = fixture(include_str!("fixtures/invalid_keywords.json"));
    let loader = SchemaLoader::with_options(LoaderOptions::default().strict(true));
    let report = loading_report(loader.load(&schema).unwrap_err());

    assert_eq!(report.error_count(), 1);
    assert_eq!(report.all()[0].code, IssueCode::UnknownKeyword);
    assert_eq!(report.all()[0].level, Severity::Error);
}

#[test]
fn test_warnings_do_not_fail_loading() {
    let graph = SchemaLoader::new()
        .load(&json!({
            "$schema": "http://example.com/custom-meta",
            "frobnicate": 1,
            "items": {},
            "additionalItems": false,
            "properties": {"a": {"$ref": "#/definitions/s", "minLength": 3}},
            "definitions": {"s": {"type": "string"}}
        }))
        .unwrap();
    let report = graph.report();
    assert!(!report.has_errors());

    let mut found = codes(report);
    found.sort_by_key(|code| code.as_str());
    assert_eq!(
        found,
        vec![
            IssueCode::ConflictingKeywords,
            IssueCode::UnknownKeyword,
            IssueCode::RefSiblingsIgnored,
            IssueCode::UnknownVersion,
        ]
    );
}

#[test]
fn test_ref_siblings_are_not_validated() {
    let compiled = JsonSchema::from_value(&json!({
        "properties": {"a": {"$ref": "#/definitions/s", "minLength": 3}},
        "definitions": {"s": {"type": "string"}}
    }))
    .unwrap();
    assert!(compiled.is_valid(&json!({"a": "ab"})));
    assert!(!compiled.is_valid(&json!({"a": 1})));
}

#[test]
fn test_draft4_specific_warnings() {
    let graph = SchemaLoader::new()
        .load(&json!({
            "$schema": "http://json-schema.org/draft-04/schema#",
            "exclusiveMinimum": true,
            "properties": {"a": true}
        }))
        .unwrap();
    let mut found = codes(graph.report());
    found.sort_by_key(|code| code.as_str());
    assert_eq!(found, vec![IssueCode::MissingKeyword, IssueCode::BooleanSchemaUnsupported]);
    assert_eq!(graph.root().draft(), Draft::Draft4);
}

#[test]
fn test_keyword_from_another_draft_is_unknown() {
    let graph = SchemaLoader::new()
        .load(&json!({"$schema": "http://json-schema.org/draft-04/schema#", "const": 1}))
        .unwrap();
    assert_eq!(codes(graph.report()), vec![IssueCode::UnknownKeyword]);
    assert!(graph.root().keyword("const").is_none());
}

#[test]
fn test_keyword_type_mismatch_keeps_other_keywords() {
    let err = SchemaLoader::new()
        .load(&json!({"type": "string", "minLength": "3", "properties": {"a": {"maxItems": "x"}}}))
        .unwrap_err();
    let report = loading_report(err);

    let mismatches: Vec<_> = report
        .all()
        .iter()
        .map(|issue| (issue.code, issue.location.as_str(), issue.arguments[0].clone()))
        .collect();
    assert_eq!(
        mismatches,
        vec![
            (IssueCode::KeywordTypeMismatch, "#", json!("minLength")),
            (IssueCode::KeywordTypeMismatch, "#/properties/a", json!("maxItems")),
        ]
    );
    assert_eq!(report.error_count(), 2);
}

#[test]
fn test_malformed_id_is_reported() {
    let err = SchemaLoader::new()
        .load(&json!({"properties": {"b": {"$id": "http://[oops", "type": "string"}}}))
        .unwrap_err();
    let report = loading_report(err);
    let malformed: Vec<_> = report.with_code(IssueCode::MalformedUri).collect();
    assert_eq!(malformed.len(), 1);
    assert_eq!(malformed[0].location, "#/properties/b");
    assert_eq!(malformed[0].arguments, vec![json!("http://[oops")]);
}

#[test]
fn test_malformed_ref_is_fatal() {
    let err = SchemaLoader::new()
        .load(&json!({"properties": {"a": {"$ref": "http://[oops"}}}))
        .unwrap_err();
    let report = loading_report(err);
    assert_eq!(codes(&report), vec![IssueCode::MalformedUri]);
    assert_eq!(report.all()[0].location, "#/properties/a");
}

#[test]
fn test_duplicate_required_entries_are_invalid() {
    for draft in ["http://json-schema.org/draft-04/schema#", "http://json-schema.org/draft-06/schema#"] {
        let err = SchemaLoader::new()
            .load(&json!({"$schema": draft, "required": ["a", "a"]}))
            .unwrap_err();
        assert_eq!(codes(&loading_report(err)), vec![IssueCode::InvalidKeyword]);
    }
    assert!(SchemaLoader::new().load(&json!({"required": ["a", "b"]})).is_ok());
}

#[test]
fn test_load_with_explicit_uri() {
    let uri = Url::parse("http://example.com/schemas/item.json").unwrap();
    let graph = SchemaLoader::new()
        .load_with_uri(&json!({"definitions": {"n": {"type": "integer"}}, "items": {"$ref": "#/definitions/n"}}), &uri)
        .unwrap();
    assert_eq!(graph.root().location().document, uri);
    let n = graph.root().definition("n").unwrap();
    assert_eq!(n.location().canonical_uri(), "http://example.com/schemas/item.json#/definitions/n");
}

#[test]
fn test_default_draft_option() {
    let loader = SchemaLoader::with_options(LoaderOptions::default().default_draft(Draft::Draft3));
    let graph = loader.load(&json!({"properties": {"a": {"required": true}}})).unwrap();
    assert_eq!(graph.root().draft(), Draft::Draft3);
    assert!(graph.report().is_empty());
}

// =============================================================================
// Equality
// =============================================================================

#[test]
fn test_equality_ignores_location() {
    let graph = SchemaLoader::new()
        .load(&json!({
            "definitions": {"a": {"type": "string", "minLength": 1}},
            "properties": {
                "x": {"$ref": "#/definitions/a"},
                "y": {"type": "string", "minLength": 1},
                "z": {"type": "string", "minLength": 2}
            }
        }))
        .unwrap();
    let root = graph.root();
    let x = root.property("x").unwrap().reference().unwrap();
    let y = root.property("y").unwrap();
    let z = root.property("z").unwrap();
    assert_ne!(x.location(), y.location());
    assert_eq!(x, y);
    assert_ne!(y, z);

    let set: HashSet<_> = [x, y].into_iter().collect();
    assert_eq!(set.len(), 1);
}

#[test]
fn test_reloading_yields_equal_graphs() {
    for text in [
        include_str!("fixtures/person.json"),
        include_str!("fixtures/tree.json"),
        include_str!("fixtures/draft3_product.json"),
    ] {
        let schema = fixture(text);
        let first = SchemaLoader::new().load(&schema).unwrap();
        let second = SchemaLoader::new().load(&schema).unwrap();
        assert_eq!(first.root(), second.root());
    }
}

#[test]
fn test_cyclic_graphs_compare_structurally() {
    let tree = fixture(include_str!("fixtures/tree.json"));
    let mut changed = tree.clone();
    changed["properties"]["value"]["type"] = json!("string");

    let a = SchemaLoader::new().load(&tree).unwrap();
    let b = SchemaLoader::new().load(&changed).unwrap();
    assert_ne!(a.root(), b.root());
}
