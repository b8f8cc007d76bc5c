//! Configuration and CLI Tests

use serde_json::json;
use std::fs;
use std::process::Command;

use familiar_jsonschema::{Draft, JsonSchema, ValidatorConfig};

const PERSON: &str = include_str!("fixtures/person.json");

// =============================================================================
// Configuration
// =============================================================================

#[test]
fn test_config_file_overrides_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("custom.toml");
    fs::write(
        &path,
        r#"
[loader]
strict = true
default_draft = "draft4"

[fetch]
allow_file = false
retries = 0

[validation]
formats = false
"#,
    )
    .unwrap();

    let config = ValidatorConfig::load_from(Some(path.to_str().unwrap())).unwrap();
    assert!(config.loader.strict);
    assert_eq!(config.loader.default_draft, Draft::Draft4);
    assert!(!config.fetch.allow_file);
    assert_eq!(config.fetch.retries, 0);
    assert_eq!(config.fetch.timeout_ms, 5000);
    assert!(!config.validation.formats);

    let options = config.loader_options().unwrap();
    assert!(options.strict);
    assert_eq!(options.default_draft, Draft::Draft4);
    assert!(!config.compile_options().validate_formats);
}

#[test]
fn test_missing_explicit_config_is_an_error() {
    assert!(ValidatorConfig::load_from(Some("/definitely/not/here/jsonschema.toml")).is_err());
}

#[test]
fn test_save_and_reload() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("saved.toml");

    let mut config = ValidatorConfig::default();
    config.loader.default_draft = Draft::Draft3;
    config.fetch.timeout_ms = 250;
    config.save(path.to_str().unwrap()).unwrap();

    let reloaded = ValidatorConfig::load_from(Some(path.to_str().unwrap())).unwrap();
    assert_eq!(reloaded.loader.default_draft, Draft::Draft3);
    assert_eq!(reloaded.fetch.timeout_ms, 250);
}

#[test]
fn test_build_loader_preloads_schema_dirs() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("person.json"), PERSON).unwrap();

    let mut config = ValidatorConfig::default();
    config.loader.schema_dirs = vec![dir.path().to_path_buf()];
    let loader = config.build_loader().unwrap();
    assert_eq!(loader.preloaded(), 1);

    let person = url::Url::from_file_path(fs::canonicalize(dir.path().join("person.json")).unwrap()).unwrap();
    let graph = loader.load(&json!({"$ref": person.as_str()})).unwrap();
    let compiled = JsonSchema::from_graph(graph).unwrap();
    assert!(compiled.is_valid(&json!({"name": "Ada", "email": "ada@example.com"})));
    assert!(!compiled.is_valid(&json!({"name": "Ada"})));
}

#[test]
fn test_environment_overrides() {
    std::env::set_var("JSONSCHEMA__LOGGING__FILTER", "familiar_jsonschema=trace");
    let config = ValidatorConfig::load_from(None);
    std::env::remove_var("JSONSCHEMA__LOGGING__FILTER");
    assert_eq!(config.unwrap().logging.filter, "familiar_jsonschema=trace");
}

// =============================================================================
// CLI
// =============================================================================

fn cli() -> Command {
    Command::new(env!("CARGO_BIN_EXE_schema-validator"))
}

#[test]
fn test_cli_check_and_validate() {
    let dir = tempfile::tempdir().unwrap();
    let schema = dir.path().join("person.json");
    let good = dir.path().join("good.json");
    let bad = dir.path().join("bad.json");
    fs::write(&schema, PERSON).unwrap();
    fs::write(&good, r#"{"name": "Ada", "email": "ada@example.com"}"#).unwrap();
    fs::write(&bad, r#"{"name": "Ada", "email": "ada@example.com", "age": -3}"#).unwrap();

    let status = cli().arg("check").arg(&schema).status().unwrap();
    assert!(status.success());

    let status = cli().arg("validate").arg(&schema).arg(&good).status().unwrap();
    assert!(status.success());

    let output = cli().arg("validate").arg("--json").arg(&schema).arg(&good).arg(&bad).output().unwrap();
    assert_eq!(output.status.code(), Some(1));
    let results: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(results[0]["valid"], true);
    assert_eq!(results[1]["valid"], false);
    assert_eq!(results[1]["error"]["pointer"], "#/age");
    assert_eq!(results[1]["error"]["keyword"], "minimum");
}

#[test]
fn test_cli_reports_loading_failure() {
    let dir = tempfile::tempdir().unwrap();
    let schema = dir.path().join("broken.json");
    fs::write(&schema, include_str!("fixtures/invalid_keywords.json")).unwrap();

    let output = cli().arg("check").arg("--strict").arg(&schema).output().unwrap();
    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("keyword.unknown"));
}
