//! Scenario: Config hash stability
//!
//! GREEN when:
//! - Loading the same documents twice yields the same hash.
//! - Reordering keys within YAML doesn't change the hash (canonicalization).
//! - Different values produce different hashes.
//! - Overlays take effect and hash stably.

use tq_config::load_layered_yaml_from_strings;

const BASE_YAML: &str = r#"
worker:
  poll_interval_ms: 100
db:
  url_env: "TQ_DATABASE_URL"
  max_connections: 10
"#;

const BASE_YAML_REORDERED: &str = r#"
db:
  max_connections: 10
  url_env: "TQ_DATABASE_URL"
worker:
  poll_interval_ms: 100
"#;

const OVERLAY_YAML: &str = r#"
worker:
  poll_interval_ms: 2500
"#;

#[test]
fn same_input_produces_identical_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();

    assert_eq!(a.config_hash, b.config_hash);
    assert_eq!(a.canonical_json, b.canonical_json);
}

#[test]
fn reordered_keys_produce_same_hash() {
    let original = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let reordered = load_layered_yaml_from_strings(&[BASE_YAML_REORDERED]).unwrap();

    assert_eq!(
        original.config_hash, reordered.config_hash,
        "reordering keys in YAML must not change the hash"
    );
}

#[test]
fn different_values_produce_different_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML, OVERLAY_YAML]).unwrap();

    assert_ne!(a.config_hash, b.config_hash);
}

#[test]
fn overlay_overrides_base_and_keeps_siblings() {
    let merged = load_layered_yaml_from_strings(&[BASE_YAML, OVERLAY_YAML]).unwrap();

    let poll = merged
        .config_json
        .pointer("/worker/poll_interval_ms")
        .and_then(|v| v.as_u64())
        .unwrap();
    assert_eq!(poll, 2500, "overlay must override base poll interval");

    let url_env = merged
        .config_json
        .pointer("/db/url_env")
        .and_then(|v| v.as_str())
        .unwrap();
    assert_eq!(url_env, "TQ_DATABASE_URL", "untouched keys survive the merge");
}

#[test]
fn hash_is_64_hex_chars() {
    let loaded = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();

    assert_eq!(loaded.config_hash.len(), 64);
    assert!(loaded.config_hash.chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn empty_document_is_no_overrides() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML, ""]).unwrap();

    assert_eq!(a.config_hash, b.config_hash);
}
