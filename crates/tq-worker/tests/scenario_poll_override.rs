//! Scenario: Worker settings resolution
//!
//! # Invariants under test
//!
//! 1. No config paths ⇒ every default (100 ms, TQ_DATABASE_URL, 10, 5s).
//! 2. Later files override earlier ones; `--poll-ms` overrides both.
//! 3. Unknown keys are reported, not fatal.
//! 4. The config hash ignores the CLI override (it hashes files only).

use std::io::Write;
use std::time::Duration;

use tq_worker::load_worker_config;

fn yaml_file(contents: &str) -> tempfile::NamedTempFile {
    let mut f = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
    f.write_all(contents.as_bytes()).unwrap();
    f
}

fn path(f: &tempfile::NamedTempFile) -> String {
    f.path().to_string_lossy().into_owned()
}

#[test]
fn no_paths_yields_defaults() {
    let (_, cfg) = load_worker_config(&[], None).unwrap();
    assert_eq!(cfg.poll_interval(), Duration::from_millis(100));
    assert_eq!(cfg.db.url_env, "TQ_DATABASE_URL");
    assert_eq!(cfg.db.max_connections, 10);
    assert_eq!(cfg.acquire_timeout(), Duration::from_secs(5));
}

#[test]
fn cli_poll_beats_layered_files() {
    let base = yaml_file("worker:\n  poll_interval_ms: 100\ndb:\n  max_connections: 4\n");
    let local = yaml_file("worker:\n  poll_interval_ms: 500\n");
    let paths = vec![path(&base), path(&local)];

    let (loaded_a, cfg) = load_worker_config(&paths, None).unwrap();
    assert_eq!(cfg.worker.poll_interval_ms, 500);
    assert_eq!(cfg.db.max_connections, 4);

    let (loaded_b, cfg) = load_worker_config(&paths, Some(20)).unwrap();
    assert_eq!(cfg.worker.poll_interval_ms, 20);
    assert_eq!(loaded_a.config_hash, loaded_b.config_hash);
}

#[test]
fn unknown_keys_are_not_fatal() {
    let f = yaml_file("worker:\n  poll_interval_ms: 100\n  batch_size: 50\n");
    let (_, cfg) = load_worker_config(&[path(&f)], None).unwrap();
    assert_eq!(cfg.worker.poll_interval_ms, 100);
}

#[test]
fn zero_override_is_rejected() {
    let err = load_worker_config(&[], Some(0)).unwrap_err();
    assert!(format!("{err:#}").contains("poll_interval_ms"), "got: {err:#}");
}
