//! Configuration tests
//!
//! The round-trip tests guard the TOML template: when a field is added to
//! `Config`, `to_toml()` and `FileConfig` must learn about it together.

use super::*;
use std::collections::HashMap;

fn no_env(_: &str) -> Option<String> {
    None
}

fn parse(toml_str: &str) -> FileConfig {
    match toml::from_str(toml_str) {
        Ok(file) => file,
        Err(e) => panic!("config should parse.\nTOML:\n{}\nError: {}", toml_str, e),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Round-trip tests
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_config_roundtrip_default() {
    let config = Config::default();
    let resolved = Config::resolve(parse(&config.to_toml()), no_env);

    assert_eq!(resolved.catalog_path, None);
    assert_eq!(resolved.default_limit, DEFAULT_LIMIT);
    assert!(resolved.plugin_locations.is_empty());
    assert!(resolved.scan.recursive);
    assert_eq!(resolved.scan.batch_size, crate::scan::DEFAULT_BATCH_SIZE);
    assert_eq!(resolved.logging.level, "info");
    assert_eq!(resolved.logging.file_rotation, LogRotation::Daily);
}

#[test]
fn test_config_roundtrip_custom() {
    let mut config = Config::default();
    config.catalog_path = Some(PathBuf::from("/data/dinos.lattice"));
    config.default_limit = 50;
    config.plugin_locations = vec!["/opt/traits".to_string(), r"C:\traits".to_string()];
    config.scan.recursive = false;
    config.scan.batch_size = 64;
    config.logging.file_enabled = true;
    config.logging.file_rotation = LogRotation::Hourly;

    let resolved = Config::resolve(parse(&config.to_toml()), no_env);

    assert_eq!(resolved.catalog_path, config.catalog_path);
    assert_eq!(resolved.default_limit, 50);
    assert_eq!(resolved.plugin_locations, config.plugin_locations);
    assert!(!resolved.scan.recursive);
    assert_eq!(resolved.scan.batch_size, 64);
    assert!(resolved.logging.file_enabled);
    assert_eq!(resolved.logging.file_rotation, LogRotation::Hourly);
}

// ─────────────────────────────────────────────────────────────────────────────
// Precedence
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_env_overrides_file() {
    let file = parse(
        r#"
        catalog_path = "/from/file.lattice"
        default_limit = 10

        [logging]
        level = "warn"
        "#,
    );
    let env: HashMap<&str, &str> = [
        (ENV_CATALOG, "/from/env.lattice"),
        (ENV_LIMIT, "25"),
        (ENV_LOG, "debug"),
    ]
    .into_iter()
    .collect();

    let config = Config::resolve(file, |key| env.get(key).map(|v| v.to_string()));

    assert_eq!(config.catalog_path, Some(PathBuf::from("/from/env.lattice")));
    assert_eq!(config.default_limit, 25);
    assert_eq!(config.logging.level, "debug");
}

#[test]
fn test_unparsable_env_limit_falls_back_to_file() {
    let file = parse("default_limit = 10");
    let config = Config::resolve(file, |key| (key == ENV_LIMIT).then(|| "lots".to_string()));
    assert_eq!(config.default_limit, 10);
}

#[test]
fn test_partial_sections_use_defaults() {
    let config = Config::resolve(parse("[scan]\nbatch_size = 0\n"), no_env);
    assert!(config.scan.recursive);
    assert_eq!(config.scan.batch_size, 1);
    assert_eq!(config.logging.file_prefix, "lattice");
}

#[test]
fn test_unknown_rotation_is_daily() {
    assert_eq!(LogRotation::parse("weekly"), LogRotation::Daily);
    assert_eq!(LogRotation::parse("HOURLY"), LogRotation::Hourly);
}

// ─────────────────────────────────────────────────────────────────────────────
// Files
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_missing_file_is_empty_config() {
    let dir = tempfile::tempdir().unwrap();
    let file = Config::load_file_config(&dir.path().join("config.toml")).unwrap();
    assert!(file.catalog_path.is_none());
}

#[test]
fn test_broken_file_is_configuration_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[scan\nrecursive = maybe").unwrap();

    let err = Config::load_file_config(&path).unwrap_err();
    assert!(matches!(err, LatticeError::Configuration(_)));
}
