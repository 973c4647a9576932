//! Tests for bootstrap configuration loading and setting resolution
//!
//! Note: Uses serial_test crate to prevent ENV variable race conditions.
//! Tests that manipulate SPINSCAN_* variables are marked with #[serial].

use serial_test::serial;
use spinscan_common::config::{
    load_toml_config, resolve_config_path, resolve_setting, SettingSource,
    CONFIG_PATH_ENV_VAR, DEFAULT_PORT,
};
use std::env;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

#[test]
fn test_missing_config_file_uses_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("does-not-exist.toml");

    let config = load_toml_config(&path).expect("missing file must not be an error");
    assert_eq!(config.port, DEFAULT_PORT);
    assert_eq!(config.logging.level, "info");
}

#[test]
fn test_invalid_config_file_is_error() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.toml");
    std::fs::write(&path, "port = \"not a number\"\n").unwrap();

    let result = load_toml_config(&path);
    assert!(result.is_err(), "Malformed TOML should be a config error");
}

#[test]
fn test_load_config_sections() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
port = 6123

[logging]
level = "debug"

[vision]
endpoint = "http://localhost:9000/extract"

[discogs]
requests_per_second = 2
"#,
    )
    .unwrap();

    let loaded = load_toml_config(&path).unwrap();
    assert_eq!(loaded.port, 6123);
    assert_eq!(loaded.logging.level, "debug");
    assert_eq!(
        loaded.vision.endpoint.as_deref(),
        Some("http://localhost:9000/extract")
    );
    assert_eq!(loaded.discogs.requests_per_second, Some(2));
    assert!(loaded.pipeline.is_empty());
}

#[test]
#[serial]
fn test_config_path_cli_beats_env() {
    env::set_var(CONFIG_PATH_ENV_VAR, "/tmp/spinscan-env.toml");

    let resolved = resolve_config_path(Some(Path::new("/tmp/spinscan-cli.toml")));
    assert_eq!(resolved, Some(PathBuf::from("/tmp/spinscan-cli.toml")));

    env::remove_var(CONFIG_PATH_ENV_VAR);
}

#[test]
#[serial]
fn test_config_path_from_env() {
    env::set_var(CONFIG_PATH_ENV_VAR, "/tmp/spinscan-env.toml");

    let resolved = resolve_config_path(None);
    assert_eq!(resolved, Some(PathBuf::from("/tmp/spinscan-env.toml")));

    env::remove_var(CONFIG_PATH_ENV_VAR);
}

#[test]
#[serial]
fn test_resolve_setting_priority() {
    let var = "SPINSCAN_TEST_TOKEN";
    env::set_var(var, "env-token");

    let (value, source) = resolve_setting("Test token", Some("cli-token"), var, Some("toml-token")).unwrap();
    assert_eq!(value, "cli-token");
    assert_eq!(source, SettingSource::CommandLine);

    let (value, source) = resolve_setting("Test token", None, var, Some("toml-token")).unwrap();
    assert_eq!(value, "env-token");
    assert_eq!(source, SettingSource::Environment);

    env::remove_var(var);

    let (value, source) = resolve_setting("Test token", None, var, Some("toml-token")).unwrap();
    assert_eq!(value, "toml-token");
    assert_eq!(source, SettingSource::Toml);
}

#[test]
#[serial]
fn test_resolve_setting_ignores_blank_values() {
    let var = "SPINSCAN_TEST_BLANK";
    env::set_var(var, "   ");

    let resolved = resolve_setting("Blank", Some(""), var, Some("  fallback  "));
    let (value, source) = resolved.unwrap();
    assert_eq!(value, "fallback");
    assert_eq!(source, SettingSource::Toml);

    env::remove_var(var);
    assert!(resolve_setting("Blank", None, var, None).is_none());
}
