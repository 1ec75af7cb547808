//! Unit tests for configuration resolution and graceful degradation
//!
//! - Missing TOML files never cause a failure
//! - Priority order: CLI > environment > platform default > compiled defaults
//!
//! Note: Uses serial_test to prevent ENV variable races. Tests that touch
//! CADENCE_CONFIG are marked with #[serial].

use cadence_common::config::{
    load_or_default, load_toml, resolve_config_path, ConfigSource, LoggingConfig, CONFIG_ENV_VAR,
};
use serde::Deserialize;
use serial_test::serial;
use std::env;
use std::path::PathBuf;
use tempfile::TempDir;

#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
struct SampleConfig {
    logging: LoggingConfig,
    name: String,
}

#[test]
#[serial]
fn test_cli_argument_wins_over_environment() {
    env::set_var(CONFIG_ENV_VAR, "/from/env.toml");

    let cli = PathBuf::from("/from/cli.toml");
    let source = resolve_config_path(Some(&cli), CONFIG_ENV_VAR);
    assert_eq!(source, ConfigSource::CommandLine(cli));

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_environment_used_without_cli() {
    env::set_var(CONFIG_ENV_VAR, "/from/env.toml");

    let source = resolve_config_path(None, CONFIG_ENV_VAR);
    assert_eq!(source, ConfigSource::Environment(PathBuf::from("/from/env.toml")));

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_blank_environment_is_ignored() {
    env::set_var(CONFIG_ENV_VAR, "   ");

    let source = resolve_config_path(None, CONFIG_ENV_VAR);
    assert!(!matches!(source, ConfigSource::Environment(_)));

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
fn test_missing_file_degrades_to_defaults() {
    let source = ConfigSource::CommandLine(PathBuf::from("/definitely/not/here/cadence.toml"));
    let config: SampleConfig = load_or_default(&source).unwrap();
    assert_eq!(config, SampleConfig::default());
    assert_eq!(config.logging.level, "info");
}

#[test]
fn test_compiled_defaults_source_has_no_path() {
    assert!(ConfigSource::CompiledDefaults.path().is_none());
    let config: SampleConfig = load_or_default(&ConfigSource::CompiledDefaults).unwrap();
    assert_eq!(config, SampleConfig::default());
}

#[test]
fn test_present_file_is_loaded() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "name = \"living room\"\n[logging]\nlevel = \"debug\"\n").unwrap();

    let config: SampleConfig = load_or_default(&ConfigSource::CommandLine(path.clone())).unwrap();
    assert_eq!(config.name, "living room");
    assert_eq!(config.logging.level, "debug");

    let direct: SampleConfig = load_toml(&path).unwrap();
    assert_eq!(direct, config);
}

#[test]
fn test_broken_file_is_reported() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "name = [unterminated").unwrap();

    let result: cadence_common::Result<SampleConfig> =
        load_or_default(&ConfigSource::CommandLine(path));
    match result {
        Err(cadence_common::Error::Config(msg)) => assert!(msg.contains("config.toml")),
        other => panic!("Expected Config error, got {:?}", other),
    }
}
