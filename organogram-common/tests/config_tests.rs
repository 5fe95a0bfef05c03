//! Unit tests for configuration loading and graceful degradation
//!
//! Note: Uses serial_test crate to prevent ENV variable race conditions.
//! Tests that manipulate ORGANOGRAM_CONFIG are marked with #[serial].

use chrono::NaiveDate;
use organogram_common::config::{ConfigResolver, TomlConfig, CONFIG_ENV_VAR};
use organogram_common::Error;
use serial_test::serial;
use std::env;
use std::io::Write;
use tempfile::NamedTempFile;

#[test]
fn test_defaults() {
    let config = TomlConfig::default();

    assert_eq!(config.logging.level, "info");
    assert!(config.logging.file.is_none());
    assert_eq!(config.linked_data.fetch_attempts, 3);
    assert_eq!(config.validation.max_walk_depth, 100);
    assert_eq!(
        config.validation.load_tier_until,
        NaiveDate::from_ymd_opt(2011, 3, 31).unwrap()
    );
    assert_eq!(
        config.validation.display_tier_until,
        NaiveDate::from_ymd_opt(2016, 9, 30).unwrap()
    );
    assert_eq!(config.validation.eliminated_status_exceptions, vec!["retired"]);
}

#[test]
fn test_empty_toml_uses_defaults() {
    let config = TomlConfig::from_toml_str("").unwrap();
    assert_eq!(config, TomlConfig::default());
}

#[test]
fn test_partial_toml_keeps_other_defaults() {
    let config = TomlConfig::from_toml_str(
        r#"
        [validation]
        display_tier_until = "2017-03-31"
        self_reporting_orgs = ["Cabinet Office"]

        [logging]
        level = "debug"
        "#,
    )
    .unwrap();

    assert_eq!(config.logging.level, "debug");
    assert_eq!(
        config.validation.display_tier_until,
        NaiveDate::from_ymd_opt(2017, 3, 31).unwrap()
    );
    assert_eq!(config.validation.self_reporting_orgs, vec!["Cabinet Office"]);
    assert_eq!(config.validation.max_walk_depth, 100);
    assert_eq!(config.linked_data.base_url, "http://reference.data.gov.uk");
}

#[test]
fn test_inverted_tier_cutoffs_rejected() {
    let result = TomlConfig::from_toml_str(
        r#"
        [validation]
        load_tier_until = "2018-03-31"
        display_tier_until = "2016-09-30"
        "#,
    );
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn test_zero_fetch_attempts_rejected() {
    let result = TomlConfig::from_toml_str(
        r#"
        [linked_data]
        fetch_attempts = 0
        "#,
    );
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn test_malformed_toml_is_an_error() {
    let result = TomlConfig::from_toml_str("[validation\nmax_walk_depth = ");
    assert!(matches!(result, Err(Error::Toml(_))));
}

#[test]
#[serial]
fn test_resolver_cli_path_wins_over_env() {
    let mut cli_file = NamedTempFile::new().unwrap();
    writeln!(cli_file, "[logging]\nlevel = \"warn\"").unwrap();
    let mut env_file = NamedTempFile::new().unwrap();
    writeln!(env_file, "[logging]\nlevel = \"trace\"").unwrap();

    env::set_var(CONFIG_ENV_VAR, env_file.path());
    let config = ConfigResolver::new(Some(cli_file.path().to_path_buf()))
        .resolve()
        .unwrap();
    env::remove_var(CONFIG_ENV_VAR);

    assert_eq!(config.logging.level, "warn");
}

#[test]
#[serial]
fn test_resolver_env_var() {
    let mut env_file = NamedTempFile::new().unwrap();
    writeln!(env_file, "[validation]\nmax_elimination_rounds = 4").unwrap();

    env::set_var(CONFIG_ENV_VAR, env_file.path());
    let config = ConfigResolver::new(None).resolve().unwrap();
    env::remove_var(CONFIG_ENV_VAR);

    assert_eq!(config.validation.max_elimination_rounds, 4);
}

#[test]
#[serial]
fn test_resolver_missing_explicit_file_is_an_error() {
    env::remove_var(CONFIG_ENV_VAR);
    let result = ConfigResolver::new(Some("/nonexistent/organogram/config.toml".into())).resolve();
    assert!(matches!(result, Err(Error::Config(_))));
}
