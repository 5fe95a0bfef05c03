//! Configuration loading and config file resolution
//!
//! Every section has compiled defaults, so a missing or partial TOML file
//! never stops a run. A missing file is logged and the defaults are used.

use crate::{Error, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "ORGANOGRAM_CONFIG";

/// Top-level configuration loaded from TOML
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Linked-data service settings (optional)
    #[serde(default)]
    pub linked_data: LinkedDataConfig,

    /// Validation strictness and repair limits (optional)
    #[serde(default)]
    pub validation: ValidationConfig,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

/// Linked-data query service settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkedDataConfig {
    /// Base URL, e.g. http://reference.data.gov.uk
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Attempts per fetch (immediate retry, no backoff)
    #[serde(default = "default_fetch_attempts")]
    pub fetch_attempts: u32,
}

impl Default for LinkedDataConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            fetch_attempts: default_fetch_attempts(),
        }
    }
}

/// Validation strictness and repair limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Periods on or before this date are validated at the "load" tier
    #[serde(default = "default_load_tier_until")]
    pub load_tier_until: NaiveDate,

    /// Periods on or before this date (and after `load_tier_until`) are
    /// validated at the "load and display" tier. Later periods are strict.
    #[serde(default = "default_display_tier_until")]
    pub display_tier_until: NaiveDate,

    /// Maximum steps when following reports-to links up to a root
    #[serde(default = "default_max_walk_depth")]
    pub max_walk_depth: usize,

    /// Maximum rounds of eliminated-post repair
    #[serde(default = "default_max_elimination_rounds")]
    pub max_elimination_rounds: usize,

    /// Statuses accepted in addition to "eliminated" for a missing boss
    #[serde(default = "default_eliminated_status_exceptions")]
    pub eliminated_status_exceptions: Vec<String>,

    /// Organisations whose top post reports to its own reference
    #[serde(default)]
    pub self_reporting_orgs: Vec<String>,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            load_tier_until: default_load_tier_until(),
            display_tier_until: default_display_tier_until(),
            max_walk_depth: default_max_walk_depth(),
            max_elimination_rounds: default_max_elimination_rounds(),
            eliminated_status_exceptions: default_eliminated_status_exceptions(),
            self_reporting_orgs: Vec::new(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_base_url() -> String {
    "http://reference.data.gov.uk".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_fetch_attempts() -> u32 {
    3
}

fn default_load_tier_until() -> NaiveDate {
    NaiveDate::from_ymd_opt(2011, 3, 31).unwrap_or_default()
}

fn default_display_tier_until() -> NaiveDate {
    NaiveDate::from_ymd_opt(2016, 9, 30).unwrap_or_default()
}

fn default_max_walk_depth() -> usize {
    100
}

fn default_max_elimination_rounds() -> usize {
    10
}

fn default_eliminated_status_exceptions() -> Vec<String> {
    vec!["retired".to_string()]
}

impl TomlConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: TomlConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    /// Reject settings that would make validation meaningless
    pub fn validate(&self) -> Result<()> {
        let v = &self.validation;
        if v.load_tier_until > v.display_tier_until {
            return Err(Error::Config(format!(
                "validation.load_tier_until ({}) is after validation.display_tier_until ({})",
                v.load_tier_until, v.display_tier_until
            )));
        }
        if v.max_walk_depth == 0 {
            return Err(Error::Config("validation.max_walk_depth must be > 0".to_string()));
        }
        if self.linked_data.fetch_attempts == 0 {
            return Err(Error::Config("linked_data.fetch_attempts must be > 0".to_string()));
        }
        Ok(())
    }
}

/// Config file resolution following priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable `ORGANOGRAM_CONFIG`
/// 3. User config directory (`<config_dir>/organogram/config.toml`)
/// 4. Compiled defaults (fallback)
pub struct ConfigResolver {
    cli_path: Option<PathBuf>,
}

impl ConfigResolver {
    pub fn new(cli_path: Option<PathBuf>) -> Self {
        Self { cli_path }
    }

    /// Path of the config file to read, if any exists
    pub fn config_path(&self) -> Option<PathBuf> {
        if let Some(path) = &self.cli_path {
            return Some(path.clone());
        }

        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            if !path.trim().is_empty() {
                return Some(PathBuf::from(path));
            }
        }

        dirs::config_dir()
            .map(|d| d.join("organogram").join("config.toml"))
            .filter(|p| p.exists())
    }

    /// Resolve and load the configuration.
    ///
    /// An explicitly named file (CLI or environment) that cannot be read is
    /// an error. No file at all means compiled defaults.
    pub fn resolve(&self) -> Result<TomlConfig> {
        match self.config_path() {
            Some(path) if path.exists() => {
                info!("Loading config from {}", path.display());
                TomlConfig::load(&path)
            }
            Some(path) => Err(Error::Config(format!(
                "Config file not found: {}",
                path.display()
            ))),
            None => {
                warn!("No config file found, using compiled defaults");
                Ok(TomlConfig::default())
            }
        }
    }
}
