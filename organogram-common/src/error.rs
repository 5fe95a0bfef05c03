//! Common error types for the organogram tools

use thiserror::Error;

/// Common result type for organogram operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the organogram crates
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encode/decode error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML config parse error
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Row or field shape problems. Always fatal for one organisation-period.
    #[error("Ingestion failed with {} error(s): {}", .0.len(), .0.join("; "))]
    Ingestion(Vec<String>),

    /// No post reports to "XX", so the tree cannot be displayed at all
    #[error("Fatal validation error: {0}")]
    NoRoot(String),

    /// Outbound fetch that never succeeded
    #[error("Fetch error: {0}")]
    Fetch(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

