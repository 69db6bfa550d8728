//! Error types for Danmaku Pulse

use thiserror::Error;

/// Errors that can occur around an analysis run.
///
/// Per-record defects inside the event stream are never errors; they are
/// skipped during aggregation and surfaced by validation as issues.
#[derive(Debug, Error)]
pub enum ComputeError {
    #[error("Failed to parse event stream: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Invalid analysis run: {0}")]
    InvalidRun(String),

    #[error("Invalid bucket width: {0} (must be a positive number of seconds)")]
    InvalidBucketWidth(u32),
}
