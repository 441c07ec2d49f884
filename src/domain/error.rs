use std::path::PathBuf;
use thiserror::Error;

use super::log_level::LogLevel;

/// Construction and validation failures. These are not recoverable and are
/// surfaced to whoever is assembling the pipeline.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid log level '{0}'")]
    InvalidLevel(String),

    #[error("Timeout must not be negative (got {0}ms)")]
    NegativeTimeout(i64),

    #[error("{field} must be between {min} and {max} (got {value})")]
    OutOfRange {
        field: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to prepare log directory {path}: {source}")]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("File error: {0}")]
    FileError(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Environment error: {0}")]
    EnvError(String),

    #[error("Template error: {0}")]
    Template(String),

    #[error("No async runtime available: {0}")]
    NoRuntime(String),
}

/// Errors returned by the logger gate.
///
/// Sink failures never show up here; they go to the error handler.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LogError {
    #[error("Log entry carries an unset or undefined level ({0:?})")]
    InvalidLevel(LogLevel),
}
