use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::error::ConfigError;

/// Severity of a log entry.
///
/// Variants are ordered: `Debug < Info < Warn < Error < Fatal < Audit`.
/// `NotSet` is the unset sentinel; it sorts below every real level and is
/// rejected for any entry that is actually dispatched.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    #[default]
    NotSet = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
    Fatal = 5,
    Audit = 6,
}

impl LogLevel {
    /// Every level a dispatched entry may carry, lowest first.
    pub const DEFINED: [LogLevel; 6] = [
        LogLevel::Debug,
        LogLevel::Info,
        LogLevel::Warn,
        LogLevel::Error,
        LogLevel::Fatal,
        LogLevel::Audit,
    ];

    pub fn is_defined(self) -> bool {
        self != LogLevel::NotSet
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::NotSet => "NotSet",
            LogLevel::Debug => "Debug",
            LogLevel::Info => "Info",
            LogLevel::Warn => "Warn",
            LogLevel::Error => "Error",
            LogLevel::Fatal => "Fatal",
            LogLevel::Audit => "Audit",
        }
    }

    pub fn as_tracing_level(self) -> tracing::Level {
        match self {
            LogLevel::NotSet | LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info | LogLevel::Audit => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error | LogLevel::Fatal => tracing::Level::ERROR,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" => Ok(LogLevel::Debug),
            "info" | "information" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            "fatal" => Ok(LogLevel::Fatal),
            "audit" => Ok(LogLevel::Audit),
            _ => Err(ConfigError::InvalidLevel(s.to_string())),
        }
    }
}

impl TryFrom<u8> for LogLevel {
    type Error = ConfigError;

    fn try_from(value: u8) -> Result<Self, ConfigError> {
        match value {
            1 => Ok(LogLevel::Debug),
            2 => Ok(LogLevel::Info),
            3 => Ok(LogLevel::Warn),
            4 => Ok(LogLevel::Error),
            5 => Ok(LogLevel::Fatal),
            6 => Ok(LogLevel::Audit),
            other => Err(ConfigError::InvalidLevel(other.to_string())),
        }
    }
}
