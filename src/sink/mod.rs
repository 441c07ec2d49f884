//! Destinations for formatted log entries.
//!
//! Every sink is safe to call concurrently. File-backed sinks serialize
//! access per absolute path through the process-wide [`FileLockRegistry`],
//! so separately constructed sinks aimed at one file never interleave.

pub mod console;
pub mod debug;
pub mod file;
pub mod lock_registry;
pub mod rolling;

pub use console::{ConsoleSink, ConsoleTarget};
pub use debug::DebugSink;
pub use file::FileSink;
pub use lock_registry::FileLockRegistry;
pub use rolling::{RollPolicy, RollingFileSink, RolloverPeriod};

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

use crate::domain::{ConfigError, LogEntry, LogLevel};
use crate::format::{FormatError, LogFormatter, TemplateFormatter};

/// Default write timeout for console and debug sinks.
pub const DEFAULT_STREAM_TIMEOUT: Duration = Duration::from_secs(1);
/// Default write timeout for file sinks.
pub const DEFAULT_FILE_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("Formatting failed: {0}")]
    Format(#[from] FormatError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Write deadline passed before the entry was written")]
    DeadlineExceeded,

    #[error("Write worker failed: {0}")]
    Worker(String),

    #[error("{0}")]
    Other(String),
}

#[async_trait]
pub trait LogSink: Send + Sync {
    fn name(&self) -> &str;

    /// Entries below this level are never sent to the sink.
    fn level(&self) -> LogLevel;

    fn timeout(&self) -> Duration;

    /// Emits one entry. `deadline` is when the dispatcher stops waiting;
    /// implementations that cannot be cancelled mid-flight should check it
    /// before producing output.
    async fn write(&self, entry: &LogEntry, deadline: Instant) -> Result<(), SinkError>;
}

/// Settings shared by every stock sink.
#[derive(Clone)]
pub struct SinkSettings {
    name: String,
    level: LogLevel,
    timeout: Duration,
    formatter: Arc<dyn LogFormatter>,
}

impl SinkSettings {
    pub fn new(
        name: impl Into<String>,
        level: LogLevel,
        timeout: Duration,
        formatter: Arc<dyn LogFormatter>,
    ) -> Result<Self, ConfigError> {
        if !level.is_defined() {
            return Err(ConfigError::InvalidLevel(format!("{level:?}")));
        }

        Ok(Self {
            name: name.into(),
            level,
            timeout,
            formatter,
        })
    }

    /// Settings using the default template.
    pub fn with_default_template(
        name: impl Into<String>,
        level: LogLevel,
        timeout: Duration,
    ) -> Result<Self, ConfigError> {
        let formatter = TemplateFormatter::with_default_template()
            .map_err(|e| ConfigError::Template(e.to_string()))?;
        Self::new(name, level, timeout, Arc::new(formatter))
    }

    /// Replaces the timeout with a signed millisecond value, rejecting negatives.
    pub fn timeout_millis(mut self, millis: i64) -> Result<Self, ConfigError> {
        self.timeout = timeout_from_millis(millis)?;
        Ok(self)
    }

    pub fn formatter(mut self, formatter: Arc<dyn LogFormatter>) -> Self {
        self.formatter = formatter;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn level(&self) -> LogLevel {
        self.level
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn render(&self, entry: &LogEntry) -> Result<String, FormatError> {
        self.formatter.format(entry)
    }
}

impl std::fmt::Debug for SinkSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SinkSettings")
            .field("name", &self.name)
            .field("level", &self.level)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

pub fn timeout_from_millis(millis: i64) -> Result<Duration, ConfigError> {
    u64::try_from(millis)
        .map(Duration::from_millis)
        .map_err(|_| ConfigError::NegativeTimeout(millis))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_unset_level() {
        let result = SinkSettings::with_default_template("x", LogLevel::NotSet, DEFAULT_STREAM_TIMEOUT);
        assert!(matches!(result, Err(ConfigError::InvalidLevel(_))));
    }

    #[test]
    fn test_negative_timeout_rejected() {
        let settings =
            SinkSettings::with_default_template("x", LogLevel::Info, DEFAULT_STREAM_TIMEOUT).unwrap();
        assert!(matches!(
            settings.clone().timeout_millis(-1),
            Err(ConfigError::NegativeTimeout(-1))
        ));
        assert_eq!(
            settings.timeout_millis(250).unwrap().timeout(),
            Duration::from_millis(250)
        );
    }
}
