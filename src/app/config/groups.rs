use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::dispatch::{RetryConfig, RetryStrategy};
use crate::domain::{ConfigError, LogLevel};
use crate::format::{DEFAULT_TEMPLATE, LogFormatter, TemplateFormatter};
use crate::sink::rolling::{DEFAULT_MAX_ARCHIVE_COUNT, DEFAULT_MAX_FILE_SIZE_KILOBYTES};
use crate::sink::{
    ConsoleSink, ConsoleTarget, DEFAULT_FILE_TIMEOUT, DEFAULT_STREAM_TIMEOUT, DebugSink, FileSink,
    LogSink, RollPolicy, RollingFileSink, RolloverPeriod, SinkSettings, timeout_from_millis,
};

/// Which error handler the built logger starts with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorHandlerKind {
    #[default]
    Silent,
    Tracing,
    Retry,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    #[serde(with = "super::serde_helpers")]
    pub base_delay: Duration,
    #[serde(with = "super::serde_helpers")]
    pub max_delay: Duration,
    pub strategy: RetryStrategy,
    pub jitter: bool,
}

impl Default for RetrySettings {
    fn default() -> Self {
        let defaults = RetryConfig::default();
        Self {
            max_attempts: defaults.max_attempts,
            base_delay: defaults.base_delay,
            max_delay: defaults.max_delay,
            strategy: defaults.strategy,
            jitter: defaults.jitter,
        }
    }
}

impl From<&RetrySettings> for RetryConfig {
    fn from(settings: &RetrySettings) -> Self {
        Self {
            max_attempts: settings.max_attempts,
            base_delay: settings.base_delay,
            max_delay: settings.max_delay,
            strategy: settings.strategy,
            jitter: settings.jitter,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleStream {
    #[default]
    Stdout,
    Stderr,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleSinkConfig {
    pub name: Option<String>,
    pub level: LogLevel,
    pub timeout_ms: Option<i64>,
    pub template: Option<String>,
    pub stream: ConsoleStream,
}

impl Default for ConsoleSinkConfig {
    fn default() -> Self {
        Self {
            name: None,
            level: LogLevel::Debug,
            timeout_ms: None,
            template: None,
            stream: ConsoleStream::Stdout,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugSinkConfig {
    pub name: Option<String>,
    pub level: LogLevel,
    pub timeout_ms: Option<i64>,
    pub template: Option<String>,
}

impl Default for DebugSinkConfig {
    fn default() -> Self {
        Self {
            name: None,
            level: LogLevel::Debug,
            timeout_ms: None,
            template: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileSinkConfig {
    pub name: Option<String>,
    pub level: LogLevel,
    pub timeout_ms: Option<i64>,
    pub template: Option<String>,
    pub path: PathBuf,
}

impl Default for FileSinkConfig {
    fn default() -> Self {
        Self {
            name: None,
            level: LogLevel::Debug,
            timeout_ms: None,
            template: None,
            path: PathBuf::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RollingFileSinkConfig {
    pub name: Option<String>,
    pub level: LogLevel,
    pub timeout_ms: Option<i64>,
    pub template: Option<String>,
    pub path: PathBuf,
    pub max_file_size_kilobytes: i64,
    pub max_archive_count: usize,
    pub rollover_period: RolloverPeriod,
}

impl Default for RollingFileSinkConfig {
    fn default() -> Self {
        Self {
            name: None,
            level: LogLevel::Debug,
            timeout_ms: None,
            template: None,
            path: PathBuf::new(),
            max_file_size_kilobytes: DEFAULT_MAX_FILE_SIZE_KILOBYTES,
            max_archive_count: DEFAULT_MAX_ARCHIVE_COUNT,
            rollover_period: RolloverPeriod::Never,
        }
    }
}

/// One `[[sinks]]` table, discriminated by its `type` key.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SinkConfig {
    Console(ConsoleSinkConfig),
    Debug(DebugSinkConfig),
    File(FileSinkConfig),
    RollingFile(RollingFileSinkConfig),
}

impl SinkConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            SinkConfig::Console(_) => "console",
            SinkConfig::Debug(_) => "debug",
            SinkConfig::File(_) => "file",
            SinkConfig::RollingFile(_) => "rolling_file",
        }
    }

    pub fn level(&self) -> LogLevel {
        match self {
            SinkConfig::Console(c) => c.level,
            SinkConfig::Debug(c) => c.level,
            SinkConfig::File(c) => c.level,
            SinkConfig::RollingFile(c) => c.level,
        }
    }

    pub fn timeout_ms(&self) -> Option<i64> {
        match self {
            SinkConfig::Console(c) => c.timeout_ms,
            SinkConfig::Debug(c) => c.timeout_ms,
            SinkConfig::File(c) => c.timeout_ms,
            SinkConfig::RollingFile(c) => c.timeout_ms,
        }
    }

    pub fn template(&self) -> Option<&str> {
        match self {
            SinkConfig::Console(c) => c.template.as_deref(),
            SinkConfig::Debug(c) => c.template.as_deref(),
            SinkConfig::File(c) => c.template.as_deref(),
            SinkConfig::RollingFile(c) => c.template.as_deref(),
        }
    }

    /// Configured name, or `{kind}-{index}`.
    pub fn name(&self, index: usize) -> String {
        let configured = match self {
            SinkConfig::Console(c) => c.name.as_deref(),
            SinkConfig::Debug(c) => c.name.as_deref(),
            SinkConfig::File(c) => c.name.as_deref(),
            SinkConfig::RollingFile(c) => c.name.as_deref(),
        };
        configured
            .map(str::to_string)
            .unwrap_or_else(|| format!("{}-{index}", self.kind()))
    }

    fn default_timeout(&self) -> Duration {
        match self {
            SinkConfig::Console(_) | SinkConfig::Debug(_) => DEFAULT_STREAM_TIMEOUT,
            SinkConfig::File(_) | SinkConfig::RollingFile(_) => DEFAULT_FILE_TIMEOUT,
        }
    }

    pub fn build(&self, index: usize) -> Result<Arc<dyn LogSink>, ConfigError> {
        let timeout = match self.timeout_ms() {
            Some(millis) => timeout_from_millis(millis)?,
            None => self.default_timeout(),
        };
        let formatter = TemplateFormatter::new(self.template().unwrap_or(DEFAULT_TEMPLATE))
            .map_err(|e| ConfigError::Template(e.to_string()))?;
        let formatter: Arc<dyn LogFormatter> = Arc::new(formatter);
        let settings = SinkSettings::new(self.name(index), self.level(), timeout, formatter)?;

        let sink: Arc<dyn LogSink> = match self {
            SinkConfig::Console(c) => {
                let target = match c.stream {
                    ConsoleStream::Stdout => ConsoleTarget::Stdout,
                    ConsoleStream::Stderr => ConsoleTarget::Stderr,
                };
                Arc::new(ConsoleSink::with_target(settings, target))
            }
            SinkConfig::Debug(_) => Arc::new(DebugSink::new(settings)),
            SinkConfig::File(c) => Arc::new(FileSink::new(settings, &c.path)?),
            SinkConfig::RollingFile(c) => {
                let policy = RollPolicy::new(
                    c.max_file_size_kilobytes,
                    c.max_archive_count,
                    c.rollover_period,
                )?;
                Arc::new(RollingFileSink::new(settings, &c.path, policy)?)
            }
        };
        Ok(sink)
    }
}
