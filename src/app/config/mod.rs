mod cli;
pub mod groups;
pub mod serde_helpers;
mod validation;

pub use cli::Cli;
pub use groups::{
    ConsoleSinkConfig, ConsoleStream, DebugSinkConfig, ErrorHandlerKind, FileSinkConfig,
    RetrySettings, RollingFileSinkConfig, SinkConfig,
};

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

use crate::dispatch::{
    DEFAULT_MAX_WRITE_ATTEMPTS, ErrorHandler, ProcessingMode, RetryingErrorHandler,
    SilentErrorHandler, TracingErrorHandler,
};
use crate::domain::{ConfigError, LogLevel};
use crate::logger::Logger;
use crate::sanitize::SanitizeEngine;
use serde_helpers::load_env_var;

/// Everything needed to assemble a [`Logger`].
///
/// Loaded from TOML, then overridden by `RASK_LOG_*` environment variables:
///
/// ```toml
/// level = "info"
/// processing_mode = "background"
///
/// [[sinks]]
/// type = "rolling_file"
/// path = "/var/log/app/app.log"
/// max_file_size_kilobytes = 2048
/// rollover_period = "daily"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub level: LogLevel,
    pub disabled: bool,
    pub processing_mode: ProcessingMode,
    pub max_write_attempts: u32,
    /// Sanitize attached objects against the process-wide safety registry.
    pub sanitize: bool,
    pub error_handler: ErrorHandlerKind,
    pub retry: RetrySettings,
    pub sinks: Vec<SinkConfig>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            disabled: false,
            processing_mode: ProcessingMode::Background,
            max_write_attempts: DEFAULT_MAX_WRITE_ATTEMPTS,
            sanitize: true,
            error_handler: ErrorHandlerKind::Silent,
            retry: RetrySettings::default(),
            sinks: vec![SinkConfig::Console(ConsoleSinkConfig::default())],
        }
    }
}

impl PipelineConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let mut config: PipelineConfig = toml::from_str(content)?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults with environment overrides applied.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = PipelineConfig::default();
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        load_env_var("RASK_LOG_LEVEL", &mut self.level)?;
        load_env_var("RASK_LOG_DISABLED", &mut self.disabled)?;
        load_env_var("RASK_LOG_MODE", &mut self.processing_mode)?;
        load_env_var("RASK_LOG_MAX_WRITE_ATTEMPTS", &mut self.max_write_attempts)?;
        load_env_var("RASK_LOG_SANITIZE", &mut self.sanitize)?;
        Ok(())
    }

    fn build_error_handler(&self) -> Result<Arc<dyn ErrorHandler>, ConfigError> {
        let handler: Arc<dyn ErrorHandler> = match self.error_handler {
            ErrorHandlerKind::Silent => Arc::new(SilentErrorHandler),
            ErrorHandlerKind::Tracing => Arc::new(TracingErrorHandler),
            ErrorHandlerKind::Retry => {
                Arc::new(RetryingErrorHandler::new((&self.retry).into())?)
            }
        };
        Ok(handler)
    }

    /// Validates and assembles the logger. Fire-and-forget mode must be built
    /// inside a tokio runtime.
    pub fn build_logger(&self) -> Result<Logger, ConfigError> {
        self.validate()?;

        let sinks = self
            .sinks
            .iter()
            .enumerate()
            .map(|(index, sink)| sink.build(index))
            .collect::<Result<Vec<_>, _>>()?;

        let mut builder = Logger::builder()
            .level(self.level)
            .disabled(self.disabled)
            .processing_mode(self.processing_mode)
            .max_write_attempts(self.max_write_attempts)
            .error_handler(self.build_error_handler()?)
            .sinks(sinks);
        if self.sanitize {
            builder = builder.sanitizer(Arc::new(SanitizeEngine::default()));
        }

        let logger = builder.build()?;
        ::tracing::info!(
            level = %self.level,
            mode = %self.processing_mode,
            sinks = self.sinks.len(),
            "logger assembled"
        );
        Ok(logger)
    }
}
