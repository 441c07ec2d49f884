use std::sync::Arc;
use tracing::trace;

use crate::dispatch::{
    DEFAULT_MAX_WRITE_ATTEMPTS, ErrorHandler, ErrorHandlerSlot, FanOut, LogProcessor,
    ProcessingMode, SilentErrorHandler, build_processor,
};
use crate::domain::{ConfigError, LogEntry, LogError, LogLevel};
use crate::sanitize::SanitizeEngine;
use crate::sink::LogSink;

/// Adds ambient data to an entry before it is dispatched.
pub trait ContextProvider: Send + Sync {
    fn add_context(&self, entry: &mut LogEntry);
}

impl<F> ContextProvider for F
where
    F: Fn(&mut LogEntry) + Send + Sync,
{
    fn add_context(&self, entry: &mut LogEntry) {
        self(entry);
    }
}

/// Entry point for application code.
///
/// Applies the disabled/level gate, runs context providers and the optional
/// sanitizer, then hands the entry to its processor. Sink failures never
/// surface here.
pub struct Logger {
    level: LogLevel,
    disabled: bool,
    sinks: Vec<Arc<dyn LogSink>>,
    context_providers: Vec<Arc<dyn ContextProvider>>,
    sanitizer: Option<Arc<SanitizeEngine>>,
    error_handler: Arc<ErrorHandlerSlot>,
    processor: Arc<dyn LogProcessor>,
}

impl Logger {
    pub fn builder() -> LoggerBuilder {
        LoggerBuilder::default()
    }

    pub fn level(&self) -> LogLevel {
        self.level
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    pub fn sinks(&self) -> &[Arc<dyn LogSink>] {
        &self.sinks
    }

    pub fn context_providers(&self) -> &[Arc<dyn ContextProvider>] {
        &self.context_providers
    }

    pub fn processing_mode(&self) -> ProcessingMode {
        self.processor.mode()
    }

    pub fn error_handler(&self) -> Arc<dyn ErrorHandler> {
        self.error_handler.get()
    }

    pub fn set_error_handler(&self, handler: Arc<dyn ErrorHandler>) {
        self.error_handler.set(handler);
    }

    /// Whether an entry at `level` would pass the gate.
    pub fn is_enabled(&self, level: LogLevel) -> bool {
        !self.disabled && level.is_defined() && level >= self.level
    }

    pub async fn log(&self, mut entry: LogEntry) -> Result<(), LogError> {
        if self.disabled {
            return Ok(());
        }
        if !entry.level.is_defined() {
            return Err(LogError::InvalidLevel(entry.level));
        }
        if entry.level < self.level {
            trace!(level = %entry.level, threshold = %self.level, "entry below threshold");
            return Ok(());
        }

        for provider in &self.context_providers {
            provider.add_context(&mut entry);
        }
        if let Some(sanitizer) = &self.sanitizer {
            entry.sanitize_properties(sanitizer);
        }

        self.processor.process_log_entry(entry).await;
        Ok(())
    }

    pub async fn debug(&self, message: impl Into<String>) -> Result<(), LogError> {
        self.log_message(LogLevel::Debug, message).await
    }

    pub async fn info(&self, message: impl Into<String>) -> Result<(), LogError> {
        self.log_message(LogLevel::Info, message).await
    }

    pub async fn warn(&self, message: impl Into<String>) -> Result<(), LogError> {
        self.log_message(LogLevel::Warn, message).await
    }

    pub async fn error(&self, message: impl Into<String>) -> Result<(), LogError> {
        self.log_message(LogLevel::Error, message).await
    }

    pub async fn fatal(&self, message: impl Into<String>) -> Result<(), LogError> {
        self.log_message(LogLevel::Fatal, message).await
    }

    pub async fn audit(&self, message: impl Into<String>) -> Result<(), LogError> {
        self.log_message(LogLevel::Audit, message).await
    }

    async fn log_message(&self, level: LogLevel, message: impl Into<String>) -> Result<(), LogError> {
        if !self.is_enabled(level) {
            return Ok(());
        }
        self.log(LogEntry::new(level, message)).await
    }

    /// Stops accepting entries. In-flight background or fire-and-forget work
    /// is not awaited.
    pub fn shutdown(&self) {
        self.processor.shutdown();
    }

    /// Shuts down and, in background mode, waits for the queue to drain.
    pub async fn close(&self) {
        self.processor.close().await;
    }
}

impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger")
            .field("level", &self.level)
            .field("disabled", &self.disabled)
            .field(
                "sinks",
                &self.sinks.iter().map(|sink| sink.name()).collect::<Vec<_>>(),
            )
            .field("context_providers", &self.context_providers.len())
            .field("sanitizer", &self.sanitizer.is_some())
            .field("mode", &self.processor.mode())
            .finish()
    }
}

pub struct LoggerBuilder {
    level: LogLevel,
    disabled: bool,
    sinks: Vec<Arc<dyn LogSink>>,
    context_providers: Vec<Arc<dyn ContextProvider>>,
    sanitizer: Option<Arc<SanitizeEngine>>,
    error_handler: Arc<dyn ErrorHandler>,
    mode: ProcessingMode,
    max_write_attempts: u32,
}

impl Default for LoggerBuilder {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            disabled: false,
            sinks: Vec::new(),
            context_providers: Vec::new(),
            sanitizer: None,
            error_handler: Arc::new(SilentErrorHandler),
            mode: ProcessingMode::default(),
            max_write_attempts: DEFAULT_MAX_WRITE_ATTEMPTS,
        }
    }
}

impl LoggerBuilder {
    pub fn level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }

    pub fn sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn sinks(mut self, sinks: impl IntoIterator<Item = Arc<dyn LogSink>>) -> Self {
        self.sinks.extend(sinks);
        self
    }

    pub fn context_provider(mut self, provider: Arc<dyn ContextProvider>) -> Self {
        self.context_providers.push(provider);
        self
    }

    pub fn sanitizer(mut self, sanitizer: Arc<SanitizeEngine>) -> Self {
        self.sanitizer = Some(sanitizer);
        self
    }

    pub fn error_handler(mut self, handler: Arc<dyn ErrorHandler>) -> Self {
        self.error_handler = handler;
        self
    }

    pub fn processing_mode(mut self, mode: ProcessingMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn max_write_attempts(mut self, attempts: u32) -> Self {
        self.max_write_attempts = attempts;
        self
    }

    /// Fire-and-forget mode needs a running tokio runtime at this point.
    pub fn build(self) -> Result<Logger, ConfigError> {
        if !self.level.is_defined() {
            return Err(ConfigError::InvalidLevel(format!("{:?}", self.level)));
        }
        if self.max_write_attempts == 0 {
            return Err(ConfigError::InvalidConfig(
                "max_write_attempts must be at least 1".to_string(),
            ));
        }

        let error_handler = Arc::new(ErrorHandlerSlot::new(self.error_handler));
        let fan_out = FanOut::new(self.sinks.clone(), Arc::clone(&error_handler))
            .with_max_write_attempts(self.max_write_attempts);
        let processor = build_processor(self.mode, Arc::new(fan_out))?;

        Ok(Logger {
            level: self.level,
            disabled: self.disabled,
            sinks: self.sinks,
            context_providers: self.context_providers,
            sanitizer: self.sanitizer,
            error_handler,
            processor,
        })
    }
}
