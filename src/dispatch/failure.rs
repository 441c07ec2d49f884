use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use crate::domain::LogEntry;
use crate::sink::{LogSink, SinkError};

/// One failed write of one entry to one sink.
///
/// Handed to the [`ErrorHandler`] by mutable reference; the handler opts into
/// another attempt by setting `should_retry`.
pub struct SinkFailure {
    pub message: String,
    /// `None` means the write timed out.
    pub cause: Option<SinkError>,
    pub sink: Arc<dyn LogSink>,
    pub entry: Arc<LogEntry>,
    /// 1 for the first failure of this entry on this sink.
    pub failure_count: u32,
    pub created_at: DateTime<Utc>,
    pub should_retry: bool,
    /// Pause before the retry, if one is requested.
    pub retry_after: Option<Duration>,
}

impl SinkFailure {
    pub fn new(
        sink: Arc<dyn LogSink>,
        entry: Arc<LogEntry>,
        cause: Option<SinkError>,
        failure_count: u32,
    ) -> Self {
        let message = match &cause {
            Some(error) => format!("Sink '{}' failed to write entry: {error}", sink.name()),
            None => format!(
                "Sink '{}' did not finish writing within {:?}",
                sink.name(),
                sink.timeout()
            ),
        };

        Self {
            message,
            cause,
            sink,
            entry,
            failure_count,
            created_at: Utc::now(),
            should_retry: false,
            retry_after: None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        self.cause.is_none()
    }

    pub fn sink_name(&self) -> &str {
        self.sink.name()
    }
}

impl std::fmt::Debug for SinkFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SinkFailure")
            .field("message", &self.message)
            .field("cause", &self.cause)
            .field("sink", &self.sink.name())
            .field("entry_id", &self.entry.unique_id)
            .field("failure_count", &self.failure_count)
            .field("should_retry", &self.should_retry)
            .field("retry_after", &self.retry_after)
            .finish()
    }
}

impl std::fmt::Display for SinkFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

pub trait ErrorHandler: Send + Sync {
    fn handle_error(&self, failure: &mut SinkFailure);
}

impl<F> ErrorHandler for F
where
    F: Fn(&mut SinkFailure) + Send + Sync,
{
    fn handle_error(&self, failure: &mut SinkFailure) {
        self(failure);
    }
}

/// Drops every failure. The default.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentErrorHandler;

impl ErrorHandler for SilentErrorHandler {
    fn handle_error(&self, _failure: &mut SinkFailure) {}
}

/// Reports failures as `tracing` warnings without retrying.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingErrorHandler;

impl ErrorHandler for TracingErrorHandler {
    fn handle_error(&self, failure: &mut SinkFailure) {
        warn!(
            sink = %failure.sink_name(),
            entry_id = %failure.entry.unique_id,
            failure_count = failure.failure_count,
            timeout = failure.is_timeout(),
            "{}",
            failure.message
        );
    }
}

/// Swappable error handler shared by a logger and its dispatcher.
pub struct ErrorHandlerSlot {
    handler: RwLock<Arc<dyn ErrorHandler>>,
}

impl ErrorHandlerSlot {
    pub fn new(handler: Arc<dyn ErrorHandler>) -> Self {
        Self {
            handler: RwLock::new(handler),
        }
    }

    pub fn get(&self) -> Arc<dyn ErrorHandler> {
        Arc::clone(&*self.handler.read())
    }

    /// Takes effect for failures handled after the call.
    pub fn set(&self, handler: Arc<dyn ErrorHandler>) {
        *self.handler.write() = handler;
    }
}

impl Default for ErrorHandlerSlot {
    fn default() -> Self {
        Self::new(Arc::new(SilentErrorHandler))
    }
}

impl std::fmt::Debug for ErrorHandlerSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorHandlerSlot").finish_non_exhaustive()
    }
}
