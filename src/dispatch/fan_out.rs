use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::{Instant, sleep, timeout_at};
use tracing::{debug, error, warn};

use super::failure::{ErrorHandlerSlot, SinkFailure};
use crate::domain::{LogEntry, LogLevel};
use crate::sink::{LogSink, SinkError};

/// Hard cap on write attempts per entry and sink unless configured otherwise.
pub const DEFAULT_MAX_WRITE_ATTEMPTS: u32 = 3;

// Deadlines further out than this are clamped.
const MAX_DEADLINE: Duration = Duration::from_secs(60 * 60 * 24 * 365);

/// Result of delivering one entry to one sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkOutcome {
    pub sink: String,
    pub attempts: u32,
    pub delivered: bool,
    /// Whether the last failed attempt was a timeout.
    pub timed_out: bool,
}

#[derive(Debug, Clone, Default)]
pub struct DispatchReport {
    pub outcomes: Vec<SinkOutcome>,
}

impl DispatchReport {
    /// True when no sink was eligible.
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn all_delivered(&self) -> bool {
        self.outcomes.iter().all(|outcome| outcome.delivered)
    }

    pub fn outcome(&self, sink: &str) -> Option<&SinkOutcome> {
        self.outcomes.iter().find(|outcome| outcome.sink == sink)
    }

    pub fn total_attempts(&self) -> u32 {
        self.outcomes.iter().map(|outcome| outcome.attempts).sum()
    }
}

/// Sends one entry to every eligible sink concurrently.
///
/// Each sink gets its own task and its own deadline; a slow or failing sink
/// never holds up the others. Failures go to the shared error handler, which
/// may request a retry up to `max_write_attempts` total attempts.
pub struct FanOut {
    sinks: Vec<Arc<dyn LogSink>>,
    error_handler: Arc<ErrorHandlerSlot>,
    max_write_attempts: u32,
}

impl FanOut {
    pub fn new(sinks: Vec<Arc<dyn LogSink>>, error_handler: Arc<ErrorHandlerSlot>) -> Self {
        Self {
            sinks,
            error_handler,
            max_write_attempts: DEFAULT_MAX_WRITE_ATTEMPTS,
        }
    }

    pub fn with_max_write_attempts(mut self, attempts: u32) -> Self {
        self.max_write_attempts = attempts.max(1);
        self
    }

    pub fn sinks(&self) -> &[Arc<dyn LogSink>] {
        &self.sinks
    }

    pub fn error_handler(&self) -> &Arc<ErrorHandlerSlot> {
        &self.error_handler
    }

    pub fn max_write_attempts(&self) -> u32 {
        self.max_write_attempts
    }

    pub fn eligible_sinks(&self, level: LogLevel) -> Vec<Arc<dyn LogSink>> {
        self.sinks
            .iter()
            .filter(|sink| sink.level() <= level)
            .cloned()
            .collect()
    }

    pub async fn dispatch(&self, entry: Arc<LogEntry>) -> DispatchReport {
        let eligible = self.eligible_sinks(entry.level);
        debug!(
            entry_id = %entry.unique_id,
            level = %entry.level,
            sinks = eligible.len(),
            "dispatching log entry"
        );

        let mut report = DispatchReport {
            outcomes: Vec::with_capacity(eligible.len()),
        };

        match eligible.len() {
            0 => {}
            1 => {
                let sink = Arc::clone(&eligible[0]);
                report.outcomes.push(
                    deliver(
                        sink,
                        entry,
                        Arc::clone(&self.error_handler),
                        self.max_write_attempts,
                    )
                    .await,
                );
            }
            _ => {
                let mut tasks = JoinSet::new();
                for sink in eligible {
                    tasks.spawn(deliver(
                        sink,
                        Arc::clone(&entry),
                        Arc::clone(&self.error_handler),
                        self.max_write_attempts,
                    ));
                }
                while let Some(joined) = tasks.join_next().await {
                    match joined {
                        Ok(outcome) => report.outcomes.push(outcome),
                        Err(e) => error!(error = %e, "sink delivery task did not complete"),
                    }
                }
            }
        }

        report
    }
}

impl std::fmt::Debug for FanOut {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FanOut")
            .field(
                "sinks",
                &self.sinks.iter().map(|sink| sink.name()).collect::<Vec<_>>(),
            )
            .field("max_write_attempts", &self.max_write_attempts)
            .finish()
    }
}

async fn deliver(
    sink: Arc<dyn LogSink>,
    entry: Arc<LogEntry>,
    handlers: Arc<ErrorHandlerSlot>,
    max_attempts: u32,
) -> SinkOutcome {
    let mut attempts = 0;

    loop {
        attempts += 1;

        let cause = match attempt(sink.as_ref(), &entry).await {
            Ok(()) => {
                return SinkOutcome {
                    sink: sink.name().to_string(),
                    attempts,
                    delivered: true,
                    timed_out: false,
                };
            }
            Err(cause) => cause,
        };

        let mut failure = SinkFailure::new(Arc::clone(&sink), Arc::clone(&entry), cause, attempts);
        warn!(
            sink = %sink.name(),
            entry_id = %entry.unique_id,
            attempt = attempts,
            timeout = failure.is_timeout(),
            "sink write failed"
        );

        let handler = handlers.get();
        let handled =
            std::panic::catch_unwind(AssertUnwindSafe(|| handler.handle_error(&mut failure)));
        if let Err(panic) = handled {
            error!(
                sink = %sink.name(),
                panic = %panic_message(panic.as_ref()),
                "error handler panicked"
            );
            failure.should_retry = false;
        }

        if !failure.should_retry || attempts >= max_attempts {
            return SinkOutcome {
                sink: sink.name().to_string(),
                attempts,
                delivered: false,
                timed_out: failure.is_timeout(),
            };
        }

        if let Some(delay) = failure.retry_after.take() {
            sleep(delay).await;
        }
    }
}

/// One write under the sink's deadline. `Err(None)` is a timeout.
async fn attempt(sink: &dyn LogSink, entry: &LogEntry) -> Result<(), Option<SinkError>> {
    let now = Instant::now();
    let deadline = now
        .checked_add(sink.timeout().min(MAX_DEADLINE))
        .unwrap_or(now);

    let write = AssertUnwindSafe(sink.write(entry, deadline)).catch_unwind();
    match timeout_at(deadline, write).await {
        Ok(Ok(Ok(()))) => Ok(()),
        Ok(Ok(Err(SinkError::DeadlineExceeded))) | Err(_) => Err(None),
        Ok(Ok(Err(error))) => Err(Some(error)),
        Ok(Err(panic)) => Err(Some(SinkError::Other(format!(
            "sink panicked: {}",
            panic_message(panic.as_ref())
        )))),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|message| (*message).to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
