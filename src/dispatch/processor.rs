use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::{Future, ready};
use std::pin::Pin;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use super::fan_out::{DispatchReport, FanOut};
use crate::domain::{ConfigError, LogEntry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProcessingMode {
    /// Queue onto one dedicated worker, FIFO.
    #[default]
    Background,
    /// The caller waits for every sink.
    Synchronous,
    /// Spawn and return; no ordering across entries.
    FireAndForget,
}

impl fmt::Display for ProcessingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProcessingMode::Background => "background",
            ProcessingMode::Synchronous => "synchronous",
            ProcessingMode::FireAndForget => "fire-and-forget",
        };
        f.write_str(name)
    }
}

impl FromStr for ProcessingMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "background" => Ok(ProcessingMode::Background),
            "synchronous" | "sync" => Ok(ProcessingMode::Synchronous),
            "fire-and-forget" | "fireandforget" => Ok(ProcessingMode::FireAndForget),
            _ => Err(ConfigError::InvalidConfig(format!(
                "Unknown processing mode '{s}' (expected background, synchronous or fire-and-forget)"
            ))),
        }
    }
}

/// Scheduling strategy between the logger and the fan-out.
///
/// Dyn-compatible through boxed futures so a logger can hold any variant.
pub trait LogProcessor: Send + Sync {
    fn mode(&self) -> ProcessingMode;

    /// Resolves once the entry has been handed off as far as the mode
    /// requires: fully delivered for synchronous, queued or spawned otherwise.
    fn process_log_entry(&self, entry: LogEntry) -> Pin<Box<dyn Future<Output = ()> + Send + '_>>;

    /// Stops accepting entries. Work already accepted is not cancelled.
    fn shutdown(&self);

    fn is_shut_down(&self) -> bool;

    /// Shuts down and waits for whatever completion the mode can observe.
    fn close(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        self.shutdown();
        Box::pin(ready(()))
    }
}

pub fn build_processor(
    mode: ProcessingMode,
    fan_out: Arc<FanOut>,
) -> Result<Arc<dyn LogProcessor>, ConfigError> {
    let processor: Arc<dyn LogProcessor> = match mode {
        ProcessingMode::Synchronous => Arc::new(SynchronousProcessor::new(fan_out)),
        ProcessingMode::Background => Arc::new(BackgroundProcessor::new(fan_out)?),
        ProcessingMode::FireAndForget => Arc::new(FireAndForgetProcessor::new(fan_out)?),
    };
    debug!(mode = %mode, "log processor ready");
    Ok(processor)
}

#[derive(Debug)]
pub struct SynchronousProcessor {
    fan_out: Arc<FanOut>,
    shut_down: AtomicBool,
}

impl SynchronousProcessor {
    pub fn new(fan_out: Arc<FanOut>) -> Self {
        Self {
            fan_out,
            shut_down: AtomicBool::new(false),
        }
    }

    /// Delivers `entry` and reports what happened per sink.
    pub async fn process_with_report(&self, entry: LogEntry) -> DispatchReport {
        if self.is_shut_down() {
            return DispatchReport::default();
        }
        self.fan_out.dispatch(Arc::new(entry)).await
    }
}

impl LogProcessor for SynchronousProcessor {
    fn mode(&self) -> ProcessingMode {
        ProcessingMode::Synchronous
    }

    fn process_log_entry(&self, entry: LogEntry) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(async move {
            self.process_with_report(entry).await;
        })
    }

    fn shutdown(&self) {
        self.shut_down.store(true, Ordering::SeqCst);
    }

    fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }
}

/// Single dedicated worker thread draining a FIFO queue.
///
/// The worker owns a current-thread runtime, so entries are delivered one at
/// a time in submission order while the sinks of one entry still run
/// concurrently. Shutting down closes the queue; the worker finishes what is
/// already queued and exits.
pub struct BackgroundProcessor {
    sender: Mutex<Option<mpsc::UnboundedSender<LogEntry>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl BackgroundProcessor {
    pub fn new(fan_out: Arc<FanOut>) -> Result<Self, ConfigError> {
        let (sender, mut receiver) = mpsc::unbounded_channel::<LogEntry>();
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .thread_name("rask-log-background")
            .build()
            .map_err(|e| ConfigError::NoRuntime(e.to_string()))?;

        let worker = std::thread::Builder::new()
            .name("rask-log-background".to_string())
            .spawn(move || {
                runtime.block_on(async move {
                    while let Some(entry) = receiver.recv().await {
                        fan_out.dispatch(Arc::new(entry)).await;
                    }
                });
                // Writes abandoned after their timeout must not hold up exit.
                runtime.shutdown_background();
                debug!("background log worker drained");
            })
            .map_err(|e| ConfigError::NoRuntime(e.to_string()))?;

        Ok(Self {
            sender: Mutex::new(Some(sender)),
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Shuts down and waits until every queued entry has been delivered.
    pub async fn join(&self) {
        self.shutdown();
        let Some(worker) = self.worker.lock().take() else {
            return;
        };

        match tokio::task::spawn_blocking(move || worker.join()).await {
            Ok(Ok(())) => {}
            Ok(Err(_)) => error!("background log worker panicked"),
            Err(e) => error!(error = %e, "failed to join background log worker"),
        }
    }
}

impl LogProcessor for BackgroundProcessor {
    fn mode(&self) -> ProcessingMode {
        ProcessingMode::Background
    }

    fn process_log_entry(&self, entry: LogEntry) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        match self.sender.lock().as_ref() {
            Some(sender) => {
                if sender.send(entry).is_err() {
                    error!("background log worker is gone, dropping entry");
                }
            }
            None => debug!("background processor shut down, dropping entry"),
        }
        Box::pin(ready(()))
    }

    fn shutdown(&self) {
        self.sender.lock().take();
    }

    fn close(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(self.join())
    }

    fn is_shut_down(&self) -> bool {
        self.sender.lock().is_none()
    }
}

impl fmt::Debug for BackgroundProcessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackgroundProcessor")
            .field("shut_down", &self.is_shut_down())
            .finish_non_exhaustive()
    }
}

/// Spawns each fan-out onto the runtime that created the processor and
/// returns immediately. Nothing observes completion.
#[derive(Debug)]
pub struct FireAndForgetProcessor {
    fan_out: Arc<FanOut>,
    runtime: Handle,
    shut_down: AtomicBool,
}

impl FireAndForgetProcessor {
    /// Must be called from within a tokio runtime.
    pub fn new(fan_out: Arc<FanOut>) -> Result<Self, ConfigError> {
        let runtime = Handle::try_current().map_err(|e| ConfigError::NoRuntime(e.to_string()))?;
        Ok(Self::with_handle(fan_out, runtime))
    }

    pub fn with_handle(fan_out: Arc<FanOut>, runtime: Handle) -> Self {
        Self {
            fan_out,
            runtime,
            shut_down: AtomicBool::new(false),
        }
    }
}

impl LogProcessor for FireAndForgetProcessor {
    fn mode(&self) -> ProcessingMode {
        ProcessingMode::FireAndForget
    }

    fn process_log_entry(&self, entry: LogEntry) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        if self.is_shut_down() {
            warn!("fire-and-forget processor shut down, dropping entry");
        } else {
            let fan_out = Arc::clone(&self.fan_out);
            self.runtime.spawn(async move {
                fan_out.dispatch(Arc::new(entry)).await;
            });
        }
        Box::pin(ready(()))
    }

    fn shutdown(&self) {
        self.shut_down.store(true, Ordering::SeqCst);
    }

    fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }
}
