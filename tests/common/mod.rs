#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use rask_log_pipeline::domain::{LogEntry, LogLevel};
use rask_log_pipeline::sink::{LogSink, SinkError};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio::time::Instant;

/// In-memory sink that records entries and can be told to fail or stall.
pub struct RecordingSink {
    name: String,
    level: LogLevel,
    timeout: Duration,
    delay: Option<Duration>,
    failures_left: AtomicU32,
    attempts: AtomicU32,
    entries: Mutex<Vec<LogEntry>>,
}

impl RecordingSink {
    pub fn new(name: &str, level: LogLevel) -> Self {
        Self {
            name: name.to_string(),
            level,
            timeout: Duration::from_secs(1),
            delay: None,
            failures_left: AtomicU32::new(0),
            attempts: AtomicU32::new(0),
            entries: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(mut self, times: u32) -> Self {
        self.failures_left = AtomicU32::new(times);
        self
    }

    pub fn stalling(mut self, delay: Duration, timeout: Duration) -> Self {
        self.delay = Some(delay);
        self.timeout = timeout;
        self
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn messages(&self) -> Vec<String> {
        self.entries
            .lock()
            .iter()
            .map(|entry| entry.message.clone())
            .collect()
    }

    /// Entries exactly as the sink received them.
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().clone()
    }
}

#[async_trait]
impl LogSink for RecordingSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn level(&self) -> LogLevel {
        self.level
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn write(&self, entry: &LogEntry, _deadline: Instant) -> Result<(), SinkError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let failed = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failed {
            return Err(SinkError::Other(format!("{} refused the entry", self.name)));
        }

        self.entries.lock().push(entry.clone());
        Ok(())
    }
}

pub fn as_sink(sink: &Arc<RecordingSink>) -> Arc<dyn LogSink> {
    Arc::clone(sink) as Arc<dyn LogSink>
}
