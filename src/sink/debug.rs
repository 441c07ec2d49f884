use async_trait::async_trait;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use super::{LogSink, SinkError, SinkSettings};
use crate::domain::{LogEntry, LogLevel};

/// Emits formatted entries as `tracing` debug events, visible to whatever
/// subscriber the host installed.
#[derive(Debug)]
pub struct DebugSink {
    settings: SinkSettings,
}

impl DebugSink {
    pub fn new(settings: SinkSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl LogSink for DebugSink {
    fn name(&self) -> &str {
        self.settings.name()
    }

    fn level(&self) -> LogLevel {
        self.settings.level()
    }

    fn timeout(&self) -> Duration {
        self.settings.timeout()
    }

    async fn write(&self, entry: &LogEntry, _deadline: Instant) -> Result<(), SinkError> {
        let line = self.settings.render(entry)?;
        debug!(sink = %self.settings.name(), level = %entry.level, "{line}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::TemplateFormatter;
    use crate::sink::DEFAULT_STREAM_TIMEOUT;
    use std::sync::Arc;
    use tracing_test::traced_test;

    #[tokio::test]
    #[traced_test]
    async fn test_emits_debug_event() {
        let settings = SinkSettings::new(
            "debug",
            LogLevel::Debug,
            DEFAULT_STREAM_TIMEOUT,
            Arc::new(TemplateFormatter::new("debug-sink says {message}").unwrap()),
        )
        .unwrap();
        let sink = DebugSink::new(settings);

        sink.write(
            &LogEntry::new(LogLevel::Info, "hi"),
            Instant::now() + sink.timeout(),
        )
        .await
        .unwrap();

        assert!(logs_contain("debug-sink says hi"));
    }
}
