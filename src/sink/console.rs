use async_trait::async_trait;
use parking_lot::Mutex;
use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use super::{LogSink, SinkError, SinkSettings};
use crate::domain::{LogEntry, LogLevel};

pub enum ConsoleTarget {
    Stdout,
    Stderr,
    /// Any other writer, e.g. an in-memory buffer.
    Writer(Mutex<Box<dyn Write + Send>>),
}

impl ConsoleTarget {
    pub fn writer(writer: impl Write + Send + 'static) -> Self {
        ConsoleTarget::Writer(Mutex::new(Box::new(writer)))
    }

    fn write_line(&self, line: &str) -> io::Result<()> {
        match self {
            ConsoleTarget::Stdout => {
                let mut out = io::stdout().lock();
                writeln!(out, "{line}")?;
                out.flush()
            }
            ConsoleTarget::Stderr => {
                let mut out = io::stderr().lock();
                writeln!(out, "{line}")
            }
            ConsoleTarget::Writer(writer) => {
                let mut writer = writer.lock();
                writeln!(writer, "{line}")?;
                writer.flush()
            }
        }
    }
}

impl std::fmt::Debug for ConsoleTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConsoleTarget::Stdout => f.write_str("Stdout"),
            ConsoleTarget::Stderr => f.write_str("Stderr"),
            ConsoleTarget::Writer(_) => f.write_str("Writer"),
        }
    }
}

/// Writes one formatted line per entry to a console stream.
///
/// The stream write runs on the blocking pool so a stalled terminal or pipe
/// is bounded by the sink timeout instead of holding up the dispatcher.
#[derive(Debug)]
pub struct ConsoleSink {
    settings: SinkSettings,
    target: Arc<ConsoleTarget>,
}

impl ConsoleSink {
    pub fn new(settings: SinkSettings) -> Self {
        Self::with_target(settings, ConsoleTarget::Stdout)
    }

    pub fn with_target(settings: SinkSettings, target: ConsoleTarget) -> Self {
        Self {
            settings,
            target: Arc::new(target),
        }
    }
}

#[async_trait]
impl LogSink for ConsoleSink {
    fn name(&self) -> &str {
        self.settings.name()
    }

    fn level(&self) -> LogLevel {
        self.settings.level()
    }

    fn timeout(&self) -> Duration {
        self.settings.timeout()
    }

    async fn write(&self, entry: &LogEntry, deadline: Instant) -> Result<(), SinkError> {
        let line = self.settings.render(entry)?;
        let target = Arc::clone(&self.target);
        let deadline = deadline.into_std();

        tokio::task::spawn_blocking(move || {
            if std::time::Instant::now() >= deadline {
                return Err(SinkError::DeadlineExceeded);
            }
            target.write_line(&line)?;
            Ok(())
        })
        .await
        .map_err(|e| SinkError::Worker(e.to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::{ErrorHandlerSlot, FanOut, SilentErrorHandler};
    use crate::format::TemplateFormatter;
    use crate::sink::DEFAULT_STREAM_TIMEOUT;

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_writes_one_line_per_entry() {
        let buffer = SharedBuffer::default();
        let settings = SinkSettings::new(
            "console",
            LogLevel::Debug,
            DEFAULT_STREAM_TIMEOUT,
            Arc::new(TemplateFormatter::new("{level}: {message}").unwrap()),
        )
        .unwrap();
        let sink = ConsoleSink::with_target(settings, ConsoleTarget::writer(buffer.clone()));

        let deadline = Instant::now() + sink.timeout();
        sink.write(&LogEntry::new(LogLevel::Info, "one"), deadline).await.unwrap();
        sink.write(&LogEntry::new(LogLevel::Warn, "two"), deadline).await.unwrap();

        let output = String::from_utf8(buffer.0.lock().clone()).unwrap();
        assert_eq!(output, "Info: one\nWarn: two\n");
    }

    struct StalledWriter(Duration);

    impl Write for StalledWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            std::thread::sleep(self.0);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_stalled_stream_times_out() {
        let settings = SinkSettings::new(
            "console",
            LogLevel::Debug,
            Duration::from_millis(50),
            Arc::new(TemplateFormatter::new("{message}").unwrap()),
        )
        .unwrap();
        let stalled = ConsoleSink::with_target(
            settings,
            ConsoleTarget::writer(StalledWriter(Duration::from_millis(600))),
        );
        let fan_out = FanOut::new(
            vec![Arc::new(stalled) as Arc<dyn LogSink>],
            Arc::new(ErrorHandlerSlot::new(Arc::new(SilentErrorHandler))),
        );

        let started = std::time::Instant::now();
        let report = fan_out
            .dispatch(Arc::new(LogEntry::new(LogLevel::Info, "stuck")))
            .await;

        assert!(started.elapsed() < Duration::from_millis(400));
        let outcome = report.outcome("console").unwrap();
        assert!(outcome.timed_out);
        assert!(!outcome.delivered);
    }

    #[tokio::test]
    async fn test_expired_deadline_skips_write() {
        let buffer = SharedBuffer::default();
        let settings = SinkSettings::new(
            "console",
            LogLevel::Debug,
            DEFAULT_STREAM_TIMEOUT,
            Arc::new(TemplateFormatter::new("{message}").unwrap()),
        )
        .unwrap();
        let sink = ConsoleSink::with_target(settings, ConsoleTarget::writer(buffer.clone()));

        let result = sink
            .write(&LogEntry::new(LogLevel::Info, "late"), Instant::now())
            .await;

        assert!(matches!(result, Err(SinkError::DeadlineExceeded)));
        assert!(buffer.0.lock().is_empty());
    }
}
