mod common;

use common::{RecordingSink, as_sink};
use parking_lot::Mutex;
use rask_log_pipeline::dispatch::{
    ErrorHandler, ErrorHandlerSlot, FanOut, ProcessingMode, RetryConfig, RetryStrategy,
    RetryingErrorHandler, SinkFailure, SynchronousProcessor,
};
use rask_log_pipeline::domain::{LogEntry, LogLevel};
use rask_log_pipeline::format::FormatError;
use rask_log_pipeline::logger::Logger;
use rask_log_pipeline::sink::{ConsoleSink, ConsoleTarget, LogSink, SinkSettings};
use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;
use tokio_test::assert_ready;

fn synchronous(sinks: Vec<Arc<RecordingSink>>, handler: Arc<dyn ErrorHandler>) -> SynchronousProcessor {
    let fan_out = FanOut::new(
        sinks.iter().map(as_sink).collect(),
        Arc::new(ErrorHandlerSlot::new(handler)),
    );
    SynchronousProcessor::new(Arc::new(fan_out))
}

fn always_retry() -> Arc<dyn ErrorHandler> {
    Arc::new(|failure: &mut SinkFailure| failure.should_retry = true)
}

/// Terminal that hangs on every write.
struct HungTerminal;

impl Write for HungTerminal {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        std::thread::sleep(Duration::from_secs(2));
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn hung_console(timeout: Duration) -> Arc<dyn LogSink> {
    let settings = SinkSettings::new(
        "console",
        LogLevel::Debug,
        timeout,
        Arc::new(|entry: &LogEntry| Ok::<_, FormatError>(entry.message.clone())),
    )
    .unwrap();
    Arc::new(ConsoleSink::with_target(settings, ConsoleTarget::writer(HungTerminal)))
}

#[tokio::test]
async fn test_gate_blocks_before_any_sink() {
    let sink = RecordingSink::new("memory", LogLevel::Debug).shared();
    let logger = Logger::builder()
        .level(LogLevel::Warn)
        .sink(as_sink(&sink))
        .processing_mode(ProcessingMode::Synchronous)
        .build()
        .unwrap();

    logger.info("below threshold").await.unwrap();
    logger.log(LogEntry::new(LogLevel::Debug, "also below")).await.unwrap();
    logger.error("kept").await.unwrap();

    assert_eq!(sink.attempts(), 1);
    assert_eq!(sink.messages(), vec!["kept".to_string()]);

    let disabled = Logger::builder()
        .disabled(true)
        .sink(as_sink(&sink))
        .processing_mode(ProcessingMode::Synchronous)
        .build()
        .unwrap();
    disabled.audit("ignored").await.unwrap();
    assert_eq!(sink.attempts(), 1);
}

#[tokio::test]
async fn test_sink_level_filters_eligibility() {
    let verbose = RecordingSink::new("verbose", LogLevel::Debug).shared();
    let alerts = RecordingSink::new("alerts", LogLevel::Error).shared();
    let processor = synchronous(vec![verbose.clone(), alerts.clone()], always_retry());

    let report = processor
        .process_with_report(LogEntry::new(LogLevel::Info, "routine"))
        .await;
    assert_eq!(report.outcomes.len(), 1);
    assert!(report.outcome("verbose").unwrap().delivered);
    assert!(report.outcome("alerts").is_none());

    let report = processor
        .process_with_report(LogEntry::new(LogLevel::Fatal, "boom"))
        .await;
    assert_eq!(report.outcomes.len(), 2);
    assert!(report.all_delivered());
    assert_eq!(alerts.messages(), vec!["boom".to_string()]);
}

#[tokio::test]
async fn test_retry_requested_by_handler() {
    let sink = RecordingSink::new("flaky", LogLevel::Debug).failing(1).shared();
    let processor = synchronous(vec![sink.clone()], always_retry());

    let report = processor
        .process_with_report(LogEntry::new(LogLevel::Info, "second time lucky"))
        .await;

    let outcome = report.outcome("flaky").unwrap();
    assert_eq!(outcome.attempts, 2);
    assert!(outcome.delivered);
    assert_eq!(sink.messages(), vec!["second time lucky".to_string()]);
}

#[tokio::test]
async fn test_no_retry_without_handler_opt_in() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let recorder = Arc::clone(&seen);
    let handler: Arc<dyn ErrorHandler> = Arc::new(move |failure: &mut SinkFailure| {
        recorder
            .lock()
            .push((failure.sink_name().to_string(), failure.failure_count));
    });

    let broken = RecordingSink::new("broken", LogLevel::Debug).failing(5).shared();
    let healthy = RecordingSink::new("healthy", LogLevel::Debug).shared();
    let processor = synchronous(vec![broken.clone(), healthy.clone()], handler);

    let report = processor
        .process_with_report(LogEntry::new(LogLevel::Warn, "isolated"))
        .await;

    let outcome = report.outcome("broken").unwrap();
    assert_eq!(outcome.attempts, 1);
    assert!(!outcome.delivered);
    assert!(!outcome.timed_out);
    assert!(report.outcome("healthy").unwrap().delivered);
    assert_eq!(*seen.lock(), vec![("broken".to_string(), 1)]);
}

#[tokio::test]
async fn test_retries_are_capped() {
    let sink = RecordingSink::new("hopeless", LogLevel::Debug).failing(100).shared();
    let fan_out = FanOut::new(
        vec![as_sink(&sink)],
        Arc::new(ErrorHandlerSlot::new(always_retry())),
    )
    .with_max_write_attempts(4);
    let processor = SynchronousProcessor::new(Arc::new(fan_out));

    let report = processor
        .process_with_report(LogEntry::new(LogLevel::Info, "never lands"))
        .await;

    assert_eq!(report.total_attempts(), 4);
    assert_eq!(sink.attempts(), 4);
    assert!(!report.all_delivered());
}

#[tokio::test]
async fn test_slow_sink_times_out() {
    let failures = Arc::new(Mutex::new(Vec::new()));
    let recorder = Arc::clone(&failures);
    let handler: Arc<dyn ErrorHandler> = Arc::new(move |failure: &mut SinkFailure| {
        recorder.lock().push(failure.is_timeout());
    });

    let slow = RecordingSink::new("slow", LogLevel::Debug)
        .stalling(Duration::from_secs(5), Duration::from_millis(20))
        .shared();
    let fast = RecordingSink::new("fast", LogLevel::Debug).shared();
    let processor = synchronous(vec![slow.clone(), fast.clone()], handler);

    let started = std::time::Instant::now();
    let report = processor
        .process_with_report(LogEntry::new(LogLevel::Info, "hurry"))
        .await;

    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(report.outcome("slow").unwrap().timed_out);
    assert!(report.outcome("fast").unwrap().delivered);
    assert!(slow.messages().is_empty());
    assert_eq!(*failures.lock(), vec![true]);
}

#[tokio::test]
async fn test_sinks_are_written_concurrently() {
    let stall = Duration::from_millis(300);
    let first = RecordingSink::new("first", LogLevel::Debug)
        .stalling(stall, Duration::from_secs(1))
        .shared();
    let second = RecordingSink::new("second", LogLevel::Debug)
        .stalling(stall, Duration::from_secs(1))
        .shared();
    let processor = synchronous(vec![first.clone(), second.clone()], always_retry());

    let started = std::time::Instant::now();
    let report = processor
        .process_with_report(LogEntry::new(LogLevel::Info, "side by side"))
        .await;
    let elapsed = started.elapsed();

    assert!(report.all_delivered());
    assert!(elapsed >= stall);
    assert!(elapsed < Duration::from_millis(550), "took {elapsed:?}");
}

#[tokio::test]
async fn test_retrying_handler_backs_off_then_gives_up() {
    let handler = RetryingErrorHandler::new(RetryConfig {
        max_attempts: 2,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
        strategy: RetryStrategy::FixedDelay,
        jitter: false,
    })
    .unwrap();

    let sink = RecordingSink::new("flaky", LogLevel::Debug).failing(3).shared();
    let processor = synchronous(vec![sink.clone()], Arc::new(handler));

    let report = processor
        .process_with_report(LogEntry::new(LogLevel::Error, "twice at most"))
        .await;

    assert_eq!(report.outcome("flaky").unwrap().attempts, 2);
    assert!(!report.all_delivered());
}

#[tokio::test]
async fn test_error_handler_can_be_swapped_at_runtime() {
    let sink = RecordingSink::new("flaky", LogLevel::Debug).failing(2).shared();
    let logger = Logger::builder()
        .sink(as_sink(&sink))
        .processing_mode(ProcessingMode::Synchronous)
        .build()
        .unwrap();

    logger.info("lost").await.unwrap();
    assert!(sink.messages().is_empty());

    logger.set_error_handler(always_retry());
    logger.info("recovered").await.unwrap();
    assert_eq!(sink.messages(), vec!["recovered".to_string()]);
    assert_eq!(sink.attempts(), 3);
}

#[tokio::test]
async fn test_background_mode_keeps_submission_order() {
    let sink = RecordingSink::new("ordered", LogLevel::Debug).shared();
    let logger = Logger::builder()
        .sink(as_sink(&sink))
        .processing_mode(ProcessingMode::Background)
        .build()
        .unwrap();

    for index in 0..50 {
        logger.info(format!("entry {index}")).await.unwrap();
    }
    logger.close().await;

    let expected: Vec<String> = (0..50).map(|index| format!("entry {index}")).collect();
    assert_eq!(sink.messages(), expected);

    logger.info("after close").await.unwrap();
    assert_eq!(sink.messages().len(), 50);
}

#[tokio::test]
async fn test_background_log_call_does_not_wait_for_sinks() {
    let sink = RecordingSink::new("slow", LogLevel::Debug)
        .stalling(Duration::from_millis(200), Duration::from_secs(1))
        .shared();
    let logger = Logger::builder()
        .sink(as_sink(&sink))
        .processing_mode(ProcessingMode::Background)
        .build()
        .unwrap();

    let mut call = tokio_test::task::spawn(logger.log(LogEntry::new(LogLevel::Info, "queued")));
    assert_ready!(call.poll()).unwrap();
    drop(call);

    logger.close().await;
    assert_eq!(sink.messages(), vec!["queued".to_string()]);
}

#[tokio::test]
async fn test_hung_console_times_out_without_stalling_queue() {
    let timeouts = Arc::new(Mutex::new(Vec::new()));
    let recorder = Arc::clone(&timeouts);
    let handler: Arc<dyn ErrorHandler> = Arc::new(move |failure: &mut SinkFailure| {
        recorder
            .lock()
            .push((failure.sink_name().to_string(), failure.is_timeout()));
    });

    let healthy = RecordingSink::new("healthy", LogLevel::Debug).shared();
    let logger = Logger::builder()
        .sink(hung_console(Duration::from_millis(50)))
        .sink(as_sink(&healthy))
        .error_handler(handler)
        .processing_mode(ProcessingMode::Background)
        .build()
        .unwrap();

    let started = std::time::Instant::now();
    for index in 0..3 {
        logger.info(format!("queued {index}")).await.unwrap();
    }
    logger.close().await;

    assert!(started.elapsed() < Duration::from_millis(1500));
    let expected: Vec<String> = (0..3).map(|index| format!("queued {index}")).collect();
    assert_eq!(healthy.messages(), expected);

    let timeouts = timeouts.lock();
    assert_eq!(timeouts.len(), 3);
    assert!(timeouts.iter().all(|(sink, timed_out)| sink == "console" && *timed_out));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_fire_and_forget_delivers_eventually() {
    let sink = RecordingSink::new("detached", LogLevel::Debug).shared();
    let logger = Logger::builder()
        .sink(as_sink(&sink))
        .processing_mode(ProcessingMode::FireAndForget)
        .build()
        .unwrap();

    for index in 0..10 {
        logger.warn(format!("detached {index}")).await.unwrap();
    }

    let delivered = tokio::time::timeout(Duration::from_secs(5), async {
        while sink.messages().len() < 10 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(delivered.is_ok());

    let mut messages = sink.messages();
    messages.sort();
    let mut expected: Vec<String> = (0..10).map(|index| format!("detached {index}")).collect();
    expected.sort();
    assert_eq!(messages, expected);
}

#[test]
fn test_fire_and_forget_requires_runtime() {
    let result = Logger::builder()
        .processing_mode(ProcessingMode::FireAndForget)
        .build();
    assert!(result.is_err());
}
