//! The concurrency core: fan-out of one entry to many sinks, failure
//! handling, and the three scheduling modes in front of it.

pub mod failure;
pub mod fan_out;
pub mod processor;
pub mod retry;

pub use failure::{
    ErrorHandler, ErrorHandlerSlot, SilentErrorHandler, SinkFailure, TracingErrorHandler,
};
pub use fan_out::{DEFAULT_MAX_WRITE_ATTEMPTS, DispatchReport, FanOut, SinkOutcome};
pub use processor::{
    BackgroundProcessor, FireAndForgetProcessor, LogProcessor, ProcessingMode,
    SynchronousProcessor, build_processor,
};
pub use retry::{RetryConfig, RetryStrategy, RetryingErrorHandler};
