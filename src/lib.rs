#![warn(rust_2018_idioms, rust_2024_compatibility)]
// Specific pedantic lints enforced (not blanket allow):
#![warn(
    clippy::explicit_iter_loop,
    clippy::manual_let_else,
    clippy::semicolon_if_nothing_returned,
    clippy::inconsistent_struct_constructor
)]
// Noisy pedantic lints suppressed with justification:
#![allow(
    clippy::cast_lossless,            // Infallible casts are clear enough with `as`
    clippy::cast_possible_truncation, // Millisecond durations stay far below u64::MAX
    clippy::cast_precision_loss,      // Jitter math on millisecond delays
    clippy::cast_sign_loss,           // Jitter factor is always positive
    clippy::missing_errors_doc,       // Internal API
    clippy::missing_panics_doc,       // Internal API
    clippy::module_name_repetitions,  // e.g. SinkError in sink module
    clippy::must_use_candidate,       // Annotated selectively on critical APIs
    clippy::doc_markdown              // Internal API
)]

pub mod app;
pub mod dispatch;
pub mod domain;
pub mod format;
pub mod logger;
pub mod sanitize;
pub mod sink;

// Re-export main types for easy access
pub use dispatch::{ErrorHandler, ProcessingMode, SinkFailure};
pub use domain::{CallerInfo, ConfigError, LogEntry, LogError, LogLevel, PropertyValue};
pub use format::{LogFormatter, TemplateFormatter};
pub use logger::{ContextProvider, Logger, LoggerBuilder};
pub use sanitize::{Loggable, SafetyRegistry, SanitizeEngine, Shape};
pub use sink::{LogSink, SinkError};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
