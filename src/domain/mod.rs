//! Domain layer for rask-log-pipeline.
//!
//! Contains the canonical types shared across all modules:
//! - `LogEntry`: The unit of data flowing through the pipeline
//! - `LogLevel`: Ordered severity (Debug/Info/Warn/Error/Fatal/Audit)
//! - `ConfigError` / `LogError`: Construction and gate errors

pub mod environment;
pub mod error;
pub mod log_entry;
pub mod log_level;

pub use environment::EnvironmentInfo;
pub use error::{ConfigError, LogError};
pub use log_entry::{CallerInfo, ErrorInfo, LogEntry, PropertyValue};
pub use log_level::LogLevel;
