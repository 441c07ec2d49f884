//! Rendering of log entries into text.
//!
//! [`TemplateFormatter`] is the stock implementation; anything implementing
//! [`LogFormatter`] (closures included) can be handed to a sink instead.

pub mod html;
pub mod template;
pub mod tokens;

pub use template::{DEFAULT_DATE_FORMAT, DEFAULT_TEMPLATE, TemplateFormatter};
pub use tokens::{LINE_ENDING, MISSING_VALUE, TokenHandler, TokenRegistry};

use thiserror::Error;

use crate::domain::LogEntry;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("Template pattern failed to compile: {0}")]
    Pattern(String),
    #[error("Formatting failed: {0}")]
    Render(String),
}

pub trait LogFormatter: Send + Sync {
    fn format(&self, entry: &LogEntry) -> Result<String, FormatError>;
}

impl<F> LogFormatter for F
where
    F: Fn(&LogEntry) -> Result<String, FormatError> + Send + Sync,
{
    fn format(&self, entry: &LogEntry) -> Result<String, FormatError> {
        self(entry)
    }
}
