use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

use super::environment::{self, EnvironmentInfo};
use super::log_level::LogLevel;
use crate::sanitize::{Loggable, SanitizeEngine, describe};

/// One structured log message.
///
/// Created once per log call, enriched by context providers and the
/// sanitizer, then frozen behind an `Arc` when handed to a processor.
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub unique_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
    pub error: Option<ErrorInfo>,
    pub extended_properties: IndexMap<String, PropertyValue>,
    pub caller: Option<CallerInfo>,
    environment: &'static EnvironmentInfo,
}

impl LogEntry {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            unique_id: Uuid::new_v4(),
            created_at: Utc::now(),
            level,
            message: message.into(),
            error: None,
            extended_properties: IndexMap::new(),
            caller: None,
            environment: environment::current(),
        }
    }

    /// Adds or overwrites an extended property. The key keeps its original
    /// insertion position when overwritten.
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.set_property(key, value);
        self
    }

    /// Attaches an arbitrary object graph; it stays unsanitized until a
    /// sanitizer runs over the entry.
    pub fn with_object<T: Loggable>(self, key: impl Into<String>, value: T) -> Self {
        self.with_property(key, PropertyValue::Object(Arc::new(value)))
    }

    pub fn with_error(mut self, error: &(dyn std::error::Error + 'static)) -> Self {
        self.error = Some(ErrorInfo::from_error(error));
        self
    }

    pub fn with_error_info(mut self, error: ErrorInfo) -> Self {
        self.error = Some(error);
        self
    }

    pub fn with_caller(mut self, caller: CallerInfo) -> Self {
        self.caller = Some(caller);
        self
    }

    pub fn set_property(&mut self, key: impl Into<String>, value: impl Into<PropertyValue>) {
        self.extended_properties.insert(key.into(), value.into());
    }

    pub fn property(&self, key: &str) -> Option<&PropertyValue> {
        self.extended_properties.get(key)
    }

    pub fn machine_name(&self) -> &str {
        &self.environment.machine_name
    }

    pub fn machine_ip_address(&self) -> &str {
        &self.environment.machine_ip_address
    }

    pub fn user_name(&self) -> &str {
        &self.environment.user_name
    }

    /// Replaces every attached object with its sanitized representation.
    /// The referenced objects themselves are never touched.
    pub fn sanitize_properties(&mut self, engine: &SanitizeEngine) {
        for value in self.extended_properties.values_mut() {
            if let PropertyValue::Object(object) = value {
                let sanitized = engine.sanitize(object.as_ref());
                *value = PropertyValue::Json(sanitized);
            }
        }
    }
}

/// Value of an extended property.
#[derive(Debug, Clone)]
pub enum PropertyValue {
    Text(String),
    Json(Value),
    /// Unsanitized object graph.
    Object(Arc<dyn Loggable>),
}

impl PropertyValue {
    /// Text form used by formatters. Non-string values are rendered as JSON.
    pub fn render(&self) -> String {
        match self {
            PropertyValue::Text(text) => text.clone(),
            PropertyValue::Json(Value::String(text)) => text.clone(),
            PropertyValue::Json(value) => value.to_string(),
            PropertyValue::Object(object) => match describe(object.as_ref()) {
                Value::String(text) => text,
                value => value.to_string(),
            },
        }
    }

    pub fn is_sanitized(&self) -> bool {
        !matches!(self, PropertyValue::Object(_))
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::Text(value)
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::Text(value.to_string())
    }
}

impl From<Value> for PropertyValue {
    fn from(value: Value) -> Self {
        PropertyValue::Json(value)
    }
}

macro_rules! json_property_from {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for PropertyValue {
                fn from(value: $ty) -> Self {
                    PropertyValue::Json(Value::from(value))
                }
            }
        )*
    };
}

json_property_from!(bool, i32, i64, u32, u64, f64, usize);

/// Captured failure attached to an entry: the error's message plus its
/// `source()` chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
    pub message: String,
    pub causes: Vec<String>,
}

impl ErrorInfo {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            causes: Vec::new(),
        }
    }

    pub fn from_error(error: &(dyn std::error::Error + 'static)) -> Self {
        let mut causes = Vec::new();
        let mut source = error.source();
        while let Some(cause) = source {
            causes.push(cause.to_string());
            source = cause.source();
        }
        Self {
            message: error.to_string(),
            causes,
        }
    }
}

impl fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)?;
        for cause in &self.causes {
            write!(f, "\nCaused by: {cause}")?;
        }
        Ok(())
    }
}

/// Call-site metadata supplied explicitly by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallerInfo {
    pub member: &'static str,
    pub file: &'static str,
    pub line: u32,
}

impl CallerInfo {
    pub const fn new(member: &'static str, file: &'static str, line: u32) -> Self {
        Self { member, file, line }
    }
}

/// Captures the current module path, file and line as a [`CallerInfo`].
#[macro_export]
macro_rules! caller_info {
    () => {
        $crate::domain::CallerInfo::new(module_path!(), file!(), line!())
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, thiserror::Error)]
    #[error("disk unavailable")]
    struct DiskUnavailable {
        #[source]
        source: std::io::Error,
    }

    #[test]
    fn test_properties_keep_insertion_order_and_overwrite() {
        let entry = LogEntry::new(LogLevel::Info, "hello")
            .with_property("b", 1)
            .with_property("a", "x")
            .with_property("b", 2);

        let keys: Vec<_> = entry.extended_properties.keys().cloned().collect();
        assert_eq!(keys, vec!["b".to_string(), "a".to_string()]);
        assert_eq!(entry.property("b").unwrap().render(), "2");
    }

    #[test]
    fn test_error_info_captures_source_chain() {
        let error = DiskUnavailable {
            source: std::io::Error::other("device busy"),
        };
        let entry = LogEntry::new(LogLevel::Error, "write failed").with_error(&error);
        let info = entry.error.unwrap();
        assert_eq!(info.message, "disk unavailable");
        assert_eq!(info.causes, vec!["device busy".to_string()]);
        assert_eq!(info.to_string(), "disk unavailable\nCaused by: device busy");
    }

    #[test]
    fn test_render_json_values() {
        assert_eq!(PropertyValue::from(json!({"k": [1, 2]})).render(), r#"{"k":[1,2]}"#);
        assert_eq!(PropertyValue::from(json!("plain")).render(), "plain");
        assert_eq!(PropertyValue::from(true).render(), "true");
    }

    #[test]
    fn test_caller_info_macro() {
        let entry = LogEntry::new(LogLevel::Debug, "here").with_caller(crate::caller_info!());
        let caller = entry.caller.unwrap();
        assert!(caller.file.ends_with("log_entry.rs"));
        assert!(caller.member.contains("domain"));
        assert!(caller.line > 0);
    }

    #[test]
    fn test_environment_facts_are_populated() {
        let entry = LogEntry::new(LogLevel::Info, "env");
        assert!(!entry.machine_name().is_empty());
        assert!(!entry.user_name().is_empty());
        assert!(!entry.machine_ip_address().is_empty());
    }
}
