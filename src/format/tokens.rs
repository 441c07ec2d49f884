use chrono::{DateTime, FixedOffset, Local};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use crate::domain::LogEntry;

#[cfg(windows)]
pub const LINE_ENDING: &str = "\r\n";
#[cfg(not(windows))]
pub const LINE_ENDING: &str = "\n";

/// Value substituted for extended properties that are not present.
pub const MISSING_VALUE: &str = "N/A";

pub type SimpleTokenFn = Arc<dyn Fn(&LogEntry) -> String + Send + Sync>;
pub type DateTokenFn = Arc<dyn Fn(&LogEntry) -> DateTime<FixedOffset> + Send + Sync>;

#[derive(Clone)]
pub enum TokenHandler {
    /// `{name}`
    Simple(SimpleTokenFn),
    /// `{name}` or `{name(format)}`
    Date(DateTokenFn),
}

/// Process-wide registry of template token handlers.
///
/// Append-only: the first registration of a name wins and nothing is ever
/// removed, so concurrent readers never observe a handler disappearing.
pub struct TokenRegistry {
    handlers: RwLock<HashMap<String, TokenHandler>>,
}

static GLOBAL: LazyLock<Arc<TokenRegistry>> =
    LazyLock::new(|| Arc::new(TokenRegistry::with_builtins()));

impl TokenRegistry {
    /// A registry with no handlers at all.
    pub fn empty() -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_builtins() -> Self {
        let registry = Self::empty();

        registry.register_simple("newLine", |_| LINE_ENDING.to_string());
        registry.register_simple("tab", |_| "\t".to_string());
        registry.register_simple("message", |entry| entry.message.clone());
        registry.register_simple("userName", |entry| entry.user_name().to_string());
        registry.register_simple("machineName", |entry| entry.machine_name().to_string());
        registry.register_simple("machineIpAddress", |entry| {
            entry.machine_ip_address().to_string()
        });
        registry.register_simple("level", |entry| entry.level.to_string());
        registry.register_simple("exception", |entry| {
            entry
                .error
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_default()
        });
        registry.register_simple("uniqueId", |entry| entry.unique_id.hyphenated().to_string());
        registry.register_simple("callerMember", |entry| {
            entry
                .caller
                .map(|caller| caller.member.to_string())
                .unwrap_or_default()
        });
        registry.register_simple("callerFile", |entry| {
            entry
                .caller
                .map(|caller| caller.file.to_string())
                .unwrap_or_default()
        });
        registry.register_simple("callerLine", |entry| {
            entry
                .caller
                .map(|caller| caller.line.to_string())
                .unwrap_or_default()
        });

        registry.register_date("createTime", |entry| entry.created_at.fixed_offset());
        registry.register_date("localCreateTime", |entry| {
            entry.created_at.with_timezone(&Local).fixed_offset()
        });

        registry
    }

    /// Shared registry, pre-populated with the built-in tokens.
    pub fn global() -> Arc<TokenRegistry> {
        Arc::clone(&GLOBAL)
    }

    /// Returns false when `name` was already registered.
    pub fn register_simple<F>(&self, name: &str, handler: F) -> bool
    where
        F: Fn(&LogEntry) -> String + Send + Sync + 'static,
    {
        self.register(name, TokenHandler::Simple(Arc::new(handler)))
    }

    pub fn register_date<F>(&self, name: &str, handler: F) -> bool
    where
        F: Fn(&LogEntry) -> DateTime<FixedOffset> + Send + Sync + 'static,
    {
        self.register(name, TokenHandler::Date(Arc::new(handler)))
    }

    /// Exposes the extended property `property` as the simple token `{property}`.
    pub fn register_extended_property(&self, property: &str) -> bool {
        let key = property.to_string();
        self.register_simple(property, move |entry| {
            entry
                .property(&key)
                .map(|value| value.render())
                .unwrap_or_else(|| MISSING_VALUE.to_string())
        })
    }

    fn register(&self, name: &str, handler: TokenHandler) -> bool {
        let mut handlers = self.handlers.write();
        if handlers.contains_key(name) {
            return false;
        }
        handlers.insert(name.to_string(), handler);
        true
    }

    pub fn simple(&self, name: &str) -> Option<SimpleTokenFn> {
        match self.handlers.read().get(name) {
            Some(TokenHandler::Simple(handler)) => Some(Arc::clone(handler)),
            _ => None,
        }
    }

    pub fn date(&self, name: &str) -> Option<DateTokenFn> {
        match self.handlers.read().get(name) {
            Some(TokenHandler::Date(handler)) => Some(Arc::clone(handler)),
            _ => None,
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.read().contains_key(name)
    }
}

impl Default for TokenRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::LogLevel;

    #[test]
    fn test_first_registration_wins() {
        let registry = TokenRegistry::empty();
        assert!(registry.register_simple("app", |_| "first".to_string()));
        assert!(!registry.register_simple("app", |_| "second".to_string()));

        let entry = LogEntry::new(LogLevel::Info, "m");
        let handler = registry.simple("app").unwrap();
        assert_eq!(handler(&entry), "first");
    }

    #[test]
    fn test_extended_property_token() {
        let registry = TokenRegistry::empty();
        registry.register_extended_property("requestId");

        let handler = registry.simple("requestId").unwrap();
        let with = LogEntry::new(LogLevel::Info, "m").with_property("requestId", "r-1");
        let without = LogEntry::new(LogLevel::Info, "m");
        assert_eq!(handler(&with), "r-1");
        assert_eq!(handler(&without), MISSING_VALUE);
    }

    #[test]
    fn test_builtins_split_simple_and_date() {
        let registry = TokenRegistry::with_builtins();
        assert!(registry.simple("message").is_some());
        assert!(registry.date("message").is_none());
        assert!(registry.date("createTime").is_some());
        assert!(registry.simple("createTime").is_none());
    }
}
