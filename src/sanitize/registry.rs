use parking_lot::RwLock;
use std::any::TypeId;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, LazyLock};

use super::shape::Loggable;

/// Explicit marker attached to a type's property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SafetyMarker {
    SafeToLog,
    NotSafeToLog,
}

/// Process-wide allow/deny decisions for sanitization.
///
/// Populate at startup, before the first entry carrying the affected types is
/// sanitized: [`SanitizeEngine`](super::SanitizeEngine) caches its per-type
/// decision on first use and never revisits it.
#[derive(Debug, Default)]
pub struct SafetyRegistry {
    safe_types: RwLock<HashSet<TypeId>>,
    properties: RwLock<HashMap<(TypeId, String), SafetyMarker>>,
}

static GLOBAL: LazyLock<Arc<SafetyRegistry>> = LazyLock::new(|| Arc::new(SafetyRegistry::new()));

impl SafetyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared registry living for the whole process.
    pub fn global() -> Arc<SafetyRegistry> {
        Arc::clone(&GLOBAL)
    }

    /// Every property of `T` is logged unless marked not-safe.
    pub fn mark_type_safe<T: Loggable>(&self) -> &Self {
        self.safe_types.write().insert(TypeId::of::<T>());
        self
    }

    pub fn mark_property_safe<T: Loggable>(&self, property: &str) -> &Self {
        self.mark_property(TypeId::of::<T>(), property, SafetyMarker::SafeToLog)
    }

    pub fn mark_property_unsafe<T: Loggable>(&self, property: &str) -> &Self {
        self.mark_property(TypeId::of::<T>(), property, SafetyMarker::NotSafeToLog)
    }

    pub fn mark_property(&self, type_id: TypeId, property: &str, marker: SafetyMarker) -> &Self {
        self.properties
            .write()
            .insert((type_id, property.to_string()), marker);
        self
    }

    pub fn is_type_safe(&self, type_id: TypeId) -> bool {
        self.safe_types.read().contains(&type_id)
    }

    pub fn property_marker(&self, type_id: TypeId, property: &str) -> Option<SafetyMarker> {
        self.properties
            .read()
            .get(&(type_id, property.to_string()))
            .copied()
    }

    /// Whether `property` of the given type survives sanitization.
    pub fn allows(&self, type_id: TypeId, property: &str) -> bool {
        let marker = self.property_marker(type_id, property);
        if self.is_type_safe(type_id) {
            marker != Some(SafetyMarker::NotSafeToLog)
        } else {
            marker == Some(SafetyMarker::SafeToLog)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sanitize::Shape;

    #[derive(Debug)]
    struct Account;

    impl Loggable for Account {
        fn shape(&self) -> Shape<'_> {
            Shape::Object(Vec::new())
        }
    }

    #[test]
    fn test_unmarked_type_allows_only_safe_properties() {
        let registry = SafetyRegistry::new();
        registry.mark_property_safe::<Account>("id");
        let key = TypeId::of::<Account>();

        assert!(registry.allows(key, "id"));
        assert!(!registry.allows(key, "email"));
    }

    #[test]
    fn test_safe_type_denies_only_unsafe_properties() {
        let registry = SafetyRegistry::new();
        registry
            .mark_type_safe::<Account>()
            .mark_property_unsafe::<Account>("password");
        let key = TypeId::of::<Account>();

        assert!(registry.allows(key, "email"));
        assert!(!registry.allows(key, "password"));
    }
}
