//! Per-type sanitization of object graphs attached to log entries.
//!
//! For every runtime type the engine compiles a function from instance to a
//! safe-to-emit [`serde_json::Value`] and caches it for the process lifetime.
//! Classification order:
//! 1. clean types (injectable predicate) and value-like data: emitted as-is
//! 2. string-keyed maps: values sanitized, keys kept
//! 3. sequences: every element sanitized
//! 4. key/value pairs: value sanitized, key kept
//! 5. complex objects: filtered by the [`SafetyRegistry`]; an object with no
//!    loggable property becomes a redaction message naming its type

pub mod registry;
pub mod shape;

pub use registry::{SafetyMarker, SafetyRegistry};
pub use shape::{Loggable, Shape, ShapeKind, describe, field};

use parking_lot::RwLock;
use serde_json::Value;
use std::any::TypeId;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

use shape::{describe_shape, pair_value};

/// Compiled sanitizer for one runtime type.
pub type SanitizeFn = Arc<dyn for<'a> Fn(&SanitizeEngine, Shape<'a>) -> Value + Send + Sync>;

/// Declares a type clean: its values pass through without inspection.
pub type CleanPredicate = Arc<dyn Fn(TypeId, &'static str) -> bool + Send + Sync>;

pub struct SanitizeEngine {
    registry: Arc<SafetyRegistry>,
    is_clean: Option<CleanPredicate>,
    cache: RwLock<HashMap<TypeId, SanitizeFn>>,
}

impl SanitizeEngine {
    pub fn new(registry: Arc<SafetyRegistry>) -> Self {
        Self {
            registry,
            is_clean: None,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_clean_predicate<F>(mut self, predicate: F) -> Self
    where
        F: Fn(TypeId, &'static str) -> bool + Send + Sync + 'static,
    {
        self.is_clean = Some(Arc::new(predicate));
        self
    }

    pub fn registry(&self) -> &Arc<SafetyRegistry> {
        &self.registry
    }

    /// Safe representation of `value`. Null stays null at every depth.
    pub fn sanitize(&self, value: &dyn Loggable) -> Value {
        let shape = value.shape();
        if let Shape::Null = shape {
            return Value::Null;
        }
        let function = self.function_for(value, &shape);
        function(self, shape)
    }

    /// Number of types with a compiled function.
    pub fn cached_types(&self) -> usize {
        self.cache.read().len()
    }

    fn function_for(&self, value: &dyn Loggable, shape: &Shape<'_>) -> SanitizeFn {
        let key = value.type_key();
        if let Some(function) = self.cache.read().get(&key) {
            return Arc::clone(function);
        }

        let mut cache = self.cache.write();
        Arc::clone(
            cache
                .entry(key)
                .or_insert_with(|| self.compile(value, shape)),
        )
    }

    fn compile(&self, value: &dyn Loggable, shape: &Shape<'_>) -> SanitizeFn {
        let key = value.type_key();
        let label = value.type_label();
        debug!(type_name = label, kind = ?shape.kind(), "compiling sanitizer");

        let clean = self
            .is_clean
            .as_ref()
            .is_some_and(|predicate| predicate(key, label));
        if clean {
            return compiled(|_, shape| describe_shape(shape));
        }

        match shape {
            Shape::Null | Shape::Value(_) => compiled(|_, shape| describe_shape(shape)),
            Shape::Map(_) => compiled(|engine, shape| match shape {
                Shape::Map(entries) => Value::Object(
                    entries
                        .into_iter()
                        .map(|(key, value)| (key, engine.sanitize(value)))
                        .collect(),
                ),
                other => mismatched(other),
            }),
            Shape::Sequence(_) => compiled(|engine, shape| match shape {
                Shape::Sequence(items) => Value::Array(
                    items
                        .into_iter()
                        .map(|item| engine.sanitize(item))
                        .collect(),
                ),
                other => mismatched(other),
            }),
            Shape::Pair { .. } => compiled(|engine, shape| match shape {
                Shape::Pair { key, value } => pair_value(key, engine.sanitize(value)),
                other => mismatched(other),
            }),
            Shape::Object(properties) => {
                let allowed: HashSet<&'static str> = properties
                    .iter()
                    .map(|(name, _)| *name)
                    .filter(|name| self.registry.allows(key, name))
                    .collect();

                if allowed.is_empty() {
                    let message = redaction_message(label);
                    return compiled(move |_, _| Value::String(message.clone()));
                }

                compiled(move |engine, shape| match shape {
                    Shape::Object(properties) => Value::Object(
                        properties
                            .into_iter()
                            .filter(|(name, _)| allowed.contains(name))
                            .map(|(name, value)| (name.to_string(), engine.sanitize(value)))
                            .collect(),
                    ),
                    other => mismatched(other),
                })
            }
        }
    }
}

impl Default for SanitizeEngine {
    fn default() -> Self {
        Self::new(SafetyRegistry::global())
    }
}

impl std::fmt::Debug for SanitizeEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SanitizeEngine")
            .field("cached_types", &self.cached_types())
            .field("has_clean_predicate", &self.is_clean.is_some())
            .finish()
    }
}

/// Replacement text for an object with nothing safe to emit.
pub fn redaction_message(type_label: &str) -> String {
    format!("[{type_label} redacted: no properties are marked safe to log]")
}

fn compiled<F>(function: F) -> SanitizeFn
where
    F: for<'a> Fn(&SanitizeEngine, Shape<'a>) -> Value + Send + Sync + 'static,
{
    Arc::new(function)
}

// A type whose shape kind changes between instances is emitted as null
// rather than risk leaking unfiltered data.
fn mismatched(shape: Shape<'_>) -> Value {
    debug!(kind = ?shape.kind(), "shape differs from compiled sanitizer, emitting null");
    Value::Null
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;

    #[derive(Debug)]
    struct Credentials {
        user: String,
        password: String,
    }

    impl Loggable for Credentials {
        fn shape(&self) -> Shape<'_> {
            Shape::Object(vec![field("user", &self.user), field("password", &self.password)])
        }
    }

    #[derive(Debug)]
    struct Opaque {
        secret: String,
    }

    impl Loggable for Opaque {
        fn shape(&self) -> Shape<'_> {
            Shape::Object(vec![field("secret", &self.secret)])
        }
    }

    fn credentials() -> Credentials {
        Credentials {
            user: "alice".to_string(),
            password: "hunter2".to_string(),
        }
    }

    #[test]
    fn test_value_like_passthrough() {
        let engine = SanitizeEngine::new(Arc::new(SafetyRegistry::new()));
        assert_eq!(engine.sanitize(&42_i64), json!(42));
        assert_eq!(engine.sanitize(&"text".to_string()), json!("text"));
        assert_eq!(engine.sanitize(&Option::<String>::None), Value::Null);
    }

    #[test]
    fn test_safe_type_drops_unsafe_property() {
        let registry = Arc::new(SafetyRegistry::new());
        registry
            .mark_type_safe::<Credentials>()
            .mark_property_unsafe::<Credentials>("password");
        let engine = SanitizeEngine::new(registry);

        assert_eq!(engine.sanitize(&credentials()), json!({"user": "alice"}));
    }

    #[test]
    fn test_markers_apply_through_nested_wrappers() {
        let registry = Arc::new(SafetyRegistry::new());
        registry
            .mark_type_safe::<Credentials>()
            .mark_property_unsafe::<Credentials>("password");
        let engine = SanitizeEngine::new(registry);

        let expected = json!({"user": "alice"});
        assert_eq!(engine.sanitize(&Box::new(credentials())), expected);
        assert_eq!(engine.sanitize(&Some(Box::new(credentials()))), expected);
        assert_eq!(engine.sanitize(&Arc::new(Some(credentials()))), expected);
    }

    #[test]
    fn test_no_safe_properties_yields_redaction() {
        let engine = SanitizeEngine::new(Arc::new(SafetyRegistry::new()));
        let sanitized = engine.sanitize(&Opaque {
            secret: "x".to_string(),
        });

        let text = sanitized.as_str().unwrap();
        assert!(text.contains("Opaque"));
        assert!(text.contains("redacted"));
    }

    #[test]
    fn test_collections_recurse() {
        let registry = Arc::new(SafetyRegistry::new());
        registry.mark_property_safe::<Credentials>("user");
        let engine = SanitizeEngine::new(registry);

        let mut by_role = BTreeMap::new();
        by_role.insert("admin".to_string(), vec![credentials()]);
        assert_eq!(engine.sanitize(&by_role), json!({"admin": [{"user": "alice"}]}));

        let pair = ("owner".to_string(), credentials());
        assert_eq!(
            engine.sanitize(&pair),
            json!({"key": "owner", "value": {"user": "alice"}})
        );
    }

    #[test]
    fn test_clean_predicate_skips_inspection() {
        let engine = SanitizeEngine::new(Arc::new(SafetyRegistry::new()))
            .with_clean_predicate(|type_id, _| type_id == TypeId::of::<Credentials>());

        assert_eq!(
            engine.sanitize(&credentials()),
            json!({"user": "alice", "password": "hunter2"})
        );
    }

    #[test]
    fn test_function_is_cached_per_type() {
        let engine = SanitizeEngine::new(Arc::new(SafetyRegistry::new()));
        engine.sanitize(&1_i32);
        engine.sanitize(&2_i32);
        engine.sanitize(&vec![3_i32]);
        assert_eq!(engine.cached_types(), 2);
    }
}
