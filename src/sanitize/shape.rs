use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone};
use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::any::TypeId;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// A value that can be attached to a log entry and walked by the sanitizer.
///
/// Implementors describe their structure through [`Shape`]. Structs list
/// their public properties with [`Shape::Object`]; whether each property
/// survives sanitization is decided by the [`SafetyRegistry`](super::SafetyRegistry).
///
/// ```
/// use rask_log_pipeline::sanitize::{Loggable, Shape, field};
///
/// #[derive(Debug)]
/// struct Login {
///     user: String,
///     password: String,
/// }
///
/// impl Loggable for Login {
///     fn shape(&self) -> Shape<'_> {
///         Shape::Object(vec![field("user", &self.user), field("password", &self.password)])
///     }
/// }
/// ```
pub trait Loggable: Send + Sync + fmt::Debug + 'static {
    fn shape(&self) -> Shape<'_>;

    /// Runtime type key used for per-type caching.
    fn type_key(&self) -> TypeId {
        TypeId::of::<Self>()
    }

    fn type_label(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Structural view of a [`Loggable`] value.
pub enum Shape<'a> {
    Null,
    /// Value-like data emitted as-is.
    Value(Value),
    /// String-keyed map.
    Map(Vec<(String, &'a dyn Loggable)>),
    Sequence(Vec<&'a dyn Loggable>),
    /// Key/value pair; only the value is sanitized.
    Pair { key: Value, value: &'a dyn Loggable },
    /// Complex object with named public properties.
    Object(Vec<(&'static str, &'a dyn Loggable)>),
}

impl Shape<'_> {
    pub fn kind(&self) -> ShapeKind {
        match self {
            Shape::Null => ShapeKind::Null,
            Shape::Value(_) => ShapeKind::Value,
            Shape::Map(_) => ShapeKind::Map,
            Shape::Sequence(_) => ShapeKind::Sequence,
            Shape::Pair { .. } => ShapeKind::Pair,
            Shape::Object(_) => ShapeKind::Object,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeKind {
    Null,
    Value,
    Map,
    Sequence,
    Pair,
    Object,
}

/// Names one property of a [`Shape::Object`].
pub fn field<'a, T: Loggable>(name: &'static str, value: &'a T) -> (&'static str, &'a dyn Loggable) {
    (name, value)
}

/// Full structural rendering with no filtering applied.
pub fn describe(value: &dyn Loggable) -> Value {
    describe_shape(value.shape())
}

pub(crate) fn describe_shape(shape: Shape<'_>) -> Value {
    match shape {
        Shape::Null => Value::Null,
        Shape::Value(value) => value,
        Shape::Map(entries) => Value::Object(
            entries
                .into_iter()
                .map(|(key, value)| (key, describe(value)))
                .collect(),
        ),
        Shape::Sequence(items) => Value::Array(items.into_iter().map(describe).collect()),
        Shape::Pair { key, value } => pair_value(key, describe(value)),
        Shape::Object(properties) => Value::Object(
            properties
                .into_iter()
                .map(|(name, value)| (name.to_string(), describe(value)))
                .collect(),
        ),
    }
}

pub(crate) fn pair_value(key: Value, value: Value) -> Value {
    let mut map = Map::new();
    map.insert("key".to_string(), key);
    map.insert("value".to_string(), value);
    Value::Object(map)
}

macro_rules! value_like {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Loggable for $ty {
                fn shape(&self) -> Shape<'_> {
                    Shape::Value(Value::from(self.clone()))
                }
            }
        )*
    };
}

value_like!(bool, i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64, String);

impl Loggable for &'static str {
    fn shape(&self) -> Shape<'_> {
        Shape::Value(Value::from(*self))
    }
}

impl Loggable for char {
    fn shape(&self) -> Shape<'_> {
        Shape::Value(Value::String(self.to_string()))
    }
}

impl Loggable for Value {
    fn shape(&self) -> Shape<'_> {
        Shape::Value(self.clone())
    }
}

impl Loggable for Uuid {
    fn shape(&self) -> Shape<'_> {
        Shape::Value(Value::String(self.hyphenated().to_string()))
    }
}

impl<Tz> Loggable for DateTime<Tz>
where
    Tz: TimeZone + fmt::Debug + Send + Sync + 'static,
    Tz::Offset: fmt::Display + Send + Sync,
{
    fn shape(&self) -> Shape<'_> {
        Shape::Value(Value::String(self.to_rfc3339()))
    }
}

impl Loggable for NaiveDate {
    fn shape(&self) -> Shape<'_> {
        Shape::Value(Value::String(self.to_string()))
    }
}

impl Loggable for NaiveDateTime {
    fn shape(&self) -> Shape<'_> {
        Shape::Value(Value::String(self.to_string()))
    }
}

impl Loggable for Duration {
    fn shape(&self) -> Shape<'_> {
        Shape::Value(Value::String(format!("{self:?}")))
    }
}

impl Loggable for PathBuf {
    fn shape(&self) -> Shape<'_> {
        Shape::Value(Value::String(self.display().to_string()))
    }
}

// Wrappers are transparent at any depth: they report the innermost type so
// safety markers registered for `T` also apply to `Option<Box<T>>` and friends.

impl<T: Loggable> Loggable for Option<T> {
    fn shape(&self) -> Shape<'_> {
        match self {
            Some(value) => value.shape(),
            None => Shape::Null,
        }
    }

    fn type_key(&self) -> TypeId {
        match self {
            Some(value) => value.type_key(),
            None => TypeId::of::<T>(),
        }
    }

    fn type_label(&self) -> &'static str {
        match self {
            Some(value) => value.type_label(),
            None => std::any::type_name::<T>(),
        }
    }
}

impl<T: Loggable> Loggable for Box<T> {
    fn shape(&self) -> Shape<'_> {
        self.as_ref().shape()
    }

    fn type_key(&self) -> TypeId {
        self.as_ref().type_key()
    }

    fn type_label(&self) -> &'static str {
        self.as_ref().type_label()
    }
}

impl<T: Loggable> Loggable for Arc<T> {
    fn shape(&self) -> Shape<'_> {
        self.as_ref().shape()
    }

    fn type_key(&self) -> TypeId {
        self.as_ref().type_key()
    }

    fn type_label(&self) -> &'static str {
        self.as_ref().type_label()
    }
}

impl<T: Loggable> Loggable for Vec<T> {
    fn shape(&self) -> Shape<'_> {
        Shape::Sequence(self.iter().map(|item| item as &dyn Loggable).collect())
    }
}

impl<T: Loggable> Loggable for VecDeque<T> {
    fn shape(&self) -> Shape<'_> {
        Shape::Sequence(self.iter().map(|item| item as &dyn Loggable).collect())
    }
}

impl<V: Loggable> Loggable for HashMap<String, V> {
    fn shape(&self) -> Shape<'_> {
        Shape::Map(
            self.iter()
                .map(|(key, value)| (key.clone(), value as &dyn Loggable))
                .collect(),
        )
    }
}

impl<V: Loggable> Loggable for BTreeMap<String, V> {
    fn shape(&self) -> Shape<'_> {
        Shape::Map(
            self.iter()
                .map(|(key, value)| (key.clone(), value as &dyn Loggable))
                .collect(),
        )
    }
}

impl<V: Loggable> Loggable for IndexMap<String, V> {
    fn shape(&self) -> Shape<'_> {
        Shape::Map(
            self.iter()
                .map(|(key, value)| (key.clone(), value as &dyn Loggable))
                .collect(),
        )
    }
}

impl<K: Loggable, V: Loggable> Loggable for (K, V) {
    fn shape(&self) -> Shape<'_> {
        Shape::Pair {
            key: describe(&self.0),
            value: &self.1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug)]
    struct Point {
        x: i32,
        y: i32,
    }

    impl Loggable for Point {
        fn shape(&self) -> Shape<'_> {
            Shape::Object(vec![field("x", &self.x), field("y", &self.y)])
        }
    }

    #[test]
    fn test_describe_walks_everything() {
        let points = vec![Point { x: 1, y: 2 }];
        assert_eq!(describe(&points), json!([{"x": 1, "y": 2}]));
        assert_eq!(describe(&Option::<i32>::None), Value::Null);
        assert_eq!(
            describe(&("id".to_string(), 7_u32)),
            json!({"key": "id", "value": 7})
        );
    }

    #[test]
    fn test_type_key_is_concrete_through_trait_object() {
        let point = Point { x: 0, y: 0 };
        let object: &dyn Loggable = &point;
        assert_eq!(object.type_key(), TypeId::of::<Point>());
        assert!(object.type_label().ends_with("Point"));
    }

    #[test]
    fn test_wrappers_report_inner_type() {
        let wrapped = Some(Box::new(Point { x: 0, y: 0 }));
        assert_eq!(wrapped.type_key(), TypeId::of::<Point>());
        assert!(wrapped.type_label().ends_with("Point"));
        let nested = Arc::new(Some(Box::new(Point { x: 0, y: 0 })));
        assert_eq!(nested.type_key(), TypeId::of::<Point>());
        assert_eq!(Box::new(Point { x: 0, y: 0 }).type_key(), TypeId::of::<Point>());
        assert_eq!(Arc::new(Point { x: 0, y: 0 }).type_key(), TypeId::of::<Point>());
    }
}
