//! Value enum for dynamic field values

use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::DateTime;
use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::Deserialize;
use serde::Serialize;

/// A transport-level mapping from field name to value.
pub type Row = HashMap<String, Value>;

/// A dynamic value held by a record field.
///
/// # Type Mapping
///
/// | Field type | Rust Variant |
/// |------------|--------------|
/// | empty | `Null` |
/// | boolean | `Bool` |
/// | number | `Int`, `Float`, `Decimal` |
/// | string, email, url | `String` |
/// | date | `DateTime` |
/// | list, `multiple` fields | `List` |
/// | object | `Object` |
///
/// # Example
///
/// ```
/// use dataset_lib::model::Value;
///
/// let name = Value::from("Contoso");
/// let age = Value::from(42i64);
/// let empty = Value::Null;
/// assert!(empty.is_empty());
/// assert!(!name.is_empty());
/// assert_eq!(age.as_f64(), Some(42.0));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum Value {
    /// Null/empty value.
    #[default]
    Null,
    /// Boolean value.
    Bool(bool),
    /// 64-bit integer.
    Int(i64),
    /// 64-bit floating point.
    Float(f64),
    /// String value.
    String(String),
    /// Arbitrary precision decimal.
    Decimal(Decimal),
    /// Date and time.
    DateTime(DateTime<Utc>),
    /// Sequence of values.
    List(Vec<Value>),
    /// Nested mapping.
    Object(HashMap<String, Value>),
}

impl Value {
    /// Returns `true` if this is a null value.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns `true` if the value counts as missing for a required field.
    ///
    /// Null, empty strings and empty lists are empty.
    pub fn is_empty(&self) -> bool {
        match self {
            Value::Null => true,
            Value::String(s) => s.is_empty(),
            Value::List(items) => items.is_empty(),
            _ => false,
        }
    }

    /// Returns the type name of this value.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Decimal(_) => "decimal",
            Value::String(_) => "string",
            Value::DateTime(_) => "datetime",
            Value::List(_) => "list",
            Value::Object(_) => "object",
        }
    }

    /// Returns the string slice if this is a string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the numeric value as `f64` for any number variant.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Float(n) => Some(*n),
            Value::Decimal(d) => d.to_f64(),
            _ => None,
        }
    }

    /// Returns `true` for `Int`, `Float` and `Decimal`.
    pub fn is_number(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Float(_) | Value::Decimal(_))
    }

    /// Resolves a dotted path (`"address.city"`) inside nested objects.
    ///
    /// An empty path returns `self`.
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        if path.is_empty() {
            return Some(self);
        }
        path.split('.').try_fold(self, |value, segment| match value {
            Value::Object(map) => map.get(segment),
            Value::List(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
    }

    /// Length in characters for strings, element count for lists.
    pub fn length(&self) -> Option<usize> {
        match self {
            Value::String(s) => Some(s.chars().count()),
            Value::List(items) => Some(items.len()),
            _ => None,
        }
    }

    /// Compares two values of compatible kinds.
    ///
    /// Numbers compare across variants, strings lexically, datetimes
    /// chronologically. `Null` sorts before everything else. Returns `None`
    /// for incompatible kinds.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Null, Value::Null) => Some(Ordering::Equal),
            (Value::Null, _) => Some(Ordering::Less),
            (_, Value::Null) => Some(Ordering::Greater),
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Decimal(a), Value::Decimal(b)) => Some(a.cmp(b)),
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (Value::DateTime(a), Value::DateTime(b)) => Some(a.cmp(b)),
            (a, b) if a.is_number() && b.is_number() => a.as_f64()?.partial_cmp(&b.as_f64()?),
            _ => None,
        }
    }

    /// Renders the value as a stable key, used for cross-page selection.
    pub fn to_key_string(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Int(n) => n.to_string(),
            Value::Float(n) => n.to_string(),
            Value::Decimal(d) => d.normalize().to_string(),
            Value::String(s) => s.clone(),
            Value::DateTime(dt) => dt.to_rfc3339(),
            Value::List(_) | Value::Object(_) => serde_json::to_string(self).unwrap_or_default(),
        }
    }
}

// =============================================================================
// From implementations
// =============================================================================

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<Decimal> for Value {
    fn from(v: Decimal) -> Self {
        Value::Decimal(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::DateTime(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::List(v)
    }
}

impl From<HashMap<String, Value>> for Value {
    fn from(v: HashMap<String, Value>) -> Self {
        Value::Object(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(inner) => inner.into(),
            None => Value::Null,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::String(s) => write!(f, "{:?}", s),
            other => f.write_str(&other.to_key_string()),
        }
    }
}

/// Builds a [`Row`] from `(field, value)` pairs.
///
/// # Example
///
/// ```
/// use dataset_lib::model::row;
///
/// let r = row([("name", "Ada".into()), ("age", 36i64.into())]);
/// assert_eq!(r.len(), 2);
/// ```
pub fn row<K: Into<String>>(pairs: impl IntoIterator<Item = (K, Value)>) -> Row {
    pairs.into_iter().map(|(k, v)| (k.into(), v)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_path_nested_object() {
        let address = row([("city", Value::from("Lyon"))]);
        let value = Value::Object(row([("address", Value::Object(address))]));
        assert_eq!(value.get_path("address.city"), Some(&Value::from("Lyon")));
        assert_eq!(value.get_path("address.zip"), None);
    }

    #[test]
    fn test_compare_numbers_across_variants() {
        assert_eq!(Value::Int(2).compare(&Value::Float(2.5)), Some(Ordering::Less));
        assert_eq!(Value::from("a").compare(&Value::Int(1)), None);
        assert_eq!(Value::Null.compare(&Value::Int(1)), Some(Ordering::Less));
    }

    #[test]
    fn test_deserialize_untagged() {
        let value: Value = serde_json::from_str(r#"{"tags": ["a", "b"], "n": 3}"#).unwrap();
        assert_eq!(value.get_path("n"), Some(&Value::Int(3)));
        assert_eq!(value.get_path("tags.1"), Some(&Value::from("b")));
    }

    #[test]
    fn test_empty_values() {
        assert!(Value::from("").is_empty());
        assert!(Value::List(vec![]).is_empty());
        assert!(!Value::Int(0).is_empty());
        assert!(!Value::Bool(false).is_empty());
    }
}
