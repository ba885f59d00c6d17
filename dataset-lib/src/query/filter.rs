//! Filter conditions for read requests.

use std::cmp::Ordering;

use serde::Deserialize;
use serde::Serialize;

use crate::model::Row;
use crate::model::Value;

/// A filter condition for reading records.
///
/// Filters can be combined using logical operators (`And`, `Or`, `Not`) to
/// build complex conditions. Field names may be dotted paths into object
/// values.
///
/// # Example
///
/// ```
/// use dataset_lib::query::Filter;
///
/// // Simple equality filter
/// let filter = Filter::eq("status", 0);
///
/// // Combined filter
/// let filter = Filter::and([
///     Filter::eq("status", 0),
///     Filter::gt("revenue", 1_000_000),
/// ]);
///
/// // Using combinators
/// let filter = Filter::eq("status", 0)
///     .and_also(Filter::gt("revenue", 1_000_000))
///     .not();
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Filter {
    /// Equality: `field == value`
    Eq(String, Value),
    /// Not equal: `field != value`
    Ne(String, Value),
    /// Greater than: `field > value`
    Gt(String, Value),
    /// Greater than or equal: `field >= value`
    Ge(String, Value),
    /// Less than: `field < value`
    Lt(String, Value),
    /// Less than or equal: `field <= value`
    Le(String, Value),
    /// Contains substring (case-insensitive).
    Contains(String, String),
    /// Starts with (case-insensitive).
    StartsWith(String, String),
    /// Ends with (case-insensitive).
    EndsWith(String, String),
    /// Value is one of the given values.
    In(String, Vec<Value>),
    /// Is null or absent.
    IsNull(String),
    /// Is present and not null.
    IsNotNull(String),
    /// Logical AND of multiple filters.
    And(Vec<Filter>),
    /// Logical OR of multiple filters.
    Or(Vec<Filter>),
    /// Logical negation.
    Not(Box<Filter>),
}

impl Filter {
    /// Creates an equality filter.
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Eq(field.into(), value.into())
    }

    /// Creates a not-equal filter.
    pub fn ne(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Ne(field.into(), value.into())
    }

    /// Creates a greater-than filter.
    pub fn gt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Gt(field.into(), value.into())
    }

    /// Creates a greater-than-or-equal filter.
    pub fn ge(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Ge(field.into(), value.into())
    }

    /// Creates a less-than filter.
    pub fn lt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Lt(field.into(), value.into())
    }

    /// Creates a less-than-or-equal filter.
    pub fn le(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Le(field.into(), value.into())
    }

    /// Creates a contains filter.
    pub fn contains(field: impl Into<String>, value: impl Into<String>) -> Self {
        Filter::Contains(field.into(), value.into())
    }

    /// Creates a starts-with filter.
    pub fn starts_with(field: impl Into<String>, value: impl Into<String>) -> Self {
        Filter::StartsWith(field.into(), value.into())
    }

    /// Creates an ends-with filter.
    pub fn ends_with(field: impl Into<String>, value: impl Into<String>) -> Self {
        Filter::EndsWith(field.into(), value.into())
    }

    /// Creates a membership filter.
    pub fn one_of(field: impl Into<String>, values: impl IntoIterator<Item = Value>) -> Self {
        Filter::In(field.into(), values.into_iter().collect())
    }

    /// Creates an is-null filter.
    pub fn is_null(field: impl Into<String>) -> Self {
        Filter::IsNull(field.into())
    }

    /// Creates an is-not-null filter.
    pub fn is_not_null(field: impl Into<String>) -> Self {
        Filter::IsNotNull(field.into())
    }

    /// Creates a logical AND of multiple filters.
    pub fn and(filters: impl IntoIterator<Item = Filter>) -> Self {
        Filter::And(filters.into_iter().collect())
    }

    /// Creates a logical OR of multiple filters.
    pub fn or(filters: impl IntoIterator<Item = Filter>) -> Self {
        Filter::Or(filters.into_iter().collect())
    }

    /// Combines this filter with another using logical AND.
    pub fn and_also(self, other: Filter) -> Self {
        match self {
            Filter::And(mut filters) => {
                filters.push(other);
                Filter::And(filters)
            }
            _ => Filter::And(vec![self, other]),
        }
    }

    /// Combines this filter with another using logical OR.
    pub fn or_else(self, other: Filter) -> Self {
        match self {
            Filter::Or(mut filters) => {
                filters.push(other);
                Filter::Or(filters)
            }
            _ => Filter::Or(vec![self, other]),
        }
    }

    /// Negates this filter.
    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        match self {
            Filter::Not(inner) => *inner,
            other => Filter::Not(Box::new(other)),
        }
    }

    /// Evaluates the filter against a row.
    pub fn matches(&self, row: &Row) -> bool {
        match self {
            Filter::Eq(field, value) => cmp(row, field, value) == Some(Ordering::Equal),
            Filter::Ne(field, value) => cmp(row, field, value) != Some(Ordering::Equal),
            Filter::Gt(field, value) => {
                non_null(row, field) && cmp(row, field, value) == Some(Ordering::Greater)
            }
            Filter::Ge(field, value) => {
                non_null(row, field)
                    && matches!(cmp(row, field, value), Some(Ordering::Greater | Ordering::Equal))
            }
            Filter::Lt(field, value) => {
                non_null(row, field) && cmp(row, field, value) == Some(Ordering::Less)
            }
            Filter::Le(field, value) => {
                non_null(row, field)
                    && matches!(cmp(row, field, value), Some(Ordering::Less | Ordering::Equal))
            }
            Filter::Contains(field, needle) => text(row, field, |s, n| s.contains(n), needle),
            Filter::StartsWith(field, needle) => text(row, field, |s, n| s.starts_with(n), needle),
            Filter::EndsWith(field, needle) => text(row, field, |s, n| s.ends_with(n), needle),
            Filter::In(field, values) => values
                .iter()
                .any(|value| cmp(row, field, value) == Some(Ordering::Equal)),
            Filter::IsNull(field) => !non_null(row, field),
            Filter::IsNotNull(field) => non_null(row, field),
            Filter::And(filters) => filters.iter().all(|f| f.matches(row)),
            Filter::Or(filters) => filters.iter().any(|f| f.matches(row)),
            Filter::Not(inner) => !inner.matches(row),
        }
    }
}

fn lookup<'a>(row: &'a Row, field: &str) -> &'a Value {
    let (root, rest) = field.split_once('.').unwrap_or((field, ""));
    row.get(root)
        .and_then(|value| value.get_path(rest))
        .unwrap_or(&Value::Null)
}

fn non_null(row: &Row, field: &str) -> bool {
    !lookup(row, field).is_null()
}

fn cmp(row: &Row, field: &str, value: &Value) -> Option<Ordering> {
    lookup(row, field).compare(value)
}

fn text(row: &Row, field: &str, test: impl Fn(&str, &str) -> bool, needle: &str) -> bool {
    match lookup(row, field) {
        Value::String(s) => test(&s.to_lowercase(), &needle.to_lowercase()),
        _ => false,
    }
}
