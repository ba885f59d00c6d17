//! Ordering of read results.

use std::cmp::Ordering;

use serde::Deserialize;
use serde::Serialize;

use crate::model::Row;
use crate::model::Value;

/// Sort direction for ordering results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Ascending order (A-Z, 0-9).
    Asc,
    /// Descending order (Z-A, 9-0).
    Desc,
}

/// Specifies the ordering of read results.
///
/// Multiple fields can be chained together for secondary, tertiary, etc. sorting.
///
/// # Example
///
/// ```
/// use dataset_lib::query::OrderBy;
///
/// let order = OrderBy::desc("revenue").then_asc("name");
/// assert_eq!(order.fields().len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBy {
    pub(crate) fields: Vec<(String, Direction)>,
}

impl OrderBy {
    /// Creates an ascending order on a field.
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            fields: vec![(field.into(), Direction::Asc)],
        }
    }

    /// Creates a descending order on a field.
    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            fields: vec![(field.into(), Direction::Desc)],
        }
    }

    /// Adds a secondary ascending order on a field.
    pub fn then_asc(mut self, field: impl Into<String>) -> Self {
        self.fields.push((field.into(), Direction::Asc));
        self
    }

    /// Adds a secondary descending order on a field.
    pub fn then_desc(mut self, field: impl Into<String>) -> Self {
        self.fields.push((field.into(), Direction::Desc));
        self
    }

    /// Returns the ordered fields with their directions.
    pub fn fields(&self) -> &[(String, Direction)] {
        &self.fields
    }

    /// Compares two rows by each sort field in turn.
    ///
    /// Missing values compare as `Null`; incomparable values are equal.
    pub fn compare(&self, a: &Row, b: &Row) -> Ordering {
        for (field, direction) in &self.fields {
            let left = a.get(field).unwrap_or(&Value::Null);
            let right = b.get(field).unwrap_or(&Value::Null);
            let ordering = left.compare(right).unwrap_or(Ordering::Equal);
            let ordering = match direction {
                Direction::Asc => ordering,
                Direction::Desc => ordering.reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::row;

    #[test]
    fn test_secondary_order_breaks_ties() {
        let order = OrderBy::desc("score").then_asc("name");
        let a = row([("score", Value::Int(3)), ("name", Value::from("b"))]);
        let b = row([("score", Value::Int(3)), ("name", Value::from("a"))]);
        let c = row([("score", Value::Int(5)), ("name", Value::from("z"))]);

        let mut rows = vec![a.clone(), b.clone(), c.clone()];
        rows.sort_by(|x, y| order.compare(x, y));
        assert_eq!(rows, vec![c, b, a]);
    }

    #[test]
    fn test_missing_sorts_first_ascending() {
        let order = OrderBy::asc("n");
        let present = row([("n", Value::Int(1))]);
        let missing = Row::new();
        assert_eq!(order.compare(&missing, &present), Ordering::Less);
    }
}
