//! Field schema
//!
//! A [`Schema`] is the resolved set of [`FieldDescriptor`]s shared by every
//! record of a data set. Resolution checks name uniqueness, compiles pattern
//! validators and builds the bind dependency graph (source field → bound
//! fields) that is walked on every write.

mod field;

pub use field::*;

use std::collections::HashMap;
use std::collections::HashSet;
use std::collections::VecDeque;

use crate::error::SchemaError;

/// The resolved field set of a data set.
///
/// # Example
///
/// ```
/// use dataset_lib::schema::{FieldDescriptor, FieldType, Schema};
///
/// let schema = Schema::new(vec![
///     FieldDescriptor::new("address", FieldType::Object),
///     FieldDescriptor::new("city", FieldType::String).bind("address.city"),
/// ])
/// .unwrap();
///
/// assert_eq!(schema.dependents_of("address"), vec!["city".to_string()]);
/// ```
#[derive(Debug, Clone)]
pub struct Schema {
    fields: Vec<FieldDescriptor>,
    index: HashMap<String, usize>,
    /// Direct dependents: bind root → fields bound to it.
    dependents: HashMap<String, Vec<String>>,
    /// Bound fields whose root is not declared here (resolved by an ancestor).
    external: Vec<String>,
}

impl Schema {
    /// Resolves descriptors into a schema.
    pub fn new(descriptors: Vec<FieldDescriptor>) -> Result<Self, SchemaError> {
        let mut index = HashMap::with_capacity(descriptors.len());
        let mut fields = Vec::with_capacity(descriptors.len());

        for mut descriptor in descriptors {
            if index.contains_key(&descriptor.name) {
                return Err(SchemaError::DuplicateField(descriptor.name));
            }
            for validator in &mut descriptor.validators {
                validator
                    .compile()
                    .map_err(|message| SchemaError::InvalidPattern {
                        field: descriptor.name.clone(),
                        message,
                    })?;
            }
            index.insert(descriptor.name.clone(), fields.len());
            fields.push(descriptor);
        }

        let mut dependents: HashMap<String, Vec<String>> = HashMap::new();
        let mut external = Vec::new();
        for descriptor in &fields {
            let Some(path) = descriptor.bind.as_deref() else {
                continue;
            };
            let root = bind_root(path);
            if root.is_empty() {
                return Err(SchemaError::UnresolvedBind {
                    field: descriptor.name.clone(),
                    bind: path.to_string(),
                });
            }
            // A field bound to its own name reads the same-named field of an
            // ancestor.
            if root != descriptor.name && index.contains_key(root) {
                dependents
                    .entry(root.to_string())
                    .or_default()
                    .push(descriptor.name.clone());
            } else {
                external.push(descriptor.name.clone());
            }
        }

        let schema = Self {
            fields,
            index,
            dependents,
            external,
        };
        schema.check_cycles()?;
        Ok(schema)
    }

    fn check_cycles(&self) -> Result<(), SchemaError> {
        for descriptor in self.fields.iter().filter(|d| d.is_bound()) {
            let mut seen = HashSet::new();
            let mut name = descriptor.name.as_str();
            while !self.is_external(name)
                && let Some(path) = self.field(name).and_then(|d| d.bind.as_deref())
            {
                if !seen.insert(name) {
                    return Err(SchemaError::CyclicBind(descriptor.name.clone()));
                }
                name = bind_root(path);
            }
        }
        Ok(())
    }

    /// Returns the descriptor for a field.
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.index.get(name).map(|&i| &self.fields[i])
    }

    /// Returns `true` if the field is declared.
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Returns all descriptors in declaration order.
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Returns all field names in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|d| d.name.as_str())
    }

    /// Returns the number of declared fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns `true` if no fields are declared.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Returns every field derived (directly or transitively) from `name`,
    /// in breadth-first order.
    pub fn dependents_of(&self, name: &str) -> Vec<String> {
        let mut out = Vec::new();
        let mut seen = HashSet::new();
        let mut queue: VecDeque<&str> = VecDeque::from([name]);
        while let Some(current) = queue.pop_front() {
            for dependent in self.dependents.get(current).into_iter().flatten() {
                if seen.insert(dependent.as_str()) {
                    out.push(dependent.clone());
                    queue.push_back(dependent);
                }
            }
        }
        out
    }

    /// Returns bound fields whose bind root must be resolved by an ancestor
    /// data set.
    pub fn external_binds(&self) -> &[String] {
        &self.external
    }

    /// Returns `true` if the bound field's root lives in an ancestor schema.
    pub fn is_external(&self, name: &str) -> bool {
        self.external.iter().any(|f| f == name)
    }

    /// Returns the names of stored (non-bound) fields.
    pub fn stored_names(&self) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .filter(|d| !d.is_bound())
            .map(|d| d.name.as_str())
    }
}

/// Returns the first segment of a dotted bind path.
pub(crate) fn bind_root(path: &str) -> &str {
    path.split('.').next().unwrap_or_default()
}

/// Returns the remainder of a dotted bind path after the root.
pub(crate) fn bind_rest(path: &str) -> &str {
    path.split_once('.').map(|(_, rest)| rest).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_field_rejected() {
        let err = Schema::new(vec![
            FieldDescriptor::new("name", FieldType::String),
            FieldDescriptor::new("name", FieldType::Number),
        ])
        .unwrap_err();
        assert_eq!(err, SchemaError::DuplicateField("name".into()));
    }

    #[test]
    fn test_invalid_pattern_rejected() {
        let err = Schema::new(vec![
            FieldDescriptor::new("code", FieldType::String).pattern("([a-z"),
        ])
            .unwrap_err();
        assert!(matches!(err, SchemaError::InvalidPattern { field, .. } if field == "code"));
    }

    #[test]
    fn test_transitive_dependents() {
        let schema = Schema::new(vec![
            FieldDescriptor::new("profile", FieldType::Object),
            FieldDescriptor::new("address", FieldType::Object).bind("profile.address"),
            FieldDescriptor::new("city", FieldType::String).bind("address.city"),
        ])
        .unwrap();
        assert_eq!(
            schema.dependents_of("profile"),
            vec!["address".to_string(), "city".to_string()]
        );
        assert!(schema.dependents_of("city").is_empty());
    }

    #[test]
    fn test_cyclic_bind_rejected() {
        let err = Schema::new(vec![
            FieldDescriptor::new("a", FieldType::Object).bind("b.x"),
            FieldDescriptor::new("b", FieldType::Object).bind("a.y"),
        ])
        .unwrap_err();
        assert!(matches!(err, SchemaError::CyclicBind(_)));
    }

    #[test]
    fn test_external_bind_is_tracked() {
        let schema = Schema::new(vec![
            FieldDescriptor::new("line", FieldType::Number),
            FieldDescriptor::new("order_no", FieldType::String).bind("number"),
        ])
        .unwrap();
        assert_eq!(schema.external_binds(), &["order_no".to_string()]);
        assert_eq!(schema.stored_names().collect::<Vec<_>>(), vec!["line"]);
    }

    #[test]
    fn test_same_name_bind_resolves_in_ancestor() {
        let schema = Schema::new(vec![
            FieldDescriptor::new("id", FieldType::Number),
            FieldDescriptor::new("customer", FieldType::String).bind("customer"),
            FieldDescriptor::new("city", FieldType::String).bind("customer.city"),
        ])
        .unwrap();
        assert_eq!(schema.external_binds(), &["customer".to_string()]);
        assert!(schema.is_external("customer"));
        assert_eq!(schema.dependents_of("customer"), vec!["city".to_string()]);
        assert_eq!(schema.stored_names().collect::<Vec<_>>(), vec!["id"]);
    }

    #[test]
    fn test_bind_path_segments() {
        assert_eq!(bind_root("address.city"), "address");
        assert_eq!(bind_rest("address.city"), "city");
        assert_eq!(bind_rest("address"), "");
    }
}
