//! Validation failure payloads

use std::collections::HashMap;

use crate::model::RecordId;
use crate::validation::ValidationKind;
use crate::validation::ValidationMessage;

/// Validation errors collected for one record.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordValidationError {
    /// The record that failed validation.
    pub record: RecordId,
    /// Failure reasons per field, in schema order of the failing fields.
    pub fields: Vec<(String, Vec<ValidationMessage>)>,
}

impl RecordValidationError {
    /// Creates an error entry from a record's error map, ordered by `order`.
    pub(crate) fn from_map(
        record: RecordId,
        errors: &HashMap<String, Vec<ValidationMessage>>,
        order: impl IntoIterator<Item = impl AsRef<str>>,
    ) -> Self {
        let fields = order
            .into_iter()
            .filter_map(|name| {
                let name = name.as_ref();
                errors
                    .get(name)
                    .filter(|messages| !messages.is_empty())
                    .map(|messages| (name.to_string(), messages.clone()))
            })
            .collect();
        Self { record, fields }
    }

    /// Returns the messages for a field, if it failed.
    pub fn field(&self, name: &str) -> Option<&[ValidationMessage]> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, messages)| messages.as_slice())
    }

    /// Returns `true` if the given field failed with the given kind.
    pub fn has_kind(&self, name: &str, kind: ValidationKind) -> bool {
        self.field(name)
            .is_some_and(|messages| messages.iter().any(|m| m.kind == kind))
    }
}

impl std::fmt::Display for RecordValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "record {}:", self.record)?;
        for (field, messages) in &self.fields {
            for message in messages {
                write!(f, " {}: {};", field, message)?;
            }
        }
        Ok(())
    }
}
