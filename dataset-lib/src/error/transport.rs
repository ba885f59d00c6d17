//! Transport error types

use std::collections::HashMap;

/// Field-level rejections reported by a backend, keyed by field name.
pub type FieldRejections = HashMap<String, Vec<String>>;

/// An error reported by a [`Transport`](crate::transport::Transport) call.
///
/// Carries a human-readable message and, optionally, per-row field errors
/// keyed by the row's position in the submitted batch.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct TransportError {
    /// Human-readable error message.
    pub message: String,
    /// Status code reported by the backend, if any.
    pub status: Option<u16>,
    /// Field errors per batch row index.
    pub field_errors: HashMap<usize, FieldRejections>,
}

impl TransportError {
    /// Creates a new transport error with a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: None,
            field_errors: HashMap::new(),
        }
    }

    /// Creates a new transport error carrying a status code.
    pub fn with_status(status: u16, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: Some(status),
            field_errors: HashMap::new(),
        }
    }

    /// Adds a field rejection for the row at `index` in the batch.
    pub fn reject_field(
        mut self,
        index: usize,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        self.field_errors
            .entry(index)
            .or_default()
            .entry(field.into())
            .or_default()
            .push(message.into());
        self
    }

    /// Returns the field rejections for the row at `index`, if any.
    pub fn rejections_for(&self, index: usize) -> Option<&FieldRejections> {
        self.field_errors.get(&index)
    }

    /// Returns `true` if the backend reported any field-level errors.
    pub fn has_field_errors(&self) -> bool {
        !self.field_errors.is_empty()
    }

    /// Returns `true` if this error is potentially retryable.
    pub fn is_retryable(&self) -> bool {
        match self.status {
            Some(status) => matches!(status, 408 | 429 | 500 | 502 | 503 | 504),
            None => !self.has_field_errors(),
        }
    }
}
