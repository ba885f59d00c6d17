//! Top-level error type for data set operations

use super::FieldError;
use super::SchemaError;
use super::TransportError;
use crate::model::RecordId;

/// Errors returned by [`DataSet`](crate::dataset::DataSet) operations.
///
/// Local validation failures are never reported through this type; they are
/// carried as data in [`Record::validation_errors`](crate::model::Record::validation_errors)
/// and in [`SubmitResult::ValidationFailure`](crate::dataset::SubmitResult).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// The transport failed to read a page. Records are left unchanged.
    #[error("Query failed: {0}")]
    QueryFailure(#[source] TransportError),

    /// A submit is already pending on this data set.
    #[error("A submit is already in progress")]
    SubmitInProgress,

    /// A detail data set was asked to create a record while its parent has
    /// no current record.
    #[error("Parent data set has no current record")]
    NoCurrentRequiredParent,

    /// A write targeted a field whose value is derived through `bind`.
    #[error("Field '{field}' is bound to '{bind}' and cannot be written")]
    ReadOnlyBoundField { field: String, bind: String },

    /// A read or submit was attempted on a data set without a transport.
    #[error("No transport configured")]
    NoTransport,

    /// The record does not belong to this data set (or was destroyed).
    #[error("Record {0} not found")]
    RecordNotFound(RecordId),

    /// Field access error.
    #[error(transparent)]
    Field(#[from] FieldError),

    /// Schema resolution error.
    #[error(transparent)]
    Schema(#[from] SchemaError),
}

impl Error {
    /// Creates a read-only bound field error.
    pub fn read_only_bound(field: impl Into<String>, bind: impl Into<String>) -> Self {
        Self::ReadOnlyBoundField {
            field: field.into(),
            bind: bind.into(),
        }
    }

    /// Returns the transport error behind a query failure, if any.
    pub fn transport(&self) -> Option<&TransportError> {
        match self {
            Self::QueryFailure(err) => Some(err),
            _ => None,
        }
    }
}
