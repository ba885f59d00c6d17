//! Schema construction errors

/// Errors raised while resolving a set of field descriptors into a schema.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    /// Two descriptors share the same name.
    #[error("Field '{0}' is declared more than once")]
    DuplicateField(String),

    /// A `bind` path does not resolve to a field of this or an ancestor schema.
    #[error("Field '{field}' binds to '{bind}', which does not resolve to a declared field")]
    UnresolvedBind { field: String, bind: String },

    /// Bound fields form a cycle.
    #[error("Field '{0}' is part of a bind cycle")]
    CyclicBind(String),

    /// A pattern validator holds an invalid regular expression.
    #[error("Field '{field}' has an invalid pattern: {message}")]
    InvalidPattern { field: String, message: String },

    /// A link between a parent and a detail data set names an unknown field.
    #[error("Link field '{field}' is not declared in the {side} schema")]
    UnknownLinkField { field: String, side: &'static str },
}
