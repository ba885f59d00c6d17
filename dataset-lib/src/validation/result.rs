//! Validation outcomes

use serde::Deserialize;
use serde::Serialize;

/// The class of a validation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationKind {
    /// A required field is empty.
    ValueMissing,
    /// The value does not conform to the field type.
    TypeMismatch,
    /// The value does not match the pattern.
    PatternMismatch,
    /// The value is above the upper bound.
    RangeOverflow,
    /// The value is below the lower bound.
    RangeUnderflow,
    /// The value is not on a step from the lower bound.
    StepMismatch,
    /// The value is longer than allowed.
    TooLong,
    /// The value is shorter than allowed.
    TooShort,
    /// Another record of the data set holds the same value.
    UniqueConflict,
    /// A custom predicate failed.
    Custom,
    /// The backend rejected the value on submit.
    ServerRejected,
}

impl ValidationKind {
    /// Returns `true` if this failure stops the remaining checks of a field.
    pub fn is_blocking(&self) -> bool {
        matches!(self, Self::ValueMissing | Self::TypeMismatch)
    }

    /// Returns the snake_case identifier of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ValueMissing => "value_missing",
            Self::TypeMismatch => "type_mismatch",
            Self::PatternMismatch => "pattern_mismatch",
            Self::RangeOverflow => "range_overflow",
            Self::RangeUnderflow => "range_underflow",
            Self::StepMismatch => "step_mismatch",
            Self::TooLong => "too_long",
            Self::TooShort => "too_short",
            Self::UniqueConflict => "unique_conflict",
            Self::Custom => "custom",
            Self::ServerRejected => "server_rejected",
        }
    }
}

impl std::fmt::Display for ValidationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One failure reason for a field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationMessage {
    /// The failure class.
    pub kind: ValidationKind,
    /// Human-readable message.
    pub message: String,
}

impl ValidationMessage {
    /// Creates a new message.
    pub fn new(kind: ValidationKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.kind)
    }
}

/// Result of validating one value.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum ValidationResult {
    /// The value passed every check.
    #[default]
    Valid,
    /// One or more checks failed, in pipeline order. Never empty.
    Invalid(Vec<ValidationMessage>),
}

impl ValidationResult {
    /// Builds a result from collected failures.
    pub fn from_messages(messages: Vec<ValidationMessage>) -> Self {
        if messages.is_empty() {
            Self::Valid
        } else {
            Self::Invalid(messages)
        }
    }

    /// Check if the value passed validation.
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }

    /// Check if any check failed.
    pub fn is_invalid(&self) -> bool {
        !self.is_valid()
    }

    /// Get all failures.
    pub fn errors(&self) -> &[ValidationMessage] {
        match self {
            Self::Valid => &[],
            Self::Invalid(errors) => errors,
        }
    }

    /// Get the first failure (if any).
    pub fn first_error(&self) -> Option<&ValidationMessage> {
        self.errors().first()
    }

    /// Returns `true` if any failure has the given kind.
    pub fn has_kind(&self, kind: ValidationKind) -> bool {
        self.errors().iter().any(|m| m.kind == kind)
    }

    /// Consumes the result and returns the failures.
    pub fn into_errors(self) -> Vec<ValidationMessage> {
        match self {
            Self::Valid => Vec::new(),
            Self::Invalid(errors) => errors,
        }
    }
}
