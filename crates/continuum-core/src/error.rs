//! Error types for Continuum Core.

use thiserror::Error;

/// Core errors that can occur while encoding or hashing records.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("encoding error: {0}")]
    EncodingError(String),

    #[error("decoding error: {0}")]
    DecodingError(String),

    #[error("invalid checksum text: {0}")]
    InvalidChecksum(String),

    #[error("invalid public key")]
    InvalidPublicKey,

    #[error("invalid signature")]
    InvalidSignature,
}

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        CoreError::EncodingError(e.to_string())
    }
}

/// Field-level validation errors for structured documents.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("missing required field '{0}'")]
    MissingField(String),

    #[error("field '{field}' must be {expected}")]
    WrongType { field: String, expected: &'static str },

    #[error("field '{field}' is empty")]
    EmptyField { field: String },

    #[error("field '{field}' does not match pattern {pattern}: {value:?}")]
    PatternMismatch {
        field: String,
        pattern: &'static str,
        value: String,
    },

    #[error("field '{field}' is not an ISO-8601 timestamp: {value:?}")]
    InvalidTimestamp { field: String, value: String },

    #[error("field '{field}' is not a 64-character hex SHA-256 digest: {value:?}")]
    InvalidChecksum { field: String, value: String },

    #[error("field '{field}' has unsupported value {value:?}")]
    UnsupportedValue { field: String, value: String },

    #[error("document must be a mapping at the top level")]
    NotAMapping,
}

impl ValidationError {
    /// The name of the offending field, when the error concerns one.
    pub fn field(&self) -> Option<&str> {
        match self {
            ValidationError::MissingField(field) => Some(field),
            ValidationError::WrongType { field, .. }
            | ValidationError::EmptyField { field }
            | ValidationError::PatternMismatch { field, .. }
            | ValidationError::InvalidTimestamp { field, .. }
            | ValidationError::InvalidChecksum { field, .. }
            | ValidationError::UnsupportedValue { field, .. } => Some(field),
            ValidationError::NotAMapping => None,
        }
    }

    /// Re-label the error with a different field name (e.g. `events[2].actor`).
    pub fn with_field(self, name: impl Into<String>) -> Self {
        let name = name.into();
        match self {
            ValidationError::MissingField(_) => ValidationError::MissingField(name),
            ValidationError::WrongType { expected, .. } => ValidationError::WrongType {
                field: name,
                expected,
            },
            ValidationError::EmptyField { .. } => ValidationError::EmptyField { field: name },
            ValidationError::PatternMismatch { pattern, value, .. } => {
                ValidationError::PatternMismatch {
                    field: name,
                    pattern,
                    value,
                }
            }
            ValidationError::InvalidTimestamp { value, .. } => ValidationError::InvalidTimestamp {
                field: name,
                value,
            },
            ValidationError::InvalidChecksum { value, .. } => ValidationError::InvalidChecksum {
                field: name,
                value,
            },
            ValidationError::UnsupportedValue { value, .. } => {
                ValidationError::UnsupportedValue { field: name, value }
            }
            ValidationError::NotAMapping => ValidationError::NotAMapping,
        }
    }
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_accessor() {
        let err = ValidationError::MissingField("actor".into());
        assert_eq!(err.field(), Some("actor"));
        assert_eq!(ValidationError::NotAMapping.field(), None);
    }

    #[test]
    fn test_with_field_relabels() {
        let err = ValidationError::EmptyField {
            field: "actor".into(),
        }
        .with_field("events[1].actor");
        assert_eq!(err.field(), Some("events[1].actor"));
    }
}
