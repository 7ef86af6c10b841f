//! Error types for schema binding and operator configuration.

use crate::types::FieldType;
use alloc::string::String;
use core::fmt;

/// Result type alias for Trellis operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Errors raised while binding schemas or constructing operators.
///
/// All of these are structural mismatches: they are fatal at the point of
/// occurrence and are never retried. A failed bind leaves the operator in a
/// safe, unbound state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A named field was not present in the schema being bound.
    FieldNotFound {
        field: String,
        context: String,
        schema: String,
    },
    /// A field was requested as an incompatible accessor type.
    CastError { from: FieldType, to: FieldType },
    /// Invalid construction parameters, detected before any data flows.
    InvalidConfig { message: String },
    /// Left/right schemas disagree structurally (e.g. join key types).
    SchemaMismatch { message: String },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::FieldNotFound {
                field,
                context,
                schema,
            } => {
                write!(
                    f,
                    "Field '{}' not found in schema '{}' (required by {})",
                    field, schema, context
                )
            }
            Error::CastError { from, to } => {
                write!(f, "Cannot cast {} field to {}", from, to)
            }
            Error::InvalidConfig { message } => {
                write!(f, "Invalid configuration: {}", message)
            }
            Error::SchemaMismatch { message } => {
                write!(f, "Schema mismatch: {}", message)
            }
        }
    }
}

impl Error {
    /// Creates a field-not-found error.
    pub fn field_not_found(
        field: impl Into<String>,
        context: impl Into<String>,
        schema: impl Into<String>,
    ) -> Self {
        Error::FieldNotFound {
            field: field.into(),
            context: context.into(),
            schema: schema.into(),
        }
    }

    /// Creates a cast error.
    pub fn cast_error(from: FieldType, to: FieldType) -> Self {
        Error::CastError { from, to }
    }

    /// Creates an invalid-configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Error::InvalidConfig {
            message: message.into(),
        }
    }

    /// Creates a schema-mismatch error.
    pub fn schema_mismatch(message: impl Into<String>) -> Self {
        Error::SchemaMismatch {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn test_error_display() {
        let err = Error::field_not_found("px", "aggregation 'sum'", "orders");
        let text = err.to_string();
        assert!(text.contains("px"));
        assert!(text.contains("orders"));
        assert!(text.contains("sum"));

        let err = Error::cast_error(FieldType::Str, FieldType::Int);
        assert!(err.to_string().contains("Str"));

        let err = Error::invalid_config("maxPendingRows must be positive");
        assert!(err.to_string().contains("positive"));
    }

    #[test]
    fn test_error_constructors() {
        match Error::schema_mismatch("key types differ") {
            Error::SchemaMismatch { message } => assert_eq!(message, "key types differ"),
            _ => panic!("Wrong error type"),
        }
    }
}
