//! Error taxonomy surfaced by the table access layer.
//!
//! Callers only ever see three kinds of failure: the operation does not fit
//! the bound schema, the caller supplied bad operands, or the store itself
//! failed. "Not found" is never an error; it is `Ok(None)`.

use std::error::Error as StdError;

use thiserror::Error;

/// Errors returned by the table access layer.
#[derive(Debug, Error)]
pub enum TableError {
    /// The operation is incompatible with the table or index shape.
    #[error("Schema error: {0}")]
    Schema(String),
    /// The caller supplied insufficient or invalid operands.
    #[error("Validation error: {0}")]
    Validation(String),
    /// Transport or service failure from the underlying store.
    #[error("Store error: {message}")]
    Store {
        message: String,
        #[source]
        source: Option<Box<dyn StdError + Send + Sync + 'static>>,
    },
}

impl TableError {
    pub fn schema(message: impl Into<String>) -> Self {
        Self::Schema(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Wraps an opaque store failure, keeping the cause attached.
    pub fn store<E>(message: impl Into<String>, source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::Store {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// A store failure with no underlying cause, e.g. raised by an in-process store.
    pub fn store_message(message: impl Into<String>) -> Self {
        Self::Store {
            message: message.into(),
            source: None,
        }
    }

    pub fn is_schema(&self) -> bool {
        matches!(self, Self::Schema(_))
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    pub fn is_store(&self) -> bool {
        matches!(self, Self::Store { .. })
    }
}

/// Result type for table access operations.
pub type Result<T> = std::result::Result<T, TableError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_error_display() {
        let error = TableError::schema("table has no sort key");
        assert_eq!(error.to_string(), "Schema error: table has no sort key");
        assert!(error.is_schema());
    }

    #[test]
    fn test_validation_error_display() {
        let error = TableError::validation("BETWEEN requires two values");
        assert_eq!(
            error.to_string(),
            "Validation error: BETWEEN requires two values"
        );
        assert!(error.is_validation());
    }

    #[test]
    fn test_store_error_keeps_source() {
        let cause = std::io::Error::new(std::io::ErrorKind::TimedOut, "timed out");
        let error = TableError::store("PutItem failed", cause);
        assert_eq!(error.to_string(), "Store error: PutItem failed");
        assert!(error.is_store());
        assert_eq!(error.source().map(|s| s.to_string()), Some("timed out".into()));
    }
}
