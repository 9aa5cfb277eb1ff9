//! Transform error types
//!
//! Any of these fails the whole tick: a batch with half-converted values
//! must never reach a sink.

use thiserror::Error;

/// Result type for transform operations
pub type Result<T> = std::result::Result<T, TransformError>;

/// Errors that can occur during transformation
#[derive(Debug, Error)]
pub enum TransformError {
    /// A value could not be coerced as requested
    #[error("conversion failed for field '{field}': {message}")]
    Conversion { field: String, message: String },

    /// Conversion rule names a function that does not exist
    #[error("unknown conversion function: {0}")]
    UnknownFunction(String),

    /// `convert_type` with an unsupported target
    #[error("unsupported target type: {0}")]
    UnsupportedType(String),

    /// Unit conversion with an unsupported source unit
    #[error("unsupported unit: {0}")]
    UnsupportedUnit(String),
}

impl TransformError {
    /// Create a conversion error for a specific field
    pub fn conversion(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Conversion {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TransformError::conversion("cpu.user", "cannot convert bool to float");
        assert!(err.to_string().contains("cpu.user"));

        let err = TransformError::UnknownFunction("convert_to_tb".into());
        assert!(err.to_string().contains("convert_to_tb"));

        let err = TransformError::UnsupportedUnit("pb".into());
        assert!(err.to_string().contains("pb"));
    }
}
