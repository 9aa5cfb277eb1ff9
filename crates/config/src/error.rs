//! Configuration error types

use std::io;

use thiserror::Error;

/// Result type for configuration operations
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur when loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file
    #[error("failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    /// Failed to parse TOML
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Validation error - required field missing
    #[error("pipeline '{pipeline}' is missing required field '{field}'")]
    MissingField {
        pipeline: String,
        field: &'static str,
    },

    /// Validation error - invalid value
    #[error("pipeline '{pipeline}' has invalid {field}: {message}")]
    InvalidValue {
        pipeline: String,
        field: &'static str,
        message: String,
    },

    /// Validation error - two pipelines share a name
    #[error("duplicate pipeline name '{0}'")]
    DuplicatePipeline(String),
}

impl ConfigError {
    /// Create a MissingField error
    pub fn missing_field(pipeline: impl Into<String>, field: &'static str) -> Self {
        Self::MissingField {
            pipeline: pipeline.into(),
            field,
        }
    }

    /// Create an InvalidValue error
    pub fn invalid_value(
        pipeline: impl Into<String>,
        field: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            pipeline: pipeline.into(),
            field,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_field_display() {
        let err = ConfigError::missing_field("latency", "urls");
        assert!(err.to_string().contains("latency"));
        assert!(err.to_string().contains("urls"));
    }

    #[test]
    fn test_invalid_value_display() {
        let err = ConfigError::invalid_value("latency", "start_time", "bad expression");
        assert!(err.to_string().contains("start_time"));
        assert!(err.to_string().contains("bad expression"));
    }

    #[test]
    fn test_duplicate_pipeline_display() {
        let err = ConfigError::DuplicatePipeline("latency".into());
        assert!(err.to_string().contains("duplicate"));
        assert!(err.to_string().contains("latency"));
    }
}
