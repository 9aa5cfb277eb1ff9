//! Sink error types

use thiserror::Error;

/// Result type for sink operations
pub type Result<T> = std::result::Result<T, SinkError>;

/// Errors that can occur while loading to a sink
#[derive(Debug, Error)]
pub enum SinkError {
    /// Sink construction failed
    #[error("failed to initialize sink: {0}")]
    Init(String),

    /// Destination rejected the payload
    #[error("{kind} endpoint returned HTTP {status}")]
    Http { kind: &'static str, status: u16 },

    /// Request never completed
    #[error("{kind} request failed: {source}")]
    Request {
        kind: &'static str,
        #[source]
        source: reqwest::Error,
    },

    /// Payload could not be serialised
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// File sink I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failures collected from the concurrent sink fan-out
    #[error("{} sink(s) failed: {}", errors.len(), errors.join("; "))]
    Multi { errors: Vec<String> },

    /// The tick was cancelled mid-delivery
    #[error("load cancelled")]
    Cancelled,
}

impl SinkError {
    /// Create an initialization error
    pub fn init(msg: impl Into<String>) -> Self {
        Self::Init(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multi_error_display() {
        let err = SinkError::Multi {
            errors: vec!["csv: disk full".into(), "otel: HTTP 503".into()],
        };
        let text = err.to_string();
        assert!(text.contains("2 sink(s) failed"));
        assert!(text.contains("disk full"));
        assert!(text.contains("HTTP 503"));
    }

    #[test]
    fn test_http_error_display() {
        let err = SinkError::Http {
            kind: "remote_write",
            status: 429,
        };
        assert!(err.to_string().contains("remote_write"));
        assert!(err.to_string().contains("429"));
    }
}
