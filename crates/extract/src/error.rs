//! Extraction error types

use thiserror::Error;

/// Result type for extraction operations
pub type Result<T> = std::result::Result<T, ExtractError>;

/// Errors that can occur during extraction
#[derive(Debug, Error)]
pub enum ExtractError {
    /// Query template or time spec cannot be used
    #[error("invalid extract configuration: {0}")]
    Config(String),

    /// Upstream rejected the request (4xx) or kept failing after retries
    #[error("endpoint {endpoint} returned HTTP {status}: {body_prefix}")]
    Upstream {
        endpoint: String,
        status: u16,
        body_prefix: String,
    },

    /// Transport-level failure that survived every retry
    #[error("request to {endpoint} failed after {attempts} attempts: {source}")]
    Transport {
        endpoint: String,
        attempts: u32,
        #[source]
        source: reqwest::Error,
    },

    /// Response body was not valid JSON
    #[error("failed to parse response from {endpoint}: {source}")]
    Parse {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },

    /// Every configured endpoint failed this tick
    #[error("all {count} endpoints failed: {summary}")]
    AllEndpointsFailed { count: usize, summary: String },

    /// Debug dump could not be written
    #[error("failed to write debug output: {0}")]
    DebugDump(#[from] std::io::Error),

    /// The tick was cancelled
    #[error("extraction cancelled")]
    Cancelled,
}

impl ExtractError {
    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
