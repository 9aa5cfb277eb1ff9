//! Pipeline error types

use thiserror::Error;

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors from pipeline construction and execution
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The extract stage failed the tick
    #[error("extraction failed: {0}")]
    Extract(#[from] etl_extract::ExtractError),

    /// The transform stage failed the tick
    #[error("transformation failed: {0}")]
    Transform(#[from] etl_transform::TransformError),

    /// The load stage failed the tick
    #[error("loading failed: {0}")]
    Load(#[from] etl_load::SinkError),

    /// Attempted to start a pipeline that is disabled in config
    #[error("pipeline '{0}' is disabled")]
    Disabled(String),
}

impl PipelineError {
    /// Whether this error is a cooperative cancellation rather than a
    /// real failure
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            PipelineError::Extract(etl_extract::ExtractError::Cancelled)
                | PipelineError::Load(etl_load::SinkError::Cancelled)
        )
    }
}
