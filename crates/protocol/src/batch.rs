//! Extract and transform batch types

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::FlatMap;

/// Metadata carried alongside one endpoint response
#[derive(Debug, Clone, Serialize)]
pub struct ResultMetadata {
    /// Endpoint URL the query was sent to
    pub endpoint: String,
    /// Cluster name substituted into the query
    pub cluster: String,
    /// Query after macro expansion
    pub query: String,
    /// Query template as configured
    pub original_query: String,
    /// Response body length in bytes
    pub response_bytes: usize,
}

/// One successful endpoint call, flattened and filtered
#[derive(Debug, Clone, Serialize)]
pub struct ExtractResult {
    /// Wall-clock completion time of the call
    pub timestamp: DateTime<Utc>,
    /// Source URL
    pub source: String,
    /// Flattened response selected by the configured JSON path
    pub data: FlatMap,
    pub metadata: ResultMetadata,
}

/// An extract result after conversions, with the optional tabular form
///
/// When the pipeline requests CSV output, `csv_headers` is the sorted
/// de-indexed column set and every row in `csv_rows` has exactly
/// `csv_headers.len()` cells.
#[derive(Debug, Clone, Serialize)]
pub struct TransformedBatch {
    #[serde(flatten)]
    pub result: ExtractResult,
    /// Flat map after null substitution and conversion functions
    pub transformed_data: FlatMap,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub csv_headers: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub csv_rows: Option<Vec<Vec<String>>>,
}

impl TransformedBatch {
    /// Wrap an extract result with its converted data, no tabular form yet
    pub fn new(result: ExtractResult, transformed_data: FlatMap) -> Self {
        Self {
            result,
            transformed_data,
            csv_headers: None,
            csv_rows: None,
        }
    }

    /// Whether this batch carries a tabular representation
    pub fn has_rows(&self) -> bool {
        self.csv_headers.is_some() && self.csv_rows.as_ref().is_some_and(|r| !r.is_empty())
    }
}
