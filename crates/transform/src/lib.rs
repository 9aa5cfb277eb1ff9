//! ElasticETL - Transform
//!
//! The transform stage of a pipeline: value conversions over the flattened
//! data, the tabular (CSV) expansion, and the optional history of prior
//! batches.
//!
//! # Flow
//!
//! ```text
//! ExtractResult ──► [null→0 substitution] ──► [conversion functions]
//!                                                     │
//!                        output_format = csv?         ▼
//!                  ┌──────────────────────────► TransformedBatch
//!                  │
//!                  ▼
//!        [columnise: headers + Cartesian row expansion]
//! ```
//!
//! # Modules
//!
//! - `convert` - typed and byte-unit conversions with regex field matching
//! - `tabulate` - de-indexed column derivation and array-index row expansion
//! - `history` - bounded ring of previous batch sets
//! - `transformer` - per-batch orchestration

mod convert;
mod error;
mod history;
mod tabulate;
mod transformer;

pub use convert::{apply_conversions, substitute_zeros_for_null};
pub use error::{Result, TransformError};
pub use history::HistoryRing;
pub use tabulate::{deindex, derive_headers, expand_rows, tabulate};
pub use transformer::Transformer;
