//! ElasticETL - Protocol
//!
//! Shared data model for the ETL engine.
//!
//! # Overview
//!
//! Everything that flows between the extract, transform, and load stages is
//! defined here:
//!
//! - [`Value`] - dynamically typed JSON-like value with checked coercions
//! - [`FlatMap`] - flattened document keyed by dotted/indexed paths
//! - [`ExtractResult`] - one successful endpoint response after flattening
//! - [`TransformedBatch`] - an extract result plus converted data and the
//!   optional tabular (CSV) representation
//! - [`TimeSeries`] / [`Sample`] - grouped samples handed to network sinks
//!
//! # Design
//!
//! The flat map is a `BTreeMap` rather than a hash map: lexicographic key
//! order is what makes column derivation and row expansion reproducible
//! across runs, so determinism is part of the contract, not a nicety.

mod batch;
mod series;
mod value;

pub use batch::{ExtractResult, ResultMetadata, TransformedBatch};
pub use series::{Sample, TimeSeries};
pub use value::{FlatMap, Value};
