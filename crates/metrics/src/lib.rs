//! ElasticETL - Metrics
//!
//! Per-pipeline run counters with last-error capture, readable as a JSON
//! snapshot and optionally served over HTTP.
//!
//! # Design
//!
//! - Counters are atomics; only the last-run/last-error capture takes a
//!   short mutex
//! - The collector is cheap to clone and shared by the dispatcher, the
//!   HTTP endpoint, and the binary
//! - Recording never fails and never blocks on I/O

mod collector;
mod server;

pub use collector::{Collector, MetricsSnapshot, PipelineSnapshot};
pub use server::serve_metrics;
