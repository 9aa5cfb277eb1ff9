//! ElasticETL - Pipeline
//!
//! The dispatcher: owns every pipeline's lifetime and schedule.
//!
//! # Scheduling model
//!
//! ```text
//! [Manager] ──spawns──► [pipeline task]
//!                          │ tick (interval, missed ticks coalesced)
//!                          ▼
//!                 extract ──► transform ──► load
//!                 (awaited to completion before the next tick can fire)
//! ```
//!
//! - One execution at a time per pipeline: the run loop awaits each
//!   execution, and `MissedTickBehavior::Skip` folds overdue ticks into
//!   one.
//! - Different pipelines are fully independent tasks.
//! - Cancellation is cooperative via a per-pipeline `CancellationToken`;
//!   a cancelled tick delivers nothing to sinks.

mod error;
mod manager;
mod pipeline;

pub use error::{PipelineError, Result};
pub use manager::Manager;
pub use pipeline::Pipeline;

use std::time::Duration;

/// How long `Manager` waits for a pipeline's active tick on stop/replace
/// before forcing teardown
pub const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);
