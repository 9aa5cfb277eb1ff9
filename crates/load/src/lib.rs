//! ElasticETL - Load
//!
//! The load stage of a pipeline: fans each tick's transformed batches out
//! to every configured sink concurrently.
//!
//! # Available sinks
//!
//! | Sink | Destination | Input |
//! |------|-------------|-------|
//! | `csv` | time-stamped file per tick | CSV rows |
//! | `remote_write` | Prometheus-style push endpoint | grouped time series |
//! | `otel` | OpenTelemetry collector | per-batch data points |
//! | `dump` | local file (JSON / exposition / OTEL) | full batches |
//!
//! # Isolation
//!
//! Sinks run concurrently and cannot observe each other's state; one
//! failing sink never suppresses another. The loader joins all of them and
//! reports the collected failures as a single aggregate error.

mod csv;
mod dump;
mod env;
mod error;
mod loader;
mod otel;
mod remote_write;
mod series;

use async_trait::async_trait;
use etl_protocol::TransformedBatch;
use tokio_util::sync::CancellationToken;

pub use csv::CsvSink;
pub use dump::DumpSink;
pub use env::{basic_auth_header, substitute_env_vars};
pub use error::{Result, SinkError};
pub use loader::Loader;
pub use otel::OtelSink;
pub use remote_write::RemoteWriteSink;
pub use series::group_rows;

/// Contract implemented by every load destination
#[async_trait]
pub trait Sink: Send + Sync {
    /// Deliver one tick's batches
    ///
    /// Called concurrently with other sinks' `load`; implementations hold
    /// no shared mutable state.
    async fn load(
        &self,
        cancel: &CancellationToken,
        batches: &[TransformedBatch],
    ) -> Result<()>;

    /// Release resources on pipeline teardown
    fn close(&self) -> Result<()> {
        Ok(())
    }

    /// Sink type name for logging and error aggregation
    fn kind(&self) -> &'static str;
}
