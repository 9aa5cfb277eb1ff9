//! A single pipeline's execution

use std::time::{Duration, Instant};

use etl_config::PipelineConfig;
use etl_extract::Extractor;
use etl_load::Loader;
use etl_metrics::Collector;
use etl_transform::Transformer;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::Result;

/// One ETL pipeline: extractor, transformer, and sinks bound to a config
///
/// The config is immutable; reconfiguration replaces the whole pipeline.
pub struct Pipeline {
    config: PipelineConfig,
    extractor: Extractor,
    transformer: Transformer,
    loader: Loader,
    metrics: Collector,
}

/// What one successful tick processed
struct RunStats {
    entries: u64,
    bytes: u64,
}

impl Pipeline {
    /// Build a pipeline's stages from its config
    pub fn new(config: PipelineConfig, metrics: Collector) -> Result<Self> {
        let extractor = Extractor::new(config.extract.clone())?;
        let transformer = Transformer::new(config.transform.clone());
        let loader = Loader::new(&config.load)?;

        Ok(Self {
            config,
            extractor,
            transformer,
            loader,
            metrics,
        })
    }

    /// Pipeline name from config
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Tick interval from config
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.config.interval_secs)
    }

    /// Run the tick loop until cancelled
    ///
    /// The first execution fires immediately. Each execution is awaited
    /// before the next tick is taken, and overdue ticks coalesce, so a
    /// slow tick delays rather than stacks executions.
    pub async fn run(self, cancel: CancellationToken) {
        info!(
            pipeline = self.name(),
            interval_secs = self.config.interval_secs,
            "pipeline started"
        );
        self.metrics.set_running(self.name(), true);

        let mut ticker = tokio::time::interval(self.interval());
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            self.execute(&cancel).await;
        }

        self.metrics.set_running(self.name(), false);
        if let Err(e) = self.loader.close() {
            debug!(pipeline = self.name(), error = %e, "sink close reported errors");
        }
        info!(pipeline = self.name(), "pipeline stopped");
    }

    /// One tick: extract, transform, load, record
    async fn execute(&self, cancel: &CancellationToken) {
        let started = Instant::now();
        self.metrics.record_start(self.name());

        match self.run_once(cancel).await {
            Ok(stats) => {
                debug!(
                    pipeline = self.name(),
                    entries = stats.entries,
                    bytes = stats.bytes,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "tick complete"
                );
                self.metrics.record_success(
                    self.name(),
                    started.elapsed(),
                    stats.entries,
                    stats.bytes,
                );
            }
            Err(e) if e.is_cancelled() => {
                debug!(pipeline = self.name(), "tick cancelled");
            }
            Err(e) => {
                self.metrics
                    .record_failure(self.name(), started.elapsed(), &e.to_string());
            }
        }
    }

    async fn run_once(&self, cancel: &CancellationToken) -> Result<RunStats> {
        let results = self.extractor.extract(cancel).await?;
        if results.is_empty() {
            // Nothing extracted is a valid (empty) tick
            return Ok(RunStats { entries: 0, bytes: 0 });
        }

        let bytes: u64 = results
            .iter()
            .map(|r| r.metadata.response_bytes as u64)
            .sum();

        let batches = self.transformer.transform(results)?;
        let entries = batches.len() as u64;

        if cancel.is_cancelled() {
            return Err(etl_extract::ExtractError::Cancelled.into());
        }
        self.loader.load(cancel, batches).await?;

        Ok(RunStats { entries, bytes })
    }
}
