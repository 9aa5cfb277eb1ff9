//! Pipeline metrics collection

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tracing::error;

/// Shared metrics collector
///
/// Cheap to clone; all clones record into the same registry.
#[derive(Debug, Clone)]
pub struct Collector {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    started_at: DateTime<Utc>,
    config_reloads: AtomicU64,
    pipelines: RwLock<HashMap<String, Arc<PipelineMetrics>>>,
}

#[derive(Debug, Default)]
struct PipelineMetrics {
    total_runs: AtomicU64,
    successful_runs: AtomicU64,
    failed_runs: AtomicU64,
    entries_processed: AtomicU64,
    bytes_processed: AtomicU64,
    running: AtomicBool,
    state: Mutex<PipelineState>,
}

#[derive(Debug, Default)]
struct PipelineState {
    last_run: Option<DateTime<Utc>>,
    last_duration_ms: u64,
    last_error: Option<String>,
    last_error_at: Option<DateTime<Utc>>,
}

impl Default for Collector {
    fn default() -> Self {
        Self::new()
    }
}

impl Collector {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                started_at: Utc::now(),
                config_reloads: AtomicU64::new(0),
                pipelines: RwLock::new(HashMap::new()),
            }),
        }
    }

    fn pipeline(&self, name: &str) -> Arc<PipelineMetrics> {
        if let Some(metrics) = self.inner.pipelines.read().get(name) {
            return Arc::clone(metrics);
        }
        let mut pipelines = self.inner.pipelines.write();
        Arc::clone(pipelines.entry(name.to_string()).or_default())
    }

    /// Drop a removed pipeline's metrics
    pub fn remove_pipeline(&self, name: &str) {
        self.inner.pipelines.write().remove(name);
    }

    /// Record that a tick started
    pub fn record_start(&self, name: &str) {
        let metrics = self.pipeline(name);
        metrics.total_runs.fetch_add(1, Ordering::Relaxed);
        metrics.state.lock().last_run = Some(Utc::now());
    }

    /// Record a successful tick
    pub fn record_success(&self, name: &str, duration: Duration, entries: u64, bytes: u64) {
        let metrics = self.pipeline(name);
        metrics.successful_runs.fetch_add(1, Ordering::Relaxed);
        metrics.entries_processed.fetch_add(entries, Ordering::Relaxed);
        metrics.bytes_processed.fetch_add(bytes, Ordering::Relaxed);
        metrics.state.lock().last_duration_ms = duration.as_millis() as u64;
    }

    /// Record a failed tick and capture the error
    pub fn record_failure(&self, name: &str, duration: Duration, message: &str) {
        error!(pipeline = name, error = message, "pipeline run failed");

        let metrics = self.pipeline(name);
        metrics.failed_runs.fetch_add(1, Ordering::Relaxed);

        let mut state = metrics.state.lock();
        state.last_duration_ms = duration.as_millis() as u64;
        state.last_error = Some(message.to_string());
        state.last_error_at = Some(Utc::now());
    }

    /// Mark a pipeline's scheduler as running or stopped
    pub fn set_running(&self, name: &str, running: bool) {
        self.pipeline(name).running.store(running, Ordering::Relaxed);
    }

    /// Count a configuration reload
    pub fn record_config_reload(&self) {
        self.inner.config_reloads.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time snapshot of everything, pipelines sorted by name
    pub fn snapshot(&self) -> MetricsSnapshot {
        let pipelines = self.inner.pipelines.read();
        let mut entries: Vec<PipelineSnapshot> = pipelines
            .iter()
            .map(|(name, metrics)| {
                let total = metrics.total_runs.load(Ordering::Relaxed);
                let failed = metrics.failed_runs.load(Ordering::Relaxed);
                let state = metrics.state.lock();
                PipelineSnapshot {
                    name: name.clone(),
                    running: metrics.running.load(Ordering::Relaxed),
                    total_runs: total,
                    successful_runs: metrics.successful_runs.load(Ordering::Relaxed),
                    failed_runs: failed,
                    error_rate: if total > 0 {
                        failed as f64 / total as f64 * 100.0
                    } else {
                        0.0
                    },
                    entries_processed: metrics.entries_processed.load(Ordering::Relaxed),
                    bytes_processed: metrics.bytes_processed.load(Ordering::Relaxed),
                    last_run: state.last_run,
                    last_duration_ms: state.last_duration_ms,
                    last_error: state.last_error.clone(),
                    last_error_at: state.last_error_at,
                }
            })
            .collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));

        MetricsSnapshot {
            started_at: self.inner.started_at,
            uptime_secs: (Utc::now() - self.inner.started_at).num_seconds().max(0) as u64,
            config_reloads: self.inner.config_reloads.load(Ordering::Relaxed),
            pipelines: entries,
        }
    }
}

/// Snapshot of one pipeline's counters
#[derive(Debug, Clone, Serialize)]
pub struct PipelineSnapshot {
    pub name: String,
    pub running: bool,
    pub total_runs: u64,
    pub successful_runs: u64,
    pub failed_runs: u64,
    pub error_rate: f64,
    pub entries_processed: u64,
    pub bytes_processed: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_run: Option<DateTime<Utc>>,
    pub last_duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error_at: Option<DateTime<Utc>>,
}

/// Snapshot of the whole process
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub started_at: DateTime<Utc>,
    pub uptime_secs: u64,
    pub config_reloads: u64,
    pub pipelines: Vec<PipelineSnapshot>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_and_failure_counting() {
        let collector = Collector::new();
        collector.record_start("latency");
        collector.record_success("latency", Duration::from_millis(120), 3, 4096);
        collector.record_start("latency");
        collector.record_failure("latency", Duration::from_millis(80), "boom");

        let snapshot = collector.snapshot();
        assert_eq!(snapshot.pipelines.len(), 1);

        let p = &snapshot.pipelines[0];
        assert_eq!(p.name, "latency");
        assert_eq!(p.total_runs, 2);
        assert_eq!(p.successful_runs, 1);
        assert_eq!(p.failed_runs, 1);
        assert_eq!(p.error_rate, 50.0);
        assert_eq!(p.entries_processed, 3);
        assert_eq!(p.bytes_processed, 4096);
        assert_eq!(p.last_duration_ms, 80);
        assert_eq!(p.last_error.as_deref(), Some("boom"));
        assert!(p.last_error_at.is_some());
    }

    #[test]
    fn test_running_flag_and_removal() {
        let collector = Collector::new();
        collector.set_running("a", true);
        assert!(collector.snapshot().pipelines[0].running);

        collector.set_running("a", false);
        assert!(!collector.snapshot().pipelines[0].running);

        collector.remove_pipeline("a");
        assert!(collector.snapshot().pipelines.is_empty());
    }

    #[test]
    fn test_snapshot_sorted_by_name() {
        let collector = Collector::new();
        collector.record_start("zeta");
        collector.record_start("alpha");

        let snapshot = collector.snapshot();
        let names: Vec<&str> = snapshot
            .pipelines
            .iter()
            .map(|p| p.name.as_str())
            .collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
    }

    #[test]
    fn test_clones_share_state() {
        let collector = Collector::new();
        let clone = collector.clone();
        clone.record_config_reload();
        assert_eq!(collector.snapshot().config_reloads, 1);
    }
}
