//! Pipeline registry
//!
//! Maps pipeline names to running tasks. Adding an existing name replaces
//! it (the old task is cancelled and drained first); removing a missing
//! name is a no-op. The registry lock is never held across a drain.

use std::collections::HashMap;

use etl_config::PipelineConfig;
use etl_metrics::Collector;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::Result;
use crate::pipeline::Pipeline;
use crate::DRAIN_TIMEOUT;

#[cfg(test)]
#[path = "manager_test.rs"]
mod tests;

/// Owns and schedules all pipelines
pub struct Manager {
    pipelines: Mutex<HashMap<String, Handle>>,
    metrics: Collector,
}

struct Handle {
    cancel: CancellationToken,
    task: tokio::task::JoinHandle<()>,
    enabled: bool,
}

impl Handle {
    /// Cancel and wait bounded for the task; abort on timeout
    async fn shutdown(mut self, name: &str) {
        self.cancel.cancel();
        if tokio::time::timeout(DRAIN_TIMEOUT, &mut self.task)
            .await
            .is_err()
        {
            warn!(pipeline = name, "drain timeout reached, aborting task");
            self.task.abort();
        }
    }
}

impl Manager {
    pub fn new(metrics: Collector) -> Self {
        Self {
            pipelines: Mutex::new(HashMap::new()),
            metrics,
        }
    }

    /// Install a pipeline, replacing any existing one with the same name
    ///
    /// Disabled pipelines are registered but not scheduled.
    pub async fn add_pipeline(&self, config: PipelineConfig) -> Result<()> {
        let name = config.name.clone();

        let handle = if config.enabled {
            let pipeline = Pipeline::new(config, self.metrics.clone())?;
            let cancel = CancellationToken::new();
            let task = tokio::spawn(pipeline.run(cancel.clone()));
            Handle {
                cancel,
                task,
                enabled: true,
            }
        } else {
            info!(pipeline = %name, "pipeline registered but disabled");
            Handle {
                cancel: CancellationToken::new(),
                task: tokio::spawn(async {}),
                enabled: false,
            }
        };

        let previous = self.pipelines.lock().await.insert(name.clone(), handle);
        if let Some(previous) = previous {
            info!(pipeline = %name, "replacing existing pipeline");
            previous.shutdown(&name).await;
        }

        Ok(())
    }

    /// Remove a pipeline; unknown names are a no-op
    pub async fn remove_pipeline(&self, name: &str) {
        let removed = self.pipelines.lock().await.remove(name);
        if let Some(handle) = removed {
            handle.shutdown(name).await;
            self.metrics.remove_pipeline(name);
            info!(pipeline = name, "pipeline removed");
        }
    }

    /// Reconcile the registry with a full new pipeline list
    ///
    /// Pipelines present in `configs` are replaced (fresh context and
    /// ticker); pipelines absent from it are removed.
    pub async fn update_pipelines(&self, configs: Vec<PipelineConfig>) -> Result<()> {
        let incoming: Vec<String> = configs.iter().map(|c| c.name.clone()).collect();

        let stale: Vec<String> = {
            let pipelines = self.pipelines.lock().await;
            pipelines
                .keys()
                .filter(|name| !incoming.contains(name))
                .cloned()
                .collect()
        };
        for name in stale {
            self.remove_pipeline(&name).await;
        }

        for config in configs {
            self.add_pipeline(config).await?;
        }
        Ok(())
    }

    /// Names and scheduling state of registered pipelines
    pub async fn status(&self) -> Vec<(String, bool)> {
        let pipelines = self.pipelines.lock().await;
        let mut status: Vec<(String, bool)> = pipelines
            .iter()
            .map(|(name, handle)| (name.clone(), handle.enabled))
            .collect();
        status.sort();
        status
    }

    /// Stop every pipeline, draining each with the bounded timeout
    pub async fn stop_all(&self) {
        let drained: Vec<(String, Handle)> =
            self.pipelines.lock().await.drain().collect();
        for (name, handle) in drained {
            handle.shutdown(&name).await;
        }
        info!("all pipelines stopped");
    }
}
