//! Configuration hot reload
//!
//! Polls the config file's modification time and re-parses on change. A
//! config that fails to parse or validate is logged and skipped; the
//! running configuration stays in effect.

use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::Config;

/// Default poll cadence
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Handle for the reload watcher task
pub struct ReloadWatcherHandle {
    cancel: CancellationToken,
    task: tokio::task::JoinHandle<()>,
}

impl ReloadWatcherHandle {
    /// Stop the watcher and wait for it to finish
    pub async fn shutdown(self) {
        self.cancel.cancel();
        let _ = self.task.await;
    }
}

/// Spawn a task that polls `path` every `interval` and invokes `on_change`
/// with each successfully parsed new configuration
pub fn spawn_reload_watcher<F>(
    path: PathBuf,
    interval: Duration,
    on_change: F,
) -> ReloadWatcherHandle
where
    F: Fn(Config) + Send + Sync + 'static,
{
    let cancel = CancellationToken::new();
    let token = cancel.clone();

    let task = tokio::spawn(async move {
        let mut last_modified = modified_at(&path).await;
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // The first tick of a tokio interval completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    debug!(path = %path.display(), "config watcher stopped");
                    return;
                }
                _ = ticker.tick() => {}
            }

            let Some(modified) = modified_at(&path).await else {
                continue;
            };
            if last_modified == Some(modified) {
                continue;
            }
            last_modified = Some(modified);

            match Config::from_file(&path) {
                Ok(config) => {
                    info!(path = %path.display(), "configuration changed, applying");
                    on_change(config);
                }
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "ignoring invalid configuration change"
                    );
                }
            }
        }
    });

    ReloadWatcherHandle { cancel, task }
}

async fn modified_at(path: &PathBuf) -> Option<SystemTime> {
    tokio::fs::metadata(path).await.ok()?.modified().ok()
}
