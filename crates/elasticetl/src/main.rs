//! ElasticETL - periodic ETL engine for Elasticsearch aggregations
//!
//! # Usage
//!
//! ```bash
//! elasticetl --config configs/config.toml
//! elasticetl --config configs/config.toml --log-level debug
//! ```
//!
//! The config file is watched for changes; edits are applied to the
//! running pipelines without a restart.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use etl_config::{Config, LogFormat};
use etl_metrics::Collector;
use etl_pipeline::Manager;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Overall bound on graceful shutdown
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Periodic ETL engine for Elasticsearch aggregation responses
#[derive(Parser, Debug)]
#[command(name = "elasticetl")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "configs/config.toml")]
    config: PathBuf,

    /// Log level override (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::from_file(&cli.config)
        .with_context(|| format!("loading config from {}", cli.config.display()))?;

    let level = cli
        .log_level
        .as_deref()
        .unwrap_or_else(|| config.global.logging.level.as_str());
    init_logging(level, config.global.logging.format)?;

    info!(
        config = %cli.config.display(),
        pipelines = config.pipelines.len(),
        "starting elasticetl"
    );

    let collector = Collector::new();
    let manager = Arc::new(Manager::new(collector.clone()));

    for pipeline in config.pipelines.clone() {
        let name = pipeline.name.clone();
        manager
            .add_pipeline(pipeline)
            .await
            .with_context(|| format!("starting pipeline '{name}'"))?;
    }

    // Metrics endpoint
    let metrics_cancel = CancellationToken::new();
    if config.global.metrics.enabled {
        let collector = collector.clone();
        let metrics_config = config.global.metrics.clone();
        let cancel = metrics_cancel.clone();
        tokio::spawn(async move {
            if let Err(e) = etl_metrics::serve_metrics(collector, metrics_config, cancel).await {
                error!(error = %e, "metrics endpoint failed");
            }
        });
    }

    // Hot reload: the watcher hands parsed configs to an apply task
    let (reload_tx, mut reload_rx) = tokio::sync::mpsc::channel::<Config>(1);
    let watcher = etl_config::spawn_reload_watcher(
        cli.config.clone(),
        etl_config::DEFAULT_POLL_INTERVAL,
        move |new_config| {
            let _ = reload_tx.try_send(new_config);
        },
    );
    {
        let manager = Arc::clone(&manager);
        let collector = collector.clone();
        tokio::spawn(async move {
            while let Some(new_config) = reload_rx.recv().await {
                match manager.update_pipelines(new_config.pipelines).await {
                    Ok(()) => {
                        collector.record_config_reload();
                        info!("pipelines updated from new configuration");
                    }
                    Err(e) => warn!(error = %e, "failed to apply new configuration"),
                }
            }
        });
    }

    wait_for_shutdown_signal().await;
    info!("shutdown signal received, stopping");

    watcher.shutdown().await;
    metrics_cancel.cancel();

    if tokio::time::timeout(SHUTDOWN_TIMEOUT, manager.stop_all())
        .await
        .is_err()
    {
        warn!("shutdown timeout reached, forcing exit");
    }

    info!("elasticetl stopped");
    Ok(())
}

/// Initialize the tracing subscriber
fn init_logging(level: &str, format: LogFormat) -> Result<()> {
    let filter = EnvFilter::try_new(level)
        .or_else(|_| EnvFilter::try_new("info"))
        .map_err(|e| anyhow::anyhow!("invalid log level: {e}"))?;

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(fmt::layer().json())
                .with(filter)
                .init();
        }
        LogFormat::Console => {
            tracing_subscriber::registry()
                .with(fmt::layer().with_target(true))
                .with(filter)
                .init();
        }
    }
    Ok(())
}

/// Wait for SIGINT or SIGTERM
async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("installing SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
