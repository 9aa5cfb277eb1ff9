//! Scalar metrics HTTP endpoint
//!
//! Serves the collector's JSON snapshot at the configured path. Shut down
//! via the provided cancellation token.

use axum::routing::get;
use axum::{Json, Router};
use etl_config::MetricsConfig;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::Collector;

/// Build the metrics router
pub(crate) fn router(collector: Collector, path: &str) -> Router {
    let path = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    };
    Router::new().route(
        &path,
        get(move || {
            let collector = collector.clone();
            async move { Json(collector.snapshot()) }
        }),
    )
}

/// Serve the metrics endpoint until cancelled
pub async fn serve_metrics(
    collector: Collector,
    config: MetricsConfig,
    cancel: CancellationToken,
) -> std::io::Result<()> {
    let app = router(collector, &config.path);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?;
    info!(port = config.port, path = %config.path, "metrics endpoint listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
}
