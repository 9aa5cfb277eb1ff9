//! Endpoint caller
//!
//! Issues one `POST {url}/_search` per configured endpoint, in parallel,
//! and turns each response into an [`ExtractResult`] via the selector,
//! flattener, and key filters.
//!
//! # Retry policy
//!
//! Transport failures and 5xx responses are retried up to `max_retries`
//! additional times with a linear backoff of 1 s x attempt number. A 4xx
//! response is terminal. A single failing endpoint only loses its own
//! result; the run fails only when every endpoint failed.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use etl_config::ExtractConfig;
use etl_protocol::{ExtractResult, FlatMap, ResultMetadata, Value};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{ExtractError, Result};
use crate::filter::KeyFilters;
use crate::flatten::{flatten, select};
use crate::macros::MacroExpander;
use crate::substitute_env_vars;

#[cfg(test)]
#[path = "extractor_test.rs"]
mod tests;

/// How much of an error response body is carried into the error
const BODY_PREFIX_LEN: usize = 512;

/// Extracts data from all configured endpoints
///
/// Cheap to clone; the inner state is shared. One extractor (and one HTTP
/// client) exists per pipeline, living as long as the pipeline's spec.
#[derive(Debug, Clone)]
pub struct Extractor {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    config: ExtractConfig,
    client: reqwest::Client,
    expander: MacroExpander,
    filters: KeyFilters,
}

impl Extractor {
    /// Build an extractor (and its HTTP client) from config
    pub fn new(config: ExtractConfig) -> Result<Self> {
        let mut builder =
            reqwest::Client::builder().timeout(Duration::from_secs(config.timeout_secs));
        if config.insecure_tls {
            builder = builder.danger_accept_invalid_certs(true);
        }
        let client = builder
            .build()
            .map_err(|e| ExtractError::config(format!("failed to build HTTP client: {e}")))?;

        let expander =
            MacroExpander::new(config.start_time.clone(), config.end_time.clone());
        let filters = KeyFilters::new(&config.filters);

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                client,
                expander,
                filters,
            }),
        })
    }

    /// Number of endpoints that will actually be queried
    ///
    /// The parallel config arrays are truncated to their common prefix;
    /// optional arrays only participate when non-empty.
    pub fn endpoint_count(&self) -> usize {
        let config = &self.inner.config;
        let mut len = config.urls.len().min(config.cluster_names.len());
        if !config.auth_headers.is_empty() {
            len = len.min(config.auth_headers.len());
        }
        if !config.additional_headers.is_empty() {
            len = len.min(config.additional_headers.len());
        }
        len
    }

    /// Query every endpoint in parallel and collect the survivors
    ///
    /// Results come back in `urls` order. Individual endpoint failures are
    /// logged and dropped; only a fully failed run is an error.
    pub async fn extract(&self, cancel: &CancellationToken) -> Result<Vec<ExtractResult>> {
        let count = self.endpoint_count();
        if count == 0 {
            return Err(ExtractError::config(
                "no usable endpoints (urls and cluster_names must both be non-empty)",
            ));
        }

        let (result_tx, mut result_rx) = mpsc::channel::<(usize, ExtractResult)>(count);
        let (error_tx, mut error_rx) = mpsc::channel::<String>(count);

        for index in 0..count {
            let extractor = self.clone();
            let cancel = cancel.clone();
            let result_tx = result_tx.clone();
            let error_tx = error_tx.clone();

            tokio::spawn(async move {
                let endpoint = extractor.inner.config.urls[index].clone();
                match extractor.fetch(index, &cancel).await {
                    Ok(result) => {
                        let _ = result_tx.send((index, result)).await;
                    }
                    Err(e) => {
                        warn!(endpoint = %endpoint, error = %e, "endpoint extraction failed");
                        let _ = error_tx.send(format!("{endpoint}: {e}")).await;
                    }
                }
            });
        }
        drop(result_tx);
        drop(error_tx);

        let mut indexed = Vec::with_capacity(count);
        while let Some(entry) = result_rx.recv().await {
            indexed.push(entry);
        }
        let mut errors = Vec::new();
        while let Some(message) = error_rx.recv().await {
            errors.push(message);
        }

        if cancel.is_cancelled() {
            return Err(ExtractError::Cancelled);
        }

        if indexed.is_empty() && !errors.is_empty() {
            return Err(ExtractError::AllEndpointsFailed {
                count: errors.len(),
                summary: errors.join("; "),
            });
        }

        // Sink aggregation order follows the urls array
        indexed.sort_by_key(|(index, _)| *index);
        let results: Vec<_> = indexed.into_iter().map(|(_, result)| result).collect();

        if self.inner.config.debug.enabled && !self.inner.config.debug.path.is_empty() {
            if let Err(e) = self.write_debug_dump(&results).await {
                warn!(error = %e, "failed to write extract debug output");
            }
        }

        Ok(results)
    }

    /// Fetch one endpoint by index, with retries
    async fn fetch(&self, index: usize, cancel: &CancellationToken) -> Result<ExtractResult> {
        let config = &self.inner.config;
        let url = &config.urls[index];
        let cluster = &config.cluster_names[index];
        let endpoint = format!("{url}/_search");

        let query = self.inner.expander.expand(&config.query, cluster)?;

        let mut response: Option<reqwest::Response> = None;
        let mut last_transport: Option<reqwest::Error> = None;

        for attempt in 0..=config.max_retries {
            if attempt > 0 {
                debug!(endpoint = %endpoint, attempt, "retrying after backoff");
                tokio::select! {
                    _ = cancel.cancelled() => return Err(ExtractError::Cancelled),
                    _ = tokio::time::sleep(Duration::from_secs(u64::from(attempt))) => {}
                }
            }

            let request = self.build_request(index, &endpoint, &query);
            let sent = tokio::select! {
                _ = cancel.cancelled() => return Err(ExtractError::Cancelled),
                sent = request.send() => sent,
            };

            match sent {
                Ok(resp) if resp.status().as_u16() < 500 => {
                    response = Some(resp);
                    last_transport = None;
                    break;
                }
                Ok(resp) => {
                    // 5xx: retriable, keep the last response for reporting
                    response = Some(resp);
                    last_transport = None;
                }
                Err(e) => {
                    response = None;
                    last_transport = Some(e);
                }
            }
        }

        if let Some(source) = last_transport {
            return Err(ExtractError::Transport {
                endpoint: endpoint.clone(),
                attempts: config.max_retries + 1,
                source,
            });
        }
        let response = response.expect("either a response or a transport error is recorded");

        let status = response.status();
        if status.as_u16() >= 400 {
            let body = response.text().await.unwrap_or_default();
            return Err(ExtractError::Upstream {
                endpoint,
                status: status.as_u16(),
                body_prefix: body.chars().take(BODY_PREFIX_LEN).collect(),
            });
        }

        let body = response.bytes().await.map_err(|e| ExtractError::Transport {
            endpoint: endpoint.clone(),
            attempts: config.max_retries + 1,
            source: e,
        })?;

        let data = self.shape_response(&body, &endpoint)?;

        Ok(ExtractResult {
            timestamp: Utc::now(),
            source: url.clone(),
            data,
            metadata: ResultMetadata {
                endpoint: url.clone(),
                cluster: cluster.clone(),
                query,
                original_query: config.query.clone(),
                response_bytes: body.len(),
            },
        })
    }

    fn build_request(
        &self,
        index: usize,
        endpoint: &str,
        query: &str,
    ) -> reqwest::RequestBuilder {
        let config = &self.inner.config;
        let mut request = self
            .inner
            .client
            .post(endpoint)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(query.to_string());

        if let Some(auth) = config.auth_headers.get(index) {
            if !auth.is_empty() {
                request = request
                    .header(reqwest::header::AUTHORIZATION, substitute_env_vars(auth));
            }
        }

        if let Some(headers) = config.additional_headers.get(index) {
            for header in headers {
                let header = substitute_env_vars(header);
                if let Some((name, value)) = header.split_once(':') {
                    request = request.header(name.trim(), value.trim());
                }
            }
        }

        request
    }

    /// Parse, select, flatten, and filter a response body
    fn shape_response(&self, body: &[u8], endpoint: &str) -> Result<FlatMap> {
        let parsed: serde_json::Value =
            serde_json::from_slice(body).map_err(|e| ExtractError::Parse {
                endpoint: endpoint.to_string(),
                source: e,
            })?;
        let parsed = Value::from(parsed);

        let Some(subtree) = select(&parsed, &self.inner.config.json_path) else {
            // A path that selects nothing is an empty result, not an error
            return Ok(FlatMap::new());
        };

        Ok(self.inner.filters.apply(&flatten(subtree)))
    }

    /// Write the extract-phase debug dump
    async fn write_debug_dump(&self, results: &[ExtractResult]) -> Result<()> {
        let base = std::path::Path::new(&self.inner.config.debug.path);
        let dir = base.parent().unwrap_or_else(|| std::path::Path::new("."));
        tokio::fs::create_dir_all(dir).await?;

        let stamp = Utc::now().format("%Y%m%d_%H%M%S");
        let name = base
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "extract".to_string());
        let path = dir.join(format!("{name}_extract_{stamp}.json"));

        let dump = serde_json::json!({
            "timestamp": Utc::now().to_rfc3339(),
            "phase": "extract",
            "results_count": results.len(),
            "results": results,
        });
        let body = serde_json::to_vec_pretty(&dump)
            .map_err(|e| ExtractError::config(format!("debug serialization failed: {e}")))?;

        tokio::fs::write(&path, body).await?;
        debug!(path = %path.display(), "extract debug output written");
        Ok(())
    }
}
