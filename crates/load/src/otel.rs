//! OpenTelemetry sink
//!
//! Serialises batches into the standard `resourceMetrics` JSON envelope
//! (scope `elasticetl` / `1.0.0`, one metric per batch with a single data
//! point carrying the transformed map) and POSTs it to a collector.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use etl_config::OtelStreamConfig;
use etl_protocol::TransformedBatch;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{Result, SinkError};
use crate::Sink;

const SCOPE_NAME: &str = "elasticetl";
const SCOPE_VERSION: &str = "1.0.0";

/// Pushes batch data points to an OpenTelemetry collector
pub struct OtelSink {
    config: OtelStreamConfig,
    client: reqwest::Client,
}

impl OtelSink {
    /// Build the sink and its HTTP client
    pub fn new(config: OtelStreamConfig) -> Result<Self> {
        let mut builder =
            reqwest::Client::builder().timeout(Duration::from_secs(config.timeout_secs));
        if config.insecure_tls {
            builder = builder.danger_accept_invalid_certs(true);
        }
        let client = builder
            .build()
            .map_err(|e| SinkError::init(format!("otel client: {e}")))?;

        Ok(Self { config, client })
    }
}

/// Build the `resourceMetrics` envelope for a set of batches
pub(crate) fn otel_envelope(
    batches: &[TransformedBatch],
    extra_labels: &BTreeMap<String, String>,
) -> serde_json::Value {
    let metrics: Vec<serde_json::Value> = batches
        .iter()
        .map(|batch| {
            let mut attributes = serde_json::Map::new();
            attributes.insert(
                "source".to_string(),
                serde_json::Value::String(batch.result.source.clone()),
            );
            if !batch.result.metadata.cluster.is_empty() {
                attributes.insert(
                    "cluster".to_string(),
                    serde_json::Value::String(batch.result.metadata.cluster.clone()),
                );
            }
            for (name, value) in extra_labels {
                attributes.insert(name.clone(), serde_json::Value::String(value.clone()));
            }

            serde_json::json!({
                "name": "elasticetl_metric",
                "description": "Metric from ElasticETL",
                "unit": "1",
                "data": {
                    "dataPoints": [{
                        "attributes": attributes,
                        "timeUnixNano": batch.result.timestamp.timestamp_nanos_opt().unwrap_or_default(),
                        "value": &batch.transformed_data,
                    }]
                }
            })
        })
        .collect();

    serde_json::json!({
        "resourceMetrics": [{
            "resource": {
                "attributes": [{
                    "key": "service.name",
                    "value": {"stringValue": SCOPE_NAME},
                }]
            },
            "scopeMetrics": [{
                "scope": {"name": SCOPE_NAME, "version": SCOPE_VERSION},
                "metrics": metrics,
            }]
        }]
    })
}

#[async_trait]
impl Sink for OtelSink {
    async fn load(
        &self,
        cancel: &CancellationToken,
        batches: &[TransformedBatch],
    ) -> Result<()> {
        let body = serde_json::to_vec(&otel_envelope(batches, &self.config.labels))?;
        debug!(
            endpoint = %self.config.endpoint,
            batches = batches.len(),
            bytes = body.len(),
            "pushing otel metrics"
        );

        let request = self
            .client
            .post(&self.config.endpoint)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body);

        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(SinkError::Cancelled),
            sent = request.send() => sent.map_err(|source| SinkError::Request {
                kind: self.kind(),
                source,
            })?,
        };

        let status = response.status();
        if status.as_u16() >= 400 {
            return Err(SinkError::Http {
                kind: self.kind(),
                status: status.as_u16(),
            });
        }

        Ok(())
    }

    fn kind(&self) -> &'static str {
        "otel"
    }
}
