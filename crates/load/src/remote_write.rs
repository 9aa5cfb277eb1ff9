//! Remote-write sink
//!
//! Serialises grouped time series as the JSON envelope
//! `{"timeseries":[{"labels":[{name:value,...}],"samples":[...]}]}` and
//! POSTs it to the configured endpoint. Two flavours exist, differing only
//! in the version header the receiver expects.
//!
//! Batches carrying CSV rows are grouped per the configured metric specs;
//! batches without rows (or pipelines without metric specs) fall back to
//! one single-sample series per numeric flattened field.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use etl_config::{MetricSpec, RemoteWriteFlavor, RemoteWriteStreamConfig};
use etl_protocol::{Sample, TimeSeries, TransformedBatch, Value};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::env::basic_auth_header;
use crate::error::{Result, SinkError};
use crate::series::group_rows;
use crate::Sink;

const REMOTE_WRITE_VERSION_HEADER: &str = "X-Prometheus-Remote-Write-Version";
const REMOTE_WRITE_VERSION: &str = "0.1.0";

/// Pushes grouped time series to a remote-write endpoint
pub struct RemoteWriteSink {
    config: RemoteWriteStreamConfig,
    metrics: Vec<MetricSpec>,
    client: reqwest::Client,
}

impl RemoteWriteSink {
    /// Build the sink and its HTTP client
    pub fn new(config: RemoteWriteStreamConfig, metrics: Vec<MetricSpec>) -> Result<Self> {
        let mut builder =
            reqwest::Client::builder().timeout(Duration::from_secs(config.timeout_secs));
        if config.insecure_tls {
            builder = builder.danger_accept_invalid_certs(true);
        }
        let client = builder
            .build()
            .map_err(|e| SinkError::init(format!("remote_write client: {e}")))?;

        Ok(Self {
            config,
            metrics,
            client,
        })
    }

    /// Collect the series this tick produces
    fn collect_series(&self, batches: &[TransformedBatch]) -> Vec<TimeSeries> {
        let mut series = Vec::new();

        for batch in batches {
            if batch.has_rows() && !self.metrics.is_empty() {
                let rows = batch.csv_rows.as_deref().unwrap_or_default();
                for spec in &self.metrics {
                    series.extend(group_rows(rows, spec, &self.config.labels));
                }
            } else {
                series.extend(self.fallback_series(batch));
            }
        }

        series
    }

    /// One single-sample series per numeric flattened field
    fn fallback_series(&self, batch: &TransformedBatch) -> Vec<TimeSeries> {
        let timestamp = batch.result.timestamp.timestamp_millis();
        let mut series = Vec::new();

        for (key, value) in &batch.transformed_data {
            let number = match value {
                Value::Int(i) => *i as f64,
                Value::Float(f) => *f,
                _ => continue,
            };

            let mut labels = BTreeMap::from([
                ("__name__".to_string(), key.clone()),
                ("source".to_string(), batch.result.source.clone()),
            ]);
            if !batch.result.metadata.cluster.is_empty() {
                labels.insert("cluster".to_string(), batch.result.metadata.cluster.clone());
            }
            for (name, value) in &self.config.labels {
                labels.insert(name.clone(), value.clone());
            }

            series.push(TimeSeries {
                labels,
                samples: vec![Sample {
                    timestamp,
                    value: number,
                }],
            });
        }

        series
    }

    fn envelope(series: &[TimeSeries]) -> serde_json::Value {
        let timeseries: Vec<serde_json::Value> = series
            .iter()
            .map(|s| {
                serde_json::json!({
                    "labels": [&s.labels],
                    "samples": &s.samples,
                })
            })
            .collect();
        serde_json::json!({ "timeseries": timeseries })
    }
}

#[async_trait]
impl Sink for RemoteWriteSink {
    async fn load(
        &self,
        cancel: &CancellationToken,
        batches: &[TransformedBatch],
    ) -> Result<()> {
        let series = self.collect_series(batches);
        if series.is_empty() {
            return Ok(());
        }

        let body = serde_json::to_vec(&Self::envelope(&series))?;
        debug!(
            endpoint = %self.config.endpoint,
            series = series.len(),
            bytes = body.len(),
            "pushing time series"
        );

        let mut request = self
            .client
            .post(&self.config.endpoint)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body);

        if self.config.flavor == RemoteWriteFlavor::Gem {
            request = request.header(REMOTE_WRITE_VERSION_HEADER, REMOTE_WRITE_VERSION);
        }
        if let Some(auth) = &self.config.basic_auth {
            request = request.header(reqwest::header::AUTHORIZATION, basic_auth_header(auth));
        }

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
        "remote_write"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use etl_protocol::{ExtractResult, FlatMap, ResultMetadata};

    fn batch(data: FlatMap) -> TransformedBatch {
        let result = ExtractResult {
            timestamp: Utc::now(),
            source: "https://es-1:9200".into(),
            data: FlatMap::new(),
            metadata: ResultMetadata {
                endpoint: "https://es-1:9200".into(),
                cluster: "prod".into(),
                query: "{}".into(),
                original_query: "{}".into(),
                response_bytes: 0,
            },
        };
        TransformedBatch::new(result, data)
    }

    fn sink(metrics: Vec<MetricSpec>) -> RemoteWriteSink {
        RemoteWriteSink::new(
            RemoteWriteStreamConfig {
                endpoint: "https://push.example".into(),
                ..RemoteWriteStreamConfig::default()
            },
            metrics,
        )
        .unwrap()
    }

    #[test]
    fn test_fallback_series_numeric_fields_only() {
        let sink = sink(Vec::new());
        let series = sink.collect_series(&[batch(FlatMap::from([
            ("cpu".to_string(), Value::Float(0.5)),
            ("count".to_string(), Value::Int(3)),
            ("name".to_string(), Value::Str("x".into())),
            ("up".to_string(), Value::Bool(true)),
        ]))]);

        assert_eq!(series.len(), 2);
        let names: Vec<&str> = series
            .iter()
            .map(|s| s.labels["__name__"].as_str())
            .collect();
        assert_eq!(names, vec!["count", "cpu"]);
        assert_eq!(series[0].labels["cluster"], "prod");
        assert_eq!(series[0].labels["source"], "https://es-1:9200");
    }

    #[test]
    fn test_envelope_shape() {
        let series = vec![TimeSeries {
            labels: BTreeMap::from([
                ("__name__".to_string(), "cpuusage".to_string()),
                ("job".to_string(), "etl".to_string()),
            ]),
            samples: vec![Sample {
                timestamp: 712223444,
                value: 23.4,
            }],
        }];

        let envelope = RemoteWriteSink::envelope(&series);
        assert_eq!(
            envelope,
            serde_json::json!({
                "timeseries": [{
                    "labels": [{"__name__": "cpuusage", "job": "etl"}],
                    "samples": [{"timestamp": 712223444, "value": 23.4}],
                }]
            })
        );
    }

    #[tokio::test]
    async fn test_push_sends_envelope_and_version_header() {
        use axum::routing::post;

        let captured: std::sync::Arc<tokio::sync::Mutex<Option<(String, serde_json::Value)>>> =
            Default::default();
        let handler_captured = std::sync::Arc::clone(&captured);

        let app = axum::Router::new().route(
            "/api/v1/push",
            post(
                move |headers: axum::http::HeaderMap, body: String| {
                    let captured = std::sync::Arc::clone(&handler_captured);
                    async move {
                        let version = headers
                            .get(REMOTE_WRITE_VERSION_HEADER)
                            .map(|v| v.to_str().unwrap().to_string())
                            .unwrap_or_default();
                        *captured.lock().await =
                            Some((version, serde_json::from_str(&body).unwrap()));
                        "ok"
                    }
                },
            ),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let sink = RemoteWriteSink::new(
            RemoteWriteStreamConfig {
                endpoint: format!("http://{addr}/api/v1/push"),
                ..RemoteWriteStreamConfig::default()
            },
            Vec::new(),
        )
        .unwrap();

        let batches = vec![batch(FlatMap::from([(
            "cpu".to_string(),
            Value::Float(0.5),
        )]))];
        sink.load(&CancellationToken::new(), &batches).await.unwrap();

        let (version, body) = captured.lock().await.clone().unwrap();
        assert_eq!(version, REMOTE_WRITE_VERSION);
        let series = body["timeseries"].as_array().unwrap();
        assert_eq!(series.len(), 1);
        assert_eq!(series[0]["labels"][0]["__name__"], "cpu");
        assert_eq!(series[0]["samples"][0]["value"], 0.5);
    }

    #[tokio::test]
    async fn test_http_error_is_reported() {
        use axum::routing::post;

        let app = axum::Router::new().route(
            "/push",
            post(|| async { (axum::http::StatusCode::SERVICE_UNAVAILABLE, "down") }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let sink = RemoteWriteSink::new(
            RemoteWriteStreamConfig {
                endpoint: format!("http://{addr}/push"),
                ..RemoteWriteStreamConfig::default()
            },
            Vec::new(),
        )
        .unwrap();

        let batches = vec![batch(FlatMap::from([(
            "cpu".to_string(),
            Value::Float(0.5),
        )]))];
        let err = sink
            .load(&CancellationToken::new(), &batches)
            .await
            .unwrap_err();
        assert!(matches!(err, SinkError::Http { status: 503, .. }));
    }

    #[test]
    fn test_csv_batches_use_metric_specs() {
        let spec = MetricSpec {
            name: "cpuusage".to_string(),
            unique_fields_index: vec![0],
            value: 2,
            timestamp: 1,
            labels: Vec::new(),
        };
        let sink = sink(vec![spec]);

        let mut b = batch(FlatMap::new());
        b.csv_headers = Some(vec!["lb".into(), "ts".into(), "v".into()]);
        b.csv_rows = Some(vec![
            vec!["alb1".into(), "100".into(), "1.5".into()],
            vec!["alb1".into(), "200".into(), "2.5".into()],
        ]);

        let series = sink.collect_series(&[b]);
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].samples.len(), 2);
        assert_eq!(series[0].labels["__name__"], "cpuusage");
    }
}
