//! Developer-inspection dump sink
//!
//! Writes one file per tick in the configured format:
//!
//! - `json` - the full batches, pretty-printed
//! - `prometheus` - exposition text, `name{k="v",...} value timestamp`
//! - `otel` - the same envelope the OTEL sink sends, pretty-printed
//!
//! Files land next to the configured base path as
//! `{base}_load_{YYYYMMDD_HHMMSS}.{ext}`.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use async_trait::async_trait;
use chrono::Utc;
use etl_config::{DumpFormat, DumpStreamConfig, MetricSpec};
use etl_protocol::{TransformedBatch, Value};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::Result;
use crate::otel::otel_envelope;
use crate::series::group_rows;
use crate::Sink;

/// Writes batches to local files for inspection
pub struct DumpSink {
    config: DumpStreamConfig,
    metrics: Vec<MetricSpec>,
}

impl DumpSink {
    pub fn new(config: DumpStreamConfig, metrics: Vec<MetricSpec>) -> Self {
        Self { config, metrics }
    }

    fn render(&self, batches: &[TransformedBatch]) -> Result<Vec<u8>> {
        match self.config.format {
            DumpFormat::Json => {
                let dump = serde_json::json!({
                    "timestamp": Utc::now().to_rfc3339(),
                    "phase": "load",
                    "format": "json",
                    "results_count": batches.len(),
                    "results": batches,
                });
                Ok(serde_json::to_vec_pretty(&dump)?)
            }
            DumpFormat::Otel => Ok(serde_json::to_vec_pretty(&otel_envelope(
                batches,
                &BTreeMap::new(),
            ))?),
            DumpFormat::Prometheus => Ok(self.render_exposition(batches).into_bytes()),
        }
    }

    fn render_exposition(&self, batches: &[TransformedBatch]) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "# elasticetl load dump");
        let _ = writeln!(out, "# generated at {}", Utc::now().to_rfc3339());
        out.push('\n');

        for batch in batches {
            if batch.has_rows() && !self.metrics.is_empty() {
                let rows = batch.csv_rows.as_deref().unwrap_or_default();
                for spec in &self.metrics {
                    for series in group_rows(rows, spec, &BTreeMap::new()) {
                        let name = series.name().unwrap_or(&spec.name).to_string();
                        let labels = format_labels(&series.labels);
                        for sample in &series.samples {
                            let _ = writeln!(
                                out,
                                "{name}{labels} {} {}",
                                sample.value, sample.timestamp
                            );
                        }
                    }
                }
            } else {
                self.render_fallback(batch, &mut out);
            }
        }

        out
    }

    /// Without CSV rows or metric specs, expose every numeric field
    fn render_fallback(&self, batch: &TransformedBatch, out: &mut String) {
        let timestamp = batch.result.timestamp.timestamp_millis();
        for (key, value) in &batch.transformed_data {
            let number = match value {
                Value::Int(i) => *i as f64,
                Value::Float(f) => *f,
                _ => continue,
            };

            let mut labels = BTreeMap::from([(
                "source".to_string(),
                batch.result.source.clone(),
            )]);
            if !batch.result.metadata.cluster.is_empty() {
                labels.insert("cluster".to_string(), batch.result.metadata.cluster.clone());
            }

            let _ = writeln!(out, "{key}{} {number} {timestamp}", format_labels(&labels));
        }
    }
}

/// Render `{k="v",...}` with `__name__` elided; empty labels render nothing
fn format_labels(labels: &BTreeMap<String, String>) -> String {
    let pairs: Vec<String> = labels
        .iter()
        .filter(|(name, _)| name.as_str() != "__name__")
        .map(|(name, value)| format!("{name}=\"{}\"", escape_label_value(value)))
        .collect();

    if pairs.is_empty() {
        String::new()
    } else {
        format!("{{{}}}", pairs.join(","))
    }
}

fn escape_label_value(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

#[async_trait]
impl Sink for DumpSink {
    async fn load(
        &self,
        _cancel: &CancellationToken,
        batches: &[TransformedBatch],
    ) -> Result<()> {
        let body = self.render(batches)?;

        let base = std::path::Path::new(&self.config.path);
        let dir = base.parent().unwrap_or_else(|| std::path::Path::new("."));
        tokio::fs::create_dir_all(dir).await?;

        let stamp = Utc::now().format("%Y%m%d_%H%M%S");
        let name = base
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "dump".to_string());
        let path = dir.join(format!(
            "{name}_load_{stamp}.{}",
            self.config.format.extension()
        ));

        tokio::fs::write(&path, body).await?;
        debug!(path = %path.display(), format = ?self.config.format, "dump written");
        Ok(())
    }

    fn kind(&self) -> &'static str {
        "dump"
    }
}
