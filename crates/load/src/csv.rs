//! CSV file sink
//!
//! Writes one time-stamped file per tick: a single header row taken from
//! the first batch carrying headers, then every batch's data rows. Cells
//! are quoted per RFC 4180.

use async_trait::async_trait;
use chrono::Utc;
use etl_config::CsvStreamConfig;
use etl_protocol::TransformedBatch;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::Result;
use crate::Sink;

/// Writes tabular batches to time-stamped CSV files
pub struct CsvSink {
    config: CsvStreamConfig,
}

impl CsvSink {
    pub fn new(config: CsvStreamConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Sink for CsvSink {
    async fn load(
        &self,
        _cancel: &CancellationToken,
        batches: &[TransformedBatch],
    ) -> Result<()> {
        let mut content = String::new();

        for batch in batches {
            let (Some(headers), Some(rows)) = (&batch.csv_headers, &batch.csv_rows) else {
                continue;
            };
            if content.is_empty() {
                write_record(&mut content, headers.iter().map(String::as_str));
            }
            for row in rows {
                write_record(&mut content, row.iter().map(String::as_str));
            }
        }

        if content.is_empty() {
            return Ok(());
        }

        let base = std::path::Path::new(&self.config.path);
        let dir = base.parent().unwrap_or_else(|| std::path::Path::new("."));
        tokio::fs::create_dir_all(dir).await?;

        let stamp = Utc::now().format("%Y%m%d_%H%M%S");
        let name = base
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "output".to_string());
        let path = dir.join(format!("{name}_{stamp}.csv"));

        tokio::fs::write(&path, content).await?;
        debug!(path = %path.display(), "csv output written");
        Ok(())
    }

    fn kind(&self) -> &'static str {
        "csv"
    }
}

fn write_record<'a>(out: &mut String, cells: impl Iterator<Item = &'a str>) {
    let mut first = true;
    for cell in cells {
        if !first {
            out.push(',');
        }
        first = false;
        out.push_str(&escape_cell(cell));
    }
    out.push_str("\r\n");
}

/// Quote a cell when it contains a comma, quote, or line break
fn escape_cell(cell: &str) -> String {
    if cell.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", cell.replace('"', "\"\""))
    } else {
        cell.to_string()
    }
}
