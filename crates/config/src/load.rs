//! Load (sink) configuration

use std::collections::BTreeMap;

use serde::Deserialize;

/// Configuration for the load stage of a pipeline
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoadConfig {
    /// Destinations; every stream receives every batch
    pub streams: Vec<StreamConfig>,

    /// Time-series extraction rules shared by series-producing streams
    pub metrics: Vec<MetricSpec>,
}

/// One load destination, discriminated by `type`
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamConfig {
    /// Time-stamped CSV file per tick
    Csv(CsvStreamConfig),
    /// Prometheus-style remote write (JSON envelope)
    RemoteWrite(RemoteWriteStreamConfig),
    /// OpenTelemetry metrics over HTTP
    Otel(OtelStreamConfig),
    /// Developer-inspection file dumps
    Dump(DumpStreamConfig),
}

impl StreamConfig {
    /// Stream type name for logging and errors
    pub fn kind(&self) -> &'static str {
        match self {
            StreamConfig::Csv(_) => "csv",
            StreamConfig::RemoteWrite(_) => "remote_write",
            StreamConfig::Otel(_) => "otel",
            StreamConfig::Dump(_) => "dump",
        }
    }
}

/// CSV file stream
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CsvStreamConfig {
    /// Base path; files land next to it as `{base}_{ts}.csv`
    pub path: String,
}

/// Remote-write stream
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RemoteWriteStreamConfig {
    /// Push endpoint URL
    pub endpoint: String,

    /// Protocol flavour; `gem` adds the remote-write version header
    pub flavor: RemoteWriteFlavor,

    /// Request timeout in seconds (default: 30)
    pub timeout_secs: u64,

    /// Optional basic auth; `${VAR}` tokens resolve from the environment
    pub basic_auth: Option<BasicAuthConfig>,

    /// Skip TLS certificate verification
    pub insecure_tls: bool,

    /// Static labels added to every series
    pub labels: BTreeMap<String, String>,
}

impl Default for RemoteWriteStreamConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            flavor: RemoteWriteFlavor::default(),
            timeout_secs: 30,
            basic_auth: None,
            insecure_tls: false,
            labels: BTreeMap::new(),
        }
    }
}

/// Remote-write protocol flavour
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteWriteFlavor {
    /// Sends `X-Prometheus-Remote-Write-Version: 0.1.0`
    #[default]
    Gem,
    /// Plain push endpoint, no version header
    Prometheus,
}

/// OpenTelemetry stream
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OtelStreamConfig {
    /// Collector endpoint URL
    pub endpoint: String,

    /// Request timeout in seconds (default: 30)
    pub timeout_secs: u64,

    /// Skip TLS certificate verification
    pub insecure_tls: bool,

    /// Static attributes added to every data point
    pub labels: BTreeMap<String, String>,
}

impl Default for OtelStreamConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            timeout_secs: 30,
            insecure_tls: false,
            labels: BTreeMap::new(),
        }
    }
}

/// Dump stream
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DumpStreamConfig {
    /// Base path; files land next to it as `{base}_load_{ts}.{ext}`
    pub path: String,

    /// Output format
    pub format: DumpFormat,
}

/// Dump file format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DumpFormat {
    /// Full batches as pretty-printed JSON (`.json`)
    #[default]
    Json,
    /// Prometheus exposition text (`.txt`)
    Prometheus,
    /// OTEL resourceMetrics envelope (`.json`)
    Otel,
}

impl DumpFormat {
    /// File extension for this format
    pub fn extension(&self) -> &'static str {
        match self {
            DumpFormat::Json | DumpFormat::Otel => "json",
            DumpFormat::Prometheus => "txt",
        }
    }
}

/// Basic authentication credentials
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BasicAuthConfig {
    pub username: String,
    pub password: String,
}

/// How to build one metric's time series from CSV rows
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MetricSpec {
    /// Metric name (`__name__` label)
    pub name: String,

    /// Column indices whose joined values identify a series
    pub unique_fields_index: Vec<usize>,

    /// Column index holding the sample value
    pub value: usize,

    /// Column index holding the sample timestamp (epoch ms)
    pub timestamp: usize,

    /// Label rules applied per series
    pub labels: Vec<MetricLabelConfig>,
}

/// One label on a metric: either a CSV column or a static value
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MetricLabelConfig {
    pub label_name: String,
    pub index_in_csv_data: Option<usize>,
    pub static_value: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_tagging() {
        let toml = r#"
[[streams]]
type = "csv"
path = "out/latency"

[[streams]]
type = "remote_write"
endpoint = "https://mimir/api/v1/push"
flavor = "prometheus"

[[streams]]
type = "dump"
path = "debug/load"
format = "prometheus"
"#;
        let config: LoadConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.streams.len(), 3);
        assert_eq!(config.streams[0].kind(), "csv");
        assert_eq!(config.streams[1].kind(), "remote_write");
        match &config.streams[1] {
            StreamConfig::RemoteWrite(rw) => {
                assert_eq!(rw.flavor, RemoteWriteFlavor::Prometheus);
                assert_eq!(rw.timeout_secs, 30);
            }
            other => panic!("wrong stream variant: {}", other.kind()),
        }
        match &config.streams[2] {
            StreamConfig::Dump(d) => assert_eq!(d.format.extension(), "txt"),
            other => panic!("wrong stream variant: {}", other.kind()),
        }
    }

    #[test]
    fn test_metric_spec() {
        let toml = r#"
name = "cpuusage"
unique_fields_index = [0]
value = 2
timestamp = 1
labels = [
  { label_name = "LB_Name", index_in_csv_data = 0 },
  { label_name = "job", static_value = "etl" },
]
"#;
        let spec: MetricSpec = toml::from_str(toml).unwrap();
        assert_eq!(spec.name, "cpuusage");
        assert_eq!(spec.unique_fields_index, vec![0]);
        assert_eq!(spec.labels[0].index_in_csv_data, Some(0));
        assert_eq!(spec.labels[1].static_value.as_deref(), Some("etl"));
    }
}
