//! ElasticETL - Configuration
//!
//! TOML-based configuration loading with sensible defaults.
//!
//! # Parsing
//!
//! Use the `FromStr` trait to parse configuration:
//!
//! ```
//! use etl_config::Config;
//! use std::str::FromStr;
//!
//! let config = Config::from_str("").unwrap();
//! assert!(config.pipelines.is_empty());
//! ```
//!
//! # Example
//!
//! ```toml
//! [[pipelines]]
//! name = "service-latency"
//! interval_secs = 60
//!
//! [pipelines.extract]
//! query = '{"size":0}'
//! urls = ["https://es-1:9200"]
//! cluster_names = ["prod"]
//! json_path = "aggregations.services.buckets"
//!
//! [pipelines.transform]
//! output_format = "csv"
//!
//! [[pipelines.load.streams]]
//! type = "csv"
//! path = "out/latency"
//! ```
//!
//! Every section is optional except the parts a pipeline cannot run
//! without; `validate()` reports what is missing up front rather than at
//! the first tick.

mod error;
mod extract;
mod global;
mod load;
mod reload;
mod transform;
mod validation;

use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;

pub use error::{ConfigError, Result};
pub use extract::{DebugConfig, ExtractConfig, FilterConfig, FilterKind};
pub use global::{GlobalConfig, LogFormat, LogLevel, LoggingConfig, MetricsConfig};
pub use load::{
    BasicAuthConfig, CsvStreamConfig, DumpFormat, DumpStreamConfig, LoadConfig,
    MetricLabelConfig, MetricSpec, OtelStreamConfig, RemoteWriteFlavor,
    RemoteWriteStreamConfig, StreamConfig,
};
pub use reload::{spawn_reload_watcher, ReloadWatcherHandle, DEFAULT_POLL_INTERVAL};
pub use transform::{ConversionFunctionConfig, OutputFormat, TransformConfig};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Global settings (logging, metrics endpoint)
    pub global: GlobalConfig,

    /// ETL pipelines, each with its own schedule
    pub pipelines: Vec<PipelineConfig>,
}

/// A single ETL pipeline
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Unique pipeline name, used for metrics and logging
    pub name: String,

    /// Disabled pipelines are kept in the registry but never scheduled
    pub enabled: bool,

    /// Tick interval in seconds
    pub interval_secs: u64,

    pub extract: ExtractConfig,
    pub transform: TransformConfig,
    pub load: LoadConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            enabled: true,
            interval_secs: 60,
            extract: ExtractConfig::default(),
            transform: TransformConfig::default(),
            load: LoadConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            source: e,
        })?;

        Self::from_str(&contents)
    }

    fn parse(s: &str) -> Result<Self> {
        let config: Config = toml::from_str(s).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate cross-field constraints that serde cannot express
    fn validate(&self) -> Result<()> {
        validation::validate_config(self)
    }

    /// Names of pipelines that will actually be scheduled
    pub fn enabled_pipelines(&self) -> Vec<&str> {
        self.pipelines
            .iter()
            .filter(|p| p.enabled)
            .map(|p| p.name.as_str())
            .collect()
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::from_str("").unwrap();
        assert!(config.pipelines.is_empty());
        assert_eq!(config.global.metrics.port, 9090);
    }

    #[test]
    fn test_minimal_pipeline() {
        let toml = r#"
[[pipelines]]
name = "latency"

[pipelines.extract]
query = '{"size":0}'
urls = ["https://es-1:9200"]
cluster_names = ["prod"]
"#;
        let config = Config::from_str(toml).unwrap();
        assert_eq!(config.pipelines.len(), 1);

        let pipeline = &config.pipelines[0];
        assert_eq!(pipeline.name, "latency");
        assert!(pipeline.enabled);
        assert_eq!(pipeline.interval_secs, 60);
        assert_eq!(pipeline.extract.timeout_secs, 30);
        assert_eq!(pipeline.extract.max_retries, 3);
    }

    #[test]
    fn test_enabled_pipelines() {
        let toml = r#"
[[pipelines]]
name = "on"

[pipelines.extract]
query = "{}"
urls = ["https://es:9200"]
cluster_names = ["a"]

[[pipelines]]
name = "off"
enabled = false

[pipelines.extract]
query = "{}"
urls = ["https://es:9200"]
cluster_names = ["a"]
"#;
        let config = Config::from_str(toml).unwrap();
        assert_eq!(config.enabled_pipelines(), vec!["on"]);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result = Config::from_str("frobnicate = true");
        assert!(result.is_err());
    }
}
