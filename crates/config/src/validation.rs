//! Cross-field configuration validation
//!
//! Serde catches shape errors; this module catches the mistakes that only
//! show up at the first tick otherwise - a macro with no time spec, a
//! conversion function that doesn't exist, a stream with no destination.

use std::collections::HashSet;

use regex::Regex;

use crate::error::{ConfigError, Result};
use crate::transform::KNOWN_CONVERSION_FUNCTIONS;
use crate::{Config, PipelineConfig, StreamConfig};

/// Validate a parsed configuration
pub fn validate_config(config: &Config) -> Result<()> {
    let mut seen = HashSet::new();
    for pipeline in &config.pipelines {
        if pipeline.name.is_empty() {
            return Err(ConfigError::missing_field("<unnamed>", "name"));
        }
        if !seen.insert(pipeline.name.as_str()) {
            return Err(ConfigError::DuplicatePipeline(pipeline.name.clone()));
        }
        validate_pipeline(pipeline)?;
    }
    Ok(())
}

fn validate_pipeline(pipeline: &PipelineConfig) -> Result<()> {
    let name = pipeline.name.as_str();

    // Disabled pipelines may be half-written; only enabled ones must run.
    if !pipeline.enabled {
        return Ok(());
    }

    if pipeline.interval_secs == 0 {
        return Err(ConfigError::invalid_value(
            name,
            "interval_secs",
            "must be greater than zero",
        ));
    }

    let extract = &pipeline.extract;
    if extract.query.is_empty() {
        return Err(ConfigError::missing_field(name, "extract.query"));
    }
    if extract.urls.is_empty() {
        return Err(ConfigError::missing_field(name, "extract.urls"));
    }
    if extract.cluster_names.is_empty() {
        return Err(ConfigError::missing_field(name, "extract.cluster_names"));
    }

    for expr in [&extract.start_time, &extract.end_time].into_iter().flatten() {
        if !is_valid_time_expression(expr) {
            return Err(ConfigError::invalid_value(
                name,
                "extract.start_time/end_time",
                format!("invalid time expression '{expr}' (expected NOW, NOW±Xmin, NOW±Xsec, or epoch ms)"),
            ));
        }
    }

    for rule in &pipeline.transform.conversion_functions {
        if !KNOWN_CONVERSION_FUNCTIONS.contains(&rule.function.as_str()) {
            return Err(ConfigError::invalid_value(
                name,
                "transform.conversion_functions",
                format!("unknown function '{}'", rule.function),
            ));
        }
        match rule.function.as_str() {
            "convert_type" => {
                let to = rule.to_type.as_deref().unwrap_or("");
                if !matches!(to, "string" | "int" | "float" | "bool") {
                    return Err(ConfigError::invalid_value(
                        name,
                        "transform.conversion_functions",
                        format!("convert_type requires to_type of string/int/float/bool, got '{to}'"),
                    ));
                }
            }
            _ => {
                let unit = rule.from_unit.as_deref().unwrap_or("");
                if !matches!(unit, "b" | "bytes" | "kb" | "mb" | "gb") {
                    return Err(ConfigError::invalid_value(
                        name,
                        "transform.conversion_functions",
                        format!("{} requires from_unit of b/bytes/kb/mb/gb, got '{unit}'", rule.function),
                    ));
                }
            }
        }
    }

    for stream in &pipeline.load.streams {
        validate_stream(name, stream)?;
    }

    for metric in &pipeline.load.metrics {
        if metric.name.is_empty() {
            return Err(ConfigError::missing_field(name, "load.metrics.name"));
        }
    }

    Ok(())
}

fn validate_stream(pipeline: &str, stream: &StreamConfig) -> Result<()> {
    match stream {
        StreamConfig::Csv(csv) if csv.path.is_empty() => {
            Err(ConfigError::missing_field(pipeline, "load.streams.csv.path"))
        }
        StreamConfig::RemoteWrite(rw) if rw.endpoint.is_empty() => Err(
            ConfigError::missing_field(pipeline, "load.streams.remote_write.endpoint"),
        ),
        StreamConfig::Otel(otel) if otel.endpoint.is_empty() => Err(
            ConfigError::missing_field(pipeline, "load.streams.otel.endpoint"),
        ),
        StreamConfig::Dump(dump) if dump.path.is_empty() => {
            Err(ConfigError::missing_field(pipeline, "load.streams.dump.path"))
        }
        _ => Ok(()),
    }
}

/// Check a time expression without evaluating it
///
/// Accepted forms (case-insensitive): `NOW`, `NOW ± <digits> MIN|SEC`, or a
/// bare signed decimal integer (epoch milliseconds).
pub fn is_valid_time_expression(expr: &str) -> bool {
    let expr = expr.trim().to_uppercase();
    if expr == "NOW" {
        return true;
    }
    // Compiled per call; validation runs once per config load.
    let now_pattern = Regex::new(r"^NOW\s*([+-])\s*(\d+)\s*(MIN|SEC)$").unwrap();
    if now_pattern.is_match(&expr) {
        return true;
    }
    expr.parse::<i64>().is_ok()
}
