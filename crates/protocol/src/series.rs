//! Time series handed to network sinks

use std::collections::BTreeMap;

use serde::Serialize;

/// A single sample in a time series
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Sample {
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
    pub value: f64,
}

/// A labelled series of samples
///
/// `labels` always contains `__name__`. Samples keep the order in which
/// their rows were encountered; sinks serialise them as-is.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeSeries {
    pub labels: BTreeMap<String, String>,
    pub samples: Vec<Sample>,
}

impl TimeSeries {
    /// Create a series for a metric name with empty labels beyond `__name__`
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            labels: BTreeMap::from([("__name__".to_string(), name.into())]),
            samples: Vec::new(),
        }
    }

    /// The metric name, if present
    pub fn name(&self) -> Option<&str> {
        self.labels.get("__name__").map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_series() {
        let series = TimeSeries::named("cpuusage");
        assert_eq!(series.name(), Some("cpuusage"));
        assert!(series.samples.is_empty());
    }
}
