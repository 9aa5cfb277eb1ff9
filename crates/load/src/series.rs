//! Time-series grouping from CSV rows
//!
//! Rows sharing the same tuple of values at the configured unique columns
//! form one series. Rows whose value or timestamp cell does not parse are
//! skipped, as are rows too short to hold either column. Series emit in
//! first-encounter order; samples keep row order.

use std::collections::{BTreeMap, HashMap};

use etl_config::MetricSpec;
use etl_protocol::{Sample, TimeSeries};

/// Group rows into time series per the metric spec
///
/// `extra_labels` are stream-level static labels layered on top of the
/// metric's own label rules.
pub fn group_rows(
    rows: &[Vec<String>],
    spec: &MetricSpec,
    extra_labels: &BTreeMap<String, String>,
) -> Vec<TimeSeries> {
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, TimeSeries> = HashMap::new();

    for row in rows {
        if row.len() <= spec.value || row.len() <= spec.timestamp {
            continue;
        }
        let Ok(value) = row[spec.value].parse::<f64>() else {
            continue;
        };
        let Ok(timestamp) = row[spec.timestamp].parse::<i64>() else {
            continue;
        };

        let key: String = spec
            .unique_fields_index
            .iter()
            .filter_map(|&i| row.get(i).map(String::as_str))
            .collect::<Vec<_>>()
            .join("|");

        let series = groups.entry(key.clone()).or_insert_with(|| {
            order.push(key.clone());
            build_series(spec, row, extra_labels)
        });
        series.samples.push(Sample { timestamp, value });
    }

    order.into_iter().filter_map(|key| groups.remove(&key)).collect()
}

/// Labels come from the group's first row
fn build_series(
    spec: &MetricSpec,
    row: &[String],
    extra_labels: &BTreeMap<String, String>,
) -> TimeSeries {
    let mut series = TimeSeries::named(&spec.name);

    for label in &spec.labels {
        if let Some(value) = label.static_value.as_ref().filter(|v| !v.is_empty()) {
            series.labels.insert(label.label_name.clone(), value.clone());
        } else if let Some(cell) = label.index_in_csv_data.and_then(|i| row.get(i)) {
            series.labels.insert(label.label_name.clone(), cell.clone());
        }
    }

    for (name, value) in extra_labels {
        series.labels.insert(name.clone(), value.clone());
    }

    series
}
