//! Per-batch transform orchestration

use etl_config::{OutputFormat, TransformConfig};
use etl_protocol::{ExtractResult, TransformedBatch};
use tracing::debug;

use crate::convert::{apply_conversions, substitute_zeros_for_null};
use crate::error::Result;
use crate::history::HistoryRing;
use crate::tabulate::{derive_headers, expand_rows};

/// Applies the configured transformations to each tick's extract results
#[derive(Debug)]
pub struct Transformer {
    config: TransformConfig,
    history: Option<HistoryRing>,
}

impl Transformer {
    /// Build a transformer; history is kept only for stateful pipelines
    /// with a non-zero retention
    pub fn new(config: TransformConfig) -> Self {
        let history = if config.stateless || config.previous_results_sets == 0 {
            None
        } else {
            Some(HistoryRing::new(config.previous_results_sets))
        };
        Self { config, history }
    }

    /// Transform all results of one tick
    ///
    /// The first error aborts the tick: sinks never see a half-converted
    /// batch set.
    pub fn transform(&self, results: Vec<ExtractResult>) -> Result<Vec<TransformedBatch>> {
        let mut batches = Vec::with_capacity(results.len());
        for result in results {
            batches.push(self.transform_single(result)?);
        }

        if self.config.output_format == OutputFormat::Csv && !batches.is_empty() {
            // One shared header vector across the tick so multi-batch sink
            // writes line up column-for-column
            let headers = derive_headers(batches.iter().map(|b| &b.transformed_data));
            for batch in &mut batches {
                let rows = expand_rows(&batch.transformed_data, &headers);
                debug!(
                    source = %batch.result.source,
                    columns = headers.len(),
                    rows = rows.len(),
                    "columnised batch"
                );
                batch.csv_headers = Some(headers.clone());
                batch.csv_rows = Some(rows);
            }
        }

        if let Some(history) = &self.history {
            history.push(batches.clone());
        }

        Ok(batches)
    }

    fn transform_single(&self, result: ExtractResult) -> Result<TransformedBatch> {
        let mut data = result.data.clone();

        if self.config.substitute_zeros_for_null {
            substitute_zeros_for_null(&mut data);
        }
        apply_conversions(&mut data, &self.config.conversion_functions)?;

        Ok(TransformedBatch::new(result, data))
    }

    /// Snapshot of retained previous batch sets, oldest first
    pub fn history_snapshot(&self) -> Vec<Vec<TransformedBatch>> {
        self.history
            .as_ref()
            .map(HistoryRing::snapshot)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use etl_config::ConversionFunctionConfig;
    use etl_protocol::{FlatMap, ResultMetadata, Value};

    fn result_with(data: FlatMap) -> ExtractResult {
        ExtractResult {
            timestamp: Utc::now(),
            source: "https://es-1:9200".into(),
            data,
            metadata: ResultMetadata {
                endpoint: "https://es-1:9200".into(),
                cluster: "prod".into(),
                query: "{}".into(),
                original_query: "{}".into(),
                response_bytes: 0,
            },
        }
    }

    fn csv_config() -> TransformConfig {
        TransformConfig {
            output_format: OutputFormat::Csv,
            ..TransformConfig::default()
        }
    }

    #[test]
    fn test_json_format_has_no_rows() {
        let transformer = Transformer::new(TransformConfig::default());
        let batches = transformer
            .transform(vec![result_with(FlatMap::from([(
                "a".to_string(),
                Value::Int(1),
            )]))])
            .unwrap();
        assert!(batches[0].csv_headers.is_none());
        assert!(batches[0].csv_rows.is_none());
    }

    #[test]
    fn test_csv_format_populates_rows() {
        let transformer = Transformer::new(csv_config());
        let batches = transformer
            .transform(vec![result_with(FlatMap::from([
                ("[0].key".to_string(), Value::Str("a".into())),
                ("[1].key".to_string(), Value::Str("b".into())),
            ]))])
            .unwrap();

        let batch = &batches[0];
        assert_eq!(batch.csv_headers.as_deref(), Some(&["key".to_string()][..]));
        assert_eq!(
            batch.csv_rows,
            Some(vec![vec!["a".to_string()], vec!["b".to_string()]])
        );
    }

    #[test]
    fn test_headers_shared_across_batches() {
        let transformer = Transformer::new(csv_config());
        let batches = transformer
            .transform(vec![
                result_with(FlatMap::from([("a".to_string(), Value::Int(1))])),
                result_with(FlatMap::from([("b".to_string(), Value::Int(2))])),
            ])
            .unwrap();

        let expected = vec!["a".to_string(), "b".to_string()];
        assert_eq!(batches[0].csv_headers.as_ref(), Some(&expected));
        assert_eq!(batches[1].csv_headers.as_ref(), Some(&expected));
        // The batch lacking a column gets an empty cell there
        assert_eq!(
            batches[1].csv_rows,
            Some(vec![vec![String::new(), "2".to_string()]])
        );
    }

    #[test]
    fn test_null_substitution_renders_zero_cells() {
        let config = TransformConfig {
            substitute_zeros_for_null: true,
            ..csv_config()
        };
        let transformer = Transformer::new(config);
        let batches = transformer
            .transform(vec![result_with(FlatMap::from([(
                "gap".to_string(),
                Value::Null,
            )]))])
            .unwrap();
        assert_eq!(batches[0].csv_rows, Some(vec![vec!["0".to_string()]]));
    }

    #[test]
    fn test_conversion_failure_fails_tick() {
        let config = TransformConfig {
            conversion_functions: vec![ConversionFunctionConfig {
                field: "bad".to_string(),
                function: "convert_type".to_string(),
                to_type: Some("float".to_string()),
                ..ConversionFunctionConfig::default()
            }],
            ..TransformConfig::default()
        };
        let transformer = Transformer::new(config);
        let result = transformer.transform(vec![result_with(FlatMap::from([(
            "bad".to_string(),
            Value::Str("not-a-number".into()),
        )]))]);
        assert!(result.is_err());
    }

    #[test]
    fn test_history_respects_statelessness() {
        let stateful = Transformer::new(TransformConfig {
            previous_results_sets: 2,
            ..TransformConfig::default()
        });
        stateful.transform(vec![result_with(FlatMap::new())]).unwrap();
        stateful.transform(vec![result_with(FlatMap::new())]).unwrap();
        stateful.transform(vec![result_with(FlatMap::new())]).unwrap();
        assert_eq!(stateful.history_snapshot().len(), 2);

        let stateless = Transformer::new(TransformConfig {
            stateless: true,
            previous_results_sets: 2,
            ..TransformConfig::default()
        });
        stateless.transform(vec![result_with(FlatMap::new())]).unwrap();
        assert!(stateless.history_snapshot().is_empty());
    }

    #[test]
    fn test_original_data_is_preserved() {
        let config = TransformConfig {
            conversion_functions: vec![ConversionFunctionConfig {
                field: "n".to_string(),
                function: "convert_type".to_string(),
                to_type: Some("string".to_string()),
                ..ConversionFunctionConfig::default()
            }],
            ..TransformConfig::default()
        };
        let transformer = Transformer::new(config);
        let batches = transformer
            .transform(vec![result_with(FlatMap::from([(
                "n".to_string(),
                Value::Int(7),
            )]))])
            .unwrap();

        assert_eq!(batches[0].result.data["n"], Value::Int(7));
        assert_eq!(batches[0].transformed_data["n"], Value::Str("7".into()));
    }
}
