//! Transformation configuration

use serde::Deserialize;

/// Configuration for the transform stage of a pipeline
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TransformConfig {
    /// Stateless pipelines keep no history of prior batches
    pub stateless: bool,

    /// Replace every null in the flattened data with the integer 0 before
    /// conversions run
    pub substitute_zeros_for_null: bool,

    /// How many previous batch sets to retain (0 disables history)
    pub previous_results_sets: usize,

    /// Field conversions applied in order
    pub conversion_functions: Vec<ConversionFunctionConfig>,

    /// Output shape handed to sinks
    pub output_format: OutputFormat,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            stateless: false,
            substitute_zeros_for_null: false,
            previous_results_sets: 0,
            conversion_functions: Vec::new(),
            output_format: OutputFormat::Json,
        }
    }
}

/// Shape of the transformed batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Flat map only
    #[default]
    Json,
    /// Flat map plus tabular headers/rows
    Csv,
}

/// One field conversion rule
///
/// `field` is tried as a regular expression first; if it fails to compile
/// it is treated as a literal key. Which of the remaining fields matter
/// depends on `function`:
///
/// - `convert_type` uses `to_type` (`string`, `int`, `float`, `bool`)
/// - `convert_to_kb` / `convert_to_mb` / `convert_to_gb` use `from_unit`
///   (`b`, `bytes`, `kb`, `mb`, `gb`)
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConversionFunctionConfig {
    pub field: String,
    pub function: String,
    pub from_type: Option<String>,
    pub to_type: Option<String>,
    pub from_unit: Option<String>,
    pub to_unit: Option<String>,
}

/// Conversion function names accepted in `conversion_functions`
pub(crate) const KNOWN_CONVERSION_FUNCTIONS: &[&str] = &[
    "convert_type",
    "convert_to_kb",
    "convert_to_mb",
    "convert_to_gb",
];
