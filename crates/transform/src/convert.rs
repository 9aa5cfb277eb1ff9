//! Field conversions
//!
//! Two families of conversion functions operate on the flattened data:
//!
//! - `convert_type` coerces a field to `string`, `int`, `float`, or `bool`
//! - `convert_to_kb` / `convert_to_mb` / `convert_to_gb` rescale byte
//!   quantities on the K=1024 scale from a declared source unit
//!
//! The rule's `field` is compiled as a regex and rewrites every matching
//! key in place; a pattern that fails to compile falls back to an exact
//! key lookup. A missing field is a no-op, but a field that exists and
//! cannot be coerced fails the batch.

use etl_config::ConversionFunctionConfig;
use etl_protocol::{FlatMap, Value};
use regex::Regex;

use crate::error::{Result, TransformError};

/// Replace every null with the integer 0
///
/// Runs before the conversion functions. Recurses through residual nested
/// objects (a `value`-collapsed subtree can leave one in the flat map).
/// Idempotent: non-null values are untouched.
pub fn substitute_zeros_for_null(data: &mut FlatMap) {
    for value in data.values_mut() {
        substitute_value(value);
    }
}

fn substitute_value(value: &mut Value) {
    match value {
        Value::Null => *value = Value::Int(0),
        Value::Object(entries) => {
            for child in entries.values_mut() {
                substitute_value(child);
            }
        }
        _ => {}
    }
}

/// Apply conversion rules in order
pub fn apply_conversions(data: &mut FlatMap, rules: &[ConversionFunctionConfig]) -> Result<()> {
    for rule in rules {
        apply_rule(data, rule)?;
    }
    Ok(())
}

fn apply_rule(data: &mut FlatMap, rule: &ConversionFunctionConfig) -> Result<()> {
    match Regex::new(&rule.field) {
        Ok(re) => {
            let matching: Vec<String> =
                data.keys().filter(|k| re.is_match(k)).cloned().collect();
            for key in matching {
                let converted = convert_value(&data[&key], rule, &key)?;
                data.insert(key, converted);
            }
        }
        Err(_) => {
            if let Some(value) = data.get(&rule.field) {
                let converted = convert_value(value, rule, &rule.field)?;
                data.insert(rule.field.clone(), converted);
            }
        }
    }
    Ok(())
}

fn convert_value(value: &Value, rule: &ConversionFunctionConfig, field: &str) -> Result<Value> {
    match rule.function.as_str() {
        "convert_type" => convert_type(value, rule.to_type.as_deref().unwrap_or(""), field),
        "convert_to_kb" => to_unit(value, rule, field, 1024.0),
        "convert_to_mb" => to_unit(value, rule, field, 1024.0 * 1024.0),
        "convert_to_gb" => to_unit(value, rule, field, 1024.0 * 1024.0 * 1024.0),
        other => Err(TransformError::UnknownFunction(other.to_string())),
    }
}

fn convert_type(value: &Value, to_type: &str, field: &str) -> Result<Value> {
    match to_type {
        "string" => Ok(Value::Str(value.to_display_string())),
        "int" => value.to_i64().map(Value::Int).ok_or_else(|| {
            TransformError::conversion(field, format!("cannot convert {value:?} to int"))
        }),
        "float" => value.to_f64().map(Value::Float).ok_or_else(|| {
            TransformError::conversion(field, format!("cannot convert {value:?} to float"))
        }),
        "bool" => value.to_bool().map(Value::Bool).ok_or_else(|| {
            TransformError::conversion(field, format!("cannot convert {value:?} to bool"))
        }),
        other => Err(TransformError::UnsupportedType(other.to_string())),
    }
}

/// Rescale a byte quantity; `target_factor` is the target unit in bytes
fn to_unit(
    value: &Value,
    rule: &ConversionFunctionConfig,
    field: &str,
    target_factor: f64,
) -> Result<Value> {
    let from_factor = match rule.from_unit.as_deref().unwrap_or("") {
        "b" | "bytes" => 1.0,
        "kb" => 1024.0,
        "mb" => 1024.0 * 1024.0,
        "gb" => 1024.0 * 1024.0 * 1024.0,
        other => return Err(TransformError::UnsupportedUnit(other.to_string())),
    };

    let number = value.to_f64().ok_or_else(|| {
        TransformError::conversion(field, format!("cannot convert {value:?} to float"))
    })?;

    Ok(Value::Float(number * from_factor / target_factor))
}
