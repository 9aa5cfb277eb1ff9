//! Query template macro substitution
//!
//! Three macros are recognised, exact-token and case-sensitive:
//!
//! - `__CLUSTER__` - the endpoint's cluster name
//! - `__STARTTIME__` / `__ENDTIME__` - epoch milliseconds computed from the
//!   configured time expressions
//!
//! Time expression grammar (case-insensitive): `NOW`, `NOW ± <digits>
//! MIN|SEC`, or a bare signed decimal integer passed through as literal
//! milliseconds. Time is only evaluated when the corresponding macro
//! actually occurs in the template, so a template without `__STARTTIME__`
//! never needs `start_time` configured.

use chrono::Utc;
use regex::Regex;

use crate::error::{ExtractError, Result};

const CLUSTER_MACRO: &str = "__CLUSTER__";
const START_TIME_MACRO: &str = "__STARTTIME__";
const END_TIME_MACRO: &str = "__ENDTIME__";

/// Expands macros in a query template
#[derive(Debug, Clone)]
pub struct MacroExpander {
    start_time: Option<String>,
    end_time: Option<String>,
    now_pattern: Regex,
}

impl MacroExpander {
    /// Create an expander from the configured time expressions
    pub fn new(start_time: Option<String>, end_time: Option<String>) -> Self {
        Self {
            start_time,
            end_time,
            now_pattern: Regex::new(r"^NOW\s*([+-])\s*(\d+)\s*(MIN|SEC)$")
                .unwrap(),
        }
    }

    /// Substitute all macros present in `template`
    pub fn expand(&self, template: &str, cluster: &str) -> Result<String> {
        let mut query = template.replace(CLUSTER_MACRO, cluster);

        if query.contains(START_TIME_MACRO) {
            let spec = self.start_time.as_deref().ok_or_else(|| {
                ExtractError::config(
                    "__STARTTIME__ macro found in query but start_time not configured",
                )
            })?;
            let millis = self.eval_time_expression(spec)?;
            query = query.replace(START_TIME_MACRO, &millis.to_string());
        }

        if query.contains(END_TIME_MACRO) {
            let spec = self.end_time.as_deref().ok_or_else(|| {
                ExtractError::config(
                    "__ENDTIME__ macro found in query but end_time not configured",
                )
            })?;
            let millis = self.eval_time_expression(spec)?;
            query = query.replace(END_TIME_MACRO, &millis.to_string());
        }

        Ok(query)
    }

    /// Evaluate a time expression to epoch milliseconds
    fn eval_time_expression(&self, expr: &str) -> Result<i64> {
        let trimmed = expr.trim();
        if trimmed.is_empty() {
            return Err(ExtractError::config("empty time expression"));
        }

        let upper = trimmed.to_uppercase();
        if upper == "NOW" {
            return Ok(Utc::now().timestamp_millis());
        }

        if let Some(caps) = self.now_pattern.captures(&upper) {
            let amount: i64 = caps[2].parse().map_err(|_| {
                ExtractError::config(format!(
                    "invalid numeric value in time expression: {trimmed}"
                ))
            })?;
            let offset_ms = match &caps[3] {
                "MIN" => amount * 60_000,
                _ => amount * 1_000,
            };
            let now = Utc::now().timestamp_millis();
            return Ok(match &caps[1] {
                "+" => now + offset_ms,
                _ => now - offset_ms,
            });
        }

        // Literal epoch milliseconds
        trimmed.parse::<i64>().map_err(|_| {
            ExtractError::config(format!("invalid time expression: {trimmed}"))
        })
    }
}
