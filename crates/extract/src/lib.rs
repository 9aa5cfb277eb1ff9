//! ElasticETL - Extract
//!
//! The extract stage of a pipeline: queries one or more Elasticsearch
//! clusters and turns each response into a flattened key/value map.
//!
//! # Flow
//!
//! ```text
//! query template ──► [macros] ──► POST {url}/_search ──► [select json_path]
//!                                   (per endpoint,           │
//!                                    with retries)           ▼
//!                                                      [flatten] ──► [filter] ──► ExtractResult
//! ```
//!
//! # Modules
//!
//! - `macros` - `__CLUSTER__` / `__STARTTIME__` / `__ENDTIME__` substitution
//! - `flatten` - JSON path selection and recursive flattening
//! - `filter` - ordered include/exclude filters over flattened keys
//! - `extractor` - the HTTP caller with retry, header decoration, and
//!   parallel per-endpoint fan-out

mod error;
mod extractor;
mod filter;
mod flatten;
mod macros;

pub use error::{ExtractError, Result};
pub use extractor::Extractor;
pub use filter::KeyFilters;
pub use flatten::{flatten, select};
pub use macros::MacroExpander;

/// Substitute `${VAR}` tokens with environment values
///
/// Unknown or empty variables leave the literal token in place, so a
/// missing secret shows up verbatim in logs instead of as a silent empty
/// string.
pub fn substitute_env_vars(input: &str) -> String {
    // `${NAME}` - NAME may be any non-empty sequence without a closing brace
    let re = regex::Regex::new(r"\$\{([^}]+)\}").unwrap();
    re.replace_all(input, |caps: &regex::Captures<'_>| {
        match std::env::var(&caps[1]) {
            Ok(value) if !value.is_empty() => value,
            _ => caps[0].to_string(),
        }
    })
    .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_substitute_env_vars() {
        std::env::set_var("ETL_TEST_TOKEN", "s3cret");
        assert_eq!(
            substitute_env_vars("Bearer ${ETL_TEST_TOKEN}"),
            "Bearer s3cret"
        );
        assert_eq!(
            substitute_env_vars("Bearer ${ETL_TEST_MISSING}"),
            "Bearer ${ETL_TEST_MISSING}"
        );
        assert_eq!(substitute_env_vars("no tokens here"), "no tokens here");
    }
}
