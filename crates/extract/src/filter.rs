//! Key filters over flattened data
//!
//! Filters are applied in configured order with working-set semantics:
//!
//! - If any `include` filter is present the working set starts empty,
//!   otherwise it starts as a copy of the source map.
//! - `include` adds every source key matching the pattern.
//! - `exclude` removes matching keys from the working set.
//!
//! Order matters: `[include r, exclude r]` yields nothing, while
//! `[exclude r, include r]` yields exactly the keys matching `r`.

use etl_config::{FilterConfig, FilterKind};
use etl_protocol::FlatMap;
use regex::Regex;
use tracing::debug;

/// A compiled, ordered filter list
#[derive(Debug)]
pub struct KeyFilters {
    filters: Vec<CompiledFilter>,
    has_include: bool,
}

#[derive(Debug)]
struct CompiledFilter {
    kind: FilterKind,
    pattern: Pattern,
}

#[derive(Debug)]
enum Pattern {
    Regex(Regex),
    /// Fallback when the configured pattern is not a valid regex
    Literal(String),
}

impl Pattern {
    fn matches(&self, key: &str) -> bool {
        match self {
            Pattern::Regex(re) => re.is_match(key),
            Pattern::Literal(s) => s == key,
        }
    }
}

impl KeyFilters {
    /// Compile filter configs; invalid regexes degrade to exact match
    pub fn new(configs: &[FilterConfig]) -> Self {
        let filters: Vec<_> = configs
            .iter()
            .map(|config| {
                let pattern = match Regex::new(&config.pattern) {
                    Ok(re) => Pattern::Regex(re),
                    Err(e) => {
                        debug!(
                            pattern = %config.pattern,
                            error = %e,
                            "filter pattern is not a valid regex, using exact match"
                        );
                        Pattern::Literal(config.pattern.clone())
                    }
                };
                CompiledFilter {
                    kind: config.kind,
                    pattern,
                }
            })
            .collect();

        let has_include = filters.iter().any(|f| f.kind == FilterKind::Include);

        Self {
            filters,
            has_include,
        }
    }

    /// Whether any filters are configured
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Apply the filter list to a flattened map
    pub fn apply(&self, data: &FlatMap) -> FlatMap {
        if self.filters.is_empty() {
            return data.clone();
        }

        let mut working = if self.has_include {
            FlatMap::new()
        } else {
            data.clone()
        };

        for filter in &self.filters {
            match filter.kind {
                FilterKind::Include => {
                    for (key, value) in data {
                        if filter.pattern.matches(key) {
                            working.insert(key.clone(), value.clone());
                        }
                    }
                }
                FilterKind::Exclude => {
                    working.retain(|key, _| !filter.pattern.matches(key));
                }
            }
        }

        working
    }
}
