//! JSON path selection and recursive flattening
//!
//! The selector pulls a subtree out of the parsed response; the flattener
//! turns that subtree into a map keyed by dotted paths with bracketed array
//! indices, e.g. `hosts.buckets[0].cpu_usage`.
//!
//! One special case: an object whose only key is `value` (any case)
//! collapses into its parent. Elasticsearch metric aggregations wrap every
//! number that way (`{"avg_response_time": {"value": 125.5}}`), and the
//! collapse is what turns them into usable field names. Objects with
//! siblings next to `value` flatten normally.

use etl_protocol::{FlatMap, Value};

/// Select a subtree by dotted path
///
/// Numeric segments index into arrays. An empty path selects the whole
/// body; a path that doesn't resolve returns `None` (the caller treats
/// that as an empty result, not an error).
pub fn select<'a>(body: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(body);
    }

    let mut current = body;
    for segment in path.split('.') {
        current = match current {
            Value::Object(entries) => entries.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Flatten a subtree into a dotted/indexed key map
pub fn flatten(value: &Value) -> FlatMap {
    let mut out = FlatMap::new();
    flatten_into(value, "", &mut out);
    out
}

fn flatten_into(value: &Value, prefix: &str, out: &mut FlatMap) {
    match value {
        Value::Object(entries) => {
            // Single-key `value` wrapper collapses into the parent; the
            // child is bound as-is, even when it is itself composite.
            if entries.len() == 1 {
                let (key, child) = entries.iter().next().unwrap();
                if key.eq_ignore_ascii_case("value") {
                    out.insert(bound_key(prefix), child.clone());
                    return;
                }
            }

            for (key, child) in entries {
                let child_prefix = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                flatten_into(child, &child_prefix, out);
            }
        }
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                flatten_into(item, &format!("{prefix}[{i}]"), out);
            }
        }
        scalar => {
            out.insert(bound_key(prefix), scalar.clone());
        }
    }
}

fn bound_key(prefix: &str) -> String {
    if prefix.is_empty() {
        "value".to_string()
    } else {
        prefix.to_string()
    }
}
