//! CSV columnisation
//!
//! Turns a flattened map into a dense table:
//!
//! 1. **Headers** are the sorted, deduplicated *de-indexed* keys - every
//!    `[<int>]` stripped, any leading `.` trimmed. `[0].hosts.buckets[1].key`
//!    and `[1].hosts.buckets[0].key` share the column `hosts.buckets.key`.
//! 2. **Array paths** are discovered from each key's deepest bracketed
//!    segment; the path is de-indexed the same way, so sibling branches
//!    contribute indices to one shared path. The root array's path is the
//!    empty string.
//! 3. **Rows** enumerate the Cartesian product of `path -> observed
//!    indices`, paths in lexicographic order (root first, varying slowest),
//!    indices ascending. One row per combination; a combination that has no
//!    source key for some column leaves that cell empty.
//!
//! With no array paths at all, the table is a single row.

use std::collections::BTreeMap;

use etl_protocol::{FlatMap, Value};
use once_cell::sync::Lazy;
use regex::Regex;

#[cfg(test)]
#[path = "tabulate_test.rs"]
mod tests;

static INDEX_SEGMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[\d+\]").unwrap());

/// Observed array indices per de-indexed array path
type ArrayPaths = BTreeMap<String, Vec<usize>>;

/// One choice of index per array path
type Assignment<'a> = BTreeMap<&'a str, usize>;

/// Strip every `[<int>]` segment and any leading dot
pub fn deindex(key: &str) -> String {
    INDEX_SEGMENT
        .replace_all(key, "")
        .trim_start_matches('.')
        .to_string()
}

/// Derive the shared column set for a group of flat maps
///
/// All batches of one tick share one header vector so multi-batch sink
/// aggregation lines up column-for-column.
pub fn derive_headers<'a>(maps: impl IntoIterator<Item = &'a FlatMap>) -> Vec<String> {
    let set: std::collections::BTreeSet<String> = maps
        .into_iter()
        .flat_map(|m| m.keys())
        .map(|k| deindex(k))
        .collect();
    set.into_iter().collect()
}

/// Expand one flat map into rows aligned to `headers`
pub fn expand_rows(data: &FlatMap, headers: &[String]) -> Vec<Vec<String>> {
    let paths = find_array_paths(data);
    assignments(&paths)
        .iter()
        .map(|assignment| {
            headers
                .iter()
                .map(|header| {
                    lookup_cell(data, header, assignment)
                        .map(Value::render)
                        .unwrap_or_default()
                })
                .collect()
        })
        .collect()
}

/// Headers and rows for a single flat map
pub fn tabulate(data: &FlatMap) -> (Vec<String>, Vec<Vec<String>>) {
    let headers = derive_headers([data]);
    let rows = expand_rows(data, &headers);
    (headers, rows)
}

/// Collect `de-indexed path -> sorted observed indices` from every key's
/// deepest bracketed segment
fn find_array_paths(data: &FlatMap) -> ArrayPaths {
    let mut paths: BTreeMap<String, Vec<usize>> = BTreeMap::new();

    for key in data.keys() {
        if let Some((path, index)) = deepest_array_segment(key) {
            let indices = paths.entry(path).or_default();
            if !indices.contains(&index) {
                indices.push(index);
            }
        }
    }

    for indices in paths.values_mut() {
        indices.sort_unstable();
    }
    paths
}

/// The de-indexed path and index of a key's last `[<int>]` segment
fn deepest_array_segment(key: &str) -> Option<(String, usize)> {
    let open = key.rfind('[')?;
    let close = open + key[open..].find(']')?;
    let index: usize = key[open + 1..close].parse().ok()?;
    Some((deindex(&key[..open]), index))
}

/// Enumerate the Cartesian product of array-path indices
///
/// Paths iterate in map (lexicographic) order, so the root path varies
/// slowest and every assignment keeps indices ascending per path.
fn assignments(paths: &ArrayPaths) -> Vec<Assignment<'_>> {
    let mut combos: Vec<Assignment<'_>> = vec![BTreeMap::new()];
    for (path, indices) in paths {
        let mut next = Vec::with_capacity(combos.len() * indices.len());
        for combo in &combos {
            for index in indices {
                let mut extended = combo.clone();
                extended.insert(path.as_str(), *index);
                next.push(extended);
            }
        }
        combos = next;
    }
    combos
}

/// Resolve a cell: header column under a specific index assignment
///
/// Lookup order: the header verbatim (plain scalar columns), then the
/// fully indexed key rebuilt from the assignment, then a scan for any key
/// that de-indexes to the header and embeds no index contradicting the
/// assignment.
fn lookup_cell<'a>(data: &'a FlatMap, header: &str, assignment: &Assignment<'_>) -> Option<&'a Value> {
    if let Some(value) = data.get(header) {
        return Some(value);
    }

    if !assignment.is_empty() {
        if let Some(value) = data.get(&build_specific_key(header, assignment)) {
            return Some(value);
        }
    }

    data.iter()
        .find(|(key, _)| deindex(key) == header && indices_consistent(key, assignment))
        .map(|(_, value)| value)
}

/// Rebuild the indexed form of a header for one assignment
///
/// Longest paths substitute first so nested array paths land inside the
/// already-substituted prefix; the root path (empty string) applies last
/// as an `[i].` prefix.
fn build_specific_key(header: &str, assignment: &Assignment<'_>) -> String {
    let mut ordered: Vec<(&str, usize)> = assignment.iter().map(|(p, i)| (*p, *i)).collect();
    ordered.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

    let mut result = header.to_string();
    for (path, index) in ordered {
        if path.is_empty() {
            result = format!("[{index}].{result}");
        } else if let Some(rest) = result.strip_prefix(path) {
            result = format!("{path}[{index}]{rest}");
        }
    }
    result
}

/// Whether a key's embedded indices agree with the assignment
///
/// Each bracketed segment of the key is located by the de-indexed prefix
/// before it; segments whose path is not in the assignment are
/// unconstrained.
fn indices_consistent(key: &str, assignment: &Assignment<'_>) -> bool {
    if assignment.is_empty() {
        return true;
    }

    let mut cursor = 0;
    while let Some(open_offset) = key[cursor..].find('[') {
        let open = cursor + open_offset;
        let Some(close_offset) = key[open..].find(']') else {
            break;
        };
        let close = open + close_offset;

        if let Ok(index) = key[open + 1..close].parse::<usize>() {
            let path = deindex(&key[..open]);
            if let Some(expected) = assignment.get(path.as_str()) {
                if *expected != index {
                    return false;
                }
            }
        }
        cursor = close + 1;
    }
    true
}
