//! Extraction configuration

use serde::Deserialize;

/// Configuration for the extract stage of a pipeline
///
/// `urls`, `cluster_names`, and the optional header arrays are parallel:
/// index `i` of each describes endpoint `i`. When the optional arrays are
/// shorter than `urls`, only the common prefix of endpoints is queried -
/// this is deliberate tolerance for partially updated configs.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExtractConfig {
    /// Elasticsearch query template; may contain the `__CLUSTER__`,
    /// `__STARTTIME__`, and `__ENDTIME__` macros
    pub query: String,

    /// Endpoint base URLs; `/_search` is appended on send
    pub urls: Vec<String>,

    /// Cluster name substituted per endpoint
    pub cluster_names: Vec<String>,

    /// Optional `Authorization` header value per endpoint;
    /// `${VAR}` tokens resolve from the environment at request time
    pub auth_headers: Vec<String>,

    /// Optional extra headers per endpoint, each as a `"Key: Value"` string
    pub additional_headers: Vec<Vec<String>>,

    /// Dotted path into the response; empty selects the whole body
    pub json_path: String,

    /// Ordered include/exclude filters over flattened keys
    pub filters: Vec<FilterConfig>,

    /// Per-request timeout in seconds (default: 30)
    pub timeout_secs: u64,

    /// Additional attempts after a transport failure or 5xx response
    /// (default: 3)
    pub max_retries: u32,

    /// Time expression for `__STARTTIME__` (`NOW`, `NOW-5MIN`, epoch ms)
    pub start_time: Option<String>,

    /// Time expression for `__ENDTIME__`
    pub end_time: Option<String>,

    /// Skip TLS certificate verification
    pub insecure_tls: bool,

    /// Extract-phase debug dumps
    pub debug: DebugConfig,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            query: String::new(),
            urls: Vec::new(),
            cluster_names: Vec::new(),
            auth_headers: Vec::new(),
            additional_headers: Vec::new(),
            json_path: String::new(),
            filters: Vec::new(),
            timeout_secs: 30,
            max_retries: 3,
            start_time: None,
            end_time: None,
            insecure_tls: false,
            debug: DebugConfig::default(),
        }
    }
}

/// A single key filter
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FilterConfig {
    pub kind: FilterKind,
    /// Regular expression; an invalid pattern degrades to exact string match
    pub pattern: String,
}

/// Filter direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterKind {
    Include,
    Exclude,
}

/// Debug dump settings for the extract stage
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DebugConfig {
    pub enabled: bool,
    /// Base path; dumps land next to it as `{base}_extract_{ts}.json`
    pub path: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_defaults() {
        let config: ExtractConfig = toml::from_str("").unwrap();
        assert!(config.query.is_empty());
        assert!(config.auth_headers.is_empty());
        assert_eq!(config.timeout_secs, 30);
        assert_eq!(config.max_retries, 3);
        assert!(!config.insecure_tls);
        assert!(!config.debug.enabled);
    }

    #[test]
    fn test_deserialize_full() {
        let toml = r#"
query = '{"size":0,"term":{"cluster.name":"__CLUSTER__"}}'
urls = ["https://es-1:9200", "https://es-2:9200"]
cluster_names = ["prod", "staging"]
auth_headers = ["Bearer ${ES_TOKEN}"]
additional_headers = [["X-Scope-OrgID: tenant-a"]]
json_path = "aggregations.services.buckets"
timeout_secs = 10
max_retries = 1
start_time = "NOW-5MIN"
end_time = "NOW"
insecure_tls = true
filters = [{ kind = "exclude", pattern = "doc_count_error" }]

[debug]
enabled = true
path = "debug/extract"
"#;
        let config: ExtractConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.urls.len(), 2);
        assert_eq!(config.cluster_names[1], "staging");
        assert_eq!(config.start_time.as_deref(), Some("NOW-5MIN"));
        assert_eq!(config.filters.len(), 1);
        assert!(config.debug.enabled);
    }

    #[test]
    fn test_filter_kind_lowercase() {
        let config: FilterConfig = toml::from_str(
            r#"kind = "exclude"
pattern = "doc_count""#,
        )
        .unwrap();
        assert_eq!(config.kind, FilterKind::Exclude);
    }
}
