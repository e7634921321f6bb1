use rmcp::schemars;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CodeSearchRequest {
    /// Text or regex to search for
    #[schemars(description = "Text to search for (literal unless `regex` is true)")]
    pub query: String,

    #[schemars(description = "Treat the query as a regular expression (default: false)")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regex: Option<bool>,

    #[schemars(description = "Match case exactly (default: false)")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub case_sensitive: Option<bool>,

    /// Include globs; prefix with `!` to exclude
    #[schemars(description = "File globs to include, e.g. [\"*.ts\", \"src/**/*.py\"]; prefix with ! to exclude")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub glob: Option<Vec<String>>,

    #[schemars(description = "Maximum number of matches (default: 200)")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_results: Option<usize>,
}
