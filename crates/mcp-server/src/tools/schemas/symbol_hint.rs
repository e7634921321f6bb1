use rmcp::schemars;
use scout_protocol::SymbolHint;
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SymbolHintRequest {
    #[schemars(description = "Case-insensitive substring the symbol name must contain")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,

    #[schemars(description = "Maximum number of hints (default: 100)")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_results: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize, schemars::JsonSchema)]
pub struct SymbolHintResult {
    pub hints: Vec<SymbolHint>,
}
