use rmcp::schemars;
use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_LINES: usize = 200;

#[derive(Debug, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FileReadRequest {
    #[schemars(description = "File path, relative to the workspace root or absolute")]
    pub path: String,

    #[schemars(description = "First line to return (1-based, default: 1)")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_line: Option<usize>,

    #[schemars(description = "Last line to return (1-based, inclusive)")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_line: Option<usize>,

    #[schemars(description = "Maximum number of lines to return (default: 200)")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_lines: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize, schemars::JsonSchema, PartialEq, Eq)]
pub struct NumberedLine {
    pub line: usize,
    pub text: String,
}

#[derive(Debug, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FileReadResult {
    /// Absolute path
    pub path: String,
    pub start_line: usize,
    pub end_line: usize,
    pub lines: Vec<NumberedLine>,
    /// The window stopped before the requested end.
    pub truncated: bool,
}
