use rmcp::schemars;
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Serialize, Deserialize, schemars::JsonSchema)]
pub struct RepoListRequest {}

#[derive(Debug, Serialize, Deserialize, schemars::JsonSchema, PartialEq, Eq)]
pub struct WorkspaceEntry {
    pub name: String,
    /// Absolute path
    pub path: String,
}

#[derive(Debug, Serialize, Deserialize, schemars::JsonSchema)]
pub struct RepoListResult {
    pub workspace_root: String,
    pub workspaces: Vec<WorkspaceEntry>,
    pub ignored: Vec<String>,
}
