use rmcp::model::{CallToolResult, Content};
use scout_protocol::ErrorEnvelope;
use scout_search::{SandboxError, SearchError};
use serde_json::json;
use thiserror::Error;

/// Failure of a single tool call. Rendered to the caller as an [`ErrorEnvelope`].
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("{0}")]
    AccessDenied(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    InvalidArguments(String),

    #[error("{0}")]
    Execution(String),
}

impl ToolError {
    pub const fn code(&self) -> &'static str {
        match self {
            Self::AccessDenied(_) => "access_denied",
            Self::NotFound(_) => "not_found",
            Self::InvalidArguments(_) => "invalid_request",
            Self::Execution(_) => "internal",
        }
    }

    pub fn envelope(&self) -> ErrorEnvelope {
        let envelope = ErrorEnvelope::new(self.code(), self.to_string());
        match self {
            Self::AccessDenied(_) => envelope
                .with_hint("Paths must stay inside the workspace root and outside ignored directories"),
            Self::NotFound(_) => envelope.with_hint("Use repo_list or code_search to find valid paths"),
            _ => envelope,
        }
    }
}

impl From<SandboxError> for ToolError {
    fn from(err: SandboxError) -> Self {
        match err {
            SandboxError::AccessDenied(_) => Self::AccessDenied(err.to_string()),
            SandboxError::InvalidPattern(_) => Self::Execution(err.to_string()),
        }
    }
}

impl From<SearchError> for ToolError {
    fn from(err: SearchError) -> Self {
        match err {
            SearchError::Sandbox(inner) => inner.into(),
            SearchError::EmptyQuery
            | SearchError::InvalidMaxResults
            | SearchError::InvalidPattern(_)
            | SearchError::InvalidGlob(_) => Self::InvalidArguments(err.to_string()),
            SearchError::Exhausted(_) => Self::Execution(err.to_string()),
        }
    }
}

/// MCP rendering: `isError` result with the envelope as structured content.
pub fn tool_error_result(error: &ToolError) -> CallToolResult {
    let envelope = error.envelope();
    let mut text = format!("Error: {}", envelope.message);
    if let Some(hint) = envelope.hint.as_deref() {
        text.push_str(&format!("\nhint: {hint}"));
    }
    let mut result = CallToolResult::error(vec![Content::text(text)]);
    result.structured_content = Some(json!({ "error": envelope }));
    result
}
