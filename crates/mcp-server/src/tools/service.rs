use super::schemas::code_search::CodeSearchRequest;
use super::schemas::file_read::FileReadRequest;
use super::schemas::investigation_report::InvestigationReportRequest;
use super::schemas::repo_list::RepoListRequest;
use super::schemas::symbol_hint::SymbolHintRequest;
use super::{
    to_call_result, ToolContext, BUILD_INVESTIGATION_REPORT, CODE_SEARCH, FILE_READ, REPO_LIST,
    SYMBOL_HINT,
};
use rmcp::handler::server::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{CallToolResult, Implementation, ServerCapabilities, ServerInfo};
use rmcp::{tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler};
use serde::Serialize;

/// Scout MCP service
#[derive(Clone)]
pub struct ScoutService {
    ctx: ToolContext,
    tool_router: ToolRouter<Self>,
}

impl ScoutService {
    pub fn new(ctx: ToolContext) -> Self {
        Self {
            ctx,
            tool_router: Self::tool_router(),
        }
    }

    pub fn context(&self) -> &ToolContext {
        &self.ctx
    }

    async fn invoke<T: Serialize>(
        &self,
        tool: &str,
        request: &T,
    ) -> Result<CallToolResult, McpError> {
        let args = serde_json::to_value(request)
            .map_err(|err| McpError::internal_error(err.to_string(), None))?;
        Ok(to_call_result(self.ctx.call(tool, args).await))
    }
}

#[tool_router]
impl ScoutService {
    /// Workspace root, its top-level directories, and the ignore list.
    #[tool(
        description = "List the workspace root and its top-level directories (repositories), plus the ignored directory patterns."
    )]
    pub async fn repo_list(
        &self,
        Parameters(request): Parameters<RepoListRequest>,
    ) -> Result<CallToolResult, McpError> {
        self.invoke(REPO_LIST, &request).await
    }

    /// Literal or regex search across the workspace.
    #[tool(
        description = "Search file contents in the workspace (literal by default, regex optional). Returns path, line, column, preview, and a +/-2 line context per match."
    )]
    pub async fn code_search(
        &self,
        Parameters(request): Parameters<CodeSearchRequest>,
    ) -> Result<CallToolResult, McpError> {
        self.invoke(CODE_SEARCH, &request).await
    }

    /// Numbered lines from one file.
    #[tool(
        description = "Read a range of lines from a file inside the workspace. Path may be relative to the workspace root or absolute."
    )]
    pub async fn file_read(
        &self,
        Parameters(request): Parameters<FileReadRequest>,
    ) -> Result<CallToolResult, McpError> {
        self.invoke(FILE_READ, &request).await
    }

    /// Class, function, and endpoint landmarks.
    #[tool(
        description = "Find class/interface, function, and HTTP endpoint declarations in TS/JS/Python/Java sources, optionally filtered by a name substring."
    )]
    pub async fn symbol_hint(
        &self,
        Parameters(request): Parameters<SymbolHintRequest>,
    ) -> Result<CallToolResult, McpError> {
        self.invoke(SYMBOL_HINT, &request).await
    }

    /// Markdown skeleton for an incident investigation.
    #[tool(
        description = "Generate a markdown investigation report skeleton from incident details (title, environment, services, time window, trace ids, error codes, log snippets)."
    )]
    pub async fn build_investigation_report(
        &self,
        Parameters(request): Parameters<InvestigationReportRequest>,
    ) -> Result<CallToolResult, McpError> {
        self.invoke(BUILD_INVESTIGATION_REPORT, &request).await
    }
}

#[tool_handler]
impl ServerHandler for ScoutService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some("Scout exposes sandboxed workspace tools. Start with 'repo_list', locate code with 'code_search' or 'symbol_hint', then read it with 'file_read'. Paths outside the workspace root or inside ignored directories are always refused.".into()),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            ..Default::default()
        }
    }
}
