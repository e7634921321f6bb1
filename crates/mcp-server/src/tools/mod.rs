//! Scout tool surface.
//!
//! Every tool call, whether it arrives over MCP stdio or the HTTP API, goes through
//! [`ToolContext::call`]: arguments are decoded, the handler runs, and exactly one audit entry is
//! recorded.

mod code_search;
mod error;
mod file_read;
mod investigation_report;
mod repo_list;
pub mod schemas;
mod service;
mod symbol_hint;

pub use error::{tool_error_result, ToolError};
pub use service::ScoutService;

use crate::audit::{AuditEntry, AuditSink};
use crate::config::ScoutConfig;
use rmcp::model::{CallToolResult, Content};
use scout_protocol::{serialize_json_pretty, SearchResultSet};
use scout_search::{PathSandbox, SandboxError, SearchEngine, SymbolExtractor};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

pub const REPO_LIST: &str = "repo_list";
pub const CODE_SEARCH: &str = "code_search";
pub const FILE_READ: &str = "file_read";
pub const SYMBOL_HINT: &str = "symbol_hint";
pub const BUILD_INVESTIGATION_REPORT: &str = "build_investigation_report";

pub const TOOL_NAMES: &[&str] = &[
    REPO_LIST,
    CODE_SEARCH,
    FILE_READ,
    SYMBOL_HINT,
    BUILD_INVESTIGATION_REPORT,
];

/// Tool results report how many items they carry, for the audit trail.
pub trait ToolOutput: Serialize {
    fn result_count(&self) -> usize {
        1
    }
}

impl ToolOutput for schemas::repo_list::RepoListResult {
    fn result_count(&self) -> usize {
        self.workspaces.len()
    }
}

impl ToolOutput for SearchResultSet {
    fn result_count(&self) -> usize {
        self.matches.len()
    }
}

impl ToolOutput for schemas::file_read::FileReadResult {
    fn result_count(&self) -> usize {
        self.lines.len()
    }
}

impl ToolOutput for schemas::symbol_hint::SymbolHintResult {
    fn result_count(&self) -> usize {
        self.hints.len()
    }
}

impl ToolOutput for schemas::investigation_report::InvestigationReportResult {}

/// Successful tool output as JSON.
#[derive(Debug, Clone)]
pub struct ToolReply {
    pub value: serde_json::Value,
    pub result_count: usize,
}

impl ToolReply {
    fn from_output<T: ToolOutput>(output: T) -> Result<Self, ToolError> {
        let result_count = output.result_count();
        let value = serde_json::to_value(&output)
            .map_err(|err| ToolError::Execution(format!("Failed to encode result: {err}")))?;
        Ok(Self {
            value,
            result_count,
        })
    }

    pub fn into_call_result(self) -> CallToolResult {
        let text = serialize_json_pretty(&self.value).unwrap_or_else(|_| self.value.to_string());
        let mut result = CallToolResult::success(vec![Content::text(text)]);
        result.structured_content = Some(self.value);
        result
    }
}

pub fn to_call_result(outcome: Result<ToolReply, ToolError>) -> CallToolResult {
    match outcome {
        Ok(reply) => reply.into_call_result(),
        Err(err) => tool_error_result(&err),
    }
}

struct ToolContextInner {
    config: ScoutConfig,
    sandbox: Arc<PathSandbox>,
    engine: SearchEngine,
    symbols: SymbolExtractor,
    audit: Arc<dyn AuditSink>,
}

/// Shared, read-only state behind every tool call. Cheap to clone.
#[derive(Clone)]
pub struct ToolContext {
    inner: Arc<ToolContextInner>,
}

impl ToolContext {
    pub fn new(config: ScoutConfig, audit: Arc<dyn AuditSink>) -> Result<Self, SandboxError> {
        let sandbox = Arc::new(config.sandbox()?);
        let engine = match &config.rg_path {
            Some(program) => SearchEngine::with_native_tool(Arc::clone(&sandbox), program.clone()),
            None => SearchEngine::new(Arc::clone(&sandbox)),
        };
        Ok(Self::with_engine(config, sandbox, engine, audit))
    }

    pub fn with_engine(
        config: ScoutConfig,
        sandbox: Arc<PathSandbox>,
        engine: SearchEngine,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        let symbols = SymbolExtractor::new(Arc::clone(&sandbox));
        Self {
            inner: Arc::new(ToolContextInner {
                config,
                sandbox,
                engine,
                symbols,
                audit,
            }),
        }
    }

    pub fn config(&self) -> &ScoutConfig {
        &self.inner.config
    }

    pub fn sandbox(&self) -> &PathSandbox {
        &self.inner.sandbox
    }

    pub fn engine(&self) -> &SearchEngine {
        &self.inner.engine
    }

    pub fn symbols(&self) -> &SymbolExtractor {
        &self.inner.symbols
    }

    /// Run one tool by name and record it in the audit trail.
    pub async fn call(
        &self,
        tool: &str,
        args: serde_json::Value,
    ) -> Result<ToolReply, ToolError> {
        let outcome = self.dispatch(tool, args.clone()).await;
        let entry = match &outcome {
            Ok(reply) => AuditEntry::new(tool, args, reply.result_count),
            Err(err) => {
                log::debug!("{tool} failed: {err}");
                AuditEntry::failure(tool, args, &err.to_string())
            }
        };
        self.inner.audit.record(entry);
        outcome
    }

    async fn dispatch(&self, tool: &str, args: serde_json::Value) -> Result<ToolReply, ToolError> {
        match tool {
            REPO_LIST => ToolReply::from_output(repo_list::repo_list(self, parse_args(args)?)?),
            CODE_SEARCH => {
                ToolReply::from_output(code_search::code_search(self, parse_args(args)?).await?)
            }
            FILE_READ => {
                ToolReply::from_output(file_read::file_read(self, parse_args(args)?).await?)
            }
            SYMBOL_HINT => {
                ToolReply::from_output(symbol_hint::symbol_hint(self, parse_args(args)?).await?)
            }
            BUILD_INVESTIGATION_REPORT => ToolReply::from_output(
                investigation_report::build_investigation_report(parse_args(args)?)?,
            ),
            other => Err(ToolError::NotFound(format!("Unknown tool: {other}"))),
        }
    }
}

fn parse_args<T: DeserializeOwned>(args: serde_json::Value) -> Result<T, ToolError> {
    let args = if args.is_null() {
        serde_json::Value::Object(serde_json::Map::new())
    } else {
        args
    };
    serde_json::from_value(args)
        .map_err(|err| ToolError::InvalidArguments(format!("Invalid arguments: {err}")))
}
