//! Scout MCP server
//!
//! Exposes sandboxed workspace tools to AI agents over MCP stdio.
//!
//! ## Tools
//!
//! - `repo_list` - Workspace root and its top-level directories
//! - `code_search` - Literal/regex search (ripgrep when available, in-process walk otherwise)
//! - `file_read` - Numbered line ranges from one file
//! - `symbol_hint` - Class, function, and endpoint landmarks
//! - `build_investigation_report` - Markdown incident investigation skeleton
//!
//! ## Usage
//!
//! ```json
//! {
//!   "mcpServers": {
//!     "scout": {
//!       "command": "scout-mcp",
//!       "env": { "WORKSPACE_ROOT": "/path/to/workspace" }
//!     }
//!   }
//! }
//! ```

pub mod audit;
pub mod config;
pub mod tools;

pub use audit::{AuditEntry, AuditSink, JsonlAuditLog, MemoryAudit, NoopAudit};
pub use config::{ConfigError, ScoutConfig};
pub use tools::{ScoutService, ToolContext, ToolError, ToolReply, TOOL_NAMES};

use anyhow::{Context, Result};
use rmcp::transport::stdio;
use rmcp::ServiceExt;
use std::sync::Arc;

pub async fn main_entry() -> Result<()> {
    // Logging goes to stderr only; stdout carries the MCP protocol.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .target(env_logger::Target::Stderr)
        .init();

    let config = ScoutConfig::from_env().context("Invalid configuration")?;
    log::info!(
        "Starting Scout MCP server for {}",
        config.workspace_root.display()
    );

    let audit = Arc::new(JsonlAuditLog::new(config.audit_log.clone()));
    let ctx = ToolContext::new(config, audit).context("Failed to set up workspace sandbox")?;
    let server = ScoutService::new(ctx).serve(stdio()).await?;
    server.waiting().await?;

    log::info!("Scout MCP server stopped");
    Ok(())
}
