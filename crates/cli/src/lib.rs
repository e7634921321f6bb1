//! `scout` command line: the signature-gated HTTP surface plus local JSON commands.

use anyhow::{Context as AnyhowContext, Result};
use clap::{Args, Parser, Subcommand};
use scout_auth::{EnvFileStore, KeyBootstrap, KeySource, SignatureVerifier, DEFAULT_KEY_BITS};
use scout_mcp::config::WORKSPACE_ROOT_ENV;
use scout_mcp::tools::schemas::code_search::CodeSearchRequest;
use scout_mcp::tools::schemas::file_read::FileReadRequest;
use scout_mcp::tools::schemas::symbol_hint::SymbolHintRequest;
use scout_mcp::{JsonlAuditLog, NoopAudit, ScoutConfig, ToolContext};
use scout_protocol::serialize_json_pretty;
use serde::Serialize;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub mod http_api;
mod server_security;
pub mod stream;

pub use http_api::{router, HttpState};
pub use stream::{StreamHub, ToolEvent};

fn print_stdout(text: &str) -> Result<()> {
    let mut stdout = io::stdout().lock();
    if let Err(err) = stdout
        .write_all(text.as_bytes())
        .and_then(|_| stdout.write_all(b"\n"))
        .and_then(|_| stdout.flush())
    {
        if err.kind() == io::ErrorKind::BrokenPipe {
            return Ok(());
        }
        return Err(err.into());
    }
    Ok(())
}

#[derive(Parser)]
#[command(name = "scout")]
#[command(about = "Sandboxed workspace search, read, and symbol tools", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Env file holding configuration and the persisted server public key
    #[arg(long, global = true, default_value = ".env")]
    env_file: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the tool API over HTTP (signed requests only)
    ServeHttp(ServeArgs),

    /// Server key management
    #[command(subcommand)]
    Keys(KeysCommand),

    /// Search file contents and print the result set as JSON
    Search(SearchArgs),

    /// List class, function, and endpoint landmarks as JSON
    Symbols(SymbolsArgs),

    /// Print numbered lines from one file as JSON
    Read(ReadArgs),
}

#[derive(Args)]
struct ServeArgs {
    /// Host to bind
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Port (defaults to PORT or 3001)
    #[arg(long)]
    port: Option<u16>,

    /// Allow binding to non-loopback addresses
    #[arg(long)]
    public: bool,
}

#[derive(Subcommand)]
enum KeysCommand {
    /// Generate the server key pair unless a public key already exists
    Init(KeysInitArgs),
}

#[derive(Args)]
struct KeysInitArgs {
    /// RSA modulus size
    #[arg(long, default_value_t = DEFAULT_KEY_BITS)]
    bits: usize,
}

#[derive(Args)]
struct WorkspaceArgs {
    /// Workspace root (defaults to WORKSPACE_ROOT)
    #[arg(long, short = 'w')]
    workspace: Option<PathBuf>,
}

#[derive(Args)]
struct SearchArgs {
    /// Text to search for
    query: String,

    /// Treat the query as a regular expression
    #[arg(long)]
    regex: bool,

    /// Match case exactly
    #[arg(long, short = 's')]
    case_sensitive: bool,

    /// Include glob (repeatable); prefix with ! to exclude
    #[arg(long, short = 'g')]
    glob: Vec<String>,

    /// Maximum number of matches
    #[arg(long)]
    max_results: Option<usize>,

    #[command(flatten)]
    workspace: WorkspaceArgs,
}

#[derive(Args)]
struct SymbolsArgs {
    /// Case-insensitive name filter
    query: Option<String>,

    /// Maximum number of hints
    #[arg(long)]
    max_results: Option<usize>,

    #[command(flatten)]
    workspace: WorkspaceArgs,
}

#[derive(Args)]
struct ReadArgs {
    /// File path, relative to the workspace root or absolute
    path: String,

    #[arg(long)]
    start_line: Option<usize>,

    #[arg(long)]
    end_line: Option<usize>,

    #[arg(long)]
    max_lines: Option<usize>,

    #[command(flatten)]
    workspace: WorkspaceArgs,
}

pub async fn main_entry() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .target(env_logger::Target::Stderr)
        .init();

    load_env_file(&cli.env_file)?;

    match cli.command {
        Commands::ServeHttp(args) => serve_http(args, &cli.env_file).await,
        Commands::Keys(KeysCommand::Init(args)) => keys_init(args, &cli.env_file),
        Commands::Search(args) => {
            let request = CodeSearchRequest {
                query: args.query,
                regex: args.regex.then_some(true),
                case_sensitive: args.case_sensitive.then_some(true),
                glob: (!args.glob.is_empty()).then_some(args.glob),
                max_results: args.max_results,
            };
            run_local_tool(&args.workspace, scout_mcp::tools::CODE_SEARCH, &request).await
        }
        Commands::Symbols(args) => {
            let request = SymbolHintRequest {
                query: args.query,
                max_results: args.max_results,
            };
            run_local_tool(&args.workspace, scout_mcp::tools::SYMBOL_HINT, &request).await
        }
        Commands::Read(args) => {
            let request = FileReadRequest {
                path: args.path,
                start_line: args.start_line,
                end_line: args.end_line,
                max_lines: args.max_lines,
            };
            run_local_tool(&args.workspace, scout_mcp::tools::FILE_READ, &request).await
        }
    }
}

/// Values already present in the process environment win over the file.
fn load_env_file(path: &Path) -> Result<()> {
    match dotenvy::from_path(path) {
        Ok(()) => Ok(()),
        Err(err) if err.not_found() => Ok(()),
        Err(err) => Err(err).with_context(|| format!("Failed to load {}", path.display())),
    }
}

fn load_config(workspace: &WorkspaceArgs) -> Result<ScoutConfig> {
    let config = match &workspace.workspace {
        Some(root) => {
            let root = root.to_string_lossy().into_owned();
            ScoutConfig::from_lookup(|key| {
                if key == WORKSPACE_ROOT_ENV {
                    Some(root.clone())
                } else {
                    std::env::var(key).ok()
                }
            })
        }
        None => ScoutConfig::from_lookup(|key| std::env::var(key).ok()),
    };
    config.context("Invalid configuration")
}

async fn run_local_tool<T: Serialize>(
    workspace: &WorkspaceArgs,
    tool: &str,
    request: &T,
) -> Result<()> {
    let config = load_config(workspace)?;
    let ctx = ToolContext::new(config, Arc::new(NoopAudit))
        .context("Failed to set up workspace sandbox")?;
    let args = serde_json::to_value(request).context("Failed to encode tool arguments")?;

    match ctx.call(tool, args).await {
        Ok(reply) => print_stdout(&serialize_json_pretty(&reply.value)?),
        Err(err) => {
            print_stdout(&serialize_json_pretty(
                &serde_json::json!({ "error": err.envelope() }),
            )?)?;
            anyhow::bail!("{tool} failed: {err}")
        }
    }
}

fn bootstrap_key(env_file: &Path, bits: usize) -> Result<(String, KeySource)> {
    let store = EnvFileStore::new(env_file);
    let configured = std::env::var(scout_auth::PUBLIC_KEY_VAR).ok();
    let key = KeyBootstrap::new(&store)
        .with_configured(configured.as_deref())
        .with_key_bits(bits)
        .run(&mut io::stdout().lock())
        .context("Server key bootstrap failed")?;
    Ok((key.public_pem, key.source))
}

fn keys_init(args: KeysInitArgs, env_file: &Path) -> Result<()> {
    let (_, source) = bootstrap_key(env_file, args.bits)?;
    match source {
        KeySource::Generated => {
            print_stdout(&format!("Public key written to {}", env_file.display()))
        }
        KeySource::Store => print_stdout(&format!(
            "Public key already present in {}; nothing to do",
            env_file.display()
        )),
        KeySource::Environment => print_stdout(&format!(
            "Using {} from the environment; nothing to do",
            scout_auth::PUBLIC_KEY_VAR
        )),
    }
}

async fn serve_http(args: ServeArgs, env_file: &Path) -> Result<()> {
    let config = ScoutConfig::from_lookup(|key| std::env::var(key).ok())
        .context("Invalid configuration")?;
    let port = args.port.unwrap_or(config.port);
    let bind = format!("{}:{port}", args.host);
    let addrs = server_security::resolve_guarded_bind_addrs(&bind, args.public).await?;
    let addr = server_security::choose_preferred_bind_addr(&addrs)
        .ok_or_else(|| anyhow::anyhow!("Bind address resolved to zero socket addrs: {bind}"))?;

    let (public_pem, source) = bootstrap_key(env_file, DEFAULT_KEY_BITS)?;
    log::info!("Server public key loaded ({source:?})");
    let verifier = SignatureVerifier::from_pem(&public_pem).context("Invalid server public key")?;

    let audit = Arc::new(JsonlAuditLog::new(config.audit_log.clone()));
    let workspace_root = config.workspace_root.clone();
    let tools = ToolContext::new(config, audit).context("Failed to set up workspace sandbox")?;
    let app = router(HttpState::new(tools, Some(verifier)));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let local_addr = listener.local_addr()?;
    let base_url = format!("http://{local_addr}");

    print_stdout(&format!("Workspace: {}", workspace_root.display()))?;
    print_stdout(&format!("Tool API: {base_url}/api/tools/<name> (signed)"))?;
    print_stdout(&format!("Event stream: {base_url}/api/stream (signed)"))?;
    print_stdout(&format!("Health endpoint: {base_url}/health"))?;
    axum::serve(listener, app).await?;
    Ok(())
}
