//! CLI entrypoint for mcpmux.
//!
//! Wires the config, backend registry, completion provider and chat loop
//! together, and guarantees every backend is shut down on exit.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use tokio::io::BufReader;

use mcpmux::agent_core::profiles::DEFAULT_PROFILE_NAME;
use mcpmux::agent_core::{ConversationState, QueryOrchestrator, RoleProfiles};
use mcpmux::commands::chat_loop;
use mcpmux::inference::{InferenceClient, ProviderConfig};
use mcpmux::mcp_client::config::{entries_from_scripts, load_servers_config, DEFAULT_CONFIG_FILE};
use mcpmux::mcp_client::{
    ConnectOutcome, ConnectionRegistry, McpServersConfig, ServerEntry, StdioConnector,
};
use mcpmux::{init_tracing, load_dotenv, LogOptions};

/// One chat session, tools from many MCP servers.
#[derive(Debug, Parser)]
#[command(name = "mcpmux", version, about)]
struct Cli {
    /// Server scripts to connect (.py runs under python, .js under node)
    scripts: Vec<String>,

    /// Backend config file (`{"mcpServers": {...}}`) [default: ./mcp_servers.json if present]
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Role profiles file (`{"name": {"role": ..., "content": ...}}`)
    #[arg(long)]
    roles: Option<PathBuf>,

    /// Role profile to start with
    #[arg(long, default_value = DEFAULT_PROFILE_NAME)]
    role: String,

    /// OpenAI-compatible API base URL
    #[arg(long, env = "MCPMUX_BASE_URL")]
    base_url: Option<String>,

    /// Model name sent to the provider
    #[arg(short, long, env = "MCPMUX_MODEL")]
    model: Option<String>,

    /// Sampling temperature (0-2)
    #[arg(long)]
    temperature: Option<f32>,

    /// Maximum tokens per completion
    #[arg(long)]
    max_tokens: Option<u32>,

    /// Timeout for a single tool call, in seconds
    #[arg(long, default_value_t = 60)]
    call_timeout: u64,

    /// Write logs to stderr instead of the log file
    #[arg(long)]
    log_stderr: bool,

    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<ExitCode> {
    // Before clap, so `env = ...` args see .env values.
    load_dotenv(Path::new(".env"));
    let cli = Cli::parse();

    match init_tracing(&LogOptions {
        to_stderr: cli.log_stderr,
        verbosity: cli.verbose,
    }) {
        Ok(Some(path)) => eprintln!("Logging to {}", path.display()),
        Ok(None) => {}
        Err(e) => eprintln!("Warning: logging disabled: {e}"),
    }

    // ─── Configuration ───────────────────────────────────────────────────

    let servers = match load_backend_config(cli.config.as_deref()) {
        Ok(servers) => servers,
        Err(e) => {
            eprintln!("Error: {e}");
            return Ok(ExitCode::FAILURE);
        }
    };

    let provider_config = match ProviderConfig::from_env().and_then(|cfg| {
        let cfg = match &cli.base_url {
            Some(url) => cfg.with_base_url(url),
            None => cfg,
        };
        let cfg = match &cli.model {
            Some(model) => cfg.with_model(model),
            None => cfg,
        };
        cfg.with_sampling(cli.temperature, cli.max_tokens)
    }) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Error: {e}");
            return Ok(ExitCode::FAILURE);
        }
    };
    let provider = InferenceClient::new(provider_config).context("failed to create provider")?;

    let profiles = cli
        .roles
        .as_deref()
        .map(RoleProfiles::load)
        .unwrap_or_default();
    if cli.role != DEFAULT_PROFILE_NAME && !profiles.contains(&cli.role) {
        eprintln!("Warning: unknown role '{}', using the default", cli.role);
    }

    // ─── Backends ────────────────────────────────────────────────────────

    let connector = StdioConnector::default().with_call_timeout(Duration::from_secs(cli.call_timeout));
    let mut registry = ConnectionRegistry::new(Arc::new(connector));

    let mut entries: Vec<(String, ServerEntry)> = servers.servers.into_iter().collect();
    for script in entries_from_scripts(cli.scripts.iter().map(String::as_str)) {
        match script {
            Ok(entry) => entries.push(entry),
            Err(e) => eprintln!("Skipping backend '{}': {e}", e.backend_id()),
        }
    }

    if entries.is_empty() {
        eprintln!("Warning: no backends configured; running as a plain chat client");
    }

    for (backend_id, outcome) in registry.connect_many(entries).await {
        match outcome {
            ConnectOutcome::Connected { tool_count } => {
                println!("Connected to backend '{backend_id}' ({tool_count} tools)")
            }
            ConnectOutcome::Disabled => println!("Skipping disabled backend '{backend_id}'"),
            ConnectOutcome::Failed(e) => eprintln!("Failed to connect backend '{backend_id}': {e}"),
        }
    }

    tracing::info!(
        backends = registry.len(),
        tools = registry.tool_count(),
        model = %provider.model(),
        "session ready"
    );

    // ─── Chat ────────────────────────────────────────────────────────────

    let conversation = ConversationState::new(profiles, &cli.role);
    let mut orchestrator = QueryOrchestrator::new(registry, Arc::new(provider), conversation);

    let stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = tokio::io::stdout();
    let loop_result = chat_loop(&mut orchestrator, stdin, &mut stdout).await;

    // Always release backends, even if the terminal went away.
    let failed = orchestrator.shutdown().await;
    for backend_id in &failed {
        eprintln!("Warning: backend '{backend_id}' did not shut down cleanly");
    }
    tracing::info!(failed = failed.len(), "shutdown complete");

    loop_result.context("terminal I/O failed")?;
    Ok(ExitCode::SUCCESS)
}

/// Load the backend config.
///
/// An explicit path must load. Without one, `./mcp_servers.json` is used if
/// it exists; otherwise there are no config-file backends.
fn load_backend_config(
    path: Option<&Path>,
) -> Result<McpServersConfig, mcpmux::mcp_client::ConfigError> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => {
            let default = PathBuf::from(DEFAULT_CONFIG_FILE);
            if !default.exists() {
                return Ok(McpServersConfig::default());
            }
            default
        }
    };

    let config = load_servers_config(&path)?;
    if config.servers.is_empty() {
        eprintln!("Warning: {} defines no backends", path.display());
        tracing::warn!(path = %path.display(), "config loaded but empty");
    }
    Ok(config)
}
