//! Server process lifecycle management.
//!
//! Spawns MCP server child processes, performs the initialization
//! handshake, and shuts them down. Each server runs as a separate OS
//! process communicating via JSON-RPC over stdio.

use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::{Child, ChildStderr, Command};
use tokio::sync::Mutex;

use super::errors::McpError;
use super::session::{Connector, ToolSession};
use super::transport::{extract_result, StdioTransport};
use super::types::{
    CallToolResult, InitializeResult, ListToolsResult, McpToolDefinition, ServerConfig,
    PROTOCOL_VERSION,
};

// ─── Constants ───────────────────────────────────────────────────────────────

/// Timeout for the initialize handshake.
///
/// Python servers that import heavy packages at startup can take a while.
const INIT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default timeout for a single `tools/call`.
const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(60);

/// Timeout for graceful shutdown before force-killing.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Upper bound on `tools/list` pages, in case a server loops its cursor.
const MAX_LIST_PAGES: usize = 64;

// ─── StdioSession ────────────────────────────────────────────────────────────

/// A running MCP server process with its transport.
pub struct StdioSession {
    /// Backend id (e.g., "weather").
    name: String,
    /// The child process handle.
    process: Mutex<Child>,
    /// JSON-RPC transport (stdin/stdout).
    transport: StdioTransport,
    call_timeout: Duration,
    closed: bool,
}

#[async_trait]
impl ToolSession for StdioSession {
    async fn list_tools(&self) -> Result<Vec<McpToolDefinition>, McpError> {
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;

        for _ in 0..MAX_LIST_PAGES {
            let params = cursor.as_ref().map(|c| serde_json::json!({ "cursor": c }));
            let response = self.transport.request("tools/list", params).await?;
            let page: ListToolsResult = serde_json::from_value(extract_result(response)?)
                .map_err(|e| McpError::TransportError {
                    server: self.name.clone(),
                    reason: format!("failed to parse tools/list response: {e}"),
                })?;

            tools.extend(page.tools);
            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => return Ok(tools),
            }
        }

        tracing::warn!(server = %self.name, "tools/list pagination limit reached");
        Ok(tools)
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<CallToolResult, McpError> {
        if self.closed {
            return Err(McpError::SessionClosed {
                name: self.name.clone(),
            });
        }

        let params = serde_json::json!({
            "name": name,
            "arguments": arguments,
        });

        let response = tokio::time::timeout(
            self.call_timeout,
            self.transport.request("tools/call", Some(params)),
        )
        .await
        .map_err(|_| McpError::Timeout {
            tool: name.to_string(),
            timeout_ms: self.call_timeout.as_millis() as u64,
        })??;

        serde_json::from_value(extract_result(response)?).map_err(|e| McpError::TransportError {
            server: self.name.clone(),
            reason: format!("failed to parse tools/call response: {e}"),
        })
    }

    async fn close(&mut self) -> Result<(), McpError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        // Closing stdin is the MCP stdio shutdown signal.
        self.transport.close().await;

        let process = self.process.get_mut();
        match tokio::time::timeout(SHUTDOWN_TIMEOUT, process.wait()).await {
            Ok(Ok(_)) => Ok(()),
            _ => {
                // Force kill if graceful shutdown failed/timed out
                process.kill().await.map_err(|e| McpError::ShutdownFailed {
                    name: self.name.clone(),
                    reason: e.to_string(),
                })
            }
        }
    }
}

// ─── Spawning ────────────────────────────────────────────────────────────────

/// Opens [`StdioSession`]s by spawning the configured command.
#[derive(Debug, Clone)]
pub struct StdioConnector {
    /// Working directory used when a server config has no `cwd`.
    working_dir: Option<String>,
    call_timeout: Duration,
}

impl StdioConnector {
    pub fn new(working_dir: Option<String>) -> Self {
        Self {
            working_dir,
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    /// Set the per-call timeout for `tools/call`.
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }
}

impl Default for StdioConnector {
    fn default() -> Self {
        Self::new(None)
    }
}

#[async_trait]
impl Connector for StdioConnector {
    async fn open(
        &self,
        backend_id: &str,
        config: &ServerConfig,
    ) -> Result<Box<dyn ToolSession>, McpError> {
        let session =
            spawn_server(backend_id, config, self.working_dir.as_deref(), self.call_timeout)
                .await?;
        Ok(Box::new(session))
    }
}

/// Spawn a single MCP server process and perform the initialization handshake.
pub async fn spawn_server(
    name: &str,
    config: &ServerConfig,
    working_dir: Option<&str>,
    call_timeout: Duration,
) -> Result<StdioSession, McpError> {
    let mut cmd = Command::new(&config.command);
    cmd.args(&config.args);

    for (key, value) in &config.env {
        cmd.env(key, value);
    }

    // Per-server cwd overrides the connector-wide working_dir
    if let Some(dir) = config.cwd.as_deref().or(working_dir) {
        cmd.current_dir(dir);
    }

    // Windows: prevent console window from appearing for child processes
    #[cfg(target_os = "windows")]
    {
        const CREATE_NO_WINDOW: u32 = 0x08000000;
        cmd.creation_flags(CREATE_NO_WINDOW);
    }

    cmd.stdin(std::process::Stdio::piped());
    cmd.stdout(std::process::Stdio::piped());
    cmd.stderr(std::process::Stdio::piped());
    cmd.kill_on_drop(true);

    let mut child = cmd.spawn().map_err(|e| McpError::SpawnFailed {
        name: name.to_string(),
        reason: format!("{e}"),
    })?;

    let (stdin, stdout) = match (child.stdin.take(), child.stdout.take()) {
        (Some(stdin), Some(stdout)) => (stdin, stdout),
        _ => {
            let _ = child.kill().await;
            return Err(McpError::SpawnFailed {
                name: name.to_string(),
                reason: "failed to capture stdio".into(),
            });
        }
    };
    let stderr_handle = child.stderr.take();

    let transport = StdioTransport::new(name, stdin, stdout);

    let failure = match tokio::time::timeout(INIT_TIMEOUT, initialize(&transport, name)).await {
        Ok(Ok(())) => None,
        Ok(Err(e)) => Some(e.to_string()),
        Err(_) => Some(format!(
            "initialization timed out after {}s",
            INIT_TIMEOUT.as_secs()
        )),
    };

    if let Some(reason) = failure {
        let _ = child.kill().await;
        let stderr_ctx = read_stderr_on_failure(stderr_handle).await;
        if !stderr_ctx.is_empty() {
            tracing::warn!(
                server = name,
                stderr = %stderr_ctx,
                "server stderr captured on failure"
            );
        }
        return Err(McpError::InitFailed {
            name: name.to_string(),
            reason: format!("{reason}{}", format_stderr_suffix(&stderr_ctx)),
        });
    }

    if let Some(stderr) = stderr_handle {
        forward_stderr(name.to_string(), stderr);
    }

    Ok(StdioSession {
        name: name.to_string(),
        process: Mutex::new(child),
        transport,
        call_timeout,
        closed: false,
    })
}

/// Drain a running server's stderr into the log so the pipe never fills up.
fn forward_stderr(server: String, stderr: ChildStderr) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            tracing::debug!(server = %server, "{line}");
        }
    });
}

/// Read any available stderr output from a failed server process.
///
/// Uses a short timeout to avoid blocking if stderr is empty. Truncates to
/// 2000 chars to keep log messages readable.
async fn read_stderr_on_failure(stderr_handle: Option<ChildStderr>) -> String {
    let Some(mut stderr) = stderr_handle else {
        return String::new();
    };

    let mut buf = String::new();
    match tokio::time::timeout(Duration::from_millis(500), stderr.read_to_string(&mut buf)).await
    {
        Ok(Ok(_)) => {
            if buf.len() > 2000 {
                let mut cut = 2000;
                while !buf.is_char_boundary(cut) {
                    cut -= 1;
                }
                buf.truncate(cut);
                buf.push_str("...(truncated)");
            }
            buf
        }
        _ => String::new(),
    }
}

/// Format a stderr suffix for error messages (empty string if no stderr).
fn format_stderr_suffix(stderr: &str) -> String {
    if stderr.is_empty() {
        String::new()
    } else {
        format!(" | stderr: {}", stderr.trim())
    }
}

/// Perform the MCP initialization handshake.
async fn initialize(transport: &StdioTransport, server_name: &str) -> Result<(), McpError> {
    let params = serde_json::json!({
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": {},
        "clientInfo": {
            "name": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
        },
    });
    let response = transport.request("initialize", Some(params)).await?;

    let init: InitializeResult =
        serde_json::from_value(extract_result(response)?).map_err(|e| McpError::InitFailed {
            name: server_name.to_string(),
            reason: format!("failed to parse initialize response: {e}"),
        })?;

    tracing::debug!(
        server = server_name,
        protocol = ?init.protocol_version,
        server_name = ?init.server_info.as_ref().and_then(|i| i.name.as_deref()),
        server_version = ?init.server_info.as_ref().and_then(|i| i.version.as_deref()),
        "initialize handshake complete"
    );

    transport.notify("notifications/initialized", None).await
}

// ─── Tests ───────────────────────────────────────────────────────────────────
