//! MCP client error types.

use thiserror::Error;

/// Errors raised by a single backend session (process, handshake, JSON-RPC).
#[derive(Debug, Error)]
pub enum McpError {
    /// A server process failed to start.
    #[error("failed to spawn server '{name}': {reason}")]
    SpawnFailed {
        name: String,
        reason: String,
    },

    /// The initialization handshake failed.
    #[error("server '{name}' initialization failed: {reason}")]
    InitFailed {
        name: String,
        reason: String,
    },

    /// JSON-RPC communication error (malformed message, I/O error).
    #[error("transport error for server '{server}': {reason}")]
    TransportError {
        server: String,
        reason: String,
    },

    /// Server returned a JSON-RPC error response.
    #[error("server error [{code}]: {message}")]
    ServerError {
        code: i32,
        message: String,
        data: Option<serde_json::Value>,
    },

    /// A tool call timed out.
    #[error("tool call '{tool}' timed out after {timeout_ms}ms")]
    Timeout {
        tool: String,
        timeout_ms: u64,
    },

    /// The session has already been closed.
    #[error("session for server '{name}' is closed")]
    SessionClosed {
        name: String,
    },

    /// The server process could not be stopped cleanly.
    #[error("failed to shut down server '{name}': {reason}")]
    ShutdownFailed {
        name: String,
        reason: String,
    },
}

/// Why a backend could not be registered.
///
/// Always scoped to one backend; never fatal to the process.
#[derive(Debug, Error)]
pub enum ConnectError {
    /// A connection under this id already exists. The existing one is kept.
    #[error("backend '{backend_id}' is already connected")]
    DuplicateBackend {
        backend_id: String,
    },

    /// The configuration entry is unusable (missing command, bad args, bad id).
    #[error("invalid config for backend '{backend_id}': {reason}")]
    InvalidConfig {
        backend_id: String,
        reason: String,
    },

    /// Launch, handshake, or catalog fetch failed.
    #[error("handshake with backend '{backend_id}' failed: {source}")]
    HandshakeFailed {
        backend_id: String,
        #[source]
        source: McpError,
    },
}

impl ConnectError {
    /// The backend this error refers to.
    pub fn backend_id(&self) -> &str {
        match self {
            Self::DuplicateBackend { backend_id }
            | Self::InvalidConfig { backend_id, .. }
            | Self::HandshakeFailed { backend_id, .. } => backend_id,
        }
    }
}

/// Configuration file could not be used at all. Fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {reason}")]
    Read {
        path: String,
        reason: String,
    },

    #[error("failed to parse {path}: {reason}")]
    Parse {
        path: String,
        reason: String,
    },
}
