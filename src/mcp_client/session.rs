//! Backend session capability.
//!
//! The registry and orchestrator only ever see these two traits. The stdio
//! implementation lives in `lifecycle`; tests plug in in-memory fakes.

use async_trait::async_trait;

use super::errors::McpError;
use super::types::{CallToolResult, McpToolDefinition, ServerConfig};

/// A live, handshaken session with one backend.
#[async_trait]
pub trait ToolSession: Send + Sync {
    /// Fetch the backend's tool catalog.
    async fn list_tools(&self) -> Result<Vec<McpToolDefinition>, McpError>;

    /// Invoke one tool with already-decoded arguments.
    async fn call_tool(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<CallToolResult, McpError>;

    /// Release the session and everything it holds (process, pipes).
    ///
    /// The registry calls this exactly once per session.
    async fn close(&mut self) -> Result<(), McpError>;
}

/// Opens sessions. Launch and handshake happen here.
///
/// If the handshake fails, the implementation releases whatever it acquired
/// before returning the error.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn open(
        &self,
        backend_id: &str,
        config: &ServerConfig,
    ) -> Result<Box<dyn ToolSession>, McpError>;
}
