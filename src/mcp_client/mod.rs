//! MCP Client: backend sessions over JSON-RPC stdio.
//!
//! This module handles:
//! - Loading the `mcpServers` configuration
//! - Spawning backend processes and performing the MCP handshake
//! - JSON-RPC 2.0 communication over process stdio
//! - The connection registry (concurrent connect, lookup, shutdown)

pub mod config;
pub mod errors;
pub mod lifecycle;
pub mod registry;
pub mod session;
pub mod transport;
pub mod types;

// Re-exports for convenience
pub use errors::{ConfigError, ConnectError, McpError};
pub use lifecycle::StdioConnector;
pub use registry::{ConnectOutcome, Connection, ConnectionRegistry};
pub use session::{Connector, ToolSession};
pub use types::{
    CallToolResult, McpServersConfig, McpToolDefinition, ServerConfig, ServerEntry,
    ToolDescriptor, TOOL_NAME_SEPARATOR,
};
