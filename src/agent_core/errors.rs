//! Agent Core error types.

use thiserror::Error;

use crate::inference::errors::InferenceError;
use crate::mcp_client::errors::McpError;

/// Why a tool call from the model could not be routed to a backend.
///
/// Route failures skip the call; nothing is added to the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    /// The name has no backend separator.
    #[error("malformed tool name '{name}': expected '<backend>__<tool>'")]
    Malformed { name: String },

    /// The backend part names no live connection.
    #[error("no connected backend '{backend_id}' for tool '{name}'")]
    UnknownBackend { backend_id: String, name: String },
}

/// A routed tool call that failed to produce a result.
///
/// Recorded in the conversation as the tool-result content.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// Arguments were not a JSON object.
    #[error("invalid arguments for '{tool}': {reason}")]
    InvalidArguments { tool: String, reason: String },

    /// The session call itself failed (transport, timeout, JSON-RPC error).
    #[error("{0}")]
    Session(#[from] McpError),

    /// The backend answered with `isError: true`.
    #[error("tool '{tool}' reported an error: {message}")]
    ToolReported { tool: String, message: String },
}

/// Errors that abort a whole query.
#[derive(Debug, Error)]
pub enum AgentError {
    /// The completion provider failed. Conversation state keeps whatever was
    /// appended before the failure.
    #[error("completion provider failed: {0}")]
    Provider(#[from] InferenceError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_error_messages() {
        let err = RouteError::UnknownBackend {
            backend_id: "ghost".into(),
            name: "ghost__boo".into(),
        };
        assert_eq!(
            err.to_string(),
            "no connected backend 'ghost' for tool 'ghost__boo'"
        );
    }

    #[test]
    fn test_execution_error_from_mcp() {
        let err: ExecutionError = McpError::Timeout {
            tool: "slow".into(),
            timeout_ms: 100,
        }
        .into();
        assert_eq!(err.to_string(), "tool call 'slow' timed out after 100ms");
    }

    #[test]
    fn test_agent_error_from_inference() {
        let err: AgentError = InferenceError::Timeout { duration_secs: 3 }.into();
        assert!(err.to_string().contains("timeout after 3s"));
    }
}
