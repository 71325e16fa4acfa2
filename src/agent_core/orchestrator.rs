//! Query orchestrator: the two-phase model/tool loop.
//!
//! Per query:
//! 1. **Offer**: send the history plus the qualified tool catalog to the
//!    provider (tool-free when no backend is connected)
//! 2. **Dispatch**: run each requested tool call in the order returned,
//!    appending one tool-result message per routed call
//! 3. **Summarize**: ask the provider again, without tools, over the
//!    extended history
//!
//! Route failures (malformed name, unknown backend) skip the call and are only
//! logged. Execution failures become the tool-result content so the model
//! sees them. Provider failures abort the query.

use std::sync::Arc;

use crate::inference::client::CompletionProvider;
use crate::inference::types::{CompletionRequest, ToolCallResponse};
use crate::mcp_client::registry::{Connection, ConnectionRegistry};

use super::conversation::ConversationState;
use super::errors::{AgentError, ExecutionError};
use super::tool_router::{self, QualifiedTool};

// ─── QueryOrchestrator ───────────────────────────────────────────────────────

/// Owns the registry and conversation for one interactive session.
///
/// All operations take `&mut self`, so a shutdown can never overlap an
/// in-flight tool call.
pub struct QueryOrchestrator {
    registry: ConnectionRegistry,
    provider: Arc<dyn CompletionProvider>,
    conversation: ConversationState,
}

impl QueryOrchestrator {
    pub fn new(
        registry: ConnectionRegistry,
        provider: Arc<dyn CompletionProvider>,
        conversation: ConversationState,
    ) -> Self {
        Self {
            registry,
            provider,
            conversation,
        }
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn conversation(&self) -> &ConversationState {
        &self.conversation
    }

    /// The qualified tool catalog the model is offered.
    pub fn catalog(&self) -> Vec<QualifiedTool> {
        tool_router::build_catalog(&self.registry)
    }

    /// Start a fresh conversation under `profile_name`.
    pub fn reset_role(&mut self, profile_name: &str) {
        self.conversation.reset(profile_name);
    }

    // ─── Query ───────────────────────────────────────────────────────────

    /// Resolve one user query to the text shown to the user.
    ///
    /// The result joins the first-round text, one annotation per dispatched
    /// tool call, and the second-round text, with newlines.
    pub async fn process_query(&mut self, query: &str) -> Result<String, AgentError> {
        self.conversation.append_user(query);

        let tools = tool_router::catalog_definitions(&self.registry);
        tracing::info!(tools = tools.len(), "processing query");

        let first = self
            .provider
            .complete(CompletionRequest::new(self.conversation.snapshot(), tools))
            .await?;
        self.conversation.append_assistant(first.clone());

        let mut parts: Vec<String> = Vec::new();
        if let Some(text) = first.text() {
            parts.push(text.to_string());
        }

        let calls = first.requested_tool_calls();
        if calls.is_empty() {
            return Ok(parts.join("\n"));
        }

        for call in calls {
            if let Some(annotation) = self.dispatch(call).await {
                parts.push(annotation);
            }
        }

        let second = self
            .provider
            .complete(CompletionRequest::without_tools(self.conversation.snapshot()))
            .await?;
        self.conversation.append_assistant(second.clone());

        if let Some(text) = second.text() {
            parts.push(text.to_string());
        }
        Ok(parts.join("\n"))
    }

    /// Route and execute one tool call.
    ///
    /// Returns the progress annotation, or `None` if the call was skipped.
    async fn dispatch(&mut self, call: &ToolCallResponse) -> Option<String> {
        let qualified_name = call.function.name.as_str();

        let (connection, tool_name) = match tool_router::route(&self.registry, qualified_name) {
            Ok(routed) => routed,
            Err(e) => {
                tracing::warn!(tool = %qualified_name, error = %e, "skipping tool call");
                return None;
            }
        };

        let raw_args = call.function.arguments.as_str();
        let annotation = format!(
            "[Calling tool '{tool_name}' on backend '{}' with args {raw_args}]",
            connection.backend_id()
        );

        let content = match execute(connection, &tool_name, raw_args).await {
            Ok(text) => {
                tracing::info!(
                    backend = %connection.backend_id(),
                    tool = %tool_name,
                    "tool call succeeded"
                );
                text
            }
            Err(e) => {
                tracing::warn!(
                    backend = %connection.backend_id(),
                    tool = %tool_name,
                    error = %e,
                    "tool call failed"
                );
                format!("Error executing tool: {e}")
            }
        };

        self.conversation
            .append_tool_result(&call.id, qualified_name, content);
        Some(annotation)
    }

    // ─── Shutdown ────────────────────────────────────────────────────────

    /// Close every backend. Returns the ids whose close failed.
    pub async fn shutdown(&mut self) -> Vec<String> {
        self.registry.shutdown().await
    }
}

// ─── Execution ───────────────────────────────────────────────────────────────

/// Decode arguments strictly and call the tool, rendering its result.
async fn execute(
    connection: &Connection,
    tool_name: &str,
    raw_args: &str,
) -> Result<String, ExecutionError> {
    let arguments = decode_arguments(tool_name, raw_args)?;
    let result = connection.session().call_tool(tool_name, arguments).await?;

    if result.is_error {
        return Err(ExecutionError::ToolReported {
            tool: tool_name.to_string(),
            message: result.render(),
        });
    }
    Ok(result.render())
}

/// Parse serialized tool arguments as a JSON object.
///
/// Blank input means "no arguments". Anything else must parse as an object.
pub fn decode_arguments(tool_name: &str, raw: &str) -> Result<serde_json::Value, ExecutionError> {
    if raw.trim().is_empty() {
        return Ok(serde_json::json!({}));
    }

    let value: serde_json::Value =
        serde_json::from_str(raw).map_err(|e| ExecutionError::InvalidArguments {
            tool: tool_name.to_string(),
            reason: e.to_string(),
        })?;

    if value.is_object() {
        Ok(value)
    } else {
        Err(ExecutionError::InvalidArguments {
            tool: tool_name.to_string(),
            reason: format!("expected a JSON object, got {value}"),
        })
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
