//! Tool namespace routing.
//!
//! Every backend tool is presented to the model as `<backend>__<tool>`. The
//! router builds that catalog from the registry and maps names the model
//! sends back to the owning connection.
//!
//! Backend ids never contain the separator (the registry rejects them), so
//! splitting on the first occurrence always recovers the original pair.

use crate::inference::types::ToolDefinition;
use crate::mcp_client::registry::{Connection, ConnectionRegistry};
use crate::mcp_client::types::{ToolDescriptor, TOOL_NAME_SEPARATOR};

use super::errors::RouteError;

// ─── Qualified Names ─────────────────────────────────────────────────────────

/// Build the model-facing name for a backend tool.
pub fn qualify(backend_id: &str, tool_name: &str) -> String {
    format!("{backend_id}{TOOL_NAME_SEPARATOR}{tool_name}")
}

/// Split a qualified name into `(backend_id, tool_name)` on the first separator.
pub fn resolve(qualified_name: &str) -> Result<(&str, &str), RouteError> {
    qualified_name
        .split_once(TOOL_NAME_SEPARATOR)
        .ok_or_else(|| RouteError::Malformed {
            name: qualified_name.to_string(),
        })
}

/// Resolve a qualified name against live connections.
pub fn route<'r>(
    registry: &'r ConnectionRegistry,
    qualified_name: &str,
) -> Result<(&'r Connection, String), RouteError> {
    let (backend_id, tool_name) = resolve(qualified_name)?;
    let connection = registry
        .lookup(backend_id)
        .ok_or_else(|| RouteError::UnknownBackend {
            backend_id: backend_id.to_string(),
            name: qualified_name.to_string(),
        })?;
    Ok((connection, tool_name.to_string()))
}

// ─── Catalog ─────────────────────────────────────────────────────────────────

/// A tool as the model sees it.
#[derive(Debug, Clone, PartialEq)]
pub struct QualifiedTool {
    pub qualified_name: String,
    pub backend_id: String,
    pub tool_name: String,
    /// Description annotated with the owning backend.
    pub description: String,
    pub parameter_schema: serde_json::Value,
}

impl QualifiedTool {
    fn from_descriptor(tool: &ToolDescriptor) -> Self {
        let description = if tool.description.is_empty() {
            format!("[{}]", tool.backend_id)
        } else {
            format!("[{}] {}", tool.backend_id, tool.description)
        };
        Self {
            qualified_name: qualify(&tool.backend_id, &tool.name),
            backend_id: tool.backend_id.clone(),
            tool_name: tool.name.clone(),
            description,
            parameter_schema: tool.parameter_schema.clone(),
        }
    }

    /// Function-tool definition for a completion request.
    pub fn to_definition(&self) -> ToolDefinition {
        ToolDefinition::function(
            self.qualified_name.clone(),
            self.description.clone(),
            self.parameter_schema.clone(),
        )
    }
}

/// Every tool of every connection, in backend-id then server order.
pub fn build_catalog(registry: &ConnectionRegistry) -> Vec<QualifiedTool> {
    registry
        .all_connections()
        .flat_map(|(_, connection)| connection.tools().iter().map(QualifiedTool::from_descriptor))
        .collect()
}

/// Catalog in wire form. Empty when no backend is connected.
pub fn catalog_definitions(registry: &ConnectionRegistry) -> Vec<ToolDefinition> {
    build_catalog(registry)
        .iter()
        .map(QualifiedTool::to_definition)
        .collect()
}

// ─── Tests ───────────────────────────────────────────────────────────────────
