//! Shared types for the MCP client.
//!
//! JSON-RPC 2.0 message types, MCP protocol structures, and the
//! `mcpServers` configuration shape.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::errors::ConnectError;

/// Separator between backend id and tool name in a qualified tool name.
///
/// Backend ids may never contain it (enforced at connect time).
pub const TOOL_NAME_SEPARATOR: &str = "__";

// ─── JSON-RPC 2.0 ───────────────────────────────────────────────────────────

/// JSON-RPC 2.0 request message.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: u64,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

impl JsonRpcRequest {
    /// Create a new JSON-RPC request.
    pub fn new(id: u64, method: &str, params: Option<serde_json::Value>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            method: method.to_string(),
            params,
        }
    }
}

/// JSON-RPC 2.0 notification (no id, no response).
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcNotification {
    pub jsonrpc: String,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

impl JsonRpcNotification {
    pub fn new(method: &str, params: Option<serde_json::Value>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            method: method.to_string(),
            params,
        }
    }
}

/// JSON-RPC 2.0 response message (success or error).
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcResponse {
    pub id: u64,
    pub result: Option<serde_json::Value>,
    pub error: Option<JsonRpcError>,
}

/// JSON-RPC 2.0 error object.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    pub data: Option<serde_json::Value>,
}

// ─── MCP Protocol Types ──────────────────────────────────────────────────────

/// MCP protocol revision sent in `initialize`.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// A tool as advertised by a server in `tools/list`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpToolDefinition {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, alias = "inputSchema")]
    pub input_schema: serde_json::Value,
}

/// `tools/list` response payload.
#[derive(Debug, Clone, Deserialize)]
pub struct ListToolsResult {
    #[serde(default)]
    pub tools: Vec<McpToolDefinition>,
    #[serde(default, alias = "nextCursor")]
    pub next_cursor: Option<String>,
}

/// `initialize` response payload. Only the parts we log are kept.
#[derive(Debug, Clone, Deserialize)]
pub struct InitializeResult {
    #[serde(default, alias = "protocolVersion")]
    pub protocol_version: Option<String>,
    #[serde(default, alias = "serverInfo")]
    pub server_info: Option<ServerInfo>,
}

/// Server info returned in the initialize response.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerInfo {
    pub name: Option<String>,
    pub version: Option<String>,
}

/// `tools/call` response payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CallToolResult {
    #[serde(default)]
    pub content: Vec<serde_json::Value>,
    #[serde(default, rename = "isError")]
    pub is_error: bool,
}

impl CallToolResult {
    /// A successful result holding one text block.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![serde_json::json!({ "type": "text", "text": text.into() })],
            is_error: false,
        }
    }

    /// Render the content blocks for the conversation.
    ///
    /// Text blocks contribute their `text`; anything else (images, embedded
    /// resources) is kept as compact JSON so nothing is silently dropped.
    pub fn render(&self) -> String {
        self.content
            .iter()
            .map(|block| {
                let is_text = block.get("type").and_then(|t| t.as_str()) == Some("text");
                match block.get("text").and_then(|t| t.as_str()) {
                    Some(text) if is_text => text.to_string(),
                    _ => block.to_string(),
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

// ─── Tool Descriptor ─────────────────────────────────────────────────────────

/// One tool exposed by one backend. Immutable once fetched.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolDescriptor {
    pub backend_id: String,
    pub name: String,
    pub description: String,
    pub parameter_schema: serde_json::Value,
}

impl ToolDescriptor {
    /// Attach a server-advertised definition to its owning backend.
    pub fn from_definition(backend_id: &str, def: McpToolDefinition) -> Self {
        // Providers reject a missing/null schema, so default to an empty object schema.
        let parameter_schema = if def.input_schema.is_null() {
            serde_json::json!({ "type": "object", "properties": {} })
        } else {
            def.input_schema
        };
        Self {
            backend_id: backend_id.to_string(),
            name: def.name,
            description: def.description.unwrap_or_default(),
            parameter_schema,
        }
    }
}

// ─── Configuration ───────────────────────────────────────────────────────────

/// One `mcpServers` entry as written in the config file.
///
/// Unvalidated: `command` may be missing and `args` may be any JSON value.
/// Deserializing never fails; an entry whose fields have the wrong types
/// keeps the decode error in `malformed`. [`ServerEntry::validate`] turns it
/// into a launchable [`ServerConfig`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(from = "serde_json::Value")]
pub struct ServerEntry {
    pub command: Option<String>,
    pub args: Option<serde_json::Value>,
    pub env: HashMap<String, String>,
    pub cwd: Option<String>,
    pub disabled: bool,
    /// Why the raw entry could not be decoded, if it couldn't.
    pub malformed: Option<String>,
}

/// Typed view of a well-formed entry.
#[derive(Deserialize)]
struct EntryFields {
    #[serde(default)]
    command: Option<String>,
    #[serde(default)]
    args: Option<serde_json::Value>,
    #[serde(default)]
    env: HashMap<String, String>,
    #[serde(default)]
    cwd: Option<String>,
    #[serde(default)]
    disabled: bool,
}

impl From<serde_json::Value> for ServerEntry {
    fn from(value: serde_json::Value) -> Self {
        match serde_json::from_value::<EntryFields>(value) {
            Ok(fields) => Self {
                command: fields.command,
                args: fields.args,
                env: fields.env,
                cwd: fields.cwd,
                disabled: fields.disabled,
                malformed: None,
            },
            Err(e) => Self {
                malformed: Some(e.to_string()),
                ..Self::default()
            },
        }
    }
}

impl ServerEntry {
    /// Build an entry that launches `command` with `args`.
    pub fn new(command: &str, args: &[&str]) -> Self {
        Self {
            command: Some(command.to_string()),
            args: Some(serde_json::json!(args)),
            ..Self::default()
        }
    }

    /// Build an entry from a server script path.
    ///
    /// `.py` runs under `python`, `.js` under `node`. The backend id is the
    /// file stem with spaces replaced by underscores.
    pub fn for_script(path: &str) -> Result<(String, Self), ConnectError> {
        let p = Path::new(path);
        let backend_id = p
            .file_stem()
            .map(|s| s.to_string_lossy().replace(' ', "_"))
            .unwrap_or_default();

        let command = match p.extension().and_then(|e| e.to_str()) {
            Some("py") => "python",
            Some("js") => "node",
            _ => {
                return Err(ConnectError::InvalidConfig {
                    backend_id,
                    reason: format!("server script must be a .py or .js file: {path}"),
                })
            }
        };

        Ok((backend_id, Self::new(command, &[path])))
    }

    /// Check required fields and produce a launchable config.
    pub fn validate(&self, backend_id: &str) -> Result<ServerConfig, ConnectError> {
        let invalid = |reason: String| ConnectError::InvalidConfig {
            backend_id: backend_id.to_string(),
            reason,
        };

        if let Some(reason) = &self.malformed {
            return Err(invalid(format!("malformed entry: {reason}")));
        }

        let command = match self.command.as_deref().map(str::trim) {
            Some(c) if !c.is_empty() => c.to_string(),
            _ => return Err(invalid("missing 'command'".into())),
        };

        let args = match &self.args {
            None => Vec::new(),
            Some(serde_json::Value::Array(items)) => items
                .iter()
                .map(|item| {
                    item.as_str()
                        .map(String::from)
                        .ok_or_else(|| invalid(format!("non-string item in 'args': {item}")))
                })
                .collect::<Result<Vec<_>, _>>()?,
            Some(other) => return Err(invalid(format!("'args' must be a list, got {other}"))),
        };

        Ok(ServerConfig {
            command,
            args,
            env: self.env.clone(),
            cwd: self.cwd.clone(),
        })
    }
}

/// A validated, launchable backend description.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub command: String,
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
    /// Working directory for the server process.
    pub cwd: Option<String>,
}

/// Top-level backend configuration file (`{"mcpServers": {...}}`).
///
/// A `BTreeMap` keeps connect order and catalog order stable across runs.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct McpServersConfig {
    #[serde(default, rename = "mcpServers", alias = "servers")]
    pub servers: BTreeMap<String, ServerEntry>,
}

// ─── Standard MCP Error Codes ────────────────────────────────────────────────

/// Well-known JSON-RPC error codes.
pub mod error_codes {
    /// Invalid JSON was received.
    pub const PARSE_ERROR: i32 = -32700;
    /// The method does not exist or is not available.
    pub const METHOD_NOT_FOUND: i32 = -32601;
    /// Invalid method parameters.
    pub const INVALID_PARAMS: i32 = -32602;
    /// Internal JSON-RPC error.
    pub const INTERNAL_ERROR: i32 = -32603;
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_rpc_request_serialization() {
        let req = JsonRpcRequest::new(1, "initialize", None);
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("\"jsonrpc\":\"2.0\""));
        assert!(json.contains("\"id\":1"));
        assert!(json.contains("\"method\":\"initialize\""));
        // params should be omitted when None
        assert!(!json.contains("params"));
    }

    #[test]
    fn test_notification_has_no_id() {
        let note = JsonRpcNotification::new("notifications/initialized", None);
        let json = serde_json::to_string(&note).unwrap();
        assert!(!json.contains("\"id\""));
        assert!(json.contains("notifications/initialized"));
    }

    #[test]
    fn test_json_rpc_error_response() {
        let json = r#"{
            "jsonrpc": "2.0",
            "id": 2,
            "result": null,
            "error": {"code": -32601, "message": "Method not found"}
        }"#;
        let resp: JsonRpcResponse = serde_json::from_str(json).unwrap();
        let err = resp.error.unwrap();
        assert_eq!(err.code, error_codes::METHOD_NOT_FOUND);
    }

    #[test]
    fn test_tool_definition_accepts_camel_case_schema() {
        let json = r#"{"name": "get_forecast", "inputSchema": {"type": "object"}}"#;
        let tool: McpToolDefinition = serde_json::from_str(json).unwrap();
        assert_eq!(tool.input_schema["type"], "object");
        assert!(tool.description.is_none());
    }

    #[test]
    fn test_descriptor_defaults_missing_schema() {
        let def = McpToolDefinition {
            name: "ping".into(),
            description: None,
            input_schema: serde_json::Value::Null,
        };
        let desc = ToolDescriptor::from_definition("net", def);
        assert_eq!(desc.backend_id, "net");
        assert_eq!(desc.description, "");
        assert_eq!(desc.parameter_schema["type"], "object");
    }

    #[test]
    fn test_call_tool_result_render() {
        let result: CallToolResult = serde_json::from_value(serde_json::json!({
            "content": [
                {"type": "text", "text": "line one"},
                {"type": "image", "data": "AAA", "mimeType": "image/png"},
                {"type": "text", "text": "line two"}
            ],
            "isError": false
        }))
        .unwrap();
        let rendered = result.render();
        assert!(rendered.starts_with("line one\n"));
        assert!(rendered.contains("image/png"));
        assert!(rendered.ends_with("line two"));
    }

    #[test]
    fn test_validate_entry_ok() {
        let entry = ServerEntry::new("python", &["weather.py"]);
        let config = entry.validate("weather").unwrap();
        assert_eq!(config.command, "python");
        assert_eq!(config.args, vec!["weather.py"]);
    }

    #[test]
    fn test_validate_entry_missing_command() {
        let entry = ServerEntry::default();
        let err = entry.validate("broken").unwrap_err();
        assert!(matches!(err, ConnectError::InvalidConfig { .. }));
    }

    #[test]
    fn test_validate_entry_args_not_a_list() {
        let entry = ServerEntry {
            command: Some("node".into()),
            args: Some(serde_json::json!("server.js")),
            ..ServerEntry::default()
        };
        let err = entry.validate("js").unwrap_err();
        assert!(err.to_string().contains("must be a list"));
    }

    #[test]
    fn test_validate_entry_missing_args_is_empty() {
        let entry = ServerEntry {
            command: Some("my-server".into()),
            ..ServerEntry::default()
        };
        assert!(entry.validate("bin").unwrap().args.is_empty());
    }

    #[test]
    fn test_for_script() {
        let (id, entry) = ServerEntry::for_script("servers/my weather.py").unwrap();
        assert_eq!(id, "my_weather");
        assert_eq!(entry.command.as_deref(), Some("python"));

        let (id, entry) = ServerEntry::for_script("tools.js").unwrap();
        assert_eq!(id, "tools");
        assert_eq!(entry.command.as_deref(), Some("node"));

        assert!(ServerEntry::for_script("server.rb").is_err());
    }

    #[test]
    fn test_servers_config_shape() {
        let json = r#"{
            "mcpServers": {
                "weather": {"command": "python", "args": ["weather.py"]},
                "fs": {"command": "npx", "args": ["fs-server"], "disabled": true}
            }
        }"#;
        let cfg: McpServersConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.servers.len(), 2);
        assert!(cfg.servers["fs"].disabled);
        assert!(!cfg.servers["weather"].disabled);
        // BTreeMap: sorted by id
        let ids: Vec<&String> = cfg.servers.keys().collect();
        assert_eq!(ids, vec!["fs", "weather"]);
    }

    #[test]
    fn test_mistyped_entry_is_kept_as_invalid() {
        let json = r#"{
            "mcpServers": {
                "good": {"command": "python", "args": ["a.py"]},
                "numeric": {"command": 42},
                "flag": {"command": "node", "disabled": "yes"},
                "env": {"command": "node", "env": {"KEY": 1}},
                "scalar": "not an object"
            }
        }"#;
        let cfg: McpServersConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.servers.len(), 5);
        assert!(cfg.servers["good"].validate("good").is_ok());

        for id in ["numeric", "flag", "env", "scalar"] {
            let entry = &cfg.servers[id];
            assert!(!entry.disabled, "{id}");
            let err = entry.validate(id).unwrap_err();
            assert!(matches!(err, ConnectError::InvalidConfig { .. }), "{id}");
            assert!(err.to_string().contains("malformed entry"), "{id}");
        }
    }
}
