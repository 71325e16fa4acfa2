//! In-memory fakes for the session and provider seams.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::inference::client::CompletionProvider;
use crate::inference::errors::InferenceError;
use crate::inference::types::{ChatMessage, CompletionRequest, Role, ToolCallResponse};
use crate::mcp_client::errors::McpError;
use crate::mcp_client::session::{Connector, ToolSession};
use crate::mcp_client::types::{CallToolResult, McpToolDefinition, ServerConfig};

pub type CallLog = Arc<Mutex<Vec<(String, serde_json::Value)>>>;

/// A tool definition with a trivial object schema.
pub fn tool(name: &str) -> McpToolDefinition {
    McpToolDefinition {
        name: name.to_string(),
        description: Some(format!("{name} tool")),
        input_schema: serde_json::json!({"type": "object", "properties": {}}),
    }
}

/// An assistant message requesting `(id, qualified_name, raw_args)` calls.
pub fn assistant_calls(calls: &[(&str, &str, &str)]) -> ChatMessage {
    ChatMessage {
        role: Role::Assistant,
        content: None,
        tool_call_id: None,
        name: None,
        tool_calls: Some(
            calls
                .iter()
                .map(|(id, name, args)| ToolCallResponse::new(*id, *name, *args))
                .collect(),
        ),
    }
}

// ─── FakeBackend ─────────────────────────────────────────────────────────────

#[derive(Clone)]
enum Canned {
    Result(CallToolResult),
    Failure,
}

/// Scripted behaviour for one backend.
#[derive(Clone)]
pub struct FakeBackend {
    tools: Vec<McpToolDefinition>,
    canned: HashMap<String, Canned>,
    fail_handshake: bool,
    fail_catalog: bool,
    fail_close: bool,
    closes: Arc<AtomicUsize>,
    calls: CallLog,
}

impl FakeBackend {
    pub fn new(tools: Vec<McpToolDefinition>) -> Self {
        Self {
            tools,
            canned: HashMap::new(),
            fail_handshake: false,
            fail_catalog: false,
            fail_close: false,
            closes: Arc::new(AtomicUsize::new(0)),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn failing_handshake() -> Self {
        Self {
            fail_handshake: true,
            ..Self::new(vec![])
        }
    }

    pub fn failing_catalog() -> Self {
        Self {
            fail_catalog: true,
            ..Self::new(vec![])
        }
    }

    pub fn with_close_error(mut self) -> Self {
        self.fail_close = true;
        self
    }

    pub fn with_result(mut self, tool: &str, text: &str) -> Self {
        self.canned
            .insert(tool.to_string(), Canned::Result(CallToolResult::text(text)));
        self
    }

    /// The backend answers `tool` with `isError: true`.
    pub fn with_error_result(mut self, tool: &str, text: &str) -> Self {
        let mut result = CallToolResult::text(text);
        result.is_error = true;
        self.canned.insert(tool.to_string(), Canned::Result(result));
        self
    }

    /// Calls to `tool` fail at the transport level.
    pub fn with_call_failure(mut self, tool: &str) -> Self {
        self.canned.insert(tool.to_string(), Canned::Failure);
        self
    }

    pub fn close_count(&self) -> Arc<AtomicUsize> {
        self.closes.clone()
    }

    pub fn calls(&self) -> CallLog {
        self.calls.clone()
    }
}

struct FakeSession {
    name: String,
    backend: FakeBackend,
}

#[async_trait]
impl ToolSession for FakeSession {
    async fn list_tools(&self) -> Result<Vec<McpToolDefinition>, McpError> {
        if self.backend.fail_catalog {
            return Err(McpError::TransportError {
                server: self.name.clone(),
                reason: "tools/list failed".into(),
            });
        }
        Ok(self.backend.tools.clone())
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<CallToolResult, McpError> {
        self.backend
            .calls
            .lock()
            .unwrap()
            .push((name.to_string(), arguments));

        match self.backend.canned.get(name) {
            Some(Canned::Result(result)) => Ok(result.clone()),
            Some(Canned::Failure) => Err(McpError::TransportError {
                server: self.name.clone(),
                reason: "server stdout closed".into(),
            }),
            None => Ok(CallToolResult::text(format!("{name} ok"))),
        }
    }

    async fn close(&mut self) -> Result<(), McpError> {
        self.backend.closes.fetch_add(1, Ordering::SeqCst);
        if self.backend.fail_close {
            return Err(McpError::ShutdownFailed {
                name: self.name.clone(),
                reason: "kill failed".into(),
            });
        }
        Ok(())
    }
}

// ─── FakeConnector ───────────────────────────────────────────────────────────

/// Opens [`FakeBackend`]s by backend id.
#[derive(Clone, Default)]
pub struct FakeConnector {
    backends: HashMap<String, FakeBackend>,
    opens: Arc<AtomicUsize>,
}

impl FakeConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_backend(mut self, backend_id: &str, backend: FakeBackend) -> Self {
        self.backends.insert(backend_id.to_string(), backend);
        self
    }

    /// Counter of `open` calls.
    pub fn open_count(&self) -> Arc<AtomicUsize> {
        self.opens.clone()
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn open(
        &self,
        backend_id: &str,
        _config: &ServerConfig,
    ) -> Result<Box<dyn ToolSession>, McpError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let backend = self
            .backends
            .get(backend_id)
            .ok_or_else(|| McpError::SpawnFailed {
                name: backend_id.to_string(),
                reason: "no such backend".into(),
            })?;

        if backend.fail_handshake {
            return Err(McpError::InitFailed {
                name: backend_id.to_string(),
                reason: "handshake refused".into(),
            });
        }

        Ok(Box::new(FakeSession {
            name: backend_id.to_string(),
            backend: backend.clone(),
        }))
    }
}

// ─── ScriptedProvider ────────────────────────────────────────────────────────

/// Replays canned completions in order and records every request.
#[derive(Clone)]
pub struct ScriptedProvider {
    responses: Arc<Mutex<VecDeque<Result<ChatMessage, InferenceError>>>>,
    requests: Arc<Mutex<Vec<CompletionRequest>>>,
}

impl ScriptedProvider {
    pub fn new(responses: Vec<Result<ChatMessage, InferenceError>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses.into())),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionProvider for ScriptedProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<ChatMessage, InferenceError> {
        self.requests.lock().unwrap().push(request);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Err(InferenceError::ResponseError {
                    reason: "script exhausted".into(),
                })
            })
    }
}
