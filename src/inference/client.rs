//! OpenAI-compatible completion client.
//!
//! Sends chat completion requests to the configured endpoint (OpenRouter by
//! default) and parses the assistant message back out.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde::Deserialize;
use uuid::Uuid;

use super::config::ProviderConfig;
use super::errors::InferenceError;
use super::types::{
    ChatCompletionRequest, ChatMessage, CompletionRequest, FunctionCallResponse, Role,
    ToolCallResponse,
};

// ─── Constants ───────────────────────────────────────────────────────────────

/// TCP connection timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Total request timeout. Hosted models with long tool transcripts can be slow.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

// ─── CompletionProvider ──────────────────────────────────────────────────────

/// Something that turns a conversation into the next assistant message.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<ChatMessage, InferenceError>;
}

// ─── InferenceClient ─────────────────────────────────────────────────────────

/// HTTP client for an OpenAI-compatible chat completions endpoint.
pub struct InferenceClient {
    http: HttpClient,
    config: ProviderConfig,
}

impl InferenceClient {
    /// Create a client. Does NOT check connectivity; that happens on the
    /// first request.
    pub fn new(config: ProviderConfig) -> Result<Self, InferenceError> {
        let http = HttpClient::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| InferenceError::ConnectionFailed {
                endpoint: config.base_url.clone(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self { http, config })
    }

    /// The model name sent with every request.
    pub fn model(&self) -> &str {
        &self.config.model
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    fn build_body(&self, request: CompletionRequest) -> ChatCompletionRequest {
        let tools = request.tools.filter(|t| !t.is_empty());
        ChatCompletionRequest {
            model: self.config.model.clone(),
            messages: request.messages,
            tool_choice: tools.as_ref().map(|_| "auto".to_string()),
            tools,
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            stream: false,
        }
    }
}

#[async_trait]
impl CompletionProvider for InferenceClient {
    async fn complete(&self, request: CompletionRequest) -> Result<ChatMessage, InferenceError> {
        let url = self.config.completions_url();
        let body = self.build_body(request);

        tracing::info!(
            model = %body.model,
            messages = body.messages.len(),
            tools = body.tools.as_ref().map_or(0, Vec::len),
            "sending completion request"
        );

        let mut builder = self
            .http
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&body);
        if let Some(site_url) = &self.config.site_url {
            builder = builder.header("HTTP-Referer", site_url);
        }
        if let Some(site_name) = &self.config.site_name {
            builder = builder.header("X-Title", site_name);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                InferenceError::Timeout {
                    duration_secs: REQUEST_TIMEOUT.as_secs(),
                }
            } else {
                InferenceError::ConnectionFailed {
                    endpoint: url.clone(),
                    reason: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "completion request rejected");
            return Err(InferenceError::HttpError {
                status: status.as_u16(),
                body: body_text,
            });
        }

        let body_text = response.text().await.map_err(|e| InferenceError::ResponseError {
            reason: format!("failed to read response body: {e}"),
        })?;

        let message = parse_completion_response(&body_text)?;
        tracing::debug!(
            tool_calls = message.requested_tool_calls().len(),
            "completion received"
        );
        Ok(message)
    }
}

// ─── Response Parsing ────────────────────────────────────────────────────────

/// Parse a non-streaming chat completion body into the assistant message.
///
/// Tool-call arguments are kept as the raw string; a missing call id gets a
/// generated `call_<uuid>`.
pub fn parse_completion_response(body: &str) -> Result<ChatMessage, InferenceError> {
    #[derive(Deserialize)]
    struct CompletionResponse {
        #[serde(default)]
        choices: Vec<Choice>,
        #[serde(default)]
        error: Option<serde_json::Value>,
    }

    #[derive(Deserialize)]
    struct Choice {
        message: ResponseMessage,
    }

    #[derive(Deserialize)]
    struct ResponseMessage {
        content: Option<String>,
        tool_calls: Option<Vec<ResponseToolCall>>,
    }

    #[derive(Deserialize)]
    struct ResponseToolCall {
        id: Option<String>,
        function: ResponseFunction,
    }

    #[derive(Deserialize)]
    struct ResponseFunction {
        name: String,
        #[serde(default)]
        arguments: Option<String>,
    }

    let resp: CompletionResponse =
        serde_json::from_str(body).map_err(|e| InferenceError::ResponseError {
            reason: format!("failed to parse completion response: {e}"),
        })?;

    // Gateways sometimes report upstream failures as 200 with an error object.
    if let Some(error) = resp.error {
        return Err(InferenceError::ResponseError {
            reason: format!("provider returned an error: {error}"),
        });
    }

    let choice = resp
        .choices
        .into_iter()
        .next()
        .ok_or(InferenceError::ResponseError {
            reason: "empty choices array".into(),
        })?;

    let tool_calls: Vec<ToolCallResponse> = choice
        .message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|tc| ToolCallResponse {
            id: tc
                .id
                .filter(|id| !id.is_empty())
                .unwrap_or_else(|| format!("call_{}", Uuid::new_v4())),
            r#type: "function".to_string(),
            function: FunctionCallResponse {
                name: tc.function.name,
                arguments: tc.function.arguments.unwrap_or_default(),
            },
        })
        .collect();

    Ok(ChatMessage {
        role: Role::Assistant,
        content: choice.message.content,
        tool_call_id: None,
        name: None,
        tool_calls: if tool_calls.is_empty() {
            None
        } else {
            Some(tool_calls)
        },
    })
}

// ─── Tests ───────────────────────────────────────────────────────────────────
