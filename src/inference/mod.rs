//! Inference Client: OpenAI-compatible chat completions.
//!
//! This module handles all communication with the language model:
//! - The `CompletionProvider` seam the orchestrator talks to
//! - Non-streaming chat completions over HTTP (OpenRouter by default)
//! - Provider configuration from environment and CLI

pub mod client;
pub mod config;
pub mod errors;
pub mod types;

// Re-exports for convenience
pub use client::{CompletionProvider, InferenceClient};
pub use config::ProviderConfig;
pub use errors::InferenceError;
pub use types::{ChatMessage, CompletionRequest, Role, ToolCallResponse, ToolDefinition};
