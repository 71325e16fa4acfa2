//! Agent Core: query orchestration across connected backends.
//!
//! Submodules:
//! - `tool_router`: Qualified tool names and the model-facing catalog
//! - `profiles`: Named system-message presets
//! - `conversation`: In-memory message history
//! - `orchestrator`: The two-phase completion/tool-call loop
//! - `errors`: Route, execution and query-level error types

pub mod conversation;
pub mod errors;
pub mod orchestrator;
pub mod profiles;
pub mod tool_router;

// Re-exports for convenience
pub use conversation::ConversationState;
pub use errors::{AgentError, ExecutionError, RouteError};
pub use orchestrator::QueryOrchestrator;
pub use profiles::{RoleProfile, RoleProfiles};
pub use tool_router::QualifiedTool;
