//! Conversation state: ordered, in-memory message history.
//!
//! Responsibilities:
//! - Seed the history with a system message from a role profile
//! - Append user, assistant and tool-result turns in call order
//! - Hand the full history to the completion provider
//!
//! Lives for one process; nothing is persisted.

use crate::inference::types::{ChatMessage, Role};

use super::profiles::{RoleProfiles, DEFAULT_PROFILE_NAME};

// ─── ConversationState ───────────────────────────────────────────────────────

/// Message history for one conversation.
///
/// Invariant: the first message is always the system message; only
/// [`reset`](Self::reset) replaces the sequence, everything else appends.
#[derive(Debug, Clone)]
pub struct ConversationState {
    profiles: RoleProfiles,
    active_profile: String,
    messages: Vec<ChatMessage>,
}

impl ConversationState {
    /// Create a conversation seeded from `profile_name`.
    pub fn new(profiles: RoleProfiles, profile_name: &str) -> Self {
        let mut state = Self {
            profiles,
            active_profile: String::new(),
            messages: Vec::new(),
        };
        state.reset(profile_name);
        state
    }

    /// Discard all history and start over with a single system message.
    pub fn reset(&mut self, profile_name: &str) {
        let profile = self.profiles.get(profile_name);
        self.messages = vec![ChatMessage::system(profile.content.clone())];
        // The profile actually applied; unknown names resolve to the default.
        self.active_profile = if self.profiles.contains(profile_name) {
            profile_name.to_string()
        } else {
            DEFAULT_PROFILE_NAME.to_string()
        };
        tracing::debug!(profile = %self.active_profile, "conversation reset");
    }

    pub fn append_user(&mut self, text: impl Into<String>) {
        self.messages.push(ChatMessage::user(text));
    }

    /// Append an assistant message as received, tool calls included.
    pub fn append_assistant(&mut self, message: ChatMessage) {
        debug_assert_eq!(message.role, Role::Assistant);
        self.messages.push(message);
    }

    pub fn append_tool_result(
        &mut self,
        tool_call_id: &str,
        qualified_name: &str,
        content: impl Into<String>,
    ) {
        self.messages
            .push(ChatMessage::tool_result(tool_call_id, qualified_name, content));
    }

    /// The full history in append order.
    pub fn snapshot(&self) -> Vec<ChatMessage> {
        self.messages.clone()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Name the conversation was last reset with.
    pub fn active_profile(&self) -> &str {
        &self.active_profile
    }

    pub fn profiles(&self) -> &RoleProfiles {
        &self.profiles
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent_core::profiles::{RoleProfile, DEFAULT_SYSTEM_PROMPT};
    use crate::inference::types::ToolCallResponse;
    use std::collections::BTreeMap;

    fn profiles() -> RoleProfiles {
        let mut map = BTreeMap::new();
        map.insert(
            "poet".to_string(),
            RoleProfile {
                role: "poet".into(),
                content: "Answer in verse.".into(),
            },
        );
        RoleProfiles::new(map)
    }

    #[test]
    fn test_new_has_single_system_message() {
        let state = ConversationState::new(profiles(), "poet");
        assert_eq!(state.len(), 1);
        assert_eq!(state.messages()[0].role, Role::System);
        assert_eq!(state.messages()[0].content.as_deref(), Some("Answer in verse."));
        assert_eq!(state.active_profile(), "poet");
    }

    #[test]
    fn test_reset_unknown_role_uses_default() {
        let mut state = ConversationState::new(profiles(), "poet");
        state.append_user("hello");
        state.append_assistant(ChatMessage::assistant("hi"));

        state.reset("unknown_role");

        let snapshot = state.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].role, Role::System);
        assert_eq!(snapshot[0].content.as_deref(), Some(DEFAULT_SYSTEM_PROMPT));
        assert_eq!(state.active_profile(), DEFAULT_PROFILE_NAME);

        let active = state.active_profile().to_string();
        state.reset(&active);
        assert_eq!(state.active_profile(), DEFAULT_PROFILE_NAME);
        assert_eq!(state.len(), 1);
    }

    #[test]
    fn test_append_order_preserved() {
        let mut state = ConversationState::new(RoleProfiles::default(), "default");
        state.append_user("what's the weather?");
        state.append_assistant(ChatMessage {
            role: Role::Assistant,
            content: None,
            tool_call_id: None,
            name: None,
            tool_calls: Some(vec![ToolCallResponse::new("c1", "weather__now", "{}")]),
        });
        state.append_tool_result("c1", "weather__now", "sunny");

        let roles: Vec<Role> = state.snapshot().iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![Role::System, Role::User, Role::Assistant, Role::Tool]
        );
        let tool_msg = &state.messages()[3];
        assert_eq!(tool_msg.tool_call_id.as_deref(), Some("c1"));
        assert_eq!(tool_msg.name.as_deref(), Some("weather__now"));
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let mut state = ConversationState::new(RoleProfiles::default(), "default");
        let before = state.snapshot();
        state.append_user("later");
        assert_eq!(before.len(), 1);
        assert_eq!(state.len(), 2);
    }
}
