//! Role profiles: named presets for the system message.
//!
//! Loaded from an optional JSON file mapping profile name to
//! `{"role": ..., "content": ...}`. Unknown names fall back to the built-in
//! default, so a conversation always starts with a system message.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

/// Name of the built-in profile.
pub const DEFAULT_PROFILE_NAME: &str = "default";

/// System message used when no profile matches.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant. \
Tools from several backends may be available; each tool name is prefixed \
with the backend that provides it. Call tools when they help answer the \
user, and answer directly otherwise.";

/// One named preset.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RoleProfile {
    /// Persona label (e.g. "translator"). Informational only; the seeded
    /// message always has the `system` role.
    #[serde(default)]
    pub role: String,
    pub content: String,
}

impl Default for RoleProfile {
    fn default() -> Self {
        Self {
            role: DEFAULT_PROFILE_NAME.to_string(),
            content: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }
}

/// The profile table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoleProfiles {
    profiles: BTreeMap<String, RoleProfile>,
    fallback: RoleProfile,
}

impl RoleProfiles {
    pub fn new(profiles: BTreeMap<String, RoleProfile>) -> Self {
        // A "default" entry in the file replaces the built-in fallback.
        let fallback = profiles
            .get(DEFAULT_PROFILE_NAME)
            .cloned()
            .unwrap_or_default();
        Self { profiles, fallback }
    }

    /// Load from a JSON file.
    ///
    /// A missing, unreadable, or malformed file is logged and yields the
    /// built-in default only.
    pub fn load(path: &Path) -> Self {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to read role profiles, using default");
                return Self::default();
            }
        };

        match serde_json::from_str::<BTreeMap<String, RoleProfile>>(&raw) {
            Ok(profiles) => {
                tracing::info!(path = %path.display(), count = profiles.len(), "loaded role profiles");
                Self::new(profiles)
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "malformed role profiles, using default");
                Self::default()
            }
        }
    }

    /// Look up a profile, falling back to the default when absent.
    pub fn get(&self, name: &str) -> &RoleProfile {
        self.profiles.get(name).unwrap_or_else(|| {
            if name != DEFAULT_PROFILE_NAME {
                tracing::warn!(profile = %name, "unknown role profile, using default");
            }
            &self.fallback
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.profiles.contains_key(name)
    }

    /// Configured profile names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.profiles.keys().map(String::as_str)
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
