//! Provider configuration.
//!
//! Resolved from environment variables (after `.env` loading) and CLI
//! overrides. Nothing here touches the network.

use super::errors::InferenceError;

// ─── Defaults ────────────────────────────────────────────────────────────────

pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_MODEL: &str = "anthropic/claude-3.5-sonnet";

/// Environment variable holding the bearer token.
pub const API_KEY_VAR: &str = "OPENROUTER_API_KEY";
pub const BASE_URL_VAR: &str = "MCPMUX_BASE_URL";
pub const MODEL_VAR: &str = "MCPMUX_MODEL";
/// Optional attribution, sent as `HTTP-Referer`.
pub const SITE_URL_VAR: &str = "YOUR_SITE_URL";
/// Optional attribution, sent as `X-Title`.
pub const SITE_NAME_VAR: &str = "YOUR_SITE_NAME";

// ─── ProviderConfig ──────────────────────────────────────────────────────────

/// Everything the HTTP completion client needs.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: String,
    pub site_url: Option<String>,
    pub site_name: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl ProviderConfig {
    /// Resolve from the process environment.
    pub fn from_env() -> Result<Self, InferenceError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve from an arbitrary variable source.
    ///
    /// Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, InferenceError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let api_key = get(API_KEY_VAR).ok_or_else(|| InferenceError::ConfigError {
            reason: format!("{API_KEY_VAR} is not set"),
        })?;

        Ok(Self {
            base_url: normalize_base_url(&get(BASE_URL_VAR).unwrap_or_else(|| DEFAULT_BASE_URL.into())),
            model: get(MODEL_VAR).unwrap_or_else(|| DEFAULT_MODEL.into()),
            api_key,
            site_url: get(SITE_URL_VAR),
            site_name: get(SITE_NAME_VAR),
            temperature: None,
            max_tokens: None,
        })
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = normalize_base_url(base_url);
        self
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    /// Set sampling parameters. Out-of-range temperatures are rejected.
    pub fn with_sampling(
        mut self,
        temperature: Option<f32>,
        max_tokens: Option<u32>,
    ) -> Result<Self, InferenceError> {
        if let Some(t) = temperature {
            if !(0.0..=2.0).contains(&t) {
                return Err(InferenceError::ConfigError {
                    reason: format!("temperature must be between 0 and 2, got {t}"),
                });
            }
        }
        if max_tokens == Some(0) {
            return Err(InferenceError::ConfigError {
                reason: "max_tokens must be positive".into(),
            });
        }
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        Ok(self)
    }

    /// Full chat completions endpoint URL.
    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

fn normalize_base_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

// ─── Tests ───────────────────────────────────────────────────────────────────
