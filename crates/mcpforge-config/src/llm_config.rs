//! LLM configuration (§3 `LLMConfig`, §4.1, §6 `gemini` section).

use serde::{Deserialize, Serialize};

/// Known model identifiers, persisted by symbolic name (§3). Unknown names
/// encountered on load coerce to the default rather than failing (§4.1).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelId {
    /// `gemini-1.5-flash`.
    Gemini15Flash,
    /// `gemini-1.5-pro`.
    Gemini15Pro,
    /// `gemini-2.0-flash`.
    #[default]
    Gemini20Flash,
    /// `gemini-2.0-flash-lite`.
    Gemini20FlashLite,
}

impl ModelId {
    /// The symbolic wire name for this model.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Gemini15Flash => "gemini-1.5-flash",
            Self::Gemini15Pro => "gemini-1.5-pro",
            Self::Gemini20Flash => "gemini-2.0-flash",
            Self::Gemini20FlashLite => "gemini-2.0-flash-lite",
        }
    }

    /// Parse a symbolic wire name, defaulting to [`Self::default`] on any
    /// unrecognized value (§4.1 "coerces unknown model ids to the default").
    #[must_use]
    pub fn from_wire_name(name: &str) -> Self {
        match name {
            "gemini-1.5-flash" => Self::Gemini15Flash,
            "gemini-1.5-pro" => Self::Gemini15Pro,
            "gemini-2.0-flash" => Self::Gemini20Flash,
            "gemini-2.0-flash-lite" => Self::Gemini20FlashLite,
            _ => Self::default(),
        }
    }
}

const MIN_MAX_OUTPUT_TOKENS: u32 = 1;
const MAX_MAX_OUTPUT_TOKENS: u32 = 8192;
const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 2048;
const MIN_TEMPERATURE: f64 = 0.0;
const MAX_TEMPERATURE: f64 = 2.0;
const DEFAULT_TEMPERATURE: f64 = 0.7;

/// LLM configuration (§3). `api_key` is held in plaintext in memory; it is
/// obfuscated only at the persisted-blob boundary (§4.1, §9).
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmConfig {
    /// API key. Empty string means "not set".
    pub api_key: String,
    /// Model identifier.
    pub model_id: ModelId,
    /// Maximum output tokens, clamped to `1..=8192`.
    pub max_output_tokens: u32,
    /// Sampling temperature, clamped to `0.0..=2.0`.
    pub temperature: f64,
    /// Whether the LLM entry points are enabled.
    pub enabled: bool,
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("has_api_key", &!self.api_key.is_empty())
            .field("model_id", &self.model_id)
            .field("max_output_tokens", &self.max_output_tokens)
            .field("temperature", &self.temperature)
            .field("enabled", &self.enabled)
            .finish()
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model_id: ModelId::default(),
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            enabled: false,
        }
    }
}

impl LlmConfig {
    /// Set the API key.
    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = key.into();
        self
    }

    /// Set the model.
    #[must_use]
    pub fn with_model(mut self, model: ModelId) -> Self {
        self.model_id = model;
        self
    }

    /// Set and clamp `max_output_tokens` to `1..=8192`.
    #[must_use]
    pub fn with_max_output_tokens(mut self, tokens: u32) -> Self {
        self.max_output_tokens = tokens.clamp(MIN_MAX_OUTPUT_TOKENS, MAX_MAX_OUTPUT_TOKENS);
        self
    }

    /// Set and clamp `temperature` to `0.0..=2.0`.
    #[must_use]
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature.clamp(MIN_TEMPERATURE, MAX_TEMPERATURE);
        self
    }

    /// Enable or disable.
    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// `enabled ∧ hasCredentials`, per §4.9 `isConfigured()`.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.enabled && !self.api_key.is_empty()
    }

    /// Clamp numeric ranges in place; used when loading untrusted/older blobs
    /// (§4.1 "Validation on load clamps numeric ranges").
    pub fn clamp_ranges(&mut self) {
        self.max_output_tokens = self
            .max_output_tokens
            .clamp(MIN_MAX_OUTPUT_TOKENS, MAX_MAX_OUTPUT_TOKENS);
        self.temperature = self.temperature.clamp(MIN_TEMPERATURE, MAX_TEMPERATURE);
    }
}
