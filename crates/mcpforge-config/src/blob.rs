//! The persisted config blob (§4.1 Config Store, §6 External Interfaces).
//!
//! `serialize`/`deserialize` are the only two operations. Deserialization
//! never fails: a malformed server entry is skipped with a warning, and an
//! absent/malformed `gemini` section yields defaults.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use mcpforge_core::{McpForgeError, McpForgeResult};

use crate::llm_config::{LlmConfig, ModelId};
use crate::obfuscate::{deobfuscate, obfuscate};
use crate::server_config::ServerConfig;

/// Wire shape of the `gemini` section (§6): obfuscated API key, symbolic
/// model name, and the clampable numeric fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct GeminiWire {
    #[serde(default)]
    api_key: String,
    #[serde(default = "default_model_name")]
    model: String,
    #[serde(default = "default_max_tokens")]
    max_tokens: u32,
    #[serde(default = "default_temperature")]
    temperature: f64,
    #[serde(default)]
    enabled: bool,
}

fn default_model_name() -> String {
    ModelId::default().as_str().to_string()
}

fn default_max_tokens() -> u32 {
    2048
}

fn default_temperature() -> f64 {
    0.7
}

impl Default for GeminiWire {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: default_model_name(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            enabled: false,
        }
    }
}

impl From<&LlmConfig> for GeminiWire {
    fn from(config: &LlmConfig) -> Self {
        Self {
            api_key: obfuscate(&config.api_key),
            model: config.model_id.as_str().to_string(),
            max_tokens: config.max_output_tokens,
            temperature: config.temperature,
            enabled: config.enabled,
        }
    }
}

impl From<GeminiWire> for LlmConfig {
    fn from(wire: GeminiWire) -> Self {
        let mut config = Self {
            api_key: deobfuscate(&wire.api_key),
            model_id: ModelId::from_wire_name(&wire.model),
            max_output_tokens: wire.max_tokens,
            temperature: wire.temperature,
            enabled: wire.enabled,
        };
        config.clamp_ranges();
        config
    }
}

/// Wire shape of the whole blob: an ordered list of server entries plus one
/// `gemini` LLM config section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct BlobWire {
    #[serde(default)]
    servers: Vec<ServerConfig>,
    #[serde(default)]
    gemini: GeminiWire,
}

/// In-memory form of the persisted config blob (§3, §4.1).
#[derive(Debug, Clone, Default)]
pub struct ConfigBlob {
    /// Ordered server configs, as persisted.
    pub servers: Vec<ServerConfig>,
    /// LLM config.
    pub gemini: LlmConfig,
}

impl ConfigBlob {
    /// Serialize to the TOML blob form (§6).
    ///
    /// # Errors
    ///
    /// Returns [`McpForgeError::SerializationError`] if TOML encoding fails,
    /// which should not happen for well-formed in-memory values.
    pub fn serialize(&self) -> McpForgeResult<String> {
        let wire = BlobWire {
            servers: self.servers.clone(),
            gemini: GeminiWire::from(&self.gemini),
        };
        toml::to_string_pretty(&wire)
            .map_err(|e| McpForgeError::SerializationError(e.to_string()))
    }

    /// Deserialize from the TOML blob form. Never fails: a completely
    /// unparsable document yields [`Self::default`]; a malformed individual
    /// server entry is skipped with a logged warning; a missing or malformed
    /// `gemini` section yields [`LlmConfig::default`].
    #[must_use]
    pub fn deserialize(blob: &str) -> Self {
        // Fast path: the whole document parses cleanly.
        if let Ok(wire) = toml::from_str::<BlobWire>(blob) {
            return Self {
                servers: wire.servers,
                gemini: wire.gemini.into(),
            };
        }

        // Slow path: walk the raw table, tolerating per-entry failures.
        let Ok(raw) = blob.parse::<toml::Table>() else {
            warn!("config blob is not valid TOML; starting from defaults");
            return Self::default();
        };

        let servers = raw
            .get("servers")
            .and_then(toml::Value::as_array)
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|entry| match parse_server_entry(entry) {
                        Ok(config) => Some(config),
                        Err(e) => {
                            warn!(error = %e, "skipping malformed server entry");
                            None
                        },
                    })
                    .collect()
            })
            .unwrap_or_default();

        let gemini = raw
            .get("gemini")
            .and_then(|v| toml::to_string(v).ok())
            .and_then(|s| toml::from_str::<GeminiWire>(&s).ok())
            .unwrap_or_default();

        Self {
            servers,
            gemini: gemini.into(),
        }
    }

    /// Load from a file path, returning defaults if the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`McpForgeError::Io`] only if the file exists but cannot be
    /// read (permissions, etc.) — a missing file is not an error.
    pub fn load(path: impl AsRef<Path>) -> McpForgeResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Ok(Self::deserialize(&content))
    }

    /// Save to a file path, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the content cannot be serialized or the file
    /// cannot be written.
    pub fn save(&self, path: impl AsRef<Path>) -> McpForgeResult<()> {
        let path = path.as_ref();
        let content = self.serialize()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Build a name → config map, the shape the server registry (C4) wants.
    #[must_use]
    pub fn servers_by_name(&self) -> HashMap<String, ServerConfig> {
        self.servers
            .iter()
            .cloned()
            .map(|s| (s.name.clone(), s))
            .collect()
    }

    /// Default on-disk path: `<config_dir>/mcpforge/servers.toml`.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform config directory cannot be resolved.
    pub fn default_path() -> McpForgeResult<PathBuf> {
        let base = dirs_config_dir()?;
        Ok(base.join("mcpforge").join("servers.toml"))
    }
}

fn parse_server_entry(value: &toml::Value) -> McpForgeResult<ServerConfig> {
    let as_string =
        toml::to_string(value).map_err(|e| McpForgeError::SerializationError(e.to_string()))?;
    toml::from_str(&as_string).map_err(|e| McpForgeError::SerializationError(e.to_string()))
}

fn dirs_config_dir() -> McpForgeResult<PathBuf> {
    std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")))
        .ok_or_else(|| {
            McpForgeError::InvalidConfig("cannot determine config directory".to_string())
        })
}
