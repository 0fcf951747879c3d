//! Per-server MCP configuration (§3 `ServerConfig`, §4.1).

use std::collections::HashMap;
use std::path::PathBuf;

use mcpforge_core::{McpForgeError, McpForgeResult};
use serde::{Deserialize, Serialize};

fn default_timeout_ms() -> u64 {
    5000
}

/// Transport kind. Only `Stdio` is implemented here; `Sse` is declared so the
/// state machine can grow transports without touching callers, per §4.2.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transport {
    /// Standard I/O of a spawned child process.
    #[default]
    Stdio,
    /// Server-Sent Events over HTTP. Declared but not implemented; connecting
    /// to one yields [`McpForgeError::InvalidConfig`] with a `NotImplemented`
    /// style message.
    Sse,
}

/// Policy consulted by the server registry when a connection drops
/// unexpectedly (not on a user-initiated `disconnect`). Additive supplement
/// over the base reconnect-cooldown mechanism in §4.4; defaults to `Never` so
/// existing cooldown-only behavior is unchanged unless a config opts in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestartPolicy {
    /// Never restart automatically (default).
    #[default]
    Never,
    /// Restart up to `max_retries` times after an unsolicited disconnect.
    OnFailure {
        /// Maximum automatic restart attempts.
        #[serde(default = "default_max_retries")]
        max_retries: u32,
    },
    /// Always restart, with no retry limit.
    Always,
}

fn default_max_retries() -> u32 {
    3
}

/// Configuration for a single MCP server (§3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    /// Unique, non-empty name; used as the script/command namespace.
    pub name: String,
    /// Transport kind.
    #[serde(default)]
    pub transport: Transport,
    /// Executable path (required for `Stdio`).
    pub command: Option<String>,
    /// Ordered command-line arguments.
    #[serde(default)]
    pub args: Vec<String>,
    /// URL, for transports that need one (currently only `Sse`).
    pub url: Option<String>,
    /// Working directory for the spawned child.
    #[serde(rename = "workingDirectory")]
    pub working_dir: Option<PathBuf>,
    /// Environment variables merged on top of the process environment.
    #[serde(default)]
    pub env: HashMap<String, String>,
    /// Whether to connect automatically on startup.
    #[serde(default)]
    pub auto_connect: bool,
    /// Timeout, in milliseconds, applied to handshake and each request.
    #[serde(rename = "timeout", default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Expected `sha256:<hex>` hash of the command binary. When present, the
    /// transport client refuses to spawn a binary that doesn't match.
    pub expected_hash: Option<String>,
    /// Restart policy for unsolicited disconnects.
    #[serde(default)]
    pub restart_policy: RestartPolicy,
}

impl ServerConfig {
    /// Build a stdio server config with the required fields.
    #[must_use]
    pub fn stdio(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transport: Transport::Stdio,
            command: Some(command.into()),
            args: Vec::new(),
            url: None,
            working_dir: None,
            env: HashMap::new(),
            auto_connect: false,
            timeout_ms: default_timeout_ms(),
            expected_hash: None,
            restart_policy: RestartPolicy::Never,
        }
    }

    /// Set arguments.
    #[must_use]
    pub fn with_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Set a working directory.
    #[must_use]
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Add an environment variable.
    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Mark for auto-connect on startup.
    #[must_use]
    pub fn auto_connect(mut self) -> Self {
        self.auto_connect = true;
        self
    }

    /// Override the default timeout.
    #[must_use]
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Pin an expected binary hash.
    #[must_use]
    pub fn with_expected_hash(mut self, hash: impl Into<String>) -> Self {
        self.expected_hash = Some(hash.into());
        self
    }

    /// Set the restart policy.
    #[must_use]
    pub fn with_restart_policy(mut self, policy: RestartPolicy) -> Self {
        self.restart_policy = policy;
        self
    }

    /// Validate the invariant that `Stdio` requires a non-empty `command`,
    /// and that `name` is non-empty. Called at `add`/`update` time; no
    /// mutation happens if this fails (§3, §7 `InvalidConfig`).
    ///
    /// # Errors
    ///
    /// Returns [`McpForgeError::InvalidConfig`] if the name is empty, or the
    /// transport is `Stdio` and `command` is missing or empty.
    pub fn validate(&self) -> McpForgeResult<()> {
        if self.name.is_empty() {
            return Err(McpForgeError::InvalidConfig(
                "server name must not be empty".to_string(),
            ));
        }

        if self.transport == Transport::Stdio {
            let command_ok = self.command.as_deref().is_some_and(|c| !c.is_empty());
            if !command_ok {
                return Err(McpForgeError::InvalidConfig(format!(
                    "server {} uses stdio transport but has no command",
                    self.name
                )));
            }
        }

        Ok(())
    }

    /// Verify the configured binary against `expected_hash`, if set.
    ///
    /// # Errors
    ///
    /// Returns [`McpForgeError::InvalidConfig`] if the binary cannot be
    /// located, cannot be read, or its hash does not match.
    pub fn verify_binary(&self) -> McpForgeResult<()> {
        let Some(expected) = &self.expected_hash else {
            return Ok(());
        };
        let Some(command) = &self.command else {
            return Ok(());
        };

        let binary_path = which::which(command).map_err(|e| {
            McpForgeError::InvalidConfig(format!("cannot find binary {command}: {e}"))
        })?;

        let binary_data = std::fs::read(&binary_path)?;
        let actual = sha2::Sha256::digest_hex(&binary_data);
        let actual_str = format!("sha256:{actual}");

        if expected != &actual_str {
            return Err(McpForgeError::InvalidConfig(format!(
                "binary hash mismatch for {}: expected {expected}, got {actual_str}",
                self.name
            )));
        }

        Ok(())
    }
}

/// Small extension trait so `verify_binary` reads as a one-liner; keeps the
/// `sha2::Digest` import local to this module.
trait Sha256Hex {
    fn digest_hex(data: &[u8]) -> String;
}

impl Sha256Hex for sha2::Sha256 {
    fn digest_hex(data: &[u8]) -> String {
        use sha2::Digest;
        let mut hasher = Self::new();
        hasher.update(data);
        let digest = hasher.finalize();
        digest.iter().map(|b| format!("{b:02x}")).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stdio_requires_command() {
        let mut config = ServerConfig::stdio("weather", "");
        config.command = None;
        assert!(config.validate().is_err());
    }

    #[test]
    fn valid_stdio_passes() {
        let config = ServerConfig::stdio("weather", "npx").with_args(["-y", "weather-mcp"]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_name_is_invalid() {
        let config = ServerConfig::stdio("", "npx");
        assert!(config.validate().is_err());
    }

    #[test]
    fn restart_policy_defaults_to_never() {
        let config = ServerConfig::stdio("weather", "npx");
        assert_eq!(config.restart_policy, RestartPolicy::Never);
    }
}
