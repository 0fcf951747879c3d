//! Transport Client (C2) and the `Connection` data model (§3, §4.2).
//!
//! Only the `Stdio` transport is implemented; anything else reports
//! [`McpForgeError::InvalidConfig`] describing it as not implemented, per
//! §4.2's "Transports other than stdio are declared but produce
//! `NotImplemented`".

use std::time::{Duration, Instant};

use mcpforge_config::{ServerConfig, Transport};
use mcpforge_core::{McpForgeError, McpForgeResult, ToolDescriptor, ToolOutcome};
use rmcp::ServiceExt;
use rmcp::transport::{ConfigureCommandExt, TokioChildProcess};
use serde_json::{Map, Value};
use tokio::process::Command;
use tracing::{info, warn};

use crate::convert::{server_info_from_rmcp, tool_descriptor_from_rmcp};
use crate::handler::McpClientHandler;
use crate::queue::RequestQueue;

/// Minimum gap enforced between consecutive `connect` attempts for the same
/// server (§4.4 "Reconnect cooldown", P7).
pub const RECONNECT_COOLDOWN: Duration = Duration::from_secs(5);

type Service = rmcp::service::RunningService<rmcp::RoleClient, McpClientHandler>;

/// An active (or previously active) MCP session (§3 `Connection`).
pub struct Connection {
    config: ServerConfig,
    queue: Option<RequestQueue>,
    tools: Vec<ToolDescriptor>,
    server_info: Option<mcpforge_core::ServerInfo>,
    connected: bool,
    last_attempt: Option<Instant>,
}

impl Connection {
    /// A fresh, disconnected connection bound to `config` (§3.11 "born
    /// disconnected").
    #[must_use]
    pub fn new(config: ServerConfig) -> Self {
        Self { config, queue: None, tools: Vec::new(), server_info: None, connected: false, last_attempt: None }
    }

    /// Server name this connection is bound to.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Whether this connection currently has a live transport session.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// The tool snapshot taken at handshake time, frozen until the next
    /// successful `connect` (§3 invariant).
    #[must_use]
    pub fn tools(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    /// Server info (protocol version, capabilities, instructions) captured
    /// at handshake, if connected.
    #[must_use]
    pub fn server_info(&self) -> Option<&mcpforge_core::ServerInfo> {
        self.server_info.as_ref()
    }

    /// Remaining cooldown before another `connect` attempt is allowed, or
    /// `None` if the gate is open (§4.4, §4.11, P7).
    #[must_use]
    pub fn cooldown_remaining(&self) -> Option<Duration> {
        let last = self.last_attempt?;
        let elapsed = last.elapsed();
        (elapsed < RECONNECT_COOLDOWN).then(|| RECONNECT_COOLDOWN - elapsed)
    }

    /// Perform the MCP handshake and tool discovery (§4.2).
    ///
    /// Idempotent: returns `Ok(())` immediately if already connected (§4.4
    /// "Connect semantics... returns success when already connected").
    ///
    /// # Errors
    ///
    /// Returns [`McpForgeError::CooldownActive`] if called too soon after a
    /// previous attempt, [`McpForgeError::InvalidConfig`] for a non-stdio
    /// transport or a binary-hash mismatch, or
    /// [`McpForgeError::TransportError`] if the child process or handshake
    /// fails.
    pub async fn connect(&mut self) -> McpForgeResult<()> {
        if self.connected {
            return Ok(());
        }

        if let Some(remaining) = self.cooldown_remaining() {
            return Err(McpForgeError::CooldownActive {
                name: self.config.name.clone(),
                remaining_ms: u64::try_from(remaining.as_millis()).unwrap_or(u64::MAX),
            });
        }
        self.last_attempt = Some(Instant::now());

        if self.config.transport != Transport::Stdio {
            return Err(McpForgeError::InvalidConfig(format!(
                "transport {:?} is not implemented for server {}",
                self.config.transport, self.config.name
            )));
        }

        self.config.verify_binary()?;

        let Some(command) = self.config.command.clone() else {
            return Err(McpForgeError::InvalidConfig(format!(
                "server {} has no command configured",
                self.config.name
            )));
        };

        let args = self.config.args.clone();
        let env = self.config.env.clone();
        let working_dir = self.config.working_dir.clone();

        let transport = TokioChildProcess::new(Command::new(&command).configure(move |cmd| {
            for arg in &args {
                cmd.arg(arg);
            }
            for (key, value) in &env {
                cmd.env(key, value);
            }
            if let Some(dir) = &working_dir {
                cmd.current_dir(dir);
            }
        }))
        .map_err(|e| McpForgeError::TransportError { name: self.config.name.clone(), reason: e.to_string() })?;

        let timeout = Duration::from_millis(self.config.timeout_ms);
        let handshake = McpClientHandler.serve(transport);

        let service = match tokio::time::timeout(timeout, handshake).await {
            Ok(Ok(service)) => service,
            Ok(Err(e)) => {
                warn!(server = %self.config.name, error = %e, "MCP handshake failed");
                return Err(McpForgeError::TransportError { name: self.config.name.clone(), reason: e.to_string() });
            },
            Err(_elapsed) => {
                return Err(McpForgeError::TimeoutError { name: self.config.name.clone(), timeout_ms: self.config.timeout_ms });
            },
        };

        let peer_info = service.peer_info().cloned();

        let tools = match tokio::time::timeout(timeout, service.list_all_tools()).await {
            Ok(Ok(tools)) => tools,
            Ok(Err(e)) => {
                let _ = service.cancel().await;
                return Err(McpForgeError::TransportError { name: self.config.name.clone(), reason: e.to_string() });
            },
            Err(_elapsed) => {
                let _ = service.cancel().await;
                return Err(McpForgeError::TimeoutError { name: self.config.name.clone(), timeout_ms: self.config.timeout_ms });
            },
        };

        self.tools = tools.iter().map(|t| tool_descriptor_from_rmcp(t, &self.config.name)).collect();
        self.server_info = peer_info.as_ref().map(|info| server_info_from_rmcp(info, &self.config.name));
        self.queue = Some(RequestQueue::spawn(service, self.config.name.clone(), timeout));
        self.connected = true;

        info!(server = %self.config.name, tool_count = self.tools.len(), "connected to MCP server");
        Ok(())
    }

    /// Tear down the connection. Idempotent and always safe (§3).
    pub async fn disconnect(&mut self) {
        if let Some(queue) = self.queue.take() {
            queue.shutdown().await;
        }
        self.tools.clear();
        self.server_info = None;
        self.connected = false;
    }

    /// `disconnect` + `connect`, subject to the same cooldown gate (§3, §4.4).
    ///
    /// # Errors
    ///
    /// See [`Self::connect`].
    pub async fn reconnect(&mut self) -> McpForgeResult<()> {
        self.disconnect().await;
        self.connect().await
    }

    /// Invoke a tool via this connection's request queue (C2+C3 combined
    /// from the caller's point of view, §4.2/§4.3).
    ///
    /// # Errors
    ///
    /// Returns [`McpForgeError::NotConnected`] before handshake,
    /// [`McpForgeError::TransportError`]/[`McpForgeError::TimeoutError`] on
    /// I/O failure, or `Ok` with `is_error` set when the server reports
    /// `isError=true` (§4.2 "the payload is still returned").
    pub async fn call_tool(&self, tool_name: &str, arguments: Map<String, Value>) -> McpForgeResult<ToolOutcome> {
        let Some(queue) = &self.queue else {
            return Err(McpForgeError::NotConnected { name: self.config.name.clone() });
        };

        let response = queue.submit(tool_name.to_string(), arguments);
        response.await.unwrap_or(Err(McpForgeError::ShuttingDown))
    }

    /// Enqueue a tool invocation without waiting for the result (the raw C3
    /// contract used by the async cache's refresh path, §4.5 step 3).
    ///
    /// # Errors
    ///
    /// Returns [`McpForgeError::NotConnected`] if this connection has no
    /// live queue.
    pub fn submit_tool_call(
        &self,
        tool_name: &str,
        arguments: Map<String, Value>,
    ) -> McpForgeResult<tokio::sync::oneshot::Receiver<McpForgeResult<ToolOutcome>>> {
        let queue = self.queue.as_ref().ok_or_else(|| McpForgeError::NotConnected { name: self.config.name.clone() })?;
        Ok(queue.submit(tool_name.to_string(), arguments))
    }

    /// List resources exposed by the server (supplemental feature #1).
    ///
    /// # Errors
    ///
    /// Returns [`McpForgeError::NotConnected`] if disconnected, or
    /// [`McpForgeError::TransportError`] on I/O failure.
    pub async fn list_resources(&self) -> McpForgeResult<Vec<mcpforge_core::ResourceDescriptor>> {
        let queue = self.queue_or_not_connected()?;
        queue.list_resources().await.unwrap_or(Err(McpForgeError::ShuttingDown))
    }

    /// Read a resource by URI (supplemental feature #1).
    ///
    /// # Errors
    ///
    /// Returns [`McpForgeError::NotConnected`] if disconnected, or
    /// [`McpForgeError::TransportError`] on I/O failure.
    pub async fn read_resource(&self, uri: &str) -> McpForgeResult<Vec<mcpforge_core::ResourceContent>> {
        let queue = self.queue_or_not_connected()?;
        queue.read_resource(uri.to_string()).await.unwrap_or(Err(McpForgeError::ShuttingDown))
    }

    /// List prompts exposed by the server (supplemental feature #1).
    ///
    /// # Errors
    ///
    /// Returns [`McpForgeError::NotConnected`] if disconnected, or
    /// [`McpForgeError::TransportError`] on I/O failure.
    pub async fn list_prompts(&self) -> McpForgeResult<Vec<mcpforge_core::PromptDescriptor>> {
        let queue = self.queue_or_not_connected()?;
        queue.list_prompts().await.unwrap_or(Err(McpForgeError::ShuttingDown))
    }

    /// Render a prompt by name, returning `(role, text)` pairs (supplemental feature #1).
    ///
    /// # Errors
    ///
    /// Returns [`McpForgeError::NotConnected`] if disconnected, or
    /// [`McpForgeError::TransportError`] on I/O failure.
    pub async fn get_prompt(&self, name: &str, arguments: Option<Map<String, Value>>) -> McpForgeResult<Vec<(String, String)>> {
        let queue = self.queue_or_not_connected()?;
        queue.get_prompt(name.to_string(), arguments).await.unwrap_or(Err(McpForgeError::ShuttingDown))
    }

    fn queue_or_not_connected(&self) -> McpForgeResult<&RequestQueue> {
        self.queue.as_ref().ok_or_else(|| McpForgeError::NotConnected { name: self.config.name.clone() })
    }

    /// The underlying config this connection is bound to.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("name", &self.config.name)
            .field("connected", &self.connected)
            .field("tool_count", &self.tools.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_connection_is_disconnected() {
        let conn = Connection::new(ServerConfig::stdio("weather", "npx"));
        assert!(!conn.is_connected());
        assert!(conn.tools().is_empty());
        assert!(conn.cooldown_remaining().is_none());
    }

    #[tokio::test]
    async fn call_tool_before_connect_is_not_connected() {
        let conn = Connection::new(ServerConfig::stdio("weather", "npx"));
        let result = conn.call_tool("get_forecast", Map::new()).await;
        assert!(matches!(result, Err(McpForgeError::NotConnected { .. })));
    }

    #[tokio::test]
    async fn non_stdio_transport_is_rejected() {
        let mut config = ServerConfig::stdio("weather", "npx");
        config.transport = Transport::Sse;
        let mut conn = Connection::new(config);
        let result = conn.connect().await;
        assert!(matches!(result, Err(McpForgeError::InvalidConfig(_))));
    }
}
