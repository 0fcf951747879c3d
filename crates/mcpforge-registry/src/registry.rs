//! Server Registry (C4, §4.4).
//!
//! Owns every configured server's [`ServerConfig`] and, once connected, its
//! [`Connection`]. Structural mutation (`add`/`remove`/`update`/`connect`/
//! `disconnect`) is a critical section over both maps (§5); concurrent
//! reads of either map proceed lock-free through `DashMap`.

use std::sync::Arc;

use dashmap::DashMap;
use mcpforge_config::ServerConfig;
use mcpforge_core::{
    McpForgeError, McpForgeResult, PromptDescriptor, ResourceContent, ResourceDescriptor, ToolDescriptor, ToolOutcome,
};
use mcpforge_transport::Connection;
use serde_json::{Map, Value};
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

use crate::cache::AsyncToolCache;
use crate::events::{DispatchHost, InlineDispatch, RegistrationListener, dispatch_connected, dispatch_disconnected};
use crate::status::ServerStatus;

/// Owns every configured MCP server and its live connection, if any (§4.4).
pub struct ServerRegistry {
    configs: DashMap<String, ServerConfig>,
    connections: DashMap<String, Arc<Mutex<Connection>>>,
    /// Guards `add`/`remove`/`update`/`connect`/`disconnect` as a single
    /// critical section spanning both maps above (§5).
    structural_lock: Mutex<()>,
    cache: Arc<AsyncToolCache>,
    listeners: RwLock<Vec<Arc<dyn RegistrationListener>>>,
    dispatch: Arc<dyn DispatchHost>,
}

impl ServerRegistry {
    /// A registry with no configured servers, dispatching registration
    /// events inline (§9's documented fallback).
    #[must_use]
    pub fn new() -> Self {
        Self::with_dispatch(Arc::new(InlineDispatch))
    }

    /// A registry that marshals registration events through `dispatch`
    /// instead of running them inline.
    #[must_use]
    pub fn with_dispatch(dispatch: Arc<dyn DispatchHost>) -> Self {
        Self {
            configs: DashMap::new(),
            connections: DashMap::new(),
            structural_lock: Mutex::new(()),
            cache: Arc::new(AsyncToolCache::new()),
            listeners: RwLock::new(Vec::new()),
            dispatch,
        }
    }

    /// Shared handle to the async tool cache backing this registry's
    /// servers (C5), so a script/command layer can issue non-blocking reads.
    #[must_use]
    pub fn cache(&self) -> Arc<AsyncToolCache> {
        Arc::clone(&self.cache)
    }

    /// Register a listener to receive future (not past) connect/disconnect
    /// events. Intended for C6/C7 to subscribe at construction time.
    pub async fn subscribe(&self, listener: Arc<dyn RegistrationListener>) {
        self.listeners.write().await.push(listener);
    }

    /// Add a new server configuration. Does not connect it (§4.4 step 1).
    ///
    /// # Errors
    ///
    /// Returns [`McpForgeError::InvalidConfig`] if `config` fails validation
    /// or a server with the same name is already registered.
    pub async fn add(&self, config: ServerConfig) -> McpForgeResult<()> {
        config.validate()?;
        let _guard = self.structural_lock.lock().await;
        if self.configs.contains_key(&config.name) {
            return Err(McpForgeError::InvalidConfig(format!("server {} is already registered", config.name)));
        }
        let name = config.name.clone();
        self.configs.insert(name.clone(), config);
        info!(server = %name, "server registered");
        Ok(())
    }

    /// Remove a server, disconnecting it first if it is live (§4.4).
    ///
    /// # Errors
    ///
    /// Returns [`McpForgeError::ServerNotFound`] if no such server is
    /// registered.
    pub async fn remove(&self, name: &str) -> McpForgeResult<()> {
        let _guard = self.structural_lock.lock().await;
        if !self.configs.contains_key(name) {
            return Err(McpForgeError::ServerNotFound { name: name.to_string() });
        }
        self.disconnect_locked(name).await;
        self.configs.remove(name);
        info!(server = %name, "server removed");
        Ok(())
    }

    /// Replace a server's configuration, tearing down any active connection
    /// first (§4.4 "update"). If `new_config.name` differs from `name`, the
    /// new name must not already be taken.
    ///
    /// # Errors
    ///
    /// Returns [`McpForgeError::InvalidConfig`] if `new_config` fails
    /// validation, if `name` is not registered, or if renaming collides with
    /// an existing server.
    pub async fn update(&self, name: &str, new_config: ServerConfig) -> McpForgeResult<()> {
        new_config.validate()?;
        let _guard = self.structural_lock.lock().await;
        if !self.configs.contains_key(name) {
            return Err(McpForgeError::InvalidConfig(format!("server {name} is not registered")));
        }
        if new_config.name != name && self.configs.contains_key(&new_config.name) {
            return Err(McpForgeError::InvalidConfig(format!("server {} is already registered", new_config.name)));
        }

        self.disconnect_locked(name).await;
        self.configs.remove(name);
        self.connections.remove(name);
        let new_name = new_config.name.clone();
        self.configs.insert(new_name.clone(), new_config);
        info!(old = %name, new = %new_name, "server config updated");
        Ok(())
    }

    /// Connect a registered server. Idempotent (§4.4, §3.11).
    ///
    /// # Errors
    ///
    /// Returns [`McpForgeError::ServerNotFound`] if `name` is not
    /// registered, [`McpForgeError::CooldownActive`] if attempted too soon
    /// after a prior attempt (P7), or a transport error from the handshake.
    pub async fn connect(&self, name: &str) -> McpForgeResult<()> {
        let _guard = self.structural_lock.lock().await;
        let config = self.configs.get(name).ok_or_else(|| McpForgeError::ServerNotFound { name: name.to_string() })?.clone();

        let connection: Arc<Mutex<Connection>> =
            self.connections.entry(name.to_string()).or_insert_with(|| Arc::new(Mutex::new(Connection::new(config)))).clone();

        let mut conn = connection.lock().await;
        conn.connect().await?;
        let tools = conn.tools().to_vec();
        drop(conn);

        let listeners = self.listeners.read().await.clone();
        dispatch_connected(&self.dispatch, listeners, name.to_string(), tools);
        Ok(())
    }

    /// Disconnect a server, evicting its cache entries and notifying
    /// listeners (§4.4, P3). Idempotent.
    ///
    /// # Errors
    ///
    /// Returns [`McpForgeError::ServerNotFound`] if `name` is not
    /// registered.
    pub async fn disconnect(&self, name: &str) -> McpForgeResult<()> {
        let _guard = self.structural_lock.lock().await;
        if !self.configs.contains_key(name) {
            return Err(McpForgeError::ServerNotFound { name: name.to_string() });
        }
        self.disconnect_locked(name).await;
        Ok(())
    }

    /// Connect every registered server whose config requests `auto_connect`
    /// (§4.4 "on startup"). Failures are logged and skipped rather than
    /// aborting the remaining servers.
    pub async fn connect_auto_connect(&self) {
        let names: Vec<String> =
            self.configs.iter().filter(|entry| entry.value().auto_connect).map(|entry| entry.key().clone()).collect();

        for name in names {
            if let Err(e) = self.connect(&name).await {
                warn!(server = %name, error = %e, "auto-connect failed");
            }
        }
    }

    /// Disconnect every currently connected server.
    pub async fn disconnect_all(&self) {
        let names: Vec<String> = self.connections.iter().map(|entry| entry.key().clone()).collect();
        for name in names {
            let _ = self.disconnect(&name).await;
        }
    }

    /// Must be called with `structural_lock` already held.
    async fn disconnect_locked(&self, name: &str) {
        if let Some((_, connection)) = self.connections.remove(name) {
            let mut conn = connection.lock().await;
            if conn.is_connected() {
                conn.disconnect().await;
                self.cache.evict_server(name);
                let listeners = self.listeners.read().await.clone();
                dispatch_disconnected(&self.dispatch, listeners, name.to_string());
                info!(server = %name, "server disconnected");
            }
        }
    }

    /// Invoke a tool on a connected server, synchronously awaiting the
    /// result (used by the command surface, §4.7, and the LLM loop, §4.10).
    ///
    /// # Errors
    ///
    /// Returns [`McpForgeError::ServerNotFound`] if `name` is not
    /// registered, or [`McpForgeError::NotConnected`] if it is registered
    /// but not currently connected.
    pub async fn call_tool(&self, name: &str, tool_name: &str, arguments: Map<String, Value>) -> McpForgeResult<ToolOutcome> {
        let connection = self.connections.get(name).map(|e| Arc::clone(e.value())).ok_or_else(|| McpForgeError::NotConnected {
            name: name.to_string(),
        })?;
        let conn = connection.lock().await;
        conn.call_tool(tool_name, arguments).await
    }

    /// Whether `name` currently has a live connection. Synchronous and
    /// non-blocking; used by binding layers that must not block on RPC
    /// (§4.6 step 1, §4.7 execution guard).
    ///
    /// A registry entry can exist for a server that failed to connect (its
    /// `Connection` is kept around so P7's cooldown timer survives the
    /// failure), so this checks the connection's actual state via
    /// `try_lock` rather than just map membership. If the connection is
    /// momentarily locked by a concurrent operation this conservatively
    /// reports `false`.
    #[must_use]
    pub fn is_connected(&self, name: &str) -> bool {
        self.connections.get(name).is_some_and(|entry| entry.try_lock().is_ok_and(|conn| conn.is_connected()))
    }

    /// Names of every server with a live connection right now (§4.10, "all
    /// connected servers" when the LLM loop is given no explicit set).
    #[must_use]
    pub fn connected_names(&self) -> Vec<String> {
        self.connections.iter().filter(|entry| entry.value().try_lock().is_ok_and(|conn| conn.is_connected())).map(|entry| entry.key().clone()).collect()
    }

    /// Non-blocking cached read of a tool's rendered value (C5, §4.5), for
    /// scripting contexts that evaluate synchronously.
    ///
    /// # Errors
    ///
    /// Returns [`McpForgeError::NotConnected`] if `name` is registered but
    /// not connected, or [`McpForgeError::ServerNotFound`] if unregistered.
    pub fn read_cached(&self, name: &str, tool_name: &str, arguments: &Map<String, Value>) -> McpForgeResult<String> {
        let connection = self
            .connections
            .get(name)
            .map(|e| Arc::clone(e.value()))
            .ok_or_else(|| McpForgeError::ServerNotFound { name: name.to_string() })?;

        let tool = tool_name.to_string();
        let args = arguments.clone();
        Ok(self.cache.read(name, tool_name, arguments, move || {
            crate::cache::boxed_refresh(async move {
                let conn = connection.lock().await;
                conn.call_tool(&tool, args).await
            })
        }))
    }

    /// Tool descriptors for a connected server, or an empty vec if it is
    /// unregistered or disconnected.
    pub async fn tools_for(&self, name: &str) -> Vec<ToolDescriptor> {
        let Some(connection) = self.connections.get(name).map(|e| Arc::clone(e.value())) else {
            return Vec::new();
        };
        connection.lock().await.tools().to_vec()
    }

    /// List resources exposed by a connected server (supplemental feature #1).
    ///
    /// # Errors
    ///
    /// Returns [`McpForgeError::NotConnected`] if `name` is not connected.
    pub async fn list_resources(&self, name: &str) -> McpForgeResult<Vec<ResourceDescriptor>> {
        self.connected(name)?.lock().await.list_resources().await
    }

    /// Read a resource by URI from a connected server (supplemental feature #1).
    ///
    /// # Errors
    ///
    /// Returns [`McpForgeError::NotConnected`] if `name` is not connected.
    pub async fn read_resource(&self, name: &str, uri: &str) -> McpForgeResult<Vec<ResourceContent>> {
        self.connected(name)?.lock().await.read_resource(uri).await
    }

    /// List prompts exposed by a connected server (supplemental feature #1).
    ///
    /// # Errors
    ///
    /// Returns [`McpForgeError::NotConnected`] if `name` is not connected.
    pub async fn list_prompts(&self, name: &str) -> McpForgeResult<Vec<PromptDescriptor>> {
        self.connected(name)?.lock().await.list_prompts().await
    }

    /// Render a prompt by name from a connected server, returning
    /// `(role, text)` pairs (supplemental feature #1).
    ///
    /// # Errors
    ///
    /// Returns [`McpForgeError::NotConnected`] if `name` is not connected.
    pub async fn get_prompt(
        &self,
        name: &str,
        prompt_name: &str,
        arguments: Option<Map<String, Value>>,
    ) -> McpForgeResult<Vec<(String, String)>> {
        self.connected(name)?.lock().await.get_prompt(prompt_name, arguments).await
    }

    fn connected(&self, name: &str) -> McpForgeResult<Arc<Mutex<Connection>>> {
        self.connections.get(name).map(|e| Arc::clone(e.value())).ok_or_else(|| McpForgeError::NotConnected { name: name.to_string() })
    }

    /// Every registered server's config, for enumeration by a host UI.
    #[must_use]
    pub fn list_configs(&self) -> Vec<ServerConfig> {
        self.configs.iter().map(|entry| entry.value().clone()).collect()
    }

    /// A point-in-time snapshot of one server's connection state
    /// (supplemental feature #4).
    #[must_use]
    pub async fn status(&self, name: &str) -> Option<ServerStatus> {
        let config = self.configs.get(name)?.clone();
        match self.connections.get(name).map(|e| Arc::clone(e.value())) {
            Some(connection) => {
                let conn = connection.lock().await;
                Some(ServerStatus {
                    name: config.name,
                    connected: conn.is_connected(),
                    cooldown_remaining_ms: conn.cooldown_remaining().map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX)),
                    tools: conn.tools().to_vec(),
                })
            },
            None => Some(ServerStatus::unconnected(config.name)),
        }
    }

    /// Snapshots for every registered server.
    pub async fn statuses(&self) -> Vec<ServerStatus> {
        let names: Vec<String> = self.configs.iter().map(|entry| entry.key().clone()).collect();
        let mut out = Vec::with_capacity(names.len());
        for name in names {
            if let Some(status) = self.status(&name).await {
                out.push(status);
            }
        }
        out
    }
}

impl Default for ServerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcpforge_config::ServerConfig;

    #[tokio::test]
    async fn add_rejects_duplicate_names() {
        let registry = ServerRegistry::new();
        registry.add(ServerConfig::stdio("weather", "npx")).await.unwrap();
        let result = registry.add(ServerConfig::stdio("weather", "npx")).await;
        assert!(matches!(result, Err(McpForgeError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn connect_unknown_server_is_not_found() {
        let registry = ServerRegistry::new();
        let result = registry.connect("ghost").await;
        assert!(matches!(result, Err(McpForgeError::ServerNotFound { .. })));
    }

    #[tokio::test]
    async fn remove_unknown_server_is_not_found() {
        let registry = ServerRegistry::new();
        let result = registry.remove("ghost").await;
        assert!(matches!(result, Err(McpForgeError::ServerNotFound { .. })));
    }

    #[tokio::test]
    async fn status_of_unconnected_server_reports_not_connected() {
        let registry = ServerRegistry::new();
        registry.add(ServerConfig::stdio("weather", "npx")).await.unwrap();
        let status = registry.status("weather").await.unwrap();
        assert!(!status.connected);
        assert!(status.tools.is_empty());
    }

    #[tokio::test]
    async fn call_tool_on_registered_but_unconnected_server_is_not_connected() {
        let registry = ServerRegistry::new();
        registry.add(ServerConfig::stdio("weather", "npx")).await.unwrap();
        let result = registry.call_tool("weather", "forecast", Map::new()).await;
        assert!(matches!(result, Err(McpForgeError::NotConnected { .. })));
    }

    #[tokio::test]
    async fn resources_and_prompts_on_unconnected_server_are_not_connected() {
        let registry = ServerRegistry::new();
        registry.add(ServerConfig::stdio("weather", "npx")).await.unwrap();
        assert!(matches!(registry.list_resources("weather").await, Err(McpForgeError::NotConnected { .. })));
        assert!(matches!(registry.read_resource("weather", "file:///x").await, Err(McpForgeError::NotConnected { .. })));
        assert!(matches!(registry.list_prompts("weather").await, Err(McpForgeError::NotConnected { .. })));
        assert!(matches!(registry.get_prompt("weather", "greet", None).await, Err(McpForgeError::NotConnected { .. })));
    }

    #[tokio::test]
    async fn failed_connect_does_not_report_as_connected() {
        let registry = ServerRegistry::new();
        registry.add(ServerConfig::stdio("ghost-process", "definitely-not-a-real-binary")).await.unwrap();
        let result = registry.connect("ghost-process").await;
        assert!(result.is_err());
        assert!(!registry.is_connected("ghost-process"));
        assert!(registry.connected_names().is_empty());
    }
}
