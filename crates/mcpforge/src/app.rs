//! Facade wiring for C1-C10: one struct owning the server registry, schema
//! bridge, and LLM client manager/execution loop, plus the per-caller
//! cooldown gate the command surface applies to `gemini`/`gemini-mcp`
//! (§4.10 "Cooldown").

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, RwLock};
use tracing::warn;

use mcpforge_config::{ConfigBlob, LlmConfig};
use mcpforge_llm::{ExecutionLoop, GeminiBackendFactory, LlmBackendFactory, LlmClientManager, SchemaBridge};
use mcpforge_registry::ServerRegistry;

/// Per-caller cooldown the command surface enforces on `gemini`/`gemini-mcp`
/// (§4.10 "the host-side command wrappers may apply a per-caller 1s
/// cooldown"). The core itself (the `mcpforge-llm` crate) does not
/// rate-limit at all; this is purely a command-layer concern.
pub const GEMINI_COMMAND_COOLDOWN: Duration = Duration::from_secs(1);

/// Owns every long-lived piece of the MCP integration core: the server
/// registry (C4/C5), the schema bridge (C8), and the LLM client
/// manager/execution loop (C9/C10). Generic over the LLM backend factory so
/// tests can swap in a fake without touching this type.
pub struct McpForge<F: LlmBackendFactory = GeminiBackendFactory> {
    /// Server registry (C4), the single owner of every configured server's
    /// config and connection.
    pub registry: Arc<ServerRegistry>,
    /// Schema bridge (C8): tool-to-function-declaration conversion and
    /// function-name routing.
    pub bridge: Arc<SchemaBridge>,
    /// LLM client manager (C9): the cached backend client.
    pub client_manager: Arc<LlmClientManager<F>>,
    /// LLM execution loop (C10): `simple`/`with_tools`.
    pub exec_loop: ExecutionLoop<F>,
    llm_config: RwLock<LlmConfig>,
    cooldowns: Mutex<HashMap<String, Instant>>,
}

impl McpForge<GeminiBackendFactory> {
    /// Build against the real Gemini REST backend.
    #[must_use]
    pub fn new(llm_config: LlmConfig) -> Self {
        Self::with_backend_factory(llm_config, GeminiBackendFactory)
    }
}

impl<F: LlmBackendFactory> McpForge<F> {
    /// Build against an arbitrary backend factory (tests use a fake here).
    #[must_use]
    pub fn with_backend_factory(llm_config: LlmConfig, factory: F) -> Self {
        let registry = Arc::new(ServerRegistry::new());
        let bridge = Arc::new(SchemaBridge::new());
        let client_manager = Arc::new(LlmClientManager::new(factory));
        let exec_loop = ExecutionLoop::new(Arc::clone(&client_manager), Arc::clone(&bridge), Arc::clone(&registry));
        Self {
            registry,
            bridge,
            client_manager,
            exec_loop,
            llm_config: RwLock::new(llm_config),
            cooldowns: Mutex::new(HashMap::new()),
        }
    }

    /// Register every persisted server (skipping, with a warning, any entry
    /// that fails validation) and connect the `autoConnect` ones (§4.1,
    /// §4.4's `connectAutoConnect`).
    pub async fn load_config(&self, blob: &ConfigBlob) {
        for server in &blob.servers {
            if let Err(e) = self.registry.add(server.clone()).await {
                warn!(server = %server.name, error = %e, "skipping invalid persisted server config");
            }
        }
        self.registry.connect_auto_connect().await;
        *self.llm_config.write().await = blob.gemini.clone();
    }

    /// The live LLM config, as last loaded or set.
    pub async fn llm_config(&self) -> LlmConfig {
        self.llm_config.read().await.clone()
    }

    /// Replace the live LLM config, invalidating the cached client so the
    /// next call rebuilds against it (§4.9).
    pub async fn set_llm_config(&self, config: LlmConfig) {
        *self.llm_config.write().await = config;
        self.client_manager.invalidate().await;
    }

    /// Disconnect every server and drop the cached LLM client. Best-effort;
    /// intended for clean process shutdown.
    pub async fn shutdown(&self) {
        self.registry.disconnect_all().await;
        self.client_manager.invalidate().await;
    }

    /// Gate `caller` against [`GEMINI_COMMAND_COOLDOWN`]. Returns the
    /// remaining wait if the cooldown is still active, recording this call
    /// as the new baseline only when it is not.
    pub(crate) async fn check_cooldown(&self, caller: &str) -> Option<Duration> {
        let mut cooldowns = self.cooldowns.lock().await;
        let now = Instant::now();
        if let Some(last) = cooldowns.get(caller) {
            let elapsed = now.duration_since(*last);
            if elapsed < GEMINI_COMMAND_COOLDOWN {
                return Some(GEMINI_COMMAND_COOLDOWN - elapsed);
            }
        }
        cooldowns.insert(caller.to_string(), now);
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use mcpforge_config::ServerConfig;
    use mcpforge_llm::{GenerateRequest, GenerateResponse, LlmBackend, LlmResult, Turn};

    struct FakeBackend;
    #[async_trait]
    impl LlmBackend for FakeBackend {
        async fn generate_content(&self, _history: &[Turn], _request: &GenerateRequest) -> LlmResult<GenerateResponse> {
            Ok(GenerateResponse { text: Some("ok".to_string()), function_calls: vec![] })
        }
    }

    struct FakeFactory;
    #[async_trait]
    impl LlmBackendFactory for FakeFactory {
        async fn build(&self, _config: &LlmConfig) -> LlmResult<Arc<dyn LlmBackend>> {
            Ok(Arc::new(FakeBackend))
        }
    }

    #[tokio::test]
    async fn load_config_skips_invalid_entries_and_adopts_llm_config() {
        let app = McpForge::with_backend_factory(LlmConfig::default(), FakeFactory);
        let mut blob = ConfigBlob::default();
        blob.servers.push(ServerConfig::stdio("weather", "npx"));
        blob.servers.push(ServerConfig::stdio(String::new(), "npx")); // invalid: empty name
        blob.gemini = LlmConfig::default().with_enabled(true).with_api_key("key");

        app.load_config(&blob).await;

        assert_eq!(app.registry.list_configs().iter().filter(|c| c.name == "weather").count(), 1);
        assert!(app.llm_config().await.is_configured());
    }

    #[tokio::test]
    async fn cooldown_blocks_second_call_from_same_caller_within_window() {
        let app = McpForge::with_backend_factory(LlmConfig::default(), FakeFactory);
        assert!(app.check_cooldown("alice").await.is_none());
        assert!(app.check_cooldown("alice").await.is_some());
        assert!(app.check_cooldown("bob").await.is_none());
    }
}
