//! LLM Execution Loop (C10, §4.10).
//!
//! Two entry points: [`ExecutionLoop::simple`] for a bare prompt and
//! [`ExecutionLoop::with_tools`] for the bounded, explicit function-calling
//! loop. Automatic function calling is never delegated to the backend
//! (Design Notes "disable whatever auto-invocation the SDK offers") — every
//! call is routed, invoked, and recorded here.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tracing::warn;

use mcpforge_config::LlmConfig;
use mcpforge_registry::ServerRegistry;

use crate::backend::LlmBackendFactory;
use crate::bridge::SchemaBridge;
use crate::manager::LlmClientManager;
use crate::types::{GenerateRequest, ModelContent, ToolCallInfo, ToolLoopResult, Turn};

/// Hard cap on `generateContent` calls within one `withTools` invocation
/// (P6, §4.10 step 5, §9 "source fixes at 6").
const MAX_ITERATIONS: u32 = 6;

/// Drives prompts (with or without MCP tool access) through the cached LLM
/// client (§4.10).
pub struct ExecutionLoop<F: LlmBackendFactory> {
    client_manager: Arc<LlmClientManager<F>>,
    bridge: Arc<SchemaBridge>,
    registry: Arc<ServerRegistry>,
}

impl<F: LlmBackendFactory> ExecutionLoop<F> {
    /// Build a loop over `registry`'s connections, `bridge`'s routing table,
    /// and `client_manager`'s cached backend client.
    #[must_use]
    pub fn new(client_manager: Arc<LlmClientManager<F>>, bridge: Arc<SchemaBridge>, registry: Arc<ServerRegistry>) -> Self {
        Self { client_manager, bridge, registry }
    }

    /// A single prompt, no tool access (§4.10 "Simple").
    pub async fn simple(&self, config: &LlmConfig, prompt: &str) -> String {
        if prompt.trim().is_empty() {
            return "Error: prompt must not be blank.".to_string();
        }
        if !config.is_configured() {
            return "Error: LLM is not configured.".to_string();
        }

        let client = match self.client_manager.get_client(config).await {
            Ok(client) => client,
            Err(e) => return format!("Error: {e}"),
        };

        let request = GenerateRequest::simple(config.model_id, config.max_output_tokens, config.temperature);
        let history = vec![Turn::user(prompt)];

        match client.generate_content(&history, &request).await {
            Ok(response) => response.text.unwrap_or_else(|| "The model returned no text.".to_string()),
            Err(e) => format!("Error: {e}"),
        }
    }

    /// A prompt with MCP tool access across `server_names` (all connected
    /// servers if empty), bounded to [`MAX_ITERATIONS`] model round trips
    /// (§4.10 "With tools").
    pub async fn with_tools(&self, config: &LlmConfig, prompt: &str, server_names: &HashSet<String>) -> ToolLoopResult {
        if prompt.trim().is_empty() {
            return ToolLoopResult { text: "Error: prompt must not be blank.".to_string(), tool_calls: Vec::new() };
        }
        if !config.is_configured() {
            return ToolLoopResult { text: "Error: LLM is not configured.".to_string(), tool_calls: Vec::new() };
        }

        let targets = self.target_servers(server_names);
        let declarations = self.declarations_for(&targets).await;
        if declarations.is_empty() {
            return ToolLoopResult { text: self.simple(config, prompt).await, tool_calls: Vec::new() };
        }

        let client = match self.client_manager.get_client(config).await {
            Ok(client) => client,
            Err(e) => return ToolLoopResult { text: format!("Error: {e}"), tool_calls: Vec::new() },
        };

        let request = GenerateRequest { model_id: config.model_id, max_output_tokens: config.max_output_tokens, temperature: config.temperature, tools: declarations };
        let mut history = vec![Turn::user(prompt)];
        let mut tool_calls = Vec::new();

        for _ in 0..MAX_ITERATIONS {
            let response = match client.generate_content(&history, &request).await {
                Ok(response) => response,
                Err(e) => return ToolLoopResult { text: format!("Error: {e}"), tool_calls },
            };

            if !response.has_function_calls() {
                let text = response.text.unwrap_or_else(|| "The model returned no text.".to_string());
                return ToolLoopResult { text, tool_calls };
            }

            history.push(Turn::Model(ModelContent { text: response.text.clone(), function_calls: response.function_calls.clone() }));

            let mut executed_any = false;
            for call in &response.function_calls {
                let Some((server, tool)) = self.bridge.resolve(&call.name) else {
                    warn!(function = %call.name, "LLM requested unknown function");
                    history.push(Turn::FunctionResponse {
                        name: call.name.clone(),
                        payload: unknown_function_payload(&call.name),
                    });
                    continue;
                };

                if !self.registry.is_connected(&server) {
                    history.push(Turn::FunctionResponse {
                        name: call.name.clone(),
                        payload: not_connected_payload(&server),
                    });
                    continue;
                }

                if call.arguments.values().any(Value::is_null) {
                    history.push(Turn::FunctionResponse {
                        name: call.name.clone(),
                        payload: null_argument_payload(),
                    });
                    continue;
                }

                executed_any = true;
                let started = Instant::now();
                let outcome = self.registry.call_tool(&server, &tool, call.arguments.clone()).await;
                let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

                let (payload, info) = match outcome {
                    Ok(outcome) => {
                        let success = !outcome.is_error;
                        let error_message = outcome.error_message();
                        let payload = outcome.to_function_response_payload();
                        (payload, ToolCallInfo { server: server.clone(), tool: tool.clone(), duration_ms, success, error_message })
                    },
                    Err(e) => {
                        let message = e.to_string();
                        let payload = serde_json::json!({"error": true, "message": message});
                        (payload, ToolCallInfo { server: server.clone(), tool: tool.clone(), duration_ms, success: false, error_message: Some(message) })
                    },
                };

                tool_calls.push(info);
                history.push(Turn::FunctionResponse { name: call.name.clone(), payload });
            }

            if !executed_any {
                return ToolLoopResult {
                    text: "The model's request could not execute any MCP tools.".to_string(),
                    tool_calls,
                };
            }
        }

        ToolLoopResult { text: "The model did not finish within the allotted turns.".to_string(), tool_calls }
    }

    fn target_servers(&self, server_names: &HashSet<String>) -> Vec<String> {
        if server_names.is_empty() {
            return self.registry.connected_names();
        }
        server_names.iter().filter(|name| self.registry.is_connected(name)).cloned().collect()
    }

    async fn declarations_for(&self, servers: &[String]) -> Vec<crate::types::FunctionDeclaration> {
        let mut declarations = Vec::new();
        for server in servers {
            for tool in self.registry.tools_for(server).await {
                declarations.push(self.bridge.declare(&tool));
            }
        }
        declarations
    }
}

fn unknown_function_payload(function_name: &str) -> Value {
    serde_json::json!({"error": true, "message": format!("Unknown function requested: {function_name}")})
}

fn not_connected_payload(server: &str) -> Value {
    serde_json::json!({"error": true, "message": format!("Server '{server}' is not connected.")})
}

fn null_argument_payload() -> Value {
    serde_json::json!({"error": true, "message": "Arguments contained a null value and were rejected."})
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use mcpforge_config::ServerConfig;

    use crate::backend::{LlmBackend, LlmBackendFactory};
    use crate::error::LlmResult;
    use crate::types::GenerateResponse;
    use std::sync::Mutex;

    struct ScriptedBackend {
        responses: Mutex<Vec<GenerateResponse>>,
    }

    #[async_trait]
    impl LlmBackend for ScriptedBackend {
        async fn generate_content(&self, _history: &[Turn], _request: &GenerateRequest) -> LlmResult<GenerateResponse> {
            let mut responses = self.responses.lock().unwrap();
            Ok(if responses.is_empty() {
                GenerateResponse { text: Some("no more scripted turns".to_string()), function_calls: vec![] }
            } else {
                responses.remove(0)
            })
        }
    }

    struct ScriptedFactory {
        responses: Mutex<Option<Vec<GenerateResponse>>>,
    }

    #[async_trait]
    impl LlmBackendFactory for ScriptedFactory {
        async fn build(&self, _config: &LlmConfig) -> LlmResult<Arc<dyn LlmBackend>> {
            let responses = self.responses.lock().unwrap().take().unwrap_or_default();
            Ok(Arc::new(ScriptedBackend { responses: Mutex::new(responses) }))
        }
    }

    fn configured() -> LlmConfig {
        LlmConfig::default().with_enabled(true).with_api_key("test-key")
    }

    #[tokio::test]
    async fn simple_rejects_blank_prompt() {
        let factory = ScriptedFactory { responses: Mutex::new(Some(vec![])) };
        let manager = Arc::new(LlmClientManager::new(factory));
        let bridge = Arc::new(SchemaBridge::new());
        let registry = Arc::new(ServerRegistry::new());
        let exec_loop = ExecutionLoop::new(manager, bridge, registry);

        let result = exec_loop.simple(&configured(), "   ").await;
        assert_eq!(result, "Error: prompt must not be blank.");
    }

    #[tokio::test]
    async fn simple_reports_not_configured() {
        let factory = ScriptedFactory { responses: Mutex::new(Some(vec![])) };
        let manager = Arc::new(LlmClientManager::new(factory));
        let bridge = Arc::new(SchemaBridge::new());
        let registry = Arc::new(ServerRegistry::new());
        let exec_loop = ExecutionLoop::new(manager, bridge, registry);

        let result = exec_loop.simple(&LlmConfig::default(), "hello").await;
        assert_eq!(result, "Error: LLM is not configured.");
    }

    #[tokio::test]
    async fn with_tools_falls_back_to_simple_with_no_connected_servers() {
        let factory = ScriptedFactory {
            responses: Mutex::new(Some(vec![GenerateResponse { text: Some("plain answer".to_string()), function_calls: vec![] }])),
        };
        let manager = Arc::new(LlmClientManager::new(factory));
        let bridge = Arc::new(SchemaBridge::new());
        let registry = Arc::new(ServerRegistry::new());
        let exec_loop = ExecutionLoop::new(manager, bridge, registry);

        let result = exec_loop.with_tools(&configured(), "hi", &HashSet::new()).await;
        assert_eq!(result.text, "plain answer");
        assert!(result.tool_calls.is_empty());
    }

    #[tokio::test]
    async fn target_servers_defaults_to_connected_names_when_set_is_empty() {
        let registry = Arc::new(ServerRegistry::new());
        registry.add(ServerConfig::stdio("weather", "npx")).await.unwrap();
        let factory = ScriptedFactory { responses: Mutex::new(Some(vec![])) };
        let manager = Arc::new(LlmClientManager::new(factory));
        let exec_loop = ExecutionLoop::new(manager, Arc::new(SchemaBridge::new()), Arc::clone(&registry));

        // "weather" is registered but never connected, so neither the
        // default (empty set) nor an explicit request for it yields a
        // target — both degrade to the no-declarations fallback.
        assert!(exec_loop.target_servers(&HashSet::new()).is_empty());
        let mut requested = HashSet::new();
        requested.insert("weather".to_string());
        assert!(exec_loop.target_servers(&requested).is_empty());
    }

    #[tokio::test]
    async fn with_tools_degrades_to_simple_when_no_tool_declarations_exist() {
        // The tool-loop branch requires at least one connected server's
        // tool to produce a declaration; a registry with nothing connected
        // can never reach it and must fall back to `simple` instead,
        // carrying an empty tool-call log.
        let responses = vec![GenerateResponse { text: Some("plain answer".to_string()), function_calls: vec![] }];
        let factory = ScriptedFactory { responses: Mutex::new(Some(responses)) };
        let manager = Arc::new(LlmClientManager::new(factory));
        let bridge = Arc::new(SchemaBridge::new());
        // A prior registration in the routing table does not by itself
        // produce a declaration; only a connected server's live tool list
        // does (§4.10 step 2 "for each connected server").
        bridge.register("weather", "get_forecast");
        let registry = Arc::new(ServerRegistry::new());
        let exec_loop = ExecutionLoop::new(manager, bridge, registry);

        let mut servers = HashSet::new();
        servers.insert("weather".to_string());
        let result = exec_loop.with_tools(&configured(), "What's the weather in Tokyo?", &servers).await;
        assert_eq!(result.text, "plain answer");
        assert!(result.tool_calls.is_empty());
    }

    #[test]
    fn null_argument_payload_flags_error() {
        let payload = null_argument_payload();
        assert_eq!(payload["error"], true);
    }

    #[test]
    fn unknown_function_payload_names_the_function() {
        let payload = unknown_function_payload("weather_dance");
        assert!(payload["message"].as_str().unwrap().contains("weather_dance"));
    }

    #[test]
    fn not_connected_payload_names_the_server() {
        let payload = not_connected_payload("weather");
        assert!(payload["message"].as_str().unwrap().contains("weather"));
    }
}
