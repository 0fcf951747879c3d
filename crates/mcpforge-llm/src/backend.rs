//! LLM backend client trait and a concrete Gemini implementation (§4.9,
//! §6 "gemini" config section).
//!
//! Grounded on the teacher's `ClaudeProvider`: a thin `reqwest::Client`
//! wrapper that builds one JSON body per call, and a `build_request`/
//! `parse_response` pair isolating the wire format from the rest of the
//! crate. Applied here to the Gemini REST API rather than Anthropic's,
//! since the persisted config (§6) only ever names a `gemini` model.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use mcpforge_config::{LlmConfig, ModelId};

use crate::error::{LlmError, LlmResult};
use crate::types::{FunctionCall, GenerateRequest, GenerateResponse, Turn};

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// A constructed, ready-to-use LLM client (§4.9 "cached client").
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Issue one `generateContent` call over `history` with `request`'s
    /// model/tuning/tool parameters.
    async fn generate_content(&self, history: &[Turn], request: &GenerateRequest) -> LlmResult<GenerateResponse>;

    /// Release any held resources. Best-effort; errors are not surfaced
    /// (§4.9 "closing the old client best-effort").
    async fn close(&self) {}
}

/// Builds [`LlmBackend`] clients from an [`LlmConfig`] (§4.9's client
/// construction step, factored out so [`crate::manager::LlmClientManager`]
/// can be tested against a fake).
#[async_trait]
pub trait LlmBackendFactory: Send + Sync {
    /// Build a backend for `config`.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::ApiKeyMissing`] if `config` carries no API key.
    async fn build(&self, config: &LlmConfig) -> LlmResult<std::sync::Arc<dyn LlmBackend>>;
}

/// Builds [`GeminiBackend`] clients.
pub struct GeminiBackendFactory;

#[async_trait]
impl LlmBackendFactory for GeminiBackendFactory {
    async fn build(&self, config: &LlmConfig) -> LlmResult<std::sync::Arc<dyn LlmBackend>> {
        if config.api_key.is_empty() {
            return Err(LlmError::ApiKeyMissing);
        }
        Ok(std::sync::Arc::new(GeminiBackend::new(config.api_key.clone())))
    }
}

/// Gemini REST API client (§6 "gemini" persisted config section).
pub struct GeminiBackend {
    client: reqwest::Client,
    api_key: String,
}

impl GeminiBackend {
    /// Build a client carrying `api_key`.
    #[must_use]
    pub fn new(api_key: String) -> Self {
        Self { client: reqwest::Client::new(), api_key }
    }

    fn endpoint(model_id: ModelId) -> String {
        format!("{GEMINI_API_BASE}/{}:generateContent", model_id.as_str())
    }

    fn build_body(history: &[Turn], request: &GenerateRequest) -> Value {
        let contents: Vec<Value> = history.iter().map(turn_to_content).collect();

        let mut body = serde_json::json!({
            "contents": contents,
            "generationConfig": {
                "maxOutputTokens": request.max_output_tokens,
                "temperature": request.temperature,
            },
        });

        if !request.tools.is_empty() {
            let declarations: Vec<Value> = request
                .tools
                .iter()
                .map(|declaration| {
                    serde_json::json!({
                        "name": declaration.name,
                        "description": declaration.description.clone().unwrap_or_default(),
                        "parameters": declaration.parameters,
                    })
                })
                .collect();
            body["tools"] = serde_json::json!([{ "functionDeclarations": declarations }]);
            // Automatic function calling is a client-SDK convenience this
            // hand-rolled REST call never offers in the first place; the
            // execution loop (C10) owns invoking tools explicitly.
        }

        body
    }
}

#[async_trait]
impl LlmBackend for GeminiBackend {
    async fn generate_content(&self, history: &[Turn], request: &GenerateRequest) -> LlmResult<GenerateResponse> {
        let url = Self::endpoint(request.model_id);
        let body = Self::build_body(history, request);

        debug!(model = request.model_id.as_str(), "calling Gemini generateContent");

        let response = self.client.post(&url).query(&[("key", &self.api_key)]).json(&body).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            warn!(status = %status, body = %text, "Gemini API error");
            return Err(LlmError::ApiRequestFailed(format!("status {status}: {text}")));
        }

        let parsed: GeminiResponse =
            response.json().await.map_err(|e| LlmError::InvalidResponse(format!("failed to decode response: {e}")))?;
        Ok(parsed.into_generate_response())
    }
}

fn turn_to_content(turn: &Turn) -> Value {
    match turn {
        Turn::User(text) => serde_json::json!({"role": "user", "parts": [{"text": text}]}),
        Turn::Model(content) => {
            let mut parts = Vec::new();
            if let Some(text) = &content.text {
                parts.push(serde_json::json!({"text": text}));
            }
            for call in &content.function_calls {
                parts.push(serde_json::json!({"functionCall": {"name": call.name, "args": Value::Object(call.arguments.clone())}}));
            }
            serde_json::json!({"role": "model", "parts": parts})
        },
        Turn::FunctionResponse { name, payload } => {
            serde_json::json!({
                "role": "function",
                "parts": [{"functionResponse": {"name": name, "response": payload}}],
            })
        },
    }
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: Option<String>,
    #[serde(default, rename = "functionCall")]
    function_call: Option<GeminiFunctionCall>,
}

#[derive(Debug, Deserialize)]
struct GeminiFunctionCall {
    name: String,
    #[serde(default)]
    args: Map<String, Value>,
}

impl GeminiResponse {
    fn into_generate_response(self) -> GenerateResponse {
        let Some(candidate) = self.candidates.into_iter().next() else {
            return GenerateResponse::default();
        };
        let Some(content) = candidate.content else {
            return GenerateResponse::default();
        };

        let mut texts = Vec::new();
        let mut function_calls = Vec::new();
        for part in content.parts {
            if let Some(text) = part.text {
                if !text.is_empty() {
                    texts.push(text);
                }
            }
            if let Some(call) = part.function_call {
                function_calls.push(FunctionCall { name: call.name, arguments: call.args });
            }
        }

        GenerateResponse { text: if texts.is_empty() { None } else { Some(texts.join("\n")) }, function_calls }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_with_only_text_has_no_function_calls() {
        let response = GeminiResponse {
            candidates: vec![GeminiCandidate {
                content: Some(GeminiContent { parts: vec![GeminiPart { text: Some("hi".to_string()), function_call: None }] }),
            }],
        };
        let parsed = response.into_generate_response();
        assert_eq!(parsed.text.as_deref(), Some("hi"));
        assert!(!parsed.has_function_calls());
    }

    #[test]
    fn response_with_function_call_is_extracted() {
        let mut args = Map::new();
        args.insert("location".to_string(), Value::String("Tokyo".to_string()));
        let response = GeminiResponse {
            candidates: vec![GeminiCandidate {
                content: Some(GeminiContent {
                    parts: vec![GeminiPart {
                        text: None,
                        function_call: Some(GeminiFunctionCall { name: "weather_get_forecast".to_string(), args }),
                    }],
                }),
            }],
        };
        let parsed = response.into_generate_response();
        assert!(parsed.text.is_none());
        assert_eq!(parsed.function_calls.len(), 1);
        assert_eq!(parsed.function_calls[0].name, "weather_get_forecast");
    }

    #[test]
    fn response_with_no_candidates_is_empty() {
        let response = GeminiResponse { candidates: vec![] };
        let parsed = response.into_generate_response();
        assert!(parsed.text.is_none());
        assert!(!parsed.has_function_calls());
    }
}
