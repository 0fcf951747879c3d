//! Wire-agnostic request/response/history types for the LLM bridge
//! (§3 "Conversation History", §4.8, §4.10).

use serde_json::{Map, Value};

use mcpforge_config::ModelId;

/// An LLM-facing description of a callable MCP tool (§4.8 "function
/// declaration"), the output of the schema bridge's conversion step.
#[derive(Debug, Clone)]
pub struct FunctionDeclaration {
    /// Routed function name (§4.8 "RoutedFunctionName").
    pub name: String,
    /// Tool description, carried through unchanged.
    pub description: Option<String>,
    /// Converted JSON-Schema parameters object.
    pub parameters: Value,
}

/// A single function call emitted by the model in one turn.
#[derive(Debug, Clone)]
pub struct FunctionCall {
    /// The function name as the model wrote it (pre-routing).
    pub name: String,
    /// Call arguments.
    pub arguments: Map<String, Value>,
}

/// The model's content for one turn: free text, function calls, or both.
#[derive(Debug, Clone, Default)]
pub struct ModelContent {
    /// Text the model produced, if any.
    pub text: Option<String>,
    /// Function calls the model requested, in order.
    pub function_calls: Vec<FunctionCall>,
}

/// One entry in the append-only conversation history (§3).
#[derive(Debug, Clone)]
pub enum Turn {
    /// A user text part.
    User(String),
    /// A model text-or-function-call content.
    Model(ModelContent),
    /// A function-response part, keyed by the routed function name.
    FunctionResponse {
        /// Routed function name the response answers.
        name: String,
        /// Response payload (§4.10's payload construction rules).
        payload: Value,
    },
}

impl Turn {
    /// Build a user turn from plain text.
    pub fn user(text: impl Into<String>) -> Self {
        Self::User(text.into())
    }
}

/// Parameters shared by every `generateContent` call (§4.10 "base
/// request").
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    /// Model to target.
    pub model_id: ModelId,
    /// Maximum output tokens.
    pub max_output_tokens: u32,
    /// Sampling temperature.
    pub temperature: f64,
    /// Function declarations offered this call, empty for `simple`.
    pub tools: Vec<FunctionDeclaration>,
}

impl GenerateRequest {
    /// A request carrying no tool declarations (§4.10 "Simple").
    #[must_use]
    pub fn simple(model_id: ModelId, max_output_tokens: u32, temperature: f64) -> Self {
        Self { model_id, max_output_tokens, temperature, tools: Vec::new() }
    }
}

/// The result of one `generateContent` call.
#[derive(Debug, Clone, Default)]
pub struct GenerateResponse {
    /// Extracted text, if the response carried any.
    pub text: Option<String>,
    /// Function calls the model requested this turn.
    pub function_calls: Vec<FunctionCall>,
}

impl GenerateResponse {
    /// Whether the model asked to call any functions this turn (§4.10 step
    /// "If the response carries no function calls...").
    #[must_use]
    pub fn has_function_calls(&self) -> bool {
        !self.function_calls.is_empty()
    }
}

/// Record of one tool invocation made during a `withTools` loop (§4.10).
#[derive(Debug, Clone)]
pub struct ToolCallInfo {
    /// Server the tool belongs to.
    pub server: String,
    /// Tool name.
    pub tool: String,
    /// Wall-clock duration of the call.
    pub duration_ms: u64,
    /// Whether the call succeeded.
    pub success: bool,
    /// Error message, if it did not.
    pub error_message: Option<String>,
}

/// The result of a `withTools` invocation (§4.10).
#[derive(Debug, Clone)]
pub struct ToolLoopResult {
    /// Final text answer (or a warning sentinel, §7).
    pub text: String,
    /// Every tool call made while producing it, in order.
    pub tool_calls: Vec<ToolCallInfo>,
}
