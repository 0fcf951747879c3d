//! Transport-agnostic descriptors shared by the transport, registry, script,
//! command, and LLM bridge layers (§3 "Tool descriptor").

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Description of a single MCP tool (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Tool name, unique within its server.
    pub name: String,
    /// Server this tool belongs to.
    pub server: String,
    /// Human-readable description.
    pub description: Option<String>,
    /// JSON-Schema object describing the input (`properties`, optional
    /// `required`, nested types).
    pub input_schema: Value,
}

impl ToolDescriptor {
    /// `"<server>:<tool>"`, the command-surface identifier (§4.7).
    #[must_use]
    pub fn command_name(&self) -> String {
        format!("{}:{}", self.server, self.name)
    }

    /// The `properties` map of the input schema, in declaration order, or
    /// empty if the schema has none.
    #[must_use]
    pub fn properties(&self) -> Vec<(String, Value)> {
        self.input_schema
            .get("properties")
            .and_then(Value::as_object)
            .map(|map| map.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default()
    }

    /// The `required` list of the input schema, or empty if absent.
    #[must_use]
    pub fn required(&self) -> Vec<String> {
        self.input_schema
            .get("required")
            .and_then(Value::as_array)
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Description of an MCP resource (supplemental feature #1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    /// Resource URI.
    pub uri: String,
    /// Server this resource belongs to.
    pub server: String,
    /// Human-readable name.
    pub name: String,
    /// Description.
    pub description: Option<String>,
    /// MIME type.
    pub mime_type: Option<String>,
}

/// Description of an MCP prompt (supplemental feature #1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptDescriptor {
    /// Prompt name.
    pub name: String,
    /// Server this prompt belongs to.
    pub server: String,
    /// Description.
    pub description: Option<String>,
    /// Declared arguments.
    pub arguments: Vec<PromptArgument>,
}

/// A single prompt argument.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptArgument {
    /// Argument name.
    pub name: String,
    /// Description.
    pub description: Option<String>,
    /// Whether the argument is required.
    pub required: bool,
}

/// Content of a single resource read (supplemental feature #1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceContent {
    /// Resource URI.
    pub uri: String,
    /// Text content, for text resources.
    pub text: Option<String>,
    /// Base64 blob content, for binary resources.
    pub blob: Option<String>,
    /// MIME type.
    pub mime_type: Option<String>,
}

/// A single message in a rendered prompt (supplemental feature #1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptMessage {
    /// Message role (`user` or `assistant`).
    pub role: String,
    /// Rendered text.
    pub text: String,
}

/// Server capability flags reported at handshake.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct ServerCapabilities {
    /// Server exposes tools.
    pub tools: bool,
    /// Server exposes resources.
    pub resources: bool,
    /// Server exposes prompts.
    pub prompts: bool,
}

/// Information learned during the MCP initialize handshake.
#[derive(Debug, Clone)]
pub struct ServerInfo {
    /// Server name (as configured, not reported by the server itself).
    pub name: String,
    /// Protocol version string reported by the server.
    pub protocol_version: String,
    /// Capability flags.
    pub capabilities: ServerCapabilities,
    /// Free-form instructions the server wants surfaced to an LLM.
    pub instructions: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_name_joins_server_and_tool() {
        let tool = ToolDescriptor {
            name: "get_forecast".into(),
            server: "weather".into(),
            description: None,
            input_schema: serde_json::json!({"type": "object"}),
        };
        assert_eq!(tool.command_name(), "weather:get_forecast");
    }

    #[test]
    fn properties_and_required_read_from_schema() {
        let tool = ToolDescriptor {
            name: "get_forecast".into(),
            server: "weather".into(),
            description: None,
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {"location": {"type": "string"}, "days": {"type": "integer"}},
                "required": ["location"],
            }),
        };
        assert_eq!(tool.properties().len(), 2);
        assert_eq!(tool.required(), vec!["location".to_string()]);
    }
}
