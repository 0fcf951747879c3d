//! Tagged content and schema variants shared by the transport, script, and
//! command layers.
//!
//! Per the design notes this is deliberately a flat tagged enum rather than a
//! trait-object class hierarchy — MCP content has a small, closed set of
//! shapes and every consumer (script renderer, command renderer, LLM bridge)
//! needs to pattern-match all of them anyway.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single piece of content returned by an MCP tool, resource, or prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Content {
    /// Plain text.
    Text {
        /// The text.
        text: String,
    },
    /// An embedded image.
    Image {
        /// Opaque (typically base64) image data.
        data: String,
        /// MIME type.
        mime_type: String,
    },
    /// An embedded audio clip.
    Audio {
        /// Opaque (typically base64) audio data.
        data: String,
        /// MIME type.
        mime_type: String,
    },
    /// A reference to (or embedding of) a resource.
    Resource {
        /// Resource URI.
        uri: String,
        /// Inline data, if the resource was embedded rather than linked.
        data: Option<String>,
        /// MIME type, if known.
        mime_type: Option<String>,
    },
    /// Anything not covered above; `repr` is its textual form.
    Other {
        /// Textual representation of the unrecognized content.
        repr: String,
    },
}

impl Content {
    /// Text content, if this is the `Text` variant.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            _ => None,
        }
    }

    /// The "opaque string form" used by script rendering (4.6): text as-is,
    /// image/audio data as the opaque string, everything else falls back to
    /// a bracketed description.
    #[must_use]
    pub fn render_opaque(&self) -> String {
        match self {
            Self::Text { text } => text.clone(),
            Self::Image { data, .. } | Self::Audio { data, .. } => data.clone(),
            Self::Resource { uri, data, .. } => data.clone().unwrap_or_else(|| uri.clone()),
            Self::Other { repr } => repr.clone(),
        }
    }
}

/// The outcome of invoking an MCP tool, independent of transport.
///
/// Mirrors the wire shape `{content:[…], structuredContent?, meta?, isError?}`
/// from §6, kept separate from transport-level `Err` so that a server
/// reporting `isError=true` is still a *value* callers can render (§4.2,
/// `ToolError`).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ToolOutcome {
    /// Content items returned by the tool.
    pub content: Vec<Content>,
    /// Structured payload, if the tool provided one.
    pub structured: Option<Value>,
    /// Free-form metadata attached to the result.
    pub meta: Option<Value>,
    /// Whether the server flagged this result as an error.
    pub is_error: bool,
}

impl ToolOutcome {
    /// Build a plain successful text outcome.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![Content::Text { text: text.into() }],
            structured: None,
            meta: None,
            is_error: false,
        }
    }

    /// Build an error outcome carrying a message as its sole content item.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            content: vec![Content::Text { text: message }],
            structured: None,
            meta: None,
            is_error: true,
        }
    }

    /// The error message, if any, derived from the first textual content item.
    #[must_use]
    pub fn error_message(&self) -> Option<String> {
        if !self.is_error {
            return None;
        }
        let joined = self
            .content
            .iter()
            .filter_map(Content::as_text)
            .collect::<Vec<_>>()
            .join("\n");
        Some(if joined.is_empty() {
            "Unknown error".to_string()
        } else {
            joined
        })
    }

    /// Render per §4.6: single textual item → its text; multiple items →
    /// textual items joined by newline; otherwise the first item's opaque
    /// string form. Errors become `"Error: <message>"`.
    #[must_use]
    pub fn render_for_script(&self) -> String {
        if self.is_error {
            return format!(
                "Error: {}",
                self.error_message().unwrap_or_else(|| "Unknown error".to_string())
            );
        }

        let texts: Vec<&str> = self.content.iter().filter_map(Content::as_text).collect();
        match texts.len() {
            0 => self
                .content
                .first()
                .map(Content::render_opaque)
                .unwrap_or_default(),
            1 => (*texts.first().expect("len checked above")).to_string(),
            _ => texts.join("\n"),
        }
    }

    /// Render per §4.7: script rendering plus multi-line splitting,
    /// pretty-printed structured content, `key: value` meta lines, and a
    /// `Tool Error:` prefix instead of `Error:`.
    #[must_use]
    pub fn render_for_command(&self) -> String {
        if self.is_error {
            return format!(
                "Tool Error: {}",
                self.error_message().unwrap_or_else(|| "Unknown error".to_string())
            );
        }

        let mut lines = Vec::new();

        for item in &self.content {
            match item {
                Content::Text { text } => lines.extend(text.lines().map(str::to_string)),
                other => lines.push(other.render_opaque()),
            }
        }

        if let Some(structured) = &self.structured {
            if let Ok(pretty) = serde_json::to_string_pretty(structured) {
                lines.push(pretty);
            }
        }

        if let Some(Value::Object(map)) = &self.meta {
            for (key, value) in map {
                lines.push(format!("{key}: {value}"));
            }
        }

        lines.join("\n")
    }

    /// Render per §4.10's function-response payload: `structuredContent`
    /// passed through, textual content flattened into `content`, `meta`
    /// copied under its own key, `error:true` set if flagged. An outcome
    /// with nothing to show becomes `{message:"Tool completed without
    /// returning data."}`.
    #[must_use]
    pub fn to_function_response_payload(&self) -> Value {
        if self.is_error {
            return Value::Object(Map::from_iter([
                ("error".to_string(), Value::Bool(true)),
                (
                    "message".to_string(),
                    Value::String(self.error_message().unwrap_or_else(|| "Unknown error".to_string())),
                ),
            ]));
        }

        let mut map = Map::new();
        let texts: Vec<&str> = self.content.iter().filter_map(Content::as_text).collect();
        if !texts.is_empty() {
            map.insert("content".to_string(), Value::String(texts.join("\n")));
        }
        if let Some(structured) = &self.structured {
            map.insert("structuredContent".to_string(), structured.clone());
        }
        if let Some(meta) = &self.meta {
            map.insert("meta".to_string(), meta.clone());
        }
        if map.is_empty() {
            map.insert("message".to_string(), Value::String("Tool completed without returning data.".to_string()));
        }
        Value::Object(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn function_response_payload_flattens_text_and_passes_structured_through() {
        let outcome = ToolOutcome {
            content: vec![Content::Text { text: "Tokyo: sunny, 25C".to_string() }],
            structured: Some(serde_json::json!({"tempC": 25})),
            meta: None,
            is_error: false,
        };
        let payload = outcome.to_function_response_payload();
        assert_eq!(payload["content"], "Tokyo: sunny, 25C");
        assert_eq!(payload["structuredContent"]["tempC"], 25);
    }

    #[test]
    fn function_response_payload_for_error_sets_error_flag() {
        let outcome = ToolOutcome::error("boom");
        let payload = outcome.to_function_response_payload();
        assert_eq!(payload["error"], true);
        assert_eq!(payload["message"], "boom");
    }

    #[test]
    fn function_response_payload_for_empty_result_reports_no_data() {
        let outcome = ToolOutcome { content: vec![], structured: None, meta: None, is_error: false };
        let payload = outcome.to_function_response_payload();
        assert_eq!(payload["message"], "Tool completed without returning data.");
    }
}
