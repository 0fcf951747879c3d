//! Shared types for the MCP integration core: error kinds and the tagged
//! content/outcome representation used by every other crate in this
//! workspace.
//!
//! Tool input/output JSON-Schema is represented directly as
//! [`serde_json::Value`] rather than a bespoke `Schema` type — a JSON value
//! already *is* the common representation the design notes call for, and
//! that's what the MCP wire format and the LLM function-declaration format
//! both serialize to.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod content;
mod error;
mod types;

pub use content::{Content, ToolOutcome};
pub use error::{McpForgeError, McpForgeResult};
pub use types::{
    PromptArgument, PromptDescriptor, PromptMessage, ResourceContent, ResourceDescriptor,
    ServerCapabilities, ServerInfo, ToolDescriptor,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_outcome_text_renders_single_line() {
        let outcome = ToolOutcome::text("Tokyo: sunny, 25C");
        assert_eq!(outcome.render_for_script(), "Tokyo: sunny, 25C");
    }

    #[test]
    fn tool_outcome_multi_text_joins_with_newline() {
        let outcome = ToolOutcome {
            content: vec![
                Content::Text { text: "line one".into() },
                Content::Text { text: "line two".into() },
            ],
            ..ToolOutcome::default()
        };
        assert_eq!(outcome.render_for_script(), "line one\nline two");
    }

    #[test]
    fn tool_outcome_error_renders_with_prefix() {
        let outcome = ToolOutcome::error("boom");
        assert_eq!(outcome.render_for_script(), "Error: boom");
        assert_eq!(outcome.render_for_command(), "Tool Error: boom");
    }

    #[test]
    fn tool_outcome_image_renders_opaque_data() {
        let outcome = ToolOutcome {
            content: vec![Content::Image {
                data: "base64blob".into(),
                mime_type: "image/png".into(),
            }],
            ..ToolOutcome::default()
        };
        assert_eq!(outcome.render_for_script(), "base64blob");
    }
}
