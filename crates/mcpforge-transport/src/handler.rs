//! Minimal `rmcp::ClientHandler` used for the MCP initialize handshake.
//!
//! This workspace has no use for server-initiated sampling, roots, or
//! elicitation requests, so every capability advertised here is `None` and
//! the trait's default method bodies (which all reject/no-op) are left
//! untouched.

use rmcp::ClientHandler;
use rmcp::model::{ClientCapabilities, ClientInfo, Implementation};

/// Identifies this process to the MCP server during the handshake.
#[derive(Debug, Clone, Default)]
pub(crate) struct McpClientHandler;

impl ClientHandler for McpClientHandler {
    fn get_info(&self) -> ClientInfo {
        ClientInfo {
            meta: None,
            protocol_version: Default::default(),
            capabilities: ClientCapabilities::default(),
            client_info: Implementation {
                name: "mcpforge".to_string(),
                title: Some("MCP Integration Core".to_string()),
                version: env!("CARGO_PKG_VERSION").to_string(),
                description: None,
                icons: None,
                website_url: None,
            },
        }
    }
}
