//! Conversions from `rmcp` wire types to the workspace's transport-agnostic
//! types (§3, Design Notes "represent MCP content as a tagged variant").

use mcpforge_core::{
    Content, PromptArgument, PromptDescriptor, ResourceContent, ResourceDescriptor,
    ServerCapabilities, ServerInfo, ToolDescriptor, ToolOutcome,
};
use rmcp::model::{self as rmcp_model, RawContent};

/// Build a [`ToolDescriptor`] from an `rmcp::model::Tool` and the owning
/// server's name.
pub(crate) fn tool_descriptor_from_rmcp(tool: &rmcp_model::Tool, server: &str) -> ToolDescriptor {
    ToolDescriptor {
        name: tool.name.to_string(),
        server: server.to_string(),
        description: tool.description.as_deref().map(str::to_string),
        input_schema: serde_json::to_value(&*tool.input_schema)
            .unwrap_or_else(|_| serde_json::json!({"type": "object"})),
    }
}

pub(crate) fn server_info_from_rmcp(info: &rmcp_model::InitializeResult, name: &str) -> ServerInfo {
    ServerInfo {
        name: name.to_string(),
        protocol_version: info.protocol_version.to_string(),
        capabilities: ServerCapabilities {
            tools: info.capabilities.tools.is_some(),
            resources: info.capabilities.resources.is_some(),
            prompts: info.capabilities.prompts.is_some(),
        },
        instructions: info.instructions.clone(),
    }
}

fn content_from_rmcp(content: &rmcp_model::Content) -> Content {
    match &**content {
        RawContent::Text(text) => Content::Text { text: text.text.clone() },
        RawContent::Image(image) => Content::Image {
            data: image.data.clone(),
            mime_type: image.mime_type.clone(),
        },
        RawContent::Audio(audio) => Content::Audio {
            data: audio.data.clone(),
            mime_type: audio.mime_type.clone(),
        },
        RawContent::Resource(embedded) => match &embedded.resource {
            rmcp_model::ResourceContents::TextResourceContents { uri, mime_type, text, .. } => {
                Content::Resource { uri: uri.clone(), data: Some(text.clone()), mime_type: mime_type.clone() }
            },
            rmcp_model::ResourceContents::BlobResourceContents { uri, mime_type, blob, .. } => {
                Content::Resource { uri: uri.clone(), data: Some(blob.clone()), mime_type: mime_type.clone() }
            },
        },
        RawContent::ResourceLink(link) => {
            Content::Resource { uri: link.uri.clone(), data: None, mime_type: link.mime_type.clone() }
        },
    }
}

/// Build a [`ToolOutcome`] from an `rmcp` `CallToolResult` (§3, §6).
pub(crate) fn tool_outcome_from_rmcp(result: rmcp_model::CallToolResult) -> ToolOutcome {
    ToolOutcome {
        content: result.content.iter().map(content_from_rmcp).collect(),
        structured: result.structured_content.clone(),
        meta: result.meta.clone().map(|m| serde_json::to_value(m).unwrap_or(serde_json::Value::Null)),
        is_error: result.is_error.unwrap_or(false),
    }
}

/// Build a [`ResourceDescriptor`] from an `rmcp::model::Resource` (supplemental feature #1).
pub(crate) fn resource_descriptor_from_rmcp(resource: &rmcp_model::Resource, server: &str) -> ResourceDescriptor {
    ResourceDescriptor {
        uri: resource.uri.clone(),
        server: server.to_string(),
        name: resource.name.clone(),
        description: resource.description.clone(),
        mime_type: resource.mime_type.clone(),
    }
}

/// Build a [`ResourceContent`] from an `rmcp::model::ResourceContents`.
pub(crate) fn resource_content_from_rmcp(contents: &rmcp_model::ResourceContents) -> ResourceContent {
    match contents {
        rmcp_model::ResourceContents::TextResourceContents { uri, mime_type, text, .. } => {
            ResourceContent { uri: uri.clone(), text: Some(text.clone()), blob: None, mime_type: mime_type.clone() }
        },
        rmcp_model::ResourceContents::BlobResourceContents { uri, mime_type, blob, .. } => {
            ResourceContent { uri: uri.clone(), text: None, blob: Some(blob.clone()), mime_type: mime_type.clone() }
        },
    }
}

/// Build a [`PromptDescriptor`] from an `rmcp::model::Prompt` (supplemental feature #1).
pub(crate) fn prompt_descriptor_from_rmcp(prompt: &rmcp_model::Prompt, server: &str) -> PromptDescriptor {
    PromptDescriptor {
        name: prompt.name.clone(),
        server: server.to_string(),
        description: prompt.description.clone(),
        arguments: prompt
            .arguments
            .as_ref()
            .map(|args| {
                args.iter()
                    .map(|a| PromptArgument {
                        name: a.name.clone(),
                        description: a.description.clone(),
                        required: a.required.unwrap_or(false),
                    })
                    .collect()
            })
            .unwrap_or_default(),
    }
}

/// Render a `GetPromptResult` into `(role, text)` pairs.
pub(crate) fn prompt_content_from_rmcp(result: &rmcp_model::GetPromptResult) -> Vec<(String, String)> {
    result
        .messages
        .iter()
        .map(|m| {
            let role = match m.role {
                rmcp_model::PromptMessageRole::User => "user",
                rmcp_model::PromptMessageRole::Assistant => "assistant",
            };
            let text = match &m.content {
                rmcp_model::PromptMessageContent::Text { text } => text.clone(),
                rmcp_model::PromptMessageContent::Image { image } => format!("[image: {}]", image.mime_type),
                rmcp_model::PromptMessageContent::Resource { resource } => resource.get_text(),
                rmcp_model::PromptMessageContent::ResourceLink { link } => format!("[resource: {}]", link.uri),
            };
            (role.to_string(), text)
        })
        .collect()
}
