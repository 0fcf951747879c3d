//! A single textual command bound to one `(server, tool)` pair (§4.7).

use crate::parse::{ParamSpec, param_specs, usage_string};
use mcpforge_core::ToolDescriptor;

/// Everything needed to parse, validate, and describe one `<server>:<tool>`
/// command.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    /// Owning server.
    pub server: String,
    /// Tool name.
    pub tool: String,
    /// Tool description, shown by `help`.
    pub description: Option<String>,
    /// Parameters in schema declaration order.
    pub params: Vec<ParamSpec>,
    /// Required parameter names.
    pub required: Vec<String>,
}

impl CommandSpec {
    /// Build from a tool descriptor (§4.7 "for each of its tools, register
    /// one textual command named `<server>:<tool>`").
    #[must_use]
    pub fn from_tool(tool: &ToolDescriptor) -> Self {
        Self {
            server: tool.server.clone(),
            tool: tool.name.clone(),
            description: tool.description.clone(),
            params: param_specs(&tool.properties()),
            required: tool.required(),
        }
    }

    /// `"<server>:<tool>"`, the command-surface identifier.
    #[must_use]
    pub fn name(&self) -> String {
        format!("{}:{}", self.server, self.tool)
    }

    /// `<req:type> [opt:type]` usage string in `properties` order.
    #[must_use]
    pub fn usage(&self) -> String {
        usage_string(&self.params, &self.required)
    }

    /// `help` subcommand rendering: description, usage, and per-parameter
    /// lines `* name (type) description`, `*` marking required (§6).
    #[must_use]
    pub fn help_text(&self) -> String {
        let mut lines = Vec::new();
        if let Some(desc) = &self.description {
            lines.push(desc.clone());
        }
        lines.push(format!("Usage: {} {}", self.name(), self.usage()));
        for param in &self.params {
            let marker = if self.required.iter().any(|r| r == &param.name) { "*" } else { " " };
            let desc = param.description.as_deref().unwrap_or("");
            lines.push(format!("{marker} {} ({}) {desc}", param.name, param.schema_type).trim_end().to_string());
        }
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn forecast_tool() -> ToolDescriptor {
        ToolDescriptor {
            name: "get_forecast".to_string(),
            server: "weather".to_string(),
            description: Some("Get a weather forecast".to_string()),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "location": {"type": "string", "description": "City name"},
                    "days": {"type": "integer", "description": "Forecast horizon"},
                },
                "required": ["location"],
            }),
        }
    }

    #[test]
    fn command_name_is_server_colon_tool() {
        assert_eq!(CommandSpec::from_tool(&forecast_tool()).name(), "weather:get_forecast");
    }

    #[test]
    fn usage_matches_s4() {
        assert_eq!(CommandSpec::from_tool(&forecast_tool()).usage(), "<location:string> [days:integer]");
    }

    #[test]
    fn help_text_marks_required_with_asterisk() {
        let help = CommandSpec::from_tool(&forecast_tool()).help_text();
        assert!(help.contains("* location (string) City name"));
        assert!(help.contains("  days (integer) Forecast horizon"));
    }
}
