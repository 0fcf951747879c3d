//! Schema Bridge (C8, §4.8).
//!
//! Converts MCP tool descriptors into LLM function declarations and keeps
//! the `functionName → (server, tool)` routing table that later resolves a
//! model's function call back to the connection that should serve it. The
//! table is a [`DashMap`] rather than anything behind the structural lock:
//! it must survive across many LLM invocations and is read far more often
//! than it is written (Design Notes, "must survive across multiple LLM
//! invocations").

use dashmap::DashMap;
use serde_json::{Map, Value};

use mcpforge_core::ToolDescriptor;

use crate::types::FunctionDeclaration;

const MAX_SEGMENT_LEN: usize = 32;
const MAX_FUNCTION_NAME_LEN: usize = 64;

const PRESERVED_SCHEMA_KEYS: &[&str] = &[
    "type",
    "description",
    "title",
    "format",
    "default",
    "example",
    "required",
    "anyOf",
    "minimum",
    "maximum",
    "minItems",
    "maxItems",
    "minLength",
    "maxLength",
    "minProperties",
    "maxProperties",
    "nullable",
    "propertyOrdering",
];

/// Converts tool descriptors to function declarations and routes calls back.
pub struct SchemaBridge {
    routes: DashMap<String, (String, String)>,
    reverse: DashMap<(String, String), String>,
}

impl SchemaBridge {
    /// An empty bridge with no routes yet established.
    #[must_use]
    pub fn new() -> Self {
        Self { routes: DashMap::new(), reverse: DashMap::new() }
    }

    /// Build a [`FunctionDeclaration`] for `tool`, registering (or reusing)
    /// its routed function name.
    #[must_use]
    pub fn declare(&self, tool: &ToolDescriptor) -> FunctionDeclaration {
        let name = self.register(&tool.server, &tool.name);
        FunctionDeclaration { name, description: tool.description.clone(), parameters: convert_schema(&tool.input_schema) }
    }

    /// Register `(server, tool)`, returning its routed function name. A
    /// prior registration for the same pair reuses its existing name (§4.8
    /// "Collisions for the *same* (server,tool) reuse the existing name").
    pub fn register(&self, server: &str, tool: &str) -> String {
        let key = (server.to_string(), tool.to_string());
        if let Some(existing) = self.reverse.get(&key) {
            return existing.clone();
        }

        let base = truncate_chars(&format!("{}_{}", sanitize_segment(server), sanitize_segment(tool)), MAX_FUNCTION_NAME_LEN);
        let mut candidate = base.clone();
        let mut suffix = 0u32;
        while let Some(occupied) = self.routes.get(&candidate) {
            if *occupied == key {
                break;
            }
            suffix = suffix.saturating_add(1);
            let suffix_str = format!("_{suffix}");
            let budget = MAX_FUNCTION_NAME_LEN.saturating_sub(suffix_str.len());
            candidate = format!("{}{suffix_str}", truncate_chars(&base, budget));
        }

        self.routes.insert(candidate.clone(), key.clone());
        self.reverse.insert(key, candidate.clone());
        candidate
    }

    /// Resolve a routed (or raw) function name back to `(server, tool)`
    /// (§4.8 "Routing"). Falls back to splitting on the first `_` when the
    /// name is not in the table, which recovers names the model echoes back
    /// verbatim without ever having gone through [`Self::declare`].
    #[must_use]
    pub fn resolve(&self, function_name: &str) -> Option<(String, String)> {
        if let Some(entry) = self.routes.get(function_name) {
            return Some(entry.clone());
        }
        let (server, tool) = function_name.split_once('_')?;
        if server.is_empty() || tool.is_empty() {
            return None;
        }
        Some((server.to_string(), tool.to_string()))
    }
}

impl Default for SchemaBridge {
    fn default() -> Self {
        Self::new()
    }
}

fn sanitize_segment(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut last_was_underscore = false;
    for c in input.chars() {
        let keep = c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '-';
        let emitted = if keep { c } else { '_' };
        if emitted == '_' && last_was_underscore {
            continue;
        }
        last_was_underscore = emitted == '_';
        out.push(emitted);
    }

    let needs_prefix = out.chars().next().is_none_or(|c| !(c.is_ascii_alphabetic() || c == '_'));
    let prefixed = if needs_prefix { format!("_{out}") } else { out };
    truncate_chars(&prefixed, MAX_SEGMENT_LEN)
}

fn truncate_chars(input: &str, max_len: usize) -> String {
    input.chars().take(max_len).collect()
}

/// Walk an MCP `inputSchema` and produce its LLM-facing equivalent (§4.8
/// "Schema conversion"). Both sides are represented as a common JSON
/// `Schema` value (Design Notes), so this is a pure tree transform rather
/// than a class-hierarchy conversion.
#[must_use]
pub fn convert_schema(input_schema: &Value) -> Value {
    let mut converted = convert_node(input_schema);
    let Value::Object(map) = &mut converted else {
        unreachable!("convert_node always returns an object");
    };
    map.insert("type".to_string(), Value::String("object".to_string()));
    map.entry("properties").or_insert_with(|| Value::Object(Map::new()));
    converted
}

fn convert_node(input: &Value) -> Value {
    let Some(obj) = input.as_object() else {
        return Value::Object(Map::new());
    };

    let mut out = Map::new();
    for key in PRESERVED_SCHEMA_KEYS {
        if let Some(value) = obj.get(*key) {
            let converted = if *key == "enum" { convert_enum(value) } else { value.clone() };
            out.insert((*key).to_string(), converted);
        }
    }

    if let Some(Value::Object(properties)) = obj.get("properties") {
        let mut converted_properties = Map::new();
        for (name, schema) in properties {
            converted_properties.insert(name.clone(), convert_node(schema));
        }
        out.insert("properties".to_string(), Value::Object(converted_properties));
    }

    if let Some(items) = obj.get("items") {
        out.insert("items".to_string(), convert_node(items));
    }

    if let Some(value) = obj.get("enum") {
        out.insert("enum".to_string(), convert_enum(value));
    }

    if !out.contains_key("type") {
        let synthesized = if out.contains_key("properties") {
            "object"
        } else if out.contains_key("items") {
            "array"
        } else {
            "string"
        };
        out.insert("type".to_string(), Value::String(synthesized.to_string()));
    }

    Value::Object(out)
}

fn convert_enum(value: &Value) -> Value {
    let Some(items) = value.as_array() else {
        return value.clone();
    };
    Value::Array(items.iter().map(|item| Value::String(stringify_scalar(item))).collect())
}

fn stringify_scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool(server: &str, name: &str) -> ToolDescriptor {
        ToolDescriptor {
            name: name.to_string(),
            server: server.to_string(),
            description: Some("desc".to_string()),
            input_schema: serde_json::json!({
                "properties": {"location": {"type": "string"}},
                "required": ["location"],
            }),
        }
    }

    #[test]
    fn sanitizes_and_joins_server_and_tool() {
        let bridge = SchemaBridge::new();
        assert_eq!(bridge.register("weather", "get_forecast"), "weather_get_forecast");
    }

    #[test]
    fn invalid_characters_replaced_and_runs_collapsed() {
        let bridge = SchemaBridge::new();
        let name = bridge.register("my server", "tool/name");
        assert_eq!(name, "my_server_tool_name");
    }

    #[test]
    fn adjacent_invalid_characters_collapse_to_one_underscore() {
        let bridge = SchemaBridge::new();
        // Trailing "!!" in the server segment collapses to a single "_"
        // before the joiner adds its own, so the middle run is two chars.
        let name = bridge.register("weather!!", "forecast");
        assert_eq!(name, "weather__forecast");
    }

    #[test]
    fn same_pair_reuses_existing_name() {
        let bridge = SchemaBridge::new();
        let first = bridge.register("weather", "get_forecast");
        let second = bridge.register("weather", "get_forecast");
        assert_eq!(first, second);
    }

    #[test]
    fn colliding_pairs_get_numeric_suffix() {
        let bridge = SchemaBridge::new();
        // Two different servers that sanitize to the same base name.
        let first = bridge.register("weather#1", "get_forecast");
        let second = bridge.register("weather@1", "get_forecast");
        assert_eq!(first, "weather_1_get_forecast");
        assert_eq!(second, "weather_1_get_forecast_1");
    }

    #[test]
    fn resolve_looks_up_registered_route() {
        let bridge = SchemaBridge::new();
        let name = bridge.register("weather", "get_forecast");
        assert_eq!(bridge.resolve(&name), Some(("weather".to_string(), "get_forecast".to_string())));
    }

    #[test]
    fn resolve_falls_back_to_splitting_on_first_underscore() {
        let bridge = SchemaBridge::new();
        assert_eq!(bridge.resolve("weather_get_forecast"), Some(("weather".to_string(), "get_forecast".to_string())));
    }

    #[test]
    fn resolve_rejects_names_with_no_underscore() {
        let bridge = SchemaBridge::new();
        assert_eq!(bridge.resolve("noseparator"), None);
    }

    #[test]
    fn declare_produces_object_root_with_properties() {
        let bridge = SchemaBridge::new();
        let declaration = bridge.declare(&tool("weather", "get_forecast"));
        assert_eq!(declaration.name, "weather_get_forecast");
        assert_eq!(declaration.parameters["type"], "object");
        assert_eq!(declaration.parameters["properties"]["location"]["type"], "string");
        assert_eq!(declaration.parameters["required"][0], "location");
    }

    #[test]
    fn properties_without_explicit_type_synthesize_object() {
        let schema = serde_json::json!({"properties": {"a": {"type": "string"}}});
        let converted = convert_schema(&schema);
        assert_eq!(converted["type"], "object");
    }

    #[test]
    fn items_without_explicit_type_synthesize_array_for_nested_schema() {
        let schema = serde_json::json!({
            "properties": {"tags": {"items": {"type": "string"}}},
        });
        let converted = convert_schema(&schema);
        assert_eq!(converted["properties"]["tags"]["type"], "array");
    }

    #[test]
    fn enum_values_are_stringified() {
        let schema = serde_json::json!({"properties": {"count": {"enum": [1, 2, 3]}}});
        let converted = convert_schema(&schema);
        assert_eq!(converted["properties"]["count"]["enum"], serde_json::json!(["1", "2", "3"]));
    }

    #[test]
    fn root_always_resolves_to_object() {
        let schema = serde_json::json!({"type": "string"});
        let converted = convert_schema(&schema);
        assert_eq!(converted["type"], "object");
    }
}
