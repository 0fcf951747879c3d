//! Three-style command argument parser (§4.7).
//!
//! Detected in order: a JSON literal (`{`/`[` prefix), named (`k=v` tokens),
//! or positional (schema `properties` order). Scalar/type coercion for the
//! named and positional styles follows the schema's declared `type`.

use mcpforge_core::{McpForgeError, McpForgeResult};
use serde_json::{Map, Value};

use crate::tokenize::{tokenize, top_level_eq, unquote};

/// One property of a tool's input schema, as needed by the parser.
#[derive(Debug, Clone)]
pub struct ParamSpec {
    /// Property name.
    pub name: String,
    /// JSON-Schema `type`, defaulting to `"string"` if absent (§4.8's same
    /// synthesis rule is reused here for schema rendering consistency).
    pub schema_type: String,
    /// Human-readable description, for `help` rendering.
    pub description: Option<String>,
}

/// Build [`ParamSpec`]s from a tool's `inputSchema` in declaration order.
#[must_use]
pub fn param_specs(properties: &[(String, Value)]) -> Vec<ParamSpec> {
    properties
        .iter()
        .map(|(name, schema)| ParamSpec {
            name: name.clone(),
            schema_type: schema
                .get("type")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| "string".to_string()),
            description: schema.get("description").and_then(Value::as_str).map(str::to_string),
        })
        .collect()
}

/// Parse a command's trailing argument string into a JSON argument map,
/// per the three styles in §4.7.
///
/// # Errors
///
/// Returns [`McpForgeError::SchemaError`] if a JSON literal fails to parse,
/// or a token cannot be coerced to its schema's declared type.
pub fn parse_arguments(input: &str, params: &[ParamSpec]) -> McpForgeResult<Map<String, Value>> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(Map::new());
    }

    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        return parse_json_literal(trimmed);
    }

    let tokens = tokenize(trimmed);
    if tokens.iter().any(|t| top_level_eq(t).is_some()) {
        return parse_named(&tokens, params);
    }

    parse_positional(&tokens, params)
}

fn parse_json_literal(trimmed: &str) -> McpForgeResult<Map<String, Value>> {
    let value: Value =
        serde_json::from_str(trimmed).map_err(|e| McpForgeError::SchemaError(format!("invalid JSON literal: {e}")))?;

    match value {
        Value::Object(map) => Ok(map),
        other => {
            let mut map = Map::new();
            map.insert("value".to_string(), other);
            Ok(map)
        },
    }
}

fn parse_named(tokens: &[String], params: &[ParamSpec]) -> McpForgeResult<Map<String, Value>> {
    let mut map = Map::new();
    for token in tokens {
        let Some(eq_idx) = top_level_eq(token) else {
            return Err(McpForgeError::SchemaError(format!("expected key=value, got '{token}'")));
        };
        let key = token[..eq_idx].to_string();
        let raw_value = &token[eq_idx + 1..];
        let schema_type = params.iter().find(|p| p.name == key).map_or("string", |p| p.schema_type.as_str());
        map.insert(key, coerce(raw_value, schema_type)?);
    }
    Ok(map)
}

fn parse_positional(tokens: &[String], params: &[ParamSpec]) -> McpForgeResult<Map<String, Value>> {
    let mut map = Map::new();
    for (token, param) in tokens.iter().zip(params) {
        map.insert(param.name.clone(), coerce(token, &param.schema_type)?);
    }
    Ok(map)
}

/// Coerce a single token to `schema_type` (§4.7 "Number parsing supports
/// decimal and `0x` hex integers; boolean accepts...; `array`/`object` types
/// re-parse the token as JSON").
///
/// # Errors
///
/// Returns [`McpForgeError::SchemaError`] if `token` cannot be interpreted
/// as `schema_type`.
pub fn coerce(token: &str, schema_type: &str) -> McpForgeResult<Value> {
    match schema_type {
        "integer" => parse_integer(token).map(Value::from),
        "number" => parse_number(token).map(Value::from),
        "boolean" => parse_boolean(token).map(Value::Bool),
        "array" | "object" => serde_json::from_str(token)
            .map_err(|e| McpForgeError::SchemaError(format!("cannot parse '{token}' as {schema_type}: {e}"))),
        _ => Ok(Value::String(unquote(token))),
    }
}

fn parse_integer(token: &str) -> McpForgeResult<i64> {
    let trimmed = token.trim();
    let (negative, digits) = trimmed.strip_prefix('-').map_or((false, trimmed), |rest| (true, rest));
    let parsed = if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16)
    } else {
        digits.parse::<i64>()
    }
    .map_err(|_| McpForgeError::SchemaError(format!("'{token}' is not a valid integer")))?;
    Ok(if negative { -parsed } else { parsed })
}

fn parse_number(token: &str) -> McpForgeResult<f64> {
    token.trim().parse::<f64>().map_err(|_| McpForgeError::SchemaError(format!("'{token}' is not a valid number")))
}

fn parse_boolean(token: &str) -> McpForgeResult<bool> {
    match token.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(McpForgeError::SchemaError(format!("'{token}' is not a valid boolean"))),
    }
}

/// Every name in `required` that is missing from `arguments`.
#[must_use]
pub fn missing_required<'a>(arguments: &Map<String, Value>, required: &'a [String]) -> Vec<&'a str> {
    required.iter().filter(|name| !arguments.contains_key(name.as_str())).map(String::as_str).collect()
}

/// Build the `<req:type> [opt:type]` usage string, in `properties` order
/// (§4.7 validation failure message).
#[must_use]
pub fn usage_string(params: &[ParamSpec], required: &[String]) -> String {
    params
        .iter()
        .map(|p| {
            if required.iter().any(|r| r == &p.name) {
                format!("<{}:{}>", p.name, p.schema_type)
            } else {
                format!("[{}:{}]", p.name, p.schema_type)
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weather_params() -> Vec<ParamSpec> {
        vec![
            ParamSpec { name: "location".to_string(), schema_type: "string".to_string(), description: None },
            ParamSpec { name: "days".to_string(), schema_type: "integer".to_string(), description: None },
        ]
    }

    #[test]
    fn s1_positional_command_parsing() {
        let args = parse_arguments(r#""London" 3"#, &weather_params()).unwrap();
        assert_eq!(args.get("location").unwrap(), "London");
        assert_eq!(args.get("days").unwrap(), 3);
    }

    #[test]
    fn s2_named_command_parsing() {
        let args = parse_arguments(r#"location="Paris" days=5"#, &weather_params()).unwrap();
        assert_eq!(args.get("location").unwrap(), "Paris");
        assert_eq!(args.get("days").unwrap(), 5);
    }

    #[test]
    fn s3_json_literal() {
        let args = parse_arguments(r#"{"location":"Berlin","days":2}"#, &weather_params()).unwrap();
        assert_eq!(args.get("location").unwrap(), "Berlin");
        assert_eq!(args.get("days").unwrap(), 2);
    }

    #[test]
    fn s4_missing_required_reports_usage() {
        let args = parse_arguments("days=1", &weather_params()).unwrap();
        let required = vec!["location".to_string()];
        let missing = missing_required(&args, &required);
        assert_eq!(missing, vec!["location"]);
        assert_eq!(usage_string(&weather_params(), &required), "<location:string> [days:integer]");
    }

    #[test]
    fn hex_integer_parses() {
        assert_eq!(coerce("0x1F", "integer").unwrap(), Value::from(31));
    }

    #[test]
    fn boolean_accepts_yes_on_case_insensitive() {
        assert_eq!(coerce("YES", "boolean").unwrap(), Value::Bool(true));
        assert_eq!(coerce("Off", "boolean").unwrap(), Value::Bool(false));
    }

    #[test]
    fn json_array_literal_is_wrapped_as_value() {
        let args = parse_arguments("[1,2,3]", &[]).unwrap();
        assert_eq!(args.get("value").unwrap(), &serde_json::json!([1, 2, 3]));
    }

    #[test]
    fn array_type_reparsed_from_token() {
        let args = parse_arguments("tags=[1,2]", &[ParamSpec { name: "tags".to_string(), schema_type: "array".to_string(), description: None }])
            .unwrap();
        assert_eq!(args.get("tags").unwrap(), &serde_json::json!([1, 2]));
    }
}
