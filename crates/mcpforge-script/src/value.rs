//! Evaluator value representation and the conversion table to JSON (§4.6).

use serde_json::{Map, Number, Value};

/// A value as it would sit on the host evaluator's stack. The host's actual
/// value type is out of scope (§1 "the host-provided evaluator"); this is
/// the minimal shape the conversion table needs.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptValue {
    /// Absent or explicit null.
    Null,
    /// Boolean.
    Bool(bool),
    /// Numeric; integral-ness is decided at conversion time, not here.
    Number(f64),
    /// String.
    Str(String),
    /// An associative structure, converted recursively.
    Map(Vec<(String, ScriptValue)>),
    /// Anything else the evaluator can produce; carries its textual form.
    Other(String),
}

/// Convert one evaluator value to JSON per §4.6's table.
#[must_use]
pub fn to_json(value: &ScriptValue) -> Value {
    match value {
        ScriptValue::Null => Value::Null,
        ScriptValue::Bool(b) => Value::Bool(*b),
        ScriptValue::Number(n) => number_to_json(*n),
        ScriptValue::Str(s) => Value::String(s.clone()),
        ScriptValue::Map(entries) => {
            let mut map = Map::new();
            for (key, value) in entries {
                map.insert(key.clone(), to_json(value));
            }
            Value::Object(map)
        },
        ScriptValue::Other(text) => Value::String(text.clone()),
    }
}

/// Largest magnitude at which every integral `f64` still round-trips through `i64`.
const MAX_SAFE_INTEGRAL: f64 = 9_007_199_254_740_992.0;

fn number_to_json(n: f64) -> Value {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < MAX_SAFE_INTEGRAL {
        #[allow(clippy::cast_possible_truncation)]
        return Value::Number(Number::from(n as i64));
    }
    Number::from_f64(n).map_or(Value::Null, Value::Number)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integral_number_becomes_json_integer() {
        assert_eq!(to_json(&ScriptValue::Number(3.0)), serde_json::json!(3));
    }

    #[test]
    fn fractional_number_becomes_json_float() {
        assert_eq!(to_json(&ScriptValue::Number(3.5)), serde_json::json!(3.5));
    }

    #[test]
    fn null_and_bool_and_string_convert_directly() {
        assert_eq!(to_json(&ScriptValue::Null), Value::Null);
        assert_eq!(to_json(&ScriptValue::Bool(true)), serde_json::json!(true));
        assert_eq!(to_json(&ScriptValue::Str("x".into())), serde_json::json!("x"));
    }

    #[test]
    fn map_converts_recursively() {
        let value = ScriptValue::Map(vec![("city".to_string(), ScriptValue::Str("NYC".into())), ("days".to_string(), ScriptValue::Number(3.0))]);
        assert_eq!(to_json(&value), serde_json::json!({"city": "NYC", "days": 3}));
    }

    #[test]
    fn other_falls_back_to_textual_form() {
        assert_eq!(to_json(&ScriptValue::Other("#<fn>".into())), serde_json::json!("#<fn>"));
    }
}
