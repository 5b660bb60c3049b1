//! Coercion and shape helpers over property values.
//!
//! Template authors write the same thing many ways (`true`, `"true"`, `1`;
//! a single mapping or a list of mappings). These helpers fold the accepted
//! spellings into one shape and reject the rest.

use serde_json::Value;

use crate::error::{Result, ScanError};
use crate::ir::EXPR_KEY;

/// Coerce a template boolean.
///
/// Accepts `true`, `"true"`, `"True"`, `"1"`, `1` and their false
/// counterparts. Anything else is a [`ScanError::Coercion`].
pub fn to_boolean(value: &Value) -> Result<bool> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::String(s) => match s.as_str() {
            "true" | "True" | "1" => Ok(true),
            "false" | "False" | "0" => Ok(false),
            _ => Err(coercion_error(value, "boolean")),
        },
        Value::Number(n) => match n.as_f64() {
            Some(x) if x == 1.0 => Ok(true),
            Some(x) if x == 0.0 => Ok(false),
            _ => Err(coercion_error(value, "boolean")),
        },
        _ => Err(coercion_error(value, "boolean")),
    }
}

/// Whether `value` is one of the spellings accepted by [`to_boolean`].
pub fn is_boolean(value: &Value) -> bool {
    to_boolean(value).is_ok()
}

/// Wrap the source text of an unresolved expression.
pub fn unresolved(text: impl Into<String>) -> Value {
    let mut map = serde_json::Map::new();
    map.insert(EXPR_KEY.into(), Value::String(text.into()));
    Value::Object(map)
}

/// Source text of an unresolved expression, `None` for literal values.
pub fn expression(value: &Value) -> Option<&str> {
    match value {
        Value::Object(map) if map.len() == 1 => map.get(EXPR_KEY).and_then(Value::as_str),
        _ => None,
    }
}

/// Coerce a template integer (a JSON integer or a decimal string).
pub fn to_integer(value: &Value) -> Result<i64> {
    match value {
        Value::Number(n) => n.as_i64().ok_or_else(|| coercion_error(value, "integer")),
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| coercion_error(value, "integer")),
        _ => Err(coercion_error(value, "integer")),
    }
}

/// View a value as a sequence: `null` is empty, a list is itself, anything
/// else is a one-element sequence.
pub fn as_sequence(value: &Value) -> Vec<&Value> {
    match value {
        Value::Null => Vec::new(),
        Value::Array(items) => items.iter().collect(),
        other => vec![other],
    }
}

/// Follow a chain of mapping keys.
pub fn lookup<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().try_fold(value, |current, key| current.get(*key))
}

/// Whether a value counts as "set": not null, not an empty string, list or mapping.
pub fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
        _ => true,
    }
}

/// Render a scalar without JSON quoting; structures fall back to compact JSON.
pub fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".into(),
        other => match expression(other) {
            Some(text) => text.to_string(),
            None => other.to_string(),
        },
    }
}

fn coercion_error(value: &Value, expected: &'static str) -> ScanError {
    ScanError::Coercion {
        value: value.to_string(),
        expected,
    }
}
