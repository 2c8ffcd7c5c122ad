//! Lenient argument extraction.
//!
//! Arguments come from model output, which does not reliably respect JSON
//! types: integers arrive as `"42"` or `3.0`, booleans as `"TRUE"`. The
//! accessors here coerce those forms and report anything else as
//! `InvalidParameterType`. A JSON `null` counts as absent.

use serde_json::Value;

use crate::parameter::{ParameterType, ToolParameter};
use crate::tool::{ToolArguments, ToolError};

/// Type tag of a JSON value, as reported in `InvalidParameterType::got`.
pub fn type_tag(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "double",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn invalid(name: &str, expected: &str, value: &Value) -> ToolError {
    ToolError::InvalidParameterType {
        name: name.to_string(),
        expected: expected.to_string(),
        got: type_tag(value).to_string(),
    }
}

/// The raw value of `name`, or `None` when absent or null.
pub fn value_argument<'a>(args: &'a ToolArguments, name: &str) -> Option<&'a Value> {
    args.get(name).filter(|v| !v.is_null())
}

pub fn string_argument(args: &ToolArguments, name: &str) -> Result<Option<String>, ToolError> {
    match value_argument(args, name) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(invalid(name, "string", other)),
    }
}

/// Integers pass through, floats truncate toward zero, strings are parsed.
pub fn int_argument(args: &ToolArguments, name: &str) -> Result<Option<i64>, ToolError> {
    let Some(value) = value_argument(args, name) else {
        return Ok(None);
    };
    let coerced = match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    coerced
        .map(Some)
        .ok_or_else(|| invalid(name, "integer", value))
}

pub fn double_argument(args: &ToolArguments, name: &str) -> Result<Option<f64>, ToolError> {
    let Some(value) = value_argument(args, name) else {
        return Ok(None);
    };
    let coerced = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    coerced
        .map(Some)
        .ok_or_else(|| invalid(name, "double", value))
}

/// Booleans pass through; a string is `true` only if it equals "true"
/// case-insensitively. Every other string is `false`, not an error.
pub fn bool_argument(args: &ToolArguments, name: &str) -> Result<Option<bool>, ToolError> {
    match value_argument(args, name) {
        None => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(Value::String(s)) => Ok(Some(s.trim().eq_ignore_ascii_case("true"))),
        Some(other) => Err(invalid(name, "boolean", other)),
    }
}

fn missing(name: &str) -> ToolError {
    ToolError::MissingRequiredParameter(name.to_string())
}

pub fn require_string(args: &ToolArguments, name: &str) -> Result<String, ToolError> {
    string_argument(args, name)?.ok_or_else(|| missing(name))
}

pub fn require_int(args: &ToolArguments, name: &str) -> Result<i64, ToolError> {
    int_argument(args, name)?.ok_or_else(|| missing(name))
}

pub fn require_bool(args: &ToolArguments, name: &str) -> Result<bool, ToolError> {
    bool_argument(args, name)?.ok_or_else(|| missing(name))
}

pub fn require_value<'a>(args: &'a ToolArguments, name: &str) -> Result<&'a Value, ToolError> {
    value_argument(args, name).ok_or_else(|| missing(name))
}

/// Validate one declared parameter against `args`.
///
/// Object and array parameters are checked for presence only; their inner
/// shape is the owning tool's concern.
pub fn validate_parameter(param: &ToolParameter, args: &ToolArguments) -> Result<(), ToolError> {
    let name = param.name();
    if value_argument(args, name).is_none() {
        return if param.is_required() {
            Err(missing(name))
        } else {
            Ok(())
        };
    }
    match param.param_type() {
        ParameterType::String => string_argument(args, name).map(drop),
        ParameterType::Integer => int_argument(args, name).map(drop),
        ParameterType::Double => double_argument(args, name).map(drop),
        ParameterType::Boolean => bool_argument(args, name).map(drop),
        ParameterType::Array(_) | ParameterType::Object => Ok(()),
    }
}

/// Validate every declared parameter, stopping at the first failure.
pub fn validate_arguments(params: &[ToolParameter], args: &ToolArguments) -> Result<(), ToolError> {
    params.iter().try_for_each(|p| validate_parameter(p, args))
}
