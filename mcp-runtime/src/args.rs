use serde_json::{Map, Value};

use crate::error::ToolError;

pub fn required_string(args: &Map<String, Value>, key: &str) -> Result<String, ToolError> {
    let value = args.get(key).ok_or_else(|| ToolError::missing(key))?;
    match value {
        Value::String(v) if !v.trim().is_empty() => Ok(v.clone()),
        Value::Null => Err(ToolError::missing(key)),
        Value::String(_) => Err(ToolError::invalid(key, format!("'{key}' must not be empty"))),
        _ => Err(ToolError::invalid(key, format!("'{key}' must be a string"))),
    }
}

pub fn arg_string(args: &Map<String, Value>, key: &str, default: &str) -> Result<String, ToolError> {
    Ok(arg_optional_string(args, key)?.unwrap_or_else(|| default.to_string()))
}

pub fn arg_optional_string(args: &Map<String, Value>, key: &str) -> Result<Option<String>, ToolError> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(v)) if v.trim().is_empty() => Ok(None),
        Some(Value::String(v)) => Ok(Some(v.clone())),
        Some(_) => Err(ToolError::invalid(key, format!("'{key}' must be a string"))),
    }
}

pub fn arg_optional_bool(args: &Map<String, Value>, key: &str) -> Result<Option<bool>, ToolError> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(v)) => Ok(Some(*v)),
        Some(_) => Err(ToolError::invalid(key, format!("'{key}' must be a boolean"))),
    }
}

pub fn arg_optional_u64(args: &Map<String, Value>, key: &str) -> Result<Option<u64>, ToolError> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n.as_u64().map(Some).ok_or_else(|| {
            ToolError::invalid(key, format!("'{key}' must be a non-negative integer"))
        }),
        Some(_) => Err(ToolError::invalid(key, format!("'{key}' must be a number"))),
    }
}

pub fn arg_optional_string_array(
    args: &Map<String, Value>,
    key: &str,
) -> Result<Option<Vec<String>>, ToolError> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str().map(ToOwned::to_owned).ok_or_else(|| {
                    ToolError::invalid(key, format!("'{key}' must be an array of strings"))
                })
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Some),
        Some(_) => Err(ToolError::invalid(key, format!("'{key}' must be an array of strings"))),
    }
}

/// Required argument restricted to a fixed set of values.
pub fn required_enum(
    args: &Map<String, Value>,
    key: &str,
    allowed: &[&str],
) -> Result<String, ToolError> {
    let value = required_string(args, key)?;
    ensure_allowed(key, value, allowed)
}

/// Optional enumerated argument falling back to `default` when absent.
pub fn enum_or_default(
    args: &Map<String, Value>,
    key: &str,
    allowed: &[&str],
    default: &str,
) -> Result<String, ToolError> {
    let value = arg_string(args, key, default)?;
    ensure_allowed(key, value, allowed)
}

fn ensure_allowed(key: &str, value: String, allowed: &[&str]) -> Result<String, ToolError> {
    if allowed.contains(&value.as_str()) {
        Ok(value)
    } else {
        Err(ToolError::invalid(
            key,
            format!("'{key}' must be one of: {}", allowed.join(", ")),
        ))
    }
}

/// Identifier that is substituted into an upstream path segment.
pub fn required_path_segment(args: &Map<String, Value>, key: &str) -> Result<String, ToolError> {
    let value = required_string(args, key)?;
    let value = value.trim().to_string();
    if value
        .chars()
        .any(|c| c == '/' || c == '?' || c == '#' || c == '%' || c.is_whitespace())
    {
        return Err(ToolError::invalid(
            key,
            format!("'{key}' must be a single identifier"),
        ));
    }
    Ok(value)
}
