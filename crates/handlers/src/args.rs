//! Argument extraction shared by the built-in handlers.

use serde_json::Value;
use treeshell_core::ExecutionError;

/// First of `keys` present as a non-empty string.
pub(crate) fn str_arg<'a>(args: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|k| args.get(*k).and_then(Value::as_str))
        .map(str::trim)
        .find(|s| !s.is_empty())
}

pub(crate) fn required_str<'a>(args: &'a Value, keys: &[&str]) -> Result<&'a str, ExecutionError> {
    str_arg(args, keys).ok_or_else(|| {
        ExecutionError::InvalidArguments(format!("'{}' is required", keys.join("' or '")))
    })
}

/// First of `keys` rendered as text. Non-string values are rendered as JSON.
pub(crate) fn text_arg(args: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| args.get(*k))
        .find_map(|v| match v {
            Value::Null => None,
            Value::String(s) if s.trim().is_empty() => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        })
}
