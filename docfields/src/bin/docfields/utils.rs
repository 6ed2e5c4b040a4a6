use anyhow::{Context, Result};
use serde_json::Value;
use uuid::Uuid;

/// Reads a command-line value as JSON, falling back to a plain string.
///
/// `42` is a number, `true` a boolean, `["a","b"]` an array, `null` clears, and anything
/// that does not parse (`hello world`, `2024-06-15`) is taken verbatim as text.
pub fn parse_input(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// Parses a config argument, which must be a JSON object.
pub fn parse_config(raw: Option<&str>) -> Result<Value> {
    match raw {
        None => Ok(Value::Object(Default::default())),
        Some(raw) => serde_json::from_str(raw).with_context(|| format!("Config is not valid JSON: {raw}")),
    }
}

/// Parses `field_id=value` assignments for bulk writes.
pub fn parse_assignment(raw: &str) -> Result<(Uuid, Value)> {
    let (field_id, value) = raw
        .split_once('=')
        .with_context(|| format!("Expected FIELD_ID=VALUE, got '{raw}'"))?;
    let field_id = Uuid::parse_str(field_id.trim()).with_context(|| format!("Invalid field id '{field_id}'"))?;
    Ok((field_id, parse_input(value)))
}

/// Renders a JSON value for a table cell.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        Value::Array(items) => items.iter().map(display_value).collect::<Vec<_>>().join(", "),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn input_prefers_json() {
        assert_eq!(parse_input("42"), json!(42));
        assert_eq!(parse_input("[\"hr\",\"dev\"]"), json!(["hr", "dev"]));
        assert_eq!(parse_input("null"), Value::Null);
        assert_eq!(parse_input("2024-06-15"), json!("2024-06-15"));
        assert_eq!(parse_input("hello world"), json!("hello world"));
    }

    #[test]
    fn assignment_splits_on_first_equals() {
        let id = Uuid::new_v4();
        let (field_id, value) = parse_assignment(&format!("{id}=a=b")).unwrap();
        assert_eq!(field_id, id);
        assert_eq!(value, json!("a=b"));
        assert!(parse_assignment("nope").is_err());
    }

    #[test]
    fn display_joins_arrays() {
        assert_eq!(display_value(&json!(["hr", "dev"])), "hr, dev");
        assert_eq!(display_value(&Value::Null), "");
        assert_eq!(display_value(&json!(22.9)), "22.9");
    }
}
