use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{TypeHandler, input_text, lowercase_operand, type_ids};
use crate::envelope::{ProjectionColumn, ValueEnvelope};
use crate::query::predicate::Operand;

/// Longest value a `short_text` field keeps.
pub const SHORT_TEXT_MAX_LENGTH: usize = 255;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TextConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    /// Longer input is truncated, not rejected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regex: Option<String>,
}

impl TextConfig {
    pub(super) fn check_options(&self) -> Result<(), String> {
        if self.max_length == Some(0) {
            return Err("max_length must be greater than 0".to_string());
        }
        if let (Some(min), Some(max)) = (self.min_length, self.max_length)
            && min > max
        {
            return Err(format!("min_length ({min}) must not exceed max_length ({max})"));
        }
        if let Some(pattern) = &self.regex {
            Regex::new(pattern).map_err(|err| format!("invalid regex: {err}"))?;
        }
        Ok(())
    }
}

/// Handler for `text` and `short_text`; both share [`TextConfig`].
#[derive(Debug, Clone, Copy)]
pub struct TextHandler {
    type_id: &'static str,
    length_cap: Option<usize>,
}

impl TextHandler {
    pub const fn text() -> Self {
        Self {
            type_id: type_ids::TEXT,
            length_cap: None,
        }
    }

    pub const fn short_text() -> Self {
        Self {
            type_id: type_ids::SHORT_TEXT,
            length_cap: Some(SHORT_TEXT_MAX_LENGTH),
        }
    }

    fn effective_max(&self, config: &TextConfig) -> Option<usize> {
        match (config.max_length, self.length_cap) {
            (Some(max), Some(cap)) => Some(max.min(cap)),
            (max, cap) => max.or(cap),
        }
    }
}

impl TypeHandler for TextHandler {
    type Config = TextConfig;

    fn type_id(&self) -> &'static str {
        self.type_id
    }

    fn to_storage(&self, input: &Value, config: &TextConfig) -> Result<ValueEnvelope, String> {
        let text = input_text(input)?;
        let original_length = text.chars().count();

        match self.effective_max(config) {
            Some(max) if original_length > max => {
                let truncated: String = text.chars().take(max).collect();
                let sortable = truncated.to_lowercase();
                Ok(ValueEnvelope::new(truncated, Some(sortable))
                    .with_meta("truncated", true)
                    .with_meta("original_length", original_length))
            }
            _ => {
                let sortable = text.to_lowercase();
                Ok(ValueEnvelope::new(text, Some(sortable)))
            }
        }
    }

    fn validate(&self, input: &Value, config: &TextConfig) -> Result<(), String> {
        let text = input_text(input)?;
        if let Some(min) = config.min_length {
            let length = text.chars().count();
            if length < min {
                return Err(format!("Text must be at least {min} characters long"));
            }
        }
        if let Some(pattern) = &config.regex {
            let regex = Regex::new(pattern).map_err(|err| format!("invalid regex: {err}"))?;
            if !regex.is_match(&text) {
                return Err(format!("Text does not match the pattern {pattern}"));
            }
        }
        Ok(())
    }

    fn sort_column(&self) -> ProjectionColumn {
        ProjectionColumn::ValueText
    }

    fn coerce_operand(&self, value: &Value, _config: &TextConfig) -> Result<Operand, String> {
        lowercase_operand(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config(value: Value) -> TextConfig {
        super::super::parse_config(&value).unwrap()
    }

    #[test]
    fn truncates_to_max_length_and_records_original() {
        let handler = TextHandler::text();
        let config = config(json!({"max_length": 5}));
        let input = json!("UPPERCASE TEXT");
        handler.validate(&input, &config).unwrap();
        let envelope = handler.to_storage(&input, &config).unwrap();
        assert_eq!(envelope.raw, json!("UPPER"));
        assert_eq!(envelope.sortable.as_deref(), Some("upper"));
        assert_eq!(envelope.metadata.get("truncated"), Some(&json!(true)));
        assert_eq!(envelope.metadata.get("original_length"), Some(&json!(14)));
    }

    #[test]
    fn untruncated_text_has_no_metadata() {
        let handler = TextHandler::text();
        let envelope = handler.to_storage(&json!("  Invoice 42 "), &TextConfig::default()).unwrap();
        assert_eq!(envelope.raw, json!("Invoice 42"));
        assert_eq!(envelope.sortable.as_deref(), Some("invoice 42"));
        assert!(envelope.metadata.is_empty());
    }

    #[test]
    fn min_length_is_enforced_on_trimmed_input() {
        let handler = TextHandler::text();
        let config = config(json!({"min_length": 3}));
        let err = handler.validate(&json!("  ab  "), &config).unwrap_err();
        assert_eq!(err, "Text must be at least 3 characters long");
    }

    #[test]
    fn regex_is_enforced() {
        let handler = TextHandler::text();
        let config = config(json!({"regex": "^INV-\\d+$"}));
        assert!(handler.validate(&json!("INV-001"), &config).is_ok());
        assert!(handler.validate(&json!("RCPT-001"), &config).is_err());
    }

    #[test]
    fn invalid_regex_is_rejected_at_parse_time() {
        assert!(super::super::parse_config::<TextConfig>(&json!({"regex": "("})).is_err());
    }

    #[test]
    fn min_above_max_is_rejected() {
        assert!(super::super::parse_config::<TextConfig>(&json!({"min_length": 10, "max_length": 2})).is_err());
    }

    #[test]
    fn short_text_caps_length() {
        let handler = TextHandler::short_text();
        let long = "x".repeat(300);
        let envelope = handler.to_storage(&json!(long), &TextConfig::default()).unwrap();
        assert_eq!(envelope.raw.as_str().unwrap().len(), SHORT_TEXT_MAX_LENGTH);
        assert_eq!(envelope.metadata.get("original_length"), Some(&json!(300)));
    }

    #[test]
    fn numbers_are_stringified() {
        let handler = TextHandler::text();
        let envelope = handler.to_storage(&json!(42), &TextConfig::default()).unwrap();
        assert_eq!(envelope.raw, json!("42"));
    }

    #[test]
    fn objects_are_invalid() {
        let handler = TextHandler::text();
        assert!(handler.validate(&json!({"a": 1}), &TextConfig::default()).is_err());
    }

    #[test]
    fn operands_are_lowercased() {
        let handler = TextHandler::text();
        assert_eq!(
            handler.coerce_operand(&json!("ACME"), &TextConfig::default()),
            Ok(Operand::Text("acme".into()))
        );
    }
}
