use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[cfg(feature = "utoipa")]
use utoipa::ToSchema;

use super::{TEXT_OPERATORS, TypeHandler, input_text, lowercase_operand, type_ids};
use crate::envelope::{ProjectionColumn, ValueEnvelope};
use crate::query::filter::Operator;
use crate::query::predicate::{Operand, Predicate, PredicateError, operand_list, operand_text, standard_predicate};

/// One selectable option. Deserializes from `"hr"` or `{"value": "hr", "label": "Human Resources"}`.
#[cfg_attr(feature = "utoipa", derive(ToSchema))]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "OptionRepr")]
pub struct SelectOption {
    pub value: String,
    pub label: String,
}

impl SelectOption {
    pub fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OptionRepr {
    Bare(String),
    Full(FullOption),
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct FullOption {
    value: String,
    #[serde(default)]
    label: Option<String>,
}

impl From<OptionRepr> for SelectOption {
    fn from(repr: OptionRepr) -> Self {
        match repr {
            OptionRepr::Bare(value) => SelectOption::new(value.clone(), value),
            OptionRepr::Full(FullOption { value, label }) => {
                let label = label.unwrap_or_else(|| value.clone());
                SelectOption::new(value, label)
            }
        }
    }
}

fn check_option_list(options: &[SelectOption]) -> Result<(), String> {
    let mut seen = HashSet::new();
    for option in options {
        if option.value.trim().is_empty() {
            return Err("option values must not be empty".to_string());
        }
        if !seen.insert(option.value.as_str()) {
            return Err(format!("duplicate option value '{}'", option.value));
        }
    }
    Ok(())
}

fn find_option<'a>(options: &'a [SelectOption], value: &str) -> Option<&'a SelectOption> {
    options.iter().find(|option| option.value == value)
}

fn not_an_option(value: &str, options: &[SelectOption]) -> String {
    let allowed: Vec<&str> = options.iter().map(|option| option.value.as_str()).collect();
    format!("'{value}' is not one of the allowed options: {}", allowed.join(", "))
}

fn raw_operand(value: &Value) -> Result<Operand, PredicateError> {
    operand_text(value).map(|text| Operand::Text(text.trim().to_string()))
}

// ─── select ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SelectConfig {
    #[serde(default)]
    pub options: Vec<SelectOption>,
    /// Admits values outside `options`. Labels never match.
    #[serde(default)]
    pub allow_custom: bool,
}

impl SelectConfig {
    pub(super) fn check_options(&self) -> Result<(), String> {
        check_option_list(&self.options)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SelectHandler;

impl TypeHandler for SelectHandler {
    type Config = SelectConfig;

    fn type_id(&self) -> &'static str {
        type_ids::SELECT
    }

    fn to_storage(&self, input: &Value, config: &SelectConfig) -> Result<ValueEnvelope, String> {
        let value = input_text(input)?;
        let label = find_option(&config.options, &value)
            .map(|option| option.label.clone())
            .unwrap_or_else(|| value.clone());
        let sortable = label.to_lowercase();
        Ok(ValueEnvelope::new(value, Some(sortable)).with_meta("label", label))
    }

    fn validate(&self, input: &Value, config: &SelectConfig) -> Result<(), String> {
        let value = input_text(input)?;
        if value.is_empty() {
            return Err("Value is required".to_string());
        }
        if config.allow_custom || find_option(&config.options, &value).is_some() {
            Ok(())
        } else {
            Err(not_an_option(&value, &config.options))
        }
    }

    fn sort_column(&self) -> ProjectionColumn {
        ProjectionColumn::ValueText
    }

    fn coerce_operand(&self, value: &Value, _config: &SelectConfig) -> Result<Operand, String> {
        lowercase_operand(value)
    }

    /// Equality, membership and null checks target the raw option value, not the label.
    fn filter_predicate(
        &self,
        column: ProjectionColumn,
        operator: Operator,
        value: &Value,
        config: &SelectConfig,
    ) -> Result<Predicate, PredicateError> {
        match operator {
            Operator::Eq | Operator::Ne => Ok(Predicate::RawEquals {
                operand: raw_operand(value)?,
                negated: operator == Operator::Ne,
            }),
            Operator::In | Operator::NotIn => {
                let operands = operand_list(value)
                    .iter()
                    .map(raw_operand)
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Predicate::RawIn {
                    operands,
                    negated: operator == Operator::NotIn,
                })
            }
            Operator::IsNull | Operator::IsNotNull => Ok(Predicate::RawIsNull {
                negated: operator == Operator::IsNotNull,
            }),
            other if TEXT_OPERATORS.contains(&other) => {
                standard_predicate(column, other, value, |operand| self.coerce_operand(operand, config))
            }
            _ => Err(PredicateError::Unsupported),
        }
    }
}

// ─── multiselect ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MultiSelectConfig {
    #[serde(default)]
    pub options: Vec<SelectOption>,
    #[serde(default)]
    pub allow_custom: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_selections: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_selections: Option<usize>,
}

impl MultiSelectConfig {
    pub(super) fn check_options(&self) -> Result<(), String> {
        check_option_list(&self.options)?;
        if let (Some(min), Some(max)) = (self.min_selections, self.max_selections)
            && min > max
        {
            return Err(format!("min_selections ({min}) must not exceed max_selections ({max})"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MultiSelectHandler;

impl MultiSelectHandler {
    /// Array or single string, trimmed, blanks dropped, first occurrence kept.
    fn selections(input: &Value) -> Result<Vec<String>, String> {
        let items = match input {
            Value::Array(items) => items
                .iter()
                .map(|item| match item {
                    Value::Array(_) | Value::Object(_) | Value::Null => {
                        Err("Selections must be strings".to_string())
                    }
                    scalar => input_text(scalar),
                })
                .collect::<Result<Vec<_>, _>>()?,
            Value::Null => return Err("Value is required".to_string()),
            scalar => vec![input_text(scalar)?],
        };

        let mut seen = HashSet::new();
        Ok(items
            .into_iter()
            .filter(|item| !item.is_empty())
            .filter(|item| seen.insert(item.clone()))
            .collect())
    }
}

impl TypeHandler for MultiSelectHandler {
    type Config = MultiSelectConfig;

    fn type_id(&self) -> &'static str {
        type_ids::MULTISELECT
    }

    fn to_storage(&self, input: &Value, config: &MultiSelectConfig) -> Result<ValueEnvelope, String> {
        let selections = Self::selections(input)?;
        let labels: Vec<Value> = selections
            .iter()
            .map(|value| {
                let label = find_option(&config.options, value).map_or(value.as_str(), |option| option.label.as_str());
                Value::String(label.to_string())
            })
            .collect();

        let sortable = if selections.is_empty() {
            None
        } else {
            let mut sorted: Vec<String> = selections.iter().map(|value| value.to_lowercase()).collect();
            sorted.sort();
            Some(sorted.join(","))
        };

        Ok(ValueEnvelope::new(selections, sortable).with_meta("labels", labels))
    }

    fn validate(&self, input: &Value, config: &MultiSelectConfig) -> Result<(), String> {
        let selections = Self::selections(input)?;
        if !config.allow_custom
            && let Some(unknown) = selections.iter().find(|value| find_option(&config.options, value).is_none())
        {
            return Err(not_an_option(unknown, &config.options));
        }
        if let Some(min) = config.min_selections
            && selections.len() < min
        {
            return Err(format!("Select at least {min} option(s)"));
        }
        if let Some(max) = config.max_selections
            && selections.len() > max
        {
            return Err(format!("Select at most {max} option(s)"));
        }
        Ok(())
    }

    fn sort_column(&self) -> ProjectionColumn {
        ProjectionColumn::ValueText
    }

    fn operators(&self) -> &'static [Operator] {
        &[
            Operator::Any,
            Operator::All,
            Operator::Not,
            Operator::IsNull,
            Operator::IsNotNull,
        ]
    }

    fn coerce_operand(&self, value: &Value, _config: &MultiSelectConfig) -> Result<Operand, String> {
        lowercase_operand(value)
    }

    fn filter_predicate(
        &self,
        _column: ProjectionColumn,
        operator: Operator,
        value: &Value,
        _config: &MultiSelectConfig,
    ) -> Result<Predicate, PredicateError> {
        let values = || -> Result<Vec<String>, PredicateError> {
            operand_list(value)
                .iter()
                .map(|item| operand_text(item).map(|text| text.trim().to_string()))
                .collect()
        };
        match operator {
            Operator::Any => Ok(Predicate::ArrayOverlap {
                values: values()?,
                negated: false,
            }),
            Operator::All => Ok(Predicate::ArrayContains { values: values()? }),
            Operator::Not => Ok(Predicate::ArrayOverlap {
                values: values()?,
                negated: true,
            }),
            Operator::IsNull => Ok(Predicate::ArrayEmpty { negated: false }),
            Operator::IsNotNull => Ok(Predicate::ArrayEmpty { negated: true }),
            _ => Err(PredicateError::Unsupported),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn departments() -> SelectConfig {
        super::super::parse_config(&json!({
            "options": [
                {"value": "hr", "label": "Human Resources"},
                {"value": "dev", "label": "Development"}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn options_accept_bare_strings() {
        let config: SelectConfig = super::super::parse_config(&json!({"options": ["a", {"value": "b"}]})).unwrap();
        assert_eq!(config.options, vec![SelectOption::new("a", "a"), SelectOption::new("b", "b")]);
    }

    #[test]
    fn duplicate_option_values_are_invalid() {
        assert!(super::super::parse_config::<SelectConfig>(&json!({"options": ["a", "a"]})).is_err());
    }

    #[test]
    fn select_sortable_is_lowercased_label() {
        let envelope = SelectHandler.to_storage(&json!("hr"), &departments()).unwrap();
        assert_eq!(envelope.raw, json!("hr"));
        assert_eq!(envelope.sortable.as_deref(), Some("human resources"));
        assert_eq!(envelope.metadata.get("label"), Some(&json!("Human Resources")));
    }

    #[test]
    fn select_rejects_labels_and_unknown_values() {
        let config = departments();
        assert!(SelectHandler.validate(&json!("dev"), &config).is_ok());
        assert!(SelectHandler.validate(&json!("Development"), &config).is_err());
        assert!(SelectHandler.validate(&json!("ops"), &config).is_err());
    }

    #[test]
    fn allow_custom_admits_any_value() {
        let mut config = departments();
        config.allow_custom = true;
        assert!(SelectHandler.validate(&json!("ops"), &config).is_ok());
        let envelope = SelectHandler.to_storage(&json!("ops"), &config).unwrap();
        assert_eq!(envelope.sortable.as_deref(), Some("ops"));
    }

    #[test]
    fn select_eq_compares_raw_value() {
        let predicate = SelectHandler
            .filter_predicate(ProjectionColumn::ValueText, Operator::Eq, &json!("hr"), &departments())
            .unwrap();
        assert_eq!(
            predicate,
            Predicate::RawEquals {
                operand: Operand::Text("hr".into()),
                negated: false
            }
        );
    }

    #[test]
    fn select_ilike_uses_label_projection() {
        let predicate = SelectHandler
            .filter_predicate(ProjectionColumn::ValueText, Operator::ILike, &json!("Human"), &departments())
            .unwrap();
        assert!(matches!(predicate, Predicate::ILike { column: ProjectionColumn::ValueText, .. }));
    }

    fn tags() -> MultiSelectConfig {
        super::super::parse_config(&json!({
            "options": ["hr", "dev", "legal"],
            "max_selections": 2
        }))
        .unwrap()
    }

    #[test]
    fn multiselect_dedupes_and_sorts() {
        let envelope = MultiSelectHandler.to_storage(&json!(["legal", "dev", "legal"]), &tags()).unwrap();
        assert_eq!(envelope.raw, json!(["legal", "dev"]));
        assert_eq!(envelope.sortable.as_deref(), Some("dev,legal"));
        assert_eq!(envelope.metadata.get("labels"), Some(&json!(["legal", "dev"])));
    }

    #[test]
    fn multiselect_accepts_a_single_string() {
        let envelope = MultiSelectHandler.to_storage(&json!("hr"), &tags()).unwrap();
        assert_eq!(envelope.raw, json!(["hr"]));
    }

    #[test]
    fn multiselect_enforces_options_and_counts() {
        let config = tags();
        assert!(MultiSelectHandler.validate(&json!(["hr", "ops"]), &config).is_err());
        assert_eq!(
            MultiSelectHandler.validate(&json!(["hr", "dev", "legal"]), &config).unwrap_err(),
            "Select at most 2 option(s)"
        );
    }

    #[test]
    fn multiselect_operators_map_to_array_predicates() {
        let config = tags();
        assert_eq!(
            MultiSelectHandler
                .filter_predicate(ProjectionColumn::ValueText, Operator::Any, &json!(["hr", "dev"]), &config)
                .unwrap(),
            Predicate::ArrayOverlap {
                values: vec!["hr".into(), "dev".into()],
                negated: false
            }
        );
        assert_eq!(
            MultiSelectHandler
                .filter_predicate(ProjectionColumn::ValueText, Operator::Not, &json!("legal"), &config)
                .unwrap(),
            Predicate::ArrayOverlap {
                values: vec!["legal".into()],
                negated: true
            }
        );
        assert_eq!(
            MultiSelectHandler.filter_predicate(ProjectionColumn::ValueText, Operator::Eq, &json!("hr"), &config),
            Err(PredicateError::Unsupported)
        );
    }
}
