use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{TypeHandler, type_ids};
use crate::envelope::{ProjectionColumn, ValueEnvelope};
use crate::query::filter::Operator;
use crate::query::predicate::{Operand, Predicate, PredicateError};

const TRUTHY: &[&str] = &["true", "yes", "y", "on", "1"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BooleanConfig {}

impl BooleanConfig {
    pub(super) fn check_options(&self) -> Result<(), String> {
        Ok(())
    }
}

/// Interprets any scalar as a flag. Unrecognised text is `false`.
pub(crate) fn truthy(input: &Value) -> bool {
    match input {
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|value| value != 0.0),
        Value::String(text) => {
            let text = text.trim().to_ascii_lowercase();
            TRUTHY.contains(&text.as_str())
        }
        _ => false,
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BooleanHandler;

impl TypeHandler for BooleanHandler {
    type Config = BooleanConfig;

    fn type_id(&self) -> &'static str {
        type_ids::BOOLEAN
    }

    fn to_storage(&self, input: &Value, _config: &BooleanConfig) -> Result<ValueEnvelope, String> {
        let flag = truthy(input);
        let sortable = if flag { "1" } else { "0" };
        Ok(ValueEnvelope::new(flag, Some(sortable.to_string())))
    }

    fn validate(&self, input: &Value, _config: &BooleanConfig) -> Result<(), String> {
        match input {
            Value::Array(_) | Value::Object(_) => Err("Value must be a boolean".to_string()),
            _ => Ok(()),
        }
    }

    fn sort_column(&self) -> ProjectionColumn {
        ProjectionColumn::ValueBoolean
    }

    fn operators(&self) -> &'static [Operator] {
        &[Operator::IsChecked, Operator::IsNotChecked]
    }

    fn coerce_operand(&self, value: &Value, _config: &BooleanConfig) -> Result<Operand, String> {
        Ok(Operand::Bool(truthy(value)))
    }

    fn filter_predicate(
        &self,
        _column: ProjectionColumn,
        operator: Operator,
        _value: &Value,
        _config: &BooleanConfig,
    ) -> Result<Predicate, PredicateError> {
        match operator {
            Operator::IsChecked => Ok(Predicate::Checked { checked: true }),
            Operator::IsNotChecked => Ok(Predicate::Checked { checked: false }),
            _ => Err(PredicateError::Unsupported),
        }
    }
}
