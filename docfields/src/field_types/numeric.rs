use std::str::FromStr;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

use super::{ORDERED_OPERATORS, TypeHandler, type_ids};
use crate::envelope::{ProjectionColumn, ValueEnvelope};
use crate::query::filter::Operator;
use crate::query::predicate::Operand;

const MAX_PRECISION: u32 = 12;
const DEFAULT_CURRENCY: &str = "EUR";
const DEFAULT_MONETARY_PRECISION: u32 = 2;

fn parse_decimal_str(raw: &str) -> Option<Decimal> {
    let trimmed = raw.trim();
    Decimal::from_str(trimmed)
        .or_else(|_| Decimal::from_scientific(trimmed))
        .ok()
}

/// Reads a number or numeric string as an exact decimal.
pub(crate) fn input_decimal(input: &Value) -> Result<Decimal, String> {
    match input {
        Value::Number(number) => {
            parse_decimal_str(&number.to_string()).ok_or_else(|| format!("Value {number} is out of range"))
        }
        Value::String(text) => parse_decimal_str(text).ok_or_else(|| format!("'{}' is not a number", text.trim())),
        Value::Null => Err("Value is required".to_string()),
        _ => Err("Value must be a number".to_string()),
    }
}

fn round_to(value: Decimal, precision: u32) -> Decimal {
    let mut rounded = value.round_dp_with_strategy(precision, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(precision);
    rounded
}

fn decimal_to_json(value: Decimal) -> Result<Value, String> {
    value
        .to_f64()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .ok_or_else(|| format!("Value {value} cannot be represented"))
}

fn decimal_operand(value: &Value) -> Result<Operand, String> {
    let decimal = input_decimal(value)?;
    if decimal.fract().is_zero()
        && let Some(integer) = decimal.to_i64()
    {
        return Ok(Operand::Integer(integer));
    }
    decimal
        .to_f64()
        .map(Operand::Real)
        .ok_or_else(|| format!("Value {decimal} cannot be compared"))
}

fn check_bounds(value: f64, min: Option<f64>, max: Option<f64>) -> Result<(), String> {
    if let Some(min) = min
        && value < min
    {
        return Err(format!("Value must be at least {min}"));
    }
    if let Some(max) = max
        && value > max
    {
        return Err(format!("Value must be at most {max}"));
    }
    Ok(())
}

fn check_bound_order<T: PartialOrd + std::fmt::Display>(min: Option<T>, max: Option<T>) -> Result<(), String> {
    match (min, max) {
        (Some(min), Some(max)) if min > max => Err(format!("min_value ({min}) must not exceed max_value ({max})")),
        _ => Ok(()),
    }
}

// ─── integer ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IntegerConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_value: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_value: Option<i64>,
}

impl IntegerConfig {
    pub(super) fn check_options(&self) -> Result<(), String> {
        check_bound_order(self.min_value, self.max_value)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct IntegerHandler;

impl IntegerHandler {
    fn parse(input: &Value) -> Result<i64, String> {
        if let Value::Number(number) = input
            && let Some(integer) = number.as_i64()
        {
            return Ok(integer);
        }
        let decimal = input_decimal(input)?;
        if !decimal.fract().is_zero() {
            return Err("Value must be a whole number".to_string());
        }
        decimal.to_i64().ok_or_else(|| format!("Value {decimal} is out of range"))
    }
}

impl TypeHandler for IntegerHandler {
    type Config = IntegerConfig;

    fn type_id(&self) -> &'static str {
        type_ids::INTEGER
    }

    fn to_storage(&self, input: &Value, _config: &IntegerConfig) -> Result<ValueEnvelope, String> {
        let value = Self::parse(input)?;
        Ok(ValueEnvelope::new(value, Some(value.to_string())))
    }

    fn validate(&self, input: &Value, config: &IntegerConfig) -> Result<(), String> {
        let value = Self::parse(input)?;
        if let Some(min) = config.min_value
            && value < min
        {
            return Err(format!("Value must be at least {min}"));
        }
        if let Some(max) = config.max_value
            && value > max
        {
            return Err(format!("Value must be at most {max}"));
        }
        Ok(())
    }

    fn sort_column(&self) -> ProjectionColumn {
        ProjectionColumn::ValueNumeric
    }

    fn operators(&self) -> &'static [Operator] {
        ORDERED_OPERATORS
    }

    fn coerce_operand(&self, value: &Value, _config: &IntegerConfig) -> Result<Operand, String> {
        decimal_operand(value)
    }
}

// ─── number ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NumberConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_value: Option<f64>,
    /// Decimal places kept in raw and sortable; unrounded when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precision: Option<u32>,
}

impl NumberConfig {
    pub(super) fn check_options(&self) -> Result<(), String> {
        if let Some(precision) = self.precision
            && precision > MAX_PRECISION
        {
            return Err(format!("precision must be at most {MAX_PRECISION}"));
        }
        check_bound_order(self.min_value, self.max_value)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NumberHandler;

impl TypeHandler for NumberHandler {
    type Config = NumberConfig;

    fn type_id(&self) -> &'static str {
        type_ids::NUMBER
    }

    fn to_storage(&self, input: &Value, config: &NumberConfig) -> Result<ValueEnvelope, String> {
        let decimal = input_decimal(input)?;
        let decimal = match config.precision {
            Some(precision) => round_to(decimal, precision),
            None => decimal.normalize(),
        };
        Ok(ValueEnvelope::new(decimal_to_json(decimal)?, Some(decimal.to_string())))
    }

    fn validate(&self, input: &Value, config: &NumberConfig) -> Result<(), String> {
        let value = input_decimal(input)?
            .to_f64()
            .ok_or_else(|| "Value is out of range".to_string())?;
        check_bounds(value, config.min_value, config.max_value)
    }

    fn sort_column(&self) -> ProjectionColumn {
        ProjectionColumn::ValueNumeric
    }

    fn operators(&self) -> &'static [Operator] {
        ORDERED_OPERATORS
    }

    fn coerce_operand(&self, value: &Value, _config: &NumberConfig) -> Result<Operand, String> {
        decimal_operand(value)
    }
}

// ─── monetary ───────────────────────────────────────────────────────────────

fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}

fn default_monetary_precision() -> u32 {
    DEFAULT_MONETARY_PRECISION
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MonetaryConfig {
    /// ISO-4217 alpha code.
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default = "default_monetary_precision")]
    pub precision: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_value: Option<f64>,
}

impl Default for MonetaryConfig {
    fn default() -> Self {
        Self {
            currency: default_currency(),
            precision: default_monetary_precision(),
            min_value: None,
            max_value: None,
        }
    }
}

impl MonetaryConfig {
    pub(super) fn check_options(&self) -> Result<(), String> {
        if self.currency.len() != 3 || !self.currency.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(format!(
                "currency must be a three-letter uppercase ISO code, got '{}'",
                self.currency
            ));
        }
        if self.precision > MAX_PRECISION {
            return Err(format!("precision must be at most {MAX_PRECISION}"));
        }
        check_bound_order(self.min_value, self.max_value)
    }
}

/// Display symbol for common currencies, falling back to the code itself.
pub fn currency_symbol(code: &str) -> &str {
    match code {
        "EUR" => "€",
        "USD" | "CAD" | "AUD" | "NZD" | "MXN" => "$",
        "GBP" => "£",
        "JPY" | "CNY" => "¥",
        "INR" => "₹",
        "KRW" => "₩",
        "RUB" => "₽",
        "TRY" => "₺",
        "PLN" => "zł",
        "SEK" | "NOK" | "DKK" => "kr",
        "BRL" => "R$",
        other => other,
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MonetaryHandler;

impl MonetaryHandler {
    /// Accepts `12.5`, `"12.50"`, or the currency-prefixed `"EUR12.50"`.
    fn parse(input: &Value, config: &MonetaryConfig) -> Result<Decimal, String> {
        if let Value::String(text) = input {
            let trimmed = text.trim();
            let prefix: String = trimmed.chars().take_while(|c| c.is_ascii_alphabetic()).collect();
            if !prefix.is_empty() {
                if !prefix.eq_ignore_ascii_case(&config.currency) {
                    return Err(format!(
                        "Currency {} does not match the field currency {}",
                        prefix.to_ascii_uppercase(),
                        config.currency
                    ));
                }
                let amount = &trimmed[prefix.len()..];
                return parse_decimal_str(amount).ok_or_else(|| format!("'{trimmed}' is not a monetary amount"));
            }
        }
        input_decimal(input)
    }
}

impl TypeHandler for MonetaryHandler {
    type Config = MonetaryConfig;

    fn type_id(&self) -> &'static str {
        type_ids::MONETARY
    }

    fn to_storage(&self, input: &Value, config: &MonetaryConfig) -> Result<ValueEnvelope, String> {
        let amount = round_to(Self::parse(input, config)?, config.precision);
        Ok(ValueEnvelope::new(decimal_to_json(amount)?, Some(amount.to_string()))
            .with_meta("currency", config.currency.clone())
            .with_meta("symbol", currency_symbol(&config.currency)))
    }

    fn validate(&self, input: &Value, config: &MonetaryConfig) -> Result<(), String> {
        let amount = round_to(Self::parse(input, config)?, config.precision)
            .to_f64()
            .ok_or_else(|| "Value is out of range".to_string())?;
        check_bounds(amount, config.min_value, config.max_value)
    }

    fn sort_column(&self) -> ProjectionColumn {
        ProjectionColumn::ValueNumeric
    }

    fn operators(&self) -> &'static [Operator] {
        ORDERED_OPERATORS
    }

    fn coerce_operand(&self, value: &Value, config: &MonetaryConfig) -> Result<Operand, String> {
        let amount = Self::parse(value, config)?;
        decimal_operand(&Value::String(amount.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn monetary(value: Value) -> MonetaryConfig {
        super::super::parse_config(&value).unwrap()
    }

    #[test]
    fn monetary_rounds_half_away_from_zero() {
        let config = monetary(json!({"currency": "EUR", "precision": 2}));
        let envelope = MonetaryHandler.to_storage(&json!("22.895"), &config).unwrap();
        assert_eq!(envelope.raw.as_f64(), Some(22.9));
        assert_eq!(envelope.sortable.as_deref(), Some("22.90"));
        assert_eq!(envelope.metadata.get("currency"), Some(&json!("EUR")));
        assert_eq!(envelope.metadata.get("symbol"), Some(&json!("€")));
    }

    #[test]
    fn monetary_pads_to_precision() {
        let envelope = MonetaryHandler.to_storage(&json!(7), &MonetaryConfig::default()).unwrap();
        assert_eq!(envelope.sortable.as_deref(), Some("7.00"));
    }

    #[test]
    fn monetary_accepts_matching_currency_prefix() {
        let config = MonetaryConfig::default();
        let envelope = MonetaryHandler.to_storage(&json!("EUR12.5"), &config).unwrap();
        assert_eq!(envelope.sortable.as_deref(), Some("12.50"));
        assert!(MonetaryHandler.validate(&json!("USD12.50"), &config).is_err());
    }

    #[test]
    fn monetary_config_rejects_lowercase_currency() {
        assert!(super::super::parse_config::<MonetaryConfig>(&json!({"currency": "eur"})).is_err());
    }

    #[test]
    fn monetary_bounds_apply_after_rounding() {
        let config = monetary(json!({"max_value": 10.0}));
        assert!(MonetaryHandler.validate(&json!("10.004"), &config).is_ok());
        assert!(MonetaryHandler.validate(&json!("10.005"), &config).is_err());
    }

    #[test]
    fn integer_accepts_integral_strings_and_floats() {
        let config = IntegerConfig::default();
        assert_eq!(IntegerHandler.to_storage(&json!("42"), &config).unwrap().raw, json!(42));
        assert_eq!(IntegerHandler.to_storage(&json!(3.0), &config).unwrap().raw, json!(3));
        assert!(IntegerHandler.validate(&json!(3.5), &config).is_err());
        assert!(IntegerHandler.validate(&json!("abc"), &config).is_err());
    }

    #[test]
    fn integer_bounds() {
        let config: IntegerConfig = super::super::parse_config(&json!({"min_value": 1, "max_value": 10})).unwrap();
        assert!(IntegerHandler.validate(&json!(1), &config).is_ok());
        assert_eq!(
            IntegerHandler.validate(&json!(0), &config).unwrap_err(),
            "Value must be at least 1"
        );
        assert_eq!(
            IntegerHandler.validate(&json!(11), &config).unwrap_err(),
            "Value must be at most 10"
        );
    }

    #[test]
    fn integer_sortable_is_decimal_string() {
        let envelope = IntegerHandler.to_storage(&json!(-17), &IntegerConfig::default()).unwrap();
        assert_eq!(envelope.sortable.as_deref(), Some("-17"));
    }

    #[test]
    fn number_rounds_when_precision_is_set() {
        let config: NumberConfig = super::super::parse_config(&json!({"precision": 1})).unwrap();
        let envelope = NumberHandler.to_storage(&json!(3.14159), &config).unwrap();
        assert_eq!(envelope.raw.as_f64(), Some(3.1));
        assert_eq!(envelope.sortable.as_deref(), Some("3.1"));
    }

    #[test]
    fn number_without_precision_keeps_value() {
        let envelope = NumberHandler.to_storage(&json!("2.50"), &NumberConfig::default()).unwrap();
        assert_eq!(envelope.raw.as_f64(), Some(2.5));
        assert_eq!(envelope.sortable.as_deref(), Some("2.5"));
    }

    #[test]
    fn operands_prefer_integers() {
        assert_eq!(
            IntegerHandler.coerce_operand(&json!("5"), &IntegerConfig::default()),
            Ok(Operand::Integer(5))
        );
        assert_eq!(
            NumberHandler.coerce_operand(&json!(2.5), &NumberConfig::default()),
            Ok(Operand::Real(2.5))
        );
    }

    #[test]
    fn numeric_handlers_reject_ilike() {
        assert!(!IntegerHandler.operators().contains(&Operator::ILike));
    }
}
