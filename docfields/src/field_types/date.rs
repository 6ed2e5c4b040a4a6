use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{ORDERED_OPERATORS, TypeHandler, input_text, lowercase_operand, type_ids};
use crate::envelope::{ProjectionColumn, ValueEnvelope};
use crate::query::filter::Operator;
use crate::query::predicate::Operand;

const DATE_FORMAT: &str = "%Y-%m-%d";
/// Layout of the `value_datetime` projection: the sortable key with a space and no zone.
const PROJECTED_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";
const NAIVE_DATETIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

static YEAR_MONTH: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4}-\d{2}$").expect("year-month regex"));

fn parse_date(text: &str) -> Result<NaiveDate, String> {
    if let Ok(date) = NaiveDate::parse_from_str(text, DATE_FORMAT) {
        return Ok(date);
    }
    DateTime::parse_from_rfc3339(text)
        .map(|datetime| datetime.date_naive())
        .map_err(|_| format!("'{text}' is not a valid date (expected YYYY-MM-DD)"))
}

/// RFC 3339, or a naive timestamp taken as UTC.
pub(crate) fn parse_datetime(text: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(datetime) = DateTime::parse_from_rfc3339(text) {
        return Ok(datetime.with_timezone(&Utc));
    }
    NAIVE_DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .map(|naive| naive.and_utc())
        .ok_or_else(|| format!("'{text}' is not a valid datetime (expected RFC 3339)"))
}

// ─── date ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DateConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_date: Option<NaiveDate>,
}

impl DateConfig {
    pub(super) fn check_options(&self) -> Result<(), String> {
        if let (Some(min), Some(max)) = (self.min_date, self.max_date)
            && min > max
        {
            return Err(format!("min_date ({min}) must not be after max_date ({max})"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DateHandler;

impl TypeHandler for DateHandler {
    type Config = DateConfig;

    fn type_id(&self) -> &'static str {
        type_ids::DATE
    }

    fn to_storage(&self, input: &Value, _config: &DateConfig) -> Result<ValueEnvelope, String> {
        let date = parse_date(&input_text(input)?)?;
        let iso = date.format(DATE_FORMAT).to_string();
        Ok(ValueEnvelope::new(iso.clone(), Some(iso))
            .with_meta("year", date.year())
            .with_meta("month", date.month())
            .with_meta("day", date.day())
            .with_meta("weekday", date.format("%A").to_string()))
    }

    fn validate(&self, input: &Value, config: &DateConfig) -> Result<(), String> {
        let date = parse_date(&input_text(input)?)?;
        if let Some(min) = config.min_date
            && date < min
        {
            return Err(format!("Date must be on or after {min}"));
        }
        if let Some(max) = config.max_date
            && date > max
        {
            return Err(format!("Date must be on or before {max}"));
        }
        Ok(())
    }

    fn sort_column(&self) -> ProjectionColumn {
        ProjectionColumn::ValueDate
    }

    fn operators(&self) -> &'static [Operator] {
        ORDERED_OPERATORS
    }

    fn coerce_operand(&self, value: &Value, _config: &DateConfig) -> Result<Operand, String> {
        let date = parse_date(&input_text(value)?)?;
        Ok(Operand::Text(date.format(DATE_FORMAT).to_string()))
    }
}

// ─── datetime ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DateTimeConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_datetime: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_datetime: Option<DateTime<Utc>>,
}

impl DateTimeConfig {
    pub(super) fn check_options(&self) -> Result<(), String> {
        if let (Some(min), Some(max)) = (self.min_datetime, self.max_datetime)
            && min > max
        {
            return Err(format!("min_datetime ({min}) must not be after max_datetime ({max})"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DateTimeHandler;

impl TypeHandler for DateTimeHandler {
    type Config = DateTimeConfig;

    fn type_id(&self) -> &'static str {
        type_ids::DATETIME
    }

    fn to_storage(&self, input: &Value, _config: &DateTimeConfig) -> Result<ValueEnvelope, String> {
        let datetime = parse_datetime(&input_text(input)?)?;
        let raw = datetime.to_rfc3339_opts(SecondsFormat::AutoSi, true);
        // Fixed-width microseconds so the sortable key orders lexically.
        let sortable = datetime.to_rfc3339_opts(SecondsFormat::Micros, true);
        Ok(ValueEnvelope::new(raw, Some(sortable)))
    }

    fn validate(&self, input: &Value, config: &DateTimeConfig) -> Result<(), String> {
        let datetime = parse_datetime(&input_text(input)?)?;
        if let Some(min) = config.min_datetime
            && datetime < min
        {
            return Err(format!(
                "Datetime must be on or after {}",
                min.to_rfc3339_opts(SecondsFormat::AutoSi, true)
            ));
        }
        if let Some(max) = config.max_datetime
            && datetime > max
        {
            return Err(format!(
                "Datetime must be on or before {}",
                max.to_rfc3339_opts(SecondsFormat::AutoSi, true)
            ));
        }
        Ok(())
    }

    fn sort_column(&self) -> ProjectionColumn {
        ProjectionColumn::ValueDatetime
    }

    fn operators(&self) -> &'static [Operator] {
        ORDERED_OPERATORS
    }

    fn coerce_operand(&self, value: &Value, _config: &DateTimeConfig) -> Result<Operand, String> {
        let datetime = parse_datetime(&input_text(value)?)?;
        Ok(Operand::Text(datetime.format(PROJECTED_DATETIME_FORMAT).to_string()))
    }
}

// ─── yearmonth ──────────────────────────────────────────────────────────────

fn parse_year_month(text: &str) -> Result<(), String> {
    if !YEAR_MONTH.is_match(text) {
        return Err(format!("'{text}' must use the YYYY-MM format"));
    }
    NaiveDate::parse_from_str(&format!("{text}-01"), DATE_FORMAT)
        .map(|_| ())
        .map_err(|_| format!("'{text}' is not a valid month"))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct YearMonthConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_value: Option<String>,
}

impl YearMonthConfig {
    pub(super) fn check_options(&self) -> Result<(), String> {
        for bound in [&self.min_value, &self.max_value].into_iter().flatten() {
            parse_year_month(bound)?;
        }
        if let (Some(min), Some(max)) = (&self.min_value, &self.max_value)
            && min > max
        {
            return Err(format!("min_value ({min}) must not be after max_value ({max})"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct YearMonthHandler;

impl TypeHandler for YearMonthHandler {
    type Config = YearMonthConfig;

    fn type_id(&self) -> &'static str {
        type_ids::YEARMONTH
    }

    fn to_storage(&self, input: &Value, _config: &YearMonthConfig) -> Result<ValueEnvelope, String> {
        let text = input_text(input)?;
        parse_year_month(&text)?;
        Ok(ValueEnvelope::new(text.clone(), Some(text)))
    }

    fn validate(&self, input: &Value, config: &YearMonthConfig) -> Result<(), String> {
        let text = input_text(input)?;
        parse_year_month(&text)?;
        // Zero-padded YYYY-MM orders lexically.
        if let Some(min) = &config.min_value
            && text.as_str() < min.as_str()
        {
            return Err(format!("Value must be on or after {min}"));
        }
        if let Some(max) = &config.max_value
            && text.as_str() > max.as_str()
        {
            return Err(format!("Value must be on or before {max}"));
        }
        Ok(())
    }

    fn sort_column(&self) -> ProjectionColumn {
        ProjectionColumn::ValueText
    }

    fn coerce_operand(&self, value: &Value, _config: &YearMonthConfig) -> Result<Operand, String> {
        lowercase_operand(value)
    }
}
