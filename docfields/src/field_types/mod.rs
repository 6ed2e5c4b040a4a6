//! Field type handlers.
//!
//! Every custom field type implements [`TypeHandler`] with a strongly typed config model.
//! The registry stores handlers behind [`DynTypeHandler`], an object-safe view that works on
//! the type-erased [`FieldConfig`] and is implemented for every `TypeHandler` automatically.

mod boolean;
mod config;
mod date;
mod email;
mod link;
mod numeric;
mod select;
mod text;

pub use boolean::{BooleanConfig, BooleanHandler};
pub use config::{ConfigModel, FieldConfig, parse_config};
pub use date::{DateConfig, DateHandler, DateTimeConfig, DateTimeHandler, YearMonthConfig, YearMonthHandler};
pub use email::{EmailConfig, EmailHandler};
pub use link::{UrlConfig, UrlHandler};
pub use numeric::{IntegerConfig, IntegerHandler, MonetaryConfig, MonetaryHandler, NumberConfig, NumberHandler};
pub use select::{MultiSelectConfig, MultiSelectHandler, SelectConfig, SelectHandler, SelectOption};
pub use text::{TextConfig, TextHandler};

use serde::Serialize;
use serde_json::Value;

#[cfg(feature = "utoipa")]
use utoipa::ToSchema;

use crate::envelope::{ProjectionColumn, ValueEnvelope};
use crate::query::filter::Operator;
use crate::query::predicate::{Operand, Predicate, PredicateError, standard_predicate};

/// Stable type ids of the built-in handlers.
pub mod type_ids {
    pub const TEXT: &str = "text";
    pub const SHORT_TEXT: &str = "short_text";
    pub const INTEGER: &str = "integer";
    pub const NUMBER: &str = "number";
    pub const MONETARY: &str = "monetary";
    pub const BOOLEAN: &str = "boolean";
    pub const DATE: &str = "date";
    pub const DATETIME: &str = "datetime";
    pub const YEARMONTH: &str = "yearmonth";
    pub const SELECT: &str = "select";
    pub const MULTISELECT: &str = "multiselect";
    pub const URL: &str = "url";
    pub const EMAIL: &str = "email";
}

/// Operators for handlers sorting on `value_text`.
pub const TEXT_OPERATORS: &[Operator] = &[
    Operator::Eq,
    Operator::Ne,
    Operator::Gt,
    Operator::Gte,
    Operator::Lt,
    Operator::Lte,
    Operator::In,
    Operator::NotIn,
    Operator::IsNull,
    Operator::IsNotNull,
    Operator::ILike,
    Operator::NotILike,
];

/// Operators for numeric and temporal projections.
pub const ORDERED_OPERATORS: &[Operator] = &[
    Operator::Eq,
    Operator::Ne,
    Operator::Gt,
    Operator::Gte,
    Operator::Lt,
    Operator::Lte,
    Operator::In,
    Operator::NotIn,
    Operator::IsNull,
    Operator::IsNotNull,
];

/// Describes a registered type for listing endpoints.
#[cfg_attr(feature = "utoipa", derive(ToSchema))]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeInfo {
    pub type_id: String,
    pub config_schema_name: String,
    pub sort_column_name: String,
    pub operators: Vec<String>,
}

/// Per-type contract. Implementations must be pure: no hidden per-call state.
pub trait TypeHandler: Send + Sync + 'static {
    type Config: ConfigModel;

    fn type_id(&self) -> &'static str;

    /// Coerces validated input into its canonical envelope.
    fn to_storage(&self, input: &Value, config: &Self::Config) -> Result<ValueEnvelope, String>;

    /// Inverse of `to_storage` for reads.
    fn from_storage(&self, envelope: &ValueEnvelope, _config: &Self::Config) -> Value {
        envelope.raw.clone()
    }

    /// Pure predicate run before every write.
    fn validate(&self, input: &Value, config: &Self::Config) -> Result<(), String>;

    fn sort_column(&self) -> ProjectionColumn;

    fn operators(&self) -> &'static [Operator] {
        TEXT_OPERATORS
    }

    /// Converts a filter value into something comparable with `sort_column()`.
    fn coerce_operand(&self, value: &Value, config: &Self::Config) -> Result<Operand, String>;

    fn filter_predicate(
        &self,
        column: ProjectionColumn,
        operator: Operator,
        value: &Value,
        config: &Self::Config,
    ) -> Result<Predicate, PredicateError> {
        if !TypeHandler::operators(self).contains(&operator) {
            return Err(PredicateError::Unsupported);
        }
        standard_predicate(column, operator, value, |operand| {
            TypeHandler::coerce_operand(self, operand, config)
        })
    }
}

/// Object-safe view of a [`TypeHandler`] keyed on the type-erased config.
pub trait DynTypeHandler: Send + Sync {
    fn type_id(&self) -> &'static str;
    fn config_schema_name(&self) -> &'static str;
    fn parse_config(&self, raw: &Value) -> Result<FieldConfig, String>;
    fn to_storage(&self, input: &Value, config: &FieldConfig) -> Result<ValueEnvelope, String>;
    fn from_storage(&self, envelope: &ValueEnvelope, config: &FieldConfig) -> Result<Value, String>;
    fn validate(&self, input: &Value, config: &FieldConfig) -> Result<(), String>;
    fn sort_column(&self) -> ProjectionColumn;
    fn operators(&self) -> &'static [Operator];
    fn filter_predicate(
        &self,
        column: ProjectionColumn,
        operator: Operator,
        value: &Value,
        config: &FieldConfig,
    ) -> Result<Predicate, PredicateError>;

    fn info(&self) -> TypeInfo {
        TypeInfo {
            type_id: self.type_id().to_string(),
            config_schema_name: self.config_schema_name().to_string(),
            sort_column_name: self.sort_column().as_str().to_string(),
            operators: self.operators().iter().map(|op| op.as_str().to_string()).collect(),
        }
    }
}

fn typed_config<'a, H: TypeHandler>(handler: &H, config: &'a FieldConfig) -> Result<&'a H::Config, String> {
    H::Config::from_field_config(config).ok_or_else(|| {
        format!(
            "config {} does not belong to field type '{}'",
            config.schema_name(),
            TypeHandler::type_id(handler)
        )
    })
}

impl<H: TypeHandler> DynTypeHandler for H {
    fn type_id(&self) -> &'static str {
        TypeHandler::type_id(self)
    }

    fn config_schema_name(&self) -> &'static str {
        H::Config::SCHEMA_NAME
    }

    fn parse_config(&self, raw: &Value) -> Result<FieldConfig, String> {
        parse_config::<H::Config>(raw).map(ConfigModel::into_field_config)
    }

    fn to_storage(&self, input: &Value, config: &FieldConfig) -> Result<ValueEnvelope, String> {
        let config = typed_config(self, config)?;
        TypeHandler::to_storage(self, input, config)
    }

    fn from_storage(&self, envelope: &ValueEnvelope, config: &FieldConfig) -> Result<Value, String> {
        let config = typed_config(self, config)?;
        if envelope.is_empty() {
            return Ok(Value::Null);
        }
        Ok(TypeHandler::from_storage(self, envelope, config))
    }

    fn validate(&self, input: &Value, config: &FieldConfig) -> Result<(), String> {
        let config = typed_config(self, config)?;
        TypeHandler::validate(self, input, config)
    }

    fn sort_column(&self) -> ProjectionColumn {
        TypeHandler::sort_column(self)
    }

    fn operators(&self) -> &'static [Operator] {
        TypeHandler::operators(self)
    }

    fn filter_predicate(
        &self,
        column: ProjectionColumn,
        operator: Operator,
        value: &Value,
        config: &FieldConfig,
    ) -> Result<Predicate, PredicateError> {
        let config = typed_config(self, config).map_err(PredicateError::InvalidOperand)?;
        TypeHandler::filter_predicate(self, column, operator, value, config)
    }
}

/// Reads a scalar input as trimmed text. Numbers and booleans are stringified.
pub(crate) fn input_text(input: &Value) -> Result<String, String> {
    match input {
        Value::String(text) => Ok(text.trim().to_string()),
        Value::Number(number) => Ok(number.to_string()),
        Value::Bool(flag) => Ok(flag.to_string()),
        Value::Null => Err("Value is required".to_string()),
        _ => Err("Value must be a string".to_string()),
    }
}

/// Text operand lowercased to line up with the lowercased `value_text` projection.
pub(crate) fn lowercase_operand(value: &Value) -> Result<Operand, String> {
    input_text(value).map(|text| Operand::Text(text.to_lowercase()))
}
