use std::fmt::Debug;

use serde::de::DeserializeOwned;
use serde::{Serialize, Serializer};
use serde_json::Value;

use super::{
    BooleanConfig, DateConfig, DateTimeConfig, EmailConfig, IntegerConfig, MonetaryConfig, MultiSelectConfig,
    NumberConfig, SelectConfig, TextConfig, UrlConfig, YearMonthConfig,
};

/// Validated per-field options of one field type.
pub trait ConfigModel: Serialize + DeserializeOwned + Default + Clone + Debug + Send + Sync + 'static {
    const SCHEMA_NAME: &'static str;

    /// Cross-option checks that serde cannot express (bounds ordering, regex syntax, ...).
    fn check(&self) -> Result<(), String> {
        Ok(())
    }

    fn into_field_config(self) -> FieldConfig;

    fn from_field_config(config: &FieldConfig) -> Option<&Self>;
}

/// Parses a config payload: `null` means defaults, anything but an object is rejected,
/// and unknown keys fail through `deny_unknown_fields` on every model.
pub fn parse_config<C: ConfigModel>(raw: &Value) -> Result<C, String> {
    let config: C = match raw {
        Value::Null => C::default(),
        Value::Object(_) => serde_json::from_value(raw.clone()).map_err(|err| err.to_string())?,
        other => return Err(format!("config must be a JSON object, got {other}")),
    };
    config.check()?;
    Ok(config)
}

/// Type-erased config, one variant per config model.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldConfig {
    Text(TextConfig),
    Integer(IntegerConfig),
    Number(NumberConfig),
    Monetary(MonetaryConfig),
    Boolean(BooleanConfig),
    Date(DateConfig),
    DateTime(DateTimeConfig),
    YearMonth(YearMonthConfig),
    Select(SelectConfig),
    MultiSelect(MultiSelectConfig),
    Url(UrlConfig),
    Email(EmailConfig),
}

macro_rules! field_config_models {
    ($($variant:ident => $model:ty, $name:literal;)+) => {
        $(
            impl ConfigModel for $model {
                const SCHEMA_NAME: &'static str = $name;

                fn check(&self) -> Result<(), String> {
                    <$model>::check_options(self)
                }

                fn into_field_config(self) -> FieldConfig {
                    FieldConfig::$variant(self)
                }

                fn from_field_config(config: &FieldConfig) -> Option<&Self> {
                    match config {
                        FieldConfig::$variant(inner) => Some(inner),
                        _ => None,
                    }
                }
            }
        )+

        impl FieldConfig {
            pub fn schema_name(&self) -> &'static str {
                match self {
                    $(FieldConfig::$variant(_) => $name,)+
                }
            }

            pub fn to_json(&self) -> Value {
                let encoded = match self {
                    $(FieldConfig::$variant(inner) => serde_json::to_value(inner),)+
                };
                encoded.unwrap_or(Value::Object(Default::default()))
            }
        }

        impl Serialize for FieldConfig {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: Serializer,
            {
                match self {
                    $(FieldConfig::$variant(inner) => inner.serialize(serializer),)+
                }
            }
        }
    };
}

field_config_models! {
    Text => TextConfig, "TextConfig";
    Integer => IntegerConfig, "IntegerConfig";
    Number => NumberConfig, "NumberConfig";
    Monetary => MonetaryConfig, "MonetaryConfig";
    Boolean => BooleanConfig, "BooleanConfig";
    Date => DateConfig, "DateConfig";
    DateTime => DateTimeConfig, "DateTimeConfig";
    YearMonth => YearMonthConfig, "YearMonthConfig";
    Select => SelectConfig, "SelectConfig";
    MultiSelect => MultiSelectConfig, "MultiSelectConfig";
    Url => UrlConfig, "UrlConfig";
    Email => EmailConfig, "EmailConfig";
}
