//! Per-field predicates and their SQL rendering.
//!
//! A [`Predicate`] always targets a single `custom_field_values` row, referenced by a table
//! alias supplied at render time. The query builder wraps it in an `EXISTS` sub-select that
//! pins the document and field.
//!
//! | Variant          | Target                           | SQL shape                                     |
//! |------------------|----------------------------------|-----------------------------------------------|
//! | `Compare`        | projection column                | `v.value_numeric >= ?`                        |
//! | `InList`         | projection column                | `v.value_text IN (?, ?)`                      |
//! | `IsNull`         | projection column                | `v.value_date IS NULL`                        |
//! | `ILike`          | projection column                | `lower(v.value_text) LIKE ? ESCAPE '\'`       |
//! | `Checked`        | `value_boolean`                  | `v.value_boolean = 1`                         |
//! | `RawEquals`      | `value_json -> raw`              | `json_extract(v.value_json, '$.raw') = ?`     |
//! | `ArrayOverlap`   | `value_json -> raw` (array)      | `EXISTS (SELECT 1 FROM json_each(...) ...)`   |
//! | `ArrayContains`  | `value_json -> raw` (array)      | `(SELECT COUNT(DISTINCT ...)) = n`            |

use rusqlite::ToSql;
use rusqlite::types::{ToSqlOutput, Value as SqlValue};
use serde_json::Value;

use crate::envelope::ProjectionColumn;
use crate::query::filter::Operator;

const RAW_PATH: &str = "'$.raw'";

/// Bound parameter for a rendered predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Text(String),
    Integer(i64),
    Real(f64),
    Bool(bool),
}

impl ToSql for Operand {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Operand::Text(text) => ToSqlOutput::from(text.as_str()),
            Operand::Integer(value) => ToSqlOutput::Owned(SqlValue::Integer(*value)),
            Operand::Real(value) => ToSqlOutput::Owned(SqlValue::Real(*value)),
            Operand::Bool(value) => ToSqlOutput::Owned(SqlValue::Integer(i64::from(*value))),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl Comparison {
    #[inline]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Comparison::Eq => "=",
            Comparison::Ne => "<>",
            Comparison::Gt => ">",
            Comparison::Gte => ">=",
            Comparison::Lt => "<",
            Comparison::Lte => "<=",
        }
    }

    pub fn from_operator(operator: Operator) -> Option<Self> {
        match operator {
            Operator::Eq => Some(Comparison::Eq),
            Operator::Ne => Some(Comparison::Ne),
            Operator::Gt => Some(Comparison::Gt),
            Operator::Gte => Some(Comparison::Gte),
            Operator::Lt => Some(Comparison::Lt),
            Operator::Lte => Some(Comparison::Lte),
            _ => None,
        }
    }
}

/// Why a handler could not build a predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum PredicateError {
    Unsupported,
    InvalidOperand(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Compare {
        column: ProjectionColumn,
        comparison: Comparison,
        operand: Operand,
    },
    InList {
        column: ProjectionColumn,
        operands: Vec<Operand>,
        negated: bool,
    },
    IsNull {
        column: ProjectionColumn,
        negated: bool,
    },
    ILike {
        column: ProjectionColumn,
        needle: String,
        negated: bool,
    },
    Checked {
        checked: bool,
    },
    RawEquals {
        operand: Operand,
        negated: bool,
    },
    RawIn {
        operands: Vec<Operand>,
        negated: bool,
    },
    RawIsNull {
        negated: bool,
    },
    ArrayEmpty {
        negated: bool,
    },
    ArrayOverlap {
        values: Vec<String>,
        negated: bool,
    },
    ArrayContains {
        values: Vec<String>,
    },
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
}

impl Predicate {
    /// True when a document without any stored row for the field should match.
    pub fn matches_absent(&self) -> bool {
        match self {
            Predicate::IsNull { negated, .. } => !negated,
            Predicate::RawIsNull { negated } | Predicate::ArrayEmpty { negated } => !negated,
            Predicate::Checked { checked } => !checked,
            Predicate::ArrayOverlap { negated, .. } => *negated,
            Predicate::And(parts) => !parts.is_empty() && parts.iter().all(Predicate::matches_absent),
            Predicate::Or(parts) => parts.iter().any(Predicate::matches_absent),
            _ => false,
        }
    }

    /// Render against the values row aliased `alias`, appending bound parameters in order.
    pub fn to_sql(&self, alias: &str, params: &mut Vec<Operand>) -> String {
        match self {
            Predicate::Compare {
                column,
                comparison,
                operand,
            } => {
                params.push(operand.clone());
                format!("{alias}.{column} {} ?", comparison.as_sql())
            }
            Predicate::InList {
                column,
                operands,
                negated,
            } => {
                if operands.is_empty() {
                    return empty_set(*negated);
                }
                let placeholders = placeholders(operands.len());
                params.extend(operands.iter().cloned());
                let keyword = if *negated { "NOT IN" } else { "IN" };
                format!("{alias}.{column} {keyword} ({placeholders})")
            }
            Predicate::IsNull { column, negated } => {
                let keyword = if *negated { "IS NOT NULL" } else { "IS NULL" };
                format!("{alias}.{column} {keyword}")
            }
            Predicate::ILike {
                column,
                needle,
                negated,
            } => {
                params.push(Operand::Text(like_contains_pattern(needle)));
                let clause = format!("lower({alias}.{column}) LIKE ? ESCAPE '\\'");
                if *negated { format!("NOT ({clause})") } else { clause }
            }
            Predicate::Checked { checked } => {
                if *checked {
                    format!("{alias}.value_boolean = 1")
                } else {
                    format!("{alias}.value_boolean IS NOT 1")
                }
            }
            Predicate::RawEquals { operand, negated } => {
                params.push(operand.clone());
                let op = if *negated { "<>" } else { "=" };
                format!("json_extract({alias}.value_json, {RAW_PATH}) {op} ?")
            }
            Predicate::RawIn { operands, negated } => {
                if operands.is_empty() {
                    return empty_set(*negated);
                }
                let placeholders = placeholders(operands.len());
                params.extend(operands.iter().cloned());
                let keyword = if *negated { "NOT IN" } else { "IN" };
                format!("json_extract({alias}.value_json, {RAW_PATH}) {keyword} ({placeholders})")
            }
            Predicate::RawIsNull { negated } => {
                let keyword = if *negated { "IS NOT NULL" } else { "IS NULL" };
                format!("json_extract({alias}.value_json, {RAW_PATH}) {keyword}")
            }
            Predicate::ArrayEmpty { negated } => {
                let op = if *negated { ">" } else { "=" };
                format!("COALESCE(json_array_length({alias}.value_json, {RAW_PATH}), 0) {op} 0")
            }
            Predicate::ArrayOverlap { values, negated } => {
                if values.is_empty() {
                    return empty_set(*negated);
                }
                let placeholders = placeholders(values.len());
                params.extend(values.iter().cloned().map(Operand::Text));
                let keyword = if *negated { "NOT EXISTS" } else { "EXISTS" };
                format!(
                    "{keyword} (SELECT 1 FROM json_each({alias}.value_json, {RAW_PATH}) AS je WHERE je.value IN ({placeholders}))"
                )
            }
            Predicate::ArrayContains { values } => {
                if values.is_empty() {
                    return "1 = 1".to_string();
                }
                let placeholders = placeholders(values.len());
                params.extend(values.iter().cloned().map(Operand::Text));
                format!(
                    "(SELECT COUNT(DISTINCT je.value) FROM json_each({alias}.value_json, {RAW_PATH}) AS je WHERE je.value IN ({placeholders})) = {}",
                    values.len()
                )
            }
            Predicate::And(parts) => join_parts(parts, " AND ", "1 = 1", alias, params),
            Predicate::Or(parts) => join_parts(parts, " OR ", "0 = 1", alias, params),
        }
    }
}

fn join_parts(parts: &[Predicate], separator: &str, empty: &str, alias: &str, params: &mut Vec<Operand>) -> String {
    match parts.len() {
        0 => empty.to_string(),
        1 => parts[0].to_sql(alias, params),
        _ => {
            let clauses: Vec<String> = parts.iter().map(|part| format!("({})", part.to_sql(alias, params))).collect();
            clauses.join(separator)
        }
    }
}

fn empty_set(negated: bool) -> String {
    if negated { "1 = 1".to_string() } else { "0 = 1".to_string() }
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

/// Lowercases the needle, escapes LIKE metacharacters, and wraps it for substring matching.
pub fn like_contains_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for ch in needle.to_lowercase().chars() {
        if matches!(ch, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}

/// Splits a filter value into list elements: arrays stay arrays, scalars become one element.
pub fn operand_list(value: &Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items.clone(),
        Value::Null => Vec::new(),
        other => vec![other.clone()],
    }
}

/// Renders a scalar filter value as text.
pub fn operand_text(value: &Value) -> Result<String, PredicateError> {
    match value {
        Value::String(text) => Ok(text.clone()),
        Value::Number(number) => Ok(number.to_string()),
        Value::Bool(flag) => Ok(flag.to_string()),
        other => Err(PredicateError::InvalidOperand(format!("expected a scalar value, got {other}"))),
    }
}

/// Default predicate construction shared by column-backed handlers.
///
/// `coerce` turns a filter value into an operand comparable with the handler's projection.
pub fn standard_predicate<F>(
    column: ProjectionColumn,
    operator: Operator,
    value: &Value,
    mut coerce: F,
) -> Result<Predicate, PredicateError>
where
    F: FnMut(&Value) -> Result<Operand, String>,
{
    if let Some(comparison) = Comparison::from_operator(operator) {
        let operand = coerce(value).map_err(PredicateError::InvalidOperand)?;
        return Ok(Predicate::Compare {
            column,
            comparison,
            operand,
        });
    }

    match operator {
        Operator::In | Operator::NotIn => {
            let operands = operand_list(value)
                .iter()
                .map(&mut coerce)
                .collect::<Result<Vec<_>, _>>()
                .map_err(PredicateError::InvalidOperand)?;
            Ok(Predicate::InList {
                column,
                operands,
                negated: operator == Operator::NotIn,
            })
        }
        Operator::IsNull | Operator::IsNotNull => Ok(Predicate::IsNull {
            column,
            negated: operator == Operator::IsNotNull,
        }),
        Operator::ILike | Operator::NotILike => Ok(Predicate::ILike {
            column,
            needle: operand_text(value)?,
            negated: operator == Operator::NotILike,
        }),
        _ => Err(PredicateError::Unsupported),
    }
}
