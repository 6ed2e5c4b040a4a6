use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[cfg(feature = "utoipa")]
use utoipa::ToSchema;

use crate::errors::EngineError;

pub const DEFAULT_PAGE: u64 = 1;
pub const DEFAULT_PAGE_SIZE: u64 = 25;
pub const MAX_PAGE_SIZE: u64 = 100;

/// Filter operators understood by the query builder. Each handler declares the subset it accepts.
#[cfg_attr(feature = "utoipa", derive(ToSchema))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    NotIn,
    IsNull,
    IsNotNull,
    #[serde(rename = "ilike")]
    ILike,
    #[serde(rename = "not_ilike")]
    NotILike,
    IsChecked,
    IsNotChecked,
    Any,
    All,
    Not,
}

impl Operator {
    pub const fn as_str(self) -> &'static str {
        match self {
            Operator::Eq => "eq",
            Operator::Ne => "ne",
            Operator::Gt => "gt",
            Operator::Gte => "gte",
            Operator::Lt => "lt",
            Operator::Lte => "lte",
            Operator::In => "in",
            Operator::NotIn => "not_in",
            Operator::IsNull => "is_null",
            Operator::IsNotNull => "is_not_null",
            Operator::ILike => "ilike",
            Operator::NotILike => "not_ilike",
            Operator::IsChecked => "is_checked",
            Operator::IsNotChecked => "is_not_checked",
            Operator::Any => "any",
            Operator::All => "all",
            Operator::Not => "not",
        }
    }

    /// Operators whose value is a list.
    pub const fn takes_list(self) -> bool {
        matches!(
            self,
            Operator::In | Operator::NotIn | Operator::Any | Operator::All | Operator::Not
        )
    }

    /// Operators that ignore their value.
    pub const fn is_unary(self) -> bool {
        matches!(
            self,
            Operator::IsNull | Operator::IsNotNull | Operator::IsChecked | Operator::IsNotChecked
        )
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operator {
    type Err = EngineError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let operator = match raw.trim().to_ascii_lowercase().as_str() {
            "eq" => Operator::Eq,
            "ne" => Operator::Ne,
            "gt" => Operator::Gt,
            "gte" => Operator::Gte,
            "lt" => Operator::Lt,
            "lte" => Operator::Lte,
            "in" => Operator::In,
            "not_in" => Operator::NotIn,
            "is_null" => Operator::IsNull,
            "is_not_null" => Operator::IsNotNull,
            "ilike" => Operator::ILike,
            "not_ilike" => Operator::NotILike,
            "is_checked" => Operator::IsChecked,
            "is_not_checked" => Operator::IsNotChecked,
            "any" => Operator::Any,
            "all" => Operator::All,
            "not" => Operator::Not,
            other => {
                return Err(EngineError::invalid_request(format!("Unsupported filter operator: {other}")));
            }
        };
        Ok(operator)
    }
}

/// A single `{field_id, operator, value}` condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldFilter {
    pub field_id: Uuid,
    pub operator: Operator,
    #[serde(default)]
    pub value: Value,
}

impl FieldFilter {
    pub fn new(field_id: Uuid, operator: Operator, value: impl Into<Value>) -> Self {
        Self {
            field_id,
            operator,
            value: value.into(),
        }
    }

    /// Parses the compact `field_id:operator:value` form.
    ///
    /// List operators split the value on `,` or `|`; unary operators may omit the value.
    pub fn parse(raw: &str) -> Result<Self, EngineError> {
        let parts: Vec<&str> = raw.splitn(3, ':').collect();
        if parts.len() < 2 {
            return Err(EngineError::invalid_request(format!("Invalid filter syntax: {raw}")));
        }

        let field_id = Uuid::parse_str(parts[0].trim())
            .map_err(|_| EngineError::invalid_request(format!("Invalid field id in filter: {}", parts[0])))?;
        let operator: Operator = parts[1].parse()?;
        let rest = parts.get(2).copied();

        let value = if operator.is_unary() {
            Value::Null
        } else if operator.takes_list() {
            let rest = rest.unwrap_or_default();
            Value::Array(
                rest.split(['|', ','])
                    .map(str::trim)
                    .filter(|segment| !segment.is_empty())
                    .map(|segment| Value::String(segment.to_string()))
                    .collect(),
            )
        } else {
            match rest {
                Some(text) => Value::String(text.to_string()),
                None => {
                    return Err(EngineError::invalid_request(format!(
                        "Filter operator {operator} requires a value"
                    )));
                }
            }
        };

        Ok(Self {
            field_id,
            operator,
            value,
        })
    }
}

/// Boolean composition of field conditions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterExpr {
    Condition(FieldFilter),
    And(Vec<FilterExpr>),
    Or(Vec<FilterExpr>),
}

impl FilterExpr {
    #[inline]
    pub fn condition(field_id: Uuid, operator: Operator, value: impl Into<Value>) -> Self {
        Self::Condition(FieldFilter::new(field_id, operator, value))
    }

    #[inline]
    pub fn and(parts: impl IntoIterator<Item = FilterExpr>) -> Self {
        Self::And(parts.into_iter().collect())
    }

    #[inline]
    pub fn or(parts: impl IntoIterator<Item = FilterExpr>) -> Self {
        Self::Or(parts.into_iter().collect())
    }

    /// Every field id referenced anywhere in the expression.
    pub fn field_ids(&self) -> Vec<Uuid> {
        let mut ids = Vec::new();
        self.collect_field_ids(&mut ids);
        ids
    }

    fn collect_field_ids(&self, ids: &mut Vec<Uuid>) {
        match self {
            FilterExpr::Condition(filter) => {
                if !ids.contains(&filter.field_id) {
                    ids.push(filter.field_id);
                }
            }
            FilterExpr::And(parts) | FilterExpr::Or(parts) => {
                for part in parts {
                    part.collect_field_ids(ids);
                }
            }
        }
    }
}

#[cfg_attr(feature = "utoipa", derive(ToSchema))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    #[inline]
    pub const fn as_str(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

impl FromStr for SortOrder {
    type Err = EngineError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            other => Err(EngineError::invalid_request(format!("Unsupported sort order: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub field_id: Uuid,
    #[serde(default)]
    pub order: SortOrder,
}

impl SortSpec {
    pub fn new(field_id: Uuid, order: SortOrder) -> Self {
        Self { field_id, order }
    }

    /// Parses `field_id` (ascending) or `-field_id` (descending).
    pub fn parse(raw: &str) -> Result<Self, EngineError> {
        let raw = raw.trim();
        let (id, order) = match raw.strip_prefix('-') {
            Some(rest) => (rest, SortOrder::Desc),
            None => (raw, SortOrder::Asc),
        };
        let field_id = Uuid::parse_str(id)
            .map_err(|_| EngineError::invalid_request(format!("Unsupported sort field: {raw}")))?;
        Ok(Self { field_id, order })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paging {
    pub page: u64,
    pub page_size: u64,
}

impl Default for Paging {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl Paging {
    pub fn new(page: u64, page_size: u64) -> Self {
        Self { page, page_size }
    }

    /// Clamps to a 1-based page and a page size within `[1, max_page_size]`.
    pub fn normalized(self, max_page_size: u64) -> Self {
        Self {
            page: self.page.max(1),
            page_size: self.page_size.clamp(1, max_page_size.max(1)),
        }
    }

    #[inline]
    pub fn offset(&self) -> u64 {
        self.page.saturating_sub(1).saturating_mul(self.page_size)
    }
}

#[derive(Debug, Clone)]
pub struct SearchResult<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub page_size: u64,
}

impl<T> SearchResult<T> {
    #[inline]
    pub fn has_more(&self) -> bool {
        self.page.saturating_mul(self.page_size) < self.total
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub page_size: u64,
    pub has_more: bool,
}

impl<T: Serialize> From<SearchResult<T>> for PaginatedResponse<T> {
    fn from(value: SearchResult<T>) -> Self {
        Self {
            has_more: value.has_more(),
            page: value.page,
            page_size: value.page_size,
            total: value.total,
            items: value.items,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const FIELD: &str = "550e8400-e29b-41d4-a716-446655440000";

    #[test]
    fn parses_list_operator_values() {
        let filter = FieldFilter::parse(&format!("{FIELD}:any:hr|dev, legal")).unwrap();
        assert_eq!(filter.operator, Operator::Any);
        assert_eq!(filter.value, json!(["hr", "dev", "legal"]));
    }

    #[test]
    fn parses_unary_operator_without_value() {
        let filter = FieldFilter::parse(&format!("{FIELD}:is_null")).unwrap();
        assert_eq!(filter.operator, Operator::IsNull);
        assert!(filter.value.is_null());
    }

    #[test]
    fn scalar_value_keeps_colons() {
        let filter = FieldFilter::parse(&format!("{FIELD}:eq:10:30")).unwrap();
        assert_eq!(filter.value, json!("10:30"));
    }

    #[test]
    fn rejects_unknown_operator() {
        let err = FieldFilter::parse(&format!("{FIELD}:fuzzy:abc")).unwrap_err();
        assert!(matches!(err, EngineError::InvalidRequest { .. }));
    }

    #[test]
    fn rejects_missing_value_for_binary_operator() {
        assert!(FieldFilter::parse(&format!("{FIELD}:gt")).is_err());
    }

    #[test]
    fn operator_serde_names_match_as_str() {
        for operator in [Operator::ILike, Operator::NotILike, Operator::IsNotChecked, Operator::NotIn] {
            let json = serde_json::to_value(operator).unwrap();
            assert_eq!(json, json!(operator.as_str()));
        }
    }

    #[test]
    fn sort_spec_parses_descending_prefix() {
        let sort = SortSpec::parse(&format!("-{FIELD}")).unwrap();
        assert_eq!(sort.order, SortOrder::Desc);
        assert_eq!(sort.field_id.to_string(), FIELD);
    }

    #[test]
    fn paging_is_clamped() {
        let paging = Paging::new(0, 1000).normalized(MAX_PAGE_SIZE);
        assert_eq!(paging.page, 1);
        assert_eq!(paging.page_size, MAX_PAGE_SIZE);
        assert_eq!(Paging::new(3, 10).offset(), 20);
    }

    #[test]
    fn field_ids_are_deduplicated() {
        let id = Uuid::parse_str(FIELD).unwrap();
        let expr = FilterExpr::and([
            FilterExpr::condition(id, Operator::Eq, "a"),
            FilterExpr::or([FilterExpr::condition(id, Operator::Ne, "b")]),
        ]);
        assert_eq!(expr.field_ids(), vec![id]);
    }

    #[test]
    fn has_more_reflects_total() {
        let result = SearchResult::<u8> {
            items: vec![],
            total: 30,
            page: 1,
            page_size: 25,
        };
        assert!(result.has_more());
    }

    #[test]
    fn huge_pages_saturate_instead_of_overflowing() {
        let paging = Paging::new(u64::MAX, 100);
        assert_eq!(paging.offset(), u64::MAX);
        let result = SearchResult::<()> {
            items: Vec::new(),
            total: 5,
            page: u64::MAX,
            page_size: 100,
        };
        assert!(!result.has_more());
    }
}
