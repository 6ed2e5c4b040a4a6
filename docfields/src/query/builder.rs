use std::collections::HashMap;
use std::sync::Arc;

use rusqlite::ToSql;
use uuid::Uuid;

use super::filter::{FieldFilter, FilterExpr, Paging, SortSpec};
use super::predicate::{Operand, PredicateError};
use crate::envelope::ProjectionColumn;
use crate::errors::{EngineError, EngineResult};
use crate::field_types::{DynTypeHandler, FieldConfig};

const VALUE_ALIAS: &str = "v";
const SORT_ALIAS: &str = "s";

/// A field referenced by a query, with its handler and parsed config.
#[derive(Clone)]
pub struct ResolvedField {
    pub field_id: Uuid,
    pub type_id: String,
    pub handler: Arc<dyn DynTypeHandler>,
    pub config: FieldConfig,
}

impl std::fmt::Debug for ResolvedField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedField")
            .field("field_id", &self.field_id)
            .field("type_id", &self.type_id)
            .field("config", &self.config)
            .finish()
    }
}

impl ResolvedField {
    #[inline]
    pub fn sort_column(&self) -> ProjectionColumn {
        self.handler.sort_column()
    }
}

/// SQL over `documents d` with its bound parameters, split so the same filter
/// feeds both the count and the page query.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pub join_sql: String,
    pub join_params: Vec<Operand>,
    pub where_sql: String,
    pub where_params: Vec<Operand>,
    pub order_sql: String,
}

impl CompiledQuery {
    pub fn count_sql(&self) -> String {
        format!("SELECT COUNT(*) FROM documents d WHERE {}", self.where_sql)
    }

    pub fn count_params(&self) -> Vec<&dyn ToSql> {
        self.where_params.iter().map(|operand| operand as &dyn ToSql).collect()
    }

    /// Page query selecting document ids; `LIMIT`/`OFFSET` are the last two parameters.
    pub fn page_sql(&self) -> String {
        format!(
            "SELECT d.id FROM documents d{} WHERE {} ORDER BY {} LIMIT ? OFFSET ?",
            self.join_sql, self.where_sql, self.order_sql
        )
    }

    pub fn page_params(&self, paging: Paging) -> Vec<Operand> {
        let mut params = Vec::with_capacity(self.join_params.len() + self.where_params.len() + 2);
        params.extend(self.join_params.iter().cloned());
        params.extend(self.where_params.iter().cloned());
        params.push(Operand::Integer(i64::try_from(paging.page_size).unwrap_or(i64::MAX)));
        params.push(Operand::Integer(i64::try_from(paging.offset()).unwrap_or(i64::MAX)));
        params
    }
}

/// Compiles filter and sort requests against a set of resolved fields.
pub struct QueryBuilder<'a> {
    fields: &'a HashMap<Uuid, ResolvedField>,
}

impl<'a> QueryBuilder<'a> {
    pub fn new(fields: &'a HashMap<Uuid, ResolvedField>) -> Self {
        Self { fields }
    }

    fn resolve(&self, field_id: Uuid) -> EngineResult<&'a ResolvedField> {
        self.fields
            .get(&field_id)
            .ok_or_else(|| EngineError::not_found("custom field", field_id))
    }

    pub fn compile(&self, filter: Option<&FilterExpr>, sort: Option<&SortSpec>) -> EngineResult<CompiledQuery> {
        let mut where_params = Vec::new();
        let where_sql = match filter {
            Some(expr) => self.compile_expr(expr, &mut where_params)?,
            None => "1 = 1".to_string(),
        };

        let (join_sql, join_params, order_sql) = match sort {
            Some(sort) => {
                let field = self.resolve(sort.field_id)?;
                let column = format!("{SORT_ALIAS}.{}", field.sort_column());
                let join = format!(
                    " LEFT JOIN custom_field_values {SORT_ALIAS} ON {SORT_ALIAS}.document_id = d.id AND {SORT_ALIAS}.field_id = ?"
                );
                // Rows without a value sort last in both directions.
                let order = format!("{column} IS NULL, {column} {}, d.id", sort.order.as_str());
                (join, vec![Operand::Text(field.field_id.to_string())], order)
            }
            None => (String::new(), Vec::new(), "d.created_at, d.id".to_string()),
        };

        log::debug!("compiled document query: WHERE {where_sql} ORDER BY {order_sql}");
        Ok(CompiledQuery {
            join_sql,
            join_params,
            where_sql,
            where_params,
            order_sql,
        })
    }

    fn compile_expr(&self, expr: &FilterExpr, params: &mut Vec<Operand>) -> EngineResult<String> {
        match expr {
            FilterExpr::Condition(filter) => self.compile_condition(filter, params),
            FilterExpr::And(parts) => self.compile_group(parts, " AND ", "1 = 1", params),
            FilterExpr::Or(parts) => self.compile_group(parts, " OR ", "0 = 1", params),
        }
    }

    fn compile_group(
        &self,
        parts: &[FilterExpr],
        separator: &str,
        empty: &str,
        params: &mut Vec<Operand>,
    ) -> EngineResult<String> {
        if parts.is_empty() {
            return Ok(empty.to_string());
        }
        let clauses = parts
            .iter()
            .map(|part| self.compile_expr(part, params).map(|sql| format!("({sql})")))
            .collect::<EngineResult<Vec<_>>>()?;
        Ok(clauses.join(separator))
    }

    fn compile_condition(&self, filter: &FieldFilter, params: &mut Vec<Operand>) -> EngineResult<String> {
        let field = self.resolve(filter.field_id)?;
        let predicate = field
            .handler
            .filter_predicate(field.sort_column(), filter.operator, &filter.value, &field.config)
            .map_err(|err| match err {
                PredicateError::Unsupported => EngineError::UnsupportedOperator {
                    type_id: field.type_id.clone(),
                    operator: filter.operator.to_string(),
                },
                PredicateError::InvalidOperand(message) => EngineError::InvalidValue {
                    field_id: field.field_id,
                    message,
                },
            })?;

        params.push(Operand::Text(field.field_id.to_string()));
        let pinned = format!(
            "SELECT 1 FROM custom_field_values {VALUE_ALIAS} WHERE {VALUE_ALIAS}.document_id = d.id AND {VALUE_ALIAS}.field_id = ?"
        );
        let clause = predicate.to_sql(VALUE_ALIAS, params);
        if predicate.matches_absent() {
            // Documents without a row satisfy the condition, so look for a row that violates it.
            Ok(format!("NOT EXISTS ({pinned} AND NOT ({clause}))"))
        } else {
            Ok(format!("EXISTS ({pinned} AND ({clause}))"))
        }
    }
}
