use std::borrow::Cow;

use thiserror::Error;
use uuid::Uuid;

/// Top-level error type returned by the custom field engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// No handler is registered for the requested type id.
    #[error("unknown field type '{type_id}'")]
    UnknownType { type_id: String },

    /// A handler with the same type id was registered twice.
    #[error("field type '{type_id}' is already registered")]
    DuplicateType { type_id: String },

    /// A config payload did not validate against the type's config model.
    #[error("invalid config for field type '{type_id}': {message}")]
    InvalidConfig { type_id: String, message: String },

    /// A single value was rejected by its field's handler.
    #[error("invalid value for field {field_id}: {message}")]
    InvalidValue { field_id: Uuid, message: String },

    /// Validation failed for one or more fields of a bulk write.
    #[error("validation failed")]
    Validation(#[from] ValidationError),

    /// The operator is not defined for the field's type.
    #[error("operator '{operator}' is not supported by field type '{type_id}'")]
    UnsupportedOperator { type_id: String, operator: String },

    /// A uniqueness constraint rejected the write.
    #[error("conflict on {constraint}")]
    Conflict { constraint: String },

    /// Target entity was not found.
    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },

    /// A field update would leave existing values uninterpretable.
    #[error("config change for field {field_id} would break existing values: {reason}")]
    BreakingConfigChange { field_id: Uuid, reason: String },

    /// Underlying database call failed.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Malformed filter, sort, or paging input.
    #[error("invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("{message}")]
    Other { message: Cow<'static, str> },
}

impl EngineError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// Maps SQLite unique/primary-key violations to `Conflict`, leaving other errors untouched.
    pub(crate) fn from_constraint(err: rusqlite::Error, constraint: &str) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(failure, _)
                if failure.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Self::Conflict {
                    constraint: constraint.to_string(),
                }
            }
            _ => Self::Database(err),
        }
    }

    /// True for errors that are caller mistakes rather than catalog drift or I/O.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidValue { .. } | Self::Validation(_) | Self::InvalidConfig { .. }
        )
    }
}

/// Collection of validation issues encountered while preparing a bulk write.
#[derive(Debug, Error)]
#[error("validation errors: {issues:?}")]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationError {
    pub fn new<I>(issues: I) -> Self
    where
        I: IntoIterator<Item = ValidationIssue>,
    {
        Self {
            issues: issues.into_iter().collect(),
        }
    }

    /// Convenience helper for constructing a single-field validation error.
    pub fn single(field: impl Into<String>, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new([ValidationIssue::new(field, code, message)])
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Detailed validation failure for a single field.
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    pub field: String,
    pub code: String,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(field: impl Into<String>, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            code: code.into(),
            message: message.into(),
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
