//! Docfields core library.
//!
//! Typed custom fields for documents: a registry of field type handlers, an envelope value
//! store on SQLite with generated projection columns, and a query builder that filters and
//! sorts documents by field values.

pub mod config;
pub mod engine;
pub mod envelope;
pub mod errors;
pub mod field_types;
pub mod migrations;
pub mod query;
pub mod registry;
pub mod store;
pub mod validators;

pub use config::{ConfigError, EngineConfig};
pub use engine::{Engine, FieldPatch, FieldValue, SortableField};
pub use envelope::{ProjectionColumn, Projections, ValueEnvelope};
pub use errors::*;
pub use field_types::{DynTypeHandler, FieldConfig, TypeHandler, TypeInfo, type_ids};
pub use migrations::{LegacyReport, MigrationReport};
pub use query::{
    FieldFilter, FilterExpr, Operator, PaginatedResponse, Paging, SearchResult, SortOrder, SortSpec,
};
pub use registry::TypeRegistry;
pub use store::{CustomField, Document, DocumentType, DocumentTypeField, StoredValue};

pub use rusqlite;
