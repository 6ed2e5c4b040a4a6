//! The custom field engine: catalog administration, value reads and writes, and document queries.
//!
//! [`Engine`] owns one SQLite connection behind a mutex. Every public operation holds the lock
//! for its duration and every write runs in its own transaction, so a bulk write either lands
//! completely or not at all.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::{Connection, InterruptHandle, TransactionBehavior};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

#[cfg(feature = "utoipa")]
use utoipa::ToSchema;

use crate::config::EngineConfig;
use crate::envelope::{ProjectionColumn, ValueEnvelope};
use crate::errors::{EngineError, EngineResult, ValidationError, ValidationIssue};
use crate::field_types::TypeInfo;
use crate::migrations::{self, MigrationReport};
use crate::query::{FilterExpr, Paging, QueryBuilder, ResolvedField, SearchResult, SortSpec};
use crate::registry::TypeRegistry;
use crate::store::{
    CustomField, Document, DocumentType, StoredValue, document_types, documents, fields, now_timestamp, values,
};

/// Changes requested by [`Engine::update_field`]. `None` leaves the attribute as is.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldPatch {
    pub name: Option<String>,
    /// Accepted only when equal to the current type.
    pub type_id: Option<String>,
    pub config: Option<Value>,
}

impl FieldPatch {
    pub fn name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn config(config: Value) -> Self {
        Self {
            config: Some(config),
            ..Self::default()
        }
    }
}

/// A decoded value as returned by reads.
#[cfg_attr(feature = "utoipa", derive(ToSchema))]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldValue {
    pub field_id: Uuid,
    pub name: String,
    pub type_id: String,
    /// Position on the document's type; `None` when the field is not bound to it.
    pub position: Option<u32>,
    /// Output of the handler's `from_storage`.
    pub value: Value,
    #[cfg_attr(feature = "utoipa", schema(value_type = Object))]
    pub envelope: ValueEnvelope,
    pub updated_at: String,
}

/// A field bound to a document type together with the projection it sorts by.
#[cfg_attr(feature = "utoipa", derive(ToSchema))]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SortableField {
    pub field_id: Uuid,
    pub name: String,
    pub type_id: String,
    pub column: ProjectionColumn,
}

pub struct Engine {
    conn: Mutex<Connection>,
    interrupt: Arc<InterruptHandle>,
    registry: Arc<TypeRegistry>,
    config: EngineConfig,
    migration: MigrationReport,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("registry", &self.registry)
            .field("config", &self.config)
            .field("migration", &self.migration)
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Opens the database named by `config.database.path` and migrates it.
    pub fn open(config: EngineConfig, registry: TypeRegistry) -> EngineResult<Self> {
        let conn = Connection::open(&config.database.path)?;
        log::info!("opened database {}", config.database.path.display());
        Self::from_connection(conn, registry, config)
    }

    /// Opens `path` with default settings and the built-in types.
    pub fn open_path(path: impl AsRef<Path>) -> EngineResult<Self> {
        let mut config = EngineConfig::default();
        config.database.path = path.as_ref().to_path_buf();
        Self::open(config, TypeRegistry::with_builtin_types())
    }

    /// In-memory database with default settings and the built-in types.
    pub fn open_in_memory() -> EngineResult<Self> {
        Self::from_connection(
            Connection::open_in_memory()?,
            TypeRegistry::with_builtin_types(),
            EngineConfig::default(),
        )
    }

    pub fn from_connection(mut conn: Connection, registry: TypeRegistry, config: EngineConfig) -> EngineResult<Self> {
        let migration = migrations::run(&mut conn, &registry)?;
        if let Some(legacy) = &migration.legacy
            && !legacy.invalid.is_empty()
        {
            log::warn!("{} legacy values did not validate and were kept raw", legacy.invalid.len());
        }
        Ok(Self {
            interrupt: conn.get_interrupt_handle().into(),
            conn: Mutex::new(conn),
            registry: Arc::new(registry),
            config,
            migration,
        })
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// What the migrations did when this engine was opened.
    pub fn migration_report(&self) -> &MigrationReport {
        &self.migration
    }

    /// Handle that aborts the statement currently running on the engine's connection.
    pub fn interrupt_handle(&self) -> Arc<InterruptHandle> {
        Arc::clone(&self.interrupt)
    }

    /// Paging with the configured default page size.
    pub fn default_paging(&self) -> Paging {
        Paging::new(1, self.config.query.default_page_size)
    }

    fn lock(&self) -> EngineResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| EngineError::Other {
            message: "engine connection lock poisoned".into(),
        })
    }

    fn resolve(&self, field: &CustomField) -> EngineResult<ResolvedField> {
        let handler = Arc::clone(self.registry.get(&field.type_id)?);
        let config = self.registry.validate_config(&field.type_id, &field.config)?;
        Ok(ResolvedField {
            field_id: field.id,
            type_id: field.type_id.clone(),
            handler,
            config,
        })
    }

    // ---------------------------------------------------------------------
    // Catalog
    // ---------------------------------------------------------------------

    pub fn list_types(&self) -> Vec<TypeInfo> {
        self.registry.list()
    }

    pub fn create_field(&self, name: &str, type_id: &str, config: &Value, owner: &str) -> EngineResult<CustomField> {
        let name = checked_name(name)?;
        let parsed = self.registry.validate_config(type_id, config)?;
        let now = now_timestamp();
        let field = CustomField {
            id: Uuid::new_v4(),
            name,
            type_id: type_id.to_string(),
            config: parsed.to_json(),
            owner: owner.to_string(),
            created_at: now.clone(),
            updated_at: now,
        };

        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        fields::insert_field(&tx, &field)?;
        tx.commit()?;
        log::info!("created {} field '{}' ({})", field.type_id, field.name, field.id);
        Ok(field)
    }

    pub fn get_field(&self, id: Uuid) -> EngineResult<CustomField> {
        let conn = self.lock()?;
        fields::require_field(&conn, id)
    }

    pub fn list_fields(&self, owner: Option<&str>) -> EngineResult<Vec<CustomField>> {
        let conn = self.lock()?;
        fields::list_fields(&conn, owner)
    }

    /// Renames a field and/or replaces its config.
    ///
    /// A new config is first checked against a sample of existing values, then every stored
    /// value is re-encoded under it in the same transaction. Any value the new config rejects
    /// aborts the update with [`EngineError::BreakingConfigChange`]. Changing `type_id` is
    /// always refused.
    pub fn update_field(&self, id: Uuid, patch: FieldPatch) -> EngineResult<CustomField> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut field = fields::require_field(&tx, id)?;

        if let Some(type_id) = patch.type_id.as_deref()
            && type_id != field.type_id
        {
            log::warn!("refused type change of field {id} from '{}' to '{type_id}'", field.type_id);
            return Err(EngineError::BreakingConfigChange {
                field_id: id,
                reason: format!(
                    "type cannot change from '{}' to '{type_id}'; delete the field and create a new one",
                    field.type_id
                ),
            });
        }

        if let Some(name) = patch.name.as_deref() {
            field.name = checked_name(name)?;
        }

        if let Some(raw_config) = patch.config.as_ref() {
            let current = self.resolve(&field)?;
            let next = ResolvedField {
                config: self.registry.validate_config(&field.type_id, raw_config)?,
                ..current.clone()
            };
            if next.config != current.config {
                let breaking = |reason: String| {
                    log::warn!("refused config change of field {id}: {reason}");
                    EngineError::BreakingConfigChange { field_id: id, reason }
                };

                let sample = values::field_values(&tx, id, Some(self.config.engine.validation_sample_size))?;
                for stored in &sample {
                    let input = decoded_input(&current, &stored.envelope);
                    if input.is_null() {
                        continue;
                    }
                    next.handler
                        .validate(&input, &next.config)
                        .map_err(|message| breaking(format!("document {}: {message}", stored.document_id)))?;
                }

                let now = now_timestamp();
                let mut reencoded = 0usize;
                for stored in values::field_values(&tx, id, None)? {
                    let input = decoded_input(&current, &stored.envelope);
                    let envelope = encode(&next, &input)
                        .map_err(|message| breaking(format!("document {}: {message}", stored.document_id)))?;
                    values::upsert_value(&tx, stored.document_id, id, &envelope, &now)?;
                    reencoded += 1;
                }
                log::debug!("re-encoded {reencoded} values of field {id}");
            }
            field.config = next.config.to_json();
        }

        field.updated_at = now_timestamp();
        fields::update_field(&tx, &field)?;
        let updated = fields::require_field(&tx, id)?;
        tx.commit()?;
        log::info!("updated field '{}' ({id})", updated.name);
        Ok(updated)
    }

    /// Deletes a field together with its values and document-type bindings.
    pub fn delete_field(&self, id: Uuid) -> EngineResult<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        if !fields::soft_delete_field(&tx, id, &now_timestamp())? {
            return Err(EngineError::not_found("custom field", id));
        }
        tx.commit()?;
        log::info!("deleted field {id}");
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Document types
    // ---------------------------------------------------------------------

    pub fn create_document_type(&self, name: &str, owner: &str) -> EngineResult<DocumentType> {
        let document_type = DocumentType {
            id: Uuid::new_v4(),
            name: checked_name(name)?,
            owner: owner.to_string(),
            fields: Vec::new(),
            created_at: now_timestamp(),
        };
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        document_types::insert_document_type(&tx, &document_type)?;
        tx.commit()?;
        log::info!("created document type '{}' ({})", document_type.name, document_type.id);
        Ok(document_type)
    }

    pub fn get_document_type(&self, id: Uuid) -> EngineResult<DocumentType> {
        let conn = self.lock()?;
        document_types::require_document_type(&conn, id)
    }

    pub fn list_document_types(&self, owner: Option<&str>) -> EngineResult<Vec<DocumentType>> {
        let conn = self.lock()?;
        document_types::list_document_types(&conn, owner)
    }

    /// Deletes a document type. Its documents survive without a type.
    pub fn delete_document_type(&self, id: Uuid) -> EngineResult<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        if !document_types::delete_document_type(&tx, id)? {
            return Err(EngineError::not_found("document type", id));
        }
        tx.commit()?;
        log::info!("deleted document type {id}");
        Ok(())
    }

    /// Replaces the ordered field list of a document type.
    ///
    /// Fields dropped from the list lose their binding; their stored values stay but are no
    /// longer returned by [`Engine::get_values`].
    pub fn set_document_type_fields(&self, document_type_id: Uuid, field_ids: &[Uuid]) -> EngineResult<DocumentType> {
        let mut seen = HashSet::with_capacity(field_ids.len());
        if let Some(duplicate) = field_ids.iter().find(|id| !seen.insert(**id)) {
            return Err(EngineError::invalid_request(format!("field {duplicate} is listed more than once")));
        }

        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        document_types::require_document_type(&tx, document_type_id)?;
        let live = fields::fields_by_ids(&tx, field_ids)?;
        if let Some(missing) = field_ids.iter().find(|id| !live.contains_key(*id)) {
            return Err(EngineError::not_found("custom field", missing));
        }
        document_types::replace_fields(&tx, document_type_id, field_ids)?;
        let document_type = document_types::require_document_type(&tx, document_type_id)?;
        tx.commit()?;
        log::info!("document type {document_type_id} now has {} fields", document_type.fields.len());
        Ok(document_type)
    }

    /// Binds a field at the end of the document type's list and returns its position.
    pub fn add_document_type_field(&self, document_type_id: Uuid, field_id: Uuid) -> EngineResult<u32> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        document_types::require_document_type(&tx, document_type_id)?;
        fields::require_field(&tx, field_id)?;
        let position = document_types::append_field(&tx, document_type_id, field_id)?;
        tx.commit()?;
        log::info!("bound field {field_id} to document type {document_type_id} at position {position}");
        Ok(position)
    }

    pub fn remove_document_type_field(&self, document_type_id: Uuid, field_id: Uuid) -> EngineResult<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        document_types::require_document_type(&tx, document_type_id)?;
        if !document_types::remove_field(&tx, document_type_id, field_id)? {
            return Err(EngineError::not_found(
                "document type field",
                format!("{document_type_id}/{field_id}"),
            ));
        }
        tx.commit()?;
        log::info!("unbound field {field_id} from document type {document_type_id}");
        Ok(())
    }

    /// Fields of a document type with the projection column each one sorts by.
    pub fn sortable_fields(&self, document_type_id: Uuid) -> EngineResult<Vec<SortableField>> {
        let conn = self.lock()?;
        let document_type = document_types::require_document_type(&conn, document_type_id)?;
        document_type
            .fields
            .into_iter()
            .map(|binding| {
                let handler = self.registry.get(&binding.type_id)?;
                Ok(SortableField {
                    field_id: binding.field_id,
                    name: binding.name,
                    type_id: binding.type_id,
                    column: handler.sort_column(),
                })
            })
            .collect()
    }

    // ---------------------------------------------------------------------
    // Documents
    // ---------------------------------------------------------------------

    pub fn create_document(&self, document_type_id: Option<Uuid>, title: &str, owner: &str) -> EngineResult<Document> {
        let document = Document {
            id: Uuid::new_v4(),
            document_type_id,
            title: title.trim().to_string(),
            owner: owner.to_string(),
            created_at: now_timestamp(),
        };
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        if let Some(document_type_id) = document_type_id {
            document_types::require_document_type(&tx, document_type_id)?;
        }
        documents::insert_document(&tx, &document)?;
        tx.commit()?;
        log::debug!("created document {}", document.id);
        Ok(document)
    }

    pub fn get_document(&self, id: Uuid) -> EngineResult<Document> {
        let conn = self.lock()?;
        documents::require_document(&conn, id)
    }

    /// Deletes a document and all of its values.
    pub fn delete_document(&self, id: Uuid) -> EngineResult<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        if !documents::delete_document(&tx, id)? {
            return Err(EngineError::not_found("document", id));
        }
        tx.commit()?;
        log::debug!("deleted document {id}");
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Values
    // ---------------------------------------------------------------------

    /// Validates and stores one value. `null` clears it.
    pub fn put_value(&self, document_id: Uuid, field_id: Uuid, input: &Value) -> EngineResult<StoredValue> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        documents::require_document(&tx, document_id)?;
        let field = self.resolve(&fields::require_field(&tx, field_id)?)?;
        let envelope = encode(&field, input).map_err(|message| EngineError::InvalidValue { field_id, message })?;
        values::upsert_value(&tx, document_id, field_id, &envelope, &now_timestamp())?;
        let stored = values::get_value(&tx, document_id, field_id)?
            .ok_or_else(|| EngineError::not_found("field value", format!("{document_id}/{field_id}")))?;
        tx.commit()?;
        log::debug!("stored {} value for document {document_id} field {field_id}", field.type_id);
        Ok(stored)
    }

    /// Writes several values of one document atomically.
    ///
    /// Every input is validated before anything is written; if any fails, nothing is stored
    /// and the error carries one [`ValidationIssue`] per rejected field.
    pub fn put_values_bulk<I>(&self, document_id: Uuid, inputs: I) -> EngineResult<usize>
    where
        I: IntoIterator<Item = (Uuid, Value)>,
    {
        let inputs: Vec<(Uuid, Value)> = inputs.into_iter().collect();
        let field_ids: Vec<Uuid> = inputs.iter().map(|(field_id, _)| *field_id).collect();

        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        documents::require_document(&tx, document_id)?;
        let catalog = fields::fields_by_ids(&tx, &field_ids)?;

        let mut issues = Vec::new();
        let mut envelopes = Vec::with_capacity(inputs.len());
        for (field_id, input) in &inputs {
            let Some(field) = catalog.get(field_id) else {
                issues.push(ValidationIssue::new(
                    field_id.to_string(),
                    "validation.unknown_field",
                    "Field does not exist",
                ));
                continue;
            };
            let resolved = self.resolve(field)?;
            match encode(&resolved, input) {
                Ok(envelope) => envelopes.push((*field_id, envelope)),
                Err(message) => issues.push(ValidationIssue::new(field_id.to_string(), "validation.value", message)),
            }
        }
        if !issues.is_empty() {
            log::debug!("bulk write to document {document_id} rejected with {} issues", issues.len());
            return Err(ValidationError::new(issues).into());
        }

        let now = now_timestamp();
        for (field_id, envelope) in &envelopes {
            values::upsert_value(&tx, document_id, *field_id, envelope, &now)?;
        }
        tx.commit()?;
        log::debug!("stored {} values for document {document_id}", envelopes.len());
        Ok(envelopes.len())
    }

    /// Values of the fields bound to the document's type, in position order.
    /// A document without a type has no visible values.
    pub fn get_values(&self, document_id: Uuid) -> EngineResult<Vec<FieldValue>> {
        let conn = self.lock()?;
        let document = documents::require_document(&conn, document_id)?;
        let Some(document_type_id) = document.document_type_id else {
            return Ok(Vec::new());
        };

        let bound = values::bound_values(&conn, document_id, document_type_id)?;
        let ids: Vec<Uuid> = bound.iter().map(|value| value.binding.field_id).collect();
        let catalog = fields::fields_by_ids(&conn, &ids)?;

        let mut output = Vec::with_capacity(bound.len());
        for value in bound {
            let Some(field) = catalog.get(&value.binding.field_id) else {
                continue;
            };
            let resolved = self.resolve(field)?;
            output.push(FieldValue {
                field_id: value.binding.field_id,
                name: value.binding.name,
                type_id: value.binding.type_id,
                position: Some(value.binding.position),
                value: decoded_output(&resolved, &value.stored.envelope),
                envelope: value.stored.envelope,
                updated_at: value.stored.updated_at,
            });
        }
        Ok(output)
    }

    /// One value by `(document, field)`, whether or not the field is bound to the document's type.
    pub fn get_value(&self, document_id: Uuid, field_id: Uuid) -> EngineResult<Option<FieldValue>> {
        let conn = self.lock()?;
        let document = documents::require_document(&conn, document_id)?;
        let field = fields::require_field(&conn, field_id)?;
        let Some(stored) = values::get_value(&conn, document_id, field_id)? else {
            return Ok(None);
        };
        let position = match document.document_type_id {
            Some(document_type_id) => document_types::bound_fields(&conn, document_type_id)?
                .into_iter()
                .find(|binding| binding.field_id == field_id)
                .map(|binding| binding.position),
            None => None,
        };
        let resolved = self.resolve(&field)?;
        Ok(Some(FieldValue {
            field_id,
            name: field.name,
            type_id: field.type_id,
            position,
            value: decoded_output(&resolved, &stored.envelope),
            envelope: stored.envelope,
            updated_at: stored.updated_at,
        }))
    }

    // ---------------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------------

    /// Documents matching `filter`, ordered by `sort` (or creation order), one page at a time.
    pub fn query_documents(
        &self,
        filter: Option<&FilterExpr>,
        sort: Option<&SortSpec>,
        paging: Paging,
    ) -> EngineResult<SearchResult<Document>> {
        let paging = paging.normalized(self.config.query.max_page_size);
        let mut referenced = filter.map(FilterExpr::field_ids).unwrap_or_default();
        if let Some(sort) = sort {
            referenced.push(sort.field_id);
        }

        let conn = self.lock()?;
        let catalog = fields::fields_by_ids(&conn, &referenced)?;
        let resolved = catalog
            .values()
            .map(|field| self.resolve(field).map(|resolved| (field.id, resolved)))
            .collect::<EngineResult<HashMap<_, _>>>()?;
        let compiled = QueryBuilder::new(&resolved).compile(filter, sort)?;

        let total: i64 = conn.query_row(&compiled.count_sql(), compiled.count_params().as_slice(), |row| {
            row.get(0)
        })?;
        let ids: Vec<Uuid> = {
            let mut stmt = conn.prepare(&compiled.page_sql())?;
            let raw_ids = stmt
                .query_map(rusqlite::params_from_iter(compiled.page_params(paging)), |row| {
                    row.get::<_, String>(0)
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            raw_ids
                .iter()
                .map(|id| Uuid::parse_str(id).map_err(|err| EngineError::invalid_request(err.to_string())))
                .collect::<EngineResult<Vec<_>>>()?
        };
        let items = documents::documents_in_order(&conn, &ids)?;
        log::debug!("document query matched {total} documents, returning {}", items.len());

        Ok(SearchResult {
            items,
            total: total.max(0) as u64,
            page: paging.page,
            page_size: paging.page_size,
        })
    }

    // ---------------------------------------------------------------------
    // Migrations
    // ---------------------------------------------------------------------

    /// Re-runs pending migrations. A no-op on an up-to-date database.
    pub fn migrate(&self) -> EngineResult<MigrationReport> {
        let mut conn = self.lock()?;
        migrations::run(&mut conn, &self.registry)
    }

    /// Moves values back to the legacy column-per-type table; see [`migrations::revert_legacy`].
    pub fn revert_legacy(&self) -> EngineResult<usize> {
        let mut conn = self.lock()?;
        migrations::revert_legacy(&mut conn, &self.registry)
    }
}

fn checked_name(name: &str) -> EngineResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(EngineError::invalid_request("name must not be empty"));
    }
    Ok(name.to_string())
}

/// Empty envelope for `null`, otherwise `validate` followed by `to_storage`.
fn encode(field: &ResolvedField, input: &Value) -> Result<ValueEnvelope, String> {
    if input.is_null() {
        return Ok(ValueEnvelope::empty());
    }
    field.handler.validate(input, &field.config)?;
    field.handler.to_storage(input, &field.config)
}

fn decoded_output(field: &ResolvedField, envelope: &ValueEnvelope) -> Value {
    field
        .handler
        .from_storage(envelope, &field.config)
        .unwrap_or_else(|_| envelope.raw.clone())
}

/// A stored value turned back into handler input, used when re-encoding under a new config.
fn decoded_input(field: &ResolvedField, envelope: &ValueEnvelope) -> Value {
    if envelope.is_empty() {
        return Value::Null;
    }
    decoded_output(field, envelope)
}
