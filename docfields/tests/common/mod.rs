#![allow(dead_code)]

use docfields::{CustomField, Document, DocumentType, Engine};
use serde_json::Value;
use uuid::Uuid;

pub const OWNER: &str = "alice";

pub fn engine() -> Engine {
    Engine::open_in_memory().expect("in-memory engine should open")
}

pub fn field(engine: &Engine, name: &str, type_id: &str, config: Value) -> CustomField {
    engine
        .create_field(name, type_id, &config, OWNER)
        .expect("field should be created")
}

pub fn document_type(engine: &Engine, name: &str, fields: &[&CustomField]) -> DocumentType {
    let document_type = engine
        .create_document_type(name, OWNER)
        .expect("document type should be created");
    let ids: Vec<Uuid> = fields.iter().map(|field| field.id).collect();
    engine
        .set_document_type_fields(document_type.id, &ids)
        .expect("fields should bind")
}

pub fn document(engine: &Engine, document_type: Option<&DocumentType>, title: &str) -> Document {
    engine
        .create_document(document_type.map(|dt| dt.id), title, OWNER)
        .expect("document should be created")
}

/// Ids of the documents on one large page, in result order.
pub fn query_ids(
    engine: &Engine,
    filter: Option<&docfields::FilterExpr>,
    sort: Option<&docfields::SortSpec>,
) -> Vec<Uuid> {
    engine
        .query_documents(filter, sort, docfields::Paging::new(1, 100))
        .expect("query should run")
        .items
        .into_iter()
        .map(|document| document.id)
        .collect()
}
