pub mod doctype;
pub mod document;
pub mod field;
pub mod migrate;
pub mod query;
pub mod types;
pub mod value;
