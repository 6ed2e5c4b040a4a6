use anyhow::Result;
use clap::Subcommand;
use comfy_table::{Cell, Table};
use docfields::{DocumentType, SortableField};
use serde::Serialize;
use uuid::Uuid;

use crate::context::CliContext;
use crate::examples::ExampleGroup;
use crate::output::{OutputManager, TableDisplay};

pub const EXAMPLES: &[ExampleGroup] = &[
    ExampleGroup {
        title: "Document Types",
        commands: &[
            "docfields doctype create Invoice --owner alice",
            "docfields doctype set-fields <TYPE_ID> <FIELD_ID> <FIELD_ID>   # Order is significant",
            "docfields doctype add-field <TYPE_ID> <FIELD_ID>               # Append at the end",
        ],
    },
    ExampleGroup {
        title: "Inspect",
        commands: &[
            "docfields doctype list",
            "docfields doctype show <TYPE_ID>      # Bound fields and their sort columns",
        ],
    },
];

#[derive(Subcommand)]
pub enum DoctypeCommands {
    /// Create a document type
    #[command(name = "create")]
    Create {
        name: String,

        #[arg(long, default_value = "default")]
        owner: String,
    },

    /// List document types
    #[command(name = "list")]
    List {
        #[arg(long)]
        owner: Option<String>,
    },

    /// Show a document type with its ordered fields
    #[command(name = "show")]
    Show { id: Uuid },

    /// Replace the ordered field list
    #[command(name = "set-fields")]
    SetFields {
        id: Uuid,

        /// Field ids in display order; pass none to unbind every field
        fields: Vec<Uuid>,
    },

    /// Append one field to the list
    #[command(name = "add-field")]
    AddField { id: Uuid, field: Uuid },

    /// Remove one field from the list; its values are kept but hidden
    #[command(name = "remove-field")]
    RemoveField { id: Uuid, field: Uuid },

    /// Delete a document type; its documents lose their type
    #[command(name = "delete")]
    Delete { id: Uuid },
}

#[derive(Serialize)]
#[serde(transparent)]
struct DocumentTypeList(Vec<DocumentType>);

impl TableDisplay for DocumentTypeList {
    fn to_table(&self, output: &OutputManager) -> Table {
        let mut table = output.create_table(&["ID", "Name", "Owner", "Fields", "Created"]);
        for document_type in &self.0 {
            table.add_row(vec![
                Cell::new(document_type.id),
                Cell::new(&document_type.name),
                Cell::new(&document_type.owner),
                Cell::new(document_type.fields.len()),
                Cell::new(&document_type.created_at),
            ]);
        }
        table
    }
}

#[derive(Serialize)]
struct DocumentTypeDetail {
    #[serde(flatten)]
    document_type: DocumentType,
    sortable_fields: Vec<SortableField>,
}

impl TableDisplay for DocumentTypeDetail {
    fn to_table(&self, output: &OutputManager) -> Table {
        let mut table = output.create_table(&["Position", "Field ID", "Name", "Type", "Sorts by"]);
        for binding in &self.document_type.fields {
            let column = self
                .sortable_fields
                .iter()
                .find(|sortable| sortable.field_id == binding.field_id)
                .map(|sortable| sortable.column.as_str())
                .unwrap_or_default();
            table.add_row(vec![
                Cell::new(binding.position),
                Cell::new(binding.field_id),
                Cell::new(&binding.name),
                Cell::new(&binding.type_id),
                Cell::new(column),
            ]);
        }
        table
    }
}

pub fn handle_doctype_commands(command: DoctypeCommands, ctx: &CliContext, output: &OutputManager) -> Result<()> {
    let engine = ctx.open_engine()?;

    match command {
        DoctypeCommands::Create { name, owner } => {
            let document_type = engine.create_document_type(&name, &owner)?;
            if output.is_json() {
                return output.json(&document_type);
            }
            output.success(&format!("Created document type '{}'", document_type.name));
            output.key_value("ID", &document_type.id.to_string());
        }
        DoctypeCommands::List { owner } => {
            let document_types = engine.list_document_types(owner.as_deref())?;
            if document_types.is_empty() && !output.is_json() {
                output.info("No document types defined");
                return Ok(());
            }
            output.display(&DocumentTypeList(document_types))?;
        }
        DoctypeCommands::Show { id } => {
            let detail = DocumentTypeDetail {
                document_type: engine.get_document_type(id)?,
                sortable_fields: engine.sortable_fields(id)?,
            };
            output.heading(&format!("Document type '{}'", detail.document_type.name));
            output.display(&detail)?;
        }
        DoctypeCommands::SetFields { id, fields } => {
            let document_type = engine.set_document_type_fields(id, &fields)?;
            output.success(&format!(
                "Document type '{}' now has {} field(s)",
                document_type.name,
                document_type.fields.len()
            ));
        }
        DoctypeCommands::AddField { id, field } => {
            let position = engine.add_document_type_field(id, field)?;
            output.success(&format!("Bound field {field} at position {position}"));
        }
        DoctypeCommands::RemoveField { id, field } => {
            engine.remove_document_type_field(id, field)?;
            output.success(&format!("Unbound field {field}"));
        }
        DoctypeCommands::Delete { id } => {
            engine.delete_document_type(id)?;
            output.success(&format!("Deleted document type {id}"));
        }
    }

    Ok(())
}
