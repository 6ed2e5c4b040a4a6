use anyhow::Result;
use clap::Subcommand;
use uuid::Uuid;

use crate::context::CliContext;
use crate::examples::ExampleGroup;
use crate::output::OutputManager;

pub const EXAMPLES: &[ExampleGroup] = &[ExampleGroup {
    title: "Documents",
    commands: &[
        "docfields document create --type <TYPE_ID> --title \"March invoice\"",
        "docfields document delete <DOCUMENT_ID>   # Also removes its values",
    ],
}];

#[derive(Subcommand)]
pub enum DocumentCommands {
    /// Register a document
    #[command(name = "create")]
    Create {
        /// Document type id
        #[arg(long = "type")]
        document_type: Option<Uuid>,

        #[arg(long, default_value = "")]
        title: String,

        #[arg(long, default_value = "default")]
        owner: String,
    },

    /// Show a document
    #[command(name = "show")]
    Show { id: Uuid },

    /// Delete a document and its values
    #[command(name = "delete")]
    Delete { id: Uuid },
}

pub fn handle_document_commands(command: DocumentCommands, ctx: &CliContext, output: &OutputManager) -> Result<()> {
    let engine = ctx.open_engine()?;

    match command {
        DocumentCommands::Create {
            document_type,
            title,
            owner,
        } => {
            let document = engine.create_document(document_type, &title, &owner)?;
            if output.is_json() {
                return output.json(&document);
            }
            output.success("Created document");
            output.key_value("ID", &document.id.to_string());
        }
        DocumentCommands::Show { id } => {
            let document = engine.get_document(id)?;
            if output.is_json() {
                return output.json(&document);
            }
            output.key_value("ID", &document.id.to_string());
            output.key_value("Title", &document.title);
            output.key_value(
                "Type",
                &document.document_type_id.map(|id| id.to_string()).unwrap_or_else(|| "-".into()),
            );
            output.key_value("Owner", &document.owner);
            output.key_value("Created", &document.created_at);
        }
        DocumentCommands::Delete { id } => {
            engine.delete_document(id)?;
            output.success(&format!("Deleted document {id}"));
        }
    }

    Ok(())
}
