use anyhow::{Context, Result};
use clap::Subcommand;
use comfy_table::{Cell, Table};
use docfields::{CustomField, FieldPatch};
use serde::Serialize;
use uuid::Uuid;

use crate::context::CliContext;
use crate::examples::ExampleGroup;
use crate::output::{OutputManager, TableDisplay};
use crate::utils::parse_config;

pub const EXAMPLES: &[ExampleGroup] = &[
    ExampleGroup {
        title: "Create Fields",
        commands: &[
            "docfields field create Price --type monetary --config '{\"currency\":\"EUR\"}'",
            "docfields field create Department --type select --config '{\"options\":[\"hr\",\"dev\"]}'",
        ],
    },
    ExampleGroup {
        title: "Inspect and Change",
        commands: &[
            "docfields field list --owner alice    # Fields owned by alice",
            "docfields field update <ID> --config '{\"max_length\":80}'",
            "docfields field delete <ID>           # Also removes stored values",
        ],
    },
];

#[derive(Subcommand)]
pub enum FieldCommands {
    /// Create a custom field
    #[command(name = "create")]
    Create {
        /// Field name, unique per owner
        name: String,

        /// Field type id (see `docfields types`)
        #[arg(long = "type")]
        type_id: String,

        /// Type config as a JSON object
        #[arg(long)]
        config: Option<String>,

        #[arg(long, default_value = "default")]
        owner: String,
    },

    /// List custom fields
    #[command(name = "list")]
    List {
        /// Only fields of this owner
        #[arg(long)]
        owner: Option<String>,
    },

    /// Show one field with its config
    #[command(name = "show")]
    Show { id: Uuid },

    /// Rename a field or replace its config
    #[command(name = "update")]
    Update {
        id: Uuid,

        #[arg(long)]
        name: Option<String>,

        /// New config as a JSON object; existing values must stay valid
        #[arg(long)]
        config: Option<String>,

        /// Must match the current type; type changes are refused
        #[arg(long = "type")]
        type_id: Option<String>,
    },

    /// Delete a field and its values
    #[command(name = "delete")]
    Delete { id: Uuid },
}

#[derive(Serialize)]
#[serde(transparent)]
struct FieldList(Vec<CustomField>);

impl TableDisplay for FieldList {
    fn to_table(&self, output: &OutputManager) -> Table {
        let mut table = output.create_table(&["ID", "Name", "Type", "Owner", "Updated"]);
        for field in &self.0 {
            table.add_row(vec![
                Cell::new(field.id),
                Cell::new(&field.name),
                Cell::new(&field.type_id),
                Cell::new(&field.owner),
                Cell::new(&field.updated_at),
            ]);
        }
        table
    }
}

pub fn handle_field_commands(command: FieldCommands, ctx: &CliContext, output: &OutputManager) -> Result<()> {
    let engine = ctx.open_engine()?;

    match command {
        FieldCommands::Create {
            name,
            type_id,
            config,
            owner,
        } => {
            let config = parse_config(config.as_deref())?;
            let field = engine
                .create_field(&name, &type_id, &config, &owner)
                .with_context(|| format!("Failed to create field '{name}'"))?;
            output.success(&format!("Created {} field '{}'", field.type_id, field.name));
            show_field(&field, output)?;
        }
        FieldCommands::List { owner } => {
            let fields = engine.list_fields(owner.as_deref())?;
            if fields.is_empty() && !output.is_json() {
                output.info("No custom fields defined");
                return Ok(());
            }
            output.display(&FieldList(fields))?;
        }
        FieldCommands::Show { id } => {
            let field = engine.get_field(id)?;
            show_field(&field, output)?;
        }
        FieldCommands::Update {
            id,
            name,
            config,
            type_id,
        } => {
            let config = config.as_deref().map(|raw| parse_config(Some(raw))).transpose()?;
            let patch = FieldPatch { name, type_id, config };
            let field = engine
                .update_field(id, patch)
                .with_context(|| format!("Failed to update field {id}"))?;
            output.success(&format!("Updated field '{}'", field.name));
            show_field(&field, output)?;
        }
        FieldCommands::Delete { id } => {
            engine.delete_field(id)?;
            output.success(&format!("Deleted field {id}"));
        }
    }

    Ok(())
}

fn show_field(field: &CustomField, output: &OutputManager) -> Result<()> {
    if output.is_json() {
        return output.json(field);
    }
    output.key_value("ID", &field.id.to_string());
    output.key_value("Name", &field.name);
    output.key_value("Type", &field.type_id);
    output.key_value("Owner", &field.owner);
    output.key_value("Config", &serde_json::to_string(&field.config)?);
    output.key_value("Created", &field.created_at);
    output.key_value("Updated", &field.updated_at);
    Ok(())
}
