use anyhow::{Context, Result};
use clap::Subcommand;
use comfy_table::{Cell, Table};
use docfields::{EngineError, FieldValue};
use serde::Serialize;
use uuid::Uuid;

use crate::context::CliContext;
use crate::examples::ExampleGroup;
use crate::output::{OutputManager, TableDisplay};
use crate::utils::{display_value, parse_assignment, parse_input};

pub const EXAMPLES: &[ExampleGroup] = &[
    ExampleGroup {
        title: "Write Values",
        commands: &[
            "docfields value put <DOC> <FIELD> 22.895             # Input is JSON, else text",
            "docfields value put <DOC> <FIELD> '[\"hr\",\"dev\"]'",
            "docfields value put <DOC> <FIELD> null               # Clear the value",
            "docfields value bulk <DOC> <FIELD>=42 <FIELD>=yes    # All or nothing",
        ],
    },
    ExampleGroup {
        title: "Read Values",
        commands: &[
            "docfields value get <DOC> <FIELD>",
            "docfields value list <DOC>            # Fields of the document's type, in order",
        ],
    },
];

#[derive(Subcommand)]
pub enum ValueCommands {
    /// Store one value
    #[command(name = "put")]
    Put {
        document: Uuid,
        field: Uuid,
        /// JSON value, or plain text when it is not valid JSON
        value: String,
    },

    /// Store several values of one document in one transaction
    #[command(name = "bulk")]
    Bulk {
        document: Uuid,
        /// FIELD_ID=VALUE assignments
        #[arg(required = true)]
        assignments: Vec<String>,
    },

    /// Read one value
    #[command(name = "get")]
    Get { document: Uuid, field: Uuid },

    /// Read the values of the fields bound to the document's type
    #[command(name = "list")]
    List { document: Uuid },
}

#[derive(Serialize)]
#[serde(transparent)]
struct ValueList(Vec<FieldValue>);

impl TableDisplay for ValueList {
    fn to_table(&self, output: &OutputManager) -> Table {
        let mut table = output.create_table(&["#", "Field", "Type", "Value", "Updated"]);
        for value in &self.0 {
            table.add_row(vec![
                Cell::new(value.position.map(|position| position.to_string()).unwrap_or_default()),
                Cell::new(&value.name),
                Cell::new(&value.type_id),
                Cell::new(display_value(&value.value)),
                Cell::new(&value.updated_at),
            ]);
        }
        table
    }
}

pub fn handle_value_commands(command: ValueCommands, ctx: &CliContext, output: &OutputManager) -> Result<()> {
    let engine = ctx.open_engine()?;

    match command {
        ValueCommands::Put { document, field, value } => {
            let stored = engine.put_value(document, field, &parse_input(&value))?;
            if output.is_json() {
                return output.json(&stored.envelope);
            }
            if stored.envelope.is_empty() {
                output.success("Cleared value");
            } else {
                output.success("Stored value");
                output.key_value("Envelope", &stored.envelope.to_json()?);
            }
        }
        ValueCommands::Bulk { document, assignments } => {
            let inputs = assignments
                .iter()
                .map(|raw| parse_assignment(raw))
                .collect::<Result<Vec<_>>>()?;
            match engine.put_values_bulk(document, inputs) {
                Ok(written) => output.success(&format!("Stored {written} value(s)")),
                Err(EngineError::Validation(errors)) => {
                    for issue in &errors.issues {
                        output.error(&format!("{}: {}", issue.field, issue.message));
                    }
                    anyhow::bail!("{} value(s) rejected; nothing was stored", errors.issues.len());
                }
                Err(err) => return Err(err).context("Bulk write failed"),
            }
        }
        ValueCommands::Get { document, field } => match engine.get_value(document, field)? {
            Some(value) if output.is_json() => output.json(&value)?,
            Some(value) => {
                output.key_value("Field", &value.name);
                output.key_value("Type", &value.type_id);
                output.key_value("Value", &display_value(&value.value));
                output.key_value("Envelope", &value.envelope.to_json()?);
                output.key_value("Updated", &value.updated_at);
            }
            None => output.info("No value stored"),
        },
        ValueCommands::List { document } => {
            output.display(&ValueList(engine.get_values(document)?))?;
        }
    }

    Ok(())
}
