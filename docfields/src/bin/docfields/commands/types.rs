use anyhow::Result;
use comfy_table::{Cell, Table};
use docfields::{TypeInfo, TypeRegistry};
use serde::Serialize;

use crate::examples::ExampleGroup;
use crate::output::{OutputManager, TableDisplay};

pub const EXAMPLES: &[ExampleGroup] = &[ExampleGroup {
    title: "Field Types",
    commands: &[
        "docfields types                       # List every registered field type",
        "docfields --output json types         # Same, as JSON",
    ],
}];

#[derive(Serialize)]
#[serde(transparent)]
struct TypeList(Vec<TypeInfo>);

impl TableDisplay for TypeList {
    fn to_table(&self, output: &OutputManager) -> Table {
        let mut table = output.create_table(&["Type", "Config", "Sorts by", "Operators"]);
        for info in &self.0 {
            table.add_row(vec![
                Cell::new(&info.type_id),
                Cell::new(&info.config_schema_name),
                Cell::new(&info.sort_column_name),
                Cell::new(info.operators.join(", ")),
            ]);
        }
        table
    }
}

/// Lists the built-in types. Needs no database.
pub fn handle_types(output: &OutputManager) -> Result<()> {
    output.heading("Field Types");
    output.display(&TypeList(TypeRegistry::with_builtin_types().list()))
}
