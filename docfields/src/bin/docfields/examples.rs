use crate::commands::{doctype, document, field, migrate, query, types, value};

#[derive(Clone, Copy)]
pub struct ExampleGroup {
    pub title: &'static str,
    pub commands: &'static [&'static str],
}

#[derive(Clone, Copy)]
pub struct CommandExample {
    pub name: &'static str,
    pub groups: &'static [ExampleGroup],
}

pub fn command_examples() -> &'static [CommandExample] {
    &[
        CommandExample {
            name: "types",
            groups: types::EXAMPLES,
        },
        CommandExample {
            name: "field",
            groups: field::EXAMPLES,
        },
        CommandExample {
            name: "doctype",
            groups: doctype::EXAMPLES,
        },
        CommandExample {
            name: "document",
            groups: document::EXAMPLES,
        },
        CommandExample {
            name: "value",
            groups: value::EXAMPLES,
        },
        CommandExample {
            name: "query",
            groups: query::EXAMPLES,
        },
        CommandExample {
            name: "migrate",
            groups: migrate::EXAMPLES,
        },
    ]
}
