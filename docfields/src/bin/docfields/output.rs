use anyhow::Result;
use clap::ValueEnum;
use colored::Colorize;
use comfy_table::{Attribute, Cell, Color as TableColor, Table};
use serde::Serialize;

use crate::theme::{ICONS, THEME};

/// Output format options for CLI commands
#[derive(Clone, Debug, ValueEnum, Default, PartialEq)]
pub enum OutputFormat {
    /// Formatted table output (default)
    #[default]
    Table,
    /// JSON output for scripting
    Json,
}

/// Global CLI options that affect output
#[derive(Clone, Debug, Default)]
pub struct GlobalOptions {
    pub output_format: OutputFormat,
    pub quiet: bool,
    pub no_color: bool,
}

/// Data that knows how to render itself as a table
pub trait TableDisplay {
    fn to_table(&self, output: &OutputManager) -> Table;
}

pub struct OutputManager {
    pub options: GlobalOptions,
}

impl OutputManager {
    pub fn new(options: GlobalOptions) -> Self {
        if options.no_color {
            colored::control::set_override(false);
        }
        Self { options }
    }

    pub fn is_json(&self) -> bool {
        self.options.output_format == OutputFormat::Json
    }

    /// Display data according to the configured output format
    pub fn display<T>(&self, data: &T) -> Result<()>
    where
        T: Serialize + TableDisplay + ?Sized,
    {
        match self.options.output_format {
            OutputFormat::Json => self.json(data)?,
            OutputFormat::Table => {
                if !self.options.quiet {
                    println!("{}", data.to_table(self));
                }
            }
        }
        Ok(())
    }

    /// Pretty JSON on stdout regardless of the format flag.
    pub fn json<T: Serialize + ?Sized>(&self, data: &T) -> Result<()> {
        println!("{}", serde_json::to_string_pretty(data)?);
        Ok(())
    }

    fn line(&self, icon: &str, message: &str, color: colored::Color) -> String {
        if self.options.no_color {
            format!("{icon} {message}")
        } else {
            format!("{} {}", icon.color(color), message.color(color))
        }
    }

    /// Status lines are suppressed in JSON mode so stdout stays parseable.
    fn chatty(&self) -> bool {
        !self.options.quiet && !self.is_json()
    }

    pub fn success(&self, message: &str) {
        if self.chatty() {
            println!("{}", self.line(ICONS.success, message, THEME.success));
        }
    }

    pub fn error(&self, message: &str) {
        eprintln!("{}", self.line(ICONS.error, message, THEME.error));
    }

    pub fn warning(&self, message: &str) {
        if self.chatty() {
            println!("{}", self.line(ICONS.warning, message, THEME.warning));
        }
    }

    pub fn info(&self, message: &str) {
        if self.chatty() {
            println!("{}", self.line(ICONS.info, message, THEME.info));
        }
    }

    pub fn heading(&self, text: &str) {
        if self.chatty() {
            let output = if self.options.no_color {
                format!("\n{text}\n{}", "=".repeat(text.chars().count()))
            } else {
                format!("\n{}", text.color(THEME.primary).bold())
            };
            println!("{output}");
        }
    }

    pub fn key_value(&self, key: &str, value: &str) {
        if self.chatty() {
            let output = if self.options.no_color {
                format!("{key}: {value}")
            } else {
                format!("{}: {}", key.color(THEME.key).bold(), value.color(THEME.value))
            };
            println!("{output}");
        }
    }

    pub fn bullet(&self, text: &str) {
        if self.chatty() {
            let output = if self.options.no_color {
                format!("  {} {text}", ICONS.bullet)
            } else {
                format!("  {} {text}", ICONS.bullet.color(THEME.muted))
            };
            println!("{output}");
        }
    }

    /// Create a themed table with a bold header row
    pub fn create_table(&self, headers: &[&str]) -> Table {
        let mut table = Table::new();
        if self.options.no_color {
            table.load_preset(comfy_table::presets::ASCII_FULL);
        } else {
            table.load_preset(comfy_table::presets::UTF8_FULL_CONDENSED);
        }

        let header_cells: Vec<Cell> = headers
            .iter()
            .map(|header| {
                let cell = Cell::new(header).add_attribute(Attribute::Bold);
                if self.options.no_color {
                    cell
                } else {
                    cell.fg(TableColor::Cyan)
                }
            })
            .collect();
        table.set_header(header_cells);
        table
    }
}
