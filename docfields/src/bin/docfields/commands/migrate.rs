use anyhow::{Context, Result};
use clap::Subcommand;
use docfields::migrations::{self, CURRENT_VERSION, LegacyReport};
use docfields::rusqlite::Connection;

use crate::context::CliContext;
use crate::examples::ExampleGroup;
use crate::output::OutputManager;

pub const EXAMPLES: &[ExampleGroup] = &[
    ExampleGroup {
        title: "Upgrade",
        commands: &[
            "docfields migrate run                 # Create the schema or convert legacy values",
            "docfields migrate status              # Show the schema version",
        ],
    },
    ExampleGroup {
        title: "Downgrade",
        commands: &["docfields migrate revert --yes      # Back to column-per-type values; metadata is lost"],
    },
];

#[derive(Subcommand)]
pub enum MigrateCommands {
    /// Apply pending schema migrations
    #[command(name = "run")]
    Run,

    /// Show the current schema version
    #[command(name = "status")]
    Status,

    /// Move values back to the legacy column-per-type table
    #[command(name = "revert")]
    Revert {
        /// Confirm that envelope metadata will be discarded
        #[arg(long)]
        yes: bool,
    },
}

pub fn handle_migrate_commands(command: MigrateCommands, ctx: &CliContext, output: &OutputManager) -> Result<()> {
    match command {
        MigrateCommands::Run => {
            output.heading("Migrate");
            let engine = ctx.open_engine()?;
            let report = engine.migration_report();
            if output.is_json() {
                return output.json(report);
            }
            if report.is_noop() {
                output.success(&format!("Schema is up to date (version {})", report.to_version));
            } else {
                output.success(&format!(
                    "Migrated schema from version {} to {}",
                    report.from_version, report.to_version
                ));
            }
            if let Some(legacy) = &report.legacy {
                print_legacy_report(legacy, output);
            }
        }
        MigrateCommands::Status => {
            let conn = Connection::open(ctx.database_path())
                .with_context(|| format!("Failed to open {}", ctx.database_path().display()))?;
            let version = migrations::schema_version(&conn)?;
            if output.is_json() {
                return output.json(&serde_json::json!({
                    "config": ctx.config_file(),
                    "database": ctx.database_path(),
                    "version": version,
                    "current": CURRENT_VERSION,
                }));
            }
            let config = ctx
                .config_file()
                .map_or_else(|| "defaults".to_string(), |path| path.display().to_string());
            output.key_value("Config", &config);
            output.key_value("Database", &ctx.database_path().display().to_string());
            output.key_value("Schema version", &version.to_string());
            if version < CURRENT_VERSION {
                output.warning(&format!("Pending migrations up to version {CURRENT_VERSION}"));
                output.bullet("Run 'docfields migrate run' to apply them");
            }
        }
        MigrateCommands::Revert { yes } => {
            if !yes {
                output.warning("Reverting discards envelope metadata and projections.");
                anyhow::bail!("Pass --yes to confirm");
            }
            let engine = ctx.open_engine()?;
            let written = engine.revert_legacy()?;
            output.success(&format!("Moved {written} value(s) to the legacy table"));
            output.info("Opening the database with docfields again converts them back");
        }
    }

    Ok(())
}

fn print_legacy_report(report: &LegacyReport, output: &OutputManager) {
    output.heading("Legacy values");
    output.key_value("Converted", &report.converted.to_string());
    output.key_value("Empty (skipped)", &report.skipped_empty.to_string());
    if !report.invalid.is_empty() {
        output.warning(&format!("{} value(s) kept raw because they no longer validate", report.invalid.len()));
        for issue in &report.invalid {
            output.bullet(&format!("document {} field {}: {}", issue.document_id, issue.field_id, issue.message));
        }
    }
    if !report.orphaned.is_empty() {
        output.warning(&format!("{} value(s) dropped", report.orphaned.len()));
        for issue in &report.orphaned {
            output.bullet(&format!("document {} field {}: {}", issue.document_id, issue.field_id, issue.message));
        }
    }
}
