mod commands;
mod context;
mod examples;
mod output;
mod theme;
mod utils;

use std::fmt::Write;
use std::path::PathBuf;

use anyhow::Result;
use clap::{ColorChoice, CommandFactory, FromArgMatches, Parser, Subcommand, builder::Styles};
use colored::{Color, Colorize, control::ShouldColorize};

use commands::{
    doctype::{DoctypeCommands, handle_doctype_commands},
    document::{DocumentCommands, handle_document_commands},
    field::{FieldCommands, handle_field_commands},
    migrate::{MigrateCommands, handle_migrate_commands},
    query::{QueryArgs, handle_query},
    types::handle_types,
    value::{ValueCommands, handle_value_commands},
};
use context::CliContext;
use docfields::config::DEFAULT_CONFIG_FILE;
use examples::{ExampleGroup, command_examples};
use output::{GlobalOptions, OutputFormat, OutputManager};
use theme::{ICONS, THEME};

const ENVIRONMENT_VARIABLES: &[(&str, &str)] = &[
    ("DOCFIELDS_DATABASE", "SQLite database path, overrides [database].path"),
    ("RUST_LOG", "Log filter, e.g. docfields=debug"),
];

#[derive(Parser)]
#[command(name = "docfields")]
#[command(version)]
#[command(
    about = "Typed custom fields for documents",
    long_about = r#"Typed custom fields for documents, stored in SQLite:

• Define fields of thirteen types, each with its own validated config
• Attach ordered field lists to document types
• Store values as canonical envelopes with indexed projections
• Filter and sort documents by field values

Commands:
  types     List field types and their operators
  field     Create, inspect, update, and delete custom fields
  doctype   Manage document types and their field lists
  document  Register and delete documents
  value     Write and read field values
  query     Filter, sort, and page documents
  migrate   Apply or revert schema migrations
"#
)]
#[command(subcommand_required = true, arg_required_else_help = true)]
struct Cli {
    /// Configuration file; missing files fall back to defaults
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Database path
    #[arg(long, global = true, env = "DOCFIELDS_DATABASE")]
    database: Option<PathBuf>,

    /// Output format
    #[arg(long, global = true, value_enum, default_value = "table")]
    output: OutputFormat,

    /// Suppress output (only errors will be shown)
    #[arg(short = 'q', long, global = true)]
    quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

fn parse_cli() -> Cli {
    let use_color = ShouldColorize::from_env().should_colorize();
    let mut command = Cli::command()
        .after_long_help(render_appendix(use_color))
        .color(if use_color { ColorChoice::Auto } else { ColorChoice::Never })
        .styles(help_styles());
    for example in command_examples() {
        if let Some(subcommand) = command.find_subcommand_mut(example.name) {
            *subcommand = subcommand.clone().after_long_help(render_examples(example.groups, use_color));
        }
    }

    let matches = command.get_matches();
    Cli::from_arg_matches(&matches).unwrap_or_else(|err| err.exit())
}

fn render_examples(groups: &[ExampleGroup], use_color: bool) -> String {
    let theme = &THEME;
    let mut buffer = String::new();
    let _ = writeln!(buffer, "{}", paint("Examples:", theme.highlight, true, use_color));
    for (index, group) in groups.iter().enumerate() {
        if index > 0 {
            buffer.push('\n');
        }
        let _ = writeln!(buffer, "  {}", paint(group.title, theme.primary, true, use_color));
        for line in group.commands {
            let _ = writeln!(
                buffer,
                "    {} {}",
                paint(ICONS.arrow, theme.secondary, false, use_color),
                paint(line, theme.secondary, false, use_color)
            );
        }
    }
    buffer
}

fn render_appendix(use_color: bool) -> String {
    let theme = &THEME;
    let mut buffer = String::new();
    let _ = writeln!(buffer, "{}", paint("Environment Variables:", theme.highlight, true, use_color));
    for (key, description) in ENVIRONMENT_VARIABLES {
        let _ = writeln!(
            buffer,
            "  {}  {}",
            paint(key, theme.key, true, use_color),
            paint(description, theme.value, false, use_color)
        );
    }
    let _ = writeln!(
        buffer,
        "\n{} {}",
        paint("Tip:", theme.highlight, true, use_color),
        paint("Run 'docfields <command> --help' for per-command examples.", theme.secondary, false, use_color)
    );
    buffer
}

fn paint(text: &str, color: Color, bold: bool, use_color: bool) -> String {
    match (use_color, bold) {
        (false, _) => text.to_string(),
        (true, true) => text.color(color).bold().to_string(),
        (true, false) => text.color(color).to_string(),
    }
}

fn help_styles() -> Styles {
    let theme = &THEME;
    Styles::styled()
        .usage(theme.help_style(theme.primary).bold())
        .header(theme.help_style(theme.highlight).bold())
        .literal(theme.help_style(theme.secondary))
        .placeholder(theme.help_style(theme.muted))
        .valid(theme.help_style(theme.success))
        .invalid(theme.help_style(theme.warning))
        .error(theme.help_style(theme.error).bold())
}

#[derive(Subcommand)]
enum Commands {
    /// List registered field types
    Types,

    /// Manage custom fields
    #[command(subcommand)]
    Field(FieldCommands),

    /// Manage document types and their field lists
    #[command(subcommand)]
    Doctype(DoctypeCommands),

    /// Register and delete documents
    #[command(subcommand)]
    Document(DocumentCommands),

    /// Write and read field values
    #[command(subcommand)]
    Value(ValueCommands),

    /// Filter, sort, and page documents by field values
    Query(QueryArgs),

    /// Apply or revert schema migrations
    #[command(subcommand)]
    Migrate(MigrateCommands),
}

fn main() {
    env_logger::init();

    let cli = parse_cli();
    let output = OutputManager::new(GlobalOptions {
        output_format: cli.output.clone(),
        quiet: cli.quiet,
        no_color: cli.no_color,
    });

    if let Err(err) = execute(cli, &output) {
        output.error(&format!("{err:#}"));
        std::process::exit(1);
    }
}

fn execute(cli: Cli, output: &OutputManager) -> Result<()> {
    if let Commands::Types = cli.command {
        return handle_types(output);
    }

    let ctx = CliContext::load(&cli.config, cli.database)?;
    log::debug!("using database {}", ctx.database_path().display());

    match cli.command {
        Commands::Types => handle_types(output)?,
        Commands::Field(command) => handle_field_commands(command, &ctx, output)?,
        Commands::Doctype(command) => handle_doctype_commands(command, &ctx, output)?,
        Commands::Document(command) => handle_document_commands(command, &ctx, output)?,
        Commands::Value(command) => handle_value_commands(command, &ctx, output)?,
        Commands::Query(args) => handle_query(args, &ctx, output)?,
        Commands::Migrate(command) => handle_migrate_commands(command, &ctx, output)?,
    }

    Ok(())
}
