use anyhow::{Context, Result};
use clap::Args;
use comfy_table::{Cell, Table};
use docfields::{Document, FieldFilter, FilterExpr, PaginatedResponse, Paging, SortSpec};

use crate::context::CliContext;
use crate::examples::ExampleGroup;
use crate::output::{OutputManager, TableDisplay};

pub const EXAMPLES: &[ExampleGroup] = &[
    ExampleGroup {
        title: "Filter",
        commands: &[
            "docfields query --filter <FIELD>:eq:hr",
            "docfields query --filter <FIELD>:any:hr,dev --filter <FIELD>:gte:10",
            "docfields query --any --filter <FIELD>:is_null --filter <FIELD>:ilike:smith",
        ],
    },
    ExampleGroup {
        title: "Sort and Page",
        commands: &[
            "docfields query --sort <FIELD>        # Ascending, missing values last",
            "docfields query --sort -<FIELD> --page 2 --page-size 50",
        ],
    },
];

#[derive(Args)]
pub struct QueryArgs {
    /// Condition in FIELD_ID:OPERATOR[:VALUE] form; repeatable
    #[arg(long = "filter", short = 'f')]
    filters: Vec<String>,

    /// Match documents satisfying any condition instead of all
    #[arg(long)]
    any: bool,

    /// FIELD_ID to sort ascending, -FIELD_ID for descending
    #[arg(long, allow_hyphen_values = true)]
    sort: Option<String>,

    #[arg(long, default_value_t = 1)]
    page: u64,

    /// Defaults to `[query].default_page_size`
    #[arg(long)]
    page_size: Option<u64>,
}

impl TableDisplay for PaginatedResponse<Document> {
    fn to_table(&self, output: &OutputManager) -> Table {
        let mut table = output.create_table(&["ID", "Title", "Type", "Owner", "Created"]);
        for document in &self.items {
            table.add_row(vec![
                Cell::new(document.id),
                Cell::new(&document.title),
                Cell::new(document.document_type_id.map(|id| id.to_string()).unwrap_or_default()),
                Cell::new(&document.owner),
                Cell::new(&document.created_at),
            ]);
        }
        table
    }
}

fn build_filter(raw_filters: &[String], any: bool) -> Result<Option<FilterExpr>> {
    let conditions = raw_filters
        .iter()
        .map(|raw| {
            FieldFilter::parse(raw)
                .map(FilterExpr::Condition)
                .with_context(|| format!("Invalid filter '{raw}'"))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(match conditions.len() {
        0 => None,
        1 => conditions.into_iter().next(),
        _ if any => Some(FilterExpr::or(conditions)),
        _ => Some(FilterExpr::and(conditions)),
    })
}

pub fn handle_query(args: QueryArgs, ctx: &CliContext, output: &OutputManager) -> Result<()> {
    let filter = build_filter(&args.filters, args.any)?;
    let sort = args
        .sort
        .as_deref()
        .map(SortSpec::parse)
        .transpose()
        .context("Invalid sort")?;

    let engine = ctx.open_engine()?;
    let page_size = args.page_size.unwrap_or(ctx.config.query.default_page_size);
    let result = engine.query_documents(filter.as_ref(), sort.as_ref(), Paging::new(args.page, page_size))?;

    let response = PaginatedResponse::from(result);
    output.display(&response)?;
    if !output.is_json() {
        output.info(&format!(
            "Page {} ({} matching document(s)){}",
            response.page,
            response.total,
            if response.has_more { "; more pages follow" } else { "" }
        ));
    }
    Ok(())
}
