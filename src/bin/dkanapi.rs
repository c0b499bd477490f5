use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use dkanapi::{Client, Escape, SearchQuery, SortDirection, Table};
use serde_json::Value;
use tabled::builder::Builder;
use tabled::settings::Style;
use tracing::Level;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
    Jsonl,
}

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
struct Cli {
    /// Datastore resource identifier
    resource_id: String,

    /// Portal base URL, defaults to DKANAPI_URL, then .dkanapirc, then the DKAN demo portal
    #[clap(long)]
    url: Option<String>,

    /// Field to filter on, repeat for several fields
    #[clap(short = 'f', long = "filter-field")]
    filter_fields: Vec<String>,

    /// Comma-separated values accepted for the filter field in the same position
    #[clap(short = 'v', long = "filter-values")]
    filter_values: Vec<String>,

    /// Output column, repeat for several; all columns when omitted
    #[clap(long = "field")]
    fields: Vec<String>,

    /// Full-text search term, repeatable
    #[clap(short, long)]
    query: Vec<String>,

    /// Field to sort on
    #[clap(long)]
    sort: Option<String>,

    /// Sort direction: asc or desc
    #[clap(long = "sort-dir")]
    sort_dir: Option<SortDirection>,

    /// Stop after this many records
    #[clap(short = 'n', long)]
    max_records: Option<u64>,

    /// Percent-encode every query parameter instead of only spaces
    #[clap(long)]
    full_encoding: bool,

    /// Print the first-page request URL and exit
    #[clap(long)]
    print_url: bool,

    /// Output format
    #[clap(long, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,

    /// Do not show a progress bar
    #[clap(long)]
    no_progress: bool,

    /// Skip TLS certificate verification
    #[clap(long)]
    insecure: bool,

    /// Print debug information
    #[clap(long)]
    debug: bool,
}

impl Cli {
    fn search_query(&self) -> SearchQuery {
        let mut query = SearchQuery::new(self.resource_id.as_str())
            .filter_fields(self.filter_fields.iter().map(String::as_str))
            .filter_values(
                self.filter_values
                    .iter()
                    .map(|v| v.split(',').map(str::to_string).collect::<Vec<_>>()),
            )
            .fields(self.fields.iter().map(String::as_str))
            .query(self.query.iter().map(String::as_str));

        if let Some(field) = &self.sort {
            query = query.sort_field(field.as_str());
        }
        if let Some(dir) = self.sort_dir {
            query = query.sort_direction(dir);
        }
        if let Some(max) = self.max_records {
            query = query.max_records(max);
        }
        query
    }
}

fn cell(v: &Value) -> String {
    match v {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn print_table(table: &Table) {
    let mut builder = Builder::default();
    builder.push_record(table.columns().iter().cloned());
    for row in table.rows() {
        builder.push_record(row.iter().map(cell));
    }
    let mut rendered = builder.build();
    rendered.with(Style::rounded());
    println!("{}", rendered);
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.debug {
        tracing_subscriber::fmt()
            .with_max_level(Level::DEBUG)
            .with_writer(std::io::stderr)
            .init();
    }

    let verify = if cli.insecure { Some(false) } else { None };
    let escape = if cli.full_encoding {
        Escape::Full
    } else {
        Escape::Spaces
    };

    let client = Client::new(cli.url.clone(), verify)?
        .with_escape(escape)
        .with_progress(!cli.no_progress);

    let query = cli.search_query();

    if cli.print_url {
        println!("{}", client.search_url(&query)?);
        return Ok(());
    }

    let table = client
        .search(&query)
        .with_context(|| format!("search of resource {} failed", cli.resource_id))?;

    match cli.format {
        OutputFormat::Table => print_table(&table),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&table)?),
        OutputFormat::Jsonl => {
            for record in table.into_records() {
                println!("{}", serde_json::to_string(&record)?);
            }
        }
    }

    Ok(())
}
