//! CLI entry point for `stage2merge`.

use std::path::PathBuf;
use std::process;

use clap::Parser;
use stage2merge::config::{Assignment, MergeSpec, WindowFilter};
use stage2merge::error::{MergeError, Result};
use stage2merge::generator::merge_generator::{compile_merge, CompiledStatement};
use stage2merge::output::formatter;
use stage2merge::schema::catalog::InMemoryCatalog;
use stage2merge::schema::locator::RelationLocator;
use stage2merge::schema::resolver::{resolve, resolve_columns};
use stage2merge::schema::types::ColumnSet;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "stage2merge",
    about = "Compile a schema-aware MERGE from a staged relation into an Iceberg table"
)]
struct Cli {
    /// JSON merge spec; replaces the relation and key flags
    #[arg(long)]
    config: Option<PathBuf>,

    /// Source relation, `[catalog.]db.table`
    #[arg(long, required_unless_present = "config")]
    source: Option<String>,

    /// Destination relation, `[catalog.]db.table`
    #[arg(long, required_unless_present = "config")]
    destination: Option<String>,

    /// Primary-key columns (repeatable or comma separated)
    #[arg(long = "pk", value_delimiter = ',', required_unless_present = "config")]
    primary_key: Vec<String>,

    /// Recency column guarding updates; empty disables the guard
    #[arg(long = "updated-at-col")]
    updated_at_col: Option<String>,

    /// Literal written to the operation provenance column
    #[arg(long)]
    op_literal: Option<String>,

    /// Columns never overwritten on update
    #[arg(long, value_delimiter = ',')]
    exclude_update: Vec<String>,

    /// Extra match predicate; ` AND ` separated parts are added one by one
    #[arg(long)]
    extra_on: Vec<String>,

    /// Extra update assignment, `col = expr`
    #[arg(long)]
    extra_set: Vec<String>,

    /// Extra insert column, `col = expr`
    #[arg(long)]
    extra_insert: Vec<String>,

    /// Skip source dedup
    #[arg(long)]
    no_dedupe: bool,

    /// Dedup tie-breaker columns, most significant first
    #[arg(long, value_delimiter = ',')]
    dedupe_tiebreakers: Vec<String>,

    /// Column the explicit window applies to (defaults to the recency column)
    #[arg(long)]
    filter_col: Option<String>,

    /// Inclusive window start
    #[arg(long)]
    start_ts: Option<String>,

    /// Exclusive window end
    #[arg(long)]
    end_ts: Option<String>,

    /// Default lookback over the recency column; 0 disables it
    #[arg(long)]
    lookback_days: Option<u32>,

    /// Catalog files: `.json` column listings or `.sql` CREATE TABLE scripts
    #[arg(long, required = true)]
    catalog: Vec<PathBuf>,

    /// Source column list used instead of the catalog's
    #[arg(long, value_delimiter = ',')]
    source_columns: Vec<String>,

    /// Align source columns onto the destination by position
    #[arg(long)]
    align: bool,

    /// Write `<name>_merge.sql` and `<name>_report.md` here instead of printing
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Output file stem (defaults to the destination table name)
    #[arg(long)]
    name: Option<String>,

    /// Exit with status 1 when the statement carries warnings
    #[arg(long)]
    deny_warnings: bool,

    /// Print verbose diagnostics
    #[arg(long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "stage2merge=debug,warn"
    } else {
        "stage2merge=info,warn"
    };
    tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    let compiled = match run(&cli) {
        Ok(compiled) => compiled,
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(2);
        }
    };

    if cli.deny_warnings && compiled.warning_count() > 0 {
        for notice in compiled.notices() {
            eprintln!("{notice}");
        }
        process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<CompiledStatement> {
    let spec = build_spec(cli)?;

    let mut catalog = InMemoryCatalog::new();
    for path in &cli.catalog {
        catalog.load_file(path)?;
    }
    debug!(relations = catalog.len(), "loaded catalog");

    let schema = resolve(&catalog, &spec.destination)?;
    let source_columns = if cli.source_columns.is_empty() {
        resolve_columns(&catalog, &spec.source)?
    } else {
        ColumnSet::new(cli.source_columns.iter().map(|c| c.trim().to_string()))
    };

    let compiled = compile_merge(&spec, &schema, &source_columns)?;

    match &cli.output_dir {
        Some(dir) => {
            let name = cli
                .name
                .clone()
                .unwrap_or_else(|| spec.destination.table().to_string());
            let written = formatter::write_output(dir, &name, &spec, &compiled)?;
            debug!(statement = %written.statement.display(), "wrote output");
        }
        None => println!("{};", compiled.sql()),
    }

    Ok(compiled)
}

fn build_spec(cli: &Cli) -> Result<MergeSpec> {
    let mut spec = match &cli.config {
        Some(path) => MergeSpec::load(path)?,
        None => {
            let source = required(cli.source.as_deref(), "--source")?;
            let destination = required(cli.destination.as_deref(), "--destination")?;
            MergeSpec::new(
                RelationLocator::parse(source)?,
                RelationLocator::parse(destination)?,
                &cli.primary_key,
            )
        }
    };

    if let Some(column) = &cli.updated_at_col {
        spec = spec.with_recency_column(Some(column));
    }
    if let Some(literal) = &cli.op_literal {
        spec = spec.with_op_literal(literal);
    }
    if !cli.exclude_update.is_empty() {
        spec = spec.with_excluded_update(&cli.exclude_update);
    }
    for predicate in &cli.extra_on {
        for part in predicate.split(" AND ").filter(|p| !p.trim().is_empty()) {
            spec = spec.with_extra_on(part.trim());
        }
    }
    for raw in &cli.extra_set {
        spec.extra_set.push(Assignment::parse(raw)?);
    }
    for raw in &cli.extra_insert {
        spec.extra_insert.push(Assignment::parse(raw)?);
    }
    if cli.no_dedupe {
        spec = spec.with_dedup(false);
    }
    if !cli.dedupe_tiebreakers.is_empty() {
        spec = spec.with_tiebreakers(&cli.dedupe_tiebreakers);
    }
    if cli.start_ts.is_some() || cli.end_ts.is_some() {
        spec = spec.with_window(WindowFilter {
            column: cli.filter_col.clone(),
            start: cli.start_ts.clone(),
            end: cli.end_ts.clone(),
        });
    }
    if let Some(days) = cli.lookback_days {
        spec = spec.with_lookback_days(days);
    }
    if cli.align {
        spec = spec.with_positional_alignment(true);
    }

    spec.validate()?;
    Ok(spec)
}

fn required<'a>(value: Option<&'a str>, flag: &str) -> Result<&'a str> {
    value.ok_or_else(|| MergeError::Config(format!("{flag} is required without --config")))
}
