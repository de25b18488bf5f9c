//! CLI command implementations
//!
//! Commands run on a tokio runtime created per invocation; `main` stays
//! synchronous.

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Value};

use crate::config::{connect, DataSourceConfig};
use crate::datasource::DataSource;
use crate::memory::MemoryDataSource;
use crate::observability::Logger;
use crate::query::{Operation, QueryBuilder, QueryParams};

use super::args::{Cli, Command, QueryArgs};
use super::errors::{CliError, CliResult};
use super::io::{read_body, write_json};

/// How a query resolves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Rows,
    Single,
    MaybeSingle,
}

impl Mode {
    fn from_args(args: &QueryArgs) -> Self {
        if args.single {
            Mode::Single
        } else if args.maybe_single {
            Mode::MaybeSingle
        } else {
            Mode::Rows
        }
    }
}

/// Parse arguments and run the selected command
pub fn run() -> CliResult<()> {
    let cli = Cli::parse_args();
    Logger::set_min_severity(cli.log_level.into());
    run_command(cli.command)
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Query(args) => query(args),
        Command::Tables { seed } => tables(&seed),
    }
}

/// Execute one query and print its `{data, error}` pair
pub fn query(args: QueryArgs) -> CliResult<()> {
    let source = open_source(&args)?;
    let body = match args.body.as_deref() {
        Some("-") => Some(read_body()?),
        Some(text) => Some(serde_json::from_str(text).map_err(|e| {
            CliError::invalid_args(format!("--body is not valid JSON: {}", e))
        })?),
        None => None,
    };
    let builder = prepare(&args, body, source.as_ref())?;
    let mode = Mode::from_args(&args);

    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| CliError::runtime_error(format!("Failed to create tokio runtime: {}", e)))?;
    let output = rt.block_on(resolve(builder, mode))?;

    write_json(&output)
}

/// Print table names and row counts of a seed file
pub fn tables(seed: &Path) -> CliResult<()> {
    let source = MemoryDataSource::new();
    source.seed_file(seed)?;

    let tables: Vec<Value> = source
        .tables()
        .into_iter()
        .map(|(name, rows)| json!({"name": name, "rows": rows}))
        .collect();

    write_json(&json!({ "tables": tables }))
}

fn open_source(args: &QueryArgs) -> CliResult<Arc<dyn DataSource>> {
    match (&args.seed, &args.config) {
        (Some(seed), _) => {
            let source = MemoryDataSource::new();
            source.seed_file(seed)?;
            Ok(Arc::new(source))
        }
        (None, Some(config)) => Ok(connect(&DataSourceConfig::load(config)?)?),
        (None, None) => Ok(Arc::new(MemoryDataSource::new())),
    }
}

/// Build the query the arguments describe without running it
pub fn prepare(
    args: &QueryArgs,
    body: Option<Value>,
    source: &dyn DataSource,
) -> CliResult<QueryBuilder> {
    let params = QueryParams::parse_args(args.params.as_slice())?;
    let operation = Operation::from(args.op);

    let builder = source.from(&args.table);
    let builder = match operation {
        Operation::Select => builder.select(&args.select),
        Operation::Insert => builder.insert(require_body(operation, body)?),
        Operation::Update => builder.update(require_body(operation, body)?),
        Operation::Upsert => builder.upsert(require_body(operation, body)?),
        Operation::Delete => builder.delete(),
    };

    Ok(builder.apply_params(params))
}

fn require_body(operation: Operation, body: Option<Value>) -> CliResult<Value> {
    body.ok_or_else(|| CliError::invalid_args(format!("--body is required for {}", operation)))
}

/// Resolve a builder and render the pair as JSON
pub async fn resolve(builder: QueryBuilder, mode: Mode) -> CliResult<Value> {
    match mode {
        Mode::Rows => to_json(&builder.await),
        Mode::Single => to_json(&builder.single().await),
        Mode::MaybeSingle => to_json(&builder.maybe_single().await),
    }
}

fn to_json<T: Serialize>(value: &T) -> CliResult<Value> {
    Ok(serde_json::to_value(value)?)
}
