//! CLI argument definitions using clap
//!
//! Commands:
//! - academy-ds query --table <name> [--seed <path> | --config <path>] [PARAM ...]
//! - academy-ds tables --seed <path>

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::observability::Severity;
use crate::query::Operation;

/// academy-ds - run data-source queries locally
#[derive(Parser, Debug)]
#[command(name = "academy-ds")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Minimum severity written to stderr
    #[arg(long, value_enum, default_value_t = LogLevel::Info, global = true)]
    pub log_level: LogLevel,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Execute a single query and print its {data, error} pair
    Query(QueryArgs),

    /// List the tables of a seed file with their row counts
    Tables {
        /// JSON fixture mapping table names to rows
        #[arg(long)]
        seed: PathBuf,
    },
}

#[derive(Args, Debug, Clone)]
pub struct QueryArgs {
    /// Table to query
    #[arg(long)]
    pub table: String,

    /// JSON fixture loaded into an in-memory source
    #[arg(long, conflicts_with = "config")]
    pub seed: Option<PathBuf>,

    /// Data source configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Operation to run
    #[arg(long, value_enum, default_value_t = OpArg::Select)]
    pub op: OpArg,

    /// JSON payload for insert, update and upsert; `-` reads stdin
    #[arg(long)]
    pub body: Option<String>,

    /// Columns to return
    #[arg(long, default_value = "*")]
    pub select: String,

    /// Expect exactly one row
    #[arg(long, conflicts_with = "maybe_single")]
    pub single: bool,

    /// Expect at most one row
    #[arg(long)]
    pub maybe_single: bool,

    /// Query parameters such as grade=eq.7, order=name.desc, limit=3
    pub params: Vec<String>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpArg {
    Select,
    Insert,
    Update,
    Upsert,
    Delete,
}

impl From<OpArg> for Operation {
    fn from(op: OpArg) -> Self {
        match op {
            OpArg::Select => Operation::Select,
            OpArg::Insert => Operation::Insert,
            OpArg::Update => Operation::Update,
            OpArg::Upsert => Operation::Upsert,
            OpArg::Delete => Operation::Delete,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for Severity {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Severity::Trace,
            LogLevel::Info => Severity::Info,
            LogLevel::Warn => Severity::Warn,
            LogLevel::Error => Severity::Error,
        }
    }
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_query() {
        let cli = Cli::try_parse_from([
            "academy-ds",
            "query",
            "--table",
            "students",
            "--seed",
            "fixtures.json",
            "--single",
            "grade=eq.7",
            "order=name.desc",
        ])
        .unwrap();

        assert_eq!(cli.log_level, LogLevel::Info);
        match cli.command {
            Command::Query(args) => {
                assert_eq!(args.table, "students");
                assert_eq!(args.op, OpArg::Select);
                assert_eq!(args.select, "*");
                assert!(args.single);
                assert_eq!(args.params, vec!["grade=eq.7", "order=name.desc"]);
            }
            other => panic!("expected query, got {:?}", other),
        }
    }

    #[test]
    fn test_conflicting_flags() {
        assert!(Cli::try_parse_from([
            "academy-ds", "query", "--table", "t", "--single", "--maybe-single"
        ])
        .is_err());
        assert!(Cli::try_parse_from([
            "academy-ds", "query", "--table", "t", "--seed", "a.json", "--config", "b.json"
        ])
        .is_err());
    }

    #[test]
    fn test_parse_tables() {
        let cli = Cli::try_parse_from([
            "academy-ds",
            "--log-level",
            "warn",
            "tables",
            "--seed",
            "f.json",
        ])
        .unwrap();
        assert_eq!(cli.log_level, LogLevel::Warn);
        assert!(matches!(cli.command, Command::Tables { .. }));
    }
}
