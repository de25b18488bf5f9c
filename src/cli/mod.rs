//! CLI module for academy-ds
//!
//! Provides command-line interface for:
//! - query: one-shot query against a seeded or configured source
//! - tables: table names and row counts of a seed file

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command, LogLevel, OpArg, QueryArgs};
pub use commands::{prepare, query, resolve, run, run_command, tables, Mode};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{read_body, write_json};
