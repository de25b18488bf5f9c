//! academy-ds entry point
//!
//! Parses arguments, dispatches to the CLI module, logs the failure as a
//! JSON line on stderr and exits non-zero.

use academy_datasource::cli;
use academy_datasource::observability::Logger;

fn main() {
    if let Err(e) = cli::run() {
        Logger::error(
            "COMMAND_FAILED",
            &[("code", e.code_str()), ("message", e.message())],
        );
        std::process::exit(1);
    }
}
