//! CLI module for jqpar
//!
//! `jqpar [FLAGS] QUERY [FILE...]`
//!
//! Parses flags, resolves configuration, validates inputs and the evaluator,
//! then plans and runs each input. Query output goes to stdout; logs and
//! errors go to stderr.

mod args;
mod commands;
mod errors;
mod io;

use std::ffi::OsString;

use clap::error::ErrorKind;
use clap::Parser;

pub use args::Cli;
pub use commands::{run_with, Runner};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{output_sink, stdout, write_explain};

/// Parses arguments, tolerating `--help` and `--version` (which exit 0).
pub fn parse_args<I, T>(args: I) -> CliResult<Cli>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    match Cli::try_parse_from(args) {
        Ok(cli) => Ok(cli),
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => e.exit(),
        Err(e) => Err(CliError::usage(e.to_string().trim_end())),
    }
}

/// Entry point used by `main`
pub fn run() -> CliResult<()> {
    let cli = parse_args(std::env::args_os())?;
    let mut out = stdout();
    run_with(cli, &mut out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_is_usage() {
        let err = parse_args(["jqpar", "--threshold", "many", "."]).unwrap_err();
        assert_eq!(err.code(), CliErrorCode::Usage);
    }

    #[test]
    fn test_parse_ok() {
        let cli = parse_args(["jqpar", "--no-order", "select(.a)"]).unwrap();
        assert!(cli.no_order);
    }
}
