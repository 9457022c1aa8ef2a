//! jqpar CLI entry point
//!
//! Delegates everything to `cli::run`, prints a failure as `CODE: message`
//! on stderr and exits 1.

use jqpar::cli;

fn main() {
    if let Err(e) = cli::run() {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}
