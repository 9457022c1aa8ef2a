//! Output handling for the CLI
//!
//! - Query output goes to stdout only
//! - Logs go to stderr (see `observability`)
//! - A closed stdout (e.g. `| head`) ends the run quietly

use std::io::{self, BufWriter, Write};

use crate::evaluator::EvaluatorOptions;
use crate::executor::WriterSink;
use crate::planner::ExplainPlan;

use super::errors::CliResult;

/// Buffered, locked stdout
pub fn stdout() -> BufWriter<io::StdoutLock<'static>> {
    BufWriter::new(io::stdout().lock())
}

/// Line sink matching the user's output options
pub fn output_sink<W: Write>(writer: W, options: &EvaluatorOptions) -> WriterSink<W> {
    if options.join_output {
        WriterSink::joined(writer)
    } else {
        WriterSink::new(writer)
    }
}

/// Writes explain plans separated by blank lines
pub fn write_explain(out: &mut dyn Write, plans: &[ExplainPlan]) -> CliResult<()> {
    for (i, plan) in plans.iter().enumerate() {
        if i > 0 {
            writeln!(out)?;
        }
        write!(out, "{}", plan)?;
    }
    out.flush()?;
    Ok(())
}
