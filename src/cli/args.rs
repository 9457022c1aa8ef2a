//! CLI argument definitions using clap
//!
//! `jqpar [FLAGS] QUERY [FILE...]`
//!
//! Planner flags control how the query runs. Evaluator flags are passed
//! through to `jq` unchanged.

use std::path::PathBuf;

use clap::{ArgAction, Parser};

use crate::config::{ConfigOverrides, ForcedMode};
use crate::evaluator::EvaluatorOptions;

/// Run jq filters over large NDJSON inputs, in parallel when it is safe
#[derive(Parser, Debug, Default)]
#[command(name = "jqpar")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// jq filter
    pub query: Option<String>,

    /// Input files (standard input when none)
    pub files: Vec<PathBuf>,

    // --- Planner flags ---
    /// Always run partitioned
    #[arg(long, conflicts_with = "sequential")]
    pub parallel: bool,

    /// Always run as a single evaluator invocation
    #[arg(long)]
    pub sequential: bool,

    /// Emit partition output in completion order
    #[arg(long)]
    pub no_order: bool,

    /// Log plan decisions and run statistics to stderr
    #[arg(short = 'd', long)]
    pub debug: bool,

    /// Also log every partition dispatch and completion
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Line count above which parallel execution is considered [default: 1000]
    #[arg(long, value_name = "N")]
    pub threshold: Option<u64>,

    /// Partition size: bytes, or with a K/M/G suffix [default: 2M]
    #[arg(long, value_name = "SIZE")]
    pub block_size: Option<String>,

    /// Worker count [default: CPU count]
    #[arg(long, value_name = "N")]
    pub jobs: Option<usize>,

    /// JSON config file
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Print the plan for each input and exit without evaluating
    #[arg(long)]
    pub explain: bool,

    /// Fail the run when any partition fails
    #[arg(long)]
    pub strict: bool,

    /// Evaluator binary [default: jq]
    #[arg(long = "jq", value_name = "PATH")]
    pub jq_path: Option<PathBuf>,

    // --- Evaluator pass-through flags ---
    /// Compact output
    #[arg(short = 'c', long = "compact-output")]
    pub compact: bool,

    /// Raw string output
    #[arg(short = 'r', long = "raw-output")]
    pub raw_output: bool,

    /// Raw output without newlines
    #[arg(short = 'j', long = "join-output")]
    pub join_output: bool,

    /// ASCII-only output
    #[arg(short = 'a', long = "ascii-output")]
    pub ascii_output: bool,

    /// Sort object keys
    #[arg(short = 'S', long = "sort-keys")]
    pub sort_keys: bool,

    /// Indent with tabs
    #[arg(long)]
    pub tab: bool,

    /// Read all inputs into one array (forces sequential)
    #[arg(short = 's', long)]
    pub slurp: bool,

    /// Use `null` as the single input (forces sequential)
    #[arg(short = 'n', long = "null-input")]
    pub null_input: bool,

    /// Bind $NAME to a string
    #[arg(long = "arg", num_args = 2, value_names = ["NAME", "VALUE"], action = ArgAction::Append)]
    pub args: Vec<String>,

    /// Bind $NAME to a JSON value
    #[arg(long = "argjson", num_args = 2, value_names = ["NAME", "JSON"], action = ArgAction::Append)]
    pub json_args: Vec<String>,
}

fn pairs(flat: &[String]) -> Vec<(String, String)> {
    flat.chunks_exact(2)
        .map(|pair| (pair[0].clone(), pair[1].clone()))
        .collect()
}

impl Cli {
    /// Debug level: 0 by default, 1 with `-d`, 2 with `-v`
    pub fn debug_level(&self) -> u8 {
        if self.verbose {
            2
        } else if self.debug {
            1
        } else {
            0
        }
    }

    pub fn forced_mode(&self) -> Option<ForcedMode> {
        match (self.parallel, self.sequential) {
            (true, _) => Some(ForcedMode::Parallel),
            (_, true) => Some(ForcedMode::Sequential),
            _ => None,
        }
    }

    pub fn evaluator_options(&self) -> EvaluatorOptions {
        EvaluatorOptions {
            compact: self.compact,
            raw_output: self.raw_output || self.join_output,
            join_output: self.join_output,
            ascii_output: self.ascii_output,
            sort_keys: self.sort_keys,
            tab: self.tab,
            slurp: self.slurp,
            null_input: self.null_input,
            args: pairs(&self.args),
            json_args: pairs(&self.json_args),
        }
    }

    /// Flag layer for [`crate::config::Config::resolve`]
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            threshold: self.threshold,
            block_size: self.block_size.clone(),
            forced_mode: self.forced_mode(),
            no_order: self.no_order,
            debug_level: self.debug_level(),
            workers: self.jobs,
            strict: self.strict,
            jq_path: self.jq_path.clone(),
            evaluator: self.evaluator_options(),
        }
    }
}
