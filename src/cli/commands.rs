//! CLI command implementation
//!
//! Startup order:
//!
//! 1. Parse arguments, require a query
//! 2. Resolve configuration (defaults, file, flags) and configure logging
//! 3. Open every input, failing on the first missing file before any output
//! 4. Probe the evaluator binary (skipped by `--explain`)
//! 5. Classify the query once, then plan and run each input in argument order

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use crate::classifier::{classify, Classification};
use crate::config::Config;
use crate::evaluator::{Evaluator, JqEvaluator};
use crate::executor::{self, LineSink};
use crate::observability::{self, log_event_with_fields, Event};
use crate::planner::{ExecutionPlanner, ExplainPlan};
use crate::source::RecordSource;

use super::args::Cli;
use super::errors::{CliError, CliResult};
use super::io::{output_sink, write_explain};

/// One resolved invocation: query, inputs and configuration
#[derive(Debug)]
pub struct Runner {
    query: String,
    files: Vec<PathBuf>,
    config: Config,
    explain: bool,
}

impl Runner {
    /// Validates arguments and resolves configuration.
    pub fn from_cli(cli: Cli) -> CliResult<Self> {
        let query = cli.query.clone().ok_or_else(CliError::missing_query)?;
        let config = Config::resolve(cli.config.as_deref(), cli.overrides())?;

        Ok(Self {
            query,
            files: cli.files,
            config,
            explain: cli.explain,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn is_explain(&self) -> bool {
        self.explain
    }

    /// Opens every input up front. Standard input when no files were given.
    pub fn open_sources(&self) -> CliResult<Vec<RecordSource>> {
        if self.files.is_empty() {
            return Ok(vec![RecordSource::stdin()]);
        }
        self.files
            .iter()
            .map(|path| RecordSource::open(path).map_err(CliError::from))
            .collect()
    }

    /// Builds the `jq` evaluator and checks that it runs.
    pub fn probe_evaluator(&self) -> CliResult<Arc<dyn Evaluator>> {
        let evaluator = JqEvaluator::new(&self.config.jq_path, self.config.evaluator.clone());
        let program = evaluator.program().display().to_string();

        match evaluator.probe() {
            Ok(version) => {
                log_event_with_fields(
                    Event::EvaluatorReady,
                    &[("program", program.as_str()), ("version", version.as_str())],
                );
                Ok(Arc::new(evaluator))
            }
            Err(err) => {
                log_event_with_fields(
                    Event::EvaluatorMissing,
                    &[("program", program.as_str()), ("reason", err.to_string().as_str())],
                );
                Err(err.into())
            }
        }
    }

    fn classify(&self) -> Classification {
        let classification = classify(&self.query);
        let label = classification.label();
        log_event_with_fields(
            Event::QueryClassified,
            &[("classification", label.as_str()), ("query", self.query.as_str())],
        );
        classification
    }

    /// Plans every input without evaluating anything
    pub fn explain(&self, sources: &[RecordSource]) -> CliResult<Vec<ExplainPlan>> {
        let classification = self.classify();
        let planner = ExecutionPlanner::new(&self.config);

        sources
            .iter()
            .map(|source| {
                let estimate = source.estimate_size()?;
                let plan = planner.plan(&classification, estimate);
                Ok(ExplainPlan::new(
                    source.label(),
                    &classification,
                    estimate,
                    &plan,
                    &self.config,
                ))
            })
            .collect()
    }

    /// Plans and runs each input in order, writing all output to `sink`.
    pub fn execute(
        &self,
        sources: Vec<RecordSource>,
        evaluator: Arc<dyn Evaluator>,
        sink: &mut dyn LineSink,
    ) -> CliResult<()> {
        let classification = self.classify();
        let planner = ExecutionPlanner::new(&self.config);

        for source in sources {
            let estimate = source.estimate_size()?;
            let plan = planner.plan(&classification, estimate);

            let label = source.label();
            let estimate_field = estimate.to_string();
            log_event_with_fields(
                Event::PlanSelected,
                &[
                    ("estimate", estimate_field.as_str()),
                    ("mode", plan.mode.as_str()),
                    ("reason", plan.reason.as_str()),
                    ("source", label.as_str()),
                ],
            );

            match executor::execute(
                &plan,
                &classification,
                &self.query,
                source,
                &self.config,
                Arc::clone(&evaluator),
                sink,
            ) {
                Ok(_) => {}
                // Downstream closed stdout; nothing more can be delivered
                Err(e) if e.is_broken_pipe() => return Ok(()),
                Err(e) => return Err(e.into()),
            }
        }

        Ok(())
    }
}

/// Runs the CLI with process arguments, writing query output to `out`.
pub fn run_with(cli: Cli, out: &mut dyn Write) -> CliResult<()> {
    let runner = Runner::from_cli(cli)?;
    let config = runner.config();

    observability::init(config.debug_level);
    let workers = config.workers.to_string();
    let threshold = config.threshold.to_string();
    let block_size = config.block_size.to_string();
    log_event_with_fields(
        Event::ConfigResolved,
        &[
            ("block_size", block_size.as_str()),
            ("failure_policy", config.failure_policy.as_str()),
            ("preserve_order", if config.preserve_order { "true" } else { "false" }),
            ("threshold", threshold.as_str()),
            ("workers", workers.as_str()),
        ],
    );

    let sources = runner.open_sources()?;

    if runner.is_explain() {
        let plans = runner.explain(&sources)?;
        return write_explain(out, &plans);
    }

    let evaluator = runner.probe_evaluator()?;
    let mut sink = output_sink(out, &config.evaluator);
    runner.execute(sources, evaluator, &mut sink)
}
