//! Executors
//!
//! Each [`ExecutionMode`] has one executor:
//!
//! - `Sequential` → [`SequentialExecutor`] (one evaluator run, the baseline)
//! - `ParallelFilter` → [`PartitionedFilterExecutor`]
//! - `ParallelAggregate` → [`PartitionedAggregationExecutor`]
//!
//! Both partitioned executors share the [`WorkerPool`]. Output always goes
//! through a [`LineSink`] owned by a single collector.
//!
//! An aggregate query prints one scalar whichever mode runs it. Under a
//! sequential plan the inner filter streams through one invocation and the
//! same reducer produces the value.

mod aggregate;
mod errors;
mod filter;
mod pool;
mod reorder;
mod result;
mod sequential;
mod sink;

use std::sync::Arc;

use crate::classifier::Classification;
use crate::config::Config;
use crate::evaluator::Evaluator;
use crate::observability::{log_event_with_fields, Event};
use crate::planner::{ExecutionMode, ExecutionPlan};
use crate::source::RecordSource;

pub use aggregate::PartitionedAggregationExecutor;
pub use errors::{ExecError, ExecResult};
pub use filter::PartitionedFilterExecutor;
pub use pool::WorkerPool;
pub use reorder::ReorderBuffer;
pub use result::{format_scalar, PartialAggregate, RunStats};
pub use sequential::SequentialExecutor;
pub use sink::{LineSink, WriterSink};

/// Runs `query` over `source` as the plan says and writes output to `sink`.
///
/// An aggregate query writes exactly one line, the reduced scalar, unless
/// slurp or null-input hand the whole query to the evaluator unchanged.
pub fn execute(
    plan: &ExecutionPlan,
    classification: &Classification,
    query: &str,
    source: RecordSource,
    config: &Config,
    evaluator: Arc<dyn Evaluator>,
    sink: &mut dyn LineSink,
) -> ExecResult<RunStats> {
    let label = source.label();

    let stats = match &plan.mode {
        ExecutionMode::Sequential => {
            let sequential = SequentialExecutor::new(evaluator, config.failure_policy);
            match classification.aggregate() {
                Some((kind, inner)) if !config.evaluator.consumes_whole_input() => {
                    let (value, stats) = sequential.run_aggregate(kind, inner, source)?;
                    emit_scalar(sink, value, stats)?
                }
                _ => sequential.run(query, source, sink)?,
            }
        }
        ExecutionMode::ParallelFilter => {
            PartitionedFilterExecutor::new(evaluator, config).run(query, source, sink)?
        }
        ExecutionMode::ParallelAggregate { kind, inner } => {
            let (value, stats) =
                PartitionedAggregationExecutor::new(evaluator, config).run(*kind, inner, source)?;
            emit_scalar(sink, value, stats)?
        }
    };

    let partitions = stats.partitions.to_string();
    let failed = stats.failed_partitions.to_string();
    let lines = stats.lines_emitted.to_string();
    log_event_with_fields(
        Event::RunComplete,
        &[
            ("failed_partitions", failed.as_str()),
            ("lines_emitted", lines.as_str()),
            ("mode", plan.mode.as_str()),
            ("partitions", partitions.as_str()),
            ("source", label.as_str()),
        ],
    );

    Ok(stats)
}

fn emit_scalar(sink: &mut dyn LineSink, value: f64, mut stats: RunStats) -> ExecResult<RunStats> {
    sink.emit(&format_scalar(value))?;
    sink.flush()?;
    stats.lines_emitted += 1;
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::classify;
    use crate::evaluator::ScriptedEvaluator;
    use crate::planner::ExecutionPlanner;
    use crate::source::SizeEstimate;

    fn run(query: &str, input: &str, config: &Config) -> (Vec<String>, ExecutionPlan) {
        let source = RecordSource::memory("mem", input);
        let estimate = source.estimate_size().unwrap();
        let classification = classify(query);
        let plan = ExecutionPlanner::new(config).plan(&classification, estimate);
        let mut out: Vec<String> = Vec::new();
        execute(
            &plan,
            &classification,
            query,
            source,
            config,
            Arc::new(ScriptedEvaluator::new()),
            &mut out,
        )
        .unwrap();
        (out, plan)
    }

    #[test]
    fn test_aggregate_plan_writes_one_scalar() {
        let config = Config {
            threshold: 2,
            block_size: 8,
            ..Default::default()
        };
        let input = "{\"v\":1}\n{\"v\":2}\n{\"v\":6}\n";
        let (out, plan) = run("[.v] | add / length", input, &config);
        assert!(matches!(plan.mode, ExecutionMode::ParallelAggregate { .. }));
        assert_eq!(out, vec!["3"]);
    }

    #[test]
    fn test_aggregate_output_same_on_both_sides_of_threshold() {
        let input = "{\"v\":10}\n{\"v\":20}\n{\"v\":30}\n";
        let below = Config {
            threshold: 3,
            block_size: 8,
            ..Default::default()
        };
        let above = Config {
            threshold: 2,
            ..below.clone()
        };

        for (query, expected) in [
            ("[select(.v > 15)] | length", "2"),
            ("[.v] | add", "60"),
            ("[select(.v > 100) | .v] | add / length", "0"),
        ] {
            let (seq_out, seq_plan) = run(query, input, &below);
            let (par_out, par_plan) = run(query, input, &above);
            assert_eq!(seq_plan.mode, ExecutionMode::Sequential);
            assert!(matches!(par_plan.mode, ExecutionMode::ParallelAggregate { .. }));
            assert_eq!(seq_out, vec![expected], "{}", query);
            assert_eq!(par_out, seq_out, "{}", query);
        }
    }

    #[test]
    fn test_forced_modes_agree_on_aggregates() {
        use crate::config::ForcedMode;

        let input: String = (1..=40).map(|i| format!("{{\"v\":{}}}\n", i)).collect();
        let forced = |mode| Config {
            forced_mode: Some(mode),
            block_size: 64,
            ..Default::default()
        };

        for query in [
            "[select(.v > 25)] | length",
            "[.v] | add",
            "[.v] | add / length",
            "[select(.v > 1000) | .v] | add / length",
        ] {
            let (seq_out, seq_plan) = run(query, &input, &forced(ForcedMode::Sequential));
            let (par_out, par_plan) = run(query, &input, &forced(ForcedMode::Parallel));
            assert_eq!(seq_plan.mode, ExecutionMode::Sequential);
            assert!(matches!(par_plan.mode, ExecutionMode::ParallelAggregate { .. }));
            assert_eq!(seq_out.len(), 1, "{}", query);
            assert_eq!(par_out, seq_out, "{}", query);
        }
    }

    #[test]
    fn test_slurped_aggregate_goes_to_evaluator_verbatim() {
        let config = Config {
            evaluator: crate::evaluator::EvaluatorOptions {
                slurp: true,
                ..Default::default()
            },
            ..Default::default()
        };
        // The scripted evaluator ignores -s, so it shows the query arrived unchanged
        let (out, plan) = run("[.v] | add", "{\"v\":1}\n{\"v\":2}\n", &config);
        assert_eq!(plan.mode, ExecutionMode::Sequential);
        assert_eq!(out, vec!["1", "2"]);
    }

    #[test]
    fn test_filter_plan_matches_sequential() {
        let input: String = (0..50).map(|i| format!("{{\"v\":{}}}\n", i)).collect();
        let query = "select(.v > 20) | .v";

        let parallel = Config {
            threshold: 10,
            block_size: 32,
            ..Default::default()
        };
        let (par_out, par_plan) = run(query, &input, &parallel);
        assert_eq!(par_plan.mode, ExecutionMode::ParallelFilter);

        let sequential = Config {
            threshold: 1000,
            ..Default::default()
        };
        let (seq_out, seq_plan) = run(query, &input, &sequential);
        assert_eq!(seq_plan.mode, ExecutionMode::Sequential);

        assert_eq!(par_out, seq_out);
    }

    #[test]
    fn test_stream_source_runs_partitioned() {
        let config = Config {
            threshold: 1_000_000,
            block_size: 8,
            ..Default::default()
        };
        let source = RecordSource::stream("pipe", std::io::Cursor::new(b"{\"v\":1}\n{\"v\":2}\n".to_vec()));
        let classification = classify("select(.v > 1)");
        let plan = ExecutionPlanner::new(&config).plan(&classification, SizeEstimate::Unbounded);
        let mut out: Vec<String> = Vec::new();
        execute(
            &plan,
            &classification,
            "select(.v > 1)",
            source,
            &config,
            Arc::new(ScriptedEvaluator::new()),
            &mut out,
        )
        .unwrap();
        assert_eq!(out, vec!["{\"v\":2}"]);
    }
}
