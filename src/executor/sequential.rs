//! Sequential executor
//!
//! One evaluator invocation over the whole source with the user's output
//! options. This is the baseline every parallel mode must agree with.
//!
//! The source streams into the evaluator and output lines reach the sink as
//! they are produced, so an endless pipe never has to fit in memory.

use std::io;
use std::sync::Arc;

use crate::classifier::AggregateKind;
use crate::config::FailurePolicy;
use crate::evaluator::{EvalError, Evaluator, Invocation};
use crate::observability::{log_event_with_fields, Event};
use crate::source::RecordSource;

use super::aggregate::{log_non_numeric, reduce};
use super::errors::{ExecError, ExecResult};
use super::result::{PartialAggregate, RunStats};
use super::sink::LineSink;

pub struct SequentialExecutor {
    evaluator: Arc<dyn Evaluator>,
    policy: FailurePolicy,
}

impl SequentialExecutor {
    pub fn new(evaluator: Arc<dyn Evaluator>, policy: FailurePolicy) -> Self {
        Self { evaluator, policy }
    }

    /// Evaluates `query` over the entire source.
    ///
    /// A failed invocation follows the failure policy, exactly like a single
    /// failed partition would. Lines written before the failure stay written.
    pub fn run(
        &self,
        query: &str,
        source: RecordSource,
        sink: &mut dyn LineSink,
    ) -> ExecResult<RunStats> {
        let stats = self.invoke(&Invocation::passthrough(query), source, &mut |line| {
            sink.emit(line)
        })?;
        sink.flush()?;
        Ok(stats)
    }

    /// Reduces `inner` over the entire source in one invocation.
    ///
    /// Same reducer as the partitioned path with a single partition, so the
    /// scalar does not depend on the plan. A failed invocation contributes
    /// nothing under the warn policy.
    pub fn run_aggregate(
        &self,
        kind: AggregateKind,
        inner: &str,
        source: RecordSource,
    ) -> ExecResult<(f64, RunStats)> {
        let mut partial = PartialAggregate::default();
        let mut stats = self.invoke(&Invocation::compact(inner), source, &mut |line| {
            partial.add_line(line);
            Ok(())
        })?;

        if stats.failed_partitions > 0 {
            partial = PartialAggregate::default();
        }
        stats.lines_emitted = 0;
        log_non_numeric(kind, 0, &partial);

        Ok((reduce(kind, &partial), stats))
    }

    fn invoke(
        &self,
        invocation: &Invocation,
        source: RecordSource,
        emit: &mut dyn FnMut(&str) -> io::Result<()>,
    ) -> ExecResult<RunStats> {
        let reader = source.into_reader()?;
        let mut stats = RunStats {
            partitions: 1,
            ..Default::default()
        };

        let mut emitted = 0u64;
        let result = self.evaluator.evaluate_stream(invocation, reader, &mut |line| {
            emit(line)?;
            emitted += 1;
            Ok(())
        });
        stats.lines_emitted = emitted;

        match result {
            Ok(()) => Ok(stats),
            Err(EvalError::Output { kind, reason }) => {
                Err(ExecError::Sink(io::Error::new(kind, reason)))
            }
            Err(err) => {
                stats.failed_partitions = 1;
                log_event_with_fields(
                    Event::PartitionFailed,
                    &[
                        ("code", err.code()),
                        ("policy", self.policy.as_str()),
                        ("reason", err.to_string().as_str()),
                        ("seq", "0"),
                    ],
                );
                if self.policy == FailurePolicy::Abort || err.is_startup() {
                    return Err(ExecError::Evaluation(err));
                }
                Ok(stats)
            }
        }
    }
}
