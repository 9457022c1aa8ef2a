//! Partitioned aggregation executor
//!
//! Map: each partition evaluates the inner filter in compact mode and becomes
//! a `(sum, count)` partial. Reduce: partials merge in any order, then the
//! aggregate kind turns the total into one scalar.

use std::sync::Arc;

use crate::classifier::AggregateKind;
use crate::config::Config;
use crate::evaluator::{Evaluator, Invocation};
use crate::observability::{log_event_with_fields, Event};
use crate::source::RecordSource;

use super::errors::ExecResult;
use super::pool::WorkerPool;
use super::result::{format_scalar, PartialAggregate, RunStats};

pub struct PartitionedAggregationExecutor {
    evaluator: Arc<dyn Evaluator>,
    pool: WorkerPool,
    block_size: usize,
}

impl PartitionedAggregationExecutor {
    pub fn new(evaluator: Arc<dyn Evaluator>, config: &Config) -> Self {
        Self {
            evaluator,
            // Reduction is commutative; results need no reordering
            pool: WorkerPool::new(&Config {
                preserve_order: false,
                ..config.clone()
            }),
            block_size: config.block_size,
        }
    }

    /// Reduces `inner` over every partition of `source` to one value.
    pub fn run(
        &self,
        kind: AggregateKind,
        inner: &str,
        source: RecordSource,
    ) -> ExecResult<(f64, RunStats)> {
        let label = source.label();
        let partitions = source.partitions(self.block_size)?;
        let evaluator = Arc::clone(&self.evaluator);
        let invocation = Invocation::compact(inner);
        let mut total = PartialAggregate::default();

        let stats = self.pool.run(
            &label,
            partitions,
            move |partition| {
                evaluator
                    .evaluate(&invocation, partition.data())
                    .map(|lines| PartialAggregate::from_lines(&lines))
            },
            |seq, partial: PartialAggregate| {
                log_non_numeric(kind, seq, &partial);
                total = total.merge(partial);
                Ok(0)
            },
        )?;

        Ok((reduce(kind, &total), stats))
    }
}

/// Logs values that a sum or average had to skip
pub(super) fn log_non_numeric(kind: AggregateKind, seq: u64, partial: &PartialAggregate) {
    if partial.non_numeric == 0 || kind == AggregateKind::Count {
        return;
    }
    let seq_field = seq.to_string();
    let ignored = partial.non_numeric.to_string();
    log_event_with_fields(
        Event::NonNumericValue,
        &[("ignored", ignored.as_str()), ("seq", seq_field.as_str())],
    );
}

/// Turns the merged partial into the final scalar
pub(super) fn reduce(kind: AggregateKind, total: &PartialAggregate) -> f64 {
    let value = total.finish(kind);
    let count = total.count.to_string();
    let formatted = format_scalar(value);
    log_event_with_fields(
        Event::ReduceComplete,
        &[
            ("count", count.as_str()),
            ("kind", kind.as_str()),
            ("value", formatted.as_str()),
        ],
    );
    value
}
