//! Partitioned filter executor
//!
//! Runs the full filter once per partition and streams output lines to the
//! sink, in partition order or completion order depending on the config.

use std::sync::Arc;

use crate::config::Config;
use crate::evaluator::{Evaluator, Invocation};
use crate::source::RecordSource;

use super::errors::ExecResult;
use super::pool::WorkerPool;
use super::result::RunStats;
use super::sink::LineSink;

pub struct PartitionedFilterExecutor {
    evaluator: Arc<dyn Evaluator>,
    pool: WorkerPool,
    block_size: usize,
}

impl PartitionedFilterExecutor {
    pub fn new(evaluator: Arc<dyn Evaluator>, config: &Config) -> Self {
        Self {
            evaluator,
            pool: WorkerPool::new(config),
            block_size: config.block_size,
        }
    }

    /// Streams `filter` output for every partition of `source` into `sink`.
    pub fn run(
        &self,
        filter: &str,
        source: RecordSource,
        sink: &mut dyn LineSink,
    ) -> ExecResult<RunStats> {
        let label = source.label();
        let partitions = source.partitions(self.block_size)?;
        let evaluator = Arc::clone(&self.evaluator);
        let invocation = Invocation::passthrough(filter);

        let stats = self.pool.run(
            &label,
            partitions,
            move |partition| evaluator.evaluate(&invocation, partition.data()),
            |_, lines: Vec<String>| {
                for line in &lines {
                    sink.emit(line)?;
                }
                Ok(lines.len() as u64)
            },
        )?;

        sink.flush()?;
        Ok(stats)
    }
}
