//! Bounded worker pool
//!
//! Runs one blocking evaluation per partition on a tokio runtime and hands
//! results to a single collector, either in sequence order or in completion
//! order.
//!
//! Two semaphores bound the run:
//!
//! - `slots` (`workers` permits) limits evaluations running at once. A task
//!   gives its slot back as soon as its evaluation returns.
//! - `window` (`2 × workers` ordered, `workers` unordered) limits partitions
//!   that are in flight or waiting in the reorder buffer. A permit travels
//!   with the result and is released only when the collector has consumed
//!   that partition.
//!
//! The lowest unconsumed partition always holds a window permit, so the
//! reorder buffer cannot stall the dispatcher forever.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::runtime::{Builder, Handle, Runtime};
use tokio::sync::{mpsc, OwnedSemaphorePermit, Semaphore};

use crate::config::{Config, FailurePolicy};
use crate::evaluator::{EvalError, EvalResult};
use crate::observability::{log_event_with_fields, Event};
use crate::source::{Partition, SourceError};

use super::errors::{ExecError, ExecResult};
use super::reorder::ReorderBuffer;
use super::result::RunStats;

/// A finished partition on its way to the collector
struct Completed<T> {
    seq: u64,
    outcome: EvalResult<T>,
    _permit: OwnedSemaphorePermit,
}

/// Bounded pool sized from the run configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerPool {
    workers: usize,
    window: usize,
    preserve_order: bool,
    policy: FailurePolicy,
}

impl WorkerPool {
    pub fn new(config: &Config) -> Self {
        Self {
            workers: config.workers.max(1),
            window: config.window().max(1),
            preserve_order: config.preserve_order,
            policy: config.failure_policy,
        }
    }

    fn runtime(&self) -> ExecResult<Runtime> {
        Builder::new_multi_thread()
            .worker_threads(1)
            .max_blocking_threads(self.workers + 1)
            .thread_name("jqpar-worker")
            .enable_all()
            .build()
            .map_err(|e| ExecError::Runtime(e.to_string()))
    }

    /// Maps every partition with `map` and feeds results to `consume`.
    ///
    /// `consume` runs on the calling thread, one partition at a time, and
    /// returns how many lines it emitted. Failed partitions never reach it:
    /// under [`FailurePolicy::Warn`] they are logged and counted, under
    /// [`FailurePolicy::Abort`] dispatching stops and the first failure is
    /// returned once in-flight work has drained. An unavailable evaluator
    /// aborts under either policy.
    pub fn run<I, T, M, C>(
        &self,
        label: &str,
        partitions: I,
        map: M,
        mut consume: C,
    ) -> ExecResult<RunStats>
    where
        I: Iterator<Item = io::Result<Partition>> + Send + 'static,
        T: Send + 'static,
        M: Fn(&Partition) -> EvalResult<T> + Send + Sync + 'static,
        C: FnMut(u64, T) -> ExecResult<u64>,
    {
        let runtime = self.runtime()?;
        let slots = Arc::new(Semaphore::new(self.workers));
        let window = Arc::new(Semaphore::new(self.window));
        let abort = Arc::new(AtomicBool::new(false));
        let (tx, mut rx) = mpsc::unbounded_channel::<Completed<T>>();

        let dispatcher = {
            let handle = runtime.handle().clone();
            let abort = Arc::clone(&abort);
            let label = label.to_string();
            let map = Arc::new(map);
            runtime.spawn_blocking(move || {
                dispatch(&handle, &label, partitions, map, slots, window, &abort, tx)
            })
        };

        let preserve_order = self.preserve_order;
        let policy = self.policy;

        runtime.block_on(async move {
            let mut stats = RunStats::default();
            let mut reorder: ReorderBuffer<Completed<T>> = ReorderBuffer::new();
            let mut failure: Option<ExecError> = None;

            let mut handle_one = |done: Completed<T>, stats: &mut RunStats| {
                stats.partitions += 1;
                let seq = done.seq;

                match done.outcome {
                    Ok(value) => {
                        if failure.is_some() {
                            return;
                        }
                        match consume(seq, value) {
                            Ok(lines) => {
                                stats.lines_emitted += lines;
                                let seq_field = seq.to_string();
                                let lines_field = lines.to_string();
                                log_event_with_fields(
                                    Event::PartitionFlushed,
                                    &[("seq", seq_field.as_str()), ("lines", lines_field.as_str())],
                                );
                            }
                            Err(e) => {
                                abort.store(true, Ordering::SeqCst);
                                failure = Some(e);
                            }
                        }
                    }
                    Err(err) => {
                        stats.failed_partitions += 1;
                        let seq_field = seq.to_string();
                        log_event_with_fields(
                            Event::PartitionFailed,
                            &[
                                ("code", err.code()),
                                ("policy", policy.as_str()),
                                ("reason", err.to_string().as_str()),
                                ("seq", seq_field.as_str()),
                            ],
                        );
                        if (policy == FailurePolicy::Abort || err.is_startup())
                            && failure.is_none()
                        {
                            abort.store(true, Ordering::SeqCst);
                            failure = Some(ExecError::PartitionFailed { seq, source: err });
                        }
                    }
                }
                // `done._permit` drops here, opening the window for the next partition
            };

            while let Some(done) = rx.recv().await {
                if preserve_order {
                    reorder.push(done.seq, done);
                    while let Some((_, ready)) = reorder.pop_ready() {
                        handle_one(ready, &mut stats);
                    }
                } else {
                    handle_one(done, &mut stats);
                }
            }

            let dispatched = dispatcher
                .await
                .map_err(|e| ExecError::Runtime(format!("dispatcher task failed: {}", e)))?;

            if let Some(err) = failure {
                let seq_field = stats.partitions.to_string();
                log_event_with_fields(
                    Event::RunAborted,
                    &[("code", err.code()), ("partitions", seq_field.as_str())],
                );
                return Err(err);
            }
            dispatched?;

            debug_assert!(reorder.is_empty());
            Ok(stats)
        })
    }
}

/// Feeds partitions to blocking tasks until the source ends or the run aborts.
///
/// Returns the number of partitions dispatched.
#[allow(clippy::too_many_arguments)]
fn dispatch<I, T, M>(
    handle: &Handle,
    label: &str,
    partitions: I,
    map: Arc<M>,
    slots: Arc<Semaphore>,
    window: Arc<Semaphore>,
    abort: &AtomicBool,
    tx: mpsc::UnboundedSender<Completed<T>>,
) -> ExecResult<u64>
where
    I: Iterator<Item = io::Result<Partition>>,
    T: Send + 'static,
    M: Fn(&Partition) -> EvalResult<T> + Send + Sync + 'static,
{
    let closed = |_| ExecError::Runtime("worker pool semaphore closed".to_string());
    let mut dispatched = 0u64;

    for partition in partitions {
        if abort.load(Ordering::SeqCst) {
            break;
        }
        let partition = partition.map_err(|e| SourceError::io(label, e))?;

        let permit = handle
            .block_on(Arc::clone(&window).acquire_owned())
            .map_err(closed)?;
        let slot = handle
            .block_on(Arc::clone(&slots).acquire_owned())
            .map_err(closed)?;
        if abort.load(Ordering::SeqCst) {
            break;
        }

        let seq_field = partition.seq().to_string();
        let bytes_field = partition.len().to_string();
        log_event_with_fields(
            Event::PartitionDispatched,
            &[("bytes", bytes_field.as_str()), ("seq", seq_field.as_str())],
        );

        let map = Arc::clone(&map);
        let tx = tx.clone();
        handle.spawn_blocking(move || {
            let seq = partition.seq();
            let outcome = panic_safe(|| map(&partition));
            drop(slot);

            if outcome.is_ok() {
                let seq_field = seq.to_string();
                log_event_with_fields(Event::PartitionComplete, &[("seq", seq_field.as_str())]);
            }
            // The collector outlives every sender, so this only fails during teardown
            let _ = tx.send(Completed {
                seq,
                outcome,
                _permit: permit,
            });
        });
        dispatched += 1;
    }

    Ok(dispatched)
}

/// Turns a panicking evaluation into an ordinary partition failure so the
/// reorder buffer never waits on a sequence index that will not arrive.
fn panic_safe<T>(f: impl FnOnce() -> EvalResult<T>) -> EvalResult<T> {
    std::panic::catch_unwind(std::panic::AssertUnwindSafe(f))
        .unwrap_or_else(|_| Err(EvalError::Io("evaluation panicked".to_string())))
}
