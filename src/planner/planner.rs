//! Planner core

use std::fmt;

use crate::classifier::{AggregateKind, Classification};
use crate::config::{Config, ForcedMode};
use crate::source::SizeEstimate;

/// How a run executes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionMode {
    /// One evaluator run over the whole source
    Sequential,
    /// The full query runs per partition
    ParallelFilter,
    /// `inner` runs per partition; partials reduce by `kind`
    ParallelAggregate { kind: AggregateKind, inner: String },
}

impl ExecutionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionMode::Sequential => "SEQUENTIAL",
            ExecutionMode::ParallelFilter => "PARALLEL_FILTER",
            ExecutionMode::ParallelAggregate { .. } => "PARALLEL_AGGREGATE",
        }
    }

    /// Mode implied by a classification when parallelism is allowed
    fn implied_by(classification: &Classification) -> Self {
        match classification {
            Classification::Sequential => ExecutionMode::Sequential,
            Classification::ParallelFilter => ExecutionMode::ParallelFilter,
            Classification::ParallelAggregate { kind, inner } => ExecutionMode::ParallelAggregate {
                kind: *kind,
                inner: inner.clone(),
            },
        }
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Why the planner chose a mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanReason {
    Forced,
    AutoDetected,
    BelowThreshold,
    WholeInputOptions,
}

impl PlanReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanReason::Forced => "forced",
            PlanReason::AutoDetected => "auto-detected",
            PlanReason::BelowThreshold => "below threshold",
            PlanReason::WholeInputOptions => "evaluator options consume whole input",
        }
    }
}

impl fmt::Display for PlanReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Immutable plan for one source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionPlan {
    pub mode: ExecutionMode,
    pub reason: PlanReason,
}

impl ExecutionPlan {
    fn new(mode: ExecutionMode, reason: PlanReason) -> Self {
        Self { mode, reason }
    }
}

/// Planner bound to one resolved configuration
pub struct ExecutionPlanner<'a> {
    config: &'a Config,
}

impl<'a> ExecutionPlanner<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    /// Plans one source.
    ///
    /// A forced parallel run over a non-aggregate query uses the full query
    /// as a partition filter, whatever the classifier said.
    pub fn plan(&self, classification: &Classification, estimate: SizeEstimate) -> ExecutionPlan {
        match self.config.forced_mode {
            Some(ForcedMode::Sequential) => {
                return ExecutionPlan::new(ExecutionMode::Sequential, PlanReason::Forced);
            }
            Some(ForcedMode::Parallel) => {
                let mode = match classification {
                    Classification::ParallelAggregate { .. } => {
                        ExecutionMode::implied_by(classification)
                    }
                    _ => ExecutionMode::ParallelFilter,
                };
                return ExecutionPlan::new(mode, PlanReason::Forced);
            }
            None => {}
        }

        if self.config.evaluator.consumes_whole_input() {
            return ExecutionPlan::new(ExecutionMode::Sequential, PlanReason::WholeInputOptions);
        }

        if estimate.exceeds(self.config.threshold) {
            ExecutionPlan::new(
                ExecutionMode::implied_by(classification),
                PlanReason::AutoDetected,
            )
        } else {
            ExecutionPlan::new(ExecutionMode::Sequential, PlanReason::BelowThreshold)
        }
    }
}
