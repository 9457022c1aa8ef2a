//! Observable events
//!
//! Every log line names one of these events. Events are explicit and typed.

use std::fmt;

/// Observable events in a jqpar invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Startup
    /// Configuration resolved from defaults, file and flags
    ConfigResolved,
    /// Evaluator binary probed successfully
    EvaluatorReady,
    /// Evaluator binary missing or not runnable (FATAL)
    EvaluatorMissing,

    // Planning
    /// Query classified
    QueryClassified,
    /// Execution plan chosen for one input
    PlanSelected,

    // Partitioned execution
    /// Partition handed to the worker pool
    PartitionDispatched,
    /// Partition evaluated successfully
    PartitionComplete,
    /// Partition evaluation failed
    PartitionFailed,
    /// Partition output flushed to the sink
    PartitionFlushed,
    /// Numeric output line ignored by an aggregation
    NonNumericValue,
    /// Aggregation partials reduced to a scalar
    ReduceComplete,

    // Run lifecycle
    /// Run over one input finished
    RunComplete,
    /// Run over one input aborted
    RunAborted,
}

impl Event {
    /// Returns the event name used in log output
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::ConfigResolved => "CONFIG_RESOLVED",
            Event::EvaluatorReady => "EVALUATOR_READY",
            Event::EvaluatorMissing => "EVALUATOR_MISSING",
            Event::QueryClassified => "QUERY_CLASSIFIED",
            Event::PlanSelected => "PLAN_SELECTED",
            Event::PartitionDispatched => "PARTITION_DISPATCHED",
            Event::PartitionComplete => "PARTITION_COMPLETE",
            Event::PartitionFailed => "PARTITION_FAILED",
            Event::PartitionFlushed => "PARTITION_FLUSHED",
            Event::NonNumericValue => "NON_NUMERIC_VALUE",
            Event::ReduceComplete => "REDUCE_COMPLETE",
            Event::RunComplete => "RUN_COMPLETE",
            Event::RunAborted => "RUN_ABORTED",
        }
    }

    /// Returns true if this event terminates the process
    pub fn is_fatal(&self) -> bool {
        matches!(self, Event::EvaluatorMissing)
    }

    /// Returns true if this event reports degraded output
    pub fn is_degraded(&self) -> bool {
        matches!(
            self,
            Event::PartitionFailed | Event::NonNumericValue | Event::RunAborted
        )
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_names_are_screaming_snake_case() {
        for event in [
            Event::ConfigResolved,
            Event::PlanSelected,
            Event::PartitionFailed,
            Event::RunComplete,
        ] {
            let name = event.as_str();
            assert!(name
                .chars()
                .all(|c| c.is_ascii_uppercase() || c == '_'));
        }
    }

    #[test]
    fn test_only_missing_evaluator_is_fatal() {
        assert!(Event::EvaluatorMissing.is_fatal());
        assert!(!Event::PartitionFailed.is_fatal());
        assert!(!Event::RunAborted.is_fatal());
    }

    #[test]
    fn test_degraded_events() {
        assert!(Event::PartitionFailed.is_degraded());
        assert!(Event::NonNumericValue.is_degraded());
        assert!(!Event::PartitionComplete.is_degraded());
    }
}
