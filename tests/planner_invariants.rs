//! Planner Invariant Tests
//!
//! - A forced mode always wins over the classifier
//! - Without one, parallel modes need strictly more lines than the threshold
//! - Bounded sources count a final unterminated line
//! - Unbounded sources always exceed the threshold

use std::io::Write;

use jqpar::classifier::{classify, AggregateKind};
use jqpar::config::{Config, ForcedMode};
use jqpar::planner::{ExecutionMode, ExecutionPlanner, PlanReason};
use jqpar::source::{RecordSource, SizeEstimate};
use tempfile::NamedTempFile;

// =============================================================================
// Helper Functions
// =============================================================================

fn file_with_lines(n: usize, trailing_newline: bool) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    let body: Vec<String> = (0..n).map(|i| format!("{{\"v\":{}}}", i)).collect();
    write!(file, "{}", body.join("\n")).unwrap();
    if trailing_newline && n > 0 {
        writeln!(file).unwrap();
    }
    file
}

fn config(threshold: u64, forced_mode: Option<ForcedMode>) -> Config {
    Config {
        threshold,
        forced_mode,
        ..Default::default()
    }
}

// =============================================================================
// Threshold Tests
// =============================================================================

/// Exactly `threshold` lines is sequential; one more is parallel.
#[test]
fn test_threshold_boundary_on_real_files() {
    let config = config(100, None);
    let planner = ExecutionPlanner::new(&config);
    let classification = classify("select(.v > 1)");

    let at = file_with_lines(100, true);
    let estimate = RecordSource::open(at.path()).unwrap().estimate_size().unwrap();
    assert_eq!(estimate, SizeEstimate::Lines(100));
    let plan = planner.plan(&classification, estimate);
    assert_eq!(plan.mode, ExecutionMode::Sequential);
    assert_eq!(plan.reason, PlanReason::BelowThreshold);

    let above = file_with_lines(101, false);
    let estimate = RecordSource::open(above.path()).unwrap().estimate_size().unwrap();
    assert_eq!(estimate, SizeEstimate::Lines(101));
    let plan = planner.plan(&classification, estimate);
    assert_eq!(plan.mode, ExecutionMode::ParallelFilter);
    assert_eq!(plan.reason, PlanReason::AutoDetected);
}

/// Above the threshold the mode follows the classification.
#[test]
fn test_mode_follows_classification_above_threshold() {
    let config = config(10, None);
    let planner = ExecutionPlanner::new(&config);
    let estimate = SizeEstimate::Lines(11);

    assert_eq!(
        planner.plan(&classify("[select(.v > 1)] | length"), estimate).mode,
        ExecutionMode::ParallelAggregate {
            kind: AggregateKind::Count,
            inner: "select(.v > 1)".into()
        }
    );
    assert_eq!(
        planner.plan(&classify("group_by(.v)"), estimate).mode,
        ExecutionMode::Sequential
    );
}

// =============================================================================
// Forced Mode Tests
// =============================================================================

/// Forced sequential ignores size and classification.
#[test]
fn test_forced_sequential_always_sequential() {
    let config = config(0, Some(ForcedMode::Sequential));
    let planner = ExecutionPlanner::new(&config);
    for estimate in [SizeEstimate::Lines(0), SizeEstimate::Lines(1 << 40), SizeEstimate::Unbounded] {
        for query in ["select(.a)", "[.v] | add", "."] {
            let plan = planner.plan(&classify(query), estimate);
            assert_eq!(plan.mode, ExecutionMode::Sequential);
            assert_eq!(plan.reason, PlanReason::Forced);
        }
    }
}

/// Forced parallel ignores the threshold.
#[test]
fn test_forced_parallel_below_threshold() {
    let config = config(1_000_000, Some(ForcedMode::Parallel));
    let plan = ExecutionPlanner::new(&config).plan(&classify("select(.a)"), SizeEstimate::Lines(2));
    assert_eq!(plan.mode, ExecutionMode::ParallelFilter);
    assert_eq!(plan.reason, PlanReason::Forced);
}

// =============================================================================
// Source Size Tests
// =============================================================================

/// Streams are never read to estimate and always count as large.
#[test]
fn test_stream_counts_as_unbounded() {
    let source = RecordSource::stream("pipe", std::io::Cursor::new(b"{}\n".to_vec()));
    assert_eq!(source.estimate_size().unwrap(), SizeEstimate::Unbounded);

    let config = config(u64::MAX, None);
    let plan = ExecutionPlanner::new(&config).plan(&classify("select(.a)"), SizeEstimate::Unbounded);
    assert_eq!(plan.mode, ExecutionMode::ParallelFilter);
}
