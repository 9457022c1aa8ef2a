//! Aggregation Equivalence Tests
//!
//! Partitioned Count, Sum and Average must equal a single pass over the
//! same records, for any block size and worker count.

use std::sync::Arc;

use jqpar::classifier::AggregateKind;
use jqpar::config::Config;
use jqpar::evaluator::ScriptedEvaluator;
use jqpar::executor::{format_scalar, PartitionedAggregationExecutor};
use jqpar::source::RecordSource;

// =============================================================================
// Helper Functions
// =============================================================================

fn records(values: &[i64]) -> String {
    values
        .iter()
        .map(|v| format!("{{\"v\":{}}}\n", v))
        .collect()
}

fn partitioned(kind: AggregateKind, inner: &str, input: &str, block_size: usize, workers: usize) -> f64 {
    let config = Config {
        block_size,
        workers,
        ..Default::default()
    };
    let (value, _) = PartitionedAggregationExecutor::new(Arc::new(ScriptedEvaluator::new()), &config)
        .run(kind, inner, RecordSource::memory("mem", input.to_string()))
        .unwrap();
    value
}

/// Reference: one pass over the values matching `v > min`
fn single_pass(kind: AggregateKind, values: &[i64], min: i64) -> f64 {
    let matching: Vec<f64> = values.iter().filter(|v| **v > min).map(|v| *v as f64).collect();
    let sum: f64 = matching.iter().sum();
    match kind {
        AggregateKind::Count => matching.len() as f64,
        AggregateKind::Sum => sum,
        AggregateKind::Average if matching.is_empty() => 0.0,
        AggregateKind::Average => sum / matching.len() as f64,
    }
}

fn sample() -> Vec<i64> {
    // Deterministic spread with negatives and repeats
    (0..500).map(|i| (i * 37 % 101) - 30).collect()
}

// =============================================================================
// Equivalence Tests
// =============================================================================

/// Every aggregate kind matches the single pass across block sizes.
#[test]
fn test_partitioned_equals_single_pass() {
    let values = sample();
    let input = records(&values);

    let cases = [
        (AggregateKind::Count, "select(.v > 10)"),
        (AggregateKind::Sum, "select(.v > 10) | .v"),
        (AggregateKind::Average, "select(.v > 10) | .v"),
    ];

    for (kind, inner) in cases {
        let expected = single_pass(kind, &values, 10);
        for block_size in [1, 7, 64, 1024, 1 << 20] {
            for workers in [1, 4] {
                let actual = partitioned(kind, inner, &input, block_size, workers);
                assert!(
                    (actual - expected).abs() < 1e-9,
                    "{:?} block={} workers={}: {} != {}",
                    kind,
                    block_size,
                    workers,
                    actual,
                    expected
                );
            }
        }
    }
}

/// `{10}` and `{20,30,40}` in separate partitions average to 25, not 20.
#[test]
fn test_average_of_uneven_partitions() {
    let input = records(&[10, 20, 30, 40]);
    // One line per partition is the most uneven split there is
    assert_eq!(partitioned(AggregateKind::Average, ".v", &input, 1, 3), 25.0);
    assert_eq!(format_scalar(25.0), "25");
}

/// No matching records: average is 0, count is 0, sum is 0.
#[test]
fn test_zero_matches_reduce_to_zero() {
    let input = records(&[1, 2, 3]);
    for kind in [AggregateKind::Count, AggregateKind::Sum, AggregateKind::Average] {
        assert_eq!(partitioned(kind, "select(.v > 99) | .v", &input, 8, 2), 0.0);
    }
}

/// Empty input behaves like zero matches.
#[test]
fn test_empty_input() {
    assert_eq!(partitioned(AggregateKind::Average, ".v", "", 8, 2), 0.0);
}

/// Missing fields project to null, which counts but adds nothing.
#[test]
fn test_null_values_count_but_do_not_add() {
    let input = "{\"v\":4}\n{\"w\":1}\n{\"v\":8}\n";
    assert_eq!(partitioned(AggregateKind::Sum, ".v", input, 1, 2), 12.0);
    assert_eq!(partitioned(AggregateKind::Count, ".v", input, 1, 2), 3.0);
    assert_eq!(partitioned(AggregateKind::Average, ".v", input, 1, 2), 4.0);
}
