//! Run statistics and aggregation partials

use std::fmt;

use serde_json::Value;

use crate::classifier::AggregateKind;

/// Counters for one run over one source
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    /// Partitions (or sequential invocations) that reached the collector
    pub partitions: u64,
    /// Of those, how many failed
    pub failed_partitions: u64,
    /// Lines written to the sink
    pub lines_emitted: u64,
}

impl fmt::Display for RunStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "partitions={} failed={} lines={}",
            self.partitions, self.failed_partitions, self.lines_emitted
        )
    }
}

/// Partial aggregate for one partition: `(sum, count)`.
///
/// Averages are always reduced from sums and counts, never from local
/// averages.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PartialAggregate {
    pub sum: f64,
    pub count: u64,
    /// Values that were neither numbers nor null
    pub non_numeric: u64,
}

impl PartialAggregate {
    /// Builds a partial from compact evaluator output, one value per line.
    ///
    /// Every non-empty line counts. Numbers add to the sum; `null` and
    /// everything else add nothing, and the latter is tallied separately.
    pub fn from_lines<S: AsRef<str>>(lines: &[S]) -> Self {
        let mut partial = PartialAggregate::default();
        for line in lines {
            partial.add_line(line.as_ref());
        }
        partial
    }

    /// Folds one line of compact output into the partial
    pub fn add_line(&mut self, line: &str) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }
        self.count += 1;
        match serde_json::from_str::<Value>(line) {
            Ok(Value::Number(n)) => self.sum += n.as_f64().unwrap_or(0.0),
            Ok(Value::Null) => {}
            _ => self.non_numeric += 1,
        }
    }

    /// Combines two partials. Associative and commutative.
    pub fn merge(self, other: PartialAggregate) -> Self {
        Self {
            sum: self.sum + other.sum,
            count: self.count + other.count,
            non_numeric: self.non_numeric + other.non_numeric,
        }
    }

    /// Reduces to the final scalar
    pub fn finish(&self, kind: AggregateKind) -> f64 {
        match kind {
            AggregateKind::Count => self.count as f64,
            AggregateKind::Sum => self.sum,
            AggregateKind::Average if self.count == 0 => 0.0,
            AggregateKind::Average => self.sum / self.count as f64,
        }
    }
}

/// 2^53: above this, not every integer is representable as f64
const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_992.0;

/// Formats an aggregate the way a JSON number would print.
///
/// Integral values print without a fractional part. Non-finite values print
/// as `null`.
pub fn format_scalar(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < MAX_EXACT_INTEGER {
        return format!("{}", value as i64);
    }
    serde_json::Number::from_f64(value)
        .map(|n| n.to_string())
        .unwrap_or_else(|| "null".to_string())
}
