//! Explain output
//!
//! Fixed, human-readable layout printed by `--explain`. Nothing is evaluated.

use std::fmt;

use crate::classifier::Classification;
use crate::config::Config;
use crate::source::SizeEstimate;

use super::planner::{ExecutionMode, ExecutionPlan};

/// Explain plan for one source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExplainPlan {
    pub source: String,
    pub classification: String,
    /// Inner filter of an aggregate plan
    pub inner_filter: Option<String>,
    pub estimate: String,
    pub mode: &'static str,
    pub reason: &'static str,
    pub workers: usize,
    pub block_size: usize,
    pub preserve_order: bool,
}

impl ExplainPlan {
    pub fn new(
        source: impl Into<String>,
        classification: &Classification,
        estimate: SizeEstimate,
        plan: &ExecutionPlan,
        config: &Config,
    ) -> Self {
        let inner_filter = match &plan.mode {
            ExecutionMode::ParallelAggregate { inner, .. } => Some(inner.clone()),
            _ => None,
        };

        Self {
            source: source.into(),
            classification: classification.label(),
            inner_filter,
            estimate: estimate.to_string(),
            mode: plan.mode.as_str(),
            reason: plan.reason.as_str(),
            workers: config.workers,
            block_size: config.block_size,
            preserve_order: config.preserve_order,
        }
    }
}

impl fmt::Display for ExplainPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== EXPLAIN PLAN ===")?;
        writeln!(f, "Source: {}", self.source)?;
        writeln!(f, "Classification: {}", self.classification)?;
        if let Some(inner) = &self.inner_filter {
            writeln!(f, "Inner Filter: {}", inner)?;
        }
        writeln!(f, "Estimated Size: {}", self.estimate)?;
        writeln!(f, "Mode: {}", self.mode)?;
        writeln!(f, "Reason: {}", self.reason)?;

        if self.mode != ExecutionMode::Sequential.as_str() {
            writeln!(f, "Workers: {}", self.workers)?;
            writeln!(f, "Block Size: {} bytes", self.block_size)?;
            writeln!(
                f,
                "Order: {}",
                if self.preserve_order { "preserved" } else { "completion" }
            )?;
        }

        Ok(())
    }
}
