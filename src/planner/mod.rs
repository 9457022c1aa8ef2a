//! Execution planner
//!
//! Turns a query classification and a source size estimate into an
//! [`ExecutionPlan`]. Planning is deterministic: the same classification,
//! estimate and config always produce the same plan.
//!
//! # Decision order (first match wins)
//!
//! 1. Forced mode (`--parallel` / `--sequential`)
//! 2. Evaluator options that consume the whole input (`-s`, `-n`)
//! 3. Estimated size strictly above the threshold
//! 4. Otherwise sequential

mod explain;
mod planner;

pub use explain::ExplainPlan;
pub use planner::{ExecutionMode, ExecutionPlan, ExecutionPlanner, PlanReason};
