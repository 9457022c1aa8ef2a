//! jqpar - parallel jq over line-delimited JSON
//!
//! Classifies a jq query, plans sequential or partitioned execution per input,
//! and runs it through an external evaluator. Partitioned output matches what
//! a single sequential run would produce.

pub mod classifier;
pub mod cli;
pub mod config;
pub mod evaluator;
pub mod executor;
pub mod observability;
pub mod planner;
pub mod source;
