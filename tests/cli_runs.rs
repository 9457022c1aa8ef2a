//! CLI Run Tests
//!
//! End-to-end runs through argument parsing, configuration, planning and
//! execution, with the scripted evaluator standing in for `jq`.

use std::io::Write;
use std::sync::Arc;

use jqpar::cli::{parse_args, run_with, CliErrorCode, Runner};
use jqpar::config::FailurePolicy;
use jqpar::evaluator::ScriptedEvaluator;
use tempfile::NamedTempFile;

// =============================================================================
// Helper Functions
// =============================================================================

fn runner(args: &[&str]) -> Runner {
    let cli = parse_args(std::iter::once("jqpar").chain(args.iter().copied())).unwrap();
    Runner::from_cli(cli).unwrap()
}

fn ndjson(lines: &[&str]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    for line in lines {
        writeln!(file, "{}", line).unwrap();
    }
    file
}

fn numbered(n: usize) -> NamedTempFile {
    let lines: Vec<String> = (0..n).map(|i| format!("{{\"v\":{}}}", i)).collect();
    let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
    ndjson(&refs)
}

fn execute(runner: &Runner) -> Result<Vec<String>, jqpar::cli::CliError> {
    let mut out: Vec<String> = Vec::new();
    runner.execute(
        runner.open_sources()?,
        Arc::new(ScriptedEvaluator::new()),
        &mut out,
    )?;
    Ok(out)
}

// =============================================================================
// Argument and Startup Tests
// =============================================================================

/// No query at all is a usage error.
#[test]
fn test_missing_query() {
    let cli = parse_args(["jqpar"]).unwrap();
    let err = Runner::from_cli(cli).unwrap_err();
    assert_eq!(err.code(), CliErrorCode::Usage);
    assert!(err.to_string().starts_with("JQP_CLI_USAGE"));
}

/// A missing second file fails before anything is written.
#[test]
fn test_missing_file_is_fatal() {
    let present = numbered(3);
    let runner = runner(&[
        ".v",
        present.path().to_str().unwrap(),
        "/nonexistent/input.ndjson",
    ]);
    let err = execute(&runner).unwrap_err();
    assert_eq!(err.code(), CliErrorCode::SourceNotFound);
}

/// `--parallel` and `--sequential` cannot both be given.
#[test]
fn test_conflicting_modes_rejected() {
    let err = parse_args(["jqpar", "--parallel", "--sequential", "."]).unwrap_err();
    assert_eq!(err.code(), CliErrorCode::Usage);
}

// =============================================================================
// Configuration Tests
// =============================================================================

/// Flags override the config file, which overrides defaults.
#[test]
fn test_config_file_layering() {
    let mut config_file = NamedTempFile::new().unwrap();
    write!(
        config_file,
        r#"{{"threshold": 50, "block_size": "64KiB", "strict": true}}"#
    )
    .unwrap();
    let path = config_file.path().to_str().unwrap();

    let from_file = runner(&["--config", path, "."]);
    assert_eq!(from_file.config().threshold, 50);
    assert_eq!(from_file.config().block_size, 64 * 1024);
    assert_eq!(from_file.config().failure_policy, FailurePolicy::Abort);

    let flagged = runner(&["--config", path, "--threshold", "7", "."]);
    assert_eq!(flagged.config().threshold, 7);
    assert_eq!(flagged.config().block_size, 64 * 1024);
}

/// Unknown keys in the config file are rejected.
#[test]
fn test_config_file_unknown_key() {
    let mut config_file = NamedTempFile::new().unwrap();
    write!(config_file, r#"{{"threshhold": 50}}"#).unwrap();
    let cli = parse_args(["jqpar", "--config", config_file.path().to_str().unwrap(), "."]).unwrap();
    let err = Runner::from_cli(cli).unwrap_err();
    assert_eq!(err.code(), CliErrorCode::Config);
}

// =============================================================================
// Explain Tests
// =============================================================================

/// One explain block per file, in argument order, planned independently.
#[test]
fn test_explain_multiple_files() {
    let small = numbered(2);
    let large = numbered(20);
    let cli = parse_args([
        "jqpar",
        "--explain",
        "--threshold",
        "10",
        "[select(.v > 3)] | length",
        small.path().to_str().unwrap(),
        large.path().to_str().unwrap(),
    ])
    .unwrap();

    let mut out = Vec::new();
    run_with(cli, &mut out).unwrap();
    let text = String::from_utf8(out).unwrap();

    assert_eq!(text.matches("=== EXPLAIN PLAN ===").count(), 2);
    let first = text.find("Mode: SEQUENTIAL").unwrap();
    let second = text.find("Mode: PARALLEL_AGGREGATE").unwrap();
    assert!(first < second);
    assert!(text.contains("Inner Filter: select(.v > 3)"));
}

// =============================================================================
// Execution Tests
// =============================================================================

/// Parallel and sequential runs of the same query agree.
#[test]
fn test_forced_modes_agree() {
    let file = numbered(40);
    let path = file.path().to_str().unwrap();

    let parallel = runner(&["--parallel", "--block-size", "16", "select(.v > 5) | .v", path]);
    let sequential = runner(&["--sequential", "select(.v > 5) | .v", path]);

    let par_out = execute(&parallel).unwrap();
    assert_eq!(par_out, execute(&sequential).unwrap());
    assert_eq!(par_out.len(), 34);
}

/// A partitioned aggregate prints one scalar line.
#[test]
fn test_aggregate_prints_scalar() {
    let file = numbered(10);
    let path = file.path().to_str().unwrap();
    let runner = runner(&["--parallel", "--block-size", "8", "[select(.v >= 5) | .v] | add", path]);
    assert_eq!(execute(&runner).unwrap(), vec!["35"]);
}

/// An aggregate prints the same scalar just below and just above the threshold.
#[test]
fn test_aggregate_same_across_threshold() {
    let file = numbered(10);
    let path = file.path().to_str().unwrap();

    for query in ["[select(.v >= 5)] | length", "[.v] | add", "[.v] | add / length"] {
        let at = runner(&["--threshold", "10", "--block-size", "8", query, path]);
        let below = runner(&["--threshold", "9", "--block-size", "8", query, path]);
        let at_out = execute(&at).unwrap();
        assert_eq!(at_out.len(), 1, "{}", query);
        assert_eq!(at_out, execute(&below).unwrap(), "{}", query);
    }
}

/// Forced modes agree on aggregates, including an average over no matches.
#[test]
fn test_forced_modes_agree_on_aggregates() {
    let file = numbered(30);
    let path = file.path().to_str().unwrap();

    for (query, expected) in [
        ("[select(.v > 19)] | length", "10"),
        ("[select(.v > 19) | .v] | add", "245"),
        ("[select(.v > 100) | .v] | add / length", "0"),
    ] {
        let sequential = runner(&["--sequential", query, path]);
        let parallel = runner(&["--parallel", "--block-size", "16", query, path]);
        assert_eq!(execute(&sequential).unwrap(), vec![expected], "{}", query);
        assert_eq!(execute(&parallel).unwrap(), vec![expected], "{}", query);
    }
}

/// Default policy warns and keeps the good partitions.
#[test]
fn test_warn_policy_keeps_partial_output() {
    let file = ndjson(&["{\"v\":1}", "{\"__fail\":true}", "{\"v\":3}"]);
    let path = file.path().to_str().unwrap();
    let runner = runner(&["--parallel", "--block-size", "1", ".v", path]);
    assert_eq!(execute(&runner).unwrap(), vec!["1", "3"]);
}

/// `--strict` turns the same failure into a fatal execution error.
#[test]
fn test_strict_policy_fails_run() {
    let file = ndjson(&["{\"v\":1}", "{\"__fail\":true}", "{\"v\":3}"]);
    let path = file.path().to_str().unwrap();
    let runner = runner(&["--parallel", "--strict", "--block-size", "1", ".v", path]);
    let err = execute(&runner).unwrap_err();
    assert_eq!(err.code(), CliErrorCode::Execution);
}
