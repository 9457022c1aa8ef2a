//! Run configuration
//!
//! A [`Config`] is built exactly once per invocation and is read-only after
//! that. Layers, lowest precedence first:
//!
//! 1. Built-in defaults
//! 2. Optional JSON config file (`--config PATH`)
//! 3. Command-line flags
//!
//! Every field of the config file is optional. Unknown fields are rejected so
//! typos surface instead of silently falling back to defaults.

mod errors;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;

use crate::evaluator::EvaluatorOptions;

pub use errors::{ConfigError, ConfigResult};

/// Default record-count threshold above which parallel execution is considered
pub const DEFAULT_THRESHOLD: u64 = 1000;

/// Default partition size (2 MiB)
pub const DEFAULT_BLOCK_SIZE: usize = 2 * 1024 * 1024;

/// Default evaluator binary
pub const DEFAULT_JQ_PATH: &str = "jq";

/// Execution mode requested on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForcedMode {
    /// `--parallel`
    Parallel,
    /// `--sequential`
    Sequential,
}

/// What a failing partition means for the run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Log a warning, contribute nothing, keep going
    #[default]
    Warn,
    /// Stop dispatching and fail the run (`--strict`)
    Abort,
}

impl FailurePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailurePolicy::Warn => "warn",
            FailurePolicy::Abort => "abort",
        }
    }
}

/// Resolved, immutable configuration for one invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub threshold: u64,
    pub block_size: usize,
    pub forced_mode: Option<ForcedMode>,
    pub preserve_order: bool,
    /// 0 = warnings only, 1 = `--debug`, 2 = `--verbose`
    pub debug_level: u8,
    pub workers: usize,
    pub failure_policy: FailurePolicy,
    pub jq_path: PathBuf,
    pub evaluator: EvaluatorOptions,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            block_size: DEFAULT_BLOCK_SIZE,
            forced_mode: None,
            preserve_order: true,
            debug_level: 0,
            workers: num_cpus::get().max(1),
            failure_policy: FailurePolicy::Warn,
            jq_path: PathBuf::from(DEFAULT_JQ_PATH),
            evaluator: EvaluatorOptions::default(),
        }
    }
}

/// Block size as written in a config file: `2097152` or `"2M"`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum BlockSizeSetting {
    Bytes(u64),
    Text(String),
}

impl BlockSizeSetting {
    fn to_bytes(&self) -> ConfigResult<usize> {
        match self {
            BlockSizeSetting::Bytes(0) => Err(ConfigError::ZeroBlockSize),
            BlockSizeSetting::Bytes(n) => {
                usize::try_from(*n).map_err(|_| ConfigError::InvalidBlockSize(n.to_string()))
            }
            BlockSizeSetting::Text(text) => parse_block_size(text),
        }
    }
}

/// On-disk config file layout
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    #[serde(default)]
    pub threshold: Option<u64>,
    #[serde(default)]
    pub block_size: Option<BlockSizeSetting>,
    #[serde(default)]
    pub preserve_order: Option<bool>,
    #[serde(default)]
    pub workers: Option<usize>,
    #[serde(default)]
    pub strict: Option<bool>,
    #[serde(default)]
    pub jq_path: Option<PathBuf>,
}

impl ConfigFile {
    /// Reads and parses a config file
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let text = fs::read_to_string(path).map_err(|e| ConfigError::Unreadable {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::parse(&text)
    }

    /// Parses config file contents
    pub fn parse(text: &str) -> ConfigResult<Self> {
        serde_json::from_str(text).map_err(|e| ConfigError::InvalidJson(e.to_string()))
    }
}

/// Values taken from command-line flags. `None` leaves the lower layer alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub threshold: Option<u64>,
    pub block_size: Option<String>,
    pub forced_mode: Option<ForcedMode>,
    pub no_order: bool,
    pub debug_level: u8,
    pub workers: Option<usize>,
    pub strict: bool,
    pub jq_path: Option<PathBuf>,
    pub evaluator: EvaluatorOptions,
}

impl Config {
    /// Builds the configuration from defaults, an optional file and overrides.
    pub fn resolve(file: Option<&Path>, overrides: ConfigOverrides) -> ConfigResult<Self> {
        let file = match file {
            Some(path) => ConfigFile::load(path)?,
            None => ConfigFile::default(),
        };
        Self::layered(file, overrides)
    }

    /// Applies an already-parsed config file and overrides on top of defaults.
    pub fn layered(file: ConfigFile, overrides: ConfigOverrides) -> ConfigResult<Self> {
        let mut config = Config::default();

        if let Some(threshold) = file.threshold {
            config.threshold = threshold;
        }
        if let Some(block_size) = &file.block_size {
            config.block_size = block_size.to_bytes()?;
        }
        if let Some(preserve_order) = file.preserve_order {
            config.preserve_order = preserve_order;
        }
        if let Some(workers) = file.workers {
            config.workers = workers;
        }
        if file.strict == Some(true) {
            config.failure_policy = FailurePolicy::Abort;
        }
        if let Some(jq_path) = file.jq_path {
            config.jq_path = jq_path;
        }

        if let Some(threshold) = overrides.threshold {
            config.threshold = threshold;
        }
        if let Some(text) = &overrides.block_size {
            config.block_size = parse_block_size(text)?;
        }
        if let Some(workers) = overrides.workers {
            config.workers = workers;
        }
        if overrides.no_order {
            config.preserve_order = false;
        }
        if overrides.strict {
            config.failure_policy = FailurePolicy::Abort;
        }
        if let Some(jq_path) = overrides.jq_path {
            config.jq_path = jq_path;
        }
        config.forced_mode = overrides.forced_mode;
        config.debug_level = overrides.debug_level.min(2);
        config.evaluator = overrides.evaluator;

        config.validate()?;
        Ok(config)
    }

    /// Checks cross-field constraints
    pub fn validate(&self) -> ConfigResult<()> {
        if self.block_size == 0 {
            return Err(ConfigError::ZeroBlockSize);
        }
        if self.workers == 0 {
            return Err(ConfigError::ZeroWorkers);
        }
        Ok(())
    }

    /// Partitions allowed in flight or buffered at once
    pub fn window(&self) -> usize {
        if self.preserve_order {
            self.workers.saturating_mul(2)
        } else {
            self.workers
        }
    }
}

fn block_size_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)^\s*(\d+)\s*([kmg])?(?:i?b)?\s*$").expect("block size pattern is valid")
    })
}

/// Parses a block size such as `2M`, `512k`, `1GiB` or `4096`.
///
/// Suffixes are binary multiples and case-insensitive.
pub fn parse_block_size(text: &str) -> ConfigResult<usize> {
    let invalid = || ConfigError::InvalidBlockSize(text.to_string());

    let caps = block_size_pattern().captures(text).ok_or_else(invalid)?;
    let number: u64 = caps[1].parse().map_err(|_| invalid())?;
    let multiplier: u64 = match caps.get(2).map(|m| m.as_str().to_ascii_lowercase()) {
        None => 1,
        Some(unit) if unit == "k" => 1 << 10,
        Some(unit) if unit == "m" => 1 << 20,
        _ => 1 << 30,
    };

    let bytes = number.checked_mul(multiplier).ok_or_else(invalid)?;
    if bytes == 0 {
        return Err(ConfigError::ZeroBlockSize);
    }
    usize::try_from(bytes).map_err(|_| invalid())
}
