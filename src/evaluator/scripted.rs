//! In-process evaluator for a small filter subset
//!
//! Understands record-wise filters of the form
//!
//! - `.`
//! - `.field`
//! - `select(.field OP literal)` with OP in `== != > >= < <=`
//! - `select(...) | .field`
//! - `[<any of the above>] | length`, `| add` or `| add / length`
//!
//! Like jq without `--slurp`, the bracket form is evaluated once per record,
//! so it collects at most one value and reduces that.
//!
//! Two reserved record keys drive failure and timing scenarios:
//! `"__fail": true` makes the whole chunk fail, `"__delay_ms": n` sleeps
//! before the chunk returns.

use std::cmp::Ordering as CmpOrdering;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use serde_json::Value;

use super::errors::{EvalError, EvalResult};
use super::{Evaluator, Invocation};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CompareOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl CompareOp {
    fn holds(self, ordering: CmpOrdering) -> bool {
        match self {
            CompareOp::Eq => ordering == CmpOrdering::Equal,
            CompareOp::Ne => ordering != CmpOrdering::Equal,
            CompareOp::Gt => ordering == CmpOrdering::Greater,
            CompareOp::Gte => ordering != CmpOrdering::Less,
            CompareOp::Lt => ordering == CmpOrdering::Less,
            CompareOp::Lte => ordering != CmpOrdering::Greater,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Condition {
    field: String,
    op: CompareOp,
    literal: Value,
}

#[derive(Debug, Clone, PartialEq)]
enum Stage {
    Identity,
    Project(String),
    Select(Condition),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reduction {
    Length,
    Add,
    AddOverLength,
}

#[derive(Debug, Clone, PartialEq)]
struct Program {
    stages: Vec<Stage>,
    reduction: Option<Reduction>,
}

/// Evaluator for tests and dry runs; see the module docs for the grammar.
#[derive(Debug, Default)]
pub struct ScriptedEvaluator {
    calls: AtomicUsize,
}

impl ScriptedEvaluator {
    /// Creates an evaluator with a zeroed call counter
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `evaluate` calls made so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn parse_program(filter: &str) -> EvalResult<Program> {
        let trimmed = filter.trim();
        let Some(body) = trimmed.strip_prefix('[') else {
            return Ok(Program {
                stages: Self::parse_stages(trimmed, filter)?,
                reduction: None,
            });
        };

        let unsupported = || EvalError::Unsupported(filter.to_string());
        let (inner, suffix) = body.rsplit_once(']').ok_or_else(unsupported)?;
        let suffix: String = suffix.chars().filter(|c| !c.is_whitespace()).collect();
        let reduction = match suffix.as_str() {
            "|length" => Reduction::Length,
            "|add" => Reduction::Add,
            "|add/length" => Reduction::AddOverLength,
            _ => return Err(unsupported()),
        };

        Ok(Program {
            stages: Self::parse_stages(inner.trim(), filter)?,
            reduction: Some(reduction),
        })
    }

    fn parse_stages(text: &str, filter: &str) -> EvalResult<Vec<Stage>> {
        text.split('|')
            .map(|stage| Self::parse_stage(stage.trim(), filter))
            .collect()
    }

    fn parse_stage(stage: &str, filter: &str) -> EvalResult<Stage> {
        let unsupported = || EvalError::Unsupported(filter.to_string());

        if stage == "." {
            return Ok(Stage::Identity);
        }
        if let Some(body) = stage
            .strip_prefix("select(")
            .and_then(|rest| rest.strip_suffix(')'))
        {
            return Self::parse_condition(body.trim())
                .map(Stage::Select)
                .ok_or_else(unsupported);
        }
        Self::parse_field(stage)
            .map(|f| Stage::Project(f.to_string()))
            .ok_or_else(unsupported)
    }

    fn parse_field(text: &str) -> Option<&str> {
        let name = text.strip_prefix('.')?;
        let valid = !name.is_empty()
            && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
        valid.then_some(name)
    }

    fn parse_condition(body: &str) -> Option<Condition> {
        // Two-character operators first so `>=` is not read as `>`
        const OPS: [(&str, CompareOp); 6] = [
            ("==", CompareOp::Eq),
            ("!=", CompareOp::Ne),
            (">=", CompareOp::Gte),
            ("<=", CompareOp::Lte),
            (">", CompareOp::Gt),
            ("<", CompareOp::Lt),
        ];

        OPS.iter().find_map(|(token, op)| {
            let (lhs, rhs) = body.split_once(token)?;
            let field = Self::parse_field(lhs.trim())?;
            let literal = serde_json::from_str(rhs.trim()).ok()?;
            Some(Condition {
                field: field.to_string(),
                op: *op,
                literal,
            })
        })
    }

    fn compare(actual: &Value, literal: &Value) -> Option<CmpOrdering> {
        match (actual, literal) {
            (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::Null, Value::Null) => Some(CmpOrdering::Equal),
            _ => None,
        }
    }

    fn number(value: f64) -> Value {
        if value.fract() == 0.0 && value.abs() < 9_007_199_254_740_992.0 {
            Value::from(value as i64)
        } else {
            Value::from(value)
        }
    }

    /// jq's `add` over the collected values: `null` for nothing
    fn add(values: &[Value]) -> EvalResult<Value> {
        let mut total: Option<f64> = None;
        for value in values {
            match value {
                Value::Null => {}
                Value::Number(n) => *total.get_or_insert(0.0) += n.as_f64().unwrap_or(0.0),
                other => {
                    return Err(EvalError::Failed {
                        status: Some(5),
                        stderr: format!("jq: error: {} cannot be added", other),
                    })
                }
            }
        }
        Ok(total.map(Self::number).unwrap_or(Value::Null))
    }

    fn reduce(reduction: Reduction, values: Vec<Value>) -> EvalResult<Value> {
        let length = values.len() as f64;
        match reduction {
            Reduction::Length => Ok(Self::number(length)),
            Reduction::Add => Self::add(&values),
            Reduction::AddOverLength => match Self::add(&values)? {
                Value::Number(n) if length > 0.0 => {
                    Ok(Self::number(n.as_f64().unwrap_or(0.0) / length))
                }
                sum => Err(EvalError::Failed {
                    status: Some(5),
                    stderr: format!(
                        "jq: error: {} and number ({}) cannot be divided",
                        sum, length
                    ),
                }),
            },
        }
    }

    fn apply(stages: &[Stage], record: Value) -> Option<Value> {
        stages.iter().try_fold(record, |value, stage| match stage {
            Stage::Identity => Some(value),
            Stage::Project(field) => Some(value.get(field).cloned().unwrap_or(Value::Null)),
            Stage::Select(cond) => {
                let actual = value.get(&cond.field).unwrap_or(&Value::Null);
                let keep = match Self::compare(actual, &cond.literal) {
                    Some(ordering) => cond.op.holds(ordering),
                    // Mismatched types only satisfy `!=`
                    None => cond.op == CompareOp::Ne,
                };
                keep.then_some(value)
            }
        })
    }
}

impl Evaluator for ScriptedEvaluator {
    fn evaluate(&self, invocation: &Invocation, input: &[u8]) -> EvalResult<Vec<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let program = Self::parse_program(invocation.filter())?;
        let text = std::str::from_utf8(input).map_err(|e| EvalError::InvalidInput(e.to_string()))?;

        let mut output = Vec::new();
        let mut delay_ms = 0u64;

        for line in text.lines().filter(|l| !l.trim().is_empty()) {
            let record: Value =
                serde_json::from_str(line).map_err(|e| EvalError::InvalidInput(e.to_string()))?;

            if record.get("__fail").and_then(Value::as_bool) == Some(true) {
                return Err(EvalError::Failed {
                    status: Some(5),
                    stderr: "injected failure".to_string(),
                });
            }
            if let Some(ms) = record.get("__delay_ms").and_then(Value::as_u64) {
                delay_ms = delay_ms.max(ms);
            }

            let value = Self::apply(&program.stages, record);
            match program.reduction {
                None => output.extend(value.map(|v| v.to_string())),
                Some(reduction) => {
                    let collected = value.into_iter().collect();
                    output.push(Self::reduce(reduction, collected)?.to_string());
                }
            }
        }

        if delay_ms > 0 {
            thread::sleep(Duration::from_millis(delay_ms));
        }

        Ok(output)
    }
}
