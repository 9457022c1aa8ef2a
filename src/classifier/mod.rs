//! Query classifier
//!
//! Decides from the query text alone whether a query can run partition by
//! partition. Classification is pure and total: anything not recognised with
//! confidence is [`Classification::Sequential`].
//!
//! Pipeline: [`lexer`] → [`QueryFacts`] (shape + token facts) → total match.

mod lexer;
mod shape;

use std::fmt;

pub use lexer::{tokenize, LexError, Spanned, Token};
pub use shape::{AggregateKind, QueryFacts, QueryShape};

/// How a query may be executed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// Must see the whole input in one evaluator run
    Sequential,
    /// Record-wise filter; partitions can run independently
    ParallelFilter,
    /// Bracket-wrapped filter reduced by `kind`; `inner` runs per partition
    ParallelAggregate { kind: AggregateKind, inner: String },
}

impl Classification {
    /// Short label for logs and explain output
    pub fn label(&self) -> String {
        match self {
            Classification::Sequential => "sequential".to_string(),
            Classification::ParallelFilter => "parallel-filter".to_string(),
            Classification::ParallelAggregate { kind, .. } => {
                format!("parallel-aggregate({})", kind.as_str())
            }
        }
    }

    /// The reduction and its inner filter, for aggregate queries
    pub fn aggregate(&self) -> Option<(AggregateKind, &str)> {
        match self {
            Classification::ParallelAggregate { kind, inner } => Some((*kind, inner.as_str())),
            _ => None,
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Classification::ParallelAggregate { inner, .. } => {
                write!(f, "{} inner={}", self.label(), inner)
            }
            _ => write!(f, "{}", self.label()),
        }
    }
}

/// Classifies a query.
///
/// 1. Stream-coupled queries (`input`, `inputs`, `input_line_number`,
///    `$__loc__`) are sequential.
/// 2. `[inner] | length`, `| add`, `| add / length` aggregate over `inner`.
/// 3. `select(...)` with no disallowed token is a parallel filter.
/// 4. Everything else is sequential.
pub fn classify(query: &str) -> Classification {
    let facts = QueryFacts::analyze(query);

    if facts.stream_coupled {
        return Classification::Sequential;
    }

    match facts.shape {
        QueryShape::Aggregate { kind, inner } => Classification::ParallelAggregate {
            kind,
            inner: inner.to_string(),
        },
        QueryShape::Predicate if !facts.has_disallowed_token => Classification::ParallelFilter,
        QueryShape::Predicate | QueryShape::Other => Classification::Sequential,
    }
}
