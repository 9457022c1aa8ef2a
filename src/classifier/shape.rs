//! Structural shape of a query
//!
//! Produces a tagged shape plus the token facts the classifier needs. The
//! shape is deliberately coarse:
//!
//! - `Aggregate`: `[inner] | length`, `[inner] | add`, `[inner] | add / length`
//! - `Predicate`: starts with `select(`
//! - `Other`: everything else, including anything the lexer rejects

use super::lexer::{tokenize, Spanned, Token};

/// Reduction applied to a bracket-wrapped filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregateKind {
    /// `| length`
    Count,
    /// `| add`
    Sum,
    /// `| add / length`
    Average,
}

impl AggregateKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AggregateKind::Count => "count",
            AggregateKind::Sum => "sum",
            AggregateKind::Average => "average",
        }
    }
}

/// Coarse structural shape of a query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryShape<'a> {
    /// `select(...)`-led record filter
    Predicate,
    /// Bracket-wrapped filter followed by a reduction
    Aggregate { kind: AggregateKind, inner: &'a str },
    /// Anything else
    Other,
}

/// Builtins that need the whole collection, an order, or grouping
const COLLECTION_BUILTINS: [&str; 12] = [
    "length", "add", "group_by", "sort_by", "sort", "min", "max", "min_by", "max_by", "unique",
    "unique_by", "reverse",
];

/// Builtins that read past the current record or depend on its position
const STREAM_BUILTINS: [&str; 3] = ["input", "inputs", "input_line_number"];

/// Shape plus the token facts derived alongside it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryFacts<'a> {
    pub shape: QueryShape<'a>,
    /// Contains a collection builtin, iterate-all or recursive descent
    pub has_disallowed_token: bool,
    /// Reads beyond the current record (`input`, `inputs`, `$__loc__`)
    pub stream_coupled: bool,
}

impl<'a> QueryFacts<'a> {
    /// Analyzes a query. Never fails: untokenizable or unbalanced input is
    /// `Other` with every safety flag raised.
    pub fn analyze(query: &'a str) -> Self {
        let ambiguous = Self {
            shape: QueryShape::Other,
            has_disallowed_token: true,
            stream_coupled: true,
        };

        let tokens = match tokenize(query) {
            Ok(tokens) if !tokens.is_empty() => tokens,
            _ => return ambiguous,
        };
        let Some(pairs) = match_delimiters(&tokens) else {
            return ambiguous;
        };

        Self {
            shape: detect_shape(query, &tokens, &pairs),
            has_disallowed_token: tokens.iter().any(|t| is_disallowed(&t.token)),
            stream_coupled: tokens.iter().any(|t| is_stream_coupled(&t.token)),
        }
    }
}

fn is_disallowed(token: &Token<'_>) -> bool {
    match token {
        Token::Ident(name) => COLLECTION_BUILTINS.contains(name),
        Token::IterateAll | Token::RecursiveDescent => true,
        _ => false,
    }
}

fn is_stream_coupled(token: &Token<'_>) -> bool {
    match token {
        Token::Ident(name) => STREAM_BUILTINS.contains(name),
        Token::Variable(name) => *name == "$__loc__",
        _ => false,
    }
}

/// For every opening delimiter, the index of its closing partner.
///
/// Returns `None` when delimiters are unbalanced or crossed.
fn match_delimiters(tokens: &[Spanned<'_>]) -> Option<Vec<Option<usize>>> {
    let mut pairs = vec![None; tokens.len()];
    let mut stack: Vec<(usize, &str)> = Vec::new();

    for (i, spanned) in tokens.iter().enumerate() {
        let Token::Punct(p) = spanned.token else {
            continue;
        };
        match p {
            "(" | "[" | "{" => stack.push((i, p)),
            ")" | "]" | "}" => {
                let (open, open_p) = stack.pop()?;
                let expected = match open_p {
                    "(" => ")",
                    "[" => "]",
                    _ => "}",
                };
                if p != expected {
                    return None;
                }
                pairs[open] = Some(i);
            }
            _ => {}
        }
    }

    stack.is_empty().then_some(pairs)
}

fn detect_shape<'a>(
    query: &'a str,
    tokens: &[Spanned<'a>],
    pairs: &[Option<usize>],
) -> QueryShape<'a> {
    match tokens[0].token {
        Token::Punct("[") => aggregate_shape(query, tokens, pairs).unwrap_or(QueryShape::Other),
        Token::Ident("select") if matches!(tokens.get(1).map(|t| t.token), Some(Token::Punct("("))) => {
            QueryShape::Predicate
        }
        _ => QueryShape::Other,
    }
}

fn aggregate_shape<'a>(
    query: &'a str,
    tokens: &[Spanned<'a>],
    pairs: &[Option<usize>],
) -> Option<QueryShape<'a>> {
    let close = pairs[0]?;
    let suffix: Vec<Token<'_>> = tokens[close + 1..].iter().map(|t| t.token).collect();

    let kind = match suffix.as_slice() {
        [Token::Punct("|"), Token::Ident("length")] => AggregateKind::Count,
        [Token::Punct("|"), Token::Ident("add")] => AggregateKind::Sum,
        [Token::Punct("|"), Token::Ident("add"), Token::Punct("/"), Token::Ident("length")] => {
            AggregateKind::Average
        }
        _ => return None,
    };

    let inner = query[tokens[0].end..tokens[close].start].trim();
    if inner.is_empty() {
        return None;
    }
    Some(QueryShape::Aggregate { kind, inner })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aggregate_shapes() {
        let facts = QueryFacts::analyze("[select(.v > 1)] | length");
        assert_eq!(
            facts.shape,
            QueryShape::Aggregate {
                kind: AggregateKind::Count,
                inner: "select(.v > 1)"
            }
        );

        let facts = QueryFacts::analyze("[ select(.v > 1) | .v ]|add");
        assert_eq!(
            facts.shape,
            QueryShape::Aggregate {
                kind: AggregateKind::Sum,
                inner: "select(.v > 1) | .v"
            }
        );

        let facts = QueryFacts::analyze("[.v]  |  add/length");
        assert_eq!(
            facts.shape,
            QueryShape::Aggregate {
                kind: AggregateKind::Average,
                inner: ".v"
            }
        );
    }

    #[test]
    fn test_bracket_must_span_to_reduction() {
        // Two arrays concatenated: the first bracket closes early
        let facts = QueryFacts::analyze("[.a] + [.b] | length");
        assert_eq!(facts.shape, QueryShape::Other);

        let facts = QueryFacts::analyze("[.a] | length | . + 1");
        assert_eq!(facts.shape, QueryShape::Other);
    }

    #[test]
    fn test_empty_inner_is_other() {
        assert_eq!(QueryFacts::analyze("[ ] | length").shape, QueryShape::Other);
    }

    #[test]
    fn test_predicate_shape() {
        let facts = QueryFacts::analyze("  select(.a == 1) | .b");
        assert_eq!(facts.shape, QueryShape::Predicate);
        assert!(!facts.has_disallowed_token);
        assert!(!facts.stream_coupled);
    }

    #[test]
    fn test_select_as_field_is_not_predicate() {
        assert_eq!(QueryFacts::analyze(".select").shape, QueryShape::Other);
        assert_eq!(QueryFacts::analyze("selection(.a)").shape, QueryShape::Other);
    }

    #[test]
    fn test_disallowed_tokens() {
        for query in [
            "select(.tags | length > 2)",
            "select(.a) | sort",
            "select(.xs | min_by(.v))",
            "select(.items[] | .ok)",
            "select(.. | numbers)",
        ] {
            assert!(
                QueryFacts::analyze(query).has_disallowed_token,
                "{} should be flagged",
                query
            );
        }
    }

    #[test]
    fn test_builtin_names_in_fields_and_strings_are_allowed() {
        let facts = QueryFacts::analyze(r#"select(.length > 2 and .kind == "sort")"#);
        assert!(!facts.has_disallowed_token);
    }

    #[test]
    fn test_stream_coupled() {
        assert!(QueryFacts::analyze("select(. == input)").stream_coupled);
        assert!(QueryFacts::analyze("[inputs] | length").stream_coupled);
        assert!(QueryFacts::analyze("select($__loc__.line > 1)").stream_coupled);
        // Each partition would restart the line count
        assert!(QueryFacts::analyze("select(input_line_number > 2)").stream_coupled);
        assert!(!QueryFacts::analyze("select(.input_line_number > 2)").stream_coupled);
    }

    #[test]
    fn test_unbalanced_is_ambiguous() {
        let facts = QueryFacts::analyze("select(.a == 1");
        assert_eq!(facts.shape, QueryShape::Other);
        assert!(facts.has_disallowed_token);

        let facts = QueryFacts::analyze("[select(.a)) | length");
        assert_eq!(facts.shape, QueryShape::Other);
    }

    #[test]
    fn test_nesting_depth_does_not_matter() {
        let facts = QueryFacts::analyze("select(((.a.b[0] == [[1]][0][0])))");
        assert_eq!(facts.shape, QueryShape::Predicate);
        assert!(!facts.has_disallowed_token);
    }

    #[test]
    fn test_empty_query_is_ambiguous() {
        assert_eq!(QueryFacts::analyze("   ").shape, QueryShape::Other);
    }
}
