//! Query lexer
//!
//! Splits a filter into just enough tokens to recognise shapes and scan for
//! unsafe builtins. It is not a jq grammar. Anything it cannot tokenize with
//! confidence is a [`LexError`], and the classifier treats that as
//! ambiguous.
//!
//! `[]` is the iterate-all token only in postfix position (after a field,
//! a variable, a closing bracket and so on). Elsewhere, as in
//! `select(.tags == [])`, it is an empty array literal and lexes as two
//! delimiters.

use std::fmt;

/// A lexical token borrowed from the query text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token<'a> {
    /// Bare identifier: `select`, `length`, `and`, `mod::fn`
    Ident(&'a str),
    /// Field access `.name` (name only)
    Field(&'a str),
    /// Identity `.`
    Dot,
    /// Variable including the `$`
    Variable(&'a str),
    /// Numeric literal
    Number(&'a str),
    /// String literal body, without quotes
    Str(&'a str),
    /// Postfix `[]`, with or without a leading `.`
    IterateAll,
    /// `..`
    RecursiveDescent,
    /// Operators and delimiters
    Punct(&'a str),
}

/// A token with its byte span in the source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Spanned<'a> {
    pub token: Token<'a>,
    pub start: usize,
    pub end: usize,
}

/// Reasons a query could not be tokenized
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LexError {
    /// String literal without a closing quote
    UnterminatedString(usize),
    /// String interpolation `\(...)`, which hides code inside a literal
    Interpolation(usize),
    /// Character outside the recognised set
    UnexpectedChar(char, usize),
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LexError::UnterminatedString(at) => write!(f, "unterminated string at byte {}", at),
            LexError::Interpolation(at) => write!(f, "string interpolation at byte {}", at),
            LexError::UnexpectedChar(c, at) => write!(f, "unexpected '{}' at byte {}", c, at),
        }
    }
}

const THREE_CHAR_OPS: [&str; 2] = ["//=", "?//"];
const TWO_CHAR_OPS: [&str; 11] = [
    "==", "!=", "<=", ">=", "|=", "+=", "-=", "*=", "/=", "%=", "//",
];
const ONE_CHAR_OPS: &str = "()[]{}|,:;+-*/%<>=?";

/// Keywords after which `[` starts a new expression
const KEYWORDS: [&str; 9] = ["and", "or", "if", "then", "elif", "else", "as", "reduce", "foreach"];

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn is_ident_continue(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

struct Lexer<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
    tokens: Vec<Spanned<'a>>,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            bytes: src.as_bytes(),
            pos: 0,
            tokens: Vec::new(),
        }
    }

    fn peek(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    /// True when the previous token ends a term, so `[` would index it
    fn after_term(&self) -> bool {
        match self.tokens.last().map(|t| t.token) {
            None => false,
            Some(Token::Ident(name)) => !KEYWORDS.contains(&name),
            Some(Token::Punct(p)) => matches!(p, ")" | "]" | "}" | "?"),
            Some(_) => true,
        }
    }

    fn push(&mut self, token: Token<'a>, start: usize) {
        self.tokens.push(Spanned {
            token,
            start,
            end: self.pos,
        });
    }

    fn skip_trivia(&mut self) {
        while let Some(b) = self.peek(0) {
            match b {
                b' ' | b'\t' | b'\r' | b'\n' => self.pos += 1,
                b'#' => {
                    while let Some(c) = self.peek(0) {
                        if c == b'\n' {
                            break;
                        }
                        self.pos += 1;
                    }
                }
                _ => break,
            }
        }
    }

    /// Offset of the next non-whitespace byte at or after `from`
    fn next_significant(&self, from: usize) -> Option<(usize, u8)> {
        self.bytes[from.min(self.bytes.len())..]
            .iter()
            .enumerate()
            .find(|(_, b)| !b.is_ascii_whitespace())
            .map(|(i, b)| (from + i, *b))
    }

    fn ident_end(&self, from: usize) -> usize {
        let mut end = from;
        loop {
            while end < self.bytes.len() && is_ident_continue(self.bytes[end]) {
                end += 1;
            }
            // Module paths: `name::name`
            if self.bytes.get(end) == Some(&b':')
                && self.bytes.get(end + 1) == Some(&b':')
                && self.bytes.get(end + 2).map_or(false, |b| is_ident_start(*b))
            {
                end += 2;
                continue;
            }
            return end;
        }
    }

    fn lex_string(&mut self) -> Result<(), LexError> {
        let start = self.pos;
        self.pos += 1;
        while let Some(b) = self.peek(0) {
            match b {
                b'\\' => {
                    if self.peek(1) == Some(b'(') {
                        return Err(LexError::Interpolation(self.pos));
                    }
                    self.pos += 2;
                }
                b'"' => {
                    self.pos += 1;
                    let body = &self.src[start + 1..self.pos - 1];
                    self.push(Token::Str(body), start);
                    return Ok(());
                }
                _ => self.pos += 1,
            }
        }
        Err(LexError::UnterminatedString(start))
    }

    fn lex_dot(&mut self) {
        let start = self.pos;
        match self.peek(1) {
            Some(b'.') => {
                self.pos += 2;
                self.push(Token::RecursiveDescent, start);
            }
            Some(b) if is_ident_start(b) => {
                let end = self.ident_end(self.pos + 1);
                let name = &self.src[self.pos + 1..end];
                self.pos = end;
                self.push(Token::Field(name), start);
            }
            Some(b'[') => match self.next_significant(self.pos + 2) {
                Some((close, b']')) => {
                    self.pos = close + 1;
                    self.push(Token::IterateAll, start);
                }
                _ => {
                    self.pos += 1;
                    self.push(Token::Dot, start);
                }
            },
            _ => {
                self.pos += 1;
                self.push(Token::Dot, start);
            }
        }
    }

    fn lex_number(&mut self) {
        let start = self.pos;
        while self.peek(0).map_or(false, |b| b.is_ascii_digit()) {
            self.pos += 1;
        }
        if self.peek(0) == Some(b'.') && self.peek(1).map_or(false, |b| b.is_ascii_digit()) {
            self.pos += 1;
            while self.peek(0).map_or(false, |b| b.is_ascii_digit()) {
                self.pos += 1;
            }
        }
        if matches!(self.peek(0), Some(b'e') | Some(b'E')) {
            let sign = usize::from(matches!(self.peek(1), Some(b'+') | Some(b'-')));
            if self.peek(1 + sign).map_or(false, |b| b.is_ascii_digit()) {
                self.pos += 1 + sign;
                while self.peek(0).map_or(false, |b| b.is_ascii_digit()) {
                    self.pos += 1;
                }
            }
        }
        self.push(Token::Number(&self.src[start..self.pos]), start);
    }

    fn lex_punct(&mut self) -> Result<(), LexError> {
        let start = self.pos;
        let rest = &self.src[self.pos..];

        let multi = THREE_CHAR_OPS
            .iter()
            .chain(TWO_CHAR_OPS.iter())
            .copied()
            .find(|op| rest.starts_with(op));
        if let Some(op) = multi {
            self.pos += op.len();
            self.push(Token::Punct(op), start);
            return Ok(());
        }

        let b = self.bytes[self.pos];
        if b == b'[' && self.after_term() {
            if let Some((close, b']')) = self.next_significant(self.pos + 1) {
                self.pos = close + 1;
                self.push(Token::IterateAll, start);
                return Ok(());
            }
        }
        if ONE_CHAR_OPS.as_bytes().contains(&b) {
            self.pos += 1;
            self.push(Token::Punct(&self.src[start..self.pos]), start);
            return Ok(());
        }

        let c = rest.chars().next().unwrap_or('\u{fffd}');
        Err(LexError::UnexpectedChar(c, start))
    }

    fn run(mut self) -> Result<Vec<Spanned<'a>>, LexError> {
        loop {
            self.skip_trivia();
            let Some(b) = self.peek(0) else {
                return Ok(self.tokens);
            };
            match b {
                b'"' => self.lex_string()?,
                b'.' => self.lex_dot(),
                b'$' => {
                    let start = self.pos;
                    let end = self.ident_end(self.pos + 1);
                    if end == self.pos + 1 {
                        return Err(LexError::UnexpectedChar('$', start));
                    }
                    self.pos = end;
                    self.push(Token::Variable(&self.src[start..end]), start);
                }
                // Format strings: `@csv`, `@base64d`
                b'@' if self.peek(1).map_or(false, is_ident_start) => {
                    let start = self.pos;
                    let end = self.ident_end(self.pos + 1);
                    self.pos = end;
                    self.push(Token::Ident(&self.src[start..end]), start);
                }
                b if b.is_ascii_digit() => self.lex_number(),
                b if is_ident_start(b) => {
                    let start = self.pos;
                    let end = self.ident_end(self.pos);
                    self.pos = end;
                    self.push(Token::Ident(&self.src[start..end]), start);
                }
                _ => self.lex_punct()?,
            }
        }
    }
}

/// Tokenizes a query.
pub fn tokenize(src: &str) -> Result<Vec<Spanned<'_>>, LexError> {
    Lexer::new(src).run()
}
