//! Lexer for the netlist format.

use std::iter::Peekable;
use std::str::CharIndices;

use crate::error::{Result, TransimError};

/// Token types produced by the lexer.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// Element name, node name or keyword
    Identifier,
    /// Numeric literal, possibly with a scale suffix and unit (e.g. "4.7k", "1uF")
    Number,
    /// Directive starting with '.' (e.g. ".tran")
    Directive,
    /// Opening parenthesis
    OpenParen,
    /// Closing parenthesis
    CloseParen,
    /// Equals sign for key=value pairs
    Equals,
    /// End of line
    Newline,
    /// End of input
    Eof,
}

/// A single token with its source position.
#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub line: usize,
    pub column: usize,
}

/// Lexer over netlist text.
pub struct Lexer<'a> {
    input: &'a str,
    chars: Peekable<CharIndices<'a>>,
    line: usize,
    column: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.char_indices().peekable(),
            line: 1,
            column: 1,
        }
    }

    /// Produce the next token. Returns `Eof` once the input is exhausted.
    pub fn next_token(&mut self) -> Result<Token> {
        self.skip_whitespace_and_comments();

        let line = self.line;
        let column = self.column;

        let Some(&(start, ch)) = self.chars.peek() else {
            return Ok(Token {
                kind: TokenKind::Eof,
                text: String::new(),
                line,
                column,
            });
        };

        let kind = match ch {
            '\n' => {
                self.bump();
                self.line += 1;
                self.column = 1;
                return Ok(Token {
                    kind: TokenKind::Newline,
                    text: "\n".to_string(),
                    line,
                    column,
                });
            }
            '(' => {
                self.bump();
                TokenKind::OpenParen
            }
            ')' => {
                self.bump();
                TokenKind::CloseParen
            }
            '=' => {
                self.bump();
                TokenKind::Equals
            }
            '.' => {
                self.bump();
                self.eat_while(is_identifier_char);
                TokenKind::Directive
            }
            c if c.is_ascii_digit() || ((c == '-' || c == '+') && self.sign_starts_number(start)) => {
                self.read_number();
                TokenKind::Number
            }
            c if is_identifier_char(c) => {
                self.eat_while(is_identifier_char);
                TokenKind::Identifier
            }
            other => {
                return Err(TransimError::lexer(
                    line,
                    column,
                    format!("unexpected character '{}'", other),
                ));
            }
        };

        let end = self.chars.peek().map_or(self.input.len(), |&(i, _)| i);
        Ok(Token {
            kind,
            text: self.input[start..end].to_string(),
            line,
            column,
        })
    }

    fn bump(&mut self) -> Option<char> {
        let (_, ch) = self.chars.next()?;
        self.column += 1;
        Some(ch)
    }

    fn eat_while(&mut self, pred: impl Fn(char) -> bool) {
        while let Some(&(_, ch)) = self.chars.peek() {
            if !pred(ch) {
                break;
            }
            self.bump();
        }
    }

    fn skip_whitespace_and_comments(&mut self) {
        while let Some(&(_, ch)) = self.chars.peek() {
            match ch {
                ' ' | '\t' | '\r' | ',' => {
                    self.bump();
                }
                // '*' comments a whole line in SPICE; ';' and '#' run to end of line
                '*' if self.column == 1 => self.eat_while(|c| c != '\n'),
                ';' | '#' => self.eat_while(|c| c != '\n'),
                _ => break,
            }
        }
    }

    fn sign_starts_number(&self, start: usize) -> bool {
        self.input[start + 1..]
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_digit() || c == '.')
    }

    /// Mantissa, optional exponent, then any trailing letters (scale and unit).
    fn read_number(&mut self) {
        if let Some(&(_, '-' | '+')) = self.chars.peek() {
            self.bump();
        }
        self.eat_while(|c| c.is_ascii_digit() || c == '.');
        if let Some(&(i, 'e' | 'E')) = self.chars.peek() {
            if exponent_follows(&self.input[i + 1..]) {
                self.bump();
                if let Some(&(_, '-' | '+')) = self.chars.peek() {
                    self.bump();
                }
                self.eat_while(|c| c.is_ascii_digit());
            }
        }
        self.eat_while(|c| c.is_alphanumeric() || c == '_');
    }
}

fn is_identifier_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '-' || c == '+' || c == ':'
}

/// Parse a numeric literal with an optional engineering suffix.
///
/// Suffixes: `f`, `p`, `n`, `u`/`µ`, `m`, `k`/`K`, `meg`/`M`, `G`, `T`.
/// Letters after the suffix are a unit and ignored, so `1uF` and `10V` both
/// parse. Returns `None` if the mantissa is not a number.
pub fn parse_value(text: &str) -> Option<f64> {
    let text = text.trim();
    let split = text
        .char_indices()
        .skip(1)
        .find(|&(i, c)| {
            c.is_alphabetic() && !(matches!(c, 'e' | 'E') && exponent_follows(&text[i + 1..]))
        })
        .map_or(text.len(), |(i, _)| i);
    let (mantissa, suffix) = text.split_at(split);
    let value: f64 = mantissa.parse().ok()?;

    let lower = suffix.to_ascii_lowercase();
    let multiplier = if lower.starts_with("meg") {
        1e6
    } else {
        match suffix.chars().next() {
            Some('f') => 1e-15,
            Some('p') => 1e-12,
            Some('n') => 1e-9,
            Some('u') | Some('µ') => 1e-6,
            Some('m') => 1e-3,
            Some('k') | Some('K') => 1e3,
            Some('M') => 1e6,
            Some('G') => 1e9,
            Some('T') => 1e12,
            _ => 1.0,
        }
    };
    Some(value * multiplier)
}

fn exponent_follows(rest: &str) -> bool {
    let mut it = rest.chars();
    match it.next() {
        Some(c) if c.is_ascii_digit() => true,
        Some('-' | '+') => it.next().is_some_and(|c| c.is_ascii_digit()),
        _ => false,
    }
}
