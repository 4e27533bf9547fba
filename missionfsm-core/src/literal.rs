//! Literal data syntax.
//!
//! Rulebook lines and scene parameters are written in a small literal
//! language. It describes data only:
//!
//! - `'text'`, `"text"` - strings, with `\\`, `\'`, `\"`, `\n`, `\t` escapes
//! - `42`, `-3` - integers
//! - `0.4`, `-1.5e3` - floats
//! - `True`, `False`, `None` (also `true`, `false`, `null`)
//! - `(a, b)`, `(a,)`, `()` - tuples (`(a)` is just `a`)
//! - `[a, b]` - lists
//! - `{'key': value}` - dicts with string keys
//!
//! Trailing commas are accepted inside brackets. Names, calls and operators
//! are rejected with a parse error; the parser never evaluates anything.
//! Containers nest at most [`MAX_DEPTH`] levels deep, and floats must be
//! finite.

use crate::error::CoreError;
use std::fmt;

/// Deepest container nesting the parser accepts.
pub const MAX_DEPTH: usize = 64;

/// A parsed literal value.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Tuple(Vec<Literal>),
    List(Vec<Literal>),
    /// Dict entries in source order. Keys are unique.
    Dict(Vec<(String, Literal)>),
}

impl Literal {
    /// Parses a single literal from a string.
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        Self::parse_at(s, 1)
    }

    /// Parses a single literal, reporting errors against `line`.
    pub fn parse_at(s: &str, line: usize) -> Result<Self, CoreError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(CoreError::RulebookParse {
                line,
                reason: "empty literal".to_string(),
            });
        }

        Parser::new(s, line).parse_document()
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Literal::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Literal::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the value as a float. Integers are widened.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Literal::Int(n) => Some(*n as f64),
            Literal::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Literal::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the items of a tuple or list.
    pub fn as_sequence(&self) -> Option<&[Literal]> {
        match self {
            Literal::Tuple(items) | Literal::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_dict(&self) -> Option<&[(String, Literal)]> {
        match self {
            Literal::Dict(entries) => Some(entries),
            _ => None,
        }
    }

    /// Short name of the literal kind for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Literal::None => "None",
            Literal::Bool(_) => "bool",
            Literal::Int(_) => "int",
            Literal::Float(_) => "float",
            Literal::Str(_) => "string",
            Literal::Tuple(_) => "tuple",
            Literal::List(_) => "list",
            Literal::Dict(_) => "dict",
        }
    }
}

impl From<&str> for Literal {
    fn from(s: &str) -> Self {
        Literal::Str(s.to_string())
    }
}

impl From<String> for Literal {
    fn from(s: String) -> Self {
        Literal::Str(s)
    }
}

impl From<i64> for Literal {
    fn from(n: i64) -> Self {
        Literal::Int(n)
    }
}

impl From<i32> for Literal {
    fn from(n: i32) -> Self {
        Literal::Int(n as i64)
    }
}

impl From<f64> for Literal {
    fn from(f: f64) -> Self {
        Literal::Float(f)
    }
}

impl From<bool> for Literal {
    fn from(b: bool) -> Self {
        Literal::Bool(b)
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::None => f.write_str("None"),
            Literal::Bool(true) => f.write_str("True"),
            Literal::Bool(false) => f.write_str("False"),
            Literal::Int(n) => write!(f, "{}", n),
            // Debug keeps the decimal point on whole floats (1.0, not 1).
            Literal::Float(x) => write!(f, "{:?}", x),
            Literal::Str(s) => write_quoted(f, s),
            Literal::Tuple(items) => {
                f.write_str("(")?;
                write_items(f, items)?;
                if items.len() == 1 {
                    f.write_str(",")?;
                }
                f.write_str(")")
            }
            Literal::List(items) => {
                f.write_str("[")?;
                write_items(f, items)?;
                f.write_str("]")
            }
            Literal::Dict(entries) => {
                f.write_str("{")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write_quoted(f, key)?;
                    write!(f, ": {}", value)?;
                }
                f.write_str("}")
            }
        }
    }
}

fn write_items(f: &mut fmt::Formatter<'_>, items: &[Literal]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

fn write_quoted(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    f.write_str("'")?;
    for c in s.chars() {
        match c {
            '\\' => f.write_str("\\\\")?,
            '\'' => f.write_str("\\'")?,
            '\n' => f.write_str("\\n")?,
            '\t' => f.write_str("\\t")?,
            c => write!(f, "{}", c)?,
        }
    }
    f.write_str("'")
}

/// Recursive descent parser for literal data.
struct Parser<'a> {
    input: &'a str,
    pos: usize,
    line: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str, line: usize) -> Self {
        Self {
            input,
            pos: 0,
            line,
            depth: 0,
        }
    }

    fn error(&self, reason: impl Into<String>) -> CoreError {
        CoreError::RulebookParse {
            line: self.line,
            reason: reason.into(),
        }
    }

    fn parse_document(&mut self) -> Result<Literal, CoreError> {
        let value = self.parse_value()?;
        self.skip_whitespace();

        if self.pos < self.input.len() {
            return Err(self.error(format!(
                "unexpected trailing input '{}'",
                &self.input[self.pos..]
            )));
        }

        Ok(value)
    }

    fn parse_value(&mut self) -> Result<Literal, CoreError> {
        self.skip_whitespace();

        match self.peek_char() {
            None => Err(self.error("unexpected end of input")),
            Some(open @ ('(' | '[' | '{')) => self.parse_container(open),
            Some('\'') | Some('"') => self.parse_string().map(Literal::Str),
            Some(c) if c.is_ascii_digit() || c == '-' || c == '+' || c == '.' => {
                self.parse_number()
            }
            Some(c) if c.is_alphabetic() || c == '_' => self.parse_keyword(),
            Some(c) => Err(self.error(format!("unexpected character '{}'", c))),
        }
    }

    fn parse_container(&mut self, open: char) -> Result<Literal, CoreError> {
        if self.depth >= MAX_DEPTH {
            return Err(self.error(format!("nesting deeper than {} levels", MAX_DEPTH)));
        }

        self.depth += 1;
        let result = match open {
            '(' => self.parse_tuple(),
            '[' => {
                self.pos += 1;
                self.parse_items(']').map(|(items, _)| Literal::List(items))
            }
            _ => self.parse_dict(),
        };
        self.depth -= 1;
        result
    }

    fn parse_tuple(&mut self) -> Result<Literal, CoreError> {
        self.pos += 1;
        let (mut items, trailing_comma) = self.parse_items(')')?;

        // `(x)` is grouping, not a one-element tuple
        if items.len() == 1 && !trailing_comma {
            return Ok(items.remove(0));
        }

        Ok(Literal::Tuple(items))
    }

    /// Parses comma-separated values up to and including `close`.
    fn parse_items(&mut self, close: char) -> Result<(Vec<Literal>, bool), CoreError> {
        let mut items = Vec::new();
        let mut trailing_comma = false;

        loop {
            self.skip_whitespace();
            if self.eat(close) {
                return Ok((items, trailing_comma));
            }

            items.push(self.parse_value()?);
            self.skip_whitespace();

            if self.eat(',') {
                trailing_comma = true;
                continue;
            }
            if self.eat(close) {
                return Ok((items, false));
            }

            return Err(self.error(format!("expected ',' or '{}'", close)));
        }
    }

    fn parse_dict(&mut self) -> Result<Literal, CoreError> {
        self.pos += 1;
        let mut entries: Vec<(String, Literal)> = Vec::new();

        loop {
            self.skip_whitespace();
            if self.eat('}') {
                return Ok(Literal::Dict(entries));
            }

            let key = match self.peek_char() {
                Some('\'') | Some('"') => self.parse_string()?,
                _ => return Err(self.error("dict keys must be strings")),
            };
            if entries.iter().any(|(k, _)| *k == key) {
                return Err(self.error(format!("duplicate dict key '{}'", key)));
            }

            self.skip_whitespace();
            if !self.eat(':') {
                return Err(self.error(format!("expected ':' after key '{}'", key)));
            }

            let value = self.parse_value()?;
            entries.push((key, value));
            self.skip_whitespace();

            if self.eat(',') {
                continue;
            }
            if self.eat('}') {
                return Ok(Literal::Dict(entries));
            }

            return Err(self.error("expected ',' or '}'"));
        }
    }

    fn parse_string(&mut self) -> Result<String, CoreError> {
        let quote = match self.next_char() {
            Some(c @ ('\'' | '"')) => c,
            _ => return Err(self.error("expected string")),
        };

        let mut out = String::new();
        while let Some(c) = self.next_char() {
            if c == quote {
                return Ok(out);
            }
            if c != '\\' {
                out.push(c);
                continue;
            }

            match self.next_char() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some(c @ ('\\' | '\'' | '"')) => out.push(c),
                Some(other) => {
                    return Err(self.error(format!("unsupported escape '\\{}'", other)));
                }
                None => break,
            }
        }

        Err(self.error("unterminated string"))
    }

    fn parse_number(&mut self) -> Result<Literal, CoreError> {
        let start = self.pos;
        let mut is_float = false;

        if matches!(self.peek_char(), Some('-') | Some('+')) {
            self.pos += 1;
        }

        while let Some(c) = self.peek_char() {
            if c.is_ascii_digit() {
                self.pos += 1;
            } else if c == '.' {
                is_float = true;
                self.pos += 1;
            } else if c == 'e' || c == 'E' {
                is_float = true;
                self.pos += 1;
                if matches!(self.peek_char(), Some('-') | Some('+')) {
                    self.pos += 1;
                }
            } else {
                break;
            }
        }

        let text = &self.input[start..self.pos];
        let parsed = if is_float {
            text.parse::<f64>()
                .ok()
                .filter(|x| x.is_finite())
                .map(Literal::Float)
        } else {
            text.parse::<i64>().ok().map(Literal::Int)
        };

        parsed.ok_or_else(|| self.error(format!("invalid number: '{}'", text)))
    }

    fn parse_keyword(&mut self) -> Result<Literal, CoreError> {
        let start = self.pos;
        while let Some(c) = self.peek_char() {
            if c.is_alphanumeric() || c == '_' {
                self.pos += c.len_utf8();
            } else {
                break;
            }
        }

        match &self.input[start..self.pos] {
            "True" | "true" => Ok(Literal::Bool(true)),
            "False" | "false" => Ok(Literal::Bool(false)),
            "None" | "null" => Ok(Literal::None),
            word => Err(self.error(format!(
                "'{}' is not a literal; names and expressions are not allowed",
                word
            ))),
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek_char() {
            if c.is_whitespace() {
                self.pos += c.len_utf8();
            } else {
                break;
            }
        }
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek_char() == Some(expected) {
            self.pos += expected.len_utf8();
            true
        } else {
            false
        }
    }

    fn next_char(&mut self) -> Option<char> {
        let c = self.peek_char()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn peek_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }
}
