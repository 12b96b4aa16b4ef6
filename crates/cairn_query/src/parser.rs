//! Parser for query text.
//!
//! Turns text such as
//! `/component/completed#/isComplete !ca true == /component/title !bf @c`
//! into the instruction list [`select`](crate::select) evaluates.
//!
//! Literal forms:
//! - integers and floats, `true`, `false`, `null`
//! - `"double"` or `'single'` quoted strings
//! - bare paths starting with `/`, read as strings
//! - `[ ... ]` lists
//! - `~d|2021-02-01|` dates and `~r/^walk/i` patterns
//! - `all`, read as the string `"all"`
//!
//! Anything else is a word.

use cairn_foundation::{Error, ErrorKind, Pattern, Result, Value};

use crate::value::StackValue;

/// Parses query text into an instruction list.
///
/// # Errors
/// Returns `ParseError` with the line and column of the offending input.
pub fn parse(source: &str) -> Result<Vec<StackValue>> {
    Parser::new(source).parse_all()
}

/// Parser over query text.
pub struct Parser<'src> {
    /// Remaining source text.
    rest: &'src str,
    /// Current line number (1-based).
    line: u32,
    /// Current column number (1-based).
    column: u32,
}

impl<'src> Parser<'src> {
    /// Creates a parser for `source`.
    #[must_use]
    pub fn new(source: &'src str) -> Self {
        Self {
            rest: source,
            line: 1,
            column: 1,
        }
    }

    /// Parses every item.
    ///
    /// # Errors
    /// Returns `ParseError` on malformed input.
    pub fn parse_all(&mut self) -> Result<Vec<StackValue>> {
        let items = self.parse_items()?;
        if self.peek_char() == Some(']') {
            return Err(self.error("unexpected ']'"));
        }
        Ok(items)
    }

    /// Parses items up to a `]` or the end of input.
    fn parse_items(&mut self) -> Result<Vec<StackValue>> {
        let mut items = Vec::new();
        loop {
            self.skip_whitespace();
            match self.peek_char() {
                None | Some(']') => return Ok(items),
                Some(_) => items.push(self.parse_item()?),
            }
        }
    }

    fn parse_item(&mut self) -> Result<StackValue> {
        let (line, column) = (self.line, self.column);
        let Some(c) = self.peek_char() else {
            return Err(self.error("unexpected end of input"));
        };
        match c {
            '[' => {
                self.advance();
                let items = self.parse_items()?;
                if self.peek_char() != Some(']') {
                    return Err(Self::error_at("unterminated list", line, column));
                }
                self.advance();
                Ok(StackValue::List(items))
            }
            '"' | '\'' => self.scan_string(c).map(|text| StackValue::from(Value::from(text))),
            '~' => self.scan_tagged(),
            c if c.is_ascii_digit() => self.scan_number(),
            '-' | '+' if self.peek_char_n(1).is_some_and(|c| c.is_ascii_digit()) => self.scan_number(),
            _ => {
                let text = self.scan_bare();
                Ok(match text {
                    "true" => Value::Bool(true).into(),
                    "false" => Value::Bool(false).into(),
                    "null" => Value::Null.into(),
                    t if t == "all" || t.starts_with('/') => StackValue::string(t),
                    t => StackValue::word(t),
                })
            }
        }
    }

    /// Peeks at the next character without consuming it.
    fn peek_char(&self) -> Option<char> {
        self.rest.chars().next()
    }

    /// Peeks `n` characters ahead.
    fn peek_char_n(&self, n: usize) -> Option<char> {
        self.rest.chars().nth(n)
    }

    /// Advances past the next character.
    fn advance(&mut self) {
        if let Some(c) = self.peek_char() {
            self.rest = &self.rest[c.len_utf8()..];
            if c == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek_char().is_some_and(char::is_whitespace) {
            self.advance();
        }
    }

    /// Scans up to whitespace or a bracket.
    fn scan_bare(&mut self) -> &'src str {
        let start = self.rest;
        let mut len = 0;
        while let Some(c) = self.peek_char() {
            if c.is_whitespace() || c == '[' || c == ']' {
                break;
            }
            len += c.len_utf8();
            self.advance();
        }
        &start[..len]
    }

    fn scan_number(&mut self) -> Result<StackValue> {
        let (line, column) = (self.line, self.column);
        let text = self.scan_bare();
        if let Ok(n) = text.parse::<i64>() {
            return Ok(Value::Int(n).into());
        }
        text.parse::<f64>()
            .map(|n| Value::Float(n).into())
            .map_err(|_| Self::error_at(format!("invalid number '{text}'"), line, column))
    }

    fn scan_string(&mut self, quote: char) -> Result<String> {
        let (line, column) = (self.line, self.column);
        self.advance();
        let mut text = String::new();
        loop {
            match self.peek_char() {
                Some(c) if c == quote => {
                    self.advance();
                    return Ok(text);
                }
                Some('\\') => {
                    self.advance();
                    let escaped = match self.peek_char() {
                        Some('n') => '\n',
                        Some('t') => '\t',
                        Some('r') => '\r',
                        Some(c @ ('\\' | '"' | '\'')) => c,
                        Some(c) => return Err(self.error(format!("invalid escape sequence: \\{c}"))),
                        None => break,
                    };
                    self.advance();
                    text.push(escaped);
                }
                Some(c) => {
                    self.advance();
                    text.push(c);
                }
                None => break,
            }
        }
        Err(Self::error_at("unterminated string literal", line, column))
    }

    /// Scans `~d|date|` or `~r/pattern/flags`.
    fn scan_tagged(&mut self) -> Result<StackValue> {
        let (line, column) = (self.line, self.column);
        self.advance();
        let tag = self.peek_char();
        self.advance();
        match tag {
            Some('d') => {
                if self.peek_char() != Some('|') {
                    return Err(self.error("expected '|' after ~d"));
                }
                let text = self.scan_delimited('|', line, column)?;
                Value::from(text.as_str())
                    .to_date()
                    .map(|d| Value::Date(d).into())
                    .ok_or_else(|| Self::error_at(format!("invalid date '{text}'"), line, column))
            }
            Some('r') => {
                if self.peek_char() != Some('/') {
                    return Err(self.error("expected '/' after ~r"));
                }
                let source = self.scan_delimited('/', line, column)?;
                let flags = self.scan_bare();
                Pattern::new(&source, flags)
                    .map(|p| Value::Regex(p).into())
                    .map_err(|e| Self::error_at(e.to_string(), line, column))
            }
            _ => Err(Self::error_at("expected ~d or ~r", line, column)),
        }
    }

    /// Scans text between two `delim`s, honouring `\delim`.
    fn scan_delimited(&mut self, delim: char, line: u32, column: u32) -> Result<String> {
        self.advance();
        let mut text = String::new();
        while let Some(c) = self.peek_char() {
            self.advance();
            if c == delim {
                return Ok(text);
            }
            if c == '\\' && self.peek_char() == Some(delim) {
                text.push(delim);
                self.advance();
            } else {
                text.push(c);
            }
        }
        Err(Self::error_at(format!("missing closing '{delim}'"), line, column))
    }

    fn error(&self, message: impl Into<String>) -> Error {
        Self::error_at(message, self.line, self.column)
    }

    fn error_at(message: impl Into<String>, line: u32, column: u32) -> Error {
        Error::new(ErrorKind::ParseError {
            message: message.into(),
            line,
            column,
        })
    }
}
