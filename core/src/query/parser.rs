// homebites/src/query/parser.rs

//! Recursive-descent parser for single-line shell calls of the form
//! `db.<collection>.<method>(<args>)[.<modifier>(<args>)]*`.
//!
//! Arguments use the relaxed object-literal syntax the shell accepts:
//! unquoted keys, single- or double-quoted strings, trailing commas,
//! `ObjectId("…")`, `ISODate("…")`, `new Date("…")`, `NumberInt(…)`,
//! `NumberLong(…)`, `NumberDecimal("…")` and `/regex/flags` literals.
//! Nothing is ever evaluated; the output is plain BSON.

use bson::oid::ObjectId;
use bson::{Bson, DateTime, Decimal128, Document, Regex};
use thiserror::Error;

/// Deepest allowed nesting of objects, arrays and constructor calls.
pub const MAX_DEPTH: usize = 64;

/// Failure to read a candidate as one shell call.
///
/// Carries a character offset, never the input text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("parse error at offset {offset}: {message}")]
pub struct ParseError {
  pub offset: usize,
  pub message: String,
}

/// A syntactically valid shell call. Not yet checked against any allowlist.
#[derive(Debug, Clone, PartialEq)]
pub struct ShellCall {
  pub collection: String,
  pub method: String,
  pub args: Vec<Bson>,
  /// Chained cursor calls such as `.sort({...})` or `.limit(5)`, in order.
  pub modifiers: Vec<(String, Vec<Bson>)>,
}

/// Parses `input` as exactly one shell call. A single trailing `;` is allowed.
pub fn parse_shell_call(input: &str) -> Result<ShellCall, ParseError> {
  let mut parser = Parser::new(input);
  let call = parser.shell_call()?;
  parser.skip_ws();
  if parser.peek() == Some(';') {
    parser.bump();
    parser.skip_ws();
  }
  if !parser.at_end() {
    return Err(parser.error("unexpected input after the query"));
  }
  Ok(call)
}

/// Parses a single argument value, e.g. `{name: 'Alice'}`.
pub fn parse_value(input: &str) -> Result<Bson, ParseError> {
  let mut parser = Parser::new(input);
  let value = parser.value()?;
  parser.skip_ws();
  if !parser.at_end() {
    return Err(parser.error("unexpected input after the value"));
  }
  Ok(value)
}

struct Parser {
  chars: Vec<char>,
  pos: usize,
  depth: usize,
}

impl Parser {
  fn new(input: &str) -> Self {
    Self {
      chars: input.chars().collect(),
      pos: 0,
      depth: 0,
    }
  }

  fn error(&self, message: impl Into<String>) -> ParseError {
    ParseError {
      offset: self.pos,
      message: message.into(),
    }
  }

  fn peek(&self) -> Option<char> {
    self.chars.get(self.pos).copied()
  }

  fn bump(&mut self) -> Option<char> {
    let c = self.peek()?;
    self.pos += 1;
    Some(c)
  }

  fn at_end(&self) -> bool {
    self.pos >= self.chars.len()
  }

  fn skip_ws(&mut self) {
    while matches!(self.peek(), Some(c) if c.is_whitespace()) {
      self.pos += 1;
    }
  }

  fn expect(&mut self, expected: char) -> Result<(), ParseError> {
    self.skip_ws();
    match self.peek() {
      Some(c) if c == expected => {
        self.pos += 1;
        Ok(())
      }
      Some(c) => Err(self.error(format!("expected '{}' but found '{}'", expected, c))),
      None => Err(self.error(format!("expected '{}' but reached the end", expected))),
    }
  }

  fn identifier(&mut self) -> Result<String, ParseError> {
    self.skip_ws();
    let start = self.pos;
    while matches!(self.peek(), Some(c) if c.is_ascii_alphanumeric() || c == '_' || c == '$') {
      self.pos += 1;
    }
    if start == self.pos {
      return Err(self.error("expected an identifier"));
    }
    Ok(self.chars[start..self.pos].iter().collect())
  }

  fn shell_call(&mut self) -> Result<ShellCall, ParseError> {
    let root = self.identifier()?;
    if root != "db" {
      return Err(self.error("query must start with the 'db' handle"));
    }
    self.expect('.')?;

    let mut collection = self.identifier()?;
    if collection == "getCollection" {
      self.expect('(')?;
      self.skip_ws();
      collection = match self.value()? {
        Bson::String(name) => name,
        _ => return Err(self.error("getCollection expects a collection name string")),
      };
      self.expect(')')?;
    }

    self.expect('.')?;
    let method = self.identifier()?;
    self.expect('(')?;
    let args = self.arguments()?;

    let mut modifiers = Vec::new();
    loop {
      self.skip_ws();
      if self.peek() != Some('.') {
        break;
      }
      self.bump();
      let name = self.identifier()?;
      self.expect('(')?;
      let modifier_args = self.arguments()?;
      modifiers.push((name, modifier_args));
    }

    Ok(ShellCall {
      collection,
      method,
      args,
      modifiers,
    })
  }

  /// Comma-separated values up to and including the closing `)`.
  fn arguments(&mut self) -> Result<Vec<Bson>, ParseError> {
    self.sequence(')')
  }

  fn sequence(&mut self, close: char) -> Result<Vec<Bson>, ParseError> {
    let mut items = Vec::new();
    loop {
      self.skip_ws();
      if self.peek() == Some(close) {
        self.bump();
        return Ok(items);
      }
      items.push(self.value()?);
      self.skip_ws();
      match self.bump() {
        Some(',') => continue,
        Some(c) if c == close => return Ok(items),
        Some(c) => {
          self.pos -= 1;
          return Err(self.error(format!("expected ',' or '{}' but found '{}'", close, c)));
        }
        None => return Err(self.error(format!("unterminated list, expected '{}'", close))),
      }
    }
  }

  fn value(&mut self) -> Result<Bson, ParseError> {
    if self.depth >= MAX_DEPTH {
      return Err(self.error(format!("values nested deeper than {} levels", MAX_DEPTH)));
    }
    self.depth += 1;
    let value = self.nested_value();
    self.depth -= 1;
    value
  }

  fn nested_value(&mut self) -> Result<Bson, ParseError> {
    self.skip_ws();
    match self.peek() {
      Some('{') => {
        self.bump();
        self.object().map(Bson::Document)
      }
      Some('[') => {
        self.bump();
        self.sequence(']').map(Bson::Array)
      }
      Some('"') | Some('\'') => self.string().map(Bson::String),
      Some('/') => self.regex(),
      Some(c) if c.is_ascii_digit() || c == '-' || c == '+' || c == '.' => self.number(),
      Some(c) if c.is_ascii_alphabetic() || c == '_' => self.keyword_value(),
      Some(c) => Err(self.error(format!("unexpected character '{}'", c))),
      None => Err(self.error("expected a value but reached the end")),
    }
  }

  fn object(&mut self) -> Result<Document, ParseError> {
    let mut doc = Document::new();
    loop {
      self.skip_ws();
      match self.peek() {
        Some('}') => {
          self.bump();
          return Ok(doc);
        }
        None => return Err(self.error("unterminated object")),
        _ => {}
      }

      let key = match self.peek() {
        Some('"') | Some('\'') => self.string()?,
        _ => self.object_key()?,
      };
      self.expect(':')?;
      let value = self.value()?;
      doc.insert(key, value);

      self.skip_ws();
      match self.bump() {
        Some(',') => continue,
        Some('}') => return Ok(doc),
        Some(c) => {
          self.pos -= 1;
          return Err(self.error(format!("expected ',' or '}}' but found '{}'", c)));
        }
        None => return Err(self.error("unterminated object")),
      }
    }
  }

  /// Bare keys may contain dots (`"chef.name"` written unquoted).
  fn object_key(&mut self) -> Result<String, ParseError> {
    let start = self.pos;
    while matches!(self.peek(), Some(c) if c.is_ascii_alphanumeric() || c == '_' || c == '$' || c == '.') {
      self.pos += 1;
    }
    if start == self.pos {
      return Err(self.error("expected an object key"));
    }
    Ok(self.chars[start..self.pos].iter().collect())
  }

  fn string(&mut self) -> Result<String, ParseError> {
    let quote = match self.bump() {
      Some(q @ ('"' | '\'')) => q,
      _ => return Err(self.error("expected a quoted string")),
    };
    let mut out = String::new();
    loop {
      match self.bump() {
        None => return Err(self.error("unterminated string")),
        Some(c) if c == quote => return Ok(out),
        Some('\\') => {
          let escaped = self.bump().ok_or_else(|| self.error("unterminated escape sequence"))?;
          match escaped {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            'b' => out.push('\u{0008}'),
            'f' => out.push('\u{000C}'),
            'u' => out.push(self.unicode_escape()?),
            other => out.push(other),
          }
        }
        Some(c) => out.push(c),
      }
    }
  }

  fn unicode_escape(&mut self) -> Result<char, ParseError> {
    let mut code = 0u32;
    for _ in 0..4 {
      let digit = self
        .bump()
        .and_then(|c| c.to_digit(16))
        .ok_or_else(|| self.error("invalid \\u escape"))?;
      code = code * 16 + digit;
    }
    char::from_u32(code).ok_or_else(|| self.error("invalid \\u code point"))
  }

  fn regex(&mut self) -> Result<Bson, ParseError> {
    self.bump();
    let mut pattern = String::new();
    loop {
      match self.bump() {
        None => return Err(self.error("unterminated regular expression")),
        Some('/') => break,
        Some('\\') => {
          pattern.push('\\');
          let escaped = self.bump().ok_or_else(|| self.error("unterminated regular expression"))?;
          pattern.push(escaped);
        }
        Some(c) => pattern.push(c),
      }
    }
    let mut options = String::new();
    while let Some(c) = self.peek() {
      if !c.is_ascii_alphabetic() {
        break;
      }
      if !"imsxlu".contains(c) {
        return Err(self.error(format!("unsupported regular expression flag '{}'", c)));
      }
      options.push(c);
      self.pos += 1;
    }
    let mut sorted: Vec<char> = options.chars().collect();
    sorted.sort_unstable();
    Ok(Bson::RegularExpression(Regex {
      pattern,
      options: sorted.into_iter().collect(),
    }))
  }

  fn number(&mut self) -> Result<Bson, ParseError> {
    let start = self.pos;
    if matches!(self.peek(), Some('-') | Some('+')) {
      self.pos += 1;
    }
    while matches!(self.peek(), Some(c) if c.is_ascii_digit() || c == '.' || c == 'e' || c == 'E' || c == '-' || c == '+')
    {
      // A sign is only part of the literal right after an exponent marker.
      if matches!(self.peek(), Some('-') | Some('+')) && !matches!(self.chars.get(self.pos - 1), Some('e') | Some('E')) {
        break;
      }
      self.pos += 1;
    }
    let text: String = self.chars[start..self.pos].iter().collect();
    let is_float = text.contains(['.', 'e', 'E']);
    if is_float {
      text
        .parse::<f64>()
        .map(Bson::Double)
        .map_err(|_| ParseError {
          offset: start,
          message: format!("invalid number '{}'", text),
        })
    } else {
      let parsed = text.parse::<i64>().map_err(|_| ParseError {
        offset: start,
        message: format!("invalid integer '{}'", text),
      })?;
      Ok(match i32::try_from(parsed) {
        Ok(small) => Bson::Int32(small),
        Err(_) => Bson::Int64(parsed),
      })
    }
  }

  fn keyword_value(&mut self) -> Result<Bson, ParseError> {
    let start = self.pos;
    let word = self.identifier()?;
    match word.as_str() {
      "true" | "True" => Ok(Bson::Boolean(true)),
      "false" | "False" => Ok(Bson::Boolean(false)),
      "null" | "None" => Ok(Bson::Null),
      "new" => {
        let constructor = self.identifier()?;
        if constructor != "Date" {
          return Err(self.error(format!("unsupported constructor 'new {}'", constructor)));
        }
        self.date_call()
      }
      "Date" | "ISODate" => self.date_call(),
      "ObjectId" => {
        let hex = self.single_string_argument("ObjectId")?;
        ObjectId::parse_str(&hex)
          .map(Bson::ObjectId)
          .map_err(|_| self.error("ObjectId expects a 24-character hex string"))
      }
      "NumberInt" | "NumberLong" | "NumberDecimal" => self.wrapped_number(&word),
      _ => Err(ParseError {
        offset: start,
        message: format!("unsupported identifier '{}'", word),
      }),
    }
  }

  fn date_call(&mut self) -> Result<Bson, ParseError> {
    let text = self.single_string_argument("Date")?;
    DateTime::parse_rfc3339_str(&text)
      .or_else(|_| DateTime::parse_rfc3339_str(format!("{}T00:00:00Z", text)))
      .map(Bson::DateTime)
      .map_err(|_| self.error("dates must be RFC 3339 strings"))
  }

  fn single_string_argument(&mut self, constructor: &str) -> Result<String, ParseError> {
    self.expect('(')?;
    let args = self.arguments()?;
    match args.as_slice() {
      [Bson::String(s)] => Ok(s.clone()),
      _ => Err(self.error(format!("{} expects one string argument", constructor))),
    }
  }

  fn wrapped_number(&mut self, constructor: &str) -> Result<Bson, ParseError> {
    self.expect('(')?;
    let args = self.arguments()?;
    if constructor == "NumberDecimal" {
      return self.decimal(&args);
    }
    let inner = match args.as_slice() {
      [Bson::String(s)] => parse_value(s)?,
      [other] => other.clone(),
      _ => return Err(self.error(format!("{} expects one argument", constructor))),
    };
    match (constructor, inner) {
      ("NumberInt", Bson::Int32(n)) => Ok(Bson::Int32(n)),
      ("NumberLong", Bson::Int32(n)) => Ok(Bson::Int64(i64::from(n))),
      ("NumberLong", Bson::Int64(n)) => Ok(Bson::Int64(n)),
      _ => Err(self.error(format!("{} received a value of the wrong type", constructor))),
    }
  }

  /// `NumberDecimal("12.50")` keeps every digit; bare numbers go through their shortest text form.
  fn decimal(&self, args: &[Bson]) -> Result<Bson, ParseError> {
    let text = match args {
      [Bson::String(s)] => s.trim().to_string(),
      [Bson::Int32(n)] => n.to_string(),
      [Bson::Int64(n)] => n.to_string(),
      [Bson::Double(n)] => n.to_string(),
      _ => return Err(self.error("NumberDecimal expects one numeric or string argument")),
    };
    text
      .parse::<Decimal128>()
      .map(Bson::Decimal128)
      .map_err(|_| self.error(format!("invalid decimal '{}'", text)))
  }
}
