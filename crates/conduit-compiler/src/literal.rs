//! Parser for literal object and list values.
//!
//! Object and list inputs are typed in the editor as literal source, e.g.
//! `[1, 2, 3]` or `{ name: "a", tags: ["x", 'y'], ref: prev.id }`. They are
//! parsed into expressions rather than embedded as strings, so arbitrary
//! nested structures reach the step module intact.
//!
//! Accepted forms: objects (identifier, string or number keys, shorthand
//! properties), arrays, single or double quoted strings, numbers, `true`,
//! `false`, `null`, and identifier chains such as `prev.id`. Trailing commas
//! and surrounding parentheses are allowed. Reserved words are rejected
//! wherever they would be read as a variable.

use crate::ast::{Expr, PropKey, is_identifier};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message} at offset {offset}")]
pub struct LiteralError {
  pub message: String,
  pub offset: usize,
}

/// Parse one literal expression; the whole input must be consumed.
pub fn parse_literal(source: &str) -> Result<Expr, LiteralError> {
  let mut parser = Parser {
    chars: source.char_indices().collect(),
    pos: 0,
    len: source.len(),
  };
  let expr = parser.value()?;
  parser.skip_ws();
  if let Some(c) = parser.peek() {
    return Err(parser.error(format!("unexpected '{}' after value", c)));
  }
  Ok(expr)
}

struct Parser {
  chars: Vec<(usize, char)>,
  pos: usize,
  len: usize,
}

impl Parser {
  fn offset(&self) -> usize {
    self.chars.get(self.pos).map(|(o, _)| *o).unwrap_or(self.len)
  }

  fn error(&self, message: impl Into<String>) -> LiteralError {
    LiteralError {
      message: message.into(),
      offset: self.offset(),
    }
  }

  fn peek(&self) -> Option<char> {
    self.chars.get(self.pos).map(|(_, c)| *c)
  }

  fn bump(&mut self) -> Option<char> {
    let c = self.peek();
    if c.is_some() {
      self.pos += 1;
    }
    c
  }

  fn skip_ws(&mut self) {
    while self.peek().is_some_and(char::is_whitespace) {
      self.pos += 1;
    }
  }

  fn expect(&mut self, expected: char) -> Result<(), LiteralError> {
    self.skip_ws();
    match self.peek() {
      Some(c) if c == expected => {
        self.pos += 1;
        Ok(())
      }
      Some(c) => Err(self.error(format!("expected '{}', found '{}'", expected, c))),
      None => Err(self.error(format!("expected '{}', found end of input", expected))),
    }
  }

  fn value(&mut self) -> Result<Expr, LiteralError> {
    self.skip_ws();
    match self.peek() {
      Some('{') => self.object(),
      Some('[') => self.array(),
      Some('(') => {
        self.pos += 1;
        let inner = self.value()?;
        self.expect(')')?;
        Ok(inner)
      }
      Some('"') | Some('\'') => Ok(Expr::Str(self.string()?)),
      Some(c) if c.is_ascii_digit() || c == '-' || c == '.' => self.number(),
      Some(c) if c.is_alphabetic() || c == '_' || c == '$' => self.word(),
      Some(c) => Err(self.error(format!("unexpected '{}'", c))),
      None => Err(self.error("unexpected end of input")),
    }
  }

  fn object(&mut self) -> Result<Expr, LiteralError> {
    self.expect('{')?;
    let mut props = Vec::new();
    loop {
      self.skip_ws();
      if self.peek() == Some('}') {
        self.pos += 1;
        return Ok(Expr::Object(props));
      }

      let (key, shorthand) = match self.peek() {
        Some('"') | Some('\'') => (PropKey::Str(self.string()?), None),
        Some(c) if c.is_ascii_digit() => match self.number()? {
          Expr::Num(raw) => (PropKey::Str(raw), None),
          _ => return Err(self.error("invalid numeric key")),
        },
        Some(c) if c.is_alphabetic() || c == '_' || c == '$' => {
          let name = self.identifier();
          (PropKey::Ident(name.clone()), Some(name))
        }
        Some(c) => return Err(self.error(format!("unexpected '{}' in object key", c))),
        None => return Err(self.error("unterminated object")),
      };

      self.skip_ws();
      let value = match (self.peek(), shorthand) {
        (Some(',') | Some('}'), Some(name)) => {
          if !is_identifier(&name) {
            return Err(self.error(format!("reserved word '{}' used as a shorthand property", name)));
          }
          Expr::Ident(name)
        }
        _ => {
          self.expect(':')?;
          self.value()?
        }
      };
      props.push((key, value));

      self.skip_ws();
      match self.bump() {
        Some(',') => continue,
        Some('}') => return Ok(Expr::Object(props)),
        Some(c) => {
          self.pos -= 1;
          return Err(self.error(format!("expected ',' or '}}', found '{}'", c)));
        }
        None => return Err(self.error("unterminated object")),
      }
    }
  }

  fn array(&mut self) -> Result<Expr, LiteralError> {
    self.expect('[')?;
    let mut items = Vec::new();
    loop {
      self.skip_ws();
      if self.peek() == Some(']') {
        self.pos += 1;
        return Ok(Expr::Array(items));
      }
      items.push(self.value()?);
      self.skip_ws();
      match self.bump() {
        Some(',') => continue,
        Some(']') => return Ok(Expr::Array(items)),
        Some(c) => {
          self.pos -= 1;
          return Err(self.error(format!("expected ',' or ']', found '{}'", c)));
        }
        None => return Err(self.error("unterminated list")),
      }
    }
  }

  fn string(&mut self) -> Result<String, LiteralError> {
    let quote = self.bump().ok_or_else(|| self.error("expected string"))?;
    let mut out = String::new();
    loop {
      match self.bump() {
        None => return Err(self.error("unterminated string")),
        Some(c) if c == quote => return Ok(out),
        Some('\\') => {
          let escaped = self.bump().ok_or_else(|| self.error("unterminated string"))?;
          match escaped {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            'b' => out.push('\u{8}'),
            'f' => out.push('\u{c}'),
            '0' => out.push('\0'),
            'u' => out.push(self.unicode_escape()?),
            other => out.push(other),
          }
        }
        Some(c) => out.push(c),
      }
    }
  }

  /// Decode the four hex digits after `\u`. A surrogate pair written as
  /// two escapes becomes one character; a lone surrogate becomes U+FFFD.
  fn unicode_escape(&mut self) -> Result<char, LiteralError> {
    let code = self.hex4().ok_or_else(|| self.error("invalid unicode escape"))?;
    match code {
      0xD800..=0xDBFF => {
        let resume = self.pos;
        if self.bump() == Some('\\') && self.bump() == Some('u') {
          if let Some(low @ 0xDC00..=0xDFFF) = self.hex4() {
            let combined = 0x10000 + ((code - 0xD800) << 10) + (low - 0xDC00);
            return Ok(char::from_u32(combined).unwrap_or(char::REPLACEMENT_CHARACTER));
          }
        }
        self.pos = resume;
        Ok(char::REPLACEMENT_CHARACTER)
      }
      0xDC00..=0xDFFF => Ok(char::REPLACEMENT_CHARACTER),
      _ => char::from_u32(code).ok_or_else(|| self.error("invalid unicode escape")),
    }
  }

  fn hex4(&mut self) -> Option<u32> {
    let mut code = 0u32;
    for _ in 0..4 {
      code = code * 16 + self.bump()?.to_digit(16)?;
    }
    Some(code)
  }

  fn number(&mut self) -> Result<Expr, LiteralError> {
    let start = self.pos;
    if self.peek() == Some('-') {
      self.pos += 1;
    }
    let mut digits = 0;
    while self.peek().is_some_and(|c| c.is_ascii_digit()) {
      self.pos += 1;
      digits += 1;
    }
    if self.peek() == Some('.') {
      self.pos += 1;
      while self.peek().is_some_and(|c| c.is_ascii_digit()) {
        self.pos += 1;
        digits += 1;
      }
    }
    if digits == 0 {
      return Err(self.error("invalid number"));
    }
    if matches!(self.peek(), Some('e') | Some('E')) {
      self.pos += 1;
      if matches!(self.peek(), Some('+') | Some('-')) {
        self.pos += 1;
      }
      let exp_start = self.pos;
      while self.peek().is_some_and(|c| c.is_ascii_digit()) {
        self.pos += 1;
      }
      if self.pos == exp_start {
        return Err(self.error("invalid number exponent"));
      }
    }
    let raw: String = self.chars[start..self.pos].iter().map(|(_, c)| c).collect();
    Ok(Expr::Num(raw))
  }

  fn identifier(&mut self) -> String {
    let mut name = String::new();
    while let Some(c) = self.peek() {
      if c.is_alphanumeric() || c == '_' || c == '$' {
        name.push(c);
        self.pos += 1;
      } else {
        break;
      }
    }
    name
  }

  fn word(&mut self) -> Result<Expr, LiteralError> {
    let start = self.pos;
    let name = self.identifier();
    let mut expr = match name.as_str() {
      "true" => return Ok(Expr::Bool(true)),
      "false" => return Ok(Expr::Bool(false)),
      "null" => return Ok(Expr::Null),
      _ if !is_identifier(&name) => {
        self.pos = start;
        return Err(self.error(format!("reserved word '{}' used as a value", name)));
      }
      _ => Expr::Ident(name),
    };
    while self.peek() == Some('.') {
      self.pos += 1;
      let property = self.identifier();
      if property.is_empty() {
        return Err(self.error("expected property name after '.'"));
      }
      expr = expr.member(property);
    }
    Ok(expr)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::printer::print_expr;

  fn round(source: &str) -> String {
    print_expr(&parse_literal(source).unwrap())
  }

  #[test]
  fn test_list_literal() {
    assert_eq!(
      parse_literal("[1, 2, 3]").unwrap(),
      Expr::Array(vec![
        Expr::Num("1".into()),
        Expr::Num("2".into()),
        Expr::Num("3".into()),
      ])
    );
  }

  #[test]
  fn test_object_literal_forms() {
    assert_eq!(
      round(r#"({ name: 'a', "b-c": [true, null], n: -1.5e3, ref: prev.id, short, })"#),
      r#"{ name: "a", "b-c": [true, null], n: -1.5e3, ref: prev.id, short: short }"#
    );
  }

  #[test]
  fn test_nested_structures() {
    assert_eq!(round("[{a: [1, [2]]}, []]"), "[{ a: [1, [2]] }, []]");
  }

  #[test]
  fn test_string_escapes() {
    assert_eq!(
      parse_literal(r#"'it\'s A\n'"#).unwrap(),
      Expr::Str("it's A\n".to_string())
    );
  }

  #[test]
  fn test_malformed_literals() {
    for source in ["[1, 2", "{a: }", "{a 1}", "[1] 2", "", "'open", "{a: 1,, b: 2}", "1e"] {
      assert!(parse_literal(source).is_err(), "expected error for {:?}", source);
    }
  }

  #[test]
  fn test_error_offset() {
    let err = parse_literal("[1, @]").unwrap_err();
    assert_eq!(err.offset, 4);
  }

  #[test]
  fn test_reserved_words_are_not_values() {
    for source in ["this", "[1, new]", "{ a: typeof }", "{ class }", "(delete)"] {
      assert!(parse_literal(source).is_err(), "expected error for {:?}", source);
    }
    let err = parse_literal("[1, this.x]").unwrap_err();
    assert_eq!(err.offset, 4);
    // Reserved words stay usable as keys and after a dot.
    assert_eq!(round("{ class: 1, a: prev.default }"), "{ class: 1, a: prev.default }");
  }

  #[test]
  fn test_surrogate_pair_escapes() {
    assert_eq!(
      parse_literal(r#""\uD83D\uDE00!""#).unwrap(),
      Expr::Str("\u{1F600}!".to_string())
    );
    assert_eq!(
      parse_literal(r#""a\uD83Db""#).unwrap(),
      Expr::Str("a\u{FFFD}b".to_string())
    );
    assert_eq!(
      parse_literal(r#""\uDE00\uD83D\n""#).unwrap(),
      Expr::Str("\u{FFFD}\u{FFFD}\n".to_string())
    );
  }
}
