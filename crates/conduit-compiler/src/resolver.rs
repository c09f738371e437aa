//! Value resolution: turns a node's string-typed field into an expression.

use conduit_config::{SourceKind, ValueType};

use crate::ast::{Expr, is_identifier, sanitize_identifier};
use crate::error::CompileError;
use crate::literal::parse_literal;

/// Binding the global registry is loaded under.
pub const GLOBAL_BINDING: &str = "global";

/// Resolve one `(source, type, raw value)` triple into an expression.
///
/// `node_id` is only used to label errors.
pub fn resolve_value(
  source: SourceKind,
  value_type: ValueType,
  raw: &str,
  node_id: Option<&str>,
) -> Result<Expr, CompileError> {
  match source {
    SourceKind::Literal => resolve_literal(value_type, raw, node_id),
    _ if raw.is_empty() => Ok(Expr::undefined()),
    SourceKind::PriorOutput => resolve_path(raw, node_id),
    SourceKind::GlobalVar => {
      let name = checked_identifier(raw, node_id)?;
      Ok(Expr::ident(GLOBAL_BINDING).member(name).member("value"))
    }
    SourceKind::RawIdentifier => Ok(Expr::ident(checked_identifier(raw, node_id)?)),
  }
}

fn resolve_literal(
  value_type: ValueType,
  raw: &str,
  node_id: Option<&str>,
) -> Result<Expr, CompileError> {
  match value_type {
    ValueType::List | ValueType::Object if raw.trim().is_empty() => Ok(Expr::undefined()),
    ValueType::List | ValueType::Object => {
      parse_literal(raw).map_err(|e| CompileError::InvalidLiteral {
        node_id: node_id.map(str::to_string),
        message: e.to_string(),
      })
    }
    ValueType::Boolean => Ok(Expr::Bool(raw.trim() == "true")),
    ValueType::Number => Ok(Expr::Num(integer_prefix(raw))),
    ValueType::String | ValueType::Unknown => Ok(Expr::str(raw)),
  }
}

/// `binding` or `binding.field.sub` as an identifier/member chain.
fn resolve_path(raw: &str, node_id: Option<&str>) -> Result<Expr, CompileError> {
  let mut segments = raw.split('.');
  let head = segments.next().unwrap_or_default();
  let mut expr = Expr::ident(checked_identifier(head, node_id)?);
  for segment in segments {
    if sanitize_identifier(segment) != segment {
      return Err(invalid_identifier(raw, node_id));
    }
    expr = expr.member(segment);
  }
  Ok(expr)
}

fn checked_identifier<'a>(name: &'a str, node_id: Option<&str>) -> Result<&'a str, CompileError> {
  if is_identifier(name) {
    Ok(name)
  } else {
    Err(invalid_identifier(name, node_id))
  }
}

pub(crate) fn invalid_identifier(name: &str, node_id: Option<&str>) -> CompileError {
  CompileError::InvalidIdentifier {
    node_id: node_id.map(str::to_string),
    name: name.to_string(),
  }
}

/// Leading base-10 integer of `raw`, or `NaN` when there is none.
fn integer_prefix(raw: &str) -> String {
  let trimmed = raw.trim_start();
  let (sign, rest) = match trimmed.strip_prefix('-') {
    Some(rest) => ("-", rest),
    None => ("", trimmed.strip_prefix('+').unwrap_or(trimmed)),
  };
  let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
  if digits.is_empty() {
    return "NaN".to_string();
  }
  let digits = digits.trim_start_matches('0');
  if digits.is_empty() {
    return "0".to_string();
  }
  format!("{}{}", sign, digits)
}
