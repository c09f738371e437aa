use std::fmt;

use serde::{Deserialize, Serialize};

/// Where an input or condition operand takes its value from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceKind {
  /// A literal typed in by the user.
  #[serde(rename = "input")]
  Literal,
  /// A binding produced by an earlier node, optionally `binding.field`.
  #[serde(rename = "output")]
  PriorOutput,
  /// An entry of the global variable registry.
  #[serde(rename = "global")]
  GlobalVar,
  /// A raw identifier, passed through as-is.
  #[serde(rename = "keyMapping")]
  RawIdentifier,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ValueType {
  String,
  Number,
  Boolean,
  Object,
  List,
  #[default]
  #[serde(other)]
  Unknown,
}

/// What a step does when its module fails.
///
/// `Retry` is accepted and forwarded to the step module, but no retry is
/// performed anywhere yet. Editors store it either by name or as its
/// numeric code (`0` stop, `1` ignore, `2` retry).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", try_from = "RawErrorPolicy")]
pub enum ErrorPolicy {
  #[default]
  Stop,
  Ignore,
  Retry,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawErrorPolicy {
  Code(u64),
  Name(String),
}

impl TryFrom<RawErrorPolicy> for ErrorPolicy {
  type Error = String;

  fn try_from(raw: RawErrorPolicy) -> Result<Self, Self::Error> {
    let code = match raw {
      RawErrorPolicy::Code(code) => code.to_string(),
      RawErrorPolicy::Name(name) => name,
    };
    match code.as_str() {
      "stop" | "0" => Ok(ErrorPolicy::Stop),
      "ignore" | "1" => Ok(ErrorPolicy::Ignore),
      "retry" | "2" => Ok(ErrorPolicy::Retry),
      other => Err(format!("unknown error policy '{}'", other)),
    }
  }
}

impl ErrorPolicy {
  pub fn as_str(&self) -> &'static str {
    match self {
      ErrorPolicy::Stop => "stop",
      ErrorPolicy::Ignore => "ignore",
      ErrorPolicy::Retry => "retry",
    }
  }
}

/// Comparison operator of a conditional node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
  #[serde(rename = ">")]
  Gt,
  #[serde(rename = "<")]
  Lt,
  #[serde(rename = ">=")]
  Ge,
  #[serde(rename = "<=")]
  Le,
  #[serde(rename = "==")]
  Eq,
  #[serde(rename = "!=")]
  Ne,
}

impl Operator {
  pub fn as_str(&self) -> &'static str {
    match self {
      Operator::Gt => ">",
      Operator::Lt => "<",
      Operator::Ge => ">=",
      Operator::Le => "<=",
      Operator::Eq => "==",
      Operator::Ne => "!=",
    }
  }
}

impl fmt::Display for Operator {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}
