//! Input argument types for step nodes.
//!
//! Every input value is stored as a string, whatever its declared type. How
//! the string is read depends on the source kind:
//!
//! ```json
//! { "key": "items", "srcType": "input", "type": "List", "value": "[1, 2, 3]" }
//! { "key": "total", "srcType": "output", "type": "Number", "value": "sum.total" }
//! { "key": "token", "srcType": "global", "type": "String", "value": "apiToken" }
//! ```
//!
//! - `input` values are literals, coerced according to `type`
//! - `output` values name an earlier output binding (`binding` or `binding.field`)
//! - `global` values name an entry of the global registry

use serde::{Deserialize, Serialize};

use crate::enums::{SourceKind, ValueType};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputArg {
  pub key: String,
  #[serde(rename = "srcType")]
  pub source: SourceKind,
  #[serde(rename = "type", default)]
  pub value_type: ValueType,
  #[serde(default)]
  pub value: String,
  /// Display name shown in the editor.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,
}

impl InputArg {
  pub fn new(
    key: impl Into<String>,
    source: SourceKind,
    value_type: ValueType,
    value: impl Into<String>,
  ) -> Self {
    Self {
      key: key.into(),
      source,
      value_type,
      value: value.into(),
      name: None,
    }
  }

  pub fn literal(key: impl Into<String>, value_type: ValueType, value: impl Into<String>) -> Self {
    Self::new(key, SourceKind::Literal, value_type, value)
  }

  pub fn output(key: impl Into<String>, value: impl Into<String>) -> Self {
    Self::new(key, SourceKind::PriorOutput, ValueType::Unknown, value)
  }
}
