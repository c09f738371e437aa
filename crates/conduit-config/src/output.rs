//! Output argument types.
//!
//! An output's `key` becomes a program-level binding that later nodes can
//! reference. The shape describes what the step returns, for the editor and
//! for display; the compiler only looks at the key.
//!
//! On the wire all shapes share one object tagged by `type`:
//!
//! ```json
//! { "key": "total", "type": "Number" }
//! { "key": "user", "type": "Object", "children": [{ "key": "name", "type": "String" }] }
//! { "key": "rows", "type": "List", "child": { "type": "Number" } }
//! ```

use serde::{Deserialize, Serialize};

use crate::enums::ValueType;

/// A scalar field of an object output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputField {
  pub key: String,
  #[serde(rename = "type", default)]
  pub value_type: ValueType,
}

/// Shape of the elements of a list output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawShape", into = "RawShape")]
pub enum ListItemShape {
  Basic(ValueType),
  Object(Vec<OutputField>),
  List(Box<ListItemShape>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawOutputArg", into = "RawOutputArg")]
pub enum OutputArg {
  Basic {
    key: String,
    value_type: ValueType,
  },
  Object {
    key: String,
    children: Vec<OutputField>,
  },
  List {
    key: String,
    element: ListItemShape,
  },
}

impl OutputArg {
  pub fn basic(key: impl Into<String>, value_type: ValueType) -> Self {
    OutputArg::Basic {
      key: key.into(),
      value_type,
    }
  }

  /// The binding name this output is stored under.
  pub fn key(&self) -> &str {
    match self {
      OutputArg::Basic { key, .. } | OutputArg::Object { key, .. } | OutputArg::List { key, .. } => {
        key
      }
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawShape {
  #[serde(rename = "type", default)]
  value_type: ValueType,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  children: Option<Vec<OutputField>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  child: Option<Box<RawShape>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawOutputArg {
  #[serde(default)]
  key: String,
  #[serde(flatten)]
  shape: RawShape,
}

fn check_scalar_children(children: &[OutputField]) -> Result<(), String> {
  match children
    .iter()
    .find(|c| matches!(c.value_type, ValueType::Object | ValueType::List))
  {
    Some(field) => Err(format!(
      "object field '{}' must be a scalar type, found {:?}",
      field.key, field.value_type
    )),
    None => Ok(()),
  }
}

impl TryFrom<RawShape> for ListItemShape {
  type Error = String;

  fn try_from(raw: RawShape) -> Result<Self, Self::Error> {
    match raw.value_type {
      ValueType::Object => {
        let children = raw.children.unwrap_or_default();
        check_scalar_children(&children)?;
        Ok(ListItemShape::Object(children))
      }
      ValueType::List => {
        let child = raw.child.map(|c| *c).unwrap_or(RawShape {
          value_type: ValueType::Unknown,
          children: None,
          child: None,
        });
        Ok(ListItemShape::List(Box::new(ListItemShape::try_from(child)?)))
      }
      other => Ok(ListItemShape::Basic(other)),
    }
  }
}

impl From<ListItemShape> for RawShape {
  fn from(shape: ListItemShape) -> Self {
    match shape {
      ListItemShape::Basic(value_type) => RawShape {
        value_type,
        children: None,
        child: None,
      },
      ListItemShape::Object(children) => RawShape {
        value_type: ValueType::Object,
        children: Some(children),
        child: None,
      },
      ListItemShape::List(inner) => RawShape {
        value_type: ValueType::List,
        children: None,
        child: Some(Box::new(RawShape::from(*inner))),
      },
    }
  }
}

impl TryFrom<RawOutputArg> for OutputArg {
  type Error = String;

  fn try_from(raw: RawOutputArg) -> Result<Self, Self::Error> {
    let key = raw.key;
    match ListItemShape::try_from(raw.shape)? {
      ListItemShape::Basic(value_type) => Ok(OutputArg::Basic { key, value_type }),
      ListItemShape::Object(children) => Ok(OutputArg::Object { key, children }),
      ListItemShape::List(element) => Ok(OutputArg::List {
        key,
        element: *element,
      }),
    }
  }
}

impl From<OutputArg> for RawOutputArg {
  fn from(output: OutputArg) -> Self {
    let (key, shape) = match output {
      OutputArg::Basic { key, value_type } => (key, ListItemShape::Basic(value_type)),
      OutputArg::Object { key, children } => (key, ListItemShape::Object(children)),
      OutputArg::List { key, element } => (key, ListItemShape::List(Box::new(element))),
    };
    RawOutputArg {
      key,
      shape: shape.into(),
    }
  }
}
