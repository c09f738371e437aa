use serde::{Deserialize, Serialize};

use crate::enums::{ErrorPolicy, Operator, SourceKind};
use crate::input::InputArg;
use crate::output::OutputArg;

/// One node of a flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CommandNode {
  /// Inline user code, materialized as a sibling module before the run.
  #[serde(rename = "code")]
  Code(CodeNode),
  /// A call into a versioned component group.
  #[serde(rename = "component")]
  Component(ComponentNode),
  #[serde(rename = "if")]
  If(ConditionNode),
  #[serde(rename = "elseif")]
  ElseIf(ConditionNode),
  #[serde(rename = "else")]
  Else(ElseNode),
  #[serde(rename = "forEach")]
  ForEach(ForEachNode),
}

impl CommandNode {
  /// The node id, if the node carries a non-empty one.
  pub fn id(&self) -> Option<&str> {
    let id = match self {
      CommandNode::Code(n) => &n.id,
      CommandNode::Component(n) => &n.id,
      CommandNode::If(n) | CommandNode::ElseIf(n) => &n.id,
      CommandNode::Else(n) => &n.id,
      CommandNode::ForEach(n) => &n.id,
    };
    (!id.is_empty()).then_some(id.as_str())
  }

  /// Nested nodes of a conditional or loop; empty for step nodes.
  pub fn body(&self) -> &[CommandNode] {
    match self {
      CommandNode::If(n) | CommandNode::ElseIf(n) => &n.body,
      CommandNode::Else(n) => &n.body,
      CommandNode::ForEach(n) => &n.body,
      CommandNode::Code(_) | CommandNode::Component(_) => &[],
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeNode {
  pub id: String,
  #[serde(default)]
  pub name: String,
  /// Module source of the step.
  #[serde(rename = "code")]
  pub source: String,
  #[serde(rename = "errorHandling", default)]
  pub error_policy: ErrorPolicy,
  #[serde(default)]
  pub inputs: Vec<InputArg>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub output: Option<OutputArg>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentNode {
  pub id: String,
  #[serde(default)]
  pub name: String,
  /// Key of the group the component is published in.
  #[serde(rename = "group")]
  pub group_key: String,
  /// Exported function of the group module.
  #[serde(rename = "func")]
  pub function_name: String,
  pub version: String,
  #[serde(rename = "errorHandling", default)]
  pub error_policy: ErrorPolicy,
  #[serde(default)]
  pub inputs: Vec<InputArg>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub output: Option<OutputArg>,
}

/// Shared shape of `if` and `elseif` nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionNode {
  #[serde(default)]
  pub id: String,
  #[serde(rename = "leftSrcType")]
  pub left_source: SourceKind,
  #[serde(default)]
  pub left_value: String,
  pub operator: Operator,
  #[serde(rename = "rightSrcType")]
  pub right_source: SourceKind,
  #[serde(default)]
  pub right_value: String,
  #[serde(rename = "tasks", default)]
  pub body: Vec<CommandNode>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ElseNode {
  #[serde(default)]
  pub id: String,
  #[serde(rename = "tasks", default)]
  pub body: Vec<CommandNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForEachNode {
  #[serde(default)]
  pub id: String,
  #[serde(rename = "srcType")]
  pub iterable_source: SourceKind,
  #[serde(rename = "items", default)]
  pub iterable_value: String,
  /// The loop variable; its key names the per-iteration binding.
  #[serde(rename = "output", default, skip_serializing_if = "Option::is_none")]
  pub binding: Option<OutputArg>,
  #[serde(rename = "tasks", default)]
  pub body: Vec<CommandNode>,
}
