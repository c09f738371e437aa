//! Compile output: program source plus the dependencies it loads.

use std::path::PathBuf;

use conduit_config::{ErrorPolicy, InputArg, OutputArg};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A `(groupKey, version)` pair referenced by at least one component node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupDependency {
  pub group_key: String,
  pub version: String,
  /// Binding the group module is loaded under, e.g. `math_v1`.
  pub alias: String,
  /// Where the group module is expected on disk.
  pub local_path: PathBuf,
}

/// Metadata of an inline code step, embedded in its wrapper module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepMeta {
  pub id: String,
  pub name: String,
  pub error_policy: ErrorPolicy,
  pub inputs: Vec<InputArg>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub output: Option<OutputArg>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineCode {
  pub alias: String,
  /// Module source (`code.js`).
  pub source: String,
  pub meta: StepMeta,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyManifest {
  /// Unique group dependencies in first-reference order.
  pub groups: Vec<GroupDependency>,
  /// Inline code steps keyed by node id, in first-reference order.
  pub inline_code: IndexMap<String, InlineCode>,
}

impl DependencyManifest {
  pub fn is_empty(&self) -> bool {
    self.groups.is_empty() && self.inline_code.is_empty()
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompiledProgram {
  pub source: String,
  pub dependencies: DependencyManifest,
}
