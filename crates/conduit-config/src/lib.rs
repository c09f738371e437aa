//! Conduit Config
//!
//! This crate contains the serializable flow definition types for conduit.
//! A flow is an ordered list of command nodes, where conditional and loop
//! nodes carry nested bodies of further nodes.
//!
//! Flows are produced by the visual editor and loaded from:
//! - JSON files (via CLI with `conduit run flow.json`)
//! - The app workspace on disk (as `flow.json`)
//!
//! The compiler takes these types and turns them into a runnable program.

mod enums;
mod input;
mod node;
mod output;

pub use enums::{ErrorPolicy, Operator, SourceKind, ValueType};
pub use input::InputArg;
pub use node::{CodeNode, CommandNode, ComponentNode, ConditionNode, ElseNode, ForEachNode};
pub use output::{ListItemShape, OutputArg, OutputField};

/// Parse a flow (a JSON array of command nodes).
pub fn parse_flow(json: &str) -> Result<Vec<CommandNode>, serde_json::Error> {
  serde_json::from_str(json)
}
