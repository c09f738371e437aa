//! Compile errors.

/// Errors raised while compiling a flow. The run is never started when
/// compilation fails.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CompileError {
  /// An `elseif` or `else` without a preceding `if` in the same sibling list.
  #[error("else/elseif without preceding if{}", at(.node_id))]
  BranchOrder { node_id: Option<String> },

  /// A literal object/list value could not be parsed.
  #[error("invalid literal value{}: {message}", at(.node_id))]
  InvalidLiteral {
    node_id: Option<String>,
    message: String,
  },

  /// A node is missing a field it cannot be compiled without.
  #[error("missing required field '{field}'{}", at(.node_id))]
  MissingField {
    node_id: Option<String>,
    field: &'static str,
  },

  /// A name that must become a program identifier is not a valid one.
  #[error("'{name}' is not a valid identifier{}", at(.node_id))]
  InvalidIdentifier {
    node_id: Option<String>,
    name: String,
  },
}

impl CompileError {
  /// The id of the offending node, when known.
  pub fn node_id(&self) -> Option<&str> {
    match self {
      CompileError::BranchOrder { node_id }
      | CompileError::InvalidLiteral { node_id, .. }
      | CompileError::MissingField { node_id, .. }
      | CompileError::InvalidIdentifier { node_id, .. } => node_id.as_deref(),
    }
  }
}

fn at(node_id: &Option<String>) -> String {
  match node_id {
    Some(id) => format!(" at node '{}'", id),
    None => String::new(),
  }
}
