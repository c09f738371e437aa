//! Engine error types.

use std::path::PathBuf;

use conduit_compiler::CompileError;
use conduit_process::ProcessError;

/// Errors raised while putting a compiled program and its dependencies on
/// disk.
#[derive(Debug, thiserror::Error)]
pub enum MaterializeError {
  /// A component group the program loads is not installed.
  #[error("dependency missing: group '{group_key}' v{version} not found at {}", path.display())]
  DependencyMissing {
    group_key: String,
    version: String,
    path: PathBuf,
  },

  /// An app or step id cannot be used as a directory name.
  #[error("invalid name '{name}': must be a single path segment")]
  InvalidName { name: String },

  #[error("failed to write {}: {source}", path.display())]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to serialize step metadata: {0}")]
  Serialize(#[from] serde_json::Error),
}

/// Errors that can occur while coordinating a run.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
  #[error("compile failed: {0}")]
  Compile(#[from] CompileError),

  #[error(transparent)]
  Materialize(#[from] MaterializeError),

  #[error("run failed: {0}")]
  Process(#[from] ProcessError),

  /// A control action arrived while no run is active.
  #[error("no active run")]
  NoActiveRun,

  /// A run was requested while another one is active.
  #[error("run '{run_id}' is already active")]
  RunInProgress { run_id: String },
}
