use crate::spawn::Signal;
use crate::state::{RunAction, RunState};

/// Errors that can occur while driving a run.
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
  /// The process could not be launched.
  #[error("failed to spawn process: {0}")]
  Spawn(#[source] std::io::Error),

  /// A signal could not be delivered to the process.
  #[error("failed to send {signal} to process {pid}: {message}")]
  Signal {
    signal: Signal,
    pid: u32,
    message: String,
  },

  /// The action is not allowed in the current run state.
  #[error("cannot {action} a run that is {state}")]
  InvalidTransition { state: RunState, action: RunAction },

  /// A control action arrived before the process was spawned.
  #[error("no process attached to the run")]
  NotSpawned,
}
