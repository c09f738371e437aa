//! Run state machine.
//!
//! ```text
//! Initial ──start──▶ Running ◀──resume── Paused
//!                       │ ──pause──────────▶ │
//!                       ▼                    ▼
//!        exit ▶ Success | Error    stop ▶ Stopped    timeout ▶ Timeout
//! ```
//!
//! All transitions go through [`RunState::apply`]; anything not in its table
//! is rejected.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
  #[default]
  Initial,
  Running,
  Paused,
  Success,
  Error,
  Stopped,
  Timeout,
}

/// Something that may move a run to another state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunAction {
  Start,
  Pause,
  Resume,
  Stop,
  Timeout,
  /// The process exited on its own; `failed` is set when a step reported
  /// an error during the run.
  Exit { failed: bool },
  SpawnFailed,
}

impl RunState {
  pub fn is_terminal(&self) -> bool {
    matches!(
      self,
      RunState::Success | RunState::Error | RunState::Stopped | RunState::Timeout
    )
  }

  /// Next state for `action`, or `None` when the action is not allowed here.
  pub fn apply(self, action: RunAction) -> Option<RunState> {
    use RunAction as A;
    use RunState as S;

    match (self, action) {
      (S::Initial, A::Start) => Some(S::Running),
      (S::Running, A::Pause) => Some(S::Paused),
      (S::Paused, A::Resume) => Some(S::Running),
      (S::Initial | S::Running | S::Paused, A::Stop) => Some(S::Stopped),
      (S::Initial | S::Running | S::Paused, A::Timeout) => Some(S::Timeout),
      (S::Running | S::Paused, A::Exit { failed: true }) => Some(S::Error),
      (S::Running | S::Paused, A::Exit { failed: false }) => Some(S::Success),
      (S::Running, A::SpawnFailed) => Some(S::Error),
      _ => None,
    }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      RunState::Initial => "initial",
      RunState::Running => "running",
      RunState::Paused => "paused",
      RunState::Success => "success",
      RunState::Error => "error",
      RunState::Stopped => "stopped",
      RunState::Timeout => "timeout",
    }
  }
}

impl fmt::Display for RunState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl fmt::Display for RunAction {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      RunAction::Start => "start",
      RunAction::Pause => "pause",
      RunAction::Resume => "resume",
      RunAction::Stop => "stop",
      RunAction::Timeout => "timeout",
      RunAction::Exit { .. } => "exit",
      RunAction::SpawnFailed => "spawn failure",
    };
    f.write_str(name)
  }
}
