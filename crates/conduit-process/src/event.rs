//! Run events and notifiers.
//!
//! The runner reports everything that happens during a run through a
//! [`RunNotifier`]: state changes, run start/end, and the step protocol
//! lines of the spawned program.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::state::RunState;

/// Kind of step data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepCode {
  /// A step finished; the payload is its `endTime` line.
  Success,
  /// A step failed; the payload is its `endTime` line from stderr.
  Error,
  /// A non-protocol stdout line.
  Log,
  /// A non-protocol stderr line, or a host-side error message.
  ErrorLog,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepStart {
  pub start_time: Value,
  #[serde(default)]
  pub inputs: Value,
  #[serde(default)]
  pub step_info: Value,
  #[serde(default)]
  pub step_meta: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepData {
  pub code: StepCode,
  pub payload: Value,
}

impl StepData {
  pub fn new(code: StepCode, payload: impl Into<Value>) -> Self {
    Self {
      code,
      payload: payload.into(),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RunEvent {
  StateChanged {
    state: RunState,
  },
  /// Times are milliseconds since the Unix epoch.
  RunStarted {
    start_time: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    meta: Option<Value>,
  },
  StepStarted(StepStart),
  StepData(StepData),
  RunEnded {
    end_time: i64,
    state: RunState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    meta: Option<Value>,
  },
}

pub trait RunNotifier: Send + Sync {
  fn notify(&self, event: RunEvent);
}

#[derive(Debug, Clone, Default)]
pub struct NoopNotifier;

impl RunNotifier for NoopNotifier {
  fn notify(&self, _event: RunEvent) {}
}

/// Sends events to an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
  sender: mpsc::UnboundedSender<RunEvent>,
}

impl ChannelNotifier {
  pub fn new(sender: mpsc::UnboundedSender<RunEvent>) -> Self {
    Self { sender }
  }
}

impl RunNotifier for ChannelNotifier {
  fn notify(&self, event: RunEvent) {
    // Receiver may have been dropped
    let _ = self.sender.send(event);
  }
}
