//! Execution events and notifiers for observability.
//!
//! Every [`RunEvent`] produced by a process runner is re-published as an
//! [`ExecutionEvent`] tagged with the app and run it belongs to, so a single
//! consumer can follow several runs (persist them, stream them to a UI, etc.).

use std::sync::Arc;

use conduit_process::{RunEvent, RunNotifier};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// A run event tagged with its app and run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionEvent {
  pub app_id: String,
  pub run_id: String,
  #[serde(flatten)]
  pub event: RunEvent,
}

/// Trait for receiving execution events.
///
/// The coordinator calls `notify` for each event; implementations decide
/// what to do with them.
pub trait ExecutionNotifier: Send + Sync {
  fn notify(&self, event: ExecutionEvent);
}

/// Discards all events.
#[derive(Debug, Clone, Default)]
pub struct NoopNotifier;

impl ExecutionNotifier for NoopNotifier {
  fn notify(&self, _event: ExecutionEvent) {}
}

/// Sends events to an unbounded channel.
///
/// Step output volume is bounded by what the program prints, so the
/// coordinator never waits on a slow consumer.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
  sender: mpsc::UnboundedSender<ExecutionEvent>,
}

impl ChannelNotifier {
  pub fn new(sender: mpsc::UnboundedSender<ExecutionEvent>) -> Self {
    Self { sender }
  }

  /// Create a notifier together with its receiving end.
  pub fn channel() -> (Self, mpsc::UnboundedReceiver<ExecutionEvent>) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (Self { sender }, receiver)
  }
}

impl ExecutionNotifier for ChannelNotifier {
  fn notify(&self, event: ExecutionEvent) {
    // Receiver may have been dropped
    let _ = self.sender.send(event);
  }
}

/// Adapts an [`ExecutionNotifier`] to the runner's [`RunNotifier`] for one run.
pub(crate) struct RunForwarder {
  app_id: String,
  run_id: String,
  inner: Arc<dyn ExecutionNotifier>,
}

impl RunForwarder {
  pub(crate) fn new(app_id: &str, run_id: &str, inner: Arc<dyn ExecutionNotifier>) -> Self {
    Self {
      app_id: app_id.to_string(),
      run_id: run_id.to_string(),
      inner,
    }
  }
}

impl RunNotifier for RunForwarder {
  fn notify(&self, event: RunEvent) {
    self.inner.notify(ExecutionEvent {
      app_id: self.app_id.clone(),
      run_id: self.run_id.clone(),
      event,
    });
  }
}
