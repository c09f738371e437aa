//! Process runner.
//!
//! Drives one run of a compiled program: spawns it, classifies its output
//! into step events, and applies pause/resume/stop/timeout through OS
//! signals. A runner is single-use; once the run is terminal it cannot be
//! started again.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::error::ProcessError;
use crate::event::{RunEvent, RunNotifier, StepCode, StepData};
use crate::protocol::{ProtocolLine, classify};
use crate::spawn::{LaunchSpec, ProcessHandle, Signal, Spawner, StreamKind, TransportEvent};
use crate::state::{RunAction, RunState};

/// Key/value pairs passed to the program as `-key=value` arguments.
pub type RunContext = BTreeMap<String, Value>;

/// What a runner launches.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
  /// Interpreter executable, e.g. `node`.
  pub interpreter: PathBuf,
  /// Program entry file, relative to `cwd` or absolute.
  pub entry: PathBuf,
  pub cwd: PathBuf,
  /// App metadata attached to run start/end events.
  pub meta: Option<Value>,
}

struct RunInner {
  state: RunState,
  handle: Option<Arc<dyn ProcessHandle>>,
  step_failed: bool,
}

/// A single run of a compiled program.
///
/// Cloning yields another handle to the same run, so one task can await
/// [`start`](Self::start) while others pause or stop it.
#[derive(Clone)]
pub struct ProcessRunner {
  config: Arc<RunnerConfig>,
  spawner: Arc<dyn Spawner>,
  notifier: Arc<dyn RunNotifier>,
  inner: Arc<Mutex<RunInner>>,
}

impl ProcessRunner {
  pub fn new(
    config: RunnerConfig,
    spawner: Arc<dyn Spawner>,
    notifier: Arc<dyn RunNotifier>,
  ) -> Self {
    Self {
      config: Arc::new(config),
      spawner,
      notifier,
      inner: Arc::new(Mutex::new(RunInner {
        state: RunState::Initial,
        handle: None,
        step_failed: false,
      })),
    }
  }

  pub async fn state(&self) -> RunState {
    self.inner.lock().await.state
  }

  /// Run the program to completion and return the terminal state.
  ///
  /// Resolves when the process exits, including after `stop()` or
  /// `timeout()` killed it.
  pub async fn start(&self, context: &RunContext) -> Result<RunState, ProcessError> {
    {
      let mut inner = self.inner.lock().await;
      self.transition(&mut inner, RunAction::Start)?;
    }
    self.notifier.notify(RunEvent::RunStarted {
      start_time: now_millis(),
      meta: self.config.meta.clone(),
    });

    let spec = LaunchSpec {
      program: self.config.interpreter.clone(),
      args: std::iter::once(self.config.entry.to_string_lossy().into_owned())
        .chain(context_args(context))
        .collect(),
      cwd: self.config.cwd.clone(),
    };

    let spawned = match self.spawner.spawn(&spec).await {
      Ok(spawned) => spawned,
      Err(e) => {
        error!(error = %e, program = %spec.program.display(), "failed to start run");
        self.notifier.notify(RunEvent::StepData(StepData::new(
          StepCode::ErrorLog,
          e.to_string(),
        )));
        let state = {
          let mut inner = self.inner.lock().await;
          // A stop/timeout may already have ended the run.
          let _ = self.transition(&mut inner, RunAction::SpawnFailed);
          inner.state
        };
        self.end(state);
        return Err(e);
      }
    };

    let pid = spawned.handle.id();
    {
      let mut inner = self.inner.lock().await;
      if inner.state.is_terminal() {
        // Stopped while spawning.
        if let Err(e) = spawned.handle.signal(Signal::Kill).await {
          warn!(pid, error = %e, "failed to kill process of a stopped run");
        }
      } else {
        inner.handle = Some(spawned.handle.clone());
      }
    }
    info!(pid, "run started");

    let mut events = spawned.events;
    while let Some(event) = events.recv().await {
      match event {
        TransportEvent::Line { stream, line } => self.handle_line(stream, &line).await,
        TransportEvent::Exited { code } => {
          debug!(pid, code, "run process exited");
          break;
        }
      }
    }

    let state = {
      let mut inner = self.inner.lock().await;
      inner.handle = None;
      let failed = inner.step_failed;
      if !inner.state.is_terminal() {
        self.transition(&mut inner, RunAction::Exit { failed })?;
      }
      inner.state
    };
    info!(pid, state = %state, "run ended");
    self.end(state);
    Ok(state)
  }

  /// Suspend a running process.
  pub async fn pause(&self) -> Result<(), ProcessError> {
    self.signal_transition(RunAction::Pause, Signal::Pause).await
  }

  /// Continue a paused process.
  pub async fn resume(&self) -> Result<(), ProcessError> {
    self.signal_transition(RunAction::Resume, Signal::Resume).await
  }

  /// Kill the process and end the run as `Stopped`.
  pub async fn stop(&self) -> Result<(), ProcessError> {
    self.terminate(RunAction::Stop).await
  }

  /// Kill the process and end the run as `Timeout`.
  pub async fn timeout(&self) -> Result<(), ProcessError> {
    self.terminate(RunAction::Timeout).await
  }

  /// Detach the process handle. Control calls after this no longer reach
  /// the process.
  pub async fn dispose(&self) {
    self.inner.lock().await.handle = None;
  }

  async fn signal_transition(&self, action: RunAction, signal: Signal) -> Result<(), ProcessError> {
    let mut inner = self.inner.lock().await;
    let next = inner.state.apply(action).ok_or(ProcessError::InvalidTransition {
      state: inner.state,
      action,
    })?;
    let handle = inner.handle.clone().ok_or(ProcessError::NotSpawned)?;
    handle.signal(signal).await?;
    self.set_state(&mut inner, next);
    Ok(())
  }

  async fn terminate(&self, action: RunAction) -> Result<(), ProcessError> {
    let mut inner = self.inner.lock().await;
    self.transition(&mut inner, action)?;
    match inner.handle.clone() {
      Some(handle) => handle.signal(Signal::Kill).await,
      None => Ok(()),
    }
  }

  async fn handle_line(&self, stream: StreamKind, line: &str) {
    match classify(stream, line) {
      ProtocolLine::StepStarted(start) => {
        self.notifier.notify(RunEvent::StepStarted(start));
      }
      ProtocolLine::StepData(data) => {
        match data.code {
          StepCode::Error => self.inner.lock().await.step_failed = true,
          StepCode::Log => info!(target: "conduit::program", "{}", line),
          StepCode::ErrorLog => warn!(target: "conduit::program", "{}", line),
          StepCode::Success => {}
        }
        self.notifier.notify(RunEvent::StepData(data));
      }
    }
  }

  fn transition(&self, inner: &mut RunInner, action: RunAction) -> Result<(), ProcessError> {
    let next = inner
      .state
      .apply(action)
      .ok_or(ProcessError::InvalidTransition {
        state: inner.state,
        action,
      })?;
    self.set_state(inner, next);
    Ok(())
  }

  fn set_state(&self, inner: &mut RunInner, next: RunState) {
    debug!(from = %inner.state, to = %next, "run state changed");
    inner.state = next;
    self.notifier.notify(RunEvent::StateChanged { state: next });
  }

  fn end(&self, state: RunState) {
    self.notifier.notify(RunEvent::RunEnded {
      end_time: now_millis(),
      state,
      meta: self.config.meta.clone(),
    });
  }
}

/// `-key=value` for every entry with a truthy value.
pub fn context_args(context: &RunContext) -> Vec<String> {
  context
    .iter()
    .filter_map(|(key, value)| {
      let rendered = match value {
        Value::Null | Value::Bool(false) => return None,
        Value::String(s) if s.is_empty() => return None,
        Value::Number(n) if n.as_f64() == Some(0.0) => return None,
        Value::String(s) => s.clone(),
        other => other.to_string(),
      };
      Some(format!("-{}={}", key, rendered))
    })
    .collect()
}

fn now_millis() -> i64 {
  chrono::Utc::now().timestamp_millis()
}
