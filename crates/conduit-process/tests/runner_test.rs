//! ProcessRunner tests against a scripted spawner.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use conduit_process::{
  ChannelNotifier, LaunchSpec, ProcessError, ProcessHandle, ProcessRunner, RunContext, RunEvent,
  RunState, RunnerConfig, Signal, SpawnedProcess, Spawner, StepCode, StreamKind, TransportEvent,
};
use serde_json::json;
use tokio::sync::mpsc;

/// Spawner whose "process" emits whatever the test pushes into its script
/// channel. Signals are recorded; `Kill` ends the process unless
/// `ignore_kill` is set.
struct FakeSpawner {
  events: Mutex<Option<mpsc::UnboundedReceiver<TransportEvent>>>,
  script: mpsc::UnboundedSender<TransportEvent>,
  signals: Arc<Mutex<Vec<Signal>>>,
  launches: Mutex<Vec<LaunchSpec>>,
  fail: bool,
  ignore_kill: bool,
}

impl FakeSpawner {
  fn new() -> Self {
    let (script, events) = mpsc::unbounded_channel();
    Self {
      events: Mutex::new(Some(events)),
      script,
      signals: Arc::new(Mutex::new(Vec::new())),
      launches: Mutex::new(Vec::new()),
      fail: false,
      ignore_kill: false,
    }
  }

  fn failing() -> Self {
    Self {
      fail: true,
      ..Self::new()
    }
  }

  fn stdout(&self, line: &str) {
    self.push(StreamKind::Stdout, line);
  }

  fn stderr(&self, line: &str) {
    self.push(StreamKind::Stderr, line);
  }

  fn push(&self, stream: StreamKind, line: &str) {
    self
      .script
      .send(TransportEvent::Line {
        stream,
        line: line.to_string(),
      })
      .unwrap();
  }

  fn exit(&self, code: i32) {
    self
      .script
      .send(TransportEvent::Exited { code: Some(code) })
      .unwrap();
  }

  fn signals(&self) -> Vec<Signal> {
    self.signals.lock().unwrap().clone()
  }
}

#[async_trait]
impl Spawner for FakeSpawner {
  async fn spawn(&self, spec: &LaunchSpec) -> Result<SpawnedProcess, ProcessError> {
    self.launches.lock().unwrap().push(spec.clone());
    if self.fail {
      return Err(ProcessError::Spawn(std::io::Error::new(
        std::io::ErrorKind::NotFound,
        "interpreter not found",
      )));
    }
    let events = self.events.lock().unwrap().take().expect("spawned twice");
    Ok(SpawnedProcess {
      handle: Arc::new(FakeHandle {
        signals: self.signals.clone(),
        script: self.script.clone(),
        ignore_kill: self.ignore_kill,
      }),
      events,
    })
  }
}

struct FakeHandle {
  signals: Arc<Mutex<Vec<Signal>>>,
  script: mpsc::UnboundedSender<TransportEvent>,
  ignore_kill: bool,
}

#[async_trait]
impl ProcessHandle for FakeHandle {
  fn id(&self) -> Option<u32> {
    Some(4242)
  }

  async fn signal(&self, signal: Signal) -> Result<(), ProcessError> {
    self.signals.lock().unwrap().push(signal);
    if signal == Signal::Kill && !self.ignore_kill {
      let _ = self.script.send(TransportEvent::Exited { code: None });
    }
    Ok(())
  }
}

fn runner(spawner: Arc<FakeSpawner>) -> (ProcessRunner, mpsc::UnboundedReceiver<RunEvent>) {
  let (tx, rx) = mpsc::unbounded_channel();
  let config = RunnerConfig {
    interpreter: PathBuf::from("node"),
    entry: PathBuf::from("index.js"),
    cwd: PathBuf::from("/tmp/app"),
    meta: Some(json!({ "name": "Demo" })),
  };
  let runner = ProcessRunner::new(config, spawner, Arc::new(ChannelNotifier::new(tx)));
  (runner, rx)
}

/// Short, time-independent description of an event.
fn label(event: &RunEvent) -> String {
  match event {
    RunEvent::StateChanged { state } => format!("state:{}", state),
    RunEvent::RunStarted { .. } => "run_started".to_string(),
    RunEvent::StepStarted(_) => "step_started".to_string(),
    RunEvent::StepData(data) => format!("step_data:{:?}", data.code),
    RunEvent::RunEnded { state, .. } => format!("run_ended:{}", state),
  }
}

fn drain(rx: &mut mpsc::UnboundedReceiver<RunEvent>) -> Vec<String> {
  let mut labels = Vec::new();
  while let Ok(event) = rx.try_recv() {
    labels.push(label(&event));
  }
  labels
}

/// Wait until an event with the given label arrives; returns the labels
/// seen up to and including it.
async fn wait_for(rx: &mut mpsc::UnboundedReceiver<RunEvent>, wanted: &str) -> Vec<String> {
  let mut seen = Vec::new();
  loop {
    let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
      .await
      .expect("timed out waiting for event")
      .expect("event channel closed");
    seen.push(label(&event));
    if seen.last().map(String::as_str) == Some(wanted) {
      return seen;
    }
  }
}

#[tokio::test]
async fn test_successful_run_event_sequence() {
  let spawner = Arc::new(FakeSpawner::new());
  spawner.stdout(r#"{"startTime":1,"inputs":{"n":1},"info":{"id":"a"},"meta":{}}"#);
  spawner.stdout(r#"{"endTime":2,"result":2,"info":{"id":"a"}}"#);
  spawner.stdout("plain output");
  spawner.stderr("a warning");
  spawner.exit(0);
  let (runner, mut rx) = runner(spawner.clone());

  let state = runner.start(&RunContext::new()).await.unwrap();

  assert_eq!(state, RunState::Success);
  assert_eq!(
    drain(&mut rx),
    vec![
      "state:running",
      "run_started",
      "step_started",
      "step_data:Success",
      "step_data:Log",
      "step_data:ErrorLog",
      "state:success",
      "run_ended:success",
    ]
  );
}

#[tokio::test]
async fn test_run_events_carry_meta_and_step_payloads() {
  let spawner = Arc::new(FakeSpawner::new());
  spawner.stdout(r#"{"startTime":10,"inputs":{"n":1},"info":{"id":"a"},"meta":{"name":"A"}}"#);
  spawner.exit(0);
  let (runner, mut rx) = runner(spawner);

  runner.start(&RunContext::new()).await.unwrap();

  let events: Vec<RunEvent> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
  match &events[1] {
    RunEvent::RunStarted { meta, start_time } => {
      assert_eq!(meta, &Some(json!({ "name": "Demo" })));
      assert!(*start_time > 0);
    }
    other => panic!("expected run start, got {:?}", other),
  }
  match &events[2] {
    RunEvent::StepStarted(start) => {
      assert_eq!(start.start_time, json!(10));
      assert_eq!(start.inputs, json!({ "n": 1 }));
      assert_eq!(start.step_info, json!({ "id": "a" }));
      assert_eq!(start.step_meta, json!({ "name": "A" }));
    }
    other => panic!("expected step start, got {:?}", other),
  }
}

#[tokio::test]
async fn test_step_error_marks_run_failed() {
  let spawner = Arc::new(FakeSpawner::new());
  spawner.stderr(r#"{"endTime":2,"error":"Error: boom"}"#);
  spawner.stdout(r#"{"endTime":3,"result":1}"#);
  spawner.exit(0);
  let (runner, mut rx) = runner(spawner);

  let state = runner.start(&RunContext::new()).await.unwrap();

  assert_eq!(state, RunState::Error);
  let labels = drain(&mut rx);
  assert!(labels.contains(&"step_data:Error".to_string()));
  assert_eq!(labels.last().map(String::as_str), Some("run_ended:error"));
}

#[tokio::test]
async fn test_pause_resume_and_stop() {
  let spawner = Arc::new(FakeSpawner::new());
  let (runner, mut rx) = runner(spawner.clone());
  let task = tokio::spawn({
    let runner = runner.clone();
    async move { runner.start(&RunContext::new()).await }
  });

  spawner.stdout("ready");
  wait_for(&mut rx, "step_data:Log").await;

  runner.pause().await.unwrap();
  assert_eq!(runner.state().await, RunState::Paused);
  assert_eq!(drain(&mut rx), vec!["state:paused"]);

  let err = runner.pause().await.unwrap_err();
  assert!(matches!(
    err,
    ProcessError::InvalidTransition {
      state: RunState::Paused,
      ..
    }
  ));
  assert!(drain(&mut rx).is_empty());

  runner.resume().await.unwrap();
  assert_eq!(runner.state().await, RunState::Running);
  assert_eq!(drain(&mut rx), vec!["state:running"]);

  runner.stop().await.unwrap();
  let final_state = task.await.unwrap().unwrap();

  assert_eq!(final_state, RunState::Stopped);
  assert_eq!(spawner.signals(), vec![Signal::Pause, Signal::Resume, Signal::Kill]);
  assert_eq!(drain(&mut rx), vec!["state:stopped", "run_ended:stopped"]);
}

#[tokio::test]
async fn test_stop_does_not_wait_for_exit() {
  let spawner = Arc::new(FakeSpawner {
    ignore_kill: true,
    ..FakeSpawner::new()
  });
  let (runner, mut rx) = runner(spawner.clone());
  let task = tokio::spawn({
    let runner = runner.clone();
    async move { runner.start(&RunContext::new()).await }
  });

  spawner.stdout("ready");
  wait_for(&mut rx, "step_data:Log").await;

  runner.stop().await.unwrap();
  assert_eq!(runner.state().await, RunState::Stopped);
  assert_eq!(drain(&mut rx), vec!["state:stopped"]);
  assert!(!task.is_finished());

  // A late natural exit does not reclassify the run.
  spawner.exit(0);
  assert_eq!(task.await.unwrap().unwrap(), RunState::Stopped);
  assert_eq!(drain(&mut rx), vec!["run_ended:stopped"]);
}

#[tokio::test]
async fn test_timeout_while_paused() {
  let spawner = Arc::new(FakeSpawner::new());
  let (runner, mut rx) = runner(spawner.clone());
  let task = tokio::spawn({
    let runner = runner.clone();
    async move { runner.start(&RunContext::new()).await }
  });

  spawner.stdout("ready");
  wait_for(&mut rx, "step_data:Log").await;
  runner.pause().await.unwrap();
  runner.timeout().await.unwrap();

  assert_eq!(task.await.unwrap().unwrap(), RunState::Timeout);
  assert_eq!(spawner.signals(), vec![Signal::Pause, Signal::Kill]);
  assert!(runner.resume().await.is_err());
}

#[tokio::test]
async fn test_spawn_failure_forces_error_state() {
  let spawner = Arc::new(FakeSpawner::failing());
  let (runner, mut rx) = runner(spawner);

  let err = runner.start(&RunContext::new()).await.unwrap_err();

  assert!(matches!(err, ProcessError::Spawn(_)));
  assert_eq!(runner.state().await, RunState::Error);
  assert_eq!(
    drain(&mut rx),
    vec![
      "state:running",
      "run_started",
      "step_data:ErrorLog",
      "state:error",
      "run_ended:error",
    ]
  );
}

#[tokio::test]
async fn test_context_becomes_launch_arguments() {
  let spawner = Arc::new(FakeSpawner::new());
  spawner.exit(0);
  let (runner, _rx) = runner(spawner.clone());
  let context: RunContext = [
    ("user".to_string(), json!("ada")),
    ("retries".to_string(), json!(2)),
    ("debug".to_string(), json!(false)),
  ]
  .into_iter()
  .collect();

  runner.start(&context).await.unwrap();

  let launches = spawner.launches.lock().unwrap();
  assert_eq!(launches.len(), 1);
  assert_eq!(launches[0].program, PathBuf::from("node"));
  assert_eq!(launches[0].cwd, PathBuf::from("/tmp/app"));
  assert_eq!(launches[0].args, vec!["index.js", "-retries=2", "-user=ada"]);
}

#[tokio::test]
async fn test_stop_before_start_is_final() {
  let spawner = Arc::new(FakeSpawner::new());
  let (runner, mut rx) = runner(spawner.clone());

  runner.stop().await.unwrap();
  assert_eq!(runner.state().await, RunState::Stopped);

  let err = runner.start(&RunContext::new()).await.unwrap_err();
  assert!(matches!(err, ProcessError::InvalidTransition { .. }));
  assert!(spawner.launches.lock().unwrap().is_empty());
  assert_eq!(drain(&mut rx), vec!["state:stopped"]);
}

#[tokio::test]
async fn test_pause_before_start_is_rejected() {
  let spawner = Arc::new(FakeSpawner::new());
  let (runner, _rx) = runner(spawner.clone());

  assert!(matches!(
    runner.pause().await,
    Err(ProcessError::InvalidTransition {
      state: RunState::Initial,
      ..
    })
  ));
  assert!(spawner.signals().is_empty());
}

#[test]
fn test_step_code_labels() {
  assert_eq!(
    serde_json::to_value(StepCode::ErrorLog).unwrap(),
    json!("error_log")
  );
}
