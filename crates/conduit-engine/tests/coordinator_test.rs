//! ExecutionCoordinator tests against a fake spawner.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use conduit_compiler::CompileError;
use conduit_config::{CommandNode, parse_flow};
use conduit_engine::{
  ChannelNotifier, EngineConfig, EngineError, ExecutionCoordinator, ExecutionEvent,
  MaterializeError, RunRequest,
};
use conduit_process::{
  LaunchSpec, ProcessError, ProcessHandle, RunEvent, RunState, Signal, SpawnedProcess, Spawner,
  StreamKind, TransportEvent,
};
use serde_json::json;
use tokio::sync::mpsc;

/// Spawner whose processes print a step start, then either finish the step
/// and exit, or (for apps listed in `hang`) print `ready` and wait to be
/// killed.
#[derive(Default)]
struct FakeSpawner {
  hang: Vec<&'static str>,
  launches: Mutex<Vec<LaunchSpec>>,
  signals: Arc<Mutex<Vec<Signal>>>,
}

impl FakeSpawner {
  fn hanging(apps: &[&'static str]) -> Self {
    Self {
      hang: apps.to_vec(),
      ..Self::default()
    }
  }

  fn launched_apps(&self) -> Vec<String> {
    self
      .launches
      .lock()
      .unwrap()
      .iter()
      .map(|spec| spec.cwd.file_name().unwrap().to_string_lossy().into_owned())
      .collect()
  }

  fn signals(&self) -> Vec<Signal> {
    self.signals.lock().unwrap().clone()
  }
}

fn line(line: &str) -> TransportEvent {
  TransportEvent::Line {
    stream: StreamKind::Stdout,
    line: line.to_string(),
  }
}

#[async_trait]
impl Spawner for FakeSpawner {
  async fn spawn(&self, spec: &LaunchSpec) -> Result<SpawnedProcess, ProcessError> {
    self.launches.lock().unwrap().push(spec.clone());
    let (script, events) = mpsc::unbounded_channel();
    script
      .send(line(r#"{"startTime":1,"inputs":{},"info":{"id":"s1"},"meta":{}}"#))
      .unwrap();
    if self.hang.iter().any(|app| spec.cwd.ends_with(app)) {
      script.send(line("ready")).unwrap();
    } else {
      script.send(line(r#"{"endTime":2,"result":1}"#)).unwrap();
      script.send(TransportEvent::Exited { code: Some(0) }).unwrap();
    }
    Ok(SpawnedProcess {
      handle: Arc::new(FakeHandle {
        signals: self.signals.clone(),
        script,
      }),
      events,
    })
  }
}

struct FakeHandle {
  signals: Arc<Mutex<Vec<Signal>>>,
  script: mpsc::UnboundedSender<TransportEvent>,
}

#[async_trait]
impl ProcessHandle for FakeHandle {
  fn id(&self) -> Option<u32> {
    Some(7)
  }

  async fn signal(&self, signal: Signal) -> Result<(), ProcessError> {
    self.signals.lock().unwrap().push(signal);
    if signal == Signal::Kill {
      let _ = self.script.send(TransportEvent::Exited { code: None });
    }
    Ok(())
  }
}

fn code_flow() -> Vec<CommandNode> {
  parse_flow(
    &json!([{
      "type": "code",
      "id": "s1",
      "name": "Step",
      "code": "module.exports = async () => 1;"
    }])
    .to_string(),
  )
  .unwrap()
}

fn setup(
  data_dir: &Path,
  spawner: Arc<FakeSpawner>,
) -> (ExecutionCoordinator, mpsc::UnboundedReceiver<ExecutionEvent>) {
  let (notifier, events) = ChannelNotifier::channel();
  let coordinator = ExecutionCoordinator::new(EngineConfig::with_data_dir(data_dir))
    .with_spawner(spawner)
    .with_notifier(notifier);
  (coordinator, events)
}

fn label(event: &RunEvent) -> String {
  match event {
    RunEvent::StateChanged { state } => format!("state:{}", state),
    RunEvent::RunStarted { .. } => "run_started".to_string(),
    RunEvent::StepStarted(_) => "step_started".to_string(),
    RunEvent::StepData(data) => format!("step_data:{:?}", data.code),
    RunEvent::RunEnded { state, .. } => format!("run_ended:{}", state),
  }
}

fn drain(events: &mut mpsc::UnboundedReceiver<ExecutionEvent>) -> Vec<ExecutionEvent> {
  let mut out = Vec::new();
  while let Ok(event) = events.try_recv() {
    out.push(event);
  }
  out
}

/// Wait until the app prints its `ready` line.
async fn wait_ready(events: &mut mpsc::UnboundedReceiver<ExecutionEvent>, app_id: &str) {
  tokio::time::timeout(Duration::from_secs(5), async {
    while let Some(event) = events.recv().await {
      let ready = matches!(&event.event, RunEvent::StepData(data) if data.payload == "ready");
      if event.app_id == app_id && ready {
        return;
      }
    }
    panic!("event channel closed");
  })
  .await
  .expect("app never became ready");
}

#[tokio::test]
async fn test_run_materializes_and_reports_events() {
  let temp_dir = tempfile::tempdir().unwrap();
  let app_dir = temp_dir.path().join("apps/demo");
  std::fs::create_dir_all(&app_dir).unwrap();
  std::fs::write(app_dir.join("meta.json"), r#"{"name":"Demo"}"#).unwrap();
  let spawner = Arc::new(FakeSpawner::default());
  let (coordinator, mut events) = setup(temp_dir.path(), spawner.clone());

  let outcome = coordinator
    .run(RunRequest::new("demo", code_flow()))
    .await
    .unwrap();

  assert_eq!(outcome.state, RunState::Success);
  assert!(app_dir.join("index.js").exists());
  assert!(app_dir.join("components/s1/code.js").exists());
  assert!(app_dir.join("components/s1/index.js").exists());

  let launches = spawner.launches.lock().unwrap().clone();
  assert_eq!(launches.len(), 1);
  assert_eq!(launches[0].program, Path::new("node"));
  assert_eq!(launches[0].args, vec!["index.js"]);
  assert_eq!(launches[0].cwd, app_dir);

  let events = drain(&mut events);
  assert!(
    events
      .iter()
      .all(|e| e.app_id == "demo" && e.run_id == outcome.run_id)
  );
  let labels: Vec<String> = events.iter().map(|e| label(&e.event)).collect();
  assert_eq!(
    labels,
    vec![
      "state:running",
      "run_started",
      "step_started",
      "step_data:Success",
      "state:success",
      "run_ended:success",
    ]
  );
  assert!(matches!(
    &events[1].event,
    RunEvent::RunStarted { meta: Some(meta), .. } if meta == &json!({ "name": "Demo" })
  ));
  assert_eq!(coordinator.active_run_id(), None);
}

#[tokio::test]
async fn test_context_reaches_program_arguments() {
  let temp_dir = tempfile::tempdir().unwrap();
  let spawner = Arc::new(FakeSpawner::default());
  let (coordinator, _events) = setup(temp_dir.path(), spawner.clone());

  let context = [("mode".to_string(), json!("fast")), ("dry".to_string(), json!(false))]
    .into_iter()
    .collect();
  coordinator
    .run(RunRequest::new("demo", code_flow()).with_context(context))
    .await
    .unwrap();

  let launches = spawner.launches.lock().unwrap().clone();
  assert_eq!(launches[0].args, vec!["index.js", "-mode=fast"]);
}

#[tokio::test]
async fn test_compile_error_spawns_nothing() {
  let temp_dir = tempfile::tempdir().unwrap();
  let spawner = Arc::new(FakeSpawner::default());
  let (coordinator, mut events) = setup(temp_dir.path(), spawner.clone());
  let nodes = parse_flow(
    &json!([{
      "type": "elseif",
      "id": "c1",
      "leftSrcType": "input",
      "leftValue": "1",
      "operator": "==",
      "rightSrcType": "input",
      "rightValue": "1"
    }])
    .to_string(),
  )
  .unwrap();

  let err = coordinator
    .run(RunRequest::new("demo", nodes))
    .await
    .unwrap_err();

  assert!(matches!(
    err,
    EngineError::Compile(CompileError::BranchOrder { ref node_id }) if node_id.as_deref() == Some("c1")
  ));
  assert!(spawner.launched_apps().is_empty());
  assert!(drain(&mut events).is_empty());
  assert!(!temp_dir.path().join("apps/demo").exists());
  assert_eq!(coordinator.active_run_id(), None);
}

#[tokio::test]
async fn test_missing_group_spawns_nothing() {
  let temp_dir = tempfile::tempdir().unwrap();
  let spawner = Arc::new(FakeSpawner::default());
  let (coordinator, _events) = setup(temp_dir.path(), spawner.clone());
  let nodes = parse_flow(
    &json!([{
      "type": "component",
      "id": "n1",
      "group": "math",
      "func": "sum",
      "version": "3"
    }])
    .to_string(),
  )
  .unwrap();

  let err = coordinator
    .run(RunRequest::new("demo", nodes))
    .await
    .unwrap_err();

  assert!(matches!(
    err,
    EngineError::Materialize(MaterializeError::DependencyMissing { ref version, .. }) if version == "3"
  ));
  assert!(spawner.launched_apps().is_empty());
}

#[tokio::test]
async fn test_control_without_active_run() {
  let temp_dir = tempfile::tempdir().unwrap();
  let (coordinator, _events) = setup(temp_dir.path(), Arc::new(FakeSpawner::default()));

  assert!(matches!(coordinator.pause().await, Err(EngineError::NoActiveRun)));
  assert!(matches!(coordinator.resume().await, Err(EngineError::NoActiveRun)));
  assert!(matches!(coordinator.stop().await, Err(EngineError::NoActiveRun)));
  assert!(matches!(coordinator.timeout().await, Err(EngineError::NoActiveRun)));
}

#[tokio::test]
async fn test_pause_resume_stop_active_run() {
  let temp_dir = tempfile::tempdir().unwrap();
  let spawner = Arc::new(FakeSpawner::hanging(&["demo"]));
  let (coordinator, mut events) = setup(temp_dir.path(), spawner.clone());

  let run = tokio::spawn({
    let coordinator = coordinator.clone();
    async move { coordinator.run(RunRequest::new("demo", code_flow())).await }
  });
  wait_ready(&mut events, "demo").await;

  coordinator.pause().await.unwrap();
  assert!(matches!(
    coordinator.pause().await,
    Err(EngineError::Process(ProcessError::InvalidTransition { .. }))
  ));

  let active = coordinator.active_run_id().unwrap();
  let err = coordinator
    .run(RunRequest::new("other", code_flow()))
    .await
    .unwrap_err();
  assert!(matches!(err, EngineError::RunInProgress { ref run_id } if *run_id == active));

  coordinator.resume().await.unwrap();
  coordinator.stop().await.unwrap();

  let outcome = run.await.unwrap().unwrap();
  assert_eq!(outcome.run_id, active);
  assert_eq!(outcome.state, RunState::Stopped);
  assert_eq!(spawner.signals(), vec![Signal::Pause, Signal::Resume, Signal::Kill]);
  assert_eq!(spawner.launched_apps(), vec!["demo"]);
  assert_eq!(coordinator.active_run_id(), None);
}

#[tokio::test]
async fn test_request_timeout_ends_run() {
  let temp_dir = tempfile::tempdir().unwrap();
  let spawner = Arc::new(FakeSpawner::hanging(&["demo"]));
  let (coordinator, _events) = setup(temp_dir.path(), spawner.clone());

  let outcome = tokio::time::timeout(
    Duration::from_secs(5),
    coordinator.run(RunRequest::new("demo", code_flow()).with_timeout_ms(50)),
  )
  .await
  .expect("run did not time out")
  .unwrap();

  assert_eq!(outcome.state, RunState::Timeout);
  assert_eq!(spawner.signals(), vec![Signal::Kill]);
}

#[tokio::test]
async fn test_default_timeout_from_config() {
  let temp_dir = tempfile::tempdir().unwrap();
  let spawner = Arc::new(FakeSpawner::hanging(&["demo"]));
  let mut config = EngineConfig::with_data_dir(temp_dir.path());
  config.default_timeout_ms = Some(50);
  let coordinator = ExecutionCoordinator::new(config).with_spawner(spawner.clone());

  let outcome = tokio::time::timeout(
    Duration::from_secs(5),
    coordinator.run(RunRequest::new("demo", code_flow())),
  )
  .await
  .expect("run did not time out")
  .unwrap();

  assert_eq!(outcome.state, RunState::Timeout);
}

#[tokio::test]
async fn test_timeout_is_cancelled_when_run_finishes() {
  let temp_dir = tempfile::tempdir().unwrap();
  let spawner = Arc::new(FakeSpawner::default());
  let (coordinator, _events) = setup(temp_dir.path(), spawner.clone());

  let outcome = coordinator
    .run(RunRequest::new("demo", code_flow()).with_timeout_ms(20))
    .await
    .unwrap();
  tokio::time::sleep(Duration::from_millis(60)).await;

  assert_eq!(outcome.state, RunState::Success);
  assert!(spawner.signals().is_empty());
}

#[tokio::test]
async fn test_cut_in_run_goes_next() {
  let temp_dir = tempfile::tempdir().unwrap();
  let spawner = Arc::new(FakeSpawner::hanging(&["first"]));
  let (coordinator, mut events) = setup(temp_dir.path(), spawner.clone());

  coordinator.enqueue_run(RunRequest::new("first", code_flow()));
  coordinator.enqueue_run(RunRequest::new("manual", code_flow()));
  coordinator.cut_in_run(RunRequest::new("scheduled", code_flow()));
  assert_eq!(coordinator.queue().size(), 2);

  wait_ready(&mut events, "first").await;
  coordinator.stop().await.unwrap();
  tokio::time::timeout(Duration::from_secs(5), coordinator.queue().wait_idle())
    .await
    .expect("queue did not drain");

  assert_eq!(spawner.launched_apps(), vec!["first", "scheduled", "manual"]);
  let ended: Vec<(String, String)> = drain(&mut events)
    .into_iter()
    .filter_map(|e| match e.event {
      RunEvent::RunEnded { state, .. } => Some((e.app_id, state.to_string())),
      _ => None,
    })
    .collect();
  assert_eq!(
    ended,
    vec![
      ("first".to_string(), "stopped".to_string()),
      ("scheduled".to_string(), "success".to_string()),
      ("manual".to_string(), "success".to_string()),
    ]
  );
}
