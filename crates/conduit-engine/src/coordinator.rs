//! Execution coordinator.
//!
//! Wires the pieces of a run together: compile the flow, materialize the
//! program and its step modules, spawn it through a [`ProcessRunner`] and
//! forward its events. At most one run is active per coordinator; runs can
//! be started directly or through the coordinator's [`RunQueue`].

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use conduit_compiler::{CompilerConfig, FlowCompiler};
use conduit_config::CommandNode;
use conduit_process::{ProcessRunner, RunContext, RunState, RunnerConfig, Spawner, TokioSpawner};
use conduit_queue::{Job, RunQueue};
use tokio_util::sync::CancellationToken;
use tracing::{Span, info, instrument, warn};

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::events::{ExecutionNotifier, NoopNotifier, RunForwarder};
use crate::materialize::{DependencyMaterializer, FsMaterializer, PROGRAM_FILE};
use crate::metadata::{FsMetadata, MetadataProvider};

/// One flow run to execute.
#[derive(Debug, Clone)]
pub struct RunRequest {
  pub app_id: String,
  pub nodes: Vec<CommandNode>,
  /// Passed to the program as `-key=value` arguments.
  pub context: RunContext,
  /// Overrides [`EngineConfig::default_timeout_ms`].
  pub timeout_ms: Option<u64>,
}

impl RunRequest {
  pub fn new(app_id: impl Into<String>, nodes: Vec<CommandNode>) -> Self {
    Self {
      app_id: app_id.into(),
      nodes,
      context: RunContext::new(),
      timeout_ms: None,
    }
  }

  pub fn with_context(mut self, context: RunContext) -> Self {
    self.context = context;
    self
  }

  pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
    self.timeout_ms = Some(timeout_ms);
    self
  }
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
  pub run_id: String,
  pub state: RunState,
}

struct ActiveRun {
  run_id: String,
  app_id: String,
  /// Set once the program is ready to spawn.
  runner: Option<ProcessRunner>,
}

/// Releases the active slot when a run finishes or bails out early.
struct ActiveSlot {
  slot: Arc<Mutex<Option<ActiveRun>>>,
  run_id: String,
}

impl Drop for ActiveSlot {
  fn drop(&mut self) {
    if let Ok(mut active) = self.slot.lock() {
      if active.as_ref().is_some_and(|run| run.run_id == self.run_id) {
        *active = None;
      }
    }
  }
}

/// Runs flows, one at a time.
///
/// Cloning yields another handle to the same coordinator, so one task can
/// await [`run`](Self::run) while another pauses or stops it.
#[derive(Clone)]
pub struct ExecutionCoordinator {
  config: Arc<EngineConfig>,
  compiler: FlowCompiler,
  materializer: Arc<dyn DependencyMaterializer>,
  metadata: Arc<dyn MetadataProvider>,
  spawner: Arc<dyn Spawner>,
  notifier: Arc<dyn ExecutionNotifier>,
  queue: RunQueue,
  active: Arc<Mutex<Option<ActiveRun>>>,
}

impl ExecutionCoordinator {
  /// A coordinator backed by the filesystem and real processes, with
  /// events discarded.
  pub fn new(config: EngineConfig) -> Self {
    let compiler = FlowCompiler::new(CompilerConfig {
      group_root: config.group_root.clone(),
    });
    Self {
      materializer: Arc::new(FsMaterializer::new(&config.workspace_root)),
      metadata: Arc::new(FsMetadata::new(&config.workspace_root)),
      spawner: Arc::new(TokioSpawner),
      notifier: Arc::new(NoopNotifier),
      queue: RunQueue::new(),
      active: Arc::new(Mutex::new(None)),
      compiler,
      config: Arc::new(config),
    }
  }

  pub fn with_notifier(mut self, notifier: impl ExecutionNotifier + 'static) -> Self {
    self.notifier = Arc::new(notifier);
    self
  }

  pub fn with_spawner(mut self, spawner: Arc<dyn Spawner>) -> Self {
    self.spawner = spawner;
    self
  }

  pub fn with_materializer(mut self, materializer: impl DependencyMaterializer + 'static) -> Self {
    self.materializer = Arc::new(materializer);
    self
  }

  pub fn with_metadata(mut self, metadata: impl MetadataProvider + 'static) -> Self {
    self.metadata = Arc::new(metadata);
    self
  }

  pub fn config(&self) -> &EngineConfig {
    &self.config
  }

  pub fn queue(&self) -> &RunQueue {
    &self.queue
  }

  /// Id of the run currently in progress, if any.
  pub fn active_run_id(&self) -> Option<String> {
    self
      .active
      .lock()
      .unwrap()
      .as_ref()
      .map(|run| run.run_id.clone())
  }

  /// Compile, materialize and run a flow to completion.
  ///
  /// Compile and dependency errors are returned before anything is
  /// spawned. A run that was spawned returns its terminal state, including
  /// `Error`, as an `Ok` outcome.
  #[instrument(
    name = "coordinator_run",
    skip(self, request),
    fields(
      app_id = %request.app_id,
      run_id = tracing::field::Empty,
    )
  )]
  pub async fn run(&self, request: RunRequest) -> Result<RunOutcome, EngineError> {
    let run_id = uuid::Uuid::new_v4().to_string();
    Span::current().record("run_id", run_id.as_str());
    let _slot = self.reserve(&run_id, &request.app_id)?;

    let program = self.compiler.compile(&request.nodes)?;
    let app_dir = self
      .materializer
      .materialize(&request.app_id, &program)
      .await?;
    let meta = self.metadata.app_meta(&request.app_id).await;

    let runner = ProcessRunner::new(
      RunnerConfig {
        interpreter: self.config.interpreter.clone(),
        entry: PathBuf::from(PROGRAM_FILE),
        cwd: app_dir,
        meta,
      },
      self.spawner.clone(),
      Arc::new(RunForwarder::new(&request.app_id, &run_id, self.notifier.clone())),
    );
    if let Some(active) = self.active.lock().unwrap().as_mut() {
      active.runner = Some(runner.clone());
    }

    let cancel = CancellationToken::new();
    if let Some(timeout_ms) = request.timeout_ms.or(self.config.default_timeout_ms) {
      spawn_timeout(runner.clone(), timeout_ms, cancel.clone());
    }

    let result = runner.start(&request.context).await;
    cancel.cancel();
    runner.dispose().await;

    let state = result?;
    info!(state = %state, "run finished");
    Ok(RunOutcome { run_id, state })
  }

  /// Queue a run behind everything already waiting.
  pub fn enqueue_run(&self, request: RunRequest) {
    self.queue.enqueue(self.job(request));
  }

  /// Queue a run ahead of everything waiting, e.g. a scheduled run.
  pub fn cut_in_run(&self, request: RunRequest) {
    self.queue.cut_in_queue(self.job(request));
  }

  /// Suspend the active run. Only legal while it is `Running`.
  pub async fn pause(&self) -> Result<(), EngineError> {
    self.active_runner()?.pause().await?;
    Ok(())
  }

  /// Continue the active run. Only legal while it is `Paused`.
  pub async fn resume(&self) -> Result<(), EngineError> {
    self.active_runner()?.resume().await?;
    Ok(())
  }

  /// End the active run as `Stopped`.
  pub async fn stop(&self) -> Result<(), EngineError> {
    self.active_runner()?.stop().await?;
    Ok(())
  }

  /// End the active run as `Timeout`.
  pub async fn timeout(&self) -> Result<(), EngineError> {
    self.active_runner()?.timeout().await?;
    Ok(())
  }

  fn reserve(&self, run_id: &str, app_id: &str) -> Result<ActiveSlot, EngineError> {
    let mut active = self.active.lock().unwrap();
    if let Some(current) = active.as_ref() {
      warn!(active_app_id = %current.app_id, "run rejected, another run is active");
      return Err(EngineError::RunInProgress {
        run_id: current.run_id.clone(),
      });
    }
    *active = Some(ActiveRun {
      run_id: run_id.to_string(),
      app_id: app_id.to_string(),
      runner: None,
    });
    Ok(ActiveSlot {
      slot: self.active.clone(),
      run_id: run_id.to_string(),
    })
  }

  fn active_runner(&self) -> Result<ProcessRunner, EngineError> {
    self
      .active
      .lock()
      .unwrap()
      .as_ref()
      .and_then(|run| run.runner.clone())
      .ok_or(EngineError::NoActiveRun)
  }

  fn job(&self, request: RunRequest) -> Job {
    let coordinator = self.clone();
    Box::pin(async move {
      coordinator.run(request).await?;
      Ok(())
    })
  }
}

fn spawn_timeout(runner: ProcessRunner, timeout_ms: u64, cancel: CancellationToken) {
  tokio::spawn(async move {
    tokio::select! {
      _ = cancel.cancelled() => {}
      _ = tokio::time::sleep(Duration::from_millis(timeout_ms)) => {
        if runner.state().await.is_terminal() {
          return;
        }
        warn!(timeout_ms, "run timed out");
        if let Err(e) = runner.timeout().await {
          warn!(error = %e, "failed to time out run");
        }
      }
    }
  });
}
