//! Process transport.
//!
//! The runner never touches OS processes directly. A [`Spawner`] launches
//! the program and hands back a [`ProcessHandle`] for signalling plus a
//! channel of [`TransportEvent`]s: every output line, then one `Exited`.
//! Tests drive the runner with a scripted spawner instead of a real process.

use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::ProcessError;

/// What to launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
  pub program: PathBuf,
  pub args: Vec<String>,
  pub cwd: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
  /// Suspend the process (`SIGSTOP`).
  Pause,
  /// Continue a suspended process (`SIGCONT`).
  Resume,
  /// Terminate immediately (`SIGKILL`).
  Kill,
}

impl Signal {
  pub fn name(&self) -> &'static str {
    match self {
      Signal::Pause => "STOP",
      Signal::Resume => "CONT",
      Signal::Kill => "KILL",
    }
  }
}

impl fmt::Display for Signal {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "SIG{}", self.name())
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
  Stdout,
  Stderr,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
  Line { stream: StreamKind, line: String },
  /// The process has exited. Sent once, after all output lines.
  Exited { code: Option<i32> },
}

pub struct SpawnedProcess {
  pub handle: Arc<dyn ProcessHandle>,
  pub events: mpsc::UnboundedReceiver<TransportEvent>,
}

#[async_trait]
pub trait Spawner: Send + Sync {
  async fn spawn(&self, spec: &LaunchSpec) -> Result<SpawnedProcess, ProcessError>;
}

#[async_trait]
pub trait ProcessHandle: Send + Sync {
  /// OS process id, when there is one.
  fn id(&self) -> Option<u32>;

  async fn signal(&self, signal: Signal) -> Result<(), ProcessError>;
}

/// How long output may keep arriving after the process has exited.
const OUTPUT_DRAIN: Duration = Duration::from_millis(500);

/// Spawns real OS processes with `tokio::process`.
#[derive(Debug, Clone, Default)]
pub struct TokioSpawner;

#[async_trait]
impl Spawner for TokioSpawner {
  async fn spawn(&self, spec: &LaunchSpec) -> Result<SpawnedProcess, ProcessError> {
    let mut child = Command::new(&spec.program)
      .args(&spec.args)
      .current_dir(&spec.cwd)
      .stdin(Stdio::null())
      .stdout(Stdio::piped())
      .stderr(Stdio::piped())
      .spawn()
      .map_err(ProcessError::Spawn)?;

    let pid = child.id();
    debug!(pid, program = %spec.program.display(), "process spawned");

    let (tx, events) = mpsc::unbounded_channel();
    let stdout = child.stdout.take().map(|s| forward_lines(s, StreamKind::Stdout, tx.clone()));
    let stderr = child.stderr.take().map(|s| forward_lines(s, StreamKind::Stderr, tx.clone()));

    let exited = Arc::new(AtomicBool::new(false));
    let exited_flag = exited.clone();
    tokio::spawn(async move {
      let code = match child.wait().await {
        Ok(status) => status.code(),
        Err(e) => {
          warn!(pid, error = %e, "failed to wait for process");
          None
        }
      };
      exited_flag.store(true, Ordering::SeqCst);
      debug!(pid, code, "process exited");

      // A grandchild may inherit the pipes and keep them open after the
      // process is gone, so output gets a bounded drain before Exited.
      let deadline = Instant::now() + OUTPUT_DRAIN;
      for mut reader in [stdout, stderr].into_iter().flatten() {
        if tokio::time::timeout_at(deadline, &mut reader).await.is_err() {
          debug!(pid, "output still open after exit, dropping reader");
          reader.abort();
        }
      }
      let _ = tx.send(TransportEvent::Exited { code });
    });

    Ok(SpawnedProcess {
      handle: Arc::new(TokioHandle { pid, exited }),
      events,
    })
  }
}

fn forward_lines<R>(
  reader: R,
  stream: StreamKind,
  tx: mpsc::UnboundedSender<TransportEvent>,
) -> tokio::task::JoinHandle<()>
where
  R: AsyncRead + Unpin + Send + 'static,
{
  tokio::spawn(async move {
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
      if tx.send(TransportEvent::Line { stream, line }).is_err() {
        break;
      }
    }
  })
}

struct TokioHandle {
  pid: Option<u32>,
  exited: Arc<AtomicBool>,
}

#[async_trait]
impl ProcessHandle for TokioHandle {
  fn id(&self) -> Option<u32> {
    self.pid
  }

  async fn signal(&self, signal: Signal) -> Result<(), ProcessError> {
    // The pid may already belong to another process once ours is reaped.
    let Some(pid) = self.pid.filter(|_| !self.exited.load(Ordering::SeqCst)) else {
      return Ok(());
    };
    send_signal(pid, signal).await
  }
}

#[cfg(unix)]
async fn send_signal(pid: u32, signal: Signal) -> Result<(), ProcessError> {
  let output = Command::new("kill")
    .arg(format!("-{}", signal.name()))
    .arg(pid.to_string())
    .output()
    .await
    .map_err(|e| ProcessError::Signal {
      signal,
      pid,
      message: e.to_string(),
    })?;
  if output.status.success() {
    Ok(())
  } else {
    Err(ProcessError::Signal {
      signal,
      pid,
      message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    })
  }
}

#[cfg(windows)]
async fn send_signal(pid: u32, signal: Signal) -> Result<(), ProcessError> {
  match signal {
    Signal::Kill => {
      let status = Command::new("taskkill")
        .args(["/PID", &pid.to_string(), "/F"])
        .status()
        .await
        .map_err(|e| ProcessError::Signal {
          signal,
          pid,
          message: e.to_string(),
        })?;
      if status.success() {
        Ok(())
      } else {
        Err(ProcessError::Signal {
          signal,
          pid,
          message: format!("taskkill exited with {}", status),
        })
      }
    }
    Signal::Pause | Signal::Resume => Err(ProcessError::Signal {
      signal,
      pid,
      message: "suspend/continue is not supported on this platform".to_string(),
    }),
  }
}
