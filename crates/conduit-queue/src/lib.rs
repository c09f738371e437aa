//! Conduit Queue
//!
//! A FIFO of asynchronous jobs that runs at most one job at a time.
//!
//! Jobs added with [`RunQueue::enqueue`] wait their turn behind everything
//! already queued. [`RunQueue::cut_in_queue`] puts a job at the head instead,
//! so it runs next, after whatever job is currently executing.
//!
//! When a job finishes, successfully, with an error or by panicking, the
//! next one is dequeued automatically. Failures are logged and never stop
//! the queue.

use std::collections::VecDeque;
use std::error::Error;
use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;
use tokio::sync::Notify;
use tracing::{debug, error};

pub type JobResult = Result<(), Box<dyn Error + Send + Sync>>;

/// An opaque unit of work.
pub type Job = BoxFuture<'static, JobResult>;

struct QueueState {
  jobs: VecDeque<Job>,
  running: bool,
}

struct QueueInner {
  state: Mutex<QueueState>,
  idle: Notify,
}

/// Single-concurrency job queue. Clones share the same queue.
///
/// Must be used from within a tokio runtime.
#[derive(Clone)]
pub struct RunQueue {
  inner: Arc<QueueInner>,
}

impl RunQueue {
  pub fn new() -> Self {
    Self {
      inner: Arc::new(QueueInner {
        state: Mutex::new(QueueState {
          jobs: VecDeque::new(),
          running: false,
        }),
        idle: Notify::new(),
      }),
    }
  }

  /// Append a job to the back of the queue.
  pub fn enqueue(&self, job: Job) {
    self.inner.state.lock().unwrap().jobs.push_back(job);
    self.drain();
  }

  /// Put a job at the head of the queue.
  pub fn cut_in_queue(&self, job: Job) {
    self.inner.state.lock().unwrap().jobs.push_front(job);
    self.drain();
  }

  /// Whether no jobs are waiting. A job may still be executing.
  pub fn is_empty(&self) -> bool {
    self.inner.state.lock().unwrap().jobs.is_empty()
  }

  /// Number of waiting jobs, not counting the one executing.
  pub fn size(&self) -> usize {
    self.inner.state.lock().unwrap().jobs.len()
  }

  pub fn is_running(&self) -> bool {
    self.inner.state.lock().unwrap().running
  }

  /// Resolves once nothing is executing and nothing is waiting.
  pub async fn wait_idle(&self) {
    loop {
      let notified = self.inner.idle.notified();
      tokio::pin!(notified);
      notified.as_mut().enable();
      if self.is_idle() {
        return;
      }
      notified.await;
    }
  }

  fn is_idle(&self) -> bool {
    let state = self.inner.state.lock().unwrap();
    !state.running && state.jobs.is_empty()
  }

  /// Start the next job unless one is already executing.
  fn drain(&self) {
    let job = {
      let mut state = self.inner.state.lock().unwrap();
      if state.running {
        return;
      }
      let Some(job) = state.jobs.pop_front() else {
        drop(state);
        self.inner.idle.notify_waiters();
        return;
      };
      state.running = true;
      job
    };

    let queue = self.clone();
    tokio::spawn(async move {
      // Run in its own task so a panic is contained to the job.
      match tokio::spawn(job).await {
        Ok(Ok(())) => debug!("queued job finished"),
        Ok(Err(e)) => error!(error = %e, "queued job failed"),
        Err(e) => error!(error = %e, "queued job panicked"),
      }
      queue.inner.state.lock().unwrap().running = false;
      queue.drain();
    });
  }
}

impl Default for RunQueue {
  fn default() -> Self {
    Self::new()
  }
}
