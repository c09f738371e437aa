//! Conduit Process
//!
//! Runs a compiled program as an isolated OS process and reports its
//! progress.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                     ProcessRunner                        │
//! │  - start(context) → terminal RunState                    │
//! │  - pause / resume / stop / timeout                       │
//! │  - RunState transition table                             │
//! └──────────────────────────────────────────────────────────┘
//!          │ LaunchSpec                   ▲ TransportEvent
//!          ▼                              │
//! ┌──────────────────────────────────────────────────────────┐
//! │                  Spawner / ProcessHandle                 │
//! │  - TokioSpawner: tokio::process + kill(1) signals        │
//! │  - fakes in tests                                        │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Output lines are classified by [`protocol::classify`] and published as
//! [`RunEvent`]s through a [`RunNotifier`].

mod error;
mod event;
pub mod protocol;
mod runner;
mod spawn;
mod state;

pub use error::ProcessError;
pub use event::{
  ChannelNotifier, NoopNotifier, RunEvent, RunNotifier, StepCode, StepData, StepStart,
};
pub use runner::{ProcessRunner, RunContext, RunnerConfig, context_args};
pub use spawn::{
  LaunchSpec, ProcessHandle, Signal, SpawnedProcess, Spawner, StreamKind, TokioSpawner,
  TransportEvent,
};
pub use state::{RunAction, RunState};
