//! Conduit Engine
//!
//! Turns a flow definition into a finished run.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   ExecutionCoordinator                      │
//! │  - run(request) → RunOutcome                                │
//! │  - enqueue_run / cut_in_run through the RunQueue            │
//! │  - pause / resume / stop / timeout on the active run        │
//! └─────────────────────────────────────────────────────────────┘
//!        │ compile          │ materialize          │ spawn
//!        ▼                  ▼                      ▼
//! ┌──────────────┐  ┌───────────────────────┐  ┌───────────────┐
//! │ FlowCompiler │  │ DependencyMaterializer│  │ ProcessRunner │
//! └──────────────┘  └───────────────────────┘  └───────────────┘
//!                                                      │ RunEvent
//!                                                      ▼
//!                                           ExecutionNotifier
//! ```
//!
//! # Usage
//!
//! ```ignore
//! let (notifier, mut events) = ChannelNotifier::channel();
//! let coordinator = ExecutionCoordinator::new(EngineConfig::with_data_dir(data_dir))
//!   .with_notifier(notifier);
//!
//! let outcome = coordinator.run(RunRequest::new("my-app", nodes)).await?;
//! ```

mod config;
mod coordinator;
mod error;
mod events;
mod materialize;
mod metadata;

pub use config::EngineConfig;
pub use coordinator::{ExecutionCoordinator, RunOutcome, RunRequest};
pub use error::{EngineError, MaterializeError};
pub use events::{ChannelNotifier, ExecutionEvent, ExecutionNotifier, NoopNotifier};
pub use materialize::{DependencyMaterializer, FsMaterializer, PROGRAM_FILE};
pub use metadata::{FsMetadata, META_FILE, MetadataProvider, StaticMetadata};
