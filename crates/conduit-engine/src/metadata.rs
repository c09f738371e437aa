//! App metadata attached to run start/end events.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::Value;
use tracing::warn;

/// File holding an app's display metadata inside its directory.
pub const META_FILE: &str = "meta.json";

#[async_trait]
pub trait MetadataProvider: Send + Sync {
  /// Metadata for `app_id`, if any is known.
  async fn app_meta(&self, app_id: &str) -> Option<Value>;
}

/// Metadata held in memory.
#[derive(Debug, Clone, Default)]
pub struct StaticMetadata {
  entries: HashMap<String, Value>,
}

impl StaticMetadata {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with(mut self, app_id: impl Into<String>, meta: Value) -> Self {
    self.entries.insert(app_id.into(), meta);
    self
  }
}

#[async_trait]
impl MetadataProvider for StaticMetadata {
  async fn app_meta(&self, app_id: &str) -> Option<Value> {
    self.entries.get(app_id).cloned()
  }
}

/// Reads `<workspace_root>/<app_id>/meta.json`.
#[derive(Debug, Clone)]
pub struct FsMetadata {
  workspace_root: PathBuf,
}

impl FsMetadata {
  pub fn new(workspace_root: impl Into<PathBuf>) -> Self {
    Self {
      workspace_root: workspace_root.into(),
    }
  }
}

#[async_trait]
impl MetadataProvider for FsMetadata {
  async fn app_meta(&self, app_id: &str) -> Option<Value> {
    let path = self.workspace_root.join(app_id).join(META_FILE);
    let contents = tokio::fs::read_to_string(&path).await.ok()?;
    match serde_json::from_str(&contents) {
      Ok(meta) => Some(meta),
      Err(e) => {
        warn!(app_id, path = %path.display(), error = %e, "ignoring unreadable app metadata");
        None
      }
    }
  }
}
