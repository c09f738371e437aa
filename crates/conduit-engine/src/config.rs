use std::path::{Path, PathBuf};

/// Configuration for the execution coordinator.
#[derive(Debug, Clone)]
pub struct EngineConfig {
  /// Root of app workspaces. Each app lives in `<root>/<app_id>/`.
  pub workspace_root: PathBuf,
  /// Root of installed component groups (`<root>/<groupKey>/v<version>`).
  pub group_root: PathBuf,
  /// Interpreter used to run compiled programs.
  pub interpreter: PathBuf,
  /// Timeout applied to runs that do not set their own.
  pub default_timeout_ms: Option<u64>,
}

impl EngineConfig {
  /// Config rooted at `data_dir`, with `apps/` and `groups/` below it.
  pub fn with_data_dir(data_dir: impl AsRef<Path>) -> Self {
    let data_dir = data_dir.as_ref();
    Self {
      workspace_root: data_dir.join("apps"),
      group_root: data_dir.join("groups"),
      interpreter: PathBuf::from("node"),
      default_timeout_ms: None,
    }
  }

  pub fn app_dir(&self, app_id: &str) -> PathBuf {
    self.workspace_root.join(app_id)
  }
}
