//! Dependency materialization.
//!
//! Before a run is spawned, the compiled program and everything it loads
//! must exist on disk:
//!
//! ```text
//! <workspace_root>/<app_id>/
//!   index.js              compiled program
//!   global.json           global registry (created empty if absent)
//!   components/<id>/
//!     index.js            step wrapper
//!     code.js             step source
//! ```
//!
//! Group modules are installed separately; they are only checked for.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use conduit_compiler::{
  COMPONENTS_DIR, CompiledProgram, GLOBAL_FILE, STEP_CODE_FILE, STEP_INDEX_FILE,
  render_step_module,
};
use tracing::debug;

use crate::error::MaterializeError;

/// File name of the compiled program inside an app directory.
pub const PROGRAM_FILE: &str = "index.js";

#[async_trait]
pub trait DependencyMaterializer: Send + Sync {
  /// Ensure `program` and its dependencies are in place for `app_id`.
  /// Returns the directory the program must run in.
  async fn materialize(
    &self,
    app_id: &str,
    program: &CompiledProgram,
  ) -> Result<PathBuf, MaterializeError>;
}

/// Writes apps below a workspace root on the local filesystem.
#[derive(Debug, Clone)]
pub struct FsMaterializer {
  workspace_root: PathBuf,
}

impl FsMaterializer {
  pub fn new(workspace_root: impl Into<PathBuf>) -> Self {
    Self {
      workspace_root: workspace_root.into(),
    }
  }
}

#[async_trait]
impl DependencyMaterializer for FsMaterializer {
  async fn materialize(
    &self,
    app_id: &str,
    program: &CompiledProgram,
  ) -> Result<PathBuf, MaterializeError> {
    check_segment(app_id)?;
    for group in &program.dependencies.groups {
      let installed = tokio::fs::try_exists(&group.local_path)
        .await
        .unwrap_or(false);
      if !installed {
        return Err(MaterializeError::DependencyMissing {
          group_key: group.group_key.clone(),
          version: group.version.clone(),
          path: group.local_path.clone(),
        });
      }
    }

    let app_dir = self.workspace_root.join(app_id);
    create_dir(&app_dir).await?;
    write(&app_dir.join(PROGRAM_FILE), &program.source).await?;

    for (id, code) in &program.dependencies.inline_code {
      check_segment(id)?;
      let step_dir = app_dir.join(COMPONENTS_DIR).join(id);
      create_dir(&step_dir).await?;
      write(&step_dir.join(STEP_CODE_FILE), &code.source).await?;
      write(&step_dir.join(STEP_INDEX_FILE), &render_step_module(&code.meta)?).await?;
    }

    let global = app_dir.join(GLOBAL_FILE);
    if !tokio::fs::try_exists(&global).await.unwrap_or(false) {
      write(&global, "{}").await?;
    }

    debug!(
      app_id,
      app_dir = %app_dir.display(),
      steps = program.dependencies.inline_code.len(),
      "app materialized"
    );
    Ok(app_dir)
  }
}

fn check_segment(name: &str) -> Result<(), MaterializeError> {
  let mut components = Path::new(name).components();
  let single_normal = matches!(
    (components.next(), components.next()),
    (Some(std::path::Component::Normal(_)), None)
  );
  if single_normal {
    Ok(())
  } else {
    Err(MaterializeError::InvalidName {
      name: name.to_string(),
    })
  }
}

async fn create_dir(path: &Path) -> Result<(), MaterializeError> {
  tokio::fs::create_dir_all(path)
    .await
    .map_err(|source| MaterializeError::Io {
      path: path.to_path_buf(),
      source,
    })
}

async fn write(path: &Path, contents: &str) -> Result<(), MaterializeError> {
  tokio::fs::write(path, contents)
    .await
    .map_err(|source| MaterializeError::Io {
      path: path.to_path_buf(),
      source,
    })
}
