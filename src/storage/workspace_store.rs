//! JSON Workspace Store
//!
//! File-backed `WorkspaceRepository`. The whole workspace lives in one JSON
//! document that is replaced atomically: the new content is written next to
//! the target and renamed over it.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use prompt_forge_core::{CoreError, CoreResult, Workspace, WorkspaceRepository};

use crate::utils::error::AppResult;
use crate::utils::paths::workspace_path;

/// Workspace repository backed by a single JSON file
#[derive(Debug, Clone)]
pub struct JsonWorkspaceStore {
    path: PathBuf,
}

impl JsonWorkspaceStore {
    /// Store at ~/.prompt-forge/workspace.json
    pub fn new() -> AppResult<Self> {
        Ok(Self::at(workspace_path()?))
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "workspace.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl WorkspaceRepository for JsonWorkspaceStore {
    async fn load(&self) -> CoreResult<Workspace> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(
                    "[WorkspaceStore] No workspace at {}, starting empty",
                    self.path.display()
                );
                return Ok(Workspace::default());
            }
            Err(e) => return Err(e.into()),
        };

        let mut workspace: Workspace = serde_json::from_slice(&bytes)?;
        let dropped = workspace.repair();
        if !dropped.is_empty() {
            tracing::warn!(
                "[WorkspaceStore] Dropped {} project(s) with empty history: {:?}",
                dropped.len(),
                dropped
            );
        }
        tracing::info!(
            "[WorkspaceStore] Loaded {} project(s) from {}",
            workspace.projects.len(),
            self.path.display()
        );
        Ok(workspace)
    }

    async fn save(&self, workspace: &Workspace) -> CoreResult<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let bytes = serde_json::to_vec_pretty(workspace)?;
        let tmp_path = self.tmp_path();
        tokio::fs::write(&tmp_path, bytes).await?;

        if let Err(rename_err) = tokio::fs::rename(&tmp_path, &self.path).await {
            // Some platforms refuse to rename over an existing file
            if tokio::fs::try_exists(&self.path).await.unwrap_or(false) {
                tokio::fs::remove_file(&self.path).await?;
                tokio::fs::rename(&tmp_path, &self.path).await?;
            } else {
                return Err(CoreError::Io(rename_err));
            }
        }

        tracing::debug!(
            "[WorkspaceStore] Saved {} project(s) to {}",
            workspace.projects.len(),
            self.path.display()
        );
        Ok(())
    }
}
