//! History Store
//!
//! Owns every project of the workspace and serializes all history mutation
//! behind one lock, so each commit is a complete read-modify-write.

use prompt_forge_core::{Project, ProjectSummary, StateSnapshot, Workspace};
use serde::Serialize;
use tokio::sync::RwLock;

use crate::utils::error::{AppError, AppResult};

/// Listing entry for one stored version.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionSummary {
    pub index: usize,
    pub name: String,
    pub message_count: usize,
    pub file_count: usize,
    pub is_current: bool,
}

/// In-memory projects with linear version history.
pub struct HistoryStore {
    projects: RwLock<Vec<Project>>,
    history_cap: usize,
}

impl HistoryStore {
    pub fn new(history_cap: usize) -> Self {
        Self {
            projects: RwLock::new(Vec::new()),
            history_cap: history_cap.max(1),
        }
    }

    /// Rebuild from a loaded workspace, dropping unusable projects.
    ///
    /// The configured cap replaces the cap each history was saved with.
    pub fn from_workspace(mut workspace: Workspace, history_cap: usize) -> Self {
        let history_cap = history_cap.max(1);
        for project in &mut workspace.projects {
            project.history.set_cap(history_cap);
        }
        let dropped = workspace.repair();
        if !dropped.is_empty() {
            tracing::warn!("[HistoryStore] Ignoring {} malformed project(s)", dropped.len());
        }
        Self {
            projects: RwLock::new(workspace.projects),
            history_cap,
        }
    }

    /// Consistent copy of all projects for saving.
    pub async fn export(&self, active_project_id: Option<String>) -> Workspace {
        let projects = self.projects.read().await.clone();
        let active_project_id = active_project_id.filter(|id| projects.iter().any(|p| &p.id == id));
        Workspace {
            projects,
            active_project_id,
        }
    }

    fn find<'a>(projects: &'a [Project], project_id: &str) -> AppResult<&'a Project> {
        projects
            .iter()
            .find(|p| p.id == project_id)
            .ok_or_else(|| AppError::not_found(format!("Project {}", project_id)))
    }

    fn find_mut<'a>(projects: &'a mut [Project], project_id: &str) -> AppResult<&'a mut Project> {
        projects
            .iter_mut()
            .find(|p| p.id == project_id)
            .ok_or_else(|| AppError::not_found(format!("Project {}", project_id)))
    }

    /// Create a project seeded with one empty snapshot.
    pub async fn create_project(&self, name: &str) -> ProjectSummary {
        let name = match name.trim() {
            "" => "Untitled App",
            trimmed => trimmed,
        };
        let project = Project::new(name, self.history_cap);
        let summary = project.summary();
        self.projects.write().await.push(project);
        tracing::info!("[HistoryStore] Created project {} ({})", summary.id, summary.name);
        summary
    }

    pub async fn delete_project(&self, project_id: &str) -> AppResult<()> {
        let mut projects = self.projects.write().await;
        let before = projects.len();
        projects.retain(|p| p.id != project_id);
        if projects.len() == before {
            return Err(AppError::not_found(format!("Project {}", project_id)));
        }
        tracing::info!("[HistoryStore] Deleted project {}", project_id);
        Ok(())
    }

    /// Rename by committing a new snapshot with the new name.
    pub async fn rename_project(&self, project_id: &str, name: &str) -> AppResult<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::validation("Project name must not be empty"));
        }
        self.commit_with(project_id, |snapshot| snapshot.with_name(name))
            .await
            .map(|_| ())
    }

    pub async fn list_projects(&self) -> Vec<ProjectSummary> {
        self.projects.read().await.iter().map(Project::summary).collect()
    }

    pub async fn contains(&self, project_id: &str) -> bool {
        self.projects.read().await.iter().any(|p| p.id == project_id)
    }

    pub async fn summary(&self, project_id: &str) -> AppResult<ProjectSummary> {
        let projects = self.projects.read().await;
        Ok(Self::find(&projects, project_id)?.summary())
    }

    /// Snapshot at the project's cursor.
    pub async fn current(&self, project_id: &str) -> AppResult<StateSnapshot> {
        let projects = self.projects.read().await;
        Ok(Self::find(&projects, project_id)?.current()?.clone())
    }

    /// Derive the next snapshot from the current one and commit it, atomically.
    pub async fn commit_with<F>(&self, project_id: &str, derive: F) -> AppResult<StateSnapshot>
    where
        F: FnOnce(StateSnapshot) -> StateSnapshot,
    {
        let mut projects = self.projects.write().await;
        let project = Self::find_mut(&mut projects, project_id)?;
        let next = derive(project.current()?.clone());
        project.history.commit(next.clone());
        Ok(next)
    }

    /// Step back; returns false at the oldest version.
    pub async fn undo(&self, project_id: &str) -> AppResult<bool> {
        let mut projects = self.projects.write().await;
        Ok(Self::find_mut(&mut projects, project_id)?.history.undo())
    }

    /// Step forward; returns false at the newest version.
    pub async fn redo(&self, project_id: &str) -> AppResult<bool> {
        let mut projects = self.projects.write().await;
        Ok(Self::find_mut(&mut projects, project_id)?.history.redo())
    }

    pub async fn restore_to(&self, project_id: &str, index: usize) -> AppResult<()> {
        let mut projects = self.projects.write().await;
        Self::find_mut(&mut projects, project_id)?
            .history
            .restore_to(index)?;
        Ok(())
    }

    pub async fn versions(&self, project_id: &str) -> AppResult<Vec<VersionSummary>> {
        let projects = self.projects.read().await;
        let history = &Self::find(&projects, project_id)?.history;
        Ok((0..history.len())
            .filter_map(|index| {
                history.get(index).map(|snapshot| VersionSummary {
                    index,
                    name: snapshot.name.clone(),
                    message_count: snapshot.messages.len(),
                    file_count: snapshot.files.len(),
                    is_current: index == history.cursor(),
                })
            })
            .collect())
    }
}
