//! Projects and Workspaces
//!
//! A `Project` exclusively owns its `History`. A `Workspace` is the persisted
//! container of all projects; it is loaded and saved as one unit through a
//! `WorkspaceRepository`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};
use crate::history::History;
use crate::snapshot::StateSnapshot;

/// A generated application and its version history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub history: History,
    /// Creation timestamp (ISO 8601)
    pub created_at: String,
}

impl Project {
    /// Create a project seeded with one empty snapshot
    pub fn new(name: impl Into<String>, history_cap: usize) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            history: History::new(StateSnapshot::empty(name), history_cap),
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// The snapshot at the history cursor.
    pub fn current(&self) -> CoreResult<&StateSnapshot> {
        self.history
            .current()
            .ok_or_else(|| CoreError::EmptyHistory(self.id.clone()))
    }

    /// Display name at the current version.
    pub fn name(&self) -> &str {
        self.history.current().map(|s| s.name.as_str()).unwrap_or("")
    }

    pub fn summary(&self) -> ProjectSummary {
        let current = self.history.current();
        ProjectSummary {
            id: self.id.clone(),
            name: self.name().to_string(),
            versions: self.history.len(),
            cursor: self.history.cursor(),
            can_undo: self.history.can_undo(),
            can_redo: self.history.can_redo(),
            has_generated_code: current.map(|s| s.has_generated_code).unwrap_or(false),
            file_count: current.map(|s| s.files.len()).unwrap_or(0),
        }
    }
}

/// Lightweight listing entry for a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSummary {
    pub id: String,
    pub name: String,
    pub versions: usize,
    pub cursor: usize,
    pub can_undo: bool,
    pub can_redo: bool,
    pub has_generated_code: bool,
    pub file_count: usize,
}

/// All projects of one user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workspace {
    #[serde(default)]
    pub projects: Vec<Project>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_project_id: Option<String>,
}

impl Workspace {
    pub fn find(&self, project_id: &str) -> Option<&Project> {
        self.projects.iter().find(|p| p.id == project_id)
    }

    /// Repair every history and drop projects with nothing to show.
    ///
    /// Returns the ids of dropped projects.
    pub fn repair(&mut self) -> Vec<String> {
        let mut dropped = Vec::new();
        self.projects.retain_mut(|project| {
            project.history.repair();
            if project.history.is_empty() {
                dropped.push(project.id.clone());
                false
            } else {
                true
            }
        });
        if let Some(active) = &self.active_project_id {
            if self.find(active).is_none() {
                self.active_project_id = None;
            }
        }
        dropped
    }
}

/// Storage seam for whole-workspace load/save.
///
/// Implementations must save atomically: a reader never observes a partially
/// written workspace.
#[async_trait]
pub trait WorkspaceRepository: Send + Sync {
    /// Load the workspace; a missing store yields an empty workspace.
    async fn load(&self) -> CoreResult<Workspace>;

    /// Replace the stored workspace.
    async fn save(&self, workspace: &Workspace) -> CoreResult<()>;
}
