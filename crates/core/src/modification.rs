//! Code Modifications
//!
//! The unit of work the oracle returns while building or correcting: an
//! ordered list of file changes plus rationale, an optional rename and an
//! optional regenerated preview.

use serde::{Deserialize, Serialize};

use crate::snapshot::{FileSet, Preview};

/// What a single change does to its path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeAction {
    Create,
    Update,
    Delete,
}

impl std::fmt::Display for ChangeAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChangeAction::Create => write!(f, "create"),
            ChangeAction::Update => write!(f, "update"),
            ChangeAction::Delete => write!(f, "delete"),
        }
    }
}

/// One file-level change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileChange {
    pub action: ChangeAction,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl FileChange {
    pub fn create(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            action: ChangeAction::Create,
            path: path.into(),
            content: Some(content.into()),
        }
    }

    pub fn update(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            action: ChangeAction::Update,
            path: path.into(),
            content: Some(content.into()),
        }
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self {
            action: ChangeAction::Delete,
            path: path.into(),
            content: None,
        }
    }
}

/// A set of changes proposed by the oracle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Modification {
    /// New display name for the project, if the oracle chose one
    #[serde(default, alias = "projectName", skip_serializing_if = "Option::is_none")]
    pub rename: Option<String>,
    pub reason: String,
    pub changes: Vec<FileChange>,
    /// Regenerated preview; `None` keeps the previous one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview: Option<Preview>,
}

impl Modification {
    /// Paths touched by this modification, in order.
    pub fn touched_paths(&self) -> Vec<&str> {
        self.changes.iter().map(|c| c.path.as_str()).collect()
    }
}

/// Apply changes in order to a file set.
///
/// `create` and `update` are both upserts; deleting a missing path is a no-op.
/// A create/update without content writes an empty file.
pub fn apply_changes(files: &mut FileSet, changes: &[FileChange]) {
    for change in changes {
        match change.action {
            ChangeAction::Delete => {
                files.remove(&change.path);
            }
            ChangeAction::Create | ChangeAction::Update => {
                files.insert(
                    change.path.clone(),
                    change.content.clone().unwrap_or_default(),
                );
            }
        }
    }
}
