//! State Snapshots
//!
//! A `StateSnapshot` is one immutable, fully consistent version of a project:
//! files, preview, transcript, pending plan and display name. New versions are
//! derived with the `with_*` builders, which consume a clone and never touch
//! the snapshot already stored in history.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::message::ChatMessage;
use crate::modification::{apply_changes, Modification};
use crate::plan::AppPlan;

/// Path -> content map of a project's source files.
pub type FileSet = BTreeMap<String, String>;

/// Rendered preview artifacts of the generated app.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preview {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mobile: Option<String>,
}

impl Preview {
    pub fn is_empty(&self) -> bool {
        self.web.is_none() && self.mobile.is_none()
    }
}

/// One version of a project.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateSnapshot {
    #[serde(default)]
    pub files: FileSet,
    #[serde(default)]
    pub preview: Preview,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub has_generated_code: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<AppPlan>,
    pub name: String,
}

impl StateSnapshot {
    /// The seed snapshot every project starts from
    pub fn empty(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Append a transcript message.
    pub fn with_message(mut self, message: ChatMessage) -> Self {
        self.messages.push(message);
        self
    }

    /// Store a pending plan.
    pub fn with_plan(mut self, plan: AppPlan) -> Self {
        self.plan = Some(plan);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Apply a modification and its explanatory message in one step.
    ///
    /// Files, preview, name and transcript change together; the pending plan
    /// is dropped because generated code supersedes it.
    pub fn with_modification(mut self, modification: &Modification, message: ChatMessage) -> Self {
        apply_changes(&mut self.files, &modification.changes);
        if let Some(name) = modification.rename.as_ref().filter(|n| !n.trim().is_empty()) {
            self.name = name.trim().to_string();
        }
        if let Some(preview) = &modification.preview {
            self.preview = preview.clone();
        }
        self.has_generated_code = true;
        self.plan = None;
        self.messages.push(message);
        self
    }
}
