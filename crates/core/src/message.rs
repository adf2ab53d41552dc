//! Chat Transcript Types
//!
//! A project's transcript is an ordered list of `ChatMessage`s stored inside
//! every snapshot. Messages are values: once committed they are never edited.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::plan::AppPlan;

/// Who authored a transcript entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    User,
    Model,
    /// Engine notices (cancellation, context summaries).
    System,
    /// Synthetic runtime-error report fed back to the oracle.
    Correction,
}

impl std::fmt::Display for ChatRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChatRole::User => write!(f, "user"),
            ChatRole::Model => write!(f, "model"),
            ChatRole::System => write!(f, "system"),
            ChatRole::Correction => write!(f, "correction"),
        }
    }
}

/// UI hint attached to a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageAction {
    /// The message carries a plan the user has to approve.
    AwaitingPlanApproval,
    /// New code was applied; the preview is worth a look.
    GotoPreview,
}

/// A file or image the user attached to a prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub name: String,
    pub mime_type: String,
    /// Base64-encoded payload
    pub data: String,
}

impl Attachment {
    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }
}

/// One transcript entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub role: ChatRole,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<AppPlan>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<MessageAction>,
    /// UI-only: the text is still being revealed.
    #[serde(default)]
    pub streaming: bool,
    /// Creation timestamp (ISO 8601)
    pub timestamp: String,
}

impl ChatMessage {
    /// Create a message with a fresh id and timestamp
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            attachments: Vec::new(),
            plan: None,
            action: None,
            streaming: false,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(ChatRole::User, content)
    }

    pub fn model(content: impl Into<String>) -> Self {
        Self::new(ChatRole::Model, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(ChatRole::System, content)
    }

    pub fn correction(content: impl Into<String>) -> Self {
        Self::new(ChatRole::Correction, content)
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    pub fn with_plan(mut self, plan: AppPlan) -> Self {
        self.plan = Some(plan);
        self
    }

    pub fn with_action(mut self, action: MessageAction) -> Self {
        self.action = Some(action);
        self
    }
}
