//! Oracle Response Types
//!
//! The three shapes the code-generating oracle can answer with. The wire
//! form is a JSON object tagged by `type`.

use serde::{Deserialize, Serialize};

use crate::modification::Modification;
use crate::plan::AppPlan;

/// A decoded oracle answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum OracleResponse {
    /// Plain conversational reply
    #[serde(rename = "CHAT")]
    Chat { message: String },
    /// A plan awaiting user approval
    #[serde(rename = "PLAN")]
    Plan {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
        plan: AppPlan,
    },
    /// File changes to apply
    #[serde(rename = "MODIFY_CODE")]
    ModifyCode {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
        modification: Modification,
    },
}

impl OracleResponse {
    pub fn kind(&self) -> ResponseKind {
        match self {
            OracleResponse::Chat { .. } => ResponseKind::Chat,
            OracleResponse::Plan { .. } => ResponseKind::Plan,
            OracleResponse::ModifyCode { .. } => ResponseKind::ModifyCode,
        }
    }
}

/// Discriminant of `OracleResponse`, for logging and routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResponseKind {
    Chat,
    Plan,
    ModifyCode,
}

impl ResponseKind {
    /// Parse a wire tag, ignoring case and separators.
    pub fn from_tag(tag: &str) -> Option<Self> {
        let normalized: String = tag
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_uppercase();
        match normalized.as_str() {
            "CHAT" => Some(ResponseKind::Chat),
            "PLAN" => Some(ResponseKind::Plan),
            "MODIFYCODE" => Some(ResponseKind::ModifyCode),
            _ => None,
        }
    }

    /// Canonical wire tag
    pub fn tag(&self) -> &'static str {
        match self {
            ResponseKind::Chat => "CHAT",
            ResponseKind::Plan => "PLAN",
            ResponseKind::ModifyCode => "MODIFY_CODE",
        }
    }
}

impl std::fmt::Display for ResponseKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.tag())
    }
}
