//! Runtime Telemetry Types
//!
//! Console output captured from the sandboxed preview. The engine only
//! consumes these entries; the sandbox produces them.

use serde::{Deserialize, Serialize};

/// Console severity as reported by the sandbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleLevel {
    Debug,
    Log,
    Info,
    Warn,
    Error,
}

impl ConsoleLevel {
    pub fn is_error(&self) -> bool {
        matches!(self, ConsoleLevel::Error)
    }
}

impl std::fmt::Display for ConsoleLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConsoleLevel::Debug => write!(f, "debug"),
            ConsoleLevel::Log => write!(f, "log"),
            ConsoleLevel::Info => write!(f, "info"),
            ConsoleLevel::Warn => write!(f, "warn"),
            ConsoleLevel::Error => write!(f, "error"),
        }
    }
}

/// A single console emission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsoleMessage {
    pub level: ConsoleLevel,
    pub payload: String,
    /// Capture timestamp (ISO 8601)
    pub timestamp: String,
}

impl ConsoleMessage {
    pub fn new(level: ConsoleLevel, payload: impl Into<String>) -> Self {
        Self {
            level,
            payload: payload.into(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn error(payload: impl Into<String>) -> Self {
        Self::new(ConsoleLevel::Error, payload)
    }

    pub fn log(payload: impl Into<String>) -> Self {
        Self::new(ConsoleLevel::Log, payload)
    }
}
