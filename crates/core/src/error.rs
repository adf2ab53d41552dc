//! Core Error Types
//!
//! Defines the foundational error types used across the Prompt Forge workspace.
//! These error types are dependency-free (only thiserror + std + serde_json) to
//! keep the core crate lightweight.
//!
//! The engine crate wraps these in `AppError` and adds run-level variants.

use thiserror::Error;

/// Core error type for the Prompt Forge workspace.
#[derive(Error, Debug)]
pub enum CoreError {
    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Not found errors
    #[error("Not found: {0}")]
    NotFound(String),

    /// History navigation outside the stored versions
    #[error("Version {index} is out of range (history holds {len} versions)")]
    OutOfRange { index: usize, len: usize },

    /// A project whose history holds no snapshot at all
    #[error("Project {0} has an empty history")]
    EmptyHistory(String),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for core errors
pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a not found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

/// Convert CoreError to a string
impl From<CoreError> for String {
    fn from(err: CoreError) -> String {
        err.to_string()
    }
}
