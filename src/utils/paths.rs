//! Cross-Platform Path Utilities
//!
//! Functions for resolving the engine's data directory (~/.prompt-forge/).

use std::path::{Path, PathBuf};

use crate::utils::error::{AppError, AppResult};

/// Get the user's home directory
pub fn home_dir() -> AppResult<PathBuf> {
    dirs::home_dir().ok_or_else(|| AppError::config("Could not determine home directory"))
}

/// Get the Prompt Forge directory (~/.prompt-forge/)
pub fn prompt_forge_dir() -> AppResult<PathBuf> {
    Ok(home_dir()?.join(".prompt-forge"))
}

/// Get the config file path (~/.prompt-forge/config.json)
pub fn config_path() -> AppResult<PathBuf> {
    Ok(prompt_forge_dir()?.join("config.json"))
}

/// Get the workspace file path (~/.prompt-forge/workspace.json)
pub fn workspace_path() -> AppResult<PathBuf> {
    Ok(prompt_forge_dir()?.join("workspace.json"))
}

/// Ensure a directory exists, creating it if necessary
pub fn ensure_dir(path: &Path) -> AppResult<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}
