//! JSON Configuration Management
//!
//! Handles reading and writing the engine configuration file.

use std::fs;
use std::path::{Path, PathBuf};

use crate::models::settings::{AppConfig, SettingsUpdate};
use crate::utils::error::{AppError, AppResult};
use crate::utils::paths::{config_path, ensure_dir};

/// Configuration service for managing engine settings
#[derive(Debug)]
pub struct ConfigService {
    config_path: PathBuf,
    config: AppConfig,
}

impl ConfigService {
    /// Load the config at ~/.prompt-forge/config.json, creating defaults if absent
    pub fn new() -> AppResult<Self> {
        Self::at(config_path()?)
    }

    /// Load the config at an explicit path, creating defaults if absent
    pub fn at(config_path: PathBuf) -> AppResult<Self> {
        if let Some(parent) = config_path.parent() {
            ensure_dir(parent)?;
        }

        let config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            let default_config = AppConfig::default();
            Self::save_to_file(&config_path, &default_config)?;
            tracing::info!(
                "[Config] Wrote default configuration to {}",
                config_path.display()
            );
            default_config
        };

        Ok(Self {
            config_path,
            config,
        })
    }

    /// Load configuration from a file
    fn load_from_file(path: &Path) -> AppResult<AppConfig> {
        let content = fs::read_to_string(path)?;
        let config: AppConfig = serde_json::from_str(&content)?;
        config.validate().map_err(AppError::validation)?;
        Ok(config)
    }

    /// Save configuration to a file with pretty formatting
    fn save_to_file(path: &Path, config: &AppConfig) -> AppResult<()> {
        config.validate().map_err(AppError::validation)?;
        let content = serde_json::to_string_pretty(config)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Get the current configuration
    pub fn get_config(&self) -> &AppConfig {
        &self.config
    }

    /// Update the configuration with a partial update
    ///
    /// An invalid result is rejected and the previous configuration kept.
    pub fn update_config(&mut self, update: SettingsUpdate) -> AppResult<AppConfig> {
        let mut next = self.config.clone();
        next.apply_update(update);
        Self::save_to_file(&self.config_path, &next)?;
        self.config = next;
        Ok(self.config.clone())
    }

    /// Save the current configuration to disk
    pub fn save(&self) -> AppResult<()> {
        Self::save_to_file(&self.config_path, &self.config)
    }

    /// Reload configuration from disk
    pub fn reload(&mut self) -> AppResult<()> {
        self.config = Self::load_from_file(&self.config_path)?;
        Ok(())
    }

    /// Reset configuration to defaults
    pub fn reset(&mut self) -> AppResult<()> {
        self.config = AppConfig::default();
        self.save()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_creates_default_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("nested").join("config.json");

        let service = ConfigService::at(path.clone()).unwrap();

        assert!(path.exists());
        assert_eq!(service.get_config(), &AppConfig::default());
    }

    #[test]
    fn test_load_existing_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("config.json");
        fs::write(&path, r#"{"provider":"openai","model":"gpt-4o"}"#).unwrap();

        let service = ConfigService::at(path).unwrap();
        assert_eq!(service.get_config().provider, "openai");
        assert_eq!(service.get_config().history_cap, 20);
    }

    #[test]
    fn test_invalid_file_is_rejected() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("config.json");
        fs::write(&path, r#"{"history_cap":0}"#).unwrap();

        let err = ConfigService::at(path).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_config_update() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("config.json");
        let mut service = ConfigService::at(path.clone()).unwrap();

        let updated = service
            .update_config(SettingsUpdate {
                model: Some("gemini-2.5-pro".to_string()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(updated.model, "gemini-2.5-pro");

        let bad = service.update_config(SettingsUpdate {
            history_cap: Some(0),
            ..Default::default()
        });
        assert!(bad.is_err());
        assert_eq!(service.get_config().history_cap, 20);

        let reloaded = ConfigService::at(path).unwrap();
        assert_eq!(reloaded.get_config().model, "gemini-2.5-pro");

        service.reset().unwrap();
        service.reload().unwrap();
        assert_eq!(service.get_config(), &AppConfig::default());
    }
}
