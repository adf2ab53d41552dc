//! Settings Models
//!
//! Engine configuration persisted at ~/.prompt-forge/config.json.

use serde::{Deserialize, Serialize};

use prompt_forge_core::DEFAULT_HISTORY_CAP;
use prompt_forge_llm::{ProviderConfig, ProviderType};

/// Limits applied when building the oracle's context window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextBudget {
    /// Transcript length above which older messages are summarized
    pub max_messages: usize,
    /// Newest messages always kept verbatim
    pub keep_recent: usize,
    /// Max characters per quoted message inside the summary
    pub summary_chars: usize,
    /// Recent messages scanned for file references
    pub scan_window: usize,
    /// Max files sent with one request
    pub max_files: usize,
    /// Max total bytes of file content sent with one request
    pub max_total_bytes: usize,
    /// Files larger than this are never sent
    pub max_file_bytes: usize,
}

impl Default for ContextBudget {
    fn default() -> Self {
        Self {
            max_messages: 24,
            keep_recent: 12,
            summary_chars: 600,
            scan_window: 8,
            max_files: 25,
            max_total_bytes: 120_000,
            max_file_bytes: 40_000,
        }
    }
}

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// LLM provider: "openai" or "gemini"
    pub provider: String,
    /// Model for the provider
    pub model: String,
    /// Environment variable holding the API key
    pub api_key_env: String,
    /// Endpoint override
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Proxy URL for provider traffic
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy_url: Option<String>,
    /// Sampling temperature
    pub temperature: f32,
    /// Versions kept per project
    pub history_cap: usize,
    /// How long to wait for runtime errors after applying code
    pub verify_timeout_ms: u64,
    /// Extra oracle attempts after a failed call
    pub max_oracle_retries: u32,
    /// First retry delay
    pub retry_initial_delay_ms: u64,
    /// Retry delay ceiling
    pub retry_max_delay_ms: u64,
    /// Automatic correction rounds per run before giving up
    pub max_auto_corrections: u32,
    /// Context window limits
    pub context: ContextBudget,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            provider: "gemini".to_string(),
            model: "gemini-2.5-flash".to_string(),
            api_key_env: "GEMINI_API_KEY".to_string(),
            base_url: None,
            proxy_url: None,
            temperature: 0.7,
            history_cap: DEFAULT_HISTORY_CAP,
            verify_timeout_ms: 2000,
            max_oracle_retries: 2,
            retry_initial_delay_ms: 1000,
            retry_max_delay_ms: 8000,
            max_auto_corrections: 3,
            context: ContextBudget::default(),
        }
    }
}

/// Settings update request (partial update)
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SettingsUpdate {
    pub provider: Option<String>,
    pub model: Option<String>,
    pub api_key_env: Option<String>,
    pub temperature: Option<f32>,
    pub history_cap: Option<usize>,
    pub verify_timeout_ms: Option<u64>,
    pub max_oracle_retries: Option<u32>,
    pub max_auto_corrections: Option<u32>,
}

impl AppConfig {
    /// Apply a partial update to the configuration
    pub fn apply_update(&mut self, update: SettingsUpdate) {
        if let Some(provider) = update.provider {
            self.provider = provider;
        }
        if let Some(model) = update.model {
            self.model = model;
        }
        if let Some(env) = update.api_key_env {
            self.api_key_env = env;
        }
        if let Some(temperature) = update.temperature {
            self.temperature = temperature;
        }
        if let Some(cap) = update.history_cap {
            self.history_cap = cap;
        }
        if let Some(timeout) = update.verify_timeout_ms {
            self.verify_timeout_ms = timeout;
        }
        if let Some(retries) = update.max_oracle_retries {
            self.max_oracle_retries = retries;
        }
        if let Some(rounds) = update.max_auto_corrections {
            self.max_auto_corrections = rounds;
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        self.provider_type()?;

        if self.model.trim().is_empty() {
            return Err("model must not be empty".to_string());
        }

        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(format!(
                "Invalid temperature: {}. Must be between 0.0 and 2.0",
                self.temperature
            ));
        }

        if self.history_cap == 0 {
            return Err("history_cap must be at least 1".to_string());
        }

        if self.retry_initial_delay_ms > self.retry_max_delay_ms {
            return Err("retry_initial_delay_ms cannot exceed retry_max_delay_ms".to_string());
        }

        let ctx = &self.context;
        if ctx.keep_recent >= ctx.max_messages {
            return Err(format!(
                "context.keep_recent ({}) must be smaller than context.max_messages ({})",
                ctx.keep_recent, ctx.max_messages
            ));
        }
        if ctx.max_files == 0 || ctx.max_total_bytes == 0 || ctx.max_file_bytes == 0 {
            return Err("context file budgets must be non-zero".to_string());
        }

        Ok(())
    }

    /// Parsed provider type
    pub fn provider_type(&self) -> Result<ProviderType, String> {
        self.provider
            .parse::<ProviderType>()
            .map_err(|e| e.to_string())
    }

    /// Build the provider configuration, reading the API key from the environment.
    pub fn provider_config(&self) -> Result<ProviderConfig, String> {
        Ok(ProviderConfig {
            provider: self.provider_type()?,
            api_key: std::env::var(&self.api_key_env)
                .ok()
                .filter(|k| !k.trim().is_empty()),
            base_url: self.base_url.clone(),
            model: self.model.clone(),
            temperature: self.temperature,
            proxy_url: self.proxy_url.clone(),
            ..ProviderConfig::default()
        })
    }
}
