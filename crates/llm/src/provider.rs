//! LLM Provider Trait
//!
//! Defines the common interface for all LLM providers.

use std::sync::Arc;

use async_trait::async_trait;

use super::types::{
    LlmError, LlmRequestOptions, LlmResponse, LlmResult, Message, ProviderConfig, ProviderType,
};

/// Trait that all LLM providers must implement.
///
/// Provides a unified interface for:
/// - Single message completions (send_message)
/// - Health checking
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Returns the provider name for identification.
    fn name(&self) -> &'static str;

    /// Returns the current model being used.
    fn model(&self) -> &str;

    /// Returns whether this provider supports multimodal content (images).
    fn supports_multimodal(&self) -> bool {
        false // Default: text-only
    }

    /// Send a message and get a complete response.
    ///
    /// # Arguments
    /// * `messages` - Conversation history
    /// * `system` - Optional system prompt
    /// * `request_options` - Per-request overrides
    ///
    /// # Returns
    /// Complete response from the model
    async fn send_message(
        &self,
        messages: Vec<Message>,
        system: Option<String>,
        request_options: LlmRequestOptions,
    ) -> LlmResult<LlmResponse>;

    /// Check if the provider is healthy and reachable.
    ///
    /// For API providers, this validates the API key.
    async fn health_check(&self) -> LlmResult<()>;

    /// Get the configuration for this provider.
    fn config(&self) -> &ProviderConfig;
}

/// Create an LLM provider from a ProviderConfig.
///
/// Factory function that maps ProviderType to the concrete provider implementation.
pub fn create_provider(config: ProviderConfig) -> LlmResult<Arc<dyn LlmProvider>> {
    use crate::{GeminiProvider, OpenAIProvider};

    let provider: Arc<dyn LlmProvider> = match config.provider {
        ProviderType::OpenAI => Arc::new(OpenAIProvider::new(config)?),
        ProviderType::Gemini => Arc::new(GeminiProvider::new(config)?),
    };
    Ok(provider)
}

/// Helper function to create an error for missing API key
pub fn missing_api_key_error(provider: &str) -> LlmError {
    LlmError::AuthenticationFailed {
        message: format!("API key not configured for {}", provider),
    }
}

/// Helper function to parse HTTP error status codes
pub fn parse_http_error(status: u16, body: &str, provider: &str) -> LlmError {
    match status {
        401 => LlmError::AuthenticationFailed {
            message: format!("{}: Invalid API key", provider),
        },
        403 => LlmError::AuthenticationFailed {
            message: format!("{}: Access denied", provider),
        },
        404 => LlmError::ModelNotFound {
            model: body.to_string(),
        },
        429 => LlmError::RateLimited {
            message: body.to_string(),
            retry_after: None,
        },
        400 => {
            let lower = body.to_lowercase();
            if lower.contains("context length") || lower.contains("too many tokens") {
                LlmError::ContextLengthExceeded {
                    message: body.to_string(),
                    max_tokens: None,
                }
            } else {
                LlmError::InvalidRequest {
                    message: body.to_string(),
                }
            }
        }
        500..=599 => LlmError::ServerError {
            message: body.to_string(),
            status: Some(status),
        },
        _ => LlmError::Other {
            message: format!("HTTP {}: {}", status, body),
        },
    }
}
