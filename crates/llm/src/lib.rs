//! Prompt Forge LLM
//!
//! Provides a unified interface for the providers the generation engine can
//! talk to:
//! - OpenAI and OpenAI-compatible endpoints (chat completions)
//! - Google Gemini (generateContent)
//!
//! Also includes the HTTP client factory shared by all providers.

pub mod gemini;
pub mod http_client;
pub mod openai;
pub mod provider;
pub mod types;

// Re-export main types
pub use gemini::GeminiProvider;
pub use http_client::build_http_client;
pub use openai::OpenAIProvider;
pub use provider::{create_provider, LlmProvider};
pub use types::*;
