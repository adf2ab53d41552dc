//! Gemini Provider
//!
//! Implementation of the LlmProvider trait for Google's `generateContent` API.
//! Gemini has no system role inside `contents`; the system prompt travels as
//! `systemInstruction` and in-conversation system notes are sent as user turns.

use async_trait::async_trait;
use serde::Deserialize;

use super::provider::{missing_api_key_error, parse_http_error, LlmProvider};
use super::types::{
    LlmError, LlmRequestOptions, LlmResponse, LlmResult, Message, MessageContent, MessageRole,
    ProviderConfig, StopReason, UsageStats,
};
use crate::http_client::build_http_client;

/// Default Gemini API root
const GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Gemini provider
pub struct GeminiProvider {
    config: ProviderConfig,
    client: reqwest::Client,
}

impl GeminiProvider {
    /// Create a new Gemini provider with the given configuration
    pub fn new(config: ProviderConfig) -> LlmResult<Self> {
        let client = build_http_client(config.proxy_url.as_deref())?;
        Ok(Self { config, client })
    }

    fn api_root(&self) -> &str {
        self.config
            .base_url
            .as_deref()
            .unwrap_or(GEMINI_API_URL)
            .trim_end_matches('/')
    }

    /// Build an endpoint URL with the API key as query parameter
    fn endpoint(&self, path: &str, api_key: &str) -> LlmResult<url::Url> {
        let raw = format!("{}/{}", self.api_root(), path);
        let mut url = url::Url::parse(&raw).map_err(|e| LlmError::InvalidRequest {
            message: format!("Invalid Gemini endpoint '{}': {}", raw, e),
        })?;
        url.query_pairs_mut().append_pair("key", api_key);
        Ok(url)
    }

    /// Build the request body for the API
    fn build_request_body(
        &self,
        messages: &[Message],
        system: Option<&str>,
        request_options: &LlmRequestOptions,
    ) -> serde_json::Value {
        let mut generation_config = serde_json::json!({
            "maxOutputTokens": self.config.max_tokens,
            "temperature": request_options
                .temperature_override
                .unwrap_or(self.config.temperature),
        });
        if request_options.json_output {
            generation_config["responseMimeType"] = serde_json::json!("application/json");
        }

        let mut body = serde_json::json!({
            "contents": self.messages_to_contents(messages),
            "generationConfig": generation_config,
        });

        if let Some(sys) = system {
            body["systemInstruction"] = serde_json::json!({
                "parts": [{ "text": sys }]
            });
        }

        body
    }

    /// Convert messages to `contents`, merging consecutive turns of one role.
    fn messages_to_contents(&self, messages: &[Message]) -> Vec<serde_json::Value> {
        let mut contents: Vec<(String, Vec<serde_json::Value>)> = Vec::new();

        for msg in messages {
            let role = match msg.role {
                MessageRole::Assistant => "model",
                MessageRole::User | MessageRole::System => "user",
            };
            let parts: Vec<serde_json::Value> = msg
                .content
                .iter()
                .map(|c| match c {
                    MessageContent::Text { text } if msg.role == MessageRole::System => {
                        serde_json::json!({ "text": format!("[System note]\n{}", text) })
                    }
                    MessageContent::Text { text } => serde_json::json!({ "text": text }),
                    MessageContent::Image { media_type, data } => serde_json::json!({
                        "inlineData": { "mimeType": media_type, "data": data }
                    }),
                })
                .collect();

            match contents.last_mut() {
                Some((last_role, last_parts)) if last_role == role => last_parts.extend(parts),
                _ => contents.push((role.to_string(), parts)),
            }
        }

        contents
            .into_iter()
            .map(|(role, parts)| serde_json::json!({ "role": role, "parts": parts }))
            .collect()
    }

    /// Parse a response from the Gemini API
    fn parse_response(&self, response: &GeminiResponse) -> LlmResult<LlmResponse> {
        if let Some(feedback) = &response.prompt_feedback {
            if let Some(reason) = &feedback.block_reason {
                return Err(LlmError::InvalidRequest {
                    message: format!("Prompt blocked: {}", reason),
                });
            }
        }

        let candidate = response.candidates.first();
        let content = candidate
            .and_then(|c| c.content.as_ref())
            .map(|c| {
                c.parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .filter(|text| !text.is_empty());

        let stop_reason = candidate
            .and_then(|c| c.finish_reason.as_ref())
            .map(|r| StopReason::from(r.as_str()))
            .unwrap_or(StopReason::EndTurn);

        let usage = response
            .usage_metadata
            .as_ref()
            .map(|u| UsageStats {
                input_tokens: u.prompt_token_count.unwrap_or(0),
                output_tokens: u.candidates_token_count.unwrap_or(0),
                thinking_tokens: u.thoughts_token_count,
            })
            .unwrap_or_default();

        Ok(LlmResponse {
            content,
            stop_reason,
            usage,
            model: response
                .model_version
                .clone()
                .unwrap_or_else(|| self.config.model.clone()),
        })
    }
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    fn name(&self) -> &'static str {
        "gemini"
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    fn supports_multimodal(&self) -> bool {
        true
    }

    async fn send_message(
        &self,
        messages: Vec<Message>,
        system: Option<String>,
        request_options: LlmRequestOptions,
    ) -> LlmResult<LlmResponse> {
        let api_key = self
            .config
            .api_key
            .as_ref()
            .ok_or_else(|| missing_api_key_error("gemini"))?;

        let url = self.endpoint(
            &format!("models/{}:generateContent", self.config.model),
            api_key,
        )?;
        let body = self.build_request_body(&messages, system.as_deref(), &request_options);

        tracing::debug!(
            "[Gemini] generateContent model={} messages={}",
            self.config.model,
            messages.len()
        );

        let response = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::NetworkError {
                message: e.to_string(),
            })?;

        let status = response.status().as_u16();
        let body_text = response.text().await.map_err(|e| LlmError::NetworkError {
            message: e.to_string(),
        })?;

        if status != 200 {
            return Err(parse_http_error(status, &body_text, "gemini"));
        }

        let gemini_response: GeminiResponse =
            serde_json::from_str(&body_text).map_err(|e| LlmError::ParseError {
                message: format!("Failed to parse response: {}", e),
            })?;

        self.parse_response(&gemini_response)
    }

    async fn health_check(&self) -> LlmResult<()> {
        let api_key = self
            .config
            .api_key
            .as_ref()
            .ok_or_else(|| missing_api_key_error("gemini"))?;

        let url = self.endpoint(&format!("models/{}", self.config.model), api_key)?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| LlmError::NetworkError {
                message: e.to_string(),
            })?;

        let status = response.status().as_u16();
        if status == 200 {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(parse_http_error(status, &body, "gemini"))
        }
    }

    fn config(&self) -> &ProviderConfig {
        &self.config
    }
}

/// Gemini API response format
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    usage_metadata: Option<UsageMetadata>,
    prompt_feedback: Option<PromptFeedback>,
    model_version: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    prompt_token_count: Option<u32>,
    candidates_token_count: Option<u32>,
    thoughts_token_count: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}
