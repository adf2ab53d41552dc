//! Oracle Gateway
//!
//! One logical "ask the oracle" call: trim the context, build the outgoing
//! payload, send it, decode the answer. Transport and decode failures are
//! retried with exponential backoff; every wait (provider call and backoff
//! sleep) races the project's cancellation token.

use std::sync::Arc;
use std::time::Duration;

use backoff::backoff::Backoff;
use backoff::ExponentialBackoffBuilder;
use base64::Engine as _;
use prompt_forge_core::{Attachment, ChatMessage, ChatRole, FileSet, OracleResponse};
use prompt_forge_llm::{LlmError, LlmProvider, LlmRequestOptions, Message, MessageRole};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use super::decoder::ResponseDecoder;
use super::prompts::{system_instruction, OracleTask, STRUCTURED_OUTPUT_REMINDER};
use super::session::OracleSession;
use crate::models::settings::AppConfig;
use crate::services::context::ContextOptimizer;

/// Classified failure of one gateway call, carrying the last raw error text.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OracleFailure {
    #[error("Oracle call cancelled")]
    Cancelled,
    #[error("Oracle quota exceeded: {0}")]
    QuotaExceeded(String),
    #[error("Oracle temporarily unavailable: {0}")]
    TransientServer(String),
    #[error("Oracle returned malformed output: {0}")]
    MalformedResponse(String),
    #[error("Oracle call failed: {0}")]
    Unknown(String),
}

impl OracleFailure {
    fn from_llm(err: &LlmError) -> Self {
        match err {
            LlmError::RateLimited { .. } => OracleFailure::QuotaExceeded(err.to_string()),
            LlmError::ServerError { .. } | LlmError::NetworkError { .. } => {
                OracleFailure::TransientServer(err.to_string())
            }
            LlmError::ParseError { .. } => OracleFailure::MalformedResponse(err.to_string()),
            _ => OracleFailure::Unknown(err.to_string()),
        }
    }

    /// Plain-text explanation for the transcript.
    pub fn user_message(&self) -> String {
        match self {
            OracleFailure::Cancelled => "Generation cancelled.".to_string(),
            OracleFailure::QuotaExceeded(_) => "The code generation service is rate limited or out of quota. \
                Please wait a moment before trying again."
                .to_string(),
            OracleFailure::TransientServer(_) => "The code generation service is temporarily unavailable. \
                Please try again shortly."
                .to_string(),
            OracleFailure::MalformedResponse(_) => "I could not produce a valid response for that request. \
                Please try rephrasing it."
                .to_string(),
            OracleFailure::Unknown(detail) => {
                format!("Something went wrong while generating a response: {}", detail)
            }
        }
    }
}

/// Retry bound and backoff shape.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Attempts after the first one
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            max_retries: config.max_oracle_retries,
            initial_delay: Duration::from_millis(config.retry_initial_delay_ms),
            max_delay: Duration::from_millis(config.retry_max_delay_ms),
        }
    }

    fn backoff(&self) -> backoff::ExponentialBackoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(self.initial_delay)
            .with_max_interval(self.max_delay)
            .with_multiplier(2.0)
            .with_randomization_factor(0.0)
            .with_max_elapsed_time(None)
            .build()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// Inputs of one gateway call.
#[derive(Debug, Clone, Copy)]
pub struct OracleRequest<'a> {
    pub task: OracleTask,
    pub transcript: &'a [ChatMessage],
    /// Current project files; `None` for first-time generation
    pub files: Option<&'a FileSet>,
    pub attachment: Option<&'a Attachment>,
}

/// Gateway to the code-generating oracle.
pub struct OracleGateway {
    provider: Arc<dyn LlmProvider>,
    optimizer: ContextOptimizer,
    decoder: ResponseDecoder,
    retry: RetryPolicy,
}

impl OracleGateway {
    pub fn new(provider: Arc<dyn LlmProvider>, optimizer: ContextOptimizer, retry: RetryPolicy) -> Self {
        Self {
            provider,
            optimizer,
            decoder: ResponseDecoder::new(),
            retry,
        }
    }

    /// Ask the oracle, retrying transport and decode failures.
    pub async fn ask(
        &self,
        session: &OracleSession,
        request: OracleRequest<'_>,
        cancel: &CancellationToken,
    ) -> Result<OracleResponse, OracleFailure> {
        if cancel.is_cancelled() {
            return Err(OracleFailure::Cancelled);
        }

        let empty = FileSet::new();
        let optimized = self
            .optimizer
            .optimize(request.transcript, request.files.unwrap_or(&empty));
        let context_files = request.files.map(|_| &optimized.files);
        let messages = build_messages(&optimized.messages, context_files, request.attachment);
        let system = system_instruction(request.task);

        tracing::info!(
            "[OracleGateway] project={} task={} messages={} files={} ratio={:.2}",
            session.project_id(),
            request.task,
            messages.len(),
            optimized.files.len(),
            optimized.compression_ratio
        );

        let mut backoff = self.retry.backoff();
        let mut last_failure = OracleFailure::Unknown("no attempt made".to_string());

        for attempt in 0..=self.retry.max_retries {
            let mut outgoing = messages.clone();
            if attempt > 0 {
                outgoing.push(Message::user(STRUCTURED_OUTPUT_REMINDER));
            }

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::info!("[OracleGateway] project={} cancelled during call", session.project_id());
                    return Err(OracleFailure::Cancelled);
                }
                result = self.provider.send_message(outgoing, Some(system.clone()), LlmRequestOptions::json()) => result,
            };

            let mut retry_after = None;
            match result {
                Ok(response) => {
                    session.record_call(&response.usage);
                    match self.decoder.decode(response.text()) {
                        Ok(decoded) => {
                            tracing::debug!(
                                "[OracleGateway] project={} attempt={} kind={}",
                                session.project_id(),
                                attempt + 1,
                                decoded.kind()
                            );
                            return Ok(decoded);
                        }
                        Err(malformed) => {
                            tracing::warn!(
                                "[OracleGateway] project={} attempt={} {} (snippet: {:?})",
                                session.project_id(),
                                attempt + 1,
                                malformed,
                                malformed.snippet
                            );
                            last_failure = OracleFailure::MalformedResponse(format!(
                                "{}; snippet: {}",
                                malformed.reason, malformed.snippet
                            ));
                        }
                    }
                }
                Err(err) => {
                    session.record_failure();
                    tracing::warn!(
                        "[OracleGateway] project={} attempt={} provider error: {}",
                        session.project_id(),
                        attempt + 1,
                        err
                    );
                    last_failure = OracleFailure::from_llm(&err);
                    if !err.is_retryable() {
                        return Err(last_failure);
                    }
                    retry_after = err.retry_after_secs().map(Duration::from_secs);
                }
            }

            if attempt < self.retry.max_retries {
                let base = backoff.next_backoff().unwrap_or(self.retry.max_delay);
                let wait = retry_after.map_or(base, |r| r.max(base));
                tracing::info!(
                    "[OracleGateway] project={} retrying in {}ms (attempt {}/{})",
                    session.project_id(),
                    wait.as_millis(),
                    attempt + 2,
                    self.retry.max_retries + 1
                );
                tokio::select! {
                    _ = tokio::time::sleep(wait) => {}
                    _ = cancel.cancelled() => return Err(OracleFailure::Cancelled),
                }
            }
        }

        Err(last_failure)
    }
}

/// Convert the trimmed transcript into provider messages.
///
/// File context goes in just before the newest message; the attachment is
/// attached to the newest user turn.
fn build_messages(
    transcript: &[ChatMessage],
    files: Option<&FileSet>,
    attachment: Option<&Attachment>,
) -> Vec<Message> {
    let mut messages: Vec<Message> = transcript.iter().map(to_llm_message).collect();

    if let Some(files) = files.filter(|f| !f.is_empty()) {
        let at = messages.len().saturating_sub(1);
        messages.insert(at, Message::user(render_files(files)));
    }

    if let Some(attachment) = attachment {
        let target = messages
            .iter()
            .rposition(|m| m.role == MessageRole::User)
            .unwrap_or(messages.len());
        if target == messages.len() {
            messages.push(Message::user(""));
        }
        let message = &mut messages[target];
        if attachment.is_image() {
            *message = message
                .clone()
                .with_image(attachment.mime_type.clone(), attachment.data.clone());
        } else {
            let text = base64::engine::general_purpose::STANDARD
                .decode(attachment.data.as_bytes())
                .ok()
                .and_then(|bytes| String::from_utf8(bytes).ok())
                .unwrap_or_else(|| attachment.data.clone());
            message.content.push(prompt_forge_llm::MessageContent::Text {
                text: format!("Attached file {}:\n```\n{}\n```", attachment.name, text),
            });
        }
    }

    messages
}

fn to_llm_message(message: &ChatMessage) -> Message {
    match message.role {
        ChatRole::User | ChatRole::Correction => Message::user(message.content.clone()),
        ChatRole::System => Message::system(message.content.clone()),
        ChatRole::Model => match &message.plan {
            Some(plan) => Message::assistant(format!("{}\n\n{}", message.content, plan.to_markdown())),
            None => Message::assistant(message.content.clone()),
        },
    }
}

fn render_files(files: &FileSet) -> String {
    let mut out = String::from("Current project files:\n");
    for (path, content) in files {
        out.push_str(&format!("\nFile: {}\n```\n{}\n```\n", path, content));
    }
    out
}
