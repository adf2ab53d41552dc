//! Oracle Sessions
//!
//! One session per project, passed explicitly into every gateway call so
//! concurrent projects never share oracle state.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use prompt_forge_llm::UsageStats;

/// Per-project oracle bookkeeping.
#[derive(Debug)]
pub struct OracleSession {
    project_id: String,
    calls: AtomicU32,
    failures: AtomicU32,
    input_tokens: AtomicU64,
    output_tokens: AtomicU64,
}

impl OracleSession {
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            calls: AtomicU32::new(0),
            failures: AtomicU32::new(0),
            input_tokens: AtomicU64::new(0),
            output_tokens: AtomicU64::new(0),
        }
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// Count one provider round trip and its token usage.
    pub fn record_call(&self, usage: &UsageStats) {
        self.calls.fetch_add(1, Ordering::Relaxed);
        self.input_tokens
            .fetch_add(u64::from(usage.input_tokens), Ordering::Relaxed);
        self.output_tokens.fetch_add(
            u64::from(usage.output_tokens + usage.thinking_tokens.unwrap_or(0)),
            Ordering::Relaxed,
        );
    }

    /// Count one round trip that produced no response.
    pub fn record_failure(&self) {
        self.calls.fetch_add(1, Ordering::Relaxed);
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::Relaxed)
    }

    pub fn failures(&self) -> u32 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Token totals across all calls of this session
    pub fn total_tokens(&self) -> u64 {
        self.input_tokens.load(Ordering::Relaxed) + self.output_tokens.load(Ordering::Relaxed)
    }
}
