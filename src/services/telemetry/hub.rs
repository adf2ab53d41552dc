//! Telemetry Hub
//!
//! Per-project console buffers shared between the sandbox (producer) and the
//! error-feedback monitor (consumer). Each buffer is a `watch` channel so the
//! monitor wakes on every change instead of polling.

use std::collections::HashMap;
use std::sync::Arc;

use prompt_forge_core::ConsoleMessage;
use tokio::sync::{watch, RwLock};

/// Max entries kept per project; the oldest are dropped first
pub const TELEMETRY_CAPACITY: usize = 500;

type Buffer = Vec<ConsoleMessage>;

/// Registry of telemetry buffers keyed by project id.
#[derive(Default)]
pub struct TelemetryHub {
    buffers: RwLock<HashMap<String, Arc<watch::Sender<Buffer>>>>,
}

impl TelemetryHub {
    pub fn new() -> Self {
        Self::default()
    }

    async fn sender(&self, project_id: &str) -> Option<Arc<watch::Sender<Buffer>>> {
        self.buffers.read().await.get(project_id).cloned()
    }

    async fn sender_or_create(&self, project_id: &str) -> Arc<watch::Sender<Buffer>> {
        if let Some(sender) = self.sender(project_id).await {
            return sender;
        }
        let mut buffers = self.buffers.write().await;
        buffers
            .entry(project_id.to_string())
            .or_insert_with(|| Arc::new(watch::channel(Vec::new()).0))
            .clone()
    }

    /// Append one console emission, creating the project's buffer if needed.
    ///
    /// Callers only push for projects that exist.
    pub async fn push(&self, project_id: &str, message: ConsoleMessage) {
        self.sender_or_create(project_id).await.send_modify(|buffer| {
            buffer.push(message);
            if buffer.len() > TELEMETRY_CAPACITY {
                let overflow = buffer.len() - TELEMETRY_CAPACITY;
                buffer.drain(..overflow);
            }
        });
    }

    /// Start an empty buffer for a project, clearing any existing one in one step.
    pub async fn reset(&self, project_id: &str) {
        self.sender_or_create(project_id).await.send_if_modified(|buffer| {
            let had_entries = !buffer.is_empty();
            buffer.clear();
            had_entries
        });
    }

    /// Remove and return every buffered entry in one step.
    pub async fn take(&self, project_id: &str) -> Vec<ConsoleMessage> {
        let Some(sender) = self.sender(project_id).await else {
            return Vec::new();
        };
        let mut taken = Vec::new();
        sender.send_if_modified(|buffer| {
            taken = std::mem::take(buffer);
            !taken.is_empty()
        });
        taken
    }

    /// Current buffer contents.
    pub async fn snapshot(&self, project_id: &str) -> Vec<ConsoleMessage> {
        match self.sender(project_id).await {
            Some(sender) => sender.borrow().clone(),
            None => Vec::new(),
        }
    }

    /// Watch a project's buffer; `None` when the project has none.
    pub async fn subscribe(&self, project_id: &str) -> Option<watch::Receiver<Buffer>> {
        self.sender(project_id).await.map(|sender| sender.subscribe())
    }

    pub async fn contains(&self, project_id: &str) -> bool {
        self.buffers.read().await.contains_key(project_id)
    }

    /// Drop a project's buffer.
    pub async fn remove(&self, project_id: &str) {
        self.buffers.write().await.remove(project_id);
    }
}
