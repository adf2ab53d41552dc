//! Error-Feedback Monitor
//!
//! Watches a project's telemetry while its run is verifying. The wait is a
//! race between buffer changes, the verify timeout and the run's
//! cancellation token.

use std::sync::Arc;
use std::time::Duration;

use prompt_forge_core::ConsoleMessage;
use tokio_util::sync::CancellationToken;

use super::hub::TelemetryHub;

/// Outcome of one verification window.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    /// Telemetry arrived and none of it was an error
    Clean,
    /// Nothing arrived before the timeout; treated as clean
    Silent,
    /// Error-level telemetry; carries the whole buffer at that moment
    Errors(Vec<ConsoleMessage>),
    Cancelled,
}

impl Verdict {
    pub fn is_clean(&self) -> bool {
        matches!(self, Verdict::Clean | Verdict::Silent)
    }
}

/// Classifies a project's telemetry stream as clean or erroring.
pub struct ErrorFeedbackMonitor {
    hub: Arc<TelemetryHub>,
}

impl ErrorFeedbackMonitor {
    pub fn new(hub: Arc<TelemetryHub>) -> Self {
        Self { hub }
    }

    /// Wait up to `timeout` for a verdict on `project_id`.
    ///
    /// On the first error the buffer is handed over and cleared.
    pub async fn watch(
        &self,
        project_id: &str,
        cancel: &CancellationToken,
        timeout: Duration,
    ) -> Verdict {
        let Some(mut rx) = self.hub.subscribe(project_id).await else {
            // buffer removed with its project
            return if cancel.is_cancelled() {
                Verdict::Cancelled
            } else {
                Verdict::Silent
            };
        };
        let deadline = tokio::time::sleep(timeout);
        tokio::pin!(deadline);

        loop {
            let (has_error, has_entries) = {
                let buffer = rx.borrow_and_update();
                (buffer.iter().any(|m| m.level.is_error()), !buffer.is_empty())
            };

            if has_error {
                let errors = self.hub.take(project_id).await;
                tracing::info!(
                    "[Monitor] project={} captured {} telemetry entries with errors",
                    project_id,
                    errors.len()
                );
                return Verdict::Errors(errors);
            }
            if has_entries {
                tracing::debug!("[Monitor] project={} clean telemetry", project_id);
                return Verdict::Clean;
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Verdict::Cancelled,
                _ = &mut deadline => {
                    tracing::debug!("[Monitor] project={} no telemetry within {}ms", project_id, timeout.as_millis());
                    return Verdict::Silent;
                }
                changed = rx.changed() => {
                    if changed.is_err() {
                        // buffer removed with its project
                        return Verdict::Silent;
                    }
                }
            }
        }
    }
}
