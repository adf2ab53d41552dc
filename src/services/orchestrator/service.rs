//! Run Orchestrator
//!
//! Drives one project's run from a user message back to `Idle`:
//! Planning or Building, then Verifying, then Correcting until the app runs
//! clean or the correction budget is spent.
//!
//! Every commit made on behalf of a run goes through `commit_guarded`, which
//! holds the run table lock while committing. A run that was cancelled or
//! replaced can therefore never write into history. Lock order is always
//! run table first, history second.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use prompt_forge_core::{
    Attachment, ChatMessage, ConsoleLevel, ConsoleMessage, MessageAction, OracleResponse,
    StateSnapshot,
};
use tokio::sync::{Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;

use super::phase::{RunOutcome, RunPhase, RunState, RunStatus};
use crate::models::settings::AppConfig;
use crate::services::history::HistoryStore;
use crate::services::oracle::{OracleFailure, OracleGateway, OracleRequest, OracleSession, OracleTask};
use crate::services::telemetry::{ErrorFeedbackMonitor, TelemetryHub, Verdict};
use crate::utils::error::{AppError, AppResult};

/// Console entries quoted in one correction request
const MAX_REPORTED_ENTRIES: usize = 20;

/// Text sent when the user approves a pending plan
pub const APPROVAL_MESSAGE: &str = "The plan looks good. Build the app according to the plan.";

/// Orchestrator limits taken from `AppConfig`.
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub verify_timeout: Duration,
    pub max_auto_corrections: u32,
}

impl OrchestratorSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            verify_timeout: Duration::from_millis(config.verify_timeout_ms),
            max_auto_corrections: config.max_auto_corrections,
        }
    }
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// Identity of the run being driven.
struct RunHandle<'a> {
    project_id: &'a str,
    run_id: String,
    cancel: CancellationToken,
}

/// Coordinates oracle calls, history commits and verification per project.
pub struct RunOrchestrator {
    history: Arc<HistoryStore>,
    gateway: Arc<OracleGateway>,
    telemetry: Arc<TelemetryHub>,
    monitor: ErrorFeedbackMonitor,
    settings: OrchestratorSettings,
    runs: Mutex<HashMap<String, RunState>>,
    sessions: Mutex<HashMap<String, Arc<OracleSession>>>,
}

impl RunOrchestrator {
    pub fn new(
        history: Arc<HistoryStore>,
        gateway: Arc<OracleGateway>,
        telemetry: Arc<TelemetryHub>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            history,
            gateway,
            monitor: ErrorFeedbackMonitor::new(telemetry.clone()),
            telemetry,
            settings,
            runs: Mutex::new(HashMap::new()),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn history(&self) -> &Arc<HistoryStore> {
        &self.history
    }

    pub fn telemetry(&self) -> &Arc<TelemetryHub> {
        &self.telemetry
    }

    /// Start a run for a user message and drive it back to `Idle`.
    ///
    /// Refused with `RunInProgress` while the project has an active run.
    pub async fn send_message(
        &self,
        project_id: &str,
        text: &str,
        attachment: Option<Attachment>,
    ) -> AppResult<RunOutcome> {
        let text = text.trim();
        if text.is_empty() && attachment.is_none() {
            return Err(AppError::validation("Message must not be empty"));
        }

        let (run, task) = {
            let mut runs = self.idle_runs(project_id).await?;

            let mut message = ChatMessage::user(text);
            if let Some(attachment) = &attachment {
                message = message.with_attachment(attachment.clone());
            }
            let snapshot = self
                .history
                .commit_with(project_id, |s| s.with_message(message))
                .await?;

            let phase = initial_phase(&snapshot);
            let (run_id, cancel) = runs.entry(project_id.to_string()).or_default().begin(phase);
            tracing::info!(
                "[Orchestrator] project={} run={} phase idle -> {}",
                project_id,
                run_id,
                phase
            );
            let task = match phase {
                RunPhase::Planning => OracleTask::Plan,
                _ => OracleTask::Build,
            };
            (
                RunHandle {
                    project_id,
                    run_id,
                    cancel,
                },
                task,
            )
        };

        let outcome = self.drive(&run, task, attachment).await;
        self.finish(&run).await;

        match &outcome {
            Ok(result) => tracing::info!(
                "[Orchestrator] project={} run={} finished: {:?}",
                project_id,
                run.run_id,
                result
            ),
            Err(err) => tracing::warn!(
                "[Orchestrator] project={} run={} aborted: {}",
                project_id,
                run.run_id,
                err
            ),
        }
        outcome
    }

    /// Approve the pending plan and build it.
    pub async fn approve_plan(&self, project_id: &str) -> AppResult<RunOutcome> {
        if self.history.current(project_id).await?.plan.is_none() {
            return Err(AppError::validation("No plan is waiting for approval"));
        }
        self.send_message(project_id, APPROVAL_MESSAGE, None).await
    }

    /// Abort the active run. Returns false when the project was idle.
    pub async fn cancel(&self, project_id: &str) -> AppResult<bool> {
        let mut runs = self.runs.lock().await;
        let Some(state) = runs.get_mut(project_id) else {
            return Ok(false);
        };
        let Some(cancel) = state.cancel_token() else {
            return Ok(false);
        };

        let from = state.phase();
        cancel.cancel();
        state.finish();
        tracing::info!("[Orchestrator] project={} cancelled during {}", project_id, from);

        let notice = ChatMessage::system(OracleFailure::Cancelled.user_message());
        self.history
            .commit_with(project_id, |s| s.with_message(notice))
            .await?;
        Ok(true)
    }

    pub async fn status(&self, project_id: &str) -> AppResult<RunStatus> {
        let runs = self.runs.lock().await;
        let snapshot = self.history.current(project_id).await?;
        let mut status = runs
            .get(project_id)
            .map(RunState::status)
            .unwrap_or(RunStatus {
                phase: RunPhase::Idle,
                elapsed_ms: 0,
                cancellable: false,
                retry_count: 0,
            });
        if status.phase == RunPhase::Idle && snapshot.plan.is_some() {
            status.phase = RunPhase::AwaitingApproval;
        }
        Ok(status)
    }

    /// Feed one console emission from the sandbox.
    ///
    /// Emissions for unknown or deleted projects are dropped; returns whether
    /// the entry was buffered.
    pub async fn report_console(&self, project_id: &str, message: ConsoleMessage) -> bool {
        let _runs = self.runs.lock().await;
        if !self.history.contains(project_id).await {
            tracing::debug!("[Orchestrator] dropping telemetry for unknown project {}", project_id);
            return false;
        }
        self.telemetry.push(project_id, message).await;
        true
    }

    /// Step the project back one version. Refused while a run is active.
    pub async fn undo(&self, project_id: &str) -> AppResult<bool> {
        let _runs = self.idle_runs(project_id).await?;
        self.history.undo(project_id).await
    }

    /// Step the project forward one version. Refused while a run is active.
    pub async fn redo(&self, project_id: &str) -> AppResult<bool> {
        let _runs = self.idle_runs(project_id).await?;
        self.history.redo(project_id).await
    }

    pub async fn restore_to(&self, project_id: &str, index: usize) -> AppResult<()> {
        let _runs = self.idle_runs(project_id).await?;
        self.history.restore_to(project_id, index).await
    }

    pub async fn rename_project(&self, project_id: &str, name: &str) -> AppResult<()> {
        let _runs = self.idle_runs(project_id).await?;
        self.history.rename_project(project_id, name).await
    }

    /// Lock the run table, failing with `RunInProgress` if the project is running.
    ///
    /// Holding the guard keeps a run from starting until the caller is done.
    async fn idle_runs(&self, project_id: &str) -> AppResult<MutexGuard<'_, HashMap<String, RunState>>> {
        let runs = self.runs.lock().await;
        if runs.get(project_id).is_some_and(RunState::is_active) {
            return Err(AppError::RunInProgress(project_id.to_string()));
        }
        Ok(runs)
    }

    /// The project's oracle session, created on first use.
    pub async fn session(&self, project_id: &str) -> Arc<OracleSession> {
        self.sessions
            .lock()
            .await
            .entry(project_id.to_string())
            .or_insert_with(|| Arc::new(OracleSession::new(project_id)))
            .clone()
    }

    /// Cancel, forget and delete a project.
    pub async fn remove_project(&self, project_id: &str) -> AppResult<()> {
        let mut runs = self.runs.lock().await;
        if let Some(cancel) = runs.remove(project_id).and_then(|s| s.cancel_token()) {
            cancel.cancel();
        }
        self.telemetry.remove(project_id).await;
        self.sessions.lock().await.remove(project_id);
        self.history.delete_project(project_id).await
    }

    async fn drive(
        &self,
        run: &RunHandle<'_>,
        mut task: OracleTask,
        mut attachment: Option<Attachment>,
    ) -> AppResult<RunOutcome> {
        let session = self.session(run.project_id).await;
        let mut corrections = 0u32;

        loop {
            let snapshot = self.history.current(run.project_id).await?;
            let files = snapshot.has_generated_code.then_some(&snapshot.files);
            let request = OracleRequest {
                task,
                transcript: &snapshot.messages,
                files,
                attachment: attachment.as_ref(),
            };
            let result = self.gateway.ask(&session, request, &run.cancel).await;
            attachment = None;

            let response = match result {
                Ok(response) => response,
                Err(OracleFailure::Cancelled) => return Ok(RunOutcome::Cancelled),
                Err(failure) => {
                    tracing::warn!(
                        "[Orchestrator] project={} task={} failed: {}",
                        run.project_id,
                        task,
                        failure
                    );
                    let notice = ChatMessage::model(failure.user_message());
                    return self
                        .finish_with(run, |s| s.with_message(notice), RunOutcome::Failed(failure.to_string()))
                        .await;
                }
            };

            match response {
                OracleResponse::Chat { message } => {
                    let reply = ChatMessage::model(message);
                    return self
                        .finish_with(run, |s| s.with_message(reply), RunOutcome::Answered)
                        .await;
                }
                OracleResponse::Plan { message, plan } if task != OracleTask::Correct => {
                    let text = non_empty(message).unwrap_or_else(|| {
                        format!(
                            "Here is my plan for {}. Reply to approve it or ask for changes.",
                            plan.name
                        )
                    });
                    let reply = ChatMessage::model(text)
                        .with_plan(plan.clone())
                        .with_action(MessageAction::AwaitingPlanApproval);
                    return self
                        .finish_with(
                            run,
                            |s| s.with_plan(plan).with_message(reply),
                            RunOutcome::AwaitingApproval,
                        )
                        .await;
                }
                OracleResponse::Plan { message, plan } => {
                    // a plan does not fix anything; keep it as the final explanation
                    let reply = ChatMessage::model(non_empty(message).unwrap_or_else(|| plan.to_markdown()));
                    return self
                        .finish_with(run, |s| s.with_message(reply), RunOutcome::Answered)
                        .await;
                }
                OracleResponse::ModifyCode {
                    message,
                    modification,
                } => {
                    tracing::info!(
                        "[Orchestrator] project={} applying {} change(s): {}",
                        run.project_id,
                        modification.changes.len(),
                        modification.touched_paths().join(", ")
                    );
                    let text = non_empty(message).unwrap_or_else(|| modification.reason.clone());
                    let reply = ChatMessage::model(text).with_action(MessageAction::GotoPreview);
                    let applied = self
                        .commit_guarded(
                            run,
                            |s| s.with_modification(&modification, reply),
                            Some(RunPhase::Verifying),
                        )
                        .await?;
                    if !applied {
                        return Ok(RunOutcome::Cancelled);
                    }
                }
            }

            match self
                .monitor
                .watch(run.project_id, &run.cancel, self.settings.verify_timeout)
                .await
            {
                Verdict::Cancelled => return Ok(RunOutcome::Cancelled),
                Verdict::Clean | Verdict::Silent => return Ok(RunOutcome::Completed { corrections }),
                Verdict::Errors(entries) if corrections >= self.settings.max_auto_corrections => {
                    tracing::warn!(
                        "[Orchestrator] project={} still failing after {} correction(s)",
                        run.project_id,
                        corrections
                    );
                    let notice = ChatMessage::model(format!(
                        "I tried to fix the app automatically {} time(s), but it still reports errors. \
                         Please take a look and tell me how to proceed.\n\n{}",
                        corrections,
                        render_entries(&entries)
                    ));
                    return self
                        .finish_with(run, |s| s.with_message(notice), RunOutcome::CorrectionLimitReached)
                        .await;
                }
                Verdict::Errors(entries) => {
                    corrections += 1;
                    let report = ChatMessage::correction(correction_request(&entries));
                    let committed = self
                        .commit_guarded(run, |s| s.with_message(report), Some(RunPhase::Correcting))
                        .await?;
                    if !committed {
                        return Ok(RunOutcome::Cancelled);
                    }
                    task = OracleTask::Correct;
                }
            }
        }
    }

    /// Commit for `run` only while it is still the project's active run.
    ///
    /// Moving into `Verifying` also resets the telemetry buffer under the same
    /// lock, so errors from older code are never attributed to the new commit.
    async fn commit_guarded<F>(
        &self,
        run: &RunHandle<'_>,
        derive: F,
        next: Option<RunPhase>,
    ) -> AppResult<bool>
    where
        F: FnOnce(StateSnapshot) -> StateSnapshot,
    {
        let mut runs = self.runs.lock().await;
        let Some(state) = runs
            .get_mut(run.project_id)
            .filter(|state| state.is_run(&run.run_id))
        else {
            return Ok(false);
        };
        if run.cancel.is_cancelled() {
            return Ok(false);
        }

        self.history.commit_with(run.project_id, derive).await?;

        if let Some(next) = next {
            if next == RunPhase::Verifying {
                self.telemetry.reset(run.project_id).await;
            }
            tracing::info!(
                "[Orchestrator] project={} phase {} -> {}",
                run.project_id,
                state.phase(),
                next
            );
            state.enter(next);
        }
        Ok(true)
    }

    /// Commit the run's last message and report `outcome`.
    async fn finish_with<F>(&self, run: &RunHandle<'_>, derive: F, outcome: RunOutcome) -> AppResult<RunOutcome>
    where
        F: FnOnce(StateSnapshot) -> StateSnapshot,
    {
        if self.commit_guarded(run, derive, None).await? {
            Ok(outcome)
        } else {
            Ok(RunOutcome::Cancelled)
        }
    }

    async fn finish(&self, run: &RunHandle<'_>) {
        let mut runs = self.runs.lock().await;
        if let Some(state) = runs
            .get_mut(run.project_id)
            .filter(|state| state.is_run(&run.run_id))
        {
            tracing::debug!(
                "[Orchestrator] project={} phase {} -> idle",
                run.project_id,
                state.phase()
            );
            state.finish();
        }
    }
}

/// New apps are planned first; anything with code or an approved plan is built.
fn initial_phase(snapshot: &StateSnapshot) -> RunPhase {
    if snapshot.has_generated_code || snapshot.plan.is_some() {
        RunPhase::Building
    } else {
        RunPhase::Planning
    }
}

fn non_empty(text: Option<String>) -> Option<String> {
    text.filter(|t| !t.trim().is_empty())
}

fn render_entries(entries: &[ConsoleMessage]) -> String {
    let skip = entries.len().saturating_sub(MAX_REPORTED_ENTRIES);
    entries
        .iter()
        .skip(skip)
        .map(|entry| format!("[{}] {}", entry.level, entry.payload))
        .collect::<Vec<_>>()
        .join("\n")
}

fn correction_request(entries: &[ConsoleMessage]) -> String {
    let errors = entries.iter().filter(|e| e.level == ConsoleLevel::Error).count();
    format!(
        "The app reported {} runtime error(s) after the last change. \
         Fix the code so these errors no longer occur.\n\nConsole output:\n{}",
        errors,
        render_entries(entries)
    )
}
