//! Run Orchestrator Integration Tests
//!
//! Drives full runs against the scripted oracle:
//! - Planning, approval and building
//! - Verification with runtime errors and automatic correction
//! - Cancellation, refusal of concurrent runs, failure reporting
//! - Independence of projects

use prompt_forge::services::orchestrator::{RunOutcome, RunPhase};
use prompt_forge::AppError;
use prompt_forge_core::{
    ChatMessage, ChatRole, ConsoleMessage, FileChange, MessageAction, Modification,
};
use prompt_forge_llm::LlmError;

use super::*;

// ============================================================================
// Helpers
// ============================================================================

async fn seed_code(h: &Harness, project_id: &str) {
    let modification = Modification {
        rename: None,
        reason: "seed".to_string(),
        changes: vec![
            FileChange::create("index.html", "<h1>Todo</h1>"),
            FileChange::create("app.js", "const todos = [];"),
        ],
        preview: None,
    };
    h.history
        .commit_with(project_id, |s| {
            s.with_modification(&modification, ChatMessage::model("seeded"))
        })
        .await
        .unwrap();
}

fn spawn_message(
    h: &Harness,
    project_id: &str,
    text: &str,
) -> tokio::task::JoinHandle<prompt_forge::AppResult<RunOutcome>> {
    let orchestrator = h.orchestrator.clone();
    let project = project_id.to_string();
    let text = text.to_string();
    tokio::spawn(async move { orchestrator.send_message(&project, &text, None).await })
}

// ============================================================================
// Planning and building
// ============================================================================

#[tokio::test]
async fn test_new_app_is_planned_first() {
    let h = harness(vec![plan_reply("Todo")], fast_settings(100));
    let id = h.history.create_project("Untitled").await.id;

    let outcome = h
        .orchestrator
        .send_message(&id, "build me a todo app", None)
        .await
        .unwrap();
    assert_eq!(outcome, RunOutcome::AwaitingApproval);

    let status = h.orchestrator.status(&id).await.unwrap();
    assert_eq!(status.phase, RunPhase::AwaitingApproval);
    assert!(!status.cancellable);

    let snapshot = h.history.current(&id).await.unwrap();
    assert_eq!(snapshot.plan.as_ref().unwrap().name, "Todo");
    assert!(!snapshot.has_generated_code);
    let last = snapshot.messages.last().unwrap();
    assert_eq!(last.role, ChatRole::Model);
    assert_eq!(last.action, Some(MessageAction::AwaitingPlanApproval));
    assert_eq!(last.plan.as_ref().unwrap().files.len(), 3);

    // seed, user message, plan
    assert_eq!(h.history.summary(&id).await.unwrap().versions, 3);

    let requests = h.provider.requests();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].system.as_deref().unwrap().contains("architect"));
    assert!(!requests[0].text().contains("Current project files:"));
}

#[tokio::test]
async fn test_approved_plan_is_built() {
    let h = harness(vec![plan_reply("Todo"), todo_app_reply()], fast_settings(50));
    let id = h.history.create_project("Untitled").await.id;

    h.orchestrator
        .send_message(&id, "build me a todo app", None)
        .await
        .unwrap();
    let outcome = h.orchestrator.approve_plan(&id).await.unwrap();
    assert_eq!(outcome, RunOutcome::Completed { corrections: 0 });

    let snapshot = h.history.current(&id).await.unwrap();
    assert_eq!(snapshot.files.len(), 3);
    assert!(snapshot.files.contains_key("style.css"));
    assert!(snapshot.has_generated_code);
    assert!(snapshot.plan.is_none());
    assert_eq!(snapshot.preview.web.as_deref(), Some("<h1>preview</h1>"));
    assert_eq!(
        snapshot.messages.last().unwrap().action,
        Some(MessageAction::GotoPreview)
    );
    // approval message and the modification are one version each
    assert_eq!(h.history.summary(&id).await.unwrap().versions, 5);
    assert_eq!(
        h.orchestrator.status(&id).await.unwrap().phase,
        RunPhase::Idle
    );

    let build = &h.provider.requests()[1];
    assert!(build.system.as_deref().unwrap().contains("developer"));
    assert!(build.text().contains("## Todo"));
    assert!(!build.text().contains("Current project files:"));
}

#[tokio::test]
async fn test_existing_code_is_sent_as_context() {
    let h = harness(
        vec![modify_reply("Dark mode", &[("style.css", "body { background: #000; }")])],
        fast_settings(50),
    );
    let id = h.history.create_project("Todo").await.id;
    seed_code(&h, &id).await;

    let outcome = h
        .orchestrator
        .send_message(&id, "add a dark mode to app.js", None)
        .await
        .unwrap();
    assert_eq!(outcome, RunOutcome::Completed { corrections: 0 });

    let request = &h.provider.requests()[0];
    assert!(request.text().contains("Current project files:"));
    assert!(request.text().contains("File: app.js"));

    let files = h.history.current(&id).await.unwrap().files;
    assert_eq!(files.len(), 3);
}

#[tokio::test]
async fn test_approve_without_plan_is_rejected() {
    let h = harness(vec![], fast_settings(50));
    let id = h.history.create_project("Todo").await.id;
    let err = h.orchestrator.approve_plan(&id).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
    assert_eq!(h.provider.calls(), 0);
}

#[tokio::test]
async fn test_chat_is_terminal() {
    let h = harness(vec![chat_reply("A todo app keeps a list of tasks.")], fast_settings(50));
    let id = h.history.create_project("Todo").await.id;

    let outcome = h
        .orchestrator
        .send_message(&id, "what is a todo app?", None)
        .await
        .unwrap();
    assert_eq!(outcome, RunOutcome::Answered);

    let snapshot = h.history.current(&id).await.unwrap();
    let last = snapshot.messages.last().unwrap();
    assert_eq!(last.role, ChatRole::Model);
    assert_eq!(last.content, "A todo app keeps a list of tasks.");
    assert_eq!(h.history.summary(&id).await.unwrap().versions, 3);

    let session = h.orchestrator.session(&id).await;
    assert_eq!(session.calls(), 1);
    assert_eq!(session.total_tokens(), 150);
}

// ============================================================================
// Verification and correction
// ============================================================================

#[tokio::test]
async fn test_runtime_error_triggers_correction() {
    let h = harness(
        vec![
            todo_app_reply(),
            modify_reply(
                "Define render",
                &[("app.js", "const todos = []; function render() {}")],
            ),
        ],
        fast_settings(1000),
    );
    let id = h.history.create_project("Todo").await.id;
    let run = spawn_message(&h, &id, "build a todo app");

    wait_for_status(&h.orchestrator, &id, |s| {
        s.phase == RunPhase::Verifying && s.retry_count == 0
    })
    .await;
    h.orchestrator
        .report_console(&id, ConsoleMessage::error("ReferenceError: render is not defined"))
        .await;

    wait_for_status(&h.orchestrator, &id, |s| {
        s.phase == RunPhase::Verifying && s.retry_count == 1
    })
    .await;
    h.orchestrator
        .report_console(&id, ConsoleMessage::log("rendered 0 todos"))
        .await;

    let outcome = run.await.unwrap().unwrap();
    assert_eq!(outcome, RunOutcome::Completed { corrections: 1 });

    let requests = h.provider.requests();
    assert_eq!(requests.len(), 2);
    let correction = &requests[1];
    assert!(correction.system.as_deref().unwrap().contains("debugger"));
    assert!(correction.text().contains("ReferenceError: render is not defined"));
    assert!(correction.text().contains("File: app.js"));

    let snapshot = h.history.current(&id).await.unwrap();
    assert_eq!(snapshot.files["app.js"], "const todos = []; function render() {}");
    assert!(snapshot
        .messages
        .iter()
        .any(|m| m.role == ChatRole::Correction && m.content.contains("ReferenceError")));

    let status = h.orchestrator.status(&id).await.unwrap();
    assert_eq!(status.phase, RunPhase::Idle);
    assert_eq!(status.retry_count, 1);
}

#[tokio::test]
async fn test_correction_limit_ends_run() {
    let mut settings = fast_settings(1000);
    settings.max_auto_corrections = 1;
    let h = harness(
        vec![
            todo_app_reply(),
            modify_reply("Try again", &[("app.js", "render();")]),
        ],
        settings,
    );
    let id = h.history.create_project("Todo").await.id;
    let run = spawn_message(&h, &id, "build a todo app");

    for round in 0..2 {
        wait_for_status(&h.orchestrator, &id, |s| {
            s.phase == RunPhase::Verifying && s.retry_count == round
        })
        .await;
        h.orchestrator
            .report_console(&id, ConsoleMessage::error("ReferenceError: render is not defined"))
            .await;
    }

    let outcome = run.await.unwrap().unwrap();
    assert_eq!(outcome, RunOutcome::CorrectionLimitReached);
    assert_eq!(h.provider.calls(), 2);

    let snapshot = h.history.current(&id).await.unwrap();
    let last = snapshot.messages.last().unwrap();
    assert_eq!(last.role, ChatRole::Model);
    assert!(last.content.contains("still reports errors"));
    assert!(last.content.contains("ReferenceError"));
    assert_eq!(
        h.orchestrator.status(&id).await.unwrap().phase,
        RunPhase::Idle
    );
}

#[tokio::test]
async fn test_stale_telemetry_is_cleared_on_commit() {
    let h = harness(vec![todo_app_reply()], fast_settings(50));
    let id = h.history.create_project("Todo").await.id;

    // left over from an older preview
    h.orchestrator
        .report_console(&id, ConsoleMessage::error("old failure"))
        .await;

    let outcome = h
        .orchestrator
        .send_message(&id, "build a todo app", None)
        .await
        .unwrap();
    assert_eq!(outcome, RunOutcome::Completed { corrections: 0 });
    assert_eq!(h.provider.calls(), 1);
}

// ============================================================================
// Cancellation and concurrency
// ============================================================================

#[tokio::test]
async fn test_cancel_mid_build() {
    let h = harness(vec![Step::Hang], fast_settings(50));
    let id = h.history.create_project("Todo").await.id;
    seed_code(&h, &id).await;

    let run = spawn_message(&h, &id, "make it blue");
    wait_for_calls(&h.provider, 1).await;

    let status = h.orchestrator.status(&id).await.unwrap();
    assert_eq!(status.phase, RunPhase::Building);
    assert!(status.cancellable);
    let versions_before = h.history.summary(&id).await.unwrap().versions;
    let files_before = h.history.current(&id).await.unwrap().files;

    assert!(h.orchestrator.cancel(&id).await.unwrap());
    assert_eq!(
        h.orchestrator.status(&id).await.unwrap().phase,
        RunPhase::Idle
    );

    let outcome = run.await.unwrap().unwrap();
    assert_eq!(outcome, RunOutcome::Cancelled);

    let snapshot = h.history.current(&id).await.unwrap();
    let last = snapshot.messages.last().unwrap();
    assert_eq!(last.role, ChatRole::System);
    assert_eq!(last.content, "Generation cancelled.");
    assert_eq!(snapshot.files, files_before);
    assert_eq!(
        h.history.summary(&id).await.unwrap().versions,
        versions_before + 1
    );

    // idempotent
    assert!(!h.orchestrator.cancel(&id).await.unwrap());
    assert_eq!(
        h.history.summary(&id).await.unwrap().versions,
        versions_before + 1
    );
}

#[tokio::test]
async fn test_cancel_during_correction() {
    let h = harness(vec![todo_app_reply(), Step::Hang], fast_settings(1000));
    let id = h.history.create_project("Todo").await.id;
    let run = spawn_message(&h, &id, "build a todo app");

    wait_for_status(&h.orchestrator, &id, |s| s.phase == RunPhase::Verifying).await;
    h.orchestrator
        .report_console(&id, ConsoleMessage::error("ReferenceError: render is not defined"))
        .await;
    wait_for_status(&h.orchestrator, &id, |s| s.phase == RunPhase::Correcting).await;
    wait_for_calls(&h.provider, 2).await;

    let files_before = h.history.current(&id).await.unwrap().files;
    assert!(h.orchestrator.cancel(&id).await.unwrap());
    assert_eq!(run.await.unwrap().unwrap(), RunOutcome::Cancelled);

    let status = h.orchestrator.status(&id).await.unwrap();
    assert_eq!(status.phase, RunPhase::Idle);
    assert!(!status.cancellable);

    let snapshot = h.history.current(&id).await.unwrap();
    assert_eq!(snapshot.files, files_before);
    assert_eq!(snapshot.files["app.js"], "const todos = [];");
    let last = snapshot.messages.last().unwrap();
    assert_eq!(last.role, ChatRole::System);
    assert_eq!(last.content, "Generation cancelled.");
    let applied = snapshot
        .messages
        .iter()
        .filter(|m| m.action == Some(MessageAction::GotoPreview))
        .count();
    assert_eq!(applied, 1);
    // seed, user message, build, correction request, cancel notice
    assert_eq!(h.history.summary(&id).await.unwrap().versions, 5);
}

#[tokio::test]
async fn test_history_navigation_refused_while_running() {
    let h = harness(vec![Step::Hang], fast_settings(50));
    let id = h.history.create_project("Todo").await.id;
    seed_code(&h, &id).await;

    let run = spawn_message(&h, &id, "make it blue");
    wait_for_calls(&h.provider, 1).await;
    let before = h.history.summary(&id).await.unwrap();

    assert!(matches!(
        h.orchestrator.undo(&id).await,
        Err(AppError::RunInProgress(_))
    ));
    assert!(matches!(
        h.orchestrator.redo(&id).await,
        Err(AppError::RunInProgress(_))
    ));
    assert!(matches!(
        h.orchestrator.restore_to(&id, 0).await,
        Err(AppError::RunInProgress(_))
    ));
    assert!(matches!(
        h.orchestrator.rename_project(&id, "Blue Todo").await,
        Err(AppError::RunInProgress(_))
    ));

    let after = h.history.summary(&id).await.unwrap();
    assert_eq!(after, before);
    let last = h.history.current(&id).await.unwrap().messages.pop().unwrap();
    assert_eq!(last.role, ChatRole::User);
    assert_eq!(last.content, "make it blue");

    h.orchestrator.cancel(&id).await.unwrap();
    assert_eq!(run.await.unwrap().unwrap(), RunOutcome::Cancelled);

    // allowed again once the run is over
    assert!(h.orchestrator.undo(&id).await.unwrap());
    let snapshot = h.history.current(&id).await.unwrap();
    assert_eq!(snapshot.messages.last().unwrap().content, "make it blue");
    h.orchestrator.rename_project(&id, "Blue Todo").await.unwrap();
    assert_eq!(h.history.summary(&id).await.unwrap().name, "Blue Todo");
}

#[tokio::test]
async fn test_second_message_refused_while_running() {
    let h = harness(vec![Step::Hang], fast_settings(50));
    let id = h.history.create_project("Todo").await.id;

    let run = spawn_message(&h, &id, "build a todo app");
    wait_for_calls(&h.provider, 1).await;

    let err = h
        .orchestrator
        .send_message(&id, "also add login", None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::RunInProgress(ref p) if p == &id));

    h.orchestrator.cancel(&id).await.unwrap();
    assert_eq!(run.await.unwrap().unwrap(), RunOutcome::Cancelled);

    let snapshot = h.history.current(&id).await.unwrap();
    assert!(!snapshot.messages.iter().any(|m| m.content == "also add login"));
}

#[tokio::test]
async fn test_projects_run_independently() {
    let h = harness(vec![Step::Hang, chat_reply("answer for b")], fast_settings(50));
    let a = h.history.create_project("A").await.id;
    let b = h.history.create_project("B").await.id;

    let run_a = spawn_message(&h, &a, "build app a");
    wait_for_calls(&h.provider, 1).await;

    let outcome_b = h
        .orchestrator
        .send_message(&b, "question for b", None)
        .await
        .unwrap();
    assert_eq!(outcome_b, RunOutcome::Answered);
    assert_eq!(
        h.orchestrator.status(&a).await.unwrap().phase,
        RunPhase::Planning
    );

    h.orchestrator.cancel(&a).await.unwrap();
    assert_eq!(run_a.await.unwrap().unwrap(), RunOutcome::Cancelled);

    let b_messages = h.history.current(&b).await.unwrap().messages;
    assert!(!b_messages.iter().any(|m| m.content.contains("app a")));
}

#[tokio::test]
async fn test_remove_project_tears_down_run() {
    let h = harness(vec![Step::Hang], fast_settings(50));
    let id = h.history.create_project("Todo").await.id;

    let run = spawn_message(&h, &id, "build a todo app");
    wait_for_calls(&h.provider, 1).await;

    h.orchestrator.remove_project(&id).await.unwrap();
    assert_eq!(run.await.unwrap().unwrap(), RunOutcome::Cancelled);
    assert!(!h.history.contains(&id).await);
    assert!(matches!(
        h.orchestrator.status(&id).await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_telemetry_for_removed_project_is_dropped() {
    let h = harness(vec![], fast_settings(50));
    let id = h.history.create_project("Todo").await.id;

    assert!(h.orchestrator.report_console(&id, ConsoleMessage::log("ready")).await);
    assert!(h.orchestrator.telemetry().contains(&id).await);

    h.orchestrator.remove_project(&id).await.unwrap();
    assert!(!h.orchestrator.telemetry().contains(&id).await);

    for _ in 0..10 {
        assert!(!h
            .orchestrator
            .report_console(&id, ConsoleMessage::error("late"))
            .await);
    }
    assert!(!h
        .orchestrator
        .report_console("never-created", ConsoleMessage::log("stray"))
        .await);
    assert!(!h.orchestrator.telemetry().contains(&id).await);
    assert!(!h.orchestrator.telemetry().contains("never-created").await);
}

// ============================================================================
// Failures
// ============================================================================

#[tokio::test]
async fn test_transient_failures_are_retried_then_reported() {
    let server_error = || {
        Step::Fail(LlmError::ServerError {
            message: "HTTP 503".to_string(),
            status: Some(503),
        })
    };
    let h = harness(
        vec![server_error(), server_error(), server_error()],
        fast_settings(50),
    );
    let id = h.history.create_project("Todo").await.id;

    let outcome = h
        .orchestrator
        .send_message(&id, "build a todo app", None)
        .await
        .unwrap();
    assert!(matches!(outcome, RunOutcome::Failed(ref detail) if detail.contains("503")));
    assert_eq!(h.provider.calls(), 3);

    let last = h.history.current(&id).await.unwrap().messages.pop().unwrap();
    assert_eq!(last.role, ChatRole::Model);
    assert!(last.content.contains("temporarily unavailable"));
    assert!(!last.content.contains("503"));
    assert_eq!(
        h.orchestrator.status(&id).await.unwrap().phase,
        RunPhase::Idle
    );
}

#[tokio::test]
async fn test_auth_failure_is_not_retried() {
    let h = harness(
        vec![Step::Fail(LlmError::AuthenticationFailed {
            message: "bad key".to_string(),
        })],
        fast_settings(50),
    );
    let id = h.history.create_project("Todo").await.id;

    let outcome = h
        .orchestrator
        .send_message(&id, "build a todo app", None)
        .await
        .unwrap();
    assert!(matches!(outcome, RunOutcome::Failed(_)));
    assert_eq!(h.provider.calls(), 1);
}

#[tokio::test]
async fn test_malformed_output_is_retried_with_reminder() {
    let h = harness(
        vec![
            Step::Reply("Sorry, I can only answer in prose.".to_string()),
            chat_reply("Hello!"),
        ],
        fast_settings(50),
    );
    let id = h.history.create_project("Todo").await.id;

    let outcome = h.orchestrator.send_message(&id, "hi", None).await.unwrap();
    assert_eq!(outcome, RunOutcome::Answered);

    let requests = h.provider.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].messages.len(), requests[0].messages.len() + 1);
    assert!(requests[1].text().contains("valid structured output"));
}

#[tokio::test]
async fn test_empty_message_is_rejected() {
    let h = harness(vec![], fast_settings(50));
    let id = h.history.create_project("Todo").await.id;
    let err = h.orchestrator.send_message(&id, "   ", None).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
    assert_eq!(h.history.summary(&id).await.unwrap().versions, 1);
}
