//! Persistence Integration Tests
//!
//! Saving and reopening a workspace through `AppState` and the JSON store.

use std::sync::Arc;

use prompt_forge::services::orchestrator::RunOutcome;
use prompt_forge::{AppConfig, AppState, JsonWorkspaceStore};
use prompt_forge_core::{ChatRole, WorkspaceRepository};
use tempfile::TempDir;

use super::*;

async fn open_state(dir: &TempDir, steps: Vec<Step>) -> AppState {
    let config = AppConfig {
        verify_timeout_ms: 20,
        retry_initial_delay_ms: 1,
        retry_max_delay_ms: 5,
        ..AppConfig::default()
    };
    let repository: Arc<dyn WorkspaceRepository> =
        Arc::new(JsonWorkspaceStore::at(dir.path().join("workspace.json")));
    AppState::open(config, Arc::new(MockProvider::new(steps)), repository)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_workspace_survives_reopen() {
    let dir = TempDir::new().unwrap();

    let state = open_state(&dir, vec![plan_reply("Todo"), todo_app_reply()]).await;
    let id = state.create_project("Todo").await;
    state
        .orchestrator()
        .send_message(&id, "build me a todo app", None)
        .await
        .unwrap();
    let outcome = state.orchestrator().approve_plan(&id).await.unwrap();
    assert_eq!(outcome, RunOutcome::Completed { corrections: 0 });
    state.history().undo(&id).await.unwrap();
    state.save().await.unwrap();

    let reopened = open_state(&dir, vec![]).await;
    assert_eq!(reopened.active_project().await.as_deref(), Some(id.as_str()));

    let summary = reopened.history().summary(&id).await.unwrap();
    assert_eq!(summary.versions, 5);
    assert_eq!(summary.cursor, 3);

    // the redo tail was persisted too
    assert!(reopened.history().redo(&id).await.unwrap());
    let snapshot = reopened.history().current(&id).await.unwrap();
    assert_eq!(snapshot.files.len(), 3);
    assert!(snapshot
        .messages
        .iter()
        .any(|m| m.role == ChatRole::Model && m.plan.is_some()));
}

#[tokio::test]
async fn test_missing_workspace_opens_empty() {
    let dir = TempDir::new().unwrap();
    let state = open_state(&dir, vec![]).await;
    assert!(state.history().list_projects().await.is_empty());
    assert!(state.active_project().await.is_none());

    state.save().await.unwrap();
    assert!(dir.path().join("workspace.json").exists());
    assert!(!dir.path().join("workspace.json.tmp").exists());
}

#[tokio::test]
async fn test_deleted_project_is_not_saved() {
    let dir = TempDir::new().unwrap();
    let state = open_state(&dir, vec![]).await;
    let keep = state.create_project("Keep").await;
    let gone = state.create_project("Gone").await;

    state.delete_project(&gone).await.unwrap();
    assert!(state.active_project().await.is_none());
    state.set_active_project(&keep).await.unwrap();
    state.save().await.unwrap();

    let reopened = open_state(&dir, vec![]).await;
    let projects = reopened.history().list_projects().await;
    assert_eq!(projects.len(), 1);
    assert_eq!(projects[0].id, keep);
    assert!(reopened.set_active_project(&gone).await.is_err());
}

#[tokio::test]
async fn test_invalid_config_is_rejected() {
    let dir = TempDir::new().unwrap();
    let config = AppConfig {
        history_cap: 0,
        ..AppConfig::default()
    };
    let repository: Arc<dyn WorkspaceRepository> =
        Arc::new(JsonWorkspaceStore::at(dir.path().join("workspace.json")));
    let result = AppState::open(config, Arc::new(MockProvider::new(vec![])), repository).await;
    assert!(matches!(result, Err(prompt_forge::AppError::Config(_))));
}
