//! History Store Integration Tests
//!
//! Linear undo/redo through the store, version cap and project lifecycle,
//! including interaction with orchestrated runs.

use prompt_forge::services::history::HistoryStore;
use prompt_forge::services::orchestrator::RunOutcome;
use prompt_forge::AppError;
use prompt_forge_core::{ChatMessage, CoreError};

use super::*;

async fn commit_text(store: &HistoryStore, project_id: &str, text: &str) {
    store
        .commit_with(project_id, |s| s.with_message(ChatMessage::user(text)))
        .await
        .unwrap();
}

async fn last_text(store: &HistoryStore, project_id: &str) -> Option<String> {
    store
        .current(project_id)
        .await
        .unwrap()
        .messages
        .last()
        .map(|m| m.content.clone())
}

#[tokio::test]
async fn test_commit_after_undo_drops_redo_tail() {
    let store = HistoryStore::new(20);
    let id = store.create_project("App").await.id;
    commit_text(&store, &id, "a").await;
    commit_text(&store, &id, "b").await;

    assert!(store.undo(&id).await.unwrap());
    assert_eq!(last_text(&store, &id).await.as_deref(), Some("a"));

    commit_text(&store, &id, "c").await;
    assert!(!store.redo(&id).await.unwrap());
    assert_eq!(last_text(&store, &id).await.as_deref(), Some("c"));

    let counts: Vec<usize> = store
        .versions(&id)
        .await
        .unwrap()
        .iter()
        .map(|v| v.message_count)
        .collect();
    assert_eq!(counts, vec![0, 1, 2]);
}

#[tokio::test]
async fn test_cap_keeps_newest_versions() {
    let store = HistoryStore::new(3);
    let id = store.create_project("App").await.id;
    for i in 0..10 {
        commit_text(&store, &id, &format!("m{}", i)).await;
        let summary = store.summary(&id).await.unwrap();
        assert!(summary.versions <= 3);
        assert_eq!(summary.cursor, summary.versions - 1);
    }
    assert_eq!(last_text(&store, &id).await.as_deref(), Some("m9"));

    // the oldest retained version is now the floor
    store.restore_to(&id, 0).await.unwrap();
    assert_eq!(last_text(&store, &id).await.as_deref(), Some("m7"));
    assert!(!store.undo(&id).await.unwrap());
}

#[tokio::test]
async fn test_restore_out_of_range_keeps_cursor() {
    let store = HistoryStore::new(20);
    let id = store.create_project("App").await.id;
    commit_text(&store, &id, "a").await;

    let err = store.restore_to(&id, 5).await.unwrap_err();
    assert!(matches!(
        err,
        AppError::Core(CoreError::OutOfRange { index: 5, len: 2 })
    ));
    assert_eq!(store.summary(&id).await.unwrap().cursor, 1);
}

#[tokio::test]
async fn test_undo_of_generated_code_and_resend() {
    let h = harness(
        vec![
            todo_app_reply(),
            modify_reply("Rewrite", &[("app.js", "const todos = ['x'];")]),
        ],
        fast_settings(20),
    );
    let id = h.history.create_project("Todo").await.id;

    h.orchestrator
        .send_message(&id, "build a todo app", None)
        .await
        .unwrap();
    assert_eq!(h.history.current(&id).await.unwrap().files.len(), 3);

    // back to before the user message
    h.history.restore_to(&id, 0).await.unwrap();
    let blank = h.history.current(&id).await.unwrap();
    assert!(blank.files.is_empty());
    assert!(!blank.has_generated_code);

    let outcome = h
        .orchestrator
        .send_message(&id, "build it with one file", None)
        .await
        .unwrap();
    assert_eq!(outcome, RunOutcome::Completed { corrections: 0 });

    // the earlier branch is gone
    let summary = h.history.summary(&id).await.unwrap();
    assert_eq!(summary.versions, 3);
    assert_eq!(summary.file_count, 1);
    assert!(!h.history.redo(&id).await.unwrap());
}

#[tokio::test]
async fn test_rename_and_delete_projects() {
    let store = HistoryStore::new(20);
    let a = store.create_project("First").await.id;
    let b = store.create_project("Second").await.id;

    store.rename_project(&a, "Renamed").await.unwrap();
    let names: Vec<String> = store
        .list_projects()
        .await
        .into_iter()
        .map(|p| p.name)
        .collect();
    assert_eq!(names, vec!["Renamed", "Second"]);

    store.delete_project(&a).await.unwrap();
    assert!(!store.contains(&a).await);
    assert!(store.contains(&b).await);
    assert!(matches!(
        store.undo(&a).await,
        Err(AppError::NotFound(_))
    ));
}
