//! Integration Tests Module
//!
//! End-to-end tests of the engine against a scripted oracle:
//! run orchestration scenarios, history navigation through the store and
//! workspace persistence.

// Run orchestrator scenarios (plan, build, verify, correct, cancel)
mod orchestrator_test;

// History store navigation and project lifecycle
mod history_test;

// Workspace store and AppState save/load
mod persistence_test;

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use prompt_forge::services::context::ContextOptimizer;
use prompt_forge::services::history::HistoryStore;
use prompt_forge::services::oracle::{OracleGateway, RetryPolicy};
use prompt_forge::services::orchestrator::{OrchestratorSettings, RunOrchestrator, RunStatus};
use prompt_forge::services::telemetry::TelemetryHub;
use prompt_forge::ContextBudget;
use prompt_forge_llm::{
    LlmError, LlmProvider, LlmRequestOptions, LlmResponse, LlmResult, Message, ProviderConfig,
    StopReason, UsageStats,
};
use serde_json::json;

// ============================================================================
// Scripted oracle
// ============================================================================

/// One scripted provider reaction.
pub enum Step {
    Reply(String),
    Fail(LlmError),
    /// Never answers; only cancellation ends the call
    Hang,
}

/// A request as the provider received it.
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub messages: Vec<Message>,
    pub system: Option<String>,
}

impl CapturedRequest {
    pub fn text(&self) -> String {
        self.messages
            .iter()
            .map(|m| m.text_content())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

pub struct MockProvider {
    config: ProviderConfig,
    script: Mutex<VecDeque<Step>>,
    requests: Mutex<Vec<CapturedRequest>>,
}

impl MockProvider {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            config: ProviderConfig::default(),
            script: Mutex::new(steps.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn push(&self, step: Step) {
        self.script.lock().unwrap().push_back(step);
    }

    pub fn requests(&self) -> Vec<CapturedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn model(&self) -> &str {
        "mock-model"
    }

    async fn send_message(
        &self,
        messages: Vec<Message>,
        system: Option<String>,
        _request_options: LlmRequestOptions,
    ) -> LlmResult<LlmResponse> {
        self.requests
            .lock()
            .unwrap()
            .push(CapturedRequest { messages, system });
        let step = self.script.lock().unwrap().pop_front();
        match step {
            Some(Step::Reply(text)) => Ok(LlmResponse {
                content: Some(text),
                stop_reason: StopReason::EndTurn,
                usage: UsageStats {
                    input_tokens: 100,
                    output_tokens: 50,
                    thinking_tokens: None,
                },
                model: "mock-model".to_string(),
            }),
            Some(Step::Fail(err)) => Err(err),
            Some(Step::Hang) => std::future::pending().await,
            None => Err(LlmError::InvalidRequest {
                message: "script exhausted".to_string(),
            }),
        }
    }

    async fn health_check(&self) -> LlmResult<()> {
        Ok(())
    }

    fn config(&self) -> &ProviderConfig {
        &self.config
    }
}

// ============================================================================
// Oracle payloads
// ============================================================================

pub fn chat_reply(message: &str) -> Step {
    Step::Reply(json!({"type": "CHAT", "message": message}).to_string())
}

pub fn plan_reply(name: &str) -> Step {
    let body = json!({
        "type": "PLAN",
        "message": format!("Here is a plan for {}.", name),
        "plan": {
            "name": name,
            "description": "A simple list of things to do",
            "features": ["Add todos", "Complete todos"],
            "files": [
                {"path": "index.html", "purpose": "Markup"},
                {"path": "app.js", "purpose": "Logic"},
                {"path": "style.css", "purpose": "Styling"}
            ],
            "techStack": ["HTML", "JavaScript"]
        }
    });
    // oracles like to wrap their JSON in prose and fences
    Step::Reply(format!("Sure!\n```json\n{}\n```", body))
}

pub fn modify_reply(reason: &str, files: &[(&str, &str)]) -> Step {
    let changes: Vec<_> = files
        .iter()
        .map(|(path, content)| json!({"action": "create", "path": path, "content": content}))
        .collect();
    Step::Reply(
        json!({
            "type": "MODIFY_CODE",
            "modification": {
                "reason": reason,
                "changes": changes,
                "preview": {"web": "<h1>preview</h1>"}
            }
        })
        .to_string(),
    )
}

pub fn todo_app_reply() -> Step {
    modify_reply(
        "Initial build of the todo app",
        &[
            ("index.html", "<script src=\"app.js\"></script>"),
            ("app.js", "const todos = [];"),
            ("style.css", "body { margin: 0; }"),
        ],
    )
}

// ============================================================================
// Engine harness
// ============================================================================

pub struct Harness {
    pub orchestrator: Arc<RunOrchestrator>,
    pub history: Arc<HistoryStore>,
    pub provider: Arc<MockProvider>,
}

pub fn fast_settings(verify_timeout_ms: u64) -> OrchestratorSettings {
    OrchestratorSettings {
        verify_timeout: Duration::from_millis(verify_timeout_ms),
        max_auto_corrections: 3,
    }
}

pub fn harness(steps: Vec<Step>, settings: OrchestratorSettings) -> Harness {
    let provider = Arc::new(MockProvider::new(steps));
    let history = Arc::new(HistoryStore::new(20));
    let retry = RetryPolicy {
        max_retries: 2,
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
    };
    let gateway = Arc::new(OracleGateway::new(
        provider.clone(),
        ContextOptimizer::new(ContextBudget::default()).unwrap(),
        retry,
    ));
    let orchestrator = Arc::new(RunOrchestrator::new(
        history.clone(),
        gateway,
        Arc::new(TelemetryHub::new()),
        settings,
    ));
    Harness {
        orchestrator,
        history,
        provider,
    }
}

/// Poll the run status until `ready` holds.
pub async fn wait_for_status<F>(orchestrator: &RunOrchestrator, project_id: &str, ready: F) -> RunStatus
where
    F: Fn(&RunStatus) -> bool,
{
    for _ in 0..500 {
        let status = orchestrator.status(project_id).await.unwrap();
        if ready(&status) {
            return status;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("run status never reached the expected state");
}

/// Poll until the provider has received `count` requests.
pub async fn wait_for_calls(provider: &MockProvider, count: usize) {
    for _ in 0..500 {
        if provider.calls() >= count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("provider never received {} request(s)", count);
}
