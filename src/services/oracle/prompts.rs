//! Oracle Instructions
//!
//! System instructions per task. Every instruction pins the same JSON
//! envelope so the decoder can rely on a `type` tag.

use serde::{Deserialize, Serialize};

/// What the oracle is asked to do in one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OracleTask {
    /// Propose a plan for a new app
    Plan,
    /// Generate or modify code
    Build,
    /// Repair code after runtime errors
    Correct,
}

impl std::fmt::Display for OracleTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OracleTask::Plan => write!(f, "plan"),
            OracleTask::Build => write!(f, "build"),
            OracleTask::Correct => write!(f, "correct"),
        }
    }
}

const RESPONSE_FORMAT: &str = r#"Always answer with exactly one JSON object and nothing else. It must have one of these shapes:

{"type": "CHAT", "message": "<plain answer>"}

{"type": "PLAN", "message": "<optional short intro>", "plan": {
  "name": "<app name>", "description": "<one paragraph>",
  "features": ["..."], "files": [{"path": "...", "purpose": "..."}],
  "techStack": ["..."],
  "requirements": {"backend": ["..."], "frontend": ["..."], "standalone": ["..."]}
}}

{"type": "MODIFY_CODE", "message": "<optional summary>", "modification": {
  "rename": "<optional new project name>",
  "reason": "<what changed and why>",
  "changes": [{"action": "create|update|delete", "path": "...", "content": "<full file content, omitted for delete>"}],
  "preview": {"web": "<optional self-contained HTML preview>", "mobile": "<optional>"}
}}"#;

const PLAN_INSTRUCTION: &str = "You are an application architect. The user describes an app they want. \
Unless the request is a plain question, answer with a PLAN describing the app, its features and the files you intend to create. \
Do not write code yet.";

const BUILD_INSTRUCTION: &str = "You are an expert application developer. Implement the user's request. \
When a plan was approved earlier in the conversation, implement it completely. \
When project files are provided, modify them; send full file contents for every created or updated file. \
Answer questions that need no code change with CHAT.";

const CORRECT_INSTRUCTION: &str = "You are an expert debugger. The generated app raised runtime errors, reported in the last message. \
Fix the root cause with a MODIFY_CODE answer touching as few files as possible. \
If the errors cannot be fixed in code, explain why with CHAT.";

/// Reminder appended when re-issuing a call after a failure
pub const STRUCTURED_OUTPUT_REMINDER: &str = "Your previous answer could not be processed. \
You must return valid structured output: exactly one JSON object with a \"type\" of CHAT, PLAN or MODIFY_CODE, matching the documented shape, with no surrounding text.";

/// Full system instruction for a task
pub fn system_instruction(task: OracleTask) -> String {
    let role = match task {
        OracleTask::Plan => PLAN_INSTRUCTION,
        OracleTask::Build => BUILD_INSTRUCTION,
        OracleTask::Correct => CORRECT_INSTRUCTION,
    };
    format!("{}\n\n{}", role, RESPONSE_FORMAT)
}
