//! Prompt Forge
//!
//! Generation orchestration engine for prompt-to-app builders. It provides:
//! - The run state machine (plan, build, verify, correct)
//! - Linear per-project version history
//! - Oracle access with context trimming, decoding and retries
//! - Runtime telemetry feedback
//! - JSON configuration and workspace persistence

pub mod models;
pub mod services;
pub mod state;
pub mod storage;
pub mod utils;

pub use models::settings::{AppConfig, ContextBudget, SettingsUpdate};
pub use services::history::{HistoryStore, VersionSummary};
pub use services::orchestrator::{RunOrchestrator, RunOutcome, RunPhase, RunStatus};
pub use state::AppState;
pub use storage::{ConfigService, JsonWorkspaceStore};
pub use utils::error::{AppError, AppResult};
