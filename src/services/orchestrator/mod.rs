//! Run Orchestration
//!
//! The per-project state machine that turns user messages into committed
//! snapshots: plan, build, verify, correct.

mod phase;
mod service;

pub use phase::{RunOutcome, RunPhase, RunStatus};
pub use service::{OrchestratorSettings, RunOrchestrator, APPROVAL_MESSAGE};
