//! Services
//!
//! Engine logic. The orchestrator drives a run; the other services are the
//! pieces it coordinates.

pub mod context;
pub mod history;
pub mod oracle;
pub mod orchestrator;
pub mod telemetry;

pub use context::ContextOptimizer;
pub use history::{HistoryStore, VersionSummary};
pub use oracle::{OracleGateway, OracleSession, RetryPolicy};
pub use orchestrator::{OrchestratorSettings, RunOrchestrator, RunOutcome, RunPhase, RunStatus};
pub use telemetry::{ErrorFeedbackMonitor, TelemetryHub, Verdict};
