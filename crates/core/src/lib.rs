//! Prompt Forge Core
//!
//! Data model, version history and error types for the Prompt Forge
//! workspace. This crate has zero dependencies on application-level code
//! (LLM providers, storage backends, the console front end).
//!
//! ## Module Organization
//!
//! - `error` - Core error types (`CoreError`, `CoreResult`)
//! - `message` - Transcript entries (`ChatMessage`, `ChatRole`, `Attachment`)
//! - `plan` - Application plans proposed before any code exists
//! - `modification` - File changes and how they apply to a file set
//! - `snapshot` - One immutable version of a project
//! - `history` - Linear undo/redo over snapshots
//! - `project` - Projects, workspaces and the `WorkspaceRepository` seam
//! - `telemetry` - Console output captured from the preview sandbox
//! - `response` - The tagged oracle answer
//!
//! ## Design Principles
//!
//! 1. **Values, not handles** - snapshots are cloned and rebuilt, never mutated in place
//! 2. **Trait-based seams** - persistence is reached only through `WorkspaceRepository`
//! 3. **Unidirectional dependency** - this crate depends on nothing else in the workspace

pub mod error;
pub mod history;
pub mod message;
pub mod modification;
pub mod plan;
pub mod project;
pub mod response;
pub mod snapshot;
pub mod telemetry;

// ── Error Types ────────────────────────────────────────────────────────
pub use error::{CoreError, CoreResult};

// ── Transcript ─────────────────────────────────────────────────────────
pub use message::{Attachment, ChatMessage, ChatRole, MessageAction};

// ── Plans & Modifications ──────────────────────────────────────────────
pub use modification::{apply_changes, ChangeAction, FileChange, Modification};
pub use plan::{AppPlan, PlannedFile, RequirementBreakdown};

// ── Snapshots & History ────────────────────────────────────────────────
pub use history::{History, DEFAULT_HISTORY_CAP};
pub use snapshot::{FileSet, Preview, StateSnapshot};

// ── Projects & Persistence ─────────────────────────────────────────────
pub use project::{Project, ProjectSummary, Workspace, WorkspaceRepository};

// ── Oracle & Telemetry ─────────────────────────────────────────────────
pub use response::{OracleResponse, ResponseKind};
pub use telemetry::{ConsoleLevel, ConsoleMessage};
