//! Run Phases
//!
//! The single explicit state of a project's generation run. Displays derive
//! from `RunStatus` only.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Where a project's run currently is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    #[default]
    Idle,
    Planning,
    /// Idle with a pending plan; reported, never stored
    AwaitingApproval,
    Building,
    Verifying,
    Correcting,
}

impl RunPhase {
    /// Phases in which an oracle call or verification wait can be in flight.
    pub fn is_running(&self) -> bool {
        matches!(
            self,
            RunPhase::Planning | RunPhase::Building | RunPhase::Verifying | RunPhase::Correcting
        )
    }
}

impl std::fmt::Display for RunPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunPhase::Idle => write!(f, "idle"),
            RunPhase::Planning => write!(f, "planning"),
            RunPhase::AwaitingApproval => write!(f, "awaiting_approval"),
            RunPhase::Building => write!(f, "building"),
            RunPhase::Verifying => write!(f, "verifying"),
            RunPhase::Correcting => write!(f, "correcting"),
        }
    }
}

/// What the UI renders for a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStatus {
    pub phase: RunPhase,
    /// Time spent in the active run, or in the last finished one
    pub elapsed_ms: u64,
    pub cancellable: bool,
    /// Automatic correction rounds in the active or last run
    pub retry_count: u32,
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The oracle answered with plain chat
    Answered,
    /// A plan was committed and waits for the user
    AwaitingApproval,
    /// Code was applied and verified clean
    Completed { corrections: u32 },
    /// Errors kept coming after the last allowed correction
    CorrectionLimitReached,
    Cancelled,
    /// Terminal oracle failure, already reported in the transcript
    Failed(String),
}

#[derive(Debug)]
struct ActiveRun {
    id: String,
    cancel: CancellationToken,
    started_at: Instant,
}

/// Per-project run bookkeeping.
#[derive(Debug, Default)]
pub(crate) struct RunState {
    phase: RunPhase,
    active: Option<ActiveRun>,
    last_elapsed: Duration,
    retry_count: u32,
}

impl RunState {
    pub(crate) fn phase(&self) -> RunPhase {
        self.phase
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// True while `run_id` is the run this state belongs to.
    pub(crate) fn is_run(&self, run_id: &str) -> bool {
        self.active.as_ref().is_some_and(|run| run.id == run_id)
    }

    pub(crate) fn cancel_token(&self) -> Option<CancellationToken> {
        self.active.as_ref().map(|run| run.cancel.clone())
    }

    /// Start a new run in `phase`.
    pub(crate) fn begin(&mut self, phase: RunPhase) -> (String, CancellationToken) {
        let run = ActiveRun {
            id: Uuid::new_v4().to_string(),
            cancel: CancellationToken::new(),
            started_at: Instant::now(),
        };
        let handle = (run.id.clone(), run.cancel.clone());
        self.active = Some(run);
        self.phase = phase;
        self.retry_count = 0;
        self.last_elapsed = Duration::ZERO;
        handle
    }

    pub(crate) fn enter(&mut self, phase: RunPhase) {
        if phase == RunPhase::Correcting {
            self.retry_count += 1;
        }
        self.phase = phase;
    }

    /// Back to idle; elapsed time stops.
    pub(crate) fn finish(&mut self) {
        if let Some(run) = self.active.take() {
            self.last_elapsed = run.started_at.elapsed();
        }
        self.phase = RunPhase::Idle;
    }

    pub(crate) fn elapsed(&self) -> Duration {
        self.active
            .as_ref()
            .map_or(self.last_elapsed, |run| run.started_at.elapsed())
    }

    pub(crate) fn status(&self) -> RunStatus {
        RunStatus {
            phase: self.phase,
            elapsed_ms: self.elapsed().as_millis() as u64,
            cancellable: self.is_active(),
            retry_count: self.retry_count,
        }
    }
}
