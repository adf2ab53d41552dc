//! Version History
//!
//! Linear undo/redo over immutable snapshots. Committing after an undo drops
//! the redoable tail; exceeding the cap drops the oldest versions while the
//! cursor keeps pointing at the same snapshot.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::snapshot::StateSnapshot;

/// Default number of versions kept per project.
pub const DEFAULT_HISTORY_CAP: usize = 20;

fn default_cap() -> usize {
    DEFAULT_HISTORY_CAP
}

/// Ordered snapshots plus a cursor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct History {
    snapshots: Vec<StateSnapshot>,
    cursor: usize,
    #[serde(default = "default_cap")]
    cap: usize,
}

impl History {
    /// Start a history from its seed snapshot.
    pub fn new(seed: StateSnapshot, cap: usize) -> Self {
        Self {
            snapshots: vec![seed],
            cursor: 0,
            cap: cap.max(1),
        }
    }

    /// Append a version after the cursor, discarding any redoable tail.
    pub fn commit(&mut self, snapshot: StateSnapshot) {
        self.snapshots.truncate(self.cursor + 1);
        self.snapshots.push(snapshot);
        self.cursor = self.snapshots.len() - 1;

        if self.snapshots.len() > self.cap {
            let overflow = self.snapshots.len() - self.cap;
            self.snapshots.drain(..overflow);
            self.cursor -= overflow;
        }
    }

    /// Step back one version. Returns false at the oldest version.
    pub fn undo(&mut self) -> bool {
        if self.cursor == 0 {
            return false;
        }
        self.cursor -= 1;
        true
    }

    /// Step forward one version. Returns false at the newest version.
    pub fn redo(&mut self) -> bool {
        if self.cursor + 1 >= self.snapshots.len() {
            return false;
        }
        self.cursor += 1;
        true
    }

    /// Jump straight to a stored version.
    pub fn restore_to(&mut self, index: usize) -> CoreResult<()> {
        if index >= self.snapshots.len() {
            return Err(CoreError::OutOfRange {
                index,
                len: self.snapshots.len(),
            });
        }
        self.cursor = index;
        Ok(())
    }

    /// The snapshot at the cursor.
    pub fn current(&self) -> Option<&StateSnapshot> {
        self.snapshots.get(self.cursor)
    }

    pub fn get(&self, index: usize) -> Option<&StateSnapshot> {
        self.snapshots.get(index)
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    /// Change the cap; a smaller cap drops the oldest versions.
    pub fn set_cap(&mut self, cap: usize) {
        self.cap = cap.max(1);
        self.repair();
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor + 1 < self.snapshots.len()
    }

    /// Bring a deserialized history back within its invariants.
    ///
    /// Clamps the cursor, enforces the cap (keeping the newest versions) and
    /// reports whether anything changed. An empty history cannot be repaired.
    pub fn repair(&mut self) -> bool {
        let mut changed = false;
        if self.cap == 0 {
            self.cap = DEFAULT_HISTORY_CAP;
            changed = true;
        }
        if self.snapshots.is_empty() {
            return changed;
        }
        if self.snapshots.len() > self.cap {
            let overflow = self.snapshots.len() - self.cap;
            self.snapshots.drain(..overflow);
            self.cursor = self.cursor.saturating_sub(overflow);
            changed = true;
        }
        if self.cursor >= self.snapshots.len() {
            self.cursor = self.snapshots.len() - 1;
            changed = true;
        }
        changed
    }
}
