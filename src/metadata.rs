//! Sync cursor tracking when each kind of update last succeeded.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Milliseconds since the Unix epoch. `0` means "never".
pub type Timestamp = u64;

/// Last full and partial update times.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncCursor {
    #[serde(rename = "lastFullUpdateTime", default)]
    pub last_full_update: Timestamp,
    #[serde(rename = "lastPartialUpdateTime", default)]
    pub last_partial_update: Timestamp,
}

/// Which update path is due.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateKind {
    Full,
    Partial,
}

impl SyncCursor {
    /// Cursor for state that has never been synchronized.
    pub fn never() -> Self {
        Self::default()
    }

    /// Check if no full update has ever succeeded.
    pub fn is_never_synced(&self) -> bool {
        self.last_full_update == 0
    }

    /// Most recent successful update of either kind.
    pub fn last_update(&self) -> Timestamp {
        self.last_full_update.max(self.last_partial_update)
    }

    /// Time elapsed since the last full update.
    ///
    /// A clock that went backwards yields zero.
    pub fn since_full(&self, now: Timestamp) -> Duration {
        Duration::from_millis(now.saturating_sub(self.last_full_update))
    }

    /// Time elapsed since the last partial update.
    pub fn since_partial(&self, now: Timestamp) -> Duration {
        Duration::from_millis(now.saturating_sub(self.last_partial_update))
    }

    /// Decide which update is due at `now`, if any.
    ///
    /// A full update is due when none ever succeeded or `full_interval` has
    /// elapsed, regardless of the partial cursor.
    pub fn due(
        &self,
        now: Timestamp,
        full_interval: Duration,
        partial_interval: Duration,
    ) -> Option<UpdateKind> {
        if self.is_never_synced() || self.since_full(now) >= full_interval {
            Some(UpdateKind::Full)
        } else if self.since_partial(now) >= partial_interval {
            Some(UpdateKind::Partial)
        } else {
            None
        }
    }

    /// Record a successful full update, which also satisfies the partial cadence.
    pub fn mark_full(&mut self, now: Timestamp) {
        self.last_full_update = now;
        self.last_partial_update = now;
    }

    /// Record a successful partial update.
    pub fn mark_partial(&mut self, now: Timestamp) {
        self.last_partial_update = now;
    }
}
