//! Last known logical state of a line.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;

use crate::error::{HardwareError, Result};

/// Logical state plus the wall-clock time it was recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StateSnapshot {
    pub pressed: bool,
    pub updated_at: DateTime<Utc>,
}

/// Shared, lock-guarded cache of the logical state.
///
/// Written by the dispatch worker (accepted edges) and by polled reads;
/// readable from any thread. Starts unset, and reads before the first store
/// fail with [`HardwareError::StateUnknown`].
#[derive(Debug, Default)]
pub struct CachedState {
    inner: RwLock<Option<StateSnapshot>>,
}

impl CachedState {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn store(&self, pressed: bool) {
        *self.inner.write() = Some(StateSnapshot {
            pressed,
            updated_at: Utc::now(),
        });
    }

    pub(crate) fn clear(&self) {
        *self.inner.write() = None;
    }

    /// Latest snapshot.
    pub fn snapshot(&self) -> Result<StateSnapshot> {
        (*self.inner.read()).ok_or(HardwareError::StateUnknown)
    }

    /// Latest logical state.
    pub fn pressed(&self) -> Result<bool> {
        self.snapshot().map(|snapshot| snapshot.pressed)
    }

    pub fn is_known(&self) -> bool {
        self.inner.read().is_some()
    }
}
