//! Fixed-window edge debouncing.
//!
//! Mechanical contacts bounce: a single press produces a burst of alternating
//! rising and falling edges within a few milliseconds. [`DebounceFilter`]
//! keeps one watermark shared by both directions and drops every edge that
//! arrives less than `window` after the last accepted one. Most buttons are
//! clean with a 5 to 20 ms window.
//!
//! The filter compares the timestamps carried by the events, so it behaves
//! the same whether the events come from the kernel or from a simulation.

use std::time::Duration;

use pushline_core::{EdgeEvent, EdgeTimestamp};
use tracing::trace;

/// Time-window filter over edge events.
///
/// # Examples
///
/// ```
/// use pushline_core::{EdgeEvent, EdgeTimestamp};
/// use pushline_hardware::DebounceFilter;
/// use std::time::Duration;
///
/// let mut filter = DebounceFilter::new(Duration::from_micros(5000));
///
/// assert!(filter.accept(&EdgeEvent::falling(EdgeTimestamp::from_micros(0))));
/// assert!(!filter.accept(&EdgeEvent::rising(EdgeTimestamp::from_micros(2000))));
/// assert!(filter.accept(&EdgeEvent::rising(EdgeTimestamp::from_micros(8000))));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebounceFilter {
    window_micros: u64,
    last_accepted: Option<EdgeTimestamp>,
}

impl DebounceFilter {
    /// Create a filter with the given minimum interval between accepted edges.
    ///
    /// A zero window disables filtering.
    pub fn new(window: Duration) -> Self {
        Self {
            window_micros: u64::try_from(window.as_micros()).unwrap_or(u64::MAX),
            last_accepted: None,
        }
    }

    /// Create a filter from a window expressed in microseconds.
    pub fn from_micros(window_micros: u32) -> Self {
        Self {
            window_micros: u64::from(window_micros),
            last_accepted: None,
        }
    }

    /// Create a filter that accepts every edge.
    pub fn disabled() -> Self {
        Self::from_micros(0)
    }

    /// Decide whether `event` is a real transition or contact bounce.
    ///
    /// Accepted events move the watermark, rejected ones leave it untouched.
    pub fn accept(&mut self, event: &EdgeEvent) -> bool {
        let timestamp = event.timestamp();

        let Some(last) = self.last_accepted else {
            self.last_accepted = Some(timestamp);
            return true;
        };

        if self.window_micros > 0 {
            let elapsed = timestamp.micros_since(&last);
            if elapsed < i128::from(self.window_micros) {
                trace!(
                    direction = %event.direction(),
                    elapsed_us = elapsed as i64,
                    window_us = self.window_micros,
                    "Rejected edge inside debounce window"
                );
                return false;
            }
        }

        self.last_accepted = Some(timestamp);
        true
    }

    /// Forget the watermark, so the next edge is accepted unconditionally.
    pub fn reset(&mut self) {
        self.last_accepted = None;
    }

    /// Configured window.
    pub fn window(&self) -> Duration {
        Duration::from_micros(self.window_micros)
    }

    /// Check if filtering is disabled.
    pub fn is_disabled(&self) -> bool {
        self.window_micros == 0
    }

    /// Timestamp of the last accepted edge.
    pub fn last_accepted(&self) -> Option<EdgeTimestamp> {
        self.last_accepted
    }
}

impl Default for DebounceFilter {
    fn default() -> Self {
        Self::disabled()
    }
}
