//! Core constants for the pushline button stack.
//!
//! Defaults shared by the line drivers, the event dispatcher and the reset
//! button state machine. Values that describe the legacy button library
//! (line range, PUD numbering, power commands) must stay as they are to
//! remain drop-in compatible with boards wired for it.
//!
//! # Usage
//!
//! ```
//! use pushline_core::constants::*;
//! use std::time::Duration;
//!
//! assert_eq!(LEGACY_MAX_LINE_OFFSET, 30);
//!
//! let tick = Duration::from_millis(DEFAULT_TICK_INTERVAL_MS);
//! assert_eq!(tick * u32::from(DEFAULT_COUNTDOWN_TICKS + 1), Duration::from_secs(4));
//! ```

// ============================================================================
// Line Addressing
// ============================================================================

/// Default GPIO character device.
pub const DEFAULT_CHIP: &str = "/dev/gpiochip0";

/// Consumer label attached to requested lines.
pub const DEFAULT_CONSUMER: &str = "pushline";

/// Highest line offset accepted by the legacy button library.
///
/// The simulated driver exposes `LEGACY_MAX_LINE_OFFSET + 1` lines so that
/// configurations for the legacy header validate identically.
pub const LEGACY_MAX_LINE_OFFSET: u32 = 30;

// ============================================================================
// Legacy PUD Values
// ============================================================================

/// Legacy PUD value: no bias resistor.
pub const PUD_OFF: u8 = 0;

/// Legacy PUD value: pull-down resistor.
pub const PUD_DOWN: u8 = 1;

/// Legacy PUD value: pull-up resistor (implies active-low).
pub const PUD_UP: u8 = 2;

// ============================================================================
// Edge Dispatch
// ============================================================================

/// Default debounce window in microseconds (filtering disabled).
pub const DEFAULT_DEBOUNCE_MICROS: u32 = 0;

/// Upper bound on the time a blocked edge wait takes to observe cancellation.
///
/// Drivers sleep on the hardware/queue in slices of this length and check
/// the cancellation token between slices.
pub const EDGE_WAIT_POLL_INTERVAL_MS: u64 = 20;

/// Name given to the dispatch worker thread.
pub const DISPATCH_THREAD_NAME: &str = "pushline-dispatch";

// ============================================================================
// Reset Button
// ============================================================================

/// Number of countdown ticks announced before the final decision.
pub const DEFAULT_COUNTDOWN_TICKS: u8 = 3;

/// Interval between countdown announcements in milliseconds.
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 1000;

/// Command executed when the button is still held after the countdown.
pub const DEFAULT_SHUTDOWN_COMMAND: &[&str] = &["sudo", "/sbin/shutdown", "-h", "now"];

/// Command executed when the button was released during the countdown.
pub const DEFAULT_REBOOT_COMMAND: &[&str] = &["sudo", "/sbin/reboot"];

// ============================================================================
// Time
// ============================================================================

/// Nanoseconds per second.
pub const NANOS_PER_SECOND: i64 = 1_000_000_000;

/// Nanoseconds per microsecond.
pub const NANOS_PER_MICRO: i64 = 1_000;
