//! Simulated GPIO chip with one controllable input line.
//!
//! [`SimulatedDriver`] behaves like a character-device chip with a fixed
//! number of lines; the line under test is driven through a
//! [`SimulatedLineControl`] handle that sets the level, queues edges and
//! injects failures.
//!
//! # Examples
//!
//! ```
//! use pushline_core::{Bias, EdgeDirection, EdgeTimestamp, RawLevel};
//! use pushline_hardware::mock::SimulatedDriver;
//! use pushline_hardware::traits::{InputLine, LineDriver, LineRequest};
//!
//! let (mut driver, control) = SimulatedDriver::new("/dev/gpiochip0");
//!
//! let mut line = driver
//!     .open(&LineRequest::new("/dev/gpiochip0", 17, Bias::PullUp))
//!     .unwrap();
//!
//! // Undriven line with a pull-up reads high
//! assert_eq!(line.read_raw().unwrap(), RawLevel::High);
//!
//! control.set_level(RawLevel::Low);
//! assert_eq!(line.read_raw().unwrap(), RawLevel::Low);
//! ```

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use pushline_core::{
    Bias, EdgeDirection, EdgeEvent, EdgeSelector, EdgeTimestamp, RawLevel,
    constants::{EDGE_WAIT_POLL_INTERVAL_MS, LEGACY_MAX_LINE_OFFSET},
};
use tokio_util::sync::CancellationToken;

use crate::{
    HardwareError, Result,
    traits::{InputLine, LineDriver, LineRequest},
};

/// Mutable state of the simulated line.
#[derive(Debug)]
struct LineState {
    /// Current electrical level.
    level: RawLevel,

    /// Whether the level was set explicitly (otherwise the bias decides).
    driven: bool,

    /// Edges waiting to be reported.
    pending: VecDeque<EdgeEvent>,

    /// Offset currently requested, if any.
    requested: Option<u32>,

    /// Bias applied by the last request.
    bias: Option<Bias>,

    /// Number of successful open calls.
    open_count: usize,

    /// Failure returned by the next open.
    open_failure: Option<String>,

    /// Failure returned by the next read.
    read_failure: Option<String>,

    /// Failure returned by the next edge wait.
    wait_failure: Option<String>,

    /// Failure returned by the next `watch_edges`.
    watch_failure: Option<String>,
}

#[derive(Debug)]
struct Shared {
    state: Mutex<LineState>,
    changed: Condvar,
}

impl Shared {
    fn new() -> Self {
        Self {
            state: Mutex::new(LineState {
                level: RawLevel::Low,
                driven: false,
                pending: VecDeque::new(),
                requested: None,
                bias: None,
                open_count: 0,
                open_failure: None,
                read_failure: None,
                wait_failure: None,
                watch_failure: None,
            }),
            changed: Condvar::new(),
        }
    }
}

/// Simulated GPIO chip.
///
/// Only one line can be requested at a time, matching the exclusive request
/// semantics of the kernel. Offsets at or beyond the line count are rejected
/// as configuration errors.
#[derive(Debug)]
pub struct SimulatedDriver {
    /// Chip identifier accepted by `open`.
    chip: String,

    /// Number of lines exposed by the chip.
    line_count: u32,

    shared: Arc<Shared>,
}

impl SimulatedDriver {
    /// Create a chip exposing the legacy line range (offsets 0-30).
    ///
    /// Returns a tuple of (SimulatedDriver, SimulatedLineControl) where the
    /// control handle drives the simulated line.
    pub fn new(chip: impl Into<String>) -> (Self, SimulatedLineControl) {
        Self::with_line_count(chip, LEGACY_MAX_LINE_OFFSET + 1)
    }

    /// Create a chip exposing `line_count` lines.
    pub fn with_line_count(
        chip: impl Into<String>,
        line_count: u32,
    ) -> (Self, SimulatedLineControl) {
        let shared = Arc::new(Shared::new());

        let driver = Self {
            chip: chip.into(),
            line_count,
            shared: Arc::clone(&shared),
        };

        (driver, SimulatedLineControl { shared })
    }

    /// Chip identifier.
    pub fn chip(&self) -> &str {
        &self.chip
    }

    /// Number of lines on the chip.
    pub fn line_count(&self) -> u32 {
        self.line_count
    }
}

impl LineDriver for SimulatedDriver {
    type Line = SimulatedLine;

    fn open(&mut self, request: &LineRequest) -> Result<SimulatedLine> {
        if request.chip != self.chip {
            return Err(HardwareError::resource(format!(
                "no such chip: {}",
                request.chip
            )));
        }

        if request.offset >= self.line_count {
            return Err(HardwareError::configuration(format!(
                "line offset {} out of range (chip {} has {} lines)",
                request.offset, self.chip, self.line_count
            )));
        }

        let mut state = self.shared.state.lock();

        if let Some(message) = state.open_failure.take() {
            return Err(HardwareError::resource(message));
        }

        if let Some(offset) = state.requested {
            return Err(HardwareError::resource(format!(
                "line {}:{} is busy",
                self.chip, offset
            )));
        }

        state.requested = Some(request.offset);
        state.bias = Some(request.bias);
        state.open_count += 1;
        if !state.driven {
            state.level = request.bias.idle_level();
        }

        Ok(SimulatedLine {
            shared: Arc::clone(&self.shared),
            name: request.to_string(),
            edges: None,
            open: true,
        })
    }
}

/// Handle to a requested simulated line.
#[derive(Debug)]
pub struct SimulatedLine {
    shared: Arc<Shared>,

    /// `chip:offset`, used in error messages.
    name: String,

    /// Edge selection once detection is enabled.
    edges: Option<EdgeSelector>,

    open: bool,
}

impl SimulatedLine {
    fn ensure_open(&self) -> Result<()> {
        if self.open {
            Ok(())
        } else {
            Err(HardwareError::not_open(&self.name))
        }
    }
}

impl InputLine for SimulatedLine {
    fn read_raw(&mut self) -> Result<RawLevel> {
        self.ensure_open()?;

        let mut state = self.shared.state.lock();
        if let Some(message) = state.read_failure.take() {
            return Err(HardwareError::resource(message));
        }
        Ok(state.level)
    }

    fn watch_edges(&mut self, edges: EdgeSelector) -> Result<()> {
        self.ensure_open()?;

        let mut state = self.shared.state.lock();
        if let Some(message) = state.watch_failure.take() {
            return Err(HardwareError::resource(message));
        }
        self.edges = Some(edges);
        Ok(())
    }

    fn wait_for_edge(&mut self, cancel: &CancellationToken) -> Result<EdgeEvent> {
        self.ensure_open()?;

        let Some(edges) = self.edges else {
            return Err(HardwareError::configuration(format!(
                "edge detection is not enabled on line {}",
                self.name
            )));
        };

        let poll = Duration::from_millis(EDGE_WAIT_POLL_INTERVAL_MS);
        let mut state = self.shared.state.lock();

        loop {
            if cancel.is_cancelled() {
                return Err(HardwareError::Cancelled);
            }

            if let Some(message) = state.wait_failure.take() {
                return Err(HardwareError::resource(message));
            }

            while let Some(event) = state.pending.pop_front() {
                if edges.matches(event.direction()) {
                    return Ok(event);
                }
            }

            self.shared.changed.wait_for(&mut state, poll);
        }
    }

    fn close(&mut self) {
        if !self.open {
            return;
        }
        self.open = false;
        self.edges = None;

        let mut state = self.shared.state.lock();
        state.requested = None;
        state.pending.clear();
        drop(state);
        self.shared.changed.notify_all();
    }

    fn is_open(&self) -> bool {
        self.open
    }
}

impl Drop for SimulatedLine {
    fn drop(&mut self) {
        self.close();
    }
}

/// Handle for controlling a simulated line.
///
/// Can be cloned and moved to other threads; every clone drives the same
/// line.
#[derive(Debug, Clone)]
pub struct SimulatedLineControl {
    shared: Arc<Shared>,
}

impl SimulatedLineControl {
    /// Drive the line to `level` without producing an edge.
    pub fn set_level(&self, level: RawLevel) {
        let mut state = self.shared.state.lock();
        state.level = level;
        state.driven = true;
    }

    /// Current level of the line.
    pub fn level(&self) -> RawLevel {
        self.shared.state.lock().level
    }

    /// Report an edge at `timestamp` and move the level accordingly.
    ///
    /// Edges queued while nobody watches are kept until the line is closed.
    pub fn push_edge(&self, direction: EdgeDirection, timestamp: EdgeTimestamp) {
        let mut state = self.shared.state.lock();
        state.level = direction.resulting_level();
        state.driven = true;
        state.pending.push_back(EdgeEvent::new(direction, timestamp));
        drop(state);
        self.shared.changed.notify_all();
    }

    /// Report an edge at `micros` microseconds.
    pub fn push_edge_at_micros(&self, direction: EdgeDirection, micros: i64) {
        self.push_edge(direction, EdgeTimestamp::from_micros(micros));
    }

    /// Number of edges not yet consumed by a waiter.
    pub fn pending_edges(&self) -> usize {
        self.shared.state.lock().pending.len()
    }

    /// Block until every queued edge has been consumed or `timeout` elapses.
    ///
    /// Returns `true` if the queue drained in time.
    pub fn wait_drained(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if self.pending_edges() == 0 {
                return true;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        self.pending_edges() == 0
    }

    /// Make the next `open` fail with a resource error.
    pub fn fail_next_open(&self, message: impl Into<String>) {
        self.shared.state.lock().open_failure = Some(message.into());
    }

    /// Make the next read fail with a resource error.
    pub fn fail_next_read(&self, message: impl Into<String>) {
        self.shared.state.lock().read_failure = Some(message.into());
    }

    /// Make the next `watch_edges` fail with a resource error.
    pub fn fail_next_watch(&self, message: impl Into<String>) {
        self.shared.state.lock().watch_failure = Some(message.into());
    }

    /// Make the current or next edge wait fail with a resource error.
    pub fn fail_next_wait(&self, message: impl Into<String>) {
        self.shared.state.lock().wait_failure = Some(message.into());
        self.shared.changed.notify_all();
    }

    /// Check if a line is currently requested.
    pub fn is_requested(&self) -> bool {
        self.shared.state.lock().requested.is_some()
    }

    /// Offset of the requested line.
    pub fn requested_offset(&self) -> Option<u32> {
        self.shared.state.lock().requested
    }

    /// Bias applied by the most recent request.
    pub fn applied_bias(&self) -> Option<Bias> {
        self.shared.state.lock().bias
    }

    /// Number of successful open calls so far.
    pub fn open_count(&self) -> usize {
        self.shared.state.lock().open_count
    }
}
