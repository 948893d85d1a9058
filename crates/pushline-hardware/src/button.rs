//! Push-button on a single input line.
//!
//! A [`Button`] owns one line and serves two regimes:
//!
//! - **Polling**: [`Button::value`] and [`Button::state`] sample the line on
//!   the caller's thread.
//! - **Interrupt**: [`Button::begin_interrupt`] hands the line to an
//!   [`EventDispatcher`] worker that calls the sink for every debounced edge.
//!   While it runs, [`Button::state`] answers from the cached state.
//!
//! # Lifecycle
//!
//! ```text
//!            begin()              begin_interrupt()
//!  Absent ───────────► Polling ─────────────────────► Dispatching
//!    ▲                   │  ▲                             │
//!    │     clean()       │  └──── stop_interrupt() ───────┘
//!    └───────────────────┴──────────── clean() ───────────┘
//! ```
//!
//! `stop_interrupt` and `clean` never fail and may be called any number of
//! times from any thread. Lifecycle calls are serialized; a caller that
//! arrives while another one is stopping the worker waits for it and then
//! finds the button already stopped.
//!
//! From inside the sink, `stop_interrupt` and `clean` only signal the worker
//! and return; the line is returned to polling (or released) once the sink
//! returns. `begin` and `begin_interrupt` are refused there.
//!
//! # Examples
//!
//! ```
//! use pushline_core::constants::PUD_UP;
//! use pushline_core::RawLevel;
//! use pushline_hardware::Button;
//! use pushline_hardware::mock::SimulatedDriver;
//!
//! let (driver, control) = SimulatedDriver::new("/dev/gpiochip0");
//! let button = Button::with_legacy_pud(driver, "/dev/gpiochip0", 17, PUD_UP).unwrap();
//!
//! button.begin().unwrap();
//!
//! // Pull-up idle level: released
//! assert!(!button.state().unwrap());
//!
//! control.set_level(RawLevel::Low);
//! assert!(button.state().unwrap());
//!
//! button.clean();
//! assert!(button.value().is_err());
//! ```

use std::fmt;
use std::mem;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, ThreadId};
use std::time::Duration;

use parking_lot::{Mutex, MutexGuard};
use pushline_core::constants::EDGE_WAIT_POLL_INTERVAL_MS;
use pushline_core::{ButtonConfig, EdgeSelector, PolarityConfig, RawLevel};
use tracing::{debug, info, warn};

use crate::{
    HardwareError, Result,
    cache::{CachedState, StateSnapshot},
    dispatcher::{DispatchSettings, EventDispatcher},
    traits::{EventSink, InputLine, LineDriver, LineRequest, PressedSource},
};

/// Settings for [`Button::begin_interrupt`].
///
/// The sink is mandatory; starting without one is a configuration error.
pub struct InterruptConfig {
    edges: EdgeSelector,
    debounce: Duration,
    sink: Option<Box<dyn EventSink>>,
}

impl InterruptConfig {
    /// Both edges, no debounce, no sink.
    pub fn new() -> Self {
        Self {
            edges: EdgeSelector::Both,
            debounce: Duration::ZERO,
            sink: None,
        }
    }

    /// Settings in the legacy form: `both_edges` flag and a window in
    /// microseconds.
    pub fn legacy(both_edges: bool, debounce_us: u32) -> Self {
        Self::new()
            .with_edges(EdgeSelector::from_both_edges(both_edges))
            .with_debounce(Duration::from_micros(u64::from(debounce_us)))
    }

    /// Edge selection and debounce window taken from a button configuration.
    pub fn from_button_config(config: &ButtonConfig) -> Self {
        Self::new()
            .with_edges(config.edges)
            .with_debounce(config.debounce())
    }

    pub fn with_edges(mut self, edges: EdgeSelector) -> Self {
        self.edges = edges;
        self
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Set the receiver of debounced edges.
    pub fn with_sink(mut self, sink: impl EventSink) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }

    pub fn edges(&self) -> EdgeSelector {
        self.edges
    }

    pub fn debounce(&self) -> Duration {
        self.debounce
    }

    pub fn has_sink(&self) -> bool {
        self.sink.is_some()
    }
}

impl Default for InterruptConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for InterruptConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterruptConfig")
            .field("edges", &self.edges)
            .field("debounce", &self.debounce)
            .field("has_sink", &self.sink.is_some())
            .finish()
    }
}

/// Ownership state of the line.
enum LineSlot<L: InputLine> {
    /// Not requested (never opened, or released).
    Absent,
    /// Owned by the button for polled reads.
    Polling(L),
    /// Owned by the dispatch worker.
    Dispatching(EventDispatcher<L>),
    /// Worker is being joined.
    Stopping,
}

impl<L: InputLine> LineSlot<L> {
    fn name(&self) -> &'static str {
        match self {
            LineSlot::Absent => "absent",
            LineSlot::Polling(_) => "polling",
            LineSlot::Dispatching(_) => "dispatching",
            LineSlot::Stopping => "stopping",
        }
    }
}

/// Access to the lifecycle.
enum Entry<'a> {
    /// Caller is the dispatch worker, inside the sink.
    Worker,
    Locked(MutexGuard<'a, ()>),
}

/// Outcome of a polled read, taken under the slot lock.
enum Sample {
    Read(Result<RawLevel>),
    NotOpen,
    Dispatching,
}

/// A push-button on one GPIO line.
pub struct Button<D: LineDriver> {
    /// Platform driver used to request the line.
    driver: Mutex<D>,

    /// Chip, offset, bias and consumer of the line.
    request: LineRequest,

    /// Polarity applied to every sample and edge.
    polarity: PolarityConfig,

    /// Current owner of the line.
    slot: Mutex<LineSlot<D::Line>>,

    /// Serializes begin/stop/clean.
    lifecycle: Mutex<()>,

    /// Dispatch worker thread, while one is attached.
    dispatch_thread: Mutex<Option<ThreadId>>,

    /// `clean` was called from the sink while the worker was being joined.
    release_pending: AtomicBool,

    /// Last known logical state.
    cache: Arc<CachedState>,

    /// Diagnostic message of the latest failure.
    last_error: Mutex<Option<String>>,
}

impl<D: LineDriver> Button<D> {
    /// Create a button on `chip:offset` with an explicit polarity.
    ///
    /// Nothing touches the hardware until [`begin`](Button::begin).
    pub fn new(driver: D, chip: impl Into<String>, offset: u32, polarity: PolarityConfig) -> Self {
        Self {
            driver: Mutex::new(driver),
            request: LineRequest::new(chip, offset, polarity.bias()),
            polarity,
            slot: Mutex::new(LineSlot::Absent),
            lifecycle: Mutex::new(()),
            dispatch_thread: Mutex::new(None),
            release_pending: AtomicBool::new(false),
            cache: Arc::new(CachedState::new()),
            last_error: Mutex::new(None),
        }
    }

    /// Create a button from a legacy PUD value (`0=off`, `1=down`, `2=up`).
    ///
    /// # Errors
    ///
    /// Returns a configuration error for PUD values other than 0, 1 and 2.
    pub fn with_legacy_pud(driver: D, chip: impl Into<String>, offset: u32, pud: u8) -> Result<Self> {
        let polarity = PolarityConfig::from_pud(pud)?;
        Ok(Self::new(driver, chip, offset, polarity))
    }

    /// Create a button from a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the configuration is invalid.
    pub fn from_config(driver: D, config: &ButtonConfig) -> Result<Self> {
        config.validate()?;
        Ok(
            Self::new(driver, config.chip.clone(), config.offset, config.polarity())
                .with_consumer(config.consumer.clone()),
        )
    }

    /// Set the consumer label used when requesting the line.
    pub fn with_consumer(mut self, consumer: impl Into<String>) -> Self {
        self.request.consumer = consumer.into();
        self
    }

    /// Request the line for polled reads.
    ///
    /// Does nothing if the line is already open.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an offset the chip does not have
    /// and a resource error if the line cannot be requested. No line is
    /// held after a failure. Calling it from the sink is a configuration
    /// error.
    pub fn begin(&self) -> Result<()> {
        let Entry::Locked(_lifecycle) = self.enter() else {
            return self.fail(HardwareError::configuration(
                "begin() cannot be called from the event callback",
            ));
        };
        let mut slot = self.slot.lock();

        if !matches!(*slot, LineSlot::Absent) {
            debug!(line = %self.request, state = slot.name(), "Line already open");
            return Ok(());
        }

        let line = self.open_line()?;
        *slot = LineSlot::Polling(line);
        Ok(())
    }

    /// Start delivering debounced edges to the sink in `config`.
    ///
    /// Opens the line if needed. A dispatcher that is already running is
    /// stopped first and replaced.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if no sink was given, and the errors of
    /// [`begin`](Button::begin) or of enabling edge detection otherwise. If
    /// edge detection cannot be enabled the line stays open for polling.
    /// Calling it from the sink is a configuration error.
    pub fn begin_interrupt(&self, config: InterruptConfig) -> Result<()> {
        let InterruptConfig {
            edges,
            debounce,
            sink,
        } = config;

        let Some(sink) = sink else {
            return self.fail(HardwareError::configuration("event callback is missing"));
        };

        let Entry::Locked(_lifecycle) = self.enter() else {
            return self.fail(HardwareError::configuration(
                "begin_interrupt() cannot be called from the event callback",
            ));
        };
        self.stop_dispatch();

        let mut slot = self.slot.lock();
        let mut line = match mem::replace(&mut *slot, LineSlot::Absent) {
            LineSlot::Polling(line) => line,
            _ => self.open_line()?,
        };

        if let Err(e) = line.watch_edges(edges) {
            *slot = LineSlot::Polling(line);
            return self.fail(e);
        }

        let settings = DispatchSettings {
            polarity: self.polarity,
            edges,
            debounce,
        };

        let dispatcher =
            self.record(EventDispatcher::spawn(line, settings, sink, Arc::clone(&self.cache)))?;
        *self.dispatch_thread.lock() = dispatcher.worker_thread();
        *slot = LineSlot::Dispatching(dispatcher);

        info!(line = %self.request, %edges, debounce_us = debounce.as_micros() as u64, "Edge dispatch started");
        Ok(())
    }

    /// Stop edge dispatch and return the line to polling.
    ///
    /// Blocks until the worker has exited; no sink call happens after this
    /// returns. From inside the sink it only signals the worker.
    pub fn stop_interrupt(&self) {
        match self.enter() {
            Entry::Worker => self.cancel_from_worker(),
            Entry::Locked(_lifecycle) => self.stop_dispatch(),
        }
    }

    /// Stop edge dispatch, release the line and forget the cached state.
    ///
    /// From inside the sink the button is detached from the worker at once,
    /// and the line is released when the sink returns.
    pub fn clean(&self) {
        let _lifecycle = match self.enter() {
            Entry::Worker => return self.release_from_worker(),
            Entry::Locked(guard) => guard,
        };
        self.stop_dispatch();

        let previous = mem::replace(&mut *self.slot.lock(), LineSlot::Absent);
        if let LineSlot::Polling(mut line) = previous {
            line.close();
            info!(line = %self.request, "Line released");
        }
        self.release_pending.store(false, Ordering::SeqCst);
        self.cache.clear();
    }

    /// Sample the raw level.
    ///
    /// # Errors
    ///
    /// Fails if the line is not open, if the dispatcher currently owns it,
    /// or if the read itself fails.
    pub fn value(&self) -> Result<RawLevel> {
        match self.sample() {
            Sample::Read(raw) => self.record(raw),
            Sample::NotOpen => self.fail(HardwareError::not_open(&self.request)),
            Sample::Dispatching => self.fail(HardwareError::configuration(format!(
                "line {} is owned by the event dispatcher; use cached_state()",
                self.request
            ))),
        }
    }

    /// Logical pressed state.
    ///
    /// Samples the line when polling and records the result in the cache.
    /// While edge dispatch is active the cached state is returned instead.
    pub fn state(&self) -> Result<bool> {
        match self.sample() {
            Sample::Read(raw) => {
                let pressed = self.polarity.logical(self.record(raw)?);
                self.cache.store(pressed);
                Ok(pressed)
            }
            Sample::NotOpen => self.fail(HardwareError::not_open(&self.request)),
            Sample::Dispatching => self.cached_state(),
        }
    }

    /// Last recorded logical state, without touching the line.
    ///
    /// # Errors
    ///
    /// Returns [`HardwareError::StateUnknown`] before the first successful
    /// sample or accepted edge.
    pub fn cached_state(&self) -> Result<bool> {
        self.record(self.cache.pressed())
    }

    /// Last recorded state with its timestamp.
    pub fn snapshot(&self) -> Result<StateSnapshot> {
        self.record(self.cache.snapshot())
    }

    /// Shared handle to the cached state, readable from any thread.
    pub fn cache(&self) -> Arc<CachedState> {
        Arc::clone(&self.cache)
    }

    /// Check if the line is requested (polling or dispatching).
    pub fn is_open(&self) -> bool {
        let mut slot = self.slot.lock();
        self.reap_finished(&mut slot);
        !matches!(*slot, LineSlot::Absent)
    }

    /// Check if a dispatch worker is running.
    pub fn is_dispatching(&self) -> bool {
        match &*self.slot.lock() {
            LineSlot::Dispatching(dispatcher) => dispatcher.is_running(),
            _ => false,
        }
    }

    /// Diagnostic message of the latest failure.
    ///
    /// Includes a line error that ended the dispatch worker.
    pub fn last_error(&self) -> Option<String> {
        let mut slot = self.slot.lock();
        self.reap_finished(&mut slot);
        if let LineSlot::Dispatching(dispatcher) = &*slot
            && let Some(e) = dispatcher.take_error()
        {
            self.remember(&e);
        }
        drop(slot);
        self.last_error.lock().clone()
    }

    pub fn polarity(&self) -> PolarityConfig {
        self.polarity
    }

    pub fn request(&self) -> &LineRequest {
        &self.request
    }

    fn sample(&self) -> Sample {
        let mut slot = self.slot.lock();
        self.reap_finished(&mut slot);
        match &mut *slot {
            LineSlot::Polling(line) => Sample::Read(line.read_raw()),
            LineSlot::Absent => Sample::NotOpen,
            LineSlot::Dispatching(_) | LineSlot::Stopping => Sample::Dispatching,
        }
    }

    fn open_line(&self) -> Result<D::Line> {
        let line = self.record(self.driver.lock().open(&self.request))?;
        info!(
            line = %self.request,
            bias = %self.request.bias,
            mode = ?self.polarity.mode(),
            "Line opened"
        );
        Ok(line)
    }

    /// Join the dispatch worker, if any, and put the line back to polling.
    ///
    /// Caller holds the lifecycle lock.
    fn stop_dispatch(&self) {
        let mut dispatcher = {
            let mut slot = self.slot.lock();
            match mem::replace(&mut *slot, LineSlot::Stopping) {
                LineSlot::Dispatching(dispatcher) => dispatcher,
                other => {
                    *slot = other;
                    return;
                }
            }
        };

        let mut line = dispatcher.stop();
        if let Some(e) = dispatcher.take_error() {
            self.remember(&e);
        }
        *self.dispatch_thread.lock() = None;

        if self.release_pending.swap(false, Ordering::SeqCst) {
            if let Some(mut line) = line.take() {
                line.close();
            }
            self.cache.clear();
            info!(line = %self.request, "Line released after edge dispatch stopped");
        }

        *self.slot.lock() = match line {
            Some(line) => LineSlot::Polling(line),
            None => LineSlot::Absent,
        };
        info!(line = %self.request, "Edge dispatch stopped");
    }

    /// Put a dispatcher whose worker has already exited back to polling.
    ///
    /// The worker ends on its own after a line error, a sink panic or a stop
    /// requested from the sink.
    fn reap_finished(&self, slot: &mut LineSlot<D::Line>) {
        if !matches!(slot, LineSlot::Dispatching(dispatcher) if !dispatcher.is_running()) {
            return;
        }
        let LineSlot::Dispatching(mut dispatcher) = mem::replace(slot, LineSlot::Absent) else {
            return;
        };

        let line = dispatcher.stop();
        if let Some(e) = dispatcher.take_error() {
            self.remember(&e);
        }
        *self.dispatch_thread.lock() = None;

        if let Some(line) = line {
            *slot = LineSlot::Polling(line);
        }
        debug!(line = %self.request, state = slot.name(), "Finished dispatch worker reaped");
    }

    /// Take the lifecycle lock, or report that the caller is the worker.
    ///
    /// The worker can be blocked in the sink while another thread holds the
    /// lock to join it, so the worker never waits for the lock indefinitely.
    fn enter(&self) -> Entry<'_> {
        let poll = Duration::from_millis(EDGE_WAIT_POLL_INTERVAL_MS);
        loop {
            if self.on_worker() {
                return Entry::Worker;
            }
            if let Some(guard) = self.lifecycle.try_lock_for(poll) {
                // The worker id is published under the lock.
                if self.on_worker() {
                    return Entry::Worker;
                }
                return Entry::Locked(guard);
            }
        }
    }

    fn on_worker(&self) -> bool {
        *self.dispatch_thread.lock() == Some(thread::current().id())
    }

    /// Signal the worker to stop; it exits once the sink returns.
    fn cancel_from_worker(&self) {
        if let LineSlot::Dispatching(dispatcher) = &*self.slot.lock() {
            dispatcher.cancel();
        }
        debug!(line = %self.request, "Stop requested from the dispatch worker");
    }

    /// Detach the worker and forget the line, from inside the sink.
    ///
    /// The worker drops its line, which releases it, when the sink returns.
    /// If another thread is already joining the worker, that thread releases
    /// the line instead.
    fn release_from_worker(&self) {
        let mut slot = self.slot.lock();
        match mem::replace(&mut *slot, LineSlot::Absent) {
            LineSlot::Dispatching(mut dispatcher) => {
                dispatcher.cancel();
                // Detaches: the worker cannot join itself.
                let _ = dispatcher.stop();
                if let Some(e) = dispatcher.take_error() {
                    self.remember(&e);
                }
                *self.dispatch_thread.lock() = None;
            }
            LineSlot::Stopping => {
                *slot = LineSlot::Stopping;
                self.release_pending.store(true, Ordering::SeqCst);
            }
            other => *slot = other,
        }
        drop(slot);

        self.cache.clear();
        info!(line = %self.request, "Line release requested from the dispatch worker");
    }

    fn record<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            self.remember(e);
        }
        result
    }

    fn fail<T>(&self, error: HardwareError) -> Result<T> {
        self.remember(&error);
        Err(error)
    }

    fn remember(&self, error: &HardwareError) {
        if !matches!(error, HardwareError::StateUnknown) {
            warn!(line = %self.request, "{}", error);
        }
        *self.last_error.lock() = Some(error.to_string());
    }
}

impl<D: LineDriver> PressedSource for Button<D> {
    fn is_pressed(&self) -> Result<bool> {
        self.state()
    }
}

impl<D: LineDriver> fmt::Debug for Button<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Button")
            .field("request", &self.request)
            .field("polarity", &self.polarity)
            .field("state", &self.slot.lock().name())
            .finish()
    }
}

impl<D: LineDriver> Drop for Button<D> {
    fn drop(&mut self) {
        self.clean();
    }
}
