//! Background edge dispatch.
//!
//! This module provides the [`EventDispatcher`], which moves an opened line
//! onto a dedicated worker thread and turns its edges into a debounced,
//! polarity-mapped stream delivered to an [`EventSink`].
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────┐   ┌──────────┐   ┌─────────────┐   ┌──────┐
//! │ wait_for_edge│──►│ Debounce │──►│ Polarity │──►│ CachedState │──►│ Sink │
//! │  (blocking)  │   │  Filter  │   │  Mapper  │   │   update    │   │ call │
//! └──────────────┘   └──────────┘   └──────────┘   └─────────────┘   └──────┘
//!        ▲
//!        └── CancellationToken (stop)
//! ```
//!
//! Everything after `wait_for_edge` runs on the worker, one edge at a time,
//! so sink calls are serialized and arrive in the order the line reported
//! the edges.
//!
//! # Lifecycle
//!
//! 1. Enable edge detection on the line (`InputLine::watch_edges`)
//! 2. [`EventDispatcher::spawn`] moves the line to the worker
//! 3. The worker runs until cancelled, until the line fails or until the
//!    sink panics
//! 4. [`EventDispatcher::stop`] cancels, joins and hands the line back

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;
use pushline_core::{EdgeSelector, PolarityConfig, constants::DISPATCH_THREAD_NAME};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace, warn};

use crate::{
    HardwareError, Result,
    cache::CachedState,
    debounce::DebounceFilter,
    traits::{EventSink, InputLine},
};

/// Settings applied by the dispatch worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchSettings {
    /// Polarity used to turn edges into logical states.
    pub polarity: PolarityConfig,

    /// Edges the line was configured to report.
    pub edges: EdgeSelector,

    /// Minimum interval between accepted edges.
    pub debounce: Duration,
}

/// State shared between the dispatcher and its worker.
#[derive(Debug, Default)]
struct WorkerShared {
    /// Worker loop is active.
    running: AtomicBool,

    /// Error that ended the worker loop.
    last_error: Mutex<Option<HardwareError>>,
}

/// How a dispatcher's worker ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WorkerTermination {
    /// Joined and returned the line.
    Joined,
    /// Stop was requested from the worker itself; only cancelled.
    Detached,
    /// Worker thread panicked outside the sink.
    Panicked,
}

/// Runs one dispatch worker for one line.
///
/// Dropping the dispatcher stops it.
#[derive(Debug)]
pub struct EventDispatcher<L: InputLine> {
    cancel: CancellationToken,
    worker: Option<JoinHandle<L>>,
    shared: Arc<WorkerShared>,
}

impl<L: InputLine> EventDispatcher<L> {
    /// Start a worker for `line`.
    ///
    /// The line must already have edge detection enabled for
    /// `settings.edges`. The worker stores the logical state of every
    /// accepted edge in `cache` before calling `sink`.
    ///
    /// # Errors
    ///
    /// Returns a resource error if the worker thread cannot be spawned; the
    /// line is released in that case.
    pub fn spawn(
        line: L,
        settings: DispatchSettings,
        sink: Box<dyn EventSink>,
        cache: Arc<CachedState>,
    ) -> Result<Self> {
        let cancel = CancellationToken::new();
        let shared = Arc::new(WorkerShared::default());
        shared.running.store(true, Ordering::SeqCst);

        let worker = {
            let cancel = cancel.clone();
            let shared = Arc::clone(&shared);
            thread::Builder::new()
                .name(DISPATCH_THREAD_NAME.to_string())
                .spawn(move || run_worker(line, settings, sink, cache, cancel, shared))
        };

        let worker = match worker {
            Ok(worker) => worker,
            Err(e) => {
                shared.running.store(false, Ordering::SeqCst);
                return Err(HardwareError::resource(format!(
                    "failed to spawn dispatch worker: {e}"
                )));
            }
        };

        debug!(
            edges = %settings.edges,
            debounce_us = settings.debounce.as_micros() as u64,
            "Dispatch worker started"
        );

        Ok(Self {
            cancel,
            worker: Some(worker),
            shared,
        })
    }

    /// Check if the worker loop is still active.
    ///
    /// Turns `false` as soon as the worker exits, whether it was stopped or
    /// ended on a line error.
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    /// Check if a worker thread is still attached (not yet stopped).
    pub fn is_attached(&self) -> bool {
        self.worker.is_some()
    }

    /// Id of the worker thread while it is attached.
    pub fn worker_thread(&self) -> Option<thread::ThreadId> {
        self.worker.as_ref().map(|worker| worker.thread().id())
    }

    /// Signal the worker to exit without waiting for it.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Take the error that ended the worker loop, if any.
    pub fn take_error(&self) -> Option<HardwareError> {
        self.shared.last_error.lock().take()
    }

    /// Stop the worker and return the line.
    ///
    /// Cancels the edge wait and blocks until the worker has exited, so no
    /// sink call happens after this returns. Idempotent: later calls return
    /// `None`. Called from inside the sink (on the worker itself) it only
    /// cancels, and the line is released when the worker exits.
    pub fn stop(&mut self) -> Option<L> {
        let worker = self.worker.take()?;
        self.cancel.cancel();

        match Self::join(worker) {
            (WorkerTermination::Joined, line) => {
                debug!("Dispatch worker stopped");
                line
            }
            (WorkerTermination::Detached, _) => {
                debug!("Dispatch worker cancelled from its own thread");
                None
            }
            (WorkerTermination::Panicked, _) => {
                self.shared.running.store(false, Ordering::SeqCst);
                error!("Dispatch worker panicked; line released");
                None
            }
        }
    }

    fn join(worker: JoinHandle<L>) -> (WorkerTermination, Option<L>) {
        if worker.thread().id() == thread::current().id() {
            return (WorkerTermination::Detached, None);
        }

        match worker.join() {
            Ok(line) => (WorkerTermination::Joined, Some(line)),
            Err(_) => (WorkerTermination::Panicked, None),
        }
    }
}

impl<L: InputLine> Drop for EventDispatcher<L> {
    fn drop(&mut self) {
        // The returned line is dropped here, which releases it.
        let _ = self.stop();
    }
}

fn run_worker<L: InputLine>(
    mut line: L,
    settings: DispatchSettings,
    mut sink: Box<dyn EventSink>,
    cache: Arc<CachedState>,
    cancel: CancellationToken,
    shared: Arc<WorkerShared>,
) -> L {
    let mut filter = DebounceFilter::new(settings.debounce);

    loop {
        match line.wait_for_edge(&cancel) {
            Ok(event) => {
                if cancel.is_cancelled() {
                    break;
                }
                if !filter.accept(&event) {
                    continue;
                }

                let direction = event.direction();
                let timestamp = event.timestamp();
                let pressed = settings.polarity.logical(direction.resulting_level());
                cache.store(pressed);

                trace!(%direction, %timestamp, pressed, "Dispatching edge");
                let delivered = panic::catch_unwind(AssertUnwindSafe(|| {
                    sink.on_edge(
                        direction.is_rising(),
                        timestamp.seconds(),
                        timestamp.nanoseconds(),
                    )
                }));
                if delivered.is_err() {
                    error!("Event sink panicked; dispatch worker stopped");
                    *shared.last_error.lock() =
                        Some(HardwareError::resource("event sink panicked"));
                    break;
                }
            }
            Err(HardwareError::Cancelled) => break,
            Err(e) => {
                warn!("Dispatch worker stopped on line error: {}", e);
                *shared.last_error.lock() = Some(e);
                break;
            }
        }
    }

    shared.running.store(false, Ordering::SeqCst);
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{SimulatedDriver, SimulatedLine, SimulatedLineControl};
    use crate::traits::{LineDriver, LineRequest};
    use pushline_core::{ActiveMode, Bias, EdgeDirection};
    use std::time::Instant;

    type Recorded = Arc<Mutex<Vec<(bool, i64, i64)>>>;

    fn watched_line(edges: EdgeSelector) -> (SimulatedLine, SimulatedLineControl) {
        let (mut driver, control) = SimulatedDriver::new("sim");
        let mut line = driver.open(&LineRequest::new("sim", 5, Bias::PullUp)).unwrap();
        line.watch_edges(edges).unwrap();
        (line, control)
    }

    fn settings(debounce_us: u64) -> DispatchSettings {
        DispatchSettings {
            polarity: PolarityConfig::new(ActiveMode::ActiveLow, Bias::PullUp),
            edges: EdgeSelector::Both,
            debounce: Duration::from_micros(debounce_us),
        }
    }

    fn recorder() -> (Recorded, Box<dyn EventSink>) {
        let recorded: Recorded = Arc::new(Mutex::new(Vec::new()));
        let sink_records = Arc::clone(&recorded);
        let sink: Box<dyn EventSink> = Box::new(move |rising: bool, sec: i64, nsec: i64| {
            sink_records.lock().push((rising, sec, nsec));
        });
        (recorded, sink)
    }

    fn wait_for_count(recorded: &Recorded, count: usize) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while recorded.lock().len() < count && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_dispatch_updates_cache_then_sink() {
        let (line, control) = watched_line(EdgeSelector::Both);
        let cache = Arc::new(CachedState::new());
        let (recorded, sink) = recorder();

        let mut dispatcher =
            EventDispatcher::spawn(line, settings(0), sink, Arc::clone(&cache)).unwrap();
        assert!(dispatcher.is_running());

        control.push_edge(EdgeDirection::Falling, pushline_core::EdgeTimestamp::new(7, 250));
        wait_for_count(&recorded, 1);

        assert_eq!(*recorded.lock(), vec![(false, 7, 250)]);
        // Active-low: a falling edge means pressed.
        assert!(cache.pressed().unwrap());

        let line = dispatcher.stop();
        assert!(line.is_some());
        assert!(!dispatcher.is_running());
    }

    #[test]
    fn test_bounces_are_filtered() {
        let (line, control) = watched_line(EdgeSelector::Both);
        let cache = Arc::new(CachedState::new());
        let (recorded, sink) = recorder();

        let mut dispatcher = EventDispatcher::spawn(line, settings(5_000), sink, cache).unwrap();

        control.push_edge_at_micros(EdgeDirection::Falling, 0);
        control.push_edge_at_micros(EdgeDirection::Rising, 2_000);
        control.push_edge_at_micros(EdgeDirection::Rising, 8_000);
        wait_for_count(&recorded, 2);
        assert!(control.wait_drained(Duration::from_secs(1)));

        dispatcher.stop();
        assert_eq!(
            *recorded.lock(),
            vec![(false, 0, 0), (true, 0, 8_000_000)]
        );
    }

    #[test]
    fn test_stop_is_idempotent() {
        let (line, _control) = watched_line(EdgeSelector::Both);
        let (_recorded, sink) = recorder();

        let mut dispatcher =
            EventDispatcher::spawn(line, settings(0), sink, Arc::new(CachedState::new())).unwrap();

        assert!(dispatcher.stop().is_some());
        assert!(dispatcher.stop().is_none());
        assert!(!dispatcher.is_attached());
    }

    #[test]
    fn test_no_sink_calls_after_stop() {
        let (line, control) = watched_line(EdgeSelector::Both);
        let (recorded, sink) = recorder();

        let mut dispatcher =
            EventDispatcher::spawn(line, settings(0), sink, Arc::new(CachedState::new())).unwrap();

        control.push_edge_at_micros(EdgeDirection::Rising, 1);
        wait_for_count(&recorded, 1);

        let line = dispatcher.stop();
        control.push_edge_at_micros(EdgeDirection::Falling, 2);
        thread::sleep(Duration::from_millis(50));

        assert_eq!(recorded.lock().len(), 1);
        drop(line);
    }

    #[test]
    fn test_line_error_ends_worker() {
        let (line, control) = watched_line(EdgeSelector::Both);
        let (_recorded, sink) = recorder();

        let mut dispatcher =
            EventDispatcher::spawn(line, settings(0), sink, Arc::new(CachedState::new())).unwrap();

        control.fail_next_wait("line vanished");
        let deadline = Instant::now() + Duration::from_secs(5);
        while dispatcher.is_running() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }

        assert!(!dispatcher.is_running());
        let error = dispatcher.take_error().unwrap();
        assert!(error.is_resource());
        assert!(dispatcher.take_error().is_none());
        assert!(dispatcher.stop().is_some());
    }

    #[test]
    fn test_stop_from_sink_does_not_deadlock() {
        let (line, control) = watched_line(EdgeSelector::Both);
        let slot: Arc<Mutex<Option<EventDispatcher<SimulatedLine>>>> = Arc::new(Mutex::new(None));

        let sink_slot = Arc::clone(&slot);
        let sink = Box::new(move |_rising: bool, _sec: i64, _nsec: i64| {
            if let Some(dispatcher) = sink_slot.lock().as_mut() {
                assert!(dispatcher.stop().is_none());
            }
        });

        let dispatcher =
            EventDispatcher::spawn(line, settings(0), sink, Arc::new(CachedState::new())).unwrap();
        *slot.lock() = Some(dispatcher);

        control.push_edge_at_micros(EdgeDirection::Rising, 1);

        let deadline = Instant::now() + Duration::from_secs(5);
        while control.is_requested() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        assert!(!control.is_requested());

        let finished = slot.lock().take().unwrap();
        assert!(!finished.is_running());
    }

    #[test]
    fn test_sink_panic_ends_worker_and_keeps_line() {
        let (line, control) = watched_line(EdgeSelector::Both);
        let calls = Arc::new(Mutex::new(0_u32));
        let sink_calls = Arc::clone(&calls);
        let sink = Box::new(move |_rising: bool, _sec: i64, _nsec: i64| {
            *sink_calls.lock() += 1;
            if *sink_calls.lock() == 1 {
                panic!("sink failure");
            }
        });

        let mut dispatcher =
            EventDispatcher::spawn(line, settings(0), sink, Arc::new(CachedState::new())).unwrap();
        control.push_edge_at_micros(EdgeDirection::Rising, 1);

        let deadline = Instant::now() + Duration::from_secs(5);
        while dispatcher.is_running() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        assert!(!dispatcher.is_running());

        let error = dispatcher.take_error().unwrap();
        assert!(error.to_string().contains("event sink panicked"));

        control.push_edge_at_micros(EdgeDirection::Falling, 2);
        thread::sleep(Duration::from_millis(20));
        assert_eq!(*calls.lock(), 1);

        let line = dispatcher.stop().unwrap();
        assert!(line.is_open());
    }

    #[test]
    fn test_drop_stops_worker() {
        let (line, control) = watched_line(EdgeSelector::Both);
        let (_recorded, sink) = recorder();

        let dispatcher =
            EventDispatcher::spawn(line, settings(0), sink, Arc::new(CachedState::new())).unwrap();
        drop(dispatcher);

        assert!(!control.is_requested());
    }
}
