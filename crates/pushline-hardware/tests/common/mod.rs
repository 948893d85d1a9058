//! Common test utilities for integration tests.
//!
//! Builders for buttons on the simulated chip and a recording event sink
//! that tests can wait on.

#![allow(dead_code)]

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use pushline_hardware::Button;
use pushline_hardware::mock::{SimulatedDriver, SimulatedLineControl};

/// Chip name used by every test.
pub const CHIP: &str = "sim0";

/// Upper bound for anything a test waits on.
pub const WAIT_TIMEOUT: Duration = Duration::from_secs(5);

/// Edge delivered to a sink: `(is_rising, seconds, nanoseconds)`.
pub type Delivered = (bool, i64, i64);

/// Create a button with a legacy PUD value on the simulated chip.
pub fn legacy_button(offset: u32, pud: u8) -> (Button<SimulatedDriver>, SimulatedLineControl) {
    let (driver, control) = SimulatedDriver::new(CHIP);
    let button = Button::with_legacy_pud(driver, CHIP, offset, pud)
        .expect("legacy PUD value should be valid");
    (button, control)
}

/// Poll `condition` until it holds or [`WAIT_TIMEOUT`] expires.
pub fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + WAIT_TIMEOUT;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    condition()
}

/// Sink that records every delivered edge.
#[derive(Clone, Default)]
pub struct Recorder {
    events: Arc<Mutex<Vec<Delivered>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Closure to hand to `InterruptConfig::with_sink`.
    pub fn sink(&self) -> impl FnMut(bool, i64, i64) + Send + 'static {
        let events = Arc::clone(&self.events);
        move |rising, sec, nsec| events.lock().push((rising, sec, nsec))
    }

    pub fn events(&self) -> Vec<Delivered> {
        self.events.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.events.lock().len()
    }

    /// Wait until at least `count` edges were delivered.
    pub fn wait_for(&self, count: usize) -> bool {
        wait_until(|| self.count() >= count)
    }
}
