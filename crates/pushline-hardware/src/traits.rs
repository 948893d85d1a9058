//! Line driver trait definitions.
//!
//! These traits are the only hardware-facing surface of the crate. A platform
//! supplies a [`LineDriver`] that opens lines, and each opened line is an
//! [`InputLine`] owned exclusively by whoever opened it. The simulated driver
//! in [`mock`](crate::mock) and the character-device driver both implement
//! them, and so can any other platform (register-mapped GPIO, test rigs).
//!
//! All methods are synchronous. The only blocking call is
//! [`InputLine::wait_for_edge`], which must honor its cancellation token
//! within a bounded interval.

use std::fmt;

use pushline_core::{Bias, EdgeEvent, EdgeSelector, RawLevel, constants::DEFAULT_CONSUMER};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::Result;

/// Parameters for requesting a single input line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineRequest {
    /// Chip identifier (device path or name).
    pub chip: String,

    /// Line offset on the chip.
    pub offset: u32,

    /// Bias resistor to apply while the line is requested.
    pub bias: Bias,

    /// Consumer label reported to the kernel.
    pub consumer: String,
}

impl LineRequest {
    /// Create a request with the default consumer label.
    pub fn new(chip: impl Into<String>, offset: u32, bias: Bias) -> Self {
        Self {
            chip: chip.into(),
            offset,
            bias,
            consumer: DEFAULT_CONSUMER.to_string(),
        }
    }

    /// Set the consumer label.
    pub fn with_consumer(mut self, consumer: impl Into<String>) -> Self {
        self.consumer = consumer.into();
        self
    }
}

impl fmt::Display for LineRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.chip, self.offset)
    }
}

/// Opens lines on a GPIO chip.
///
/// # Errors
///
/// `open` must report an offset the chip does not have as
/// [`HardwareError::ConfigurationError`](crate::HardwareError::ConfigurationError)
/// and every failure of the platform itself (unknown chip, busy line, OS
/// error) as a resource error. No handle exists after a failed `open`.
pub trait LineDriver: Send {
    /// Line handle produced by this driver.
    type Line: InputLine;

    /// Request the line described by `request` as an input.
    fn open(&mut self, request: &LineRequest) -> Result<Self::Line>;
}

/// An opened, exclusively owned input line.
///
/// Dropping the line releases it; [`close`](InputLine::close) does the same
/// explicitly and may be called any number of times.
pub trait InputLine: Send + 'static {
    /// Sample the current raw level without blocking.
    fn read_raw(&mut self) -> Result<RawLevel>;

    /// Enable edge detection for the selected edges.
    ///
    /// Must be called before [`wait_for_edge`](InputLine::wait_for_edge).
    fn watch_edges(&mut self, edges: EdgeSelector) -> Result<()>;

    /// Block until the next selected edge.
    ///
    /// Returns [`HardwareError::Cancelled`](crate::HardwareError::Cancelled)
    /// promptly once `cancel` is triggered, even if no edge ever arrives.
    fn wait_for_edge(&mut self, cancel: &CancellationToken) -> Result<EdgeEvent>;

    /// Release the line. Idempotent.
    fn close(&mut self);

    /// Check if the line is still requested.
    fn is_open(&self) -> bool;
}

/// Receiver of debounced edges.
///
/// Called synchronously on the dispatch worker with
/// `(is_rising, seconds, nanoseconds)`, one call at a time and in the order
/// the edges were reported. Closures with that signature implement it.
pub trait EventSink: Send + 'static {
    fn on_edge(&mut self, is_rising: bool, seconds: i64, nanoseconds: i64);
}

impl<F> EventSink for F
where
    F: FnMut(bool, i64, i64) + Send + 'static,
{
    fn on_edge(&mut self, is_rising: bool, seconds: i64, nanoseconds: i64) {
        self(is_rising, seconds, nanoseconds)
    }
}

/// Anything that can report whether a button is currently pressed.
///
/// The reset state machine depends only on this capability, so it can be
/// driven by a [`Button`](crate::Button) or by a scripted fake.
pub trait PressedSource {
    /// Sample the logical pressed state.
    fn is_pressed(&self) -> Result<bool>;
}

impl<T: PressedSource + ?Sized> PressedSource for &T {
    fn is_pressed(&self) -> Result<bool> {
        (**self).is_pressed()
    }
}

impl<T: PressedSource + ?Sized> PressedSource for std::sync::Arc<T> {
    fn is_pressed(&self) -> Result<bool> {
        (**self).is_pressed()
    }
}
