//! Line abstraction layer for push-buttons on GPIO inputs.
//!
//! This crate turns a single GPIO input line into a [`Button`] that can be
//! polled or watched for debounced edges. Hardware access goes through the
//! [`LineDriver`] and [`InputLine`] traits, so the same button logic runs on
//! the Linux character device, on the simulated chip in [`mock`], or on any
//! other platform that implements them.
//!
//! # Components
//!
//! - [`traits`]: the driver/line contract and the [`EventSink`] callback.
//! - [`DebounceFilter`]: drops edges that follow an accepted edge too closely.
//! - [`CachedState`]: last known logical state, shared with other threads.
//! - [`EventDispatcher`]: background worker that waits for edges, filters
//!   them, updates the cache and calls the sink.
//! - [`Button`]: ties the pieces together behind a begin/read/clean lifecycle.
//! - [`devices`]: enum dispatch over the available drivers.
//!
//! # Polling
//!
//! ```
//! use pushline_core::{ActiveMode, Bias, PolarityConfig, RawLevel};
//! use pushline_hardware::Button;
//! use pushline_hardware::mock::SimulatedDriver;
//!
//! let (driver, control) = SimulatedDriver::new("sim0");
//! let polarity = PolarityConfig::new(ActiveMode::ActiveLow, Bias::PullUp);
//! let button = Button::new(driver, "sim0", 5, polarity);
//!
//! button.begin().unwrap();
//! control.set_level(RawLevel::Low);
//! assert!(button.state().unwrap());
//! ```
//!
//! # Edge Dispatch
//!
//! ```
//! use std::time::Duration;
//!
//! use pushline_core::{ActiveMode, Bias, EdgeDirection, PolarityConfig};
//! use pushline_hardware::mock::SimulatedDriver;
//! use pushline_hardware::{Button, InterruptConfig};
//!
//! let (driver, control) = SimulatedDriver::new("sim0");
//! let button = Button::new(driver, "sim0", 5, PolarityConfig::new(ActiveMode::ActiveHigh, Bias::PullDown));
//!
//! let config = InterruptConfig::legacy(true, 0).with_sink(|rising: bool, sec: i64, nsec: i64| {
//!     println!("edge rising={rising} at {sec}.{nsec:09}");
//! });
//! button.begin_interrupt(config).unwrap();
//!
//! control.push_edge_at_micros(EdgeDirection::Rising, 1_000);
//! assert!(control.wait_drained(Duration::from_secs(5)));
//!
//! button.stop_interrupt();
//! ```
//!
//! # Error Handling
//!
//! All operations return [`Result<T>`][error::Result] with a [`HardwareError`]
//! that separates configuration mistakes from unavailable resources. The
//! button also keeps the message of its latest failure, see
//! [`Button::last_error`].
//!
//! # Thread Safety
//!
//! [`Button`] is `Sync` for any driver that is `Send`. Reads, lifecycle calls
//! and the sink may run on different threads; lifecycle calls are serialized
//! internally and a sink may call back into its own button.

pub mod button;
pub mod cache;
#[cfg(feature = "hardware-cdev")]
pub mod cdev;
pub mod debounce;
pub mod devices;
pub mod dispatcher;
pub mod error;
pub mod mock;
pub mod traits;

// Re-export commonly used types for convenience
pub use button::{Button, InterruptConfig};
pub use cache::{CachedState, StateSnapshot};
pub use debounce::DebounceFilter;
pub use devices::{AnyInputLine, AnyLineDriver};
pub use dispatcher::{DispatchSettings, EventDispatcher};
pub use error::{HardwareError, Result};
pub use traits::{EventSink, InputLine, LineDriver, LineRequest, PressedSource};
