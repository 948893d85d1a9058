//! Enum wrappers for line driver dispatch.
//!
//! [`LineDriver`] has an associated line type, so drivers cannot be boxed
//! behind one trait object. [`AnyLineDriver`] picks the driver at runtime
//! and hands out [`AnyInputLine`] handles; the character-device variant only
//! exists with the `hardware-cdev` feature.
//!
//! # Examples
//!
//! ```
//! use pushline_core::{Bias, RawLevel};
//! use pushline_hardware::devices::AnyLineDriver;
//! use pushline_hardware::mock::SimulatedDriver;
//! use pushline_hardware::traits::{InputLine, LineDriver, LineRequest};
//!
//! let (driver, control) = SimulatedDriver::new("sim0");
//! let mut driver = AnyLineDriver::Simulated(driver);
//!
//! control.set_level(RawLevel::High);
//! let mut line = driver.open(&LineRequest::new("sim0", 3, Bias::Off)).unwrap();
//! assert_eq!(line.read_raw().unwrap(), RawLevel::High);
//! ```

use pushline_core::{EdgeEvent, EdgeSelector, RawLevel};
use tokio_util::sync::CancellationToken;

#[cfg(feature = "hardware-cdev")]
use crate::cdev::{CdevDriver, CdevLine};
use crate::Result;
use crate::mock::{SimulatedDriver, SimulatedLine};
use crate::traits::{InputLine, LineDriver, LineRequest};

/// Enum wrapper for line driver dispatch.
#[derive(Debug)]
#[non_exhaustive]
pub enum AnyLineDriver {
    /// Simulated chip for development and testing.
    Simulated(SimulatedDriver),

    /// Linux GPIO character device.
    #[cfg(feature = "hardware-cdev")]
    Cdev(CdevDriver),
}

impl AnyLineDriver {
    /// Driver name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Simulated(_) => "simulated",
            #[cfg(feature = "hardware-cdev")]
            Self::Cdev(_) => "cdev",
        }
    }
}

impl LineDriver for AnyLineDriver {
    type Line = AnyInputLine;

    fn open(&mut self, request: &LineRequest) -> Result<AnyInputLine> {
        match self {
            Self::Simulated(driver) => driver.open(request).map(AnyInputLine::Simulated),
            #[cfg(feature = "hardware-cdev")]
            Self::Cdev(driver) => driver.open(request).map(AnyInputLine::Cdev),
        }
    }
}

impl From<SimulatedDriver> for AnyLineDriver {
    fn from(driver: SimulatedDriver) -> Self {
        Self::Simulated(driver)
    }
}

#[cfg(feature = "hardware-cdev")]
impl From<CdevDriver> for AnyLineDriver {
    fn from(driver: CdevDriver) -> Self {
        Self::Cdev(driver)
    }
}

/// Enum wrapper for line handle dispatch.
#[derive(Debug)]
#[non_exhaustive]
pub enum AnyInputLine {
    /// Line on the simulated chip.
    Simulated(SimulatedLine),

    /// Line on a character device.
    #[cfg(feature = "hardware-cdev")]
    Cdev(CdevLine),
}

impl InputLine for AnyInputLine {
    fn read_raw(&mut self) -> Result<RawLevel> {
        match self {
            Self::Simulated(line) => line.read_raw(),
            #[cfg(feature = "hardware-cdev")]
            Self::Cdev(line) => line.read_raw(),
        }
    }

    fn watch_edges(&mut self, edges: EdgeSelector) -> Result<()> {
        match self {
            Self::Simulated(line) => line.watch_edges(edges),
            #[cfg(feature = "hardware-cdev")]
            Self::Cdev(line) => line.watch_edges(edges),
        }
    }

    fn wait_for_edge(&mut self, cancel: &CancellationToken) -> Result<EdgeEvent> {
        match self {
            Self::Simulated(line) => line.wait_for_edge(cancel),
            #[cfg(feature = "hardware-cdev")]
            Self::Cdev(line) => line.wait_for_edge(cancel),
        }
    }

    fn close(&mut self) {
        match self {
            Self::Simulated(line) => line.close(),
            #[cfg(feature = "hardware-cdev")]
            Self::Cdev(line) => line.close(),
        }
    }

    fn is_open(&self) -> bool {
        match self {
            Self::Simulated(line) => line.is_open(),
            #[cfg(feature = "hardware-cdev")]
            Self::Cdev(line) => line.is_open(),
        }
    }
}
