//! Simulated line driver for testing and development.
//!
//! This module provides a GPIO chip simulation that can be controlled
//! programmatically without requiring physical hardware.

pub mod line;

// Re-export commonly used types
pub use line::{SimulatedDriver, SimulatedLine, SimulatedLineControl};
