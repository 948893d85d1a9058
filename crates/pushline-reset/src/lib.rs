//! Hold-to-reset handling for a push-button.
//!
//! This crate contains the countdown state machine that turns a long press
//! into a shutdown and a shorter one into a reboot, plus the power actions
//! it triggers.

pub mod actions;
pub mod error;
pub mod state_machine;

pub use actions::{PowerAction, PowerActions, SystemPowerCommands};
pub use error::{ResetError, Result};
pub use state_machine::{
    CountdownObserver, CountdownPhase, Delay, HoldOutcome, HoldStateMachine, ThreadDelay,
    TracingObserver,
};
