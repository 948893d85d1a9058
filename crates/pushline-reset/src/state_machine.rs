//! Hold-to-reset countdown.
//!
//! [`HoldStateMachine::check`] samples the button once. If it is pressed the
//! machine announces the reset and counts down, one tick interval per step,
//! then samples again: still pressed means shutdown, released means reboot.
//!
//! # Phases
//!
//! - `Idle`: button not pressed, nothing happens
//! - `Counting(n)`: countdown step, from the configured tick count down to 1
//! - `Shutdown`: held through the whole countdown
//! - `Reboot`: released before the countdown ended
//!
//! # Timeline
//!
//! With the default three ticks of one second:
//!
//! ```text
//! t=0   pressed, "System is resetting"
//! t=1   3
//! t=2   2
//! t=3   1
//! t=4   re-sample → Shutdown | Reboot
//! ```
//!
//! # Examples
//!
//! ```
//! use std::time::Duration;
//!
//! use pushline_core::constants::PUD_UP;
//! use pushline_core::RawLevel;
//! use pushline_hardware::Button;
//! use pushline_hardware::mock::SimulatedDriver;
//! use pushline_reset::{HoldOutcome, HoldStateMachine, PowerActions, Result};
//!
//! #[derive(Default)]
//! struct Log(Vec<&'static str>);
//!
//! impl PowerActions for Log {
//!     fn shutdown(&mut self) -> Result<()> {
//!         self.0.push("shutdown");
//!         Ok(())
//!     }
//!
//!     fn reboot(&mut self) -> Result<()> {
//!         self.0.push("reboot");
//!         Ok(())
//!     }
//! }
//!
//! let (driver, control) = SimulatedDriver::new("sim0");
//! let button = Button::with_legacy_pud(driver, "sim0", 21, PUD_UP).unwrap();
//! button.begin().unwrap();
//!
//! let mut machine = HoldStateMachine::new(&button, Log::default())
//!     .with_tick_interval(Duration::from_millis(1));
//!
//! assert_eq!(machine.check().unwrap(), HoldOutcome::NotPressed);
//!
//! control.set_level(RawLevel::Low);
//! assert_eq!(machine.check().unwrap(), HoldOutcome::Shutdown);
//! assert_eq!(machine.actions().0, vec!["shutdown"]);
//! ```

use std::fmt;
use std::thread;
use std::time::Duration;

use pushline_core::ResetConfig;
use pushline_core::constants::{DEFAULT_COUNTDOWN_TICKS, DEFAULT_TICK_INTERVAL_MS};
use pushline_hardware::PressedSource;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::actions::PowerActions;
use crate::error::Result;

/// Phase of a single [`HoldStateMachine::check`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CountdownPhase {
    /// Not pressed; no countdown.
    Idle,

    /// Countdown step; `n` steps remain including this one.
    Counting(u8),

    /// Held through the countdown; shutdown follows.
    Shutdown,

    /// Released during the countdown; reboot follows.
    Reboot,
}

impl fmt::Display for CountdownPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CountdownPhase::Idle => write!(f, "Idle"),
            CountdownPhase::Counting(n) => write!(f, "{} Sec", n),
            CountdownPhase::Shutdown => write!(f, "Shutdown"),
            CountdownPhase::Reboot => write!(f, "Reboot"),
        }
    }
}

/// Result of a completed [`HoldStateMachine::check`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HoldOutcome {
    /// The button was not pressed.
    NotPressed,

    /// Shutdown was requested and the action returned.
    Shutdown,

    /// Reboot was requested and the action returned.
    Reboot,
}

/// Receiver of countdown progress.
///
/// Called for every `Counting(n)` step and for the final phase. Closures
/// taking a [`CountdownPhase`] implement it.
pub trait CountdownObserver {
    fn on_phase(&mut self, phase: CountdownPhase);
}

impl<F: FnMut(CountdownPhase)> CountdownObserver for F {
    fn on_phase(&mut self, phase: CountdownPhase) {
        self(phase)
    }
}

/// Observer that logs every phase at info level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl CountdownObserver for TracingObserver {
    fn on_phase(&mut self, phase: CountdownPhase) {
        info!(%phase, "Reset countdown");
    }
}

/// Blocking wait between countdown steps.
pub trait Delay {
    fn delay(&mut self, duration: Duration);
}

impl<F: FnMut(Duration)> Delay for F {
    fn delay(&mut self, duration: Duration) {
        self(duration)
    }
}

/// Delay backed by [`thread::sleep`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadDelay;

impl Delay for ThreadDelay {
    fn delay(&mut self, duration: Duration) {
        thread::sleep(duration);
    }
}

/// Countdown from a held button to a power action.
///
/// Depends only on a [`PressedSource`], so it runs on top of a polling
/// [`Button`](pushline_hardware::Button) or of a scripted fake.
///
/// # Thread Safety
///
/// `check` blocks the calling thread for the whole countdown. Run it from a
/// thread that may stall, not from an edge sink.
pub struct HoldStateMachine<P, A, O = TracingObserver, D = ThreadDelay> {
    source: P,
    actions: A,
    observer: O,
    delay: D,

    /// Countdown steps after the announcement.
    ticks: u8,

    /// Wait after the announcement and after each step.
    tick_interval: Duration,
}

impl<P: PressedSource, A: PowerActions> HoldStateMachine<P, A> {
    /// Create a machine with the default three one-second ticks.
    pub fn new(source: P, actions: A) -> Self {
        Self {
            source,
            actions,
            observer: TracingObserver,
            delay: ThreadDelay,
            ticks: DEFAULT_COUNTDOWN_TICKS,
            tick_interval: Duration::from_millis(DEFAULT_TICK_INTERVAL_MS),
        }
    }

    /// Create a machine with the countdown of a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ResetError::Config`](crate::ResetError::Config) if the
    /// configuration is invalid.
    pub fn from_config(source: P, actions: A, config: &ResetConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(source, actions)
            .with_countdown(config.countdown_ticks)
            .with_tick_interval(config.tick_interval()))
    }
}

impl<P, A, O, D> HoldStateMachine<P, A, O, D>
where
    P: PressedSource,
    A: PowerActions,
    O: CountdownObserver,
    D: Delay,
{
    /// Replace the countdown observer.
    pub fn with_observer<O2: CountdownObserver>(self, observer: O2) -> HoldStateMachine<P, A, O2, D> {
        HoldStateMachine {
            source: self.source,
            actions: self.actions,
            observer,
            delay: self.delay,
            ticks: self.ticks,
            tick_interval: self.tick_interval,
        }
    }

    /// Replace the delay used between steps.
    pub fn with_delay<D2: Delay>(self, delay: D2) -> HoldStateMachine<P, A, O, D2> {
        HoldStateMachine {
            source: self.source,
            actions: self.actions,
            observer: self.observer,
            delay,
            ticks: self.ticks,
            tick_interval: self.tick_interval,
        }
    }

    /// Set the number of countdown steps. Zero is raised to one.
    pub fn with_countdown(mut self, ticks: u8) -> Self {
        self.ticks = ticks.max(1);
        self
    }

    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    pub fn ticks(&self) -> u8 {
        self.ticks
    }

    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    pub fn source(&self) -> &P {
        &self.source
    }

    pub fn actions(&self) -> &A {
        &self.actions
    }

    /// Total blocking time of a pressed `check`, excluding the action.
    pub fn countdown_duration(&self) -> Duration {
        self.tick_interval * (u32::from(self.ticks) + 1)
    }

    /// Sample the button and run the countdown if it is pressed.
    ///
    /// Returns immediately with [`HoldOutcome::NotPressed`] when it is not.
    /// Otherwise blocks for [`countdown_duration`](Self::countdown_duration)
    /// and invokes exactly one action.
    ///
    /// # Errors
    ///
    /// A failed sample (at entry or after the countdown) is returned as
    /// [`ResetError::Sample`](crate::ResetError::Sample) and no action runs.
    /// A failed action is returned as is.
    pub fn check(&mut self) -> Result<HoldOutcome> {
        if !self.source.is_pressed()? {
            debug!("Reset button not pressed");
            return Ok(HoldOutcome::NotPressed);
        }

        info!(ticks = self.ticks, "System is resetting");
        self.delay.delay(self.tick_interval);

        for n in (1..=self.ticks).rev() {
            self.observer.on_phase(CountdownPhase::Counting(n));
            self.delay.delay(self.tick_interval);
        }

        let held = self.source.is_pressed().inspect_err(|e| {
            warn!("Reset button sample failed after countdown: {}", e);
        })?;

        if held {
            self.observer.on_phase(CountdownPhase::Shutdown);
            self.actions.shutdown()?;
            Ok(HoldOutcome::Shutdown)
        } else {
            self.observer.on_phase(CountdownPhase::Reboot);
            self.actions.reboot()?;
            Ok(HoldOutcome::Reboot)
        }
    }
}

impl<P, A, O, D> fmt::Debug for HoldStateMachine<P, A, O, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HoldStateMachine")
            .field("ticks", &self.ticks)
            .field("tick_interval", &self.tick_interval)
            .finish()
    }
}
