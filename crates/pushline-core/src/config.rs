//! Serde configuration for a button line and its reset behavior.
//!
//! A configuration document is plain JSON:
//!
//! ```json
//! {
//!   "button": { "chip": "/dev/gpiochip0", "offset": 17, "pud": 2, "debounce_us": 5000 },
//!   "reset": { "countdown_ticks": 3, "tick_interval_ms": 1000 }
//! }
//! ```
//!
//! Polarity is given either explicitly (`"mode"` + `"bias"`) or through the
//! legacy `"pud"` number; both resolve to the same [`PolarityConfig`].

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{
    ActiveMode, Bias, EdgeSelector, LegacyPud, PolarityConfig, Result,
    constants::{
        DEFAULT_CHIP, DEFAULT_CONSUMER, DEFAULT_COUNTDOWN_TICKS, DEFAULT_DEBOUNCE_MICROS,
        DEFAULT_REBOOT_COMMAND, DEFAULT_SHUTDOWN_COMMAND, DEFAULT_TICK_INTERVAL_MS,
    },
    error::Error,
};

/// How the polarity of a line is described in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PolaritySetting {
    /// Explicit active mode and bias.
    Explicit { mode: ActiveMode, bias: Bias },

    /// Legacy numeric PUD value.
    Legacy { pud: LegacyPud },
}

impl PolaritySetting {
    #[must_use]
    pub fn resolve(&self) -> PolarityConfig {
        match *self {
            PolaritySetting::Explicit { mode, bias } => PolarityConfig::new(mode, bias),
            PolaritySetting::Legacy { pud } => PolarityConfig::from(pud),
        }
    }
}

impl From<PolarityConfig> for PolaritySetting {
    fn from(cfg: PolarityConfig) -> Self {
        PolaritySetting::Explicit {
            mode: cfg.mode(),
            bias: cfg.bias(),
        }
    }
}

/// Line addressing, polarity and interrupt settings for one button.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ButtonConfig {
    #[serde(default = "default_chip")]
    pub chip: String,

    pub offset: u32,

    #[serde(flatten)]
    pub polarity: PolaritySetting,

    #[serde(default)]
    pub edges: EdgeSelector,

    #[serde(default = "default_debounce_us")]
    pub debounce_us: u32,

    #[serde(default = "default_consumer")]
    pub consumer: String,
}

impl ButtonConfig {
    /// Configuration for `offset` on the default chip with the given polarity.
    #[must_use]
    pub fn new(offset: u32, polarity: PolarityConfig) -> Self {
        Self {
            chip: default_chip(),
            offset,
            polarity: polarity.into(),
            edges: EdgeSelector::default(),
            debounce_us: default_debounce_us(),
            consumer: default_consumer(),
        }
    }

    #[must_use]
    pub fn polarity(&self) -> PolarityConfig {
        self.polarity.resolve()
    }

    #[must_use]
    pub fn debounce(&self) -> Duration {
        Duration::from_micros(u64::from(self.debounce_us))
    }

    /// Check the fields serde cannot check on its own.
    ///
    /// # Errors
    /// Returns `Error::Config` if the chip or consumer label is empty.
    pub fn validate(&self) -> Result<()> {
        if self.chip.trim().is_empty() {
            return Err(Error::Config("button.chip must not be empty".to_string()));
        }
        if self.consumer.trim().is_empty() {
            return Err(Error::Config("button.consumer must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Countdown and power command settings for the reset button.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResetConfig {
    pub countdown_ticks: u8,
    pub tick_interval_ms: u64,
    pub shutdown_command: Vec<String>,
    pub reboot_command: Vec<String>,
}

impl Default for ResetConfig {
    fn default() -> Self {
        Self {
            countdown_ticks: DEFAULT_COUNTDOWN_TICKS,
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            shutdown_command: to_argv(DEFAULT_SHUTDOWN_COMMAND),
            reboot_command: to_argv(DEFAULT_REBOOT_COMMAND),
        }
    }
}

impl ResetConfig {
    #[must_use]
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// # Errors
    /// Returns `Error::Config` for a zero-tick countdown or an empty command.
    pub fn validate(&self) -> Result<()> {
        if self.countdown_ticks == 0 {
            return Err(Error::Config(
                "reset.countdown_ticks must be at least 1".to_string(),
            ));
        }
        if self.shutdown_command.is_empty() {
            return Err(Error::Config(
                "reset.shutdown_command must not be empty".to_string(),
            ));
        }
        if self.reboot_command.is_empty() {
            return Err(Error::Config(
                "reset.reboot_command must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Top-level configuration document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushlineConfig {
    pub button: ButtonConfig,

    #[serde(default)]
    pub reset: ResetConfig,
}

impl PushlineConfig {
    /// Parse and validate a JSON configuration document.
    ///
    /// # Errors
    /// Returns `Error::Json` for malformed documents and `Error::Config`
    /// for documents that parse but fail validation.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: PushlineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and validate a JSON configuration file.
    ///
    /// # Errors
    /// Returns `Error::Io` if the file cannot be read, otherwise the errors
    /// of [`PushlineConfig::from_json_str`].
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// # Errors
    /// Returns the first validation error found.
    pub fn validate(&self) -> Result<()> {
        self.button.validate()?;
        self.reset.validate()
    }
}

fn default_chip() -> String {
    DEFAULT_CHIP.to_string()
}

fn default_consumer() -> String {
    DEFAULT_CONSUMER.to_string()
}

fn default_debounce_us() -> u32 {
    DEFAULT_DEBOUNCE_MICROS
}

fn to_argv(command: &[&str]) -> Vec<String> {
    command.iter().map(|arg| (*arg).to_string()).collect()
}
