//! Power actions triggered by the reset countdown.
//!
//! [`PowerActions`] is the seam between the countdown and the operating
//! system. [`SystemPowerCommands`] runs external commands; tests substitute
//! a recorder. A successful action normally ends the process, so returning
//! from one is only expected from fakes or from commands that were refused.

use std::fmt;
use std::process::Command;

use pushline_core::ResetConfig;
use pushline_core::constants::{DEFAULT_REBOOT_COMMAND, DEFAULT_SHUTDOWN_COMMAND};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::error::{ResetError, Result};

/// The two actions the countdown can end in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerAction {
    Shutdown,
    Reboot,
}

impl fmt::Display for PowerAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PowerAction::Shutdown => write!(f, "shutdown"),
            PowerAction::Reboot => write!(f, "reboot"),
        }
    }
}

/// System power control.
pub trait PowerActions {
    /// Halt the system.
    fn shutdown(&mut self) -> Result<()>;

    /// Restart the system.
    fn reboot(&mut self) -> Result<()>;
}

impl<T: PowerActions + ?Sized> PowerActions for &mut T {
    fn shutdown(&mut self) -> Result<()> {
        (**self).shutdown()
    }

    fn reboot(&mut self) -> Result<()> {
        (**self).reboot()
    }
}

/// Power actions backed by external commands.
///
/// Each command is an argument vector; the first element is the program.
/// Defaults are `sudo /sbin/shutdown -h now` and `sudo /sbin/reboot`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemPowerCommands {
    shutdown: Vec<String>,
    reboot: Vec<String>,
}

impl SystemPowerCommands {
    /// Create commands from explicit argument vectors.
    ///
    /// # Errors
    ///
    /// Returns [`ResetError::InvalidCommand`] if either vector is empty.
    pub fn new(shutdown: Vec<String>, reboot: Vec<String>) -> Result<Self> {
        if shutdown.is_empty() {
            return Err(ResetError::InvalidCommand(PowerAction::Shutdown));
        }
        if reboot.is_empty() {
            return Err(ResetError::InvalidCommand(PowerAction::Reboot));
        }
        Ok(Self { shutdown, reboot })
    }

    /// Create commands from a reset configuration.
    pub fn from_config(config: &ResetConfig) -> Result<Self> {
        Self::new(config.shutdown_command.clone(), config.reboot_command.clone())
    }

    pub fn command(&self, action: PowerAction) -> &[String] {
        match action {
            PowerAction::Shutdown => &self.shutdown,
            PowerAction::Reboot => &self.reboot,
        }
    }

    fn run(&self, action: PowerAction) -> Result<()> {
        let argv = self.command(action);
        let Some((program, args)) = argv.split_first() else {
            return Err(ResetError::InvalidCommand(action));
        };

        info!(%action, command = %argv.join(" "), "Running power command");

        let status = Command::new(program).args(args).status().map_err(|e| {
            error!(%action, program = %program, "Failed to start power command: {}", e);
            ResetError::action(action, format!("failed to run {program}: {e}"))
        })?;

        if status.success() {
            Ok(())
        } else {
            error!(%action, %status, "Power command failed");
            Err(ResetError::action(action, format!("{program} {status}")))
        }
    }
}

impl Default for SystemPowerCommands {
    fn default() -> Self {
        let argv = |command: &[&str]| -> Vec<String> { command.iter().map(|s| s.to_string()).collect() };
        Self {
            shutdown: argv(DEFAULT_SHUTDOWN_COMMAND),
            reboot: argv(DEFAULT_REBOOT_COMMAND),
        }
    }
}

impl PowerActions for SystemPowerCommands {
    fn shutdown(&mut self) -> Result<()> {
        self.run(PowerAction::Shutdown)
    }

    fn reboot(&mut self) -> Result<()> {
        self.run(PowerAction::Reboot)
    }
}
