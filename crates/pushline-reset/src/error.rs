//! Error types for the reset flow.

use pushline_hardware::HardwareError;

use crate::actions::PowerAction;

/// Result type alias for reset operations.
pub type Result<T> = std::result::Result<T, ResetError>;

/// Errors that can occur while checking the button or running an action.
#[derive(Debug, thiserror::Error)]
pub enum ResetError {
    /// Sampling the button failed.
    #[error("Button sample failed: {0}")]
    Sample(#[from] HardwareError),

    /// A power action was started but did not succeed.
    #[error("{action} failed: {message}")]
    Action { action: PowerAction, message: String },

    /// A power command has no program to run.
    #[error("Invalid {0} command: empty argument vector")]
    InvalidCommand(PowerAction),

    /// The reset configuration is invalid.
    #[error("Configuration error: {0}")]
    Config(#[from] pushline_core::Error),
}

impl ResetError {
    /// Create a new action error.
    pub fn action(action: PowerAction, message: impl Into<String>) -> Self {
        Self::Action {
            action,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_error_from_hardware() {
        let error: ResetError = HardwareError::resource("line 4 is not open").into();
        assert!(matches!(error, ResetError::Sample(_)));
        assert_eq!(
            error.to_string(),
            "Button sample failed: Resource error: line 4 is not open"
        );
    }

    #[test]
    fn test_action_error_display() {
        let error = ResetError::action(PowerAction::Reboot, "exit status: 1");
        assert_eq!(error.to_string(), "reboot failed: exit status: 1");

        let error = ResetError::InvalidCommand(PowerAction::Shutdown);
        assert_eq!(error.to_string(), "Invalid shutdown command: empty argument vector");
    }
}
