//! Error types for line operations.
//!
//! Every fallible operation in this crate returns [`Result<T>`]. The variants
//! follow the three failure classes of a button line (bad configuration,
//! unavailable resource, no state sampled yet) plus the cancellation signal
//! used by blocking edge waits.

/// Result type alias for line operations.
pub type Result<T> = std::result::Result<T, HardwareError>;

/// Errors that can occur while configuring, reading or watching a line.
#[derive(Debug, thiserror::Error)]
pub enum HardwareError {
    /// Invalid line offset, edge selector, polarity value or missing callback.
    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    /// The line could not be opened, configured or read.
    #[error("Resource error: {message}")]
    ResourceError { message: String },

    /// A cached read was requested before any successful sample.
    #[error("State unknown: no sample or accepted edge recorded yet")]
    StateUnknown,

    /// A blocking edge wait observed its cancellation token.
    #[error("Edge wait cancelled")]
    Cancelled,

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl HardwareError {
    /// Create a new configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::ConfigurationError {
            message: message.into(),
        }
    }

    /// Create a new resource error.
    pub fn resource(message: impl Into<String>) -> Self {
        Self::ResourceError {
            message: message.into(),
        }
    }

    /// Resource error for operations on a line that is not open.
    pub fn not_open(line: impl std::fmt::Display) -> Self {
        Self::resource(format!("line {line} is not open"))
    }

    /// Check if this error is the cancellation signal of an edge wait.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Check if this error is a configuration error.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::ConfigurationError { .. })
    }

    /// Check if this error is a resource error.
    pub fn is_resource(&self) -> bool {
        matches!(self, Self::ResourceError { .. } | Self::Io(_))
    }
}

impl From<pushline_core::Error> for HardwareError {
    fn from(error: pushline_core::Error) -> Self {
        match error {
            pushline_core::Error::Io(io) => Self::Io(io),
            other => Self::configuration(other.to_string()),
        }
    }
}
