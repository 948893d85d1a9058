use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    // Polarity / edge errors
    #[error("Invalid legacy PUD value: {0} (expected 0, 1 or 2)")]
    InvalidLegacyPud(u8),

    #[error("Invalid edge selector: {0}")]
    InvalidEdgeSelector(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Malformed configuration: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
