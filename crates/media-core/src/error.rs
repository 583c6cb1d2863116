use std::io;
use thiserror::Error;

/// Result type for media operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for media operations
#[derive(Debug, Error)]
pub enum Error {
    /// Unknown configuration key, or a value that cannot be applied
    #[error("Configuration error: {key} = {value:?}")]
    Config { key: String, value: String },

    /// No jitter buffer implementation registered under this name
    #[error("Unknown jitter buffer implementation: {0}")]
    UnknownImplementation(String),

    /// Invalid state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Error from the RTP layer
    #[error("RTP error: {0}")]
    Rtp(#[from] rtpjb_rtp_core::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Malformed JSON configuration
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn config(key: &str, value: &str) -> Self {
        Error::Config {
            key: key.to_string(),
            value: value.to_string(),
        }
    }
}
