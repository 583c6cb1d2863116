use std::io;
use thiserror::Error;

/// Error type for RTP operations
#[derive(Debug, Error)]
pub enum Error {
    /// Datagram shorter than the structure being decoded
    #[error("Truncated RTP packet: need {required} bytes but have {available}")]
    TruncatedPacket {
        required: usize,
        available: usize,
    },

    /// Invalid packet format
    #[error("Invalid RTP packet format: {0}")]
    InvalidPacket(String),

    /// No payload type mapping exists for a format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Socket would block, or a send/receive failed in a way the session survives
    #[error("Transient I/O error: {0}")]
    TransientIo(String),

    /// No port or socket could be allocated
    #[error("Resource error: {0}")]
    Resource(String),

    /// Operation not allowed in the current session state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Invalid parameter for RTP operation
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Malformed configuration value
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Per-packet errors are logged and the packet dropped; the session continues.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::TransientIo(_)
                | Error::TruncatedPacket { .. }
                | Error::InvalidPacket(_)
                | Error::UnsupportedFormat(_)
        )
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::TransientIo(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::TruncatedPacket { required: 12, available: 5 };
        assert_eq!(err.to_string(), "Truncated RTP packet: need 12 bytes but have 5");

        let io_err = Error::from(io::Error::new(io::ErrorKind::WouldBlock, "would block"));
        assert!(io_err.to_string().contains("Transient I/O error"));
    }

    #[test]
    fn test_transient_classification() {
        assert!(Error::TransientIo("x".into()).is_transient());
        assert!(Error::UnsupportedFormat("x".into()).is_transient());
        assert!(!Error::Resource("no ports".into()).is_transient());
        assert!(!Error::InvalidState("closed".into()).is_transient());
    }
}
