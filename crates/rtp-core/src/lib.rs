//! RTP Core library for rtpjb
//!
//! This crate provides RTP packet encoding/decoding, RFC2833 telephone events
//! and the non-blocking session and socket types a bridge loop drives.
//!
//! The library is organized into several modules:
//!
//! - `time`: Monotonic clock and RTP timestamp conversions
//! - `frame`: Media frames handed between transport, jitter buffer and bridge
//! - `packet`: RTP header and RFC2833 payload wire formats
//! - `payload`: Payload type mapping
//! - `transport`: Poller and even-port UDP sockets
//! - `session`: RTP session and DTMF de-bounce
//! - `stats`: Per-session counters

mod error;

pub mod frame;
pub mod packet;
pub mod payload;
pub mod session;
pub mod stats;
pub mod time;
pub mod transport;

pub use error::Error;

pub use frame::{ControlKind, FrameKind, MediaFrame};
pub use packet::{DtmfEvent, RtpHeader, RtpPacket};
pub use payload::{MediaFormat, PayloadTypeMap, RtpPayload};
pub use session::{RtpConfig, RtpSession, SessionState};
pub use stats::RtpSessionStats;
pub use time::Timebase;
pub use transport::{IoContext, IoHandle};

/// The default maximum size for RTP packets in bytes
pub const DEFAULT_MAX_PACKET_SIZE: usize = 1500;

/// Typedef for RTP timestamp values
pub type RtpTimestamp = u32;

/// Typedef for RTP sequence numbers
pub type RtpSequenceNumber = u16;

/// Typedef for RTP synchronization source identifier
pub type RtpSsrc = u32;

/// Typedef for RTP contributing source identifier
pub type RtpCsrc = u32;

/// Result type for RTP operations
pub type Result<T> = std::result::Result<T, Error>;

/// Prelude module with commonly used types
pub mod prelude {
    pub use crate::{
        ControlKind, Error, FrameKind, IoContext, IoHandle, MediaFormat, MediaFrame, Result,
        RtpConfig, RtpHeader, RtpPacket, RtpSequenceNumber, RtpSession, RtpSsrc, RtpTimestamp,
        SessionState, Timebase,
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use packet::hex_dump;
    use tracing::debug;

    fn init_test_logging() {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .try_init();
    }

    #[test]
    fn test_rtp_packet_round_trip_recovers_fields() {
        init_test_logging();

        let payload = Bytes::from_static(&[0x7f; 160]);
        let original = RtpPacket::new_with_payload(0, 0xfffe, 0x1234_5678, 0xabcd_ef01, payload);

        let wire = original.serialize().unwrap();
        debug!("Serialized packet header: [{}]", hex_dump(&wire[..12]));

        let parsed = RtpPacket::parse(&wire).unwrap();
        assert_eq!(parsed.header.sequence_number, 0xfffe);
        assert_eq!(parsed.header.timestamp, 0x1234_5678);
        assert_eq!(parsed.payload, original.payload);
    }
}
