//! RTP session statistics
//!
//! Counters kept by an [`RtpSession`](crate::session::RtpSession) for every
//! packet it sends or receives.

use std::fmt;

use serde::Serialize;

use crate::time::seq_delta;
use crate::RtpSequenceNumber;

/// RTP packet statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RtpSessionStats {
    /// Total number of RTP packets sent
    pub packets_sent: u64,

    /// Total number of RTP bytes sent
    pub bytes_sent: u64,

    /// Total number of datagrams received
    pub packets_received: u64,

    /// Total number of bytes received
    pub bytes_received: u64,

    /// Received datagrams discarded (truncated, malformed, unknown payload type)
    pub packets_dropped: u64,

    /// Sends that failed or were partial
    pub send_failures: u64,

    /// Socket reads that failed with something other than would-block
    pub receive_errors: u64,

    /// DTMF digits emitted by the receive path
    pub digits_received: u64,

    /// DTMF digits sent
    pub digits_sent: u64,

    /// Packets missing according to sequence number gaps
    pub sequence_gaps: u64,

    /// Packets that arrived with a sequence number at or behind the last one
    pub packets_out_of_order: u64,

    /// Last sequence number received
    pub last_seq: Option<RtpSequenceNumber>,
}

impl RtpSessionStats {
    /// Record a sent packet
    pub fn record_sent(&mut self, bytes: usize) {
        self.packets_sent += 1;
        self.bytes_sent += bytes as u64;
    }

    /// Record a received datagram
    pub fn record_received(&mut self, bytes: usize) {
        self.packets_received += 1;
        self.bytes_received += bytes as u64;
    }

    /// Track sequence continuity of a parsed packet
    pub fn record_sequence(&mut self, seq: RtpSequenceNumber) {
        if let Some(last) = self.last_seq {
            let delta = seq_delta(seq, last);
            if delta <= 0 {
                self.packets_out_of_order += 1;
                return;
            }
            if delta > 1 {
                self.sequence_gaps += (delta - 1) as u64;
            }
        }
        self.last_seq = Some(seq);
    }
}

impl fmt::Display for RtpSessionStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "sent {} pkts/{} bytes, received {} pkts/{} bytes, dropped {}, send failures {}, receive errors {}, gaps {}, digits rx {} tx {}",
            self.packets_sent,
            self.bytes_sent,
            self.packets_received,
            self.bytes_received,
            self.packets_dropped,
            self.send_failures,
            self.receive_errors,
            self.sequence_gaps,
            self.digits_received,
            self.digits_sent
        )
    }
}
