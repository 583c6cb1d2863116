//! RFC2833 digit reconstruction
//!
//! A sender repeats telephone-event packets for as long as a key is held and
//! retransmits the final end packet a few times. [`DtmfDebouncer`] collapses
//! such a burst into exactly one digit.
//!
//! A pending digit is emitted when one of these happens first:
//!
//! - a packet with the end bit arrives for it,
//! - a packet with a different event code arrives,
//! - the stream advances by the de-bounce timeout in RTP timestamp units without
//!   another telephone-event packet for the same code,
//! - the wall-clock fallback deadline passes with no packets at all.

use std::time::{Duration, Instant};

use tracing::{debug, trace, warn};

use crate::packet::DtmfEvent;
use crate::time::{ms_to_samples, rtp_timestamp_delta};
use crate::RtpTimestamp;

#[derive(Debug, Clone, Copy)]
struct PendingDigit {
    digit: char,
    event: u8,
    /// Remaining RTP timestamp units before the digit is considered complete
    countdown: i64,
    deadline: Instant,
}

/// De-bounce state for received telephone events
#[derive(Debug, Clone)]
pub struct DtmfDebouncer {
    timeout_ticks: i64,
    timeout: Duration,
    pending: Option<PendingDigit>,
    last_rx_ts: Option<RtpTimestamp>,
    last_ended: Option<(u8, RtpTimestamp)>,
}

impl DtmfDebouncer {
    /// Create a debouncer for a stream clocked at `clock_rate`
    pub fn new(timeout_ms: u32, clock_rate: u32) -> Self {
        Self {
            timeout_ticks: ms_to_samples(i64::from(timeout_ms), clock_rate),
            timeout: Duration::from_millis(u64::from(timeout_ms)),
            pending: None,
            last_rx_ts: None,
            last_ended: None,
        }
    }

    /// Digit currently waiting to be emitted
    pub fn pending(&self) -> Option<char> {
        self.pending.map(|p| p.digit)
    }

    /// Wall-clock deadline of the pending digit
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.map(|p| p.deadline)
    }

    /// Account for a non-event packet carrying `ts`
    ///
    /// Returns the pending digit once the stream has advanced past the
    /// de-bounce timeout.
    pub fn on_media(&mut self, ts: RtpTimestamp) -> Option<char> {
        let advance = self.advance_to(ts);
        let pending = self.pending.as_mut()?;

        if advance > 0 {
            pending.countdown -= advance;
        }
        if pending.countdown <= 0 {
            return self.flush("timestamp timeout");
        }
        None
    }

    /// Handle one telephone-event packet
    ///
    /// Returns the digits completed by this packet in emission order: at most
    /// the previously pending digit followed by this packet's own digit.
    pub fn on_event(&mut self, event: &DtmfEvent, ts: RtpTimestamp, now: Instant) -> Vec<char> {
        let mut completed = Vec::new();
        let advance = self.advance_to(ts);

        let Some(digit) = event.digit() else {
            warn!("Ignoring unsupported telephone event code {}", event.event);
            return completed;
        };

        if self.last_ended == Some((event.event, ts)) {
            trace!("Ignoring retransmitted end of digit '{}'", digit);
            return completed;
        }

        if let Some(pending) = self.pending.as_mut() {
            pending.countdown -= advance.max(0);
            if pending.countdown <= 0 {
                completed.extend(self.flush("timestamp timeout"));
            }
        }

        let same_press = self.pending.map_or(false, |p| p.event == event.event);
        if !same_press {
            completed.extend(self.flush("new key press"));
        }

        if event.end {
            self.pending = None;
            self.last_ended = Some((event.event, ts));
            debug!("DTMF digit '{}' ended (duration {})", digit, event.duration);
            completed.push(digit);
        } else {
            if !same_press {
                trace!("DTMF digit '{}' started at ts {}", digit, ts);
            }
            self.pending = Some(PendingDigit {
                digit,
                event: event.event,
                countdown: self.timeout_ticks,
                deadline: now + self.timeout,
            });
        }

        completed
    }

    /// Emit the pending digit if its wall-clock deadline has passed
    pub fn poll(&mut self, now: Instant) -> Option<char> {
        match self.pending {
            Some(p) if now >= p.deadline => self.flush("wall-clock timeout"),
            _ => None,
        }
    }

    /// Drop all state, discarding any pending digit
    pub fn reset(&mut self) {
        self.pending = None;
        self.last_rx_ts = None;
        self.last_ended = None;
    }

    fn advance_to(&mut self, ts: RtpTimestamp) -> i64 {
        let advance = self
            .last_rx_ts
            .map_or(0, |last| i64::from(rtp_timestamp_delta(ts, last)));
        if advance >= 0 {
            self.last_rx_ts = Some(ts);
        }
        advance
    }

    fn flush(&mut self, reason: &str) -> Option<char> {
        let pending = self.pending.take()?;
        debug!("DTMF digit '{}' completed ({})", pending.digit, reason);
        Some(pending.digit)
    }
}
