//! Time and clock utilities for RTP
//!
//! This module converts between the monotonic wall clock and RTP media
//! timestamps, and provides the millisecond timebase used to schedule
//! jitter buffer playout.
//!
//! All elapsed-time computations use [`Instant`], never the system clock, so
//! adjustments of the wall clock cannot make time run backwards.

use std::time::{Duration, Instant};

/// Elapsed milliseconds since `epoch`, never negative.
pub fn now_ms(epoch: Instant) -> i64 {
    ms_between(epoch, Instant::now())
}

/// Milliseconds from `epoch` to `at`, saturating at zero when `at` precedes `epoch`.
pub fn ms_between(epoch: Instant, at: Instant) -> i64 {
    at.saturating_duration_since(epoch).as_millis() as i64
}

/// A fixed monotonic epoch that playout times are measured against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timebase {
    epoch: Instant,
}

impl Timebase {
    /// Start a timebase at the current instant
    pub fn new() -> Self {
        Self { epoch: Instant::now() }
    }

    /// Start a timebase at a given instant
    pub fn starting_at(epoch: Instant) -> Self {
        Self { epoch }
    }

    /// The instant this timebase counts from
    pub fn epoch(&self) -> Instant {
        self.epoch
    }

    /// Milliseconds elapsed since the epoch
    pub fn now_ms(&self) -> i64 {
        now_ms(self.epoch)
    }

    /// Milliseconds between the epoch and `at`
    pub fn ms_at(&self, at: Instant) -> i64 {
        ms_between(self.epoch, at)
    }

    /// The instant corresponding to `ms` milliseconds after the epoch
    pub fn instant_at(&self, ms: i64) -> Instant {
        self.epoch + Duration::from_millis(ms.max(0) as u64)
    }

    /// Move the epoch to `at`
    pub fn reset(&mut self, at: Instant) {
        self.epoch = at;
    }
}

impl Default for Timebase {
    fn default() -> Self {
        Self::new()
    }
}

/// Convert RTP timestamp to duration at a given clock rate
pub fn rtp_timestamp_to_duration(timestamp: u32, clock_rate: u32) -> Duration {
    if clock_rate == 0 {
        return Duration::from_secs(0);
    }

    let seconds = timestamp / clock_rate;
    let remainder = timestamp % clock_rate;
    let nanos = ((remainder as u64) * 1_000_000_000) / (clock_rate as u64);

    Duration::new(seconds as u64, nanos as u32)
}

/// Convert duration to RTP timestamp at a given clock rate
pub fn duration_to_rtp_timestamp(duration: Duration, clock_rate: u32) -> u32 {
    let seconds = duration.as_secs();
    let nanos = duration.subsec_nanos();

    let timestamp_seconds = seconds * (clock_rate as u64);
    let timestamp_fraction = ((nanos as u64) * (clock_rate as u64)) / 1_000_000_000;

    (timestamp_seconds + timestamp_fraction) as u32
}

/// Milliseconds covered by `samples` at `clock_rate`
pub fn samples_to_ms(samples: i64, clock_rate: u32) -> i64 {
    if clock_rate == 0 {
        return 0;
    }
    samples * 1000 / clock_rate as i64
}

/// Samples covered by `ms` milliseconds at `clock_rate`
pub fn ms_to_samples(ms: i64, clock_rate: u32) -> i64 {
    ms * clock_rate as i64 / 1000
}

/// Signed distance from `b` to `a` in RTP timestamp units, handling wraparound
pub fn rtp_timestamp_delta(a: u32, b: u32) -> i32 {
    a.wrapping_sub(b) as i32
}

/// Signed distance from `b` to `a` in sequence numbers, handling wraparound
pub fn seq_delta(a: u16, b: u16) -> i16 {
    a.wrapping_sub(b) as i16
}

/// Typical clock rates for common audio codecs
pub mod clock_rates {
    /// G.711, G.726, G.729, GSM (8kHz)
    pub const AUDIO_8KHZ: u32 = 8000;

    /// G.722 RTP clock (8kHz by RFC 3551 despite 16kHz sampling)
    pub const G722_RTP: u32 = 8000;

    /// Wideband audio (16kHz)
    pub const AUDIO_16KHZ: u32 = 16000;

    /// Opus (48kHz)
    pub const AUDIO_48KHZ: u32 = 48000;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_conversion() {
        let duration = Duration::from_millis(125);
        let timestamp = duration_to_rtp_timestamp(duration, 8000);
        assert_eq!(timestamp, 1000); // 125ms = 1000 samples at 8kHz

        let converted_duration = rtp_timestamp_to_duration(timestamp, 8000);
        assert_eq!(converted_duration.as_millis(), 125);

        assert_eq!(samples_to_ms(160, 8000), 20);
        assert_eq!(ms_to_samples(300, 8000), 2400);
        assert_eq!(samples_to_ms(160, 0), 0);
    }

    #[test]
    fn test_timestamp_delta_wraps() {
        assert_eq!(rtp_timestamp_delta(2000, 1000), 1000);
        assert_eq!(rtp_timestamp_delta(1000, 2000), -1000);
        assert_eq!(rtp_timestamp_delta(10, 0xFFFF_FFFF), 11);
        assert_eq!(rtp_timestamp_delta(0xFFFF_FFFF, 10), -11);

        assert_eq!(seq_delta(2, 0xFFFF), 3);
        assert_eq!(seq_delta(0xFFFF, 2), -3);
    }

    #[test]
    fn test_timebase_never_negative() {
        let later = Instant::now() + Duration::from_secs(5);
        let tb = Timebase::starting_at(later);
        assert_eq!(tb.now_ms(), 0);
        assert_eq!(tb.ms_at(Instant::now()), 0);

        let tb = Timebase::new();
        let at = tb.epoch() + Duration::from_millis(250);
        assert_eq!(tb.ms_at(at), 250);
        assert_eq!(tb.instant_at(250), at);
    }

    #[test]
    fn test_now_ms_monotonic() {
        let epoch = Instant::now();
        let first = now_ms(epoch);
        let second = now_ms(epoch);
        assert!(first >= 0);
        assert!(second >= first);
    }
}
