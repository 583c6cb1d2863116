//! Timeline, admission and release logic shared by the implementations
//!
//! A frame's playout time is `ts + base + delay`: `base` maps media time onto
//! the channel timebase and is fixed when the timeline is anchored, `delay`
//! is the implementation's playout delay.

use tracing::{debug, trace, warn};

use rtpjb_rtp_core::MediaFrame;

use super::config::JitterBufferConfig;
use super::jitter::{GetResult, JitterBufferState, JitterBufferStats, PutResult};
use super::queue::FrameQueue;

/// Shared state of a jitter buffer implementation
#[derive(Debug, Clone)]
pub struct BufferCore {
    queue: FrameQueue,
    state: JitterBufferState,
    max_size: i64,
    resync_threshold: i64,
    base: i64,
    delay: i64,
    /// Media timestamp expected to follow the admitted frames
    expected_ts: Option<i64>,
    /// End of the last released frame's playout slot
    released_end: Option<i64>,
    needs_anchor: bool,
    stats: JitterBufferStats,
}

impl BufferCore {
    /// Create an empty core with an initial playout delay
    pub fn new(config: &JitterBufferConfig, delay: i64) -> Self {
        Self {
            queue: FrameQueue::new(),
            state: JitterBufferState::Empty,
            max_size: config.max_size,
            resync_threshold: config.resync_threshold,
            base: 0,
            delay,
            expected_ts: None,
            released_end: None,
            needs_anchor: true,
            stats: JitterBufferStats::default(),
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> JitterBufferState {
        self.state
    }

    /// Maximum buffered audio
    pub fn max_size(&self) -> i64 {
        self.max_size
    }

    /// Discontinuity that triggers a resync
    pub fn resync_threshold(&self) -> i64 {
        self.resync_threshold
    }

    /// Current playout delay
    pub fn delay(&self) -> i64 {
        self.delay
    }

    /// Offset mapping media time onto the timebase, before the delay
    pub fn base(&self) -> i64 {
        self.base
    }

    /// Queued audio
    pub fn depth_ms(&self) -> i64 {
        self.queue.depth_ms()
    }

    /// Counters, with depth and delay filled in
    pub fn stats(&self) -> JitterBufferStats {
        JitterBufferStats {
            current_delay_ms: self.delay,
            depth_ms: self.queue.depth_ms(),
            ..self.stats.clone()
        }
    }

    /// Whether the next put anchors a new timeline
    pub fn needs_anchor(&self) -> bool {
        self.needs_anchor
    }

    /// Anchor the timeline on `frame` and queue it
    pub fn put_first(&mut self, frame: MediaFrame, now: i64) -> PutResult {
        self.stats.frames_in += 1;
        self.anchor(&frame, now);
        self.state = JitterBufferState::Filling;
        self.admit(frame)
    }

    /// Queue a frame, resyncing on a discontinuity
    pub fn put(&mut self, frame: MediaFrame, now: i64) -> PutResult {
        if self.needs_anchor {
            if self.state == JitterBufferState::Empty {
                return self.put_first(frame, now);
            }
            self.stats.frames_in += 1;
            self.anchor(&frame, now);
            return self.admit_resynced(frame);
        }

        self.stats.frames_in += 1;
        let ts = frame.ts.unwrap_or_default();

        if let Some(expected) = self.expected_ts {
            if (ts - expected).abs() >= self.resync_threshold {
                debug!(
                    "Timestamp jump from {} to {} exceeds {}ms, resyncing",
                    expected, ts, self.resync_threshold
                );
                return self.restart_timeline(frame, now);
            }
        }

        let playout = self.playout_of(ts);
        if now - playout > self.resync_threshold {
            debug!(
                "Frame ts={} is {}ms behind its playout time, resyncing",
                ts,
                now - playout
            );
            return self.restart_timeline(frame, now);
        }

        if self.released_end.map_or(false, |end| playout < end) {
            trace!("Dropping late frame ts={} playout={}", ts, playout);
            self.stats.dropped_late += 1;
            return PutResult::Dropped;
        }

        if self.queue.contains_playout(playout) {
            trace!("Dropping duplicate frame ts={} playout={}", ts, playout);
            self.stats.dropped_duplicate += 1;
            return PutResult::Dropped;
        }

        self.admit(frame)
    }

    /// Discard the timeline and start a new one with an incoming `frame`
    pub fn resync(&mut self, frame: MediaFrame, now: i64) -> PutResult {
        self.stats.frames_in += 1;
        self.restart_timeline(frame, now)
    }

    fn restart_timeline(&mut self, frame: MediaFrame, now: i64) -> PutResult {
        self.drop_queue_for_resync();
        self.anchor(&frame, now);
        self.admit_resynced(frame)
    }

    /// Release the next frame due at `now`
    pub fn get(&mut self, now: i64) -> GetResult {
        let Some(frame) = self.queue.pop_due(now) else {
            return GetResult::NoFrame;
        };
        let playout = frame.delivery.unwrap_or(now);

        if self.released_end.map_or(false, |end| playout < end) {
            self.stats.dropped_late += 1;
            return GetResult::Dropped(frame);
        }

        self.released_end = Some(playout + frame.len_ms);
        self.stats.frames_out += 1;
        if matches!(
            self.state,
            JitterBufferState::Filling | JitterBufferState::Resyncing
        ) {
            debug!("Jitter buffer {} -> STEADY", self.state);
            self.state = JitterBufferState::Steady;
        }
        GetResult::Frame(frame)
    }

    /// Playout time of the next queued frame
    pub fn next(&self) -> Option<i64> {
        self.queue.peek_next_due_time()
    }

    /// Take the earliest queued frame
    pub fn remove(&mut self) -> Option<MediaFrame> {
        self.queue.pop_front()
    }

    /// Clear the queue and re-anchor on the next frame
    pub fn force_resync(&mut self) {
        self.drop_queue_for_resync();
        self.needs_anchor = true;
    }

    /// Clear the queue and forget the timeline
    pub fn empty_and_reset(&mut self) {
        let dropped = self.queue.clear();
        debug!("Jitter buffer reset, {} frames dropped", dropped);
        self.state = JitterBufferState::Empty;
        self.expected_ts = None;
        self.needs_anchor = true;
    }

    /// Change the playout delay, moving queued frames with it
    ///
    /// Queued frames never move before the end of the last released frame.
    pub fn set_delay(&mut self, delay: i64) {
        let delta = delay - self.delay;
        if delta != 0 {
            self.queue.shift(delta, self.released_end);
            self.delay = delay;
        }
    }

    fn playout_of(&self, ts: i64) -> i64 {
        ts + self.base + self.delay
    }

    fn anchor(&mut self, frame: &MediaFrame, now: i64) {
        let ts = frame.ts.unwrap_or_default();
        let mut first_playout = now + self.delay;
        // A new timeline never plays before audio already released
        if let Some(end) = self.released_end {
            first_playout = first_playout.max(end);
        }
        self.base = first_playout - self.delay - ts;
        self.expected_ts = None;
        self.needs_anchor = false;
        trace!("Anchored timeline: ts={} now={} base={}", ts, now, self.base);
    }

    fn drop_queue_for_resync(&mut self) {
        let dropped = self.queue.clear();
        self.stats.dropped_resync += dropped as u64;
        self.stats.resyncs += 1;
        self.state = JitterBufferState::Resyncing;
        self.expected_ts = None;
        debug!("Jitter buffer -> RESYNCING, {} frames dropped", dropped);
    }

    fn admit_resynced(&mut self, frame: MediaFrame) -> PutResult {
        match self.admit(frame) {
            PutResult::Ok => PutResult::Resynced,
            other => other,
        }
    }

    fn admit(&mut self, frame: MediaFrame) -> PutResult {
        if frame.len_ms > self.max_size {
            warn!(
                "Dropping {}ms frame longer than the {}ms buffer",
                frame.len_ms, self.max_size
            );
            self.stats.dropped_overflow += 1;
            return PutResult::Dropped;
        }

        while self.queue.depth_ms() + frame.len_ms > self.max_size {
            if self.queue.pop_front().is_none() {
                break;
            }
            trace!("Buffer full, evicted oldest frame");
            self.stats.dropped_overflow += 1;
        }

        let ts = frame.ts.unwrap_or_default();
        let end = ts + frame.len_ms;
        self.expected_ts = Some(self.expected_ts.map_or(end, |expected| expected.max(end)));
        self.queue.enqueue(self.playout_of(ts), frame);
        PutResult::Ok
    }
}

/// Jitter calculation helper
///
/// Smoothed RFC 3550 inter-arrival jitter over the per-frame lateness values
/// (arrival time minus media time) seen by a buffer.
#[derive(Debug, Clone, Default)]
pub struct JitterCalculator {
    /// Last lateness measured
    last_transit: Option<i64>,
    /// Current jitter estimate (in milliseconds)
    jitter: f64,
}

impl JitterCalculator {
    /// Create a new jitter calculator
    pub fn new() -> Self {
        Self::default()
    }

    /// Update the estimate with the lateness of a new frame
    pub fn update(&mut self, transit: i64) {
        if let Some(last_transit) = self.last_transit {
            let delta = (transit - last_transit).abs() as f64;
            // J += (|D(i-1,i)| - J) / 16
            self.jitter += (delta - self.jitter) / 16.0;
        }
        self.last_transit = Some(transit);
    }

    /// Get the current jitter estimate in milliseconds
    pub fn jitter_ms(&self) -> f64 {
        self.jitter
    }

    /// Reset the jitter calculator
    pub fn reset(&mut self) {
        self.last_transit = None;
        self.jitter = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rtpjb_rtp_core::MediaFormat;

    fn frame(ts: i64) -> MediaFrame {
        MediaFrame::timed_voice(MediaFormat::Pcmu, vec![0; 160], ts, (ts / 20) as u16)
    }

    fn core(max_size: i64, resync: i64, delay: i64) -> BufferCore {
        let config = JitterBufferConfig {
            max_size,
            resync_threshold: resync,
            ..Default::default()
        };
        BufferCore::new(&config, delay)
    }

    #[test]
    fn test_anchor_and_release() {
        let mut core = core(200, 1000, 60);
        assert_eq!(core.put_first(frame(1000), 10), PutResult::Ok);
        assert_eq!(core.state(), JitterBufferState::Filling);
        assert_eq!(core.next(), Some(70));

        assert_eq!(core.put(frame(1020), 30), PutResult::Ok);
        assert_eq!(core.next(), Some(70));
        assert_eq!(core.get(69), GetResult::NoFrame);

        let GetResult::Frame(first) = core.get(70) else {
            panic!("expected a frame")
        };
        assert_eq!(first.ts, Some(1000));
        assert_eq!(first.delivery, Some(70));
        assert_eq!(core.state(), JitterBufferState::Steady);
        assert_eq!(core.next(), Some(90));
    }

    #[test]
    fn test_late_and_duplicate_frames_dropped() {
        let mut core = core(200, 1000, 40);
        core.put_first(frame(0), 0);
        core.put(frame(20), 20);
        assert!(matches!(core.get(40), GetResult::Frame(_)));

        assert_eq!(core.put(frame(0), 45), PutResult::Dropped);
        assert_eq!(core.put(frame(20), 45), PutResult::Dropped);
        let stats = core.stats();
        assert_eq!(stats.dropped_late, 1);
        assert_eq!(stats.dropped_duplicate, 1);
        assert_eq!(stats.frames_in, 4);
    }

    #[test]
    fn test_overflow_evicts_oldest() {
        let mut core = core(60, 1000, 60);
        core.put_first(frame(0), 0);
        core.put(frame(20), 0);
        core.put(frame(40), 0);
        assert_eq!(core.depth_ms(), 60);

        core.put(frame(60), 0);
        assert_eq!(core.depth_ms(), 60);
        assert_eq!(core.stats().dropped_overflow, 1);
        assert_eq!(core.next(), Some(80));
    }

    #[test]
    fn test_force_resync_reanchors() {
        let mut core = core(200, 1000, 50);
        core.put_first(frame(0), 0);
        core.put(frame(20), 20);
        core.force_resync();
        assert_eq!(core.state(), JitterBufferState::Resyncing);
        assert_eq!(core.next(), None);

        assert_eq!(core.put(frame(5000), 100), PutResult::Resynced);
        assert_eq!(core.next(), Some(150));
        assert_eq!(core.stats().resyncs, 1);
        assert_eq!(core.stats().dropped_resync, 2);
    }

    #[test]
    fn test_empty_and_reset() {
        let mut core = core(200, 1000, 50);
        core.put_first(frame(0), 0);
        core.empty_and_reset();
        assert_eq!(core.state(), JitterBufferState::Empty);
        assert_eq!(core.depth_ms(), 0);

        assert_eq!(core.put(frame(9000), 500), PutResult::Ok);
        assert_eq!(core.state(), JitterBufferState::Filling);
        assert_eq!(core.next(), Some(550));
    }

    #[test]
    fn test_set_delay_shifts_queue() {
        let mut core = core(200, 1000, 50);
        core.put_first(frame(0), 0);
        core.put(frame(20), 20);
        core.set_delay(70);
        assert_eq!(core.next(), Some(70));
        core.set_delay(40);
        assert_eq!(core.next(), Some(40));
        assert_eq!(core.stats().current_delay_ms, 40);
    }

    #[test]
    fn test_jitter_calculator() {
        let mut calc = JitterCalculator::new();
        calc.update(10);
        assert_eq!(calc.jitter_ms(), 0.0);
        calc.update(26);
        assert_eq!(calc.jitter_ms(), 1.0);
        calc.reset();
        assert_eq!(calc.jitter_ms(), 0.0);
    }
}
