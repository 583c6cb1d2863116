//! Fixed-delay jitter buffer
//!
//! Every frame is played a constant delay after the media time of the frame
//! that anchored the timeline. The delay is `max_size` less a headroom of
//! `target_extra` (at most half the buffer): frames that arrive ahead of the
//! anchor wait longer than the delay, and the headroom keeps them from
//! overflowing the buffer. Discontinuities larger than the resync threshold
//! start a new timeline.

use rtpjb_rtp_core::MediaFrame;

use super::common::BufferCore;
use super::config::JitterBufferConfig;
use super::jitter::{GetResult, JitterBufferImpl, JitterBufferState, JitterBufferStats, PutResult};

/// Jitter buffer with a constant playout delay
#[derive(Debug, Clone)]
pub struct FixedJitterBuffer {
    core: BufferCore,
}

impl FixedJitterBuffer {
    /// Create a buffer delaying frames by [`FixedJitterBuffer::delay_for`]
    pub fn new(config: &JitterBufferConfig) -> Self {
        Self {
            core: BufferCore::new(config, Self::delay_for(config)),
        }
    }

    /// Playout delay used for `config`
    pub fn delay_for(config: &JitterBufferConfig) -> i64 {
        let headroom = config.target_extra.clamp(0, config.max_size / 2);
        config.max_size - headroom
    }
}

impl JitterBufferImpl for FixedJitterBuffer {
    fn name(&self) -> &'static str {
        "fixed"
    }

    fn put_first(&mut self, frame: MediaFrame, now: i64) -> PutResult {
        self.core.put_first(frame, now)
    }

    fn put(&mut self, frame: MediaFrame, now: i64) -> PutResult {
        self.core.put(frame, now)
    }

    fn get(&mut self, now: i64) -> GetResult {
        self.core.get(now)
    }

    fn next(&self) -> Option<i64> {
        self.core.next()
    }

    fn remove(&mut self) -> Option<MediaFrame> {
        self.core.remove()
    }

    fn force_resync(&mut self) {
        self.core.force_resync();
    }

    fn empty_and_reset(&mut self) {
        self.core.empty_and_reset();
    }

    fn state(&self) -> JitterBufferState {
        self.core.state()
    }

    fn depth_ms(&self) -> i64 {
        self.core.depth_ms()
    }

    fn stats(&self) -> JitterBufferStats {
        self.core.stats()
    }
}
