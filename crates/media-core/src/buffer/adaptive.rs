//! Adaptive jitter buffer
//!
//! Tracks how late each frame arrives relative to the anchored timeline and
//! steers the playout delay toward the 97th percentile of that lateness plus
//! `target_extra`. The delay moves in small bounded steps so ordinary jitter
//! never makes it oscillate; a sustained shift in arrival pattern larger than
//! the resync threshold starts a new timeline instead.

use std::collections::VecDeque;

use tracing::{debug, trace};

use rtpjb_rtp_core::MediaFrame;

use super::common::{BufferCore, JitterCalculator};
use super::config::JitterBufferConfig;
use super::jitter::{GetResult, JitterBufferImpl, JitterBufferState, JitterBufferStats, PutResult};

/// Lateness samples kept for the percentile estimate
pub const HISTORY_SIZE: usize = 500;

/// Percentile of lateness the delay must cover
const TARGET_PERCENTILE: f64 = 0.97;

/// Largest delay increase per adjustment, ms
const MAX_GROW_STEP: i64 = 20;

/// Largest delay decrease per adjustment, ms
const MAX_SHRINK_STEP: i64 = 10;

/// Minimum time between adjustments, ms
const ADJUST_INTERVAL: i64 = 40;

/// Consecutive lateness jumps tolerated before resyncing
const MAX_CONSECUTIVE_JUMPS: u32 = 3;

/// Jitter buffer whose delay follows observed network jitter
#[derive(Debug, Clone)]
pub struct AdaptiveJitterBuffer {
    core: BufferCore,
    target_extra: i64,
    history: VecDeque<i64>,
    jitter: JitterCalculator,
    /// Last lateness that was not a jump
    reference: Option<i64>,
    consecutive_jumps: u32,
    last_adjust: Option<i64>,
}

impl AdaptiveJitterBuffer {
    /// Create a buffer starting at `target_extra` delay
    pub fn new(config: &JitterBufferConfig) -> Self {
        let initial_delay = config.target_extra.clamp(0, config.max_size);
        Self {
            core: BufferCore::new(config, initial_delay),
            target_extra: config.target_extra,
            history: VecDeque::with_capacity(HISTORY_SIZE),
            jitter: JitterCalculator::new(),
            reference: None,
            consecutive_jumps: 0,
            last_adjust: None,
        }
    }

    /// Delay the buffer is steering toward
    pub fn target_delay(&self) -> Option<i64> {
        let mut sorted: Vec<i64> = self.history.iter().copied().collect();
        if sorted.is_empty() {
            return None;
        }
        sorted.sort_unstable();

        let index = ((sorted.len() - 1) as f64 * TARGET_PERCENTILE).round() as usize;
        let fastest = sorted[0];
        let target = sorted[index] + self.target_extra;
        Some(target.min(fastest + self.core.max_size()))
    }

    fn lateness(&self, ts: i64, now: i64) -> i64 {
        now - (ts + self.core.base())
    }

    fn restart_history(&mut self, ts: i64, now: i64) {
        self.history.clear();
        self.jitter.reset();
        self.consecutive_jumps = 0;
        self.last_adjust = None;
        let lateness = self.lateness(ts, now);
        self.reference = Some(lateness);
        self.record(lateness);
    }

    fn record(&mut self, lateness: i64) {
        if self.history.len() == HISTORY_SIZE {
            self.history.pop_front();
        }
        self.history.push_back(lateness);
    }

    fn adjust(&mut self, now: i64) {
        if self.last_adjust.map_or(false, |at| now - at < ADJUST_INTERVAL) {
            return;
        }
        let Some(target) = self.target_delay() else {
            return;
        };

        let delay = self.core.delay();
        let step = (target - delay).clamp(-MAX_SHRINK_STEP, MAX_GROW_STEP);
        if step != 0 {
            trace!("Adjusting delay {} -> {} (target {})", delay, delay + step, target);
            self.core.set_delay(delay + step);
            self.last_adjust = Some(now);
        }
    }
}

impl JitterBufferImpl for AdaptiveJitterBuffer {
    fn name(&self) -> &'static str {
        "adaptive"
    }

    fn put_first(&mut self, frame: MediaFrame, now: i64) -> PutResult {
        let ts = frame.ts.unwrap_or_default();
        let result = self.core.put_first(frame, now);
        self.restart_history(ts, now);
        result
    }

    fn put(&mut self, frame: MediaFrame, now: i64) -> PutResult {
        let ts = frame.ts.unwrap_or_default();
        if self.core.needs_anchor() {
            let result = self.core.put(frame, now);
            self.restart_history(ts, now);
            return result;
        }

        let lateness = self.lateness(ts, now);
        self.jitter.update(lateness);

        let limit = 2.0 * self.jitter.jitter_ms() + self.core.resync_threshold() as f64;
        let jumped = self
            .reference
            .map_or(false, |reference| (lateness - reference).abs() as f64 > limit);

        if jumped {
            self.consecutive_jumps += 1;
            if self.consecutive_jumps > MAX_CONSECUTIVE_JUMPS {
                debug!(
                    "Arrival pattern moved by {}ms for {} frames, resyncing",
                    lateness - self.reference.unwrap_or_default(),
                    self.consecutive_jumps
                );
                let result = self.core.resync(frame, now);
                self.restart_history(ts, now);
                return result;
            }
        } else {
            self.consecutive_jumps = 0;
            self.reference = Some(lateness);
        }

        let result = self.core.put(frame, now);
        if result == PutResult::Resynced {
            self.restart_history(ts, now);
            return result;
        }

        if !jumped {
            self.record(lateness);
        }
        self.adjust(now);
        result
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
        self.history.clear();
        self.jitter.reset();
        self.reference = None;
        self.consecutive_jumps = 0;
        self.last_adjust = None;
    }

    fn state(&self) -> JitterBufferState {
        self.core.state()
    }

    fn depth_ms(&self) -> i64 {
        self.core.depth_ms()
    }

    fn stats(&self) -> JitterBufferStats {
        JitterBufferStats {
            jitter_ms: self.jitter.jitter_ms(),
            ..self.core.stats()
        }
    }
}
