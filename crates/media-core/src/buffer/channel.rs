//! Per-channel jitter buffer engine
//!
//! Each channel of a bridge owns a [`ChannelJitterBuffer`] holding the audio
//! that travels *toward* it. The pair operations decide whether buffering is
//! engaged for a bridged pair ([`usecheck`]), release due frames
//! ([`get_and_deliver`]) and tell the bridge loop how long it may sleep
//! ([`when_to_wakeup`]).
//!
//! Every operation has an `_at` variant taking the current [`Instant`]; the
//! plain variants read the clock themselves.

use std::fmt;
use std::time::Instant;

use tracing::{debug, info, trace, warn};

use rtpjb_rtp_core::{MediaFrame, Timebase};

use super::config::JitterBufferConfig;
use super::framelog::FrameLog;
use super::jitter::{create_impl, GetResult, JitterBufferImpl, JitterBufferStats, PutResult};

/// Shortest frame a buffer accepts, ms
pub const MIN_FRAME_LEN_MS: i64 = 2;

/// Jitter handling characteristics of a channel technology
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelCaps {
    /// The technology already de-jitters what it receives
    pub wants_jitter: bool,
    /// Frames from this channel arrive over a jittery network
    pub creates_jitter: bool,
}

impl ChannelCaps {
    /// An RTP leg: jittery source, no jitter handling of its own
    pub const RTP: Self = Self {
        wants_jitter: false,
        creates_jitter: true,
    };

    /// A local endpoint with steady timing
    pub const LOCAL: Self = Self {
        wants_jitter: false,
        creates_jitter: false,
    };
}

/// What became of a frame handed to a channel's buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PutOutcome {
    /// The buffer owns the frame now, even if it later drops it
    Admitted,
    /// Not buffered; the caller delivers the frame itself
    Rejected(MediaFrame),
}

impl PutOutcome {
    /// Whether the buffer took the frame
    pub fn is_admitted(&self) -> bool {
        matches!(self, Self::Admitted)
    }
}

/// A bridged channel as seen by the jitter buffer engine
pub trait JbChannel {
    /// Channel name, used for logs
    fn name(&self) -> &str;

    /// Jitter characteristics of the channel technology
    fn caps(&self) -> ChannelCaps;

    /// The buffer holding audio toward this channel
    fn jb(&self) -> &ChannelJitterBuffer;

    /// Mutable access to the buffer holding audio toward this channel
    fn jb_mut(&mut self) -> &mut ChannelJitterBuffer;

    /// Write a frame to the channel
    fn deliver(&mut self, frame: MediaFrame);
}

/// Jitter buffer state of one channel
pub struct ChannelJitterBuffer {
    config: JitterBufferConfig,
    imp: Option<Box<dyn JitterBufferImpl>>,
    timebase: Option<Timebase>,
    in_use: bool,
    /// Playout time of the next queued frame on `timebase`
    next: Option<i64>,
    /// (source, destination) channel names for the frame log
    log_names: Option<(String, String)>,
    framelog: Option<FrameLog>,
}

impl fmt::Debug for ChannelJitterBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelJitterBuffer")
            .field("config", &self.config)
            .field("impl", &self.imp.as_ref().map(|imp| imp.name()))
            .field("timebase", &self.timebase)
            .field("in_use", &self.in_use)
            .field("next", &self.next)
            .finish()
    }
}

impl ChannelJitterBuffer {
    /// Create an idle buffer; nothing is allocated until the first frame
    pub fn new(config: JitterBufferConfig) -> Self {
        Self {
            config,
            imp: None,
            timebase: None,
            in_use: false,
            next: None,
            log_names: None,
            framelog: None,
        }
    }

    /// Configuration of this buffer
    pub fn config(&self) -> &JitterBufferConfig {
        &self.config
    }

    /// Whether buffering toward this channel is engaged
    pub fn is_in_use(&self) -> bool {
        self.in_use
    }

    /// Whether an implementation has been created
    pub fn is_created(&self) -> bool {
        self.imp.is_some()
    }

    /// Timebase playout times are measured on, once initialized
    pub fn timebase(&self) -> Option<Timebase> {
        self.timebase
    }

    /// The running implementation
    pub fn implementation(&self) -> Option<&dyn JitterBufferImpl> {
        self.imp.as_deref()
    }

    /// Counters of the running implementation
    pub fn stats(&self) -> Option<JitterBufferStats> {
        self.imp.as_ref().map(|imp| imp.stats())
    }

    /// Playout time of the next queued frame
    pub fn next(&self) -> Option<i64> {
        self.next
    }

    /// Path of the frame log, when one is open
    pub fn framelog_path(&self) -> Option<&std::path::Path> {
        self.framelog.as_ref().map(|log| log.path())
    }

    fn active(&self) -> bool {
        self.in_use && self.imp.is_some()
    }

    fn now_at(&mut self, at: Instant) -> i64 {
        self.timebase
            .get_or_insert_with(|| Timebase::starting_at(at))
            .ms_at(at)
    }

    /// Hand a frame to the buffer
    pub fn put(&mut self, frame: MediaFrame) -> PutOutcome {
        self.put_at(frame, Instant::now())
    }

    /// Hand a frame to the buffer at `at`
    pub fn put_at(&mut self, frame: MediaFrame, at: Instant) -> PutOutcome {
        if !self.in_use {
            return PutOutcome::Rejected(frame);
        }

        if !frame.is_voice() {
            if frame.is_dtmf() && self.imp.is_some() {
                let now = self.now_at(at);
                if let Some(log) = self.framelog.as_mut() {
                    log.dtmf_resync(now);
                }
                if let Some(imp) = self.imp.as_mut() {
                    debug!("DTMF received, forcing jitter buffer resync");
                    imp.force_resync();
                    self.next = imp.next();
                }
            }
            return PutOutcome::Rejected(frame);
        }

        if !frame.has_timing() || frame.len_ms < MIN_FRAME_LEN_MS {
            warn!(
                "Jitter buffer received frame with invalid timing info: ts={:?}, len={}, src={}",
                frame.ts, frame.len_ms, frame.src
            );
            return PutOutcome::Rejected(frame);
        }

        let now = self.now_at(at);
        let ts = frame.ts.unwrap_or_default();
        let len = frame.len_ms;

        match self.imp.as_mut() {
            Some(imp) => {
                let result = imp.put(frame, now);
                self.next = imp.next();
                if let Some(log) = self.framelog.as_mut() {
                    match result {
                        PutResult::Dropped => log.dropped_on_put(now, ts, len),
                        PutResult::Ok | PutResult::Resynced => log.queued(now, ts, len),
                    }
                }
            }
            None => self.create(frame, now),
        }
        PutOutcome::Admitted
    }

    fn create(&mut self, frame: MediaFrame, now: i64) {
        let ts = frame.ts.unwrap_or_default();
        let len = frame.len_ms;

        let mut imp = create_impl(&self.config);
        let result = imp.put_first(frame, now);
        if result == PutResult::Dropped {
            warn!("Jitter buffer {} refused its first frame", imp.name());
        }
        self.next = imp.next();

        if self.config.log {
            let (source, dest) = self
                .log_names
                .clone()
                .unwrap_or_else(|| ("unknown".to_string(), "unknown".to_string()));
            self.framelog = FrameLog::open(&self.config.log_dir, imp.name(), &source, &dest);
            if let Some(log) = self.framelog.as_mut() {
                log.put_first(now, ts, len);
            }
        }

        info!("Created jitter buffer of type {}", imp.name());
        self.imp = Some(imp);
    }

    /// Release every frame due at `at`
    pub fn take_due_at(&mut self, at: Instant) -> Vec<MediaFrame> {
        let mut due = Vec::new();
        if !self.active() {
            return due;
        }
        let now = self.now_at(at);
        let Some(imp) = self.imp.as_mut() else {
            return due;
        };

        while self.next.map_or(false, |next| next <= now) {
            match imp.get(now) {
                GetResult::Frame(frame) => {
                    if let Some(log) = self.framelog.as_mut() {
                        log.delivered(now, frame.ts.unwrap_or_default(), frame.len_ms);
                    }
                    due.push(frame);
                }
                GetResult::Dropped(frame) => {
                    trace!("Discarding overlapping frame ts={:?}", frame.ts);
                    if let Some(log) = self.framelog.as_mut() {
                        log.dropped_on_get(now, frame.ts.unwrap_or_default(), frame.len_ms);
                    }
                }
                GetResult::NoFrame => break,
            }
            self.next = imp.next();
        }
        self.next = imp.next();
        due
    }

    /// Milliseconds until the next frame is due, if one is queued
    pub fn time_until_next_at(&self, at: Instant) -> Option<i64> {
        if !self.active() {
            return None;
        }
        let timebase = self.timebase?;
        self.next.map(|next| next - timebase.ms_at(at))
    }

    /// Drop queued frames and re-anchor on the next frame
    pub fn force_resync(&mut self) {
        if let Some(imp) = self.imp.as_mut() {
            imp.force_resync();
            self.next = imp.next();
        }
    }

    /// Drop queued frames and forget the timeline, keeping the configuration
    pub fn empty_and_reset(&mut self) {
        if !self.in_use {
            return;
        }
        if let Some(imp) = self.imp.as_mut() {
            imp.empty_and_reset();
            self.next = None;
        }
    }

    /// Tear down the implementation; a no-op if none was created
    pub fn destroy(&mut self) -> usize {
        let Some(mut imp) = self.imp.take() else {
            return 0;
        };

        let mut dropped = 0;
        while imp.remove().is_some() {
            dropped += 1;
        }
        self.next = None;
        self.framelog = None;
        info!(
            "Destroyed jitter buffer of type {}, {} frames dropped",
            imp.name(),
            dropped
        );
        dropped
    }
}

/// Decide whether buffering is engaged for a bridged pair
///
/// Audio toward a channel is buffered when the channel has buffering enabled,
/// its partner creates jitter, and the channel does not de-jitter by itself
/// (or buffering is forced). Returns whether either direction is buffered.
pub fn usecheck<A: JbChannel, B: JbChannel>(a: &mut A, b: &mut B) -> bool {
    usecheck_at(a, b, Instant::now())
}

/// [`usecheck`] at `at`
pub fn usecheck_at<A: JbChannel, B: JbChannel>(a: &mut A, b: &mut B, at: Instant) -> bool {
    let toward_a = engage(a, &*b, at);
    let toward_b = engage(b, &*a, at);
    toward_a || toward_b
}

fn engage<C: JbChannel, P: JbChannel>(chan: &mut C, partner: &P, at: Instant) -> bool {
    let caps = chan.caps();
    let partner_caps = partner.caps();
    let partner_timebase = partner.jb().timebase();
    let names = (partner.name().to_string(), chan.name().to_string());

    let jb = chan.jb_mut();
    let config = jb.config();
    if !(config.enabled && partner_caps.creates_jitter && (!caps.wants_jitter || config.forced)) {
        return false;
    }

    jb.in_use = true;
    if jb.timebase.is_none() {
        jb.timebase = Some(partner_timebase.unwrap_or_else(|| Timebase::starting_at(at)));
    }
    debug!("Jitter buffer engaged for {} -> {}", names.0, names.1);
    jb.log_names = Some(names);
    true
}

/// Hand a frame to the buffer toward `chan`
pub fn put<C: JbChannel>(chan: &mut C, frame: MediaFrame) -> PutOutcome {
    chan.jb_mut().put(frame)
}

/// Deliver every due frame of both channels
pub fn get_and_deliver<A: JbChannel, B: JbChannel>(a: &mut A, b: &mut B) {
    get_and_deliver_at(a, b, Instant::now());
}

/// [`get_and_deliver`] at `at`
pub fn get_and_deliver_at<A: JbChannel, B: JbChannel>(a: &mut A, b: &mut B, at: Instant) {
    deliver_due(a, at);
    deliver_due(b, at);
}

fn deliver_due<C: JbChannel>(chan: &mut C, at: Instant) {
    for frame in chan.jb_mut().take_due_at(at) {
        chan.deliver(frame);
    }
}

/// How long the bridge loop may wait, in ms
///
/// `time_left` is a ceiling, negative for none. Returns -1 when neither the
/// ceiling nor a queued frame bounds the wait, and at least 1 otherwise.
pub fn when_to_wakeup<A: JbChannel, B: JbChannel>(a: &A, b: &B, time_left: i64) -> i64 {
    when_to_wakeup_at(a, b, time_left, Instant::now())
}

/// [`when_to_wakeup`] at `at`
pub fn when_to_wakeup_at<A: JbChannel, B: JbChannel>(
    a: &A,
    b: &B,
    time_left: i64,
    at: Instant,
) -> i64 {
    let mut wait = if time_left < 0 { i64::MAX } else { time_left };
    for until in [a.jb().time_until_next_at(at), b.jb().time_until_next_at(at)]
        .into_iter()
        .flatten()
    {
        wait = wait.min(until);
    }

    if wait == i64::MAX {
        -1
    } else {
        wait.max(1)
    }
}

/// Flush both channels' buffers, e.g. on hold or unhold
pub fn empty_and_reset<A: JbChannel, B: JbChannel>(a: &mut A, b: &mut B) {
    a.jb_mut().empty_and_reset();
    b.jb_mut().empty_and_reset();
}

/// Tear down the buffer toward `chan`; safe to call repeatedly
pub fn destroy<C: JbChannel>(chan: &mut C) {
    chan.jb_mut().destroy();
}
