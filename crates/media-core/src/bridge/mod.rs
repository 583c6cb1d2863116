//! Two-leg media bridge
//!
//! A [`BridgeDriver`] runs the single-threaded loop that moves media between
//! two [`BridgeChannel`]s: it sleeps on the poller until a socket is readable,
//! a jitter buffer has a frame due or a DTMF timer expires, reads what
//! arrived, and routes every frame toward the other leg.
//!
//! Voice goes through the jitter buffer of the destination channel when
//! buffering is engaged for it and straight to its session otherwise. DTMF
//! digits are offered to a [`BridgeEventHandler`] first and forwarded as
//! RFC2833 unless the handler consumes them.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, trace, warn};

use rtpjb_rtp_core::{ControlKind, FrameKind, IoContext, IoHandle, MediaFrame, RtpSession, SessionState};

use crate::buffer::channel::{self, ChannelCaps, ChannelJitterBuffer, JbChannel, PutOutcome};
use crate::buffer::JitterBufferConfig;
use crate::error::{Error, Result};

/// Longest single wait, so the stop flag is noticed promptly
pub const MAX_WAIT_MS: i64 = 100;

/// One leg of a bridge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    A,
    B,
}

impl Side {
    /// The opposite leg
    pub fn other(self) -> Self {
        match self {
            Self::A => Self::B,
            Self::B => Self::A,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::A => f.write_str("A"),
            Self::B => f.write_str("B"),
        }
    }
}

/// A bridged channel: an RTP session plus the jitter buffer toward it
#[derive(Debug)]
pub struct BridgeChannel {
    name: String,
    session: RtpSession,
    jb: ChannelJitterBuffer,
    caps: ChannelCaps,
}

impl BridgeChannel {
    /// Wrap a session as an RTP leg
    pub fn new(name: impl Into<String>, session: RtpSession, jb_config: JitterBufferConfig) -> Self {
        Self {
            name: name.into(),
            session,
            jb: ChannelJitterBuffer::new(jb_config),
            caps: ChannelCaps::RTP,
        }
    }

    /// Override the jitter characteristics of the leg
    pub fn with_caps(mut self, caps: ChannelCaps) -> Self {
        self.caps = caps;
        self
    }

    /// The RTP session of this leg
    pub fn session(&self) -> &RtpSession {
        &self.session
    }

    /// Mutable access to the RTP session of this leg
    pub fn session_mut(&mut self) -> &mut RtpSession {
        &mut self.session
    }

    /// Take the session back, dropping the jitter buffer
    pub fn into_session(mut self) -> RtpSession {
        self.jb.destroy();
        self.session
    }
}

impl JbChannel for BridgeChannel {
    fn name(&self) -> &str {
        &self.name
    }

    fn caps(&self) -> ChannelCaps {
        self.caps
    }

    fn jb(&self) -> &ChannelJitterBuffer {
        &self.jb
    }

    fn jb_mut(&mut self) -> &mut ChannelJitterBuffer {
        &mut self.jb
    }

    fn deliver(&mut self, frame: MediaFrame) {
        if let Err(e) = self.session.send_frame(frame) {
            debug!("Failed to write frame to {}: {}", self.name, e);
        }
    }
}

/// Something a leg signalled while bridged
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeEvent {
    /// A completed DTMF key press
    Digit(char),
    /// A control indication
    Control(ControlKind),
}

/// What the bridge does after an event was handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventResponse {
    /// Handle the event normally
    Continue,
    /// Swallow the event
    Consume,
    /// Stop bridging and report the event
    Break,
}

/// Receives events from both legs while bridged
pub trait BridgeEventHandler {
    /// Called for every event; `side` is the leg it came from
    fn on_event(&mut self, event: &BridgeEvent, side: Side) -> EventResponse;
}

impl<F> BridgeEventHandler for F
where
    F: FnMut(&BridgeEvent, Side) -> EventResponse,
{
    fn on_event(&mut self, event: &BridgeEvent, side: Side) -> EventResponse {
        self(event, side)
    }
}

/// Why the bridge loop ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeOutcome {
    /// The time limit elapsed
    Timeout,
    /// A leg hung up or its session closed
    Hangup(Side),
    /// The event handler asked to stop
    Break(Side, BridgeEvent),
    /// The stop flag was raised
    Stopped,
}

/// Bridge behaviour
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// End the bridge after this long
    pub time_limit: Option<Duration>,
    /// Pass DTMF from one leg to the other
    pub forward_dtmf: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            time_limit: None,
            forward_dtmf: true,
        }
    }
}

/// Counters of one bridge run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BridgeStats {
    /// Voice frames handed to a jitter buffer
    pub frames_buffered: u64,
    /// Voice frames written straight to the other leg
    pub frames_direct: u64,
    /// Digits forwarded to the other leg
    pub digits_forwarded: u64,
    /// Frames not routed anywhere
    pub frames_discarded: u64,
}

/// Raises the stop flag of a running bridge from another thread
#[derive(Debug, Clone)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    /// Ask the bridge loop to end after its current iteration
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether a stop was requested
    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Runs the bridge loop between two channels
#[derive(Debug)]
pub struct BridgeDriver {
    config: BridgeConfig,
    stop: Arc<AtomicBool>,
    stats: BridgeStats,
}

impl BridgeDriver {
    /// Create a driver
    pub fn new(config: BridgeConfig) -> Self {
        Self {
            config,
            stop: Arc::new(AtomicBool::new(false)),
            stats: BridgeStats::default(),
        }
    }

    /// Handle for ending the loop from another thread
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle(Arc::clone(&self.stop))
    }

    /// Counters of the last run
    pub fn stats(&self) -> &BridgeStats {
        &self.stats
    }

    /// Bridge `a` and `b` until a hangup, the time limit, a handler break or a stop
    ///
    /// Both jitter buffers are destroyed when the loop ends, whatever the
    /// reason. Only poller failures are returned as errors.
    pub fn run<H>(
        &mut self,
        a: &mut BridgeChannel,
        b: &mut BridgeChannel,
        io: &mut IoContext,
        handler: &mut H,
    ) -> Result<BridgeOutcome>
    where
        H: BridgeEventHandler + ?Sized,
    {
        for chan in [&*a, &*b] {
            if matches!(chan.session.state(), SessionState::Idle) {
                return Err(Error::InvalidState(format!(
                    "Channel {} has no bound session",
                    chan.name
                )));
            }
        }

        self.stats = BridgeStats::default();
        let start = Instant::now();
        let buffered = channel::usecheck_at(a, b, start);
        info!(
            "Bridging {} <-> {} (jitter buffer {})",
            a.name,
            b.name,
            if buffered { "in use" } else { "not in use" }
        );

        let result = self.run_loop(a, b, io, handler, start);

        channel::destroy(a);
        channel::destroy(b);
        match &result {
            Ok(outcome) => info!("Bridge {} <-> {} ended: {:?}", a.name, b.name, outcome),
            Err(e) => warn!("Bridge {} <-> {} failed: {}", a.name, b.name, e),
        }
        result
    }

    fn run_loop<H>(
        &mut self,
        a: &mut BridgeChannel,
        b: &mut BridgeChannel,
        io: &mut IoContext,
        handler: &mut H,
        start: Instant,
    ) -> Result<BridgeOutcome>
    where
        H: BridgeEventHandler + ?Sized,
    {
        let deadline = self.config.time_limit.map(|limit| start + limit);

        loop {
            if self.stop.load(Ordering::SeqCst) {
                return Ok(BridgeOutcome::Stopped);
            }
            if a.session.state() == SessionState::Closed {
                return Ok(BridgeOutcome::Hangup(Side::A));
            }
            if b.session.state() == SessionState::Closed {
                return Ok(BridgeOutcome::Hangup(Side::B));
            }

            let now = Instant::now();
            let time_left = match deadline {
                Some(deadline) if now >= deadline => return Ok(BridgeOutcome::Timeout),
                Some(deadline) => millis(deadline - now),
                None => -1,
            };

            let wait = self.wait_ms(a, b, time_left, now);
            trace!("Bridge waiting up to {}ms", wait);
            let readable = io.wait(wait)?;

            let now = Instant::now();
            channel::get_and_deliver_at(a, b, now);

            let mut arrived: Vec<(Side, MediaFrame)> = Vec::new();
            a.session
                .poll_timers(now, &mut |frame| arrived.push((Side::A, frame)));
            b.session
                .poll_timers(now, &mut |frame| arrived.push((Side::B, frame)));

            for handle in readable {
                let Some(side) = side_of(handle, a, b) else {
                    trace!("Ignoring readiness of unknown handle {}", handle.id());
                    continue;
                };
                let chan = match side {
                    Side::A => &mut *a,
                    Side::B => &mut *b,
                };
                if let Err(e) = chan
                    .session
                    .drain(now, &mut |frame| arrived.push((side, frame)))
                {
                    warn!("Read from {} failed: {}", chan.name, e);
                }
            }

            for (side, frame) in arrived {
                if let Some(outcome) = self.route(side, frame, a, b, handler, now) {
                    return Ok(outcome);
                }
            }

            channel::get_and_deliver_at(a, b, Instant::now());
        }
    }

    /// Wait bounded by playout, DTMF timers, the time limit and [`MAX_WAIT_MS`]
    fn wait_ms(&self, a: &BridgeChannel, b: &BridgeChannel, time_left: i64, now: Instant) -> i64 {
        let mut wait = channel::when_to_wakeup_at(a, b, time_left, now);
        for timer in [a.session.next_timer(), b.session.next_timer()]
            .into_iter()
            .flatten()
        {
            let until = millis(timer.saturating_duration_since(now)).max(1);
            wait = if wait < 0 { until } else { wait.min(until) };
        }
        if wait < 0 {
            MAX_WAIT_MS
        } else {
            wait.min(MAX_WAIT_MS)
        }
    }

    fn route<H>(
        &mut self,
        side: Side,
        frame: MediaFrame,
        a: &mut BridgeChannel,
        b: &mut BridgeChannel,
        handler: &mut H,
        now: Instant,
    ) -> Option<BridgeOutcome>
    where
        H: BridgeEventHandler + ?Sized,
    {
        match frame.kind {
            FrameKind::Voice => {
                let to = match side {
                    Side::A => b,
                    Side::B => a,
                };
                match to.jb.put_at(frame, now) {
                    PutOutcome::Admitted => self.stats.frames_buffered += 1,
                    PutOutcome::Rejected(frame) => {
                        self.stats.frames_direct += 1;
                        to.deliver(frame);
                    }
                }
                None
            }
            FrameKind::DtmfEnd => {
                let digit = frame.digit?;
                let event = BridgeEvent::Digit(digit);
                debug!("DTMF '{}' from side {}", digit, side);
                match handler.on_event(&event, side) {
                    EventResponse::Break => return Some(BridgeOutcome::Break(side, event)),
                    EventResponse::Consume => return None,
                    EventResponse::Continue => {}
                }
                if !self.config.forward_dtmf {
                    return None;
                }

                let to = match side {
                    Side::A => b,
                    Side::B => a,
                };
                // A digit restarts the destination's timeline; it is never buffered itself
                match to.jb.put_at(frame, now) {
                    PutOutcome::Rejected(frame) => to.deliver(frame),
                    PutOutcome::Admitted => {}
                }
                self.stats.digits_forwarded += 1;
                None
            }
            FrameKind::Control(ControlKind::Hangup) => {
                let event = BridgeEvent::Control(ControlKind::Hangup);
                handler.on_event(&event, side);
                Some(BridgeOutcome::Hangup(side))
            }
            FrameKind::Control(kind @ (ControlKind::Hold | ControlKind::Unhold)) => {
                let event = BridgeEvent::Control(kind);
                if handler.on_event(&event, side) == EventResponse::Break {
                    return Some(BridgeOutcome::Break(side, event));
                }
                debug!("{:?} from side {}, flushing jitter buffers", kind, side);
                channel::empty_and_reset(a, b);
                None
            }
            FrameKind::Control(ControlKind::ComfortNoise { .. })
            | FrameKind::DtmfBegin
            | FrameKind::Null => {
                trace!("Discarding {:?} frame from side {}", frame.kind, side);
                self.stats.frames_discarded += 1;
                None
            }
        }
    }
}

fn side_of(handle: IoHandle, a: &BridgeChannel, b: &BridgeChannel) -> Option<Side> {
    if a.session.io_handle() == Some(handle) {
        Some(Side::A)
    } else if b.session.io_handle() == Some(handle) {
        Some(Side::B)
    } else {
        None
    }
}

fn millis(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}
