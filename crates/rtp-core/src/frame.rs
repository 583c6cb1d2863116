//! Media frames
//!
//! A [`MediaFrame`] is one chunk of audio or one telephony event travelling
//! from the transport, through a jitter buffer, to a bridge sink. Frames are
//! moved between components, never shared; the payload buffer is owned by
//! whichever component currently holds the frame.

use std::fmt;

use crate::payload::MediaFormat;
use crate::time::samples_to_ms;

/// Control events carried in-band with media
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlKind {
    /// Remote side hung up
    Hangup,
    /// Remote side placed the call on hold
    Hold,
    /// Remote side resumed the call
    Unhold,
    /// RFC 3389 comfort noise with the noise level in -dBov
    ComfortNoise { level: u8 },
}

/// The kind of a media frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// Audio samples
    Voice,
    /// Start of a DTMF key press
    DtmfBegin,
    /// A complete DTMF key press
    DtmfEnd,
    /// Control event
    Control(ControlKind),
    /// Empty frame
    Null,
}

/// A decoded chunk of media or a telephony event
#[derive(Clone, PartialEq, Eq)]
pub struct MediaFrame {
    /// What the frame carries
    pub kind: FrameKind,

    /// Payload format
    pub format: MediaFormat,

    /// Payload bytes, owned by the frame
    pub payload: Vec<u8>,

    /// Number of samples (RTP clock ticks) carried
    pub samples: u32,

    /// Media timestamp in milliseconds since the start of the stream, `None`
    /// when the frame carries no timing information
    pub ts: Option<i64>,

    /// Nominal duration in milliseconds
    pub len_ms: i64,

    /// Source sequence number
    pub seqno: u16,

    /// DTMF digit for `DtmfBegin`/`DtmfEnd` frames
    pub digit: Option<char>,

    /// Playout time assigned by a jitter buffer
    pub delivery: Option<i64>,

    /// Component that produced the frame
    pub src: &'static str,
}

impl MediaFrame {
    /// Create a voice frame without timing information
    pub fn voice(format: MediaFormat, payload: Vec<u8>) -> Self {
        let samples = format.samples_for(payload.len());
        Self {
            kind: FrameKind::Voice,
            format,
            len_ms: samples_to_ms(samples as i64, format.clock_rate()),
            payload,
            samples,
            ts: None,
            seqno: 0,
            digit: None,
            delivery: None,
            src: "",
        }
    }

    /// Create a voice frame with timing information
    pub fn timed_voice(format: MediaFormat, payload: Vec<u8>, ts: i64, seqno: u16) -> Self {
        let mut frame = Self::voice(format, payload);
        frame.ts = Some(ts);
        frame.seqno = seqno;
        frame
    }

    /// A completed DTMF digit
    pub fn dtmf_end(digit: char) -> Self {
        Self::event(FrameKind::DtmfEnd, Some(digit))
    }

    /// The start of a DTMF digit
    pub fn dtmf_begin(digit: char) -> Self {
        Self::event(FrameKind::DtmfBegin, Some(digit))
    }

    /// A control frame
    pub fn control(kind: ControlKind) -> Self {
        Self::event(FrameKind::Control(kind), None)
    }

    /// An empty frame
    pub fn null() -> Self {
        Self::event(FrameKind::Null, None)
    }

    fn event(kind: FrameKind, digit: Option<char>) -> Self {
        Self {
            kind,
            format: MediaFormat::Pcmu,
            payload: Vec::new(),
            samples: 0,
            ts: None,
            len_ms: 0,
            seqno: 0,
            digit,
            delivery: None,
            src: "",
        }
    }

    /// Tag the component that produced the frame
    pub fn with_src(mut self, src: &'static str) -> Self {
        self.src = src;
        self
    }

    /// Whether this is a voice frame
    pub fn is_voice(&self) -> bool {
        self.kind == FrameKind::Voice
    }

    /// Whether this is a DTMF frame
    pub fn is_dtmf(&self) -> bool {
        matches!(self.kind, FrameKind::DtmfBegin | FrameKind::DtmfEnd)
    }

    /// Whether the frame carries usable timing information
    pub fn has_timing(&self) -> bool {
        matches!(self.ts, Some(ts) if ts >= 0)
    }
}

impl fmt::Debug for MediaFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaFrame")
            .field("kind", &self.kind)
            .field("format", &self.format)
            .field("payload_len", &self.payload.len())
            .field("samples", &self.samples)
            .field("ts", &self.ts)
            .field("len_ms", &self.len_ms)
            .field("seqno", &self.seqno)
            .field("digit", &self.digit)
            .field("delivery", &self.delivery)
            .field("src", &self.src)
            .finish()
    }
}
