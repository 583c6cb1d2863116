//! RFC2833 telephone-event payload
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |     event     |E|R| volume    |          duration             |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```

use bytes::{Buf, BufMut, BytesMut};

use crate::error::Error;
use crate::Result;

/// Size of a telephone-event payload
pub const DTMF_EVENT_SIZE: usize = 4;

const END_OF_EVENT: u8 = 0x80;
const VOLUME_MASK: u8 = 0x3f;

/// Map an RFC2833 event code to its digit
pub fn event_to_digit(event: u8) -> Option<char> {
    match event {
        0..=9 => Some((b'0' + event) as char),
        10 => Some('*'),
        11 => Some('#'),
        12..=15 => Some((b'A' + event - 12) as char),
        _ => None,
    }
}

/// Map a digit to its RFC2833 event code
pub fn digit_to_event(digit: char) -> Option<u8> {
    match digit {
        '0'..='9' => Some(digit as u8 - b'0'),
        '*' => Some(10),
        '#' => Some(11),
        'A'..='D' => Some(digit as u8 - b'A' + 12),
        'a'..='d' => Some(digit as u8 - b'a' + 12),
        _ => None,
    }
}

/// A decoded telephone-event payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DtmfEvent {
    /// Event code
    pub event: u8,

    /// End-of-event flag
    pub end: bool,

    /// Volume in -dBm0 (6 bits)
    pub volume: u8,

    /// Duration in RTP timestamp units
    pub duration: u16,
}

impl DtmfEvent {
    /// Create an event for `digit`
    pub fn for_digit(digit: char, volume: u8, duration: u16, end: bool) -> Result<Self> {
        let event = digit_to_event(digit)
            .ok_or_else(|| Error::InvalidParameter(format!("not a DTMF digit: {:?}", digit)))?;
        Ok(Self {
            event,
            end,
            volume: volume & VOLUME_MASK,
            duration,
        })
    }

    /// The digit this event carries, if it is a DTMF event
    pub fn digit(&self) -> Option<char> {
        event_to_digit(self.event)
    }

    /// Decode the first four bytes of a telephone-event payload
    pub fn parse(payload: &[u8]) -> Result<Self> {
        if payload.len() < DTMF_EVENT_SIZE {
            return Err(Error::TruncatedPacket {
                required: DTMF_EVENT_SIZE,
                available: payload.len(),
            });
        }

        let mut buf = payload;
        let event = buf.get_u8();
        let flags = buf.get_u8();
        let duration = buf.get_u16();

        Ok(Self {
            event,
            end: flags & END_OF_EVENT != 0,
            volume: flags & VOLUME_MASK,
            duration,
        })
    }

    /// Encode into a telephone-event payload
    pub fn serialize(&self, buf: &mut BytesMut) {
        let mut flags = self.volume & VOLUME_MASK;
        if self.end {
            flags |= END_OF_EVENT;
        }
        buf.put_u8(self.event);
        buf.put_u8(flags);
        buf.put_u16(self.duration);
    }

    /// Encode into a fresh four-byte payload
    pub fn to_bytes(&self) -> [u8; DTMF_EVENT_SIZE] {
        let mut buf = BytesMut::with_capacity(DTMF_EVENT_SIZE);
        self.serialize(&mut buf);
        let mut out = [0u8; DTMF_EVENT_SIZE];
        out.copy_from_slice(&buf);
        out
    }
}
