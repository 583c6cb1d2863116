//! Payload type mapping
//!
//! Maps RTP payload type numbers to internal media formats and back. The
//! static assignments follow RFC 3551; dynamic numbers (96-127) are bound per
//! session, including the RFC2833 telephone-event type.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::Result;

/// Default dynamic payload type for RFC2833 telephone events
pub const DEFAULT_DTMF_PAYLOAD_TYPE: u8 = 101;

/// Static payload type for comfort noise (RFC 3389)
pub const COMFORT_NOISE_PAYLOAD_TYPE: u8 = 13;

/// Internal audio format identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaFormat {
    /// G.711 µ-law
    Pcmu,
    /// GSM 06.10 full rate
    Gsm,
    /// G.723.1
    G723,
    /// G.711 A-law
    Pcma,
    /// G.722
    G722,
    /// G.729 / G.729A
    G729,
    /// 16-bit signed linear, 8kHz
    Slin,
}

impl MediaFormat {
    /// Formats with a static RFC 3551 assignment, in table order
    pub const STATIC: [MediaFormat; 6] = [
        MediaFormat::Pcmu,
        MediaFormat::Gsm,
        MediaFormat::G723,
        MediaFormat::Pcma,
        MediaFormat::G722,
        MediaFormat::G729,
    ];

    /// The RFC 3551 payload type, if the format has a static one
    pub fn static_payload_type(&self) -> Option<u8> {
        match self {
            Self::Pcmu => Some(0),
            Self::Gsm => Some(3),
            Self::G723 => Some(4),
            Self::Pcma => Some(8),
            Self::G722 => Some(9),
            Self::G729 => Some(18),
            Self::Slin => None,
        }
    }

    /// RTP clock rate in Hz
    pub fn clock_rate(&self) -> u32 {
        // G.722 samples at 16kHz but advertises an 8kHz RTP clock
        8000
    }

    /// Encoding name as used in SDP rtpmap lines
    pub fn encoding_name(&self) -> &'static str {
        match self {
            Self::Pcmu => "PCMU",
            Self::Gsm => "GSM",
            Self::G723 => "G723",
            Self::Pcma => "PCMA",
            Self::G722 => "G722",
            Self::G729 => "G729",
            Self::Slin => "L16",
        }
    }

    /// Number of RTP clock ticks carried by a payload of `len` bytes
    pub fn samples_for(&self, len: usize) -> u32 {
        let len = len as u32;
        match self {
            Self::Pcmu | Self::Pcma | Self::G722 => len,
            Self::Gsm => (len / 33) * 160,
            Self::G723 => {
                // 24-byte (6.3k) or 20-byte (5.3k) frames, 240 samples each
                let mut samples = 0;
                let mut remaining = len;
                while remaining >= 20 {
                    let frame = if remaining >= 24 { 24 } else { 20 };
                    remaining -= frame;
                    samples += 240;
                }
                samples
            }
            Self::G729 => (len / 10) * 80,
            Self::Slin => len / 2,
        }
    }
}

impl fmt::Display for MediaFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.encoding_name())
    }
}

/// What a payload type number carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RtpPayload {
    /// Audio in an internal format
    Audio(MediaFormat),
    /// RFC2833 telephone events
    TelephoneEvent,
    /// RFC 3389 comfort noise
    ComfortNoise,
}

/// Per-session payload type table
#[derive(Debug, Clone)]
pub struct PayloadTypeMap {
    by_number: HashMap<u8, RtpPayload>,
}

impl PayloadTypeMap {
    /// Create a map holding the static RFC 3551 assignments, comfort noise and
    /// the telephone-event binding on `dtmf_payload_type`
    pub fn new(dtmf_payload_type: u8) -> Self {
        let mut by_number = HashMap::new();
        for format in MediaFormat::STATIC {
            if let Some(pt) = format.static_payload_type() {
                by_number.insert(pt, RtpPayload::Audio(format));
            }
        }
        by_number.insert(COMFORT_NOISE_PAYLOAD_TYPE, RtpPayload::ComfortNoise);
        by_number.insert(dtmf_payload_type & 0x7f, RtpPayload::TelephoneEvent);
        Self { by_number }
    }

    /// Bind a dynamic payload type (96-127) to a payload
    pub fn bind_dynamic(&mut self, payload_type: u8, payload: RtpPayload) -> Result<()> {
        if !(96..=127).contains(&payload_type) {
            return Err(Error::InvalidParameter(format!(
                "payload type {} is outside the dynamic range 96-127",
                payload_type
            )));
        }
        if payload == RtpPayload::TelephoneEvent {
            self.by_number.retain(|_, p| *p != RtpPayload::TelephoneEvent);
        }
        self.by_number.insert(payload_type, payload);
        Ok(())
    }

    /// Remove a payload type binding
    pub fn unbind(&mut self, payload_type: u8) -> Option<RtpPayload> {
        self.by_number.remove(&payload_type)
    }

    /// Look up what a received payload type number carries
    pub fn lookup(&self, payload_type: u8) -> Option<RtpPayload> {
        self.by_number.get(&payload_type).copied()
    }

    /// Payload type number to use when sending `format`
    pub fn payload_type_for(&self, format: MediaFormat) -> Result<u8> {
        // Prefer the static number so the choice is deterministic
        if let Some(pt) = format.static_payload_type() {
            if self.by_number.get(&pt) == Some(&RtpPayload::Audio(format)) {
                return Ok(pt);
            }
        }
        self.by_number
            .iter()
            .filter(|(_, p)| **p == RtpPayload::Audio(format))
            .map(|(pt, _)| *pt)
            .min()
            .ok_or_else(|| Error::UnsupportedFormat(format!("no payload type mapped for {}", format)))
    }

    /// Payload type number bound to telephone events
    pub fn dtmf_payload_type(&self) -> Option<u8> {
        self.by_number
            .iter()
            .find(|(_, p)| **p == RtpPayload::TelephoneEvent)
            .map(|(pt, _)| *pt)
    }
}

impl Default for PayloadTypeMap {
    fn default() -> Self {
        Self::new(DEFAULT_DTMF_PAYLOAD_TYPE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_mapping() {
        let map = PayloadTypeMap::default();
        assert_eq!(map.lookup(0), Some(RtpPayload::Audio(MediaFormat::Pcmu)));
        assert_eq!(map.lookup(8), Some(RtpPayload::Audio(MediaFormat::Pcma)));
        assert_eq!(map.lookup(13), Some(RtpPayload::ComfortNoise));
        assert_eq!(map.lookup(101), Some(RtpPayload::TelephoneEvent));
        assert_eq!(map.lookup(96), None);

        assert_eq!(map.payload_type_for(MediaFormat::G729).unwrap(), 18);
        assert!(matches!(
            map.payload_type_for(MediaFormat::Slin),
            Err(Error::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_dynamic_binding() {
        let mut map = PayloadTypeMap::default();
        map.bind_dynamic(97, RtpPayload::Audio(MediaFormat::Slin)).unwrap();
        assert_eq!(map.payload_type_for(MediaFormat::Slin).unwrap(), 97);

        map.bind_dynamic(96, RtpPayload::TelephoneEvent).unwrap();
        assert_eq!(map.dtmf_payload_type(), Some(96));
        assert_eq!(map.lookup(101), None);

        assert!(map.bind_dynamic(20, RtpPayload::ComfortNoise).is_err());
    }

    #[test]
    fn test_samples_for_payload() {
        assert_eq!(MediaFormat::Pcmu.samples_for(160), 160);
        assert_eq!(MediaFormat::Gsm.samples_for(33), 160);
        assert_eq!(MediaFormat::G729.samples_for(20), 160);
        assert_eq!(MediaFormat::G723.samples_for(24), 240);
        assert_eq!(MediaFormat::G723.samples_for(44), 480);
        assert_eq!(MediaFormat::Slin.samples_for(320), 160);
    }
}
