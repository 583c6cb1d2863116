//! Whole RTP packets: a header followed by the payload bytes

use bytes::{Bytes, BytesMut};
use std::fmt;

use super::header::RtpHeader;
use crate::error::Error;
use crate::{Result, RtpSequenceNumber, RtpSsrc, RtpTimestamp};

/// RTP packet: header plus payload
#[derive(Clone, PartialEq, Eq)]
pub struct RtpPacket {
    /// RTP header
    pub header: RtpHeader,

    /// Payload data, padding removed
    pub payload: Bytes,
}

impl RtpPacket {
    /// Create a new RTP packet from a header and payload
    pub fn new(header: RtpHeader, payload: Bytes) -> Self {
        Self { header, payload }
    }

    /// Create a new RTP packet with the given fields and payload
    pub fn new_with_payload(
        payload_type: u8,
        sequence_number: RtpSequenceNumber,
        timestamp: RtpTimestamp,
        ssrc: RtpSsrc,
        payload: Bytes,
    ) -> Self {
        Self::new(RtpHeader::new(payload_type, sequence_number, timestamp, ssrc), payload)
    }

    /// Total serialized size
    pub fn size(&self) -> usize {
        self.header.size() + self.payload.len()
    }

    /// Parse a datagram into a header and a borrowed payload slice, with any
    /// RTP padding stripped
    pub fn split(data: &[u8]) -> Result<(RtpHeader, &[u8])> {
        let mut reader = data;
        let header = RtpHeader::parse(&mut reader)?;
        let mut payload = reader;

        if header.padding {
            let pad = match payload.last() {
                Some(&pad) => pad as usize,
                None => {
                    return Err(Error::InvalidPacket(
                        "padding flag set on a packet without payload".to_string(),
                    ))
                }
            };
            if pad == 0 || pad > payload.len() {
                return Err(Error::InvalidPacket(format!(
                    "invalid padding length {} for {} payload bytes",
                    pad,
                    payload.len()
                )));
            }
            payload = &payload[..payload.len() - pad];
        }

        Ok((header, payload))
    }

    /// Parse an RTP packet from bytes
    pub fn parse(data: &[u8]) -> Result<Self> {
        let (header, payload) = Self::split(data)?;
        Ok(Self {
            header,
            payload: Bytes::copy_from_slice(payload),
        })
    }

    /// Serialize the packet to bytes
    pub fn serialize(&self) -> Result<Bytes> {
        let mut buf = BytesMut::with_capacity(self.size());
        self.serialize_into(&mut buf)?;
        Ok(buf.freeze())
    }

    /// Serialize the packet into an existing buffer
    pub fn serialize_into(&self, buf: &mut BytesMut) -> Result<()> {
        if self.header.padding {
            return Err(Error::InvalidParameter(
                "outgoing packets are never padded".to_string(),
            ));
        }
        self.header.serialize(buf)?;
        buf.extend_from_slice(&self.payload);
        Ok(())
    }
}

impl fmt::Debug for RtpPacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RtpPacket")
            .field("header", &self.header)
            .field("payload_len", &self.payload.len())
            .finish()
    }
}

/// Format bytes as space-separated hex for trace logging
pub fn hex_dump(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(" ")
}
