//! RTP session
//!
//! One [`RtpSession`] per channel: it owns the bound socket, builds outgoing
//! packets from media frames and turns received datagrams into frames and
//! DTMF digits. All methods are non-blocking; reads happen only after the
//! poller reported the session's socket readable.

pub mod dtmf;

pub use dtmf::DtmfDebouncer;

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::ops::RangeInclusive;
use std::time::Instant;

use bytes::BytesMut;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, trace, warn};

use crate::error::Error;
use crate::frame::{ControlKind, FrameKind, MediaFrame};
use crate::packet::{digit_to_event, hex_dump, DtmfEvent, RtpHeader, RtpPacket};
use crate::payload::{PayloadTypeMap, RtpPayload, DEFAULT_DTMF_PAYLOAD_TYPE};
use crate::stats::RtpSessionStats;
use crate::time::{rtp_timestamp_delta, samples_to_ms};
use crate::transport::{BoundSocket, IoContext, IoHandle};
use crate::{Result, RtpSequenceNumber, RtpSsrc, RtpTimestamp, DEFAULT_MAX_PACKET_SIZE};

/// Source tag carried by frames produced by the receive path
pub const FRAME_SOURCE: &str = "rtp";

/// Duration field of the RFC2833 end packets we send (100ms at 8kHz)
const DIGIT_END_DURATION: u16 = 800;

/// Volume field of the RFC2833 packets we send
const DIGIT_VOLUME: u8 = 0xa;

/// Timestamp gap between consecutive digits (120ms at 8kHz)
const DIGIT_TS_ADVANCE: u32 = 960;

/// Packets sent per digit; the second half carries the end bit
const DIGIT_PACKETS: usize = 6;

/// Failed reads tolerated in one drain before giving up on the socket
const MAX_RECV_FAILURES: usize = 8;

/// Result of one read attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReadOutcome {
    Datagram,
    Failed,
    WouldBlock,
}

/// Session configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RtpConfig {
    /// Local address to bind
    pub bind_addr: IpAddr,

    /// Ports to choose the even RTP port from
    pub port_range: RangeInclusive<u16>,

    /// RTP clock rate of telephone events
    pub clock_rate: u32,

    /// De-bounce timeout for received DTMF
    pub dtmf_timeout_ms: u32,

    /// Payload type bound to telephone events
    pub dtmf_payload_type: u8,

    /// Learn the peer from the source of received packets
    pub symmetric: bool,

    /// Receive buffer size
    pub max_packet_size: usize,
}

impl Default for RtpConfig {
    fn default() -> Self {
        Self {
            bind_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port_range: 5000..=31000,
            clock_rate: 8000,
            dtmf_timeout_ms: 300,
            dtmf_payload_type: DEFAULT_DTMF_PAYLOAD_TYPE,
            symmetric: false,
            max_packet_size: DEFAULT_MAX_PACKET_SIZE,
        }
    }
}

/// Session lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No socket yet
    Idle,
    /// Socket bound and registered, no peer
    Bound,
    /// Peer known, media flows
    Active,
    /// Socket released
    Closed,
}

/// An RTP media session
pub struct RtpSession {
    config: RtpConfig,
    state: SessionState,
    socket: Option<BoundSocket>,
    io_handle: Option<IoHandle>,
    peer: Option<SocketAddr>,
    payload_map: PayloadTypeMap,

    ssrc: RtpSsrc,
    seqno: RtpSequenceNumber,
    tx_ts: RtpTimestamp,
    digit_ts: RtpTimestamp,
    sent_voice: bool,

    rx_base_ts: Option<RtpTimestamp>,
    dtmf: DtmfDebouncer,
    recv_buf: Vec<u8>,

    stats: RtpSessionStats,
}

impl fmt::Debug for RtpSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RtpSession")
            .field("ssrc", &format_args!("{:08x}", self.ssrc))
            .field("state", &self.state)
            .field("local_addr", &self.local_addr())
            .field("peer", &self.peer)
            .field("stats", &self.stats)
            .finish()
    }
}

impl RtpSession {
    /// Create an idle session
    pub fn new(config: RtpConfig) -> Self {
        let mut rng = rand::thread_rng();
        let tx_ts: RtpTimestamp = rng.gen();
        let session = Self {
            payload_map: PayloadTypeMap::new(config.dtmf_payload_type),
            dtmf: DtmfDebouncer::new(config.dtmf_timeout_ms, config.clock_rate),
            recv_buf: vec![0u8; config.max_packet_size.max(crate::packet::RTP_MIN_HEADER_SIZE)],
            config,
            state: SessionState::Idle,
            socket: None,
            io_handle: None,
            peer: None,
            ssrc: rng.gen(),
            seqno: rng.gen(),
            tx_ts,
            digit_ts: tx_ts,
            sent_voice: false,
            rx_base_ts: None,
            stats: RtpSessionStats::default(),
        };
        debug!("Created RTP session with SSRC={:08x}", session.ssrc);
        session
    }

    /// Create a session bound to an even port and registered with `io`
    pub fn create(config: RtpConfig, io: &mut IoContext) -> Result<Self> {
        let mut session = Self::new(config);
        session.bind(io)?;
        Ok(session)
    }

    /// Allocate the socket and register it for readability
    pub fn bind(&mut self, io: &mut IoContext) -> Result<()> {
        if self.state != SessionState::Idle {
            return Err(Error::InvalidState(format!(
                "Cannot bind a session in state {:?}",
                self.state
            )));
        }

        let mut socket = BoundSocket::bind_even(self.config.bind_addr, self.config.port_range.clone())?;
        let handle = io.register(socket.socket_mut())?;

        info!(
            "RTP session {:08x} listening on {}",
            self.ssrc,
            socket.local_addr()
        );
        self.socket = Some(socket);
        self.io_handle = Some(handle);
        self.state = if self.peer.is_some() {
            SessionState::Active
        } else {
            SessionState::Bound
        };
        Ok(())
    }

    /// Set the remote address packets are sent to
    pub fn set_peer(&mut self, peer: SocketAddr) -> Result<()> {
        if self.state == SessionState::Closed {
            return Err(Error::InvalidState("Session is closed".to_string()));
        }
        if self.peer != Some(peer) {
            debug!("RTP session {:08x} peer set to {}", self.ssrc, peer);
        }
        self.peer = Some(peer);
        if self.state == SessionState::Bound {
            self.state = SessionState::Active;
        }
        Ok(())
    }

    /// Send a voice frame
    pub fn send(&mut self, frame: &MediaFrame) -> Result<()> {
        let peer = self.active_peer()?;
        if !frame.is_voice() {
            return Err(Error::InvalidParameter(format!(
                "Only voice frames can be sent as media, got {:?}",
                frame.kind
            )));
        }

        let payload_type = self.payload_map.payload_type_for(frame.format).map_err(|e| {
            warn!("Dropping outgoing frame: {}", e);
            e
        })?;

        let mut header = RtpHeader::new(payload_type, self.seqno, self.tx_ts, self.ssrc);
        header.marker = !self.sent_voice;

        let mut buf = BytesMut::with_capacity(header.size() + frame.payload.len());
        header.serialize(&mut buf)?;
        buf.extend_from_slice(&frame.payload);

        self.seqno = self.seqno.wrapping_add(1);
        self.tx_ts = self.tx_ts.wrapping_add(frame.samples);
        self.sent_voice = true;

        self.transmit(&buf, peer)
    }

    /// Send a DTMF digit as an RFC2833 event
    pub fn send_digit(&mut self, digit: char) -> Result<()> {
        let peer = self.active_peer()?;
        let event = digit_to_event(digit)
            .ok_or_else(|| Error::InvalidParameter(format!("Not a DTMF digit: {:?}", digit)))?;
        let payload_type = self.payload_map.dtmf_payload_type().ok_or_else(|| {
            Error::UnsupportedFormat("No payload type bound to telephone events".to_string())
        })?;

        // Digits never go out behind audio already sent
        if rtp_timestamp_delta(self.tx_ts, self.digit_ts) > 0 {
            self.digit_ts = self.tx_ts;
        }

        let mut failures = 0;
        for n in 0..DIGIT_PACKETS {
            let end = n >= DIGIT_PACKETS / 2;
            let mut header = RtpHeader::new(payload_type, self.seqno, self.digit_ts, self.ssrc);
            header.marker = n == 0;
            let payload = DtmfEvent {
                event,
                end,
                volume: DIGIT_VOLUME,
                duration: if end { DIGIT_END_DURATION } else { 0 },
            };

            let mut buf = BytesMut::with_capacity(header.size() + 4);
            header.serialize(&mut buf)?;
            payload.serialize(&mut buf);

            if self.transmit(&buf, peer).is_err() {
                failures += 1;
            }

            // End packets repeat the sequence number of the first end packet
            if n < DIGIT_PACKETS / 2 {
                self.seqno = self.seqno.wrapping_add(1);
            }
        }

        self.digit_ts = self.digit_ts.wrapping_add(DIGIT_TS_ADVANCE);
        self.seqno = self.seqno.wrapping_add(1);

        if failures == DIGIT_PACKETS {
            return Err(Error::TransientIo(format!("Failed to send digit '{}'", digit)));
        }
        self.stats.digits_sent += 1;
        debug!("Sent DTMF digit '{}' to {}", digit, peer);
        Ok(())
    }

    /// Send any frame: voice as media, a completed digit as RFC2833
    pub fn send_frame(&mut self, frame: MediaFrame) -> Result<()> {
        match (frame.kind, frame.digit) {
            (FrameKind::Voice, _) => self.send(&frame),
            (FrameKind::DtmfEnd, Some(digit)) => self.send_digit(digit),
            (kind, _) => {
                trace!("Not sending {:?} frame", kind);
                Ok(())
            }
        }
    }

    /// Read one datagram from the socket
    ///
    /// Decoded frames and completed digits are handed to `sink`. Returns
    /// `Ok(false)` once the socket would block. Malformed datagrams and failed
    /// reads are logged, counted and skipped without an error.
    pub fn on_readable<F>(&mut self, now: Instant, sink: &mut F) -> Result<bool>
    where
        F: FnMut(MediaFrame),
    {
        Ok(self.read_one(now, sink)? != ReadOutcome::WouldBlock)
    }

    /// Read every pending datagram, returning how many were received
    pub fn drain<F>(&mut self, now: Instant, sink: &mut F) -> Result<usize>
    where
        F: FnMut(MediaFrame),
    {
        drain_reads(|| self.read_one(now, sink))
    }

    fn read_one<F>(&mut self, now: Instant, sink: &mut F) -> Result<ReadOutcome>
    where
        F: FnMut(MediaFrame),
    {
        let socket = match (&self.socket, self.state) {
            (Some(socket), SessionState::Bound | SessionState::Active) => socket,
            _ => {
                return Err(Error::InvalidState(format!(
                    "Cannot read from a session in state {:?}",
                    self.state
                )))
            }
        };

        let mut buf = std::mem::take(&mut self.recv_buf);
        let outcome = match socket.recv_from(&mut buf) {
            Ok(None) => ReadOutcome::WouldBlock,
            Ok(Some((len, source))) => {
                self.stats.record_received(len);
                self.learn_peer(source);
                if let Err(e) = self.handle_datagram(&buf[..len], now, sink) {
                    self.stats.packets_dropped += 1;
                    if e.is_transient() {
                        debug!("Dropping datagram from {}: {}", source, e);
                        trace!("Dropped datagram: [{}]", hex_dump(&buf[..len.min(32)]));
                    } else {
                        warn!("Dropping datagram from {}: {}", source, e);
                    }
                }
                ReadOutcome::Datagram
            }
            Err(e) => {
                // ICMP errors from an earlier send surface here; the socket stays usable
                error!("RTP receive failed: {}", e);
                self.stats.receive_errors += 1;
                ReadOutcome::Failed
            }
        };
        self.recv_buf = buf;
        Ok(outcome)
    }

    /// Emit a DTMF digit whose wall-clock de-bounce deadline has passed
    pub fn poll_timers<F>(&mut self, now: Instant, sink: &mut F)
    where
        F: FnMut(MediaFrame),
    {
        if let Some(digit) = self.dtmf.poll(now) {
            self.emit_digit(digit, sink);
        }
    }

    /// Next instant [`poll_timers`](Self::poll_timers) has work to do
    pub fn next_timer(&self) -> Option<Instant> {
        self.dtmf.next_deadline()
    }

    /// Deregister and close the socket; pending DTMF is discarded
    pub fn destroy(&mut self, io: &mut IoContext) {
        if self.state == SessionState::Closed {
            return;
        }
        if let Some(mut socket) = self.socket.take() {
            if let Some(handle) = self.io_handle.take() {
                if let Err(e) = io.deregister(handle, socket.socket_mut()) {
                    warn!("Failed to deregister RTP socket: {}", e);
                }
            }
            info!("RTP session {:08x} closed ({})", self.ssrc, self.stats);
        }
        self.dtmf.reset();
        self.state = SessionState::Closed;
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Local socket address, once bound
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.socket.as_ref().map(BoundSocket::local_addr)
    }

    /// Remote address, if known
    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    /// Poller registration of the socket
    pub fn io_handle(&self) -> Option<IoHandle> {
        self.io_handle
    }

    /// Local synchronization source
    pub fn ssrc(&self) -> RtpSsrc {
        self.ssrc
    }

    /// Next sequence number to be sent
    pub fn next_sequence_number(&self) -> RtpSequenceNumber {
        self.seqno
    }

    /// Session configuration
    pub fn config(&self) -> &RtpConfig {
        &self.config
    }

    /// Payload type table
    pub fn payload_map(&self) -> &PayloadTypeMap {
        &self.payload_map
    }

    /// Payload type table, for binding dynamic payload types
    pub fn payload_map_mut(&mut self) -> &mut PayloadTypeMap {
        &mut self.payload_map
    }

    /// Packet counters
    pub fn stats(&self) -> &RtpSessionStats {
        &self.stats
    }

    fn active_peer(&self) -> Result<SocketAddr> {
        match (self.state, self.peer) {
            (SessionState::Active, Some(peer)) => Ok(peer),
            (state, _) => Err(Error::InvalidState(format!(
                "Cannot send in state {:?}",
                state
            ))),
        }
    }

    fn transmit(&mut self, data: &[u8], peer: SocketAddr) -> Result<()> {
        let socket = self
            .socket
            .as_ref()
            .ok_or_else(|| Error::InvalidState("No socket".to_string()))?;
        match socket.send_to(data, peer) {
            Ok(sent) => {
                self.stats.record_sent(sent);
                Ok(())
            }
            Err(e) => {
                warn!("RTP send to {} failed, frame dropped: {}", peer, e);
                self.stats.send_failures += 1;
                Err(e)
            }
        }
    }

    fn learn_peer(&mut self, source: SocketAddr) {
        if self.config.symmetric && self.peer != Some(source) {
            info!("RTP session {:08x} switching peer to {}", self.ssrc, source);
            self.peer = Some(source);
            if self.state == SessionState::Bound {
                self.state = SessionState::Active;
            }
        }
    }

    fn handle_datagram<F>(&mut self, data: &[u8], now: Instant, sink: &mut F) -> Result<()>
    where
        F: FnMut(MediaFrame),
    {
        let (header, payload) = RtpPacket::split(data)?;
        self.stats.record_sequence(header.sequence_number);
        trace!(
            "Received PT={} seq={} ts={} len={}",
            header.payload_type,
            header.sequence_number,
            header.timestamp,
            payload.len()
        );

        let kind = self.payload_map.lookup(header.payload_type).ok_or_else(|| {
            Error::UnsupportedFormat(format!("Unknown payload type {}", header.payload_type))
        })?;

        match kind {
            RtpPayload::TelephoneEvent => {
                let event = DtmfEvent::parse(payload)?;
                for digit in self.dtmf.on_event(&event, header.timestamp, now) {
                    self.emit_digit(digit, sink);
                }
            }
            RtpPayload::ComfortNoise => {
                self.flush_dtmf_on_media(header.timestamp, sink);
                let level = payload.first().copied().unwrap_or(0) & 0x7f;
                sink(MediaFrame::control(ControlKind::ComfortNoise { level }).with_src(FRAME_SOURCE));
            }
            RtpPayload::Audio(format) => {
                self.flush_dtmf_on_media(header.timestamp, sink);

                let base = *self.rx_base_ts.get_or_insert(header.timestamp);
                let offset = i64::from(rtp_timestamp_delta(header.timestamp, base));
                let mut frame = MediaFrame::voice(format, payload.to_vec()).with_src(FRAME_SOURCE);
                frame.seqno = header.sequence_number;
                frame.ts = (offset >= 0).then(|| samples_to_ms(offset, format.clock_rate()));
                sink(frame);
            }
        }
        Ok(())
    }

    fn flush_dtmf_on_media<F>(&mut self, ts: RtpTimestamp, sink: &mut F)
    where
        F: FnMut(MediaFrame),
    {
        if let Some(digit) = self.dtmf.on_media(ts) {
            self.emit_digit(digit, sink);
        }
    }

    fn emit_digit<F>(&mut self, digit: char, sink: &mut F)
    where
        F: FnMut(MediaFrame),
    {
        self.stats.digits_received += 1;
        sink(MediaFrame::dtmf_end(digit).with_src(FRAME_SOURCE));
    }
}

/// Call `read` until it would block or has failed `MAX_RECV_FAILURES` times
fn drain_reads<R>(mut read: R) -> Result<usize>
where
    R: FnMut() -> Result<ReadOutcome>,
{
    let mut received = 0;
    let mut failures = 0;
    loop {
        match read()? {
            ReadOutcome::Datagram => received += 1,
            ReadOutcome::WouldBlock => break,
            ReadOutcome::Failed => {
                failures += 1;
                if failures == MAX_RECV_FAILURES {
                    warn!("Giving up on {} failed reads, {} datagrams received", failures, received);
                    break;
                }
            }
        }
    }
    Ok(received)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::MediaFormat;
    use std::net::UdpSocket as StdUdpSocket;
    use std::time::Duration;

    #[test]
    fn test_drain_reads_past_failed_read() {
        let mut script = vec![
            ReadOutcome::Datagram,
            ReadOutcome::Failed,
            ReadOutcome::Datagram,
            ReadOutcome::WouldBlock,
            ReadOutcome::Datagram,
        ]
        .into_iter();
        let received = drain_reads(|| Ok(script.next().unwrap_or(ReadOutcome::WouldBlock))).unwrap();
        assert_eq!(received, 2);
        // Stopped at would-block
        assert_eq!(script.next(), Some(ReadOutcome::Datagram));
    }

    #[test]
    fn test_drain_gives_up_on_persistent_failure() {
        let mut reads = 0;
        let received = drain_reads(|| {
            reads += 1;
            Ok(ReadOutcome::Failed)
        })
        .unwrap();
        assert_eq!(received, 0);
        assert_eq!(reads, MAX_RECV_FAILURES);
    }

    #[test]
    fn test_drain_propagates_state_errors() {
        let result = drain_reads(|| Err(Error::InvalidState("closed".into())));
        assert!(matches!(result, Err(Error::InvalidState(_))));
    }

    fn local_config() -> RtpConfig {
        RtpConfig {
            bind_addr: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port_range: 42000..=42999,
            ..Default::default()
        }
    }

    fn raw_peer() -> StdUdpSocket {
        let socket = StdUdpSocket::bind("127.0.0.1:0").unwrap();
        socket.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
        socket
    }

    fn recv_packet(socket: &StdUdpSocket) -> RtpPacket {
        let mut buf = [0u8; 1500];
        let (len, _) = socket.recv_from(&mut buf).unwrap();
        RtpPacket::parse(&buf[..len]).unwrap()
    }

    #[test]
    fn test_state_machine() {
        let mut io = IoContext::new().unwrap();
        let mut session = RtpSession::new(local_config());
        assert_eq!(session.state(), SessionState::Idle);
        assert!(matches!(
            session.send(&MediaFrame::voice(MediaFormat::Pcmu, vec![0; 160])),
            Err(Error::InvalidState(_))
        ));

        session.bind(&mut io).unwrap();
        assert_eq!(session.state(), SessionState::Bound);
        let port = session.local_addr().unwrap().port();
        assert_eq!(port % 2, 0);

        session.set_peer("127.0.0.1:9".parse().unwrap()).unwrap();
        assert_eq!(session.state(), SessionState::Active);

        session.destroy(&mut io);
        assert_eq!(session.state(), SessionState::Closed);
        assert!(session.local_addr().is_none());
        session.destroy(&mut io);
        assert!(session.set_peer("127.0.0.1:9".parse().unwrap()).is_err());
    }

    #[test]
    fn test_send_builds_consecutive_headers() {
        let mut io = IoContext::new().unwrap();
        let mut session = RtpSession::create(local_config(), &mut io).unwrap();
        let peer = raw_peer();
        session.set_peer(peer.local_addr().unwrap()).unwrap();

        let seq = session.next_sequence_number();
        session.send(&MediaFrame::voice(MediaFormat::Pcma, vec![0xd5; 160])).unwrap();
        session.send(&MediaFrame::voice(MediaFormat::Pcma, vec![0xd5; 80])).unwrap();

        let first = recv_packet(&peer);
        let second = recv_packet(&peer);
        assert_eq!(first.header.payload_type, 8);
        assert!(first.header.marker);
        assert!(!second.header.marker);
        assert_eq!(first.header.sequence_number, seq);
        assert_eq!(second.header.sequence_number, seq.wrapping_add(1));
        assert_eq!(second.header.timestamp.wrapping_sub(first.header.timestamp), 160);
        assert_eq!(first.header.ssrc, session.ssrc());
        assert_eq!(second.payload.len(), 80);
        assert_eq!(session.stats().packets_sent, 2);
    }

    #[test]
    fn test_send_rejects_unmapped_format() {
        let mut io = IoContext::new().unwrap();
        let mut session = RtpSession::create(local_config(), &mut io).unwrap();
        session.set_peer("127.0.0.1:9".parse().unwrap()).unwrap();

        let err = session
            .send(&MediaFrame::voice(MediaFormat::Slin, vec![0; 320]))
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat(_)));
        assert!(matches!(
            session.send(&MediaFrame::dtmf_end('1')),
            Err(Error::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_send_digit_burst() {
        let mut io = IoContext::new().unwrap();
        let mut session = RtpSession::create(local_config(), &mut io).unwrap();
        let peer = raw_peer();
        session.set_peer(peer.local_addr().unwrap()).unwrap();

        let seq = session.next_sequence_number();
        session.send_digit('9').unwrap();

        let packets: Vec<RtpPacket> = (0..6).map(|_| recv_packet(&peer)).collect();
        let seqs: Vec<u16> = packets.iter().map(|p| p.header.sequence_number.wrapping_sub(seq)).collect();
        assert_eq!(seqs, vec![0, 1, 2, 3, 3, 3]);
        assert!(packets[0].header.marker);
        assert!(packets[1..].iter().all(|p| !p.header.marker));
        assert!(packets.iter().all(|p| p.header.timestamp == packets[0].header.timestamp));
        assert!(packets.iter().all(|p| p.header.payload_type == 101));

        let events: Vec<DtmfEvent> = packets.iter().map(|p| DtmfEvent::parse(&p.payload).unwrap()).collect();
        assert!(events.iter().all(|e| e.digit() == Some('9') && e.volume == 0xa));
        assert!(events[..3].iter().all(|e| !e.end && e.duration == 0));
        assert!(events[3..].iter().all(|e| e.end && e.duration == 800));

        assert_eq!(session.next_sequence_number(), seq.wrapping_add(4));

        session.send_digit('1').unwrap();
        let next = recv_packet(&peer);
        assert_eq!(next.header.timestamp.wrapping_sub(packets[0].header.timestamp), 960);
        assert!(session.send_digit('x').is_err());
    }
}
