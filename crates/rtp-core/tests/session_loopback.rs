//! Loopback tests for RtpSession send/receive over real UDP sockets

use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};
use std::time::{Duration, Instant};

use bytes::Bytes;
use serial_test::serial;

use rtpjb_rtp_core::packet::DtmfEvent;
use rtpjb_rtp_core::prelude::*;

fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init();
}

fn config() -> RtpConfig {
    RtpConfig {
        bind_addr: IpAddr::V4(Ipv4Addr::LOCALHOST),
        port_range: 30000..=30999,
        ..Default::default()
    }
}

/// Wait until `session` has received `want` frames, or two seconds pass
fn collect(io: &mut IoContext, session: &mut RtpSession, want: usize) -> Vec<MediaFrame> {
    let mut frames = Vec::new();
    let deadline = Instant::now() + Duration::from_secs(2);
    while frames.len() < want && Instant::now() < deadline {
        io.wait(50).unwrap();
        session
            .drain(Instant::now(), &mut |frame| frames.push(frame))
            .unwrap();
    }
    frames
}

fn rtp_datagram(pt: u8, seq: u16, ts: u32, marker: bool, payload: &[u8]) -> Bytes {
    let mut packet = RtpPacket::new_with_payload(pt, seq, ts, 0x5eed_5eed, Bytes::copy_from_slice(payload));
    packet.header.marker = marker;
    packet.serialize().unwrap()
}

#[test]
#[serial]
fn test_voice_frames_carry_timing() {
    init_test_logging();
    let mut io = IoContext::new().unwrap();
    let mut a = RtpSession::create(config(), &mut io).unwrap();
    let mut b = RtpSession::create(config(), &mut io).unwrap();
    a.set_peer(b.local_addr().unwrap()).unwrap();
    b.set_peer(a.local_addr().unwrap()).unwrap();

    for _ in 0..3 {
        a.send(&MediaFrame::voice(MediaFormat::Pcmu, vec![0xff; 160])).unwrap();
    }

    let frames = collect(&mut io, &mut b, 3);
    assert_eq!(frames.len(), 3);
    let timing: Vec<Option<i64>> = frames.iter().map(|f| f.ts).collect();
    assert_eq!(timing, vec![Some(0), Some(20), Some(40)]);
    assert!(frames.iter().all(|f| f.is_voice() && f.len_ms == 20 && f.src == "rtp"));
    assert_eq!(frames[1].seqno, frames[0].seqno.wrapping_add(1));

    a.destroy(&mut io);
    b.destroy(&mut io);
}

#[test]
#[serial]
fn test_sent_digit_received_once() {
    init_test_logging();
    let mut io = IoContext::new().unwrap();
    let mut a = RtpSession::create(config(), &mut io).unwrap();
    let mut b = RtpSession::create(config(), &mut io).unwrap();
    a.set_peer(b.local_addr().unwrap()).unwrap();

    a.send_digit('5').unwrap();
    a.send_digit('#').unwrap();

    let frames = collect(&mut io, &mut b, 2);
    let digits: Vec<Option<char>> = frames.iter().map(|f| f.digit).collect();
    assert_eq!(digits, vec![Some('5'), Some('#')]);

    // Give stray retransmissions a chance to show up
    assert!(collect(&mut io, &mut b, 1).is_empty());
    assert_eq!(b.stats().digits_received, 2);
    assert_eq!(a.stats().digits_sent, 2);
}

#[test]
#[serial]
fn test_digit_without_end_bit_times_out() {
    init_test_logging();
    let mut io = IoContext::new().unwrap();
    let mut config = config();
    config.dtmf_timeout_ms = 100;
    let mut b = RtpSession::create(config, &mut io).unwrap();
    let raw = UdpSocket::bind("127.0.0.1:0").unwrap();
    let target: SocketAddr = b.local_addr().unwrap();

    let event = DtmfEvent::for_digit('7', 10, 160, false).unwrap().to_bytes();
    for seq in 0..4 {
        raw.send_to(&rtp_datagram(101, seq, 8000, seq == 0, &event), target).unwrap();
    }

    let frames = collect(&mut io, &mut b, 1);
    assert!(frames.is_empty(), "digit emitted before the de-bounce timeout");
    assert!(b.next_timer().is_some());

    let mut digits = Vec::new();
    let deadline = Instant::now() + Duration::from_secs(1);
    while digits.is_empty() && Instant::now() < deadline {
        if let Some(at) = b.next_timer() {
            std::thread::sleep(at.saturating_duration_since(Instant::now()));
        }
        b.poll_timers(Instant::now(), &mut |frame| digits.push(frame.digit));
    }
    assert_eq!(digits, vec![Some('7')]);
    assert!(b.next_timer().is_none());
}

#[test]
#[serial]
fn test_held_key_with_advancing_timestamps_is_one_digit() {
    init_test_logging();
    let mut io = IoContext::new().unwrap();
    let mut b = RtpSession::create(config(), &mut io).unwrap();
    let raw = UdpSocket::bind("127.0.0.1:0").unwrap();
    let target: SocketAddr = b.local_addr().unwrap();

    let event = DtmfEvent::for_digit('9', 10, 160, false).unwrap().to_bytes();
    for n in 0..5u16 {
        let ts = 8000 + u32::from(n) * 160;
        raw.send_to(&rtp_datagram(101, n, ts, n == 0, &event), target).unwrap();
    }
    // Audio resumes 300ms of media time after the last event packet
    raw.send_to(&rtp_datagram(0, 5, 8640 + 2400, false, &[0xff; 160]), target)
        .unwrap();

    let frames = collect(&mut io, &mut b, 2);
    let digits: Vec<char> = frames.iter().filter_map(|f| f.digit).collect();
    assert_eq!(digits, vec!['9']);
    assert_eq!(frames.iter().filter(|f| f.is_voice()).count(), 1);
    assert_eq!(b.stats().digits_received, 1);
}

#[test]
#[serial]
fn test_malformed_datagrams_are_dropped() {
    init_test_logging();
    let mut io = IoContext::new().unwrap();
    let mut b = RtpSession::create(config(), &mut io).unwrap();
    let raw = UdpSocket::bind("127.0.0.1:0").unwrap();
    let target = b.local_addr().unwrap();

    raw.send_to(&[0x80, 0x00, 0x01], target).unwrap();
    raw.send_to(&rtp_datagram(77, 1, 0, false, &[1, 2, 3]), target).unwrap();
    raw.send_to(&rtp_datagram(0, 2, 0, false, &[0xff; 160]), target).unwrap();

    let frames = collect(&mut io, &mut b, 1);
    assert_eq!(frames.len(), 1);
    assert!(frames[0].is_voice());

    let deadline = Instant::now() + Duration::from_secs(1);
    while b.stats().packets_received < 3 && Instant::now() < deadline {
        io.wait(20).unwrap();
        b.drain(Instant::now(), &mut |_| {}).unwrap();
    }
    assert_eq!(b.stats().packets_received, 3);
    assert_eq!(b.stats().packets_dropped, 2);
    assert_eq!(b.state(), SessionState::Bound);
}

#[test]
#[serial]
fn test_symmetric_rtp_learns_peer() {
    init_test_logging();
    let mut io = IoContext::new().unwrap();
    let mut config = config();
    config.symmetric = true;
    let mut b = RtpSession::create(config, &mut io).unwrap();
    let raw = UdpSocket::bind("127.0.0.1:0").unwrap();
    raw.set_read_timeout(Some(Duration::from_secs(2))).unwrap();

    raw.send_to(&rtp_datagram(8, 1, 0, true, &[0xd5; 160]), b.local_addr().unwrap())
        .unwrap();
    assert_eq!(collect(&mut io, &mut b, 1).len(), 1);
    assert_eq!(b.peer(), Some(raw.local_addr().unwrap()));
    assert_eq!(b.state(), SessionState::Active);

    b.send(&MediaFrame::voice(MediaFormat::Pcma, vec![0xd5; 160])).unwrap();
    let mut buf = [0u8; 512];
    let (len, _) = raw.recv_from(&mut buf).unwrap();
    assert_eq!(len, 12 + 160);
}
