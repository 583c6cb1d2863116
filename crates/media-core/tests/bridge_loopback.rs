//! Bridge two RTP sessions over loopback UDP with raw sockets as phones

use std::net::{IpAddr, Ipv4Addr, UdpSocket};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use bytes::Bytes;
use serial_test::serial;

use rtpjb_media_core::prelude::*;
use rtpjb_rtp_core::packet::DtmfEvent;
use rtpjb_rtp_core::{IoContext, RtpConfig, RtpPacket, RtpSession};

const DTMF_PT: u8 = 101;

fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init();
}

fn rtp_config() -> RtpConfig {
    RtpConfig {
        bind_addr: IpAddr::V4(Ipv4Addr::LOCALHOST),
        port_range: 34000..=34999,
        ..Default::default()
    }
}

fn phone() -> UdpSocket {
    let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
    socket.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
    socket
}

fn recv(socket: &UdpSocket) -> Option<RtpPacket> {
    let mut buf = [0u8; 1500];
    let (len, _) = socket.recv_from(&mut buf).ok()?;
    RtpPacket::parse(&buf[..len]).ok()
}

fn voice_packet(seq: u16, ts: u32, fill: u8) -> Bytes {
    RtpPacket::new_with_payload(0, seq, ts, 0xa1a1_a1a1, Bytes::from(vec![fill; 160]))
        .serialize()
        .unwrap()
}

fn dtmf_burst(digit: char, seq: u16, ts: u32) -> Vec<Bytes> {
    (0..6u16)
        .map(|n| {
            let end = n >= 3;
            let event = DtmfEvent::for_digit(digit, 10, if end { 800 } else { 160 * (n + 1) }, end).unwrap();
            let mut packet = RtpPacket::new_with_payload(
                DTMF_PT,
                seq + n,
                ts,
                0xa1a1_a1a1,
                Bytes::copy_from_slice(&event.to_bytes()),
            );
            packet.header.marker = n == 0;
            packet.serialize().unwrap()
        })
        .collect()
}

struct Call {
    io: IoContext,
    a: BridgeChannel,
    b: BridgeChannel,
    phone_a: UdpSocket,
    phone_b: UdpSocket,
}

fn setup(jb: JitterBufferConfig) -> Call {
    let mut io = IoContext::new().unwrap();
    let phone_a = phone();
    let phone_b = phone();

    let mut session_a = RtpSession::create(rtp_config(), &mut io).unwrap();
    session_a.set_peer(phone_a.local_addr().unwrap()).unwrap();
    let mut session_b = RtpSession::create(rtp_config(), &mut io).unwrap();
    session_b.set_peer(phone_b.local_addr().unwrap()).unwrap();

    Call {
        io,
        a: BridgeChannel::new("RTP/a", session_a, jb.clone()),
        b: BridgeChannel::new("RTP/b", session_b, jb),
        phone_a,
        phone_b,
    }
}

fn buffered(max_size: i64) -> JitterBufferConfig {
    JitterBufferConfig {
        enabled: true,
        max_size,
        ..Default::default()
    }
}

#[test]
#[serial]
fn test_voice_and_dtmf_cross_the_bridge() {
    init_test_logging();
    let Call {
        mut io,
        mut a,
        mut b,
        phone_a,
        phone_b,
    } = setup(buffered(200));
    let addr_a = a.session().local_addr().unwrap();

    let mut driver = BridgeDriver::new(BridgeConfig {
        time_limit: Some(Duration::from_secs(10)),
        ..Default::default()
    });
    let stop = driver.stop_handle();
    let (digits_tx, digits_rx) = mpsc::channel();

    let bridge = thread::spawn(move || {
        let mut handler = move |event: &BridgeEvent, side: Side| {
            if let BridgeEvent::Digit(digit) = event {
                let _ = digits_tx.send((*digit, side));
            }
            EventResponse::Continue
        };
        let outcome = driver.run(&mut a, &mut b, &mut io, &mut handler);
        (outcome, driver.stats().clone(), a, b, io)
    });

    for i in 0..10u16 {
        let packet = voice_packet(1000 + i, 8000 + u32::from(i) * 160, i as u8);
        phone_a.send_to(&packet, addr_a).unwrap();
        thread::sleep(Duration::from_millis(20));
    }

    let mut voice = Vec::new();
    while voice.len() < 10 {
        let Some(packet) = recv(&phone_b) else { break };
        voice.push(packet);
    }
    assert_eq!(voice.len(), 10);
    for (i, packet) in voice.iter().enumerate() {
        assert_eq!(packet.header.payload_type, 0);
        assert_eq!(packet.payload.as_ref(), &[i as u8; 160][..]);
    }
    assert!(voice[0].header.marker);
    assert!(voice
        .windows(2)
        .all(|w| w[1].header.sequence_number == w[0].header.sequence_number.wrapping_add(1)));

    for packet in dtmf_burst('7', 1010, 9600) {
        phone_a.send_to(&packet, addr_a).unwrap();
    }
    assert_eq!(
        digits_rx.recv_timeout(Duration::from_secs(2)).unwrap(),
        ('7', Side::A)
    );

    let mut events = Vec::new();
    let deadline = Instant::now() + Duration::from_secs(2);
    while events.len() < 6 && Instant::now() < deadline {
        let Some(packet) = recv(&phone_b) else { break };
        if packet.header.payload_type == DTMF_PT {
            events.push(DtmfEvent::parse(&packet.payload).unwrap());
        }
    }
    assert_eq!(events.len(), 6);
    assert!(events.iter().all(|e| e.digit() == Some('7')));
    assert_eq!(events.iter().filter(|e| e.end).count(), 3);

    stop.stop();
    let (outcome, stats, a, b, mut io) = bridge.join().unwrap();
    assert_eq!(outcome.unwrap(), BridgeOutcome::Stopped);
    assert_eq!(stats.frames_buffered, 10);
    assert_eq!(stats.digits_forwarded, 1);
    assert!(!b.jb().is_created());
    assert!(digits_rx.try_recv().is_err());

    for chan in [a, b] {
        chan.into_session().destroy(&mut io);
    }
}

#[test]
#[serial]
fn test_time_limit_ends_bridge() {
    init_test_logging();
    let mut call = setup(buffered(200));
    let mut driver = BridgeDriver::new(BridgeConfig {
        time_limit: Some(Duration::from_millis(200)),
        ..Default::default()
    });
    let mut handler = |_: &BridgeEvent, _: Side| EventResponse::Continue;

    let started = Instant::now();
    let outcome = driver
        .run(&mut call.a, &mut call.b, &mut call.io, &mut handler)
        .unwrap();
    assert_eq!(outcome, BridgeOutcome::Timeout);
    assert!(started.elapsed() >= Duration::from_millis(200));
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[test]
#[serial]
fn test_handler_break_on_digit() {
    init_test_logging();
    let Call {
        mut io,
        mut a,
        mut b,
        phone_b,
        ..
    } = setup(JitterBufferConfig::default());
    let addr_b = b.session().local_addr().unwrap();

    let sender = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        for packet in dtmf_burst('#', 500, 16000) {
            phone_b.send_to(&packet, addr_b).unwrap();
        }
    });

    let mut driver = BridgeDriver::new(BridgeConfig {
        time_limit: Some(Duration::from_secs(5)),
        ..Default::default()
    });
    let mut handler = |event: &BridgeEvent, _: Side| match event {
        BridgeEvent::Digit('#') => EventResponse::Break,
        _ => EventResponse::Continue,
    };
    let outcome = driver.run(&mut a, &mut b, &mut io, &mut handler).unwrap();
    sender.join().unwrap();

    assert_eq!(outcome, BridgeOutcome::Break(Side::B, BridgeEvent::Digit('#')));
    assert_eq!(driver.stats().digits_forwarded, 0);
}

#[test]
#[serial]
fn test_closed_session_is_a_hangup() {
    init_test_logging();
    let mut call = setup(JitterBufferConfig::default());
    call.b.session_mut().destroy(&mut call.io);

    let mut driver = BridgeDriver::new(BridgeConfig::default());
    let mut handler = |_: &BridgeEvent, _: Side| EventResponse::Continue;
    let outcome = driver
        .run(&mut call.a, &mut call.b, &mut call.io, &mut handler)
        .unwrap();
    assert_eq!(outcome, BridgeOutcome::Hangup(Side::B));
}
