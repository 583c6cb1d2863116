use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use rtpjb_media_core::buffer::{find_impl, implementation_names};
use rtpjb_media_core::prelude::*;
use rtpjb_rtp_core::{IoContext, RtpConfig, RtpSession};

/// Bridge two RTP legs through jitter buffers
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Remote RTP address of leg A
    #[arg(long)]
    peer_a: SocketAddr,

    /// Remote RTP address of leg B
    #[arg(long)]
    peer_b: SocketAddr,

    /// Local address to bind both legs to
    #[arg(long, default_value = "0.0.0.0")]
    bind: IpAddr,

    /// Jitter buffer implementation
    #[arg(long, default_value = "fixed")]
    jb_impl: String,

    /// Maximum buffered audio (ms)
    #[arg(long, default_value = "200")]
    jb_maxsize: i64,

    /// Timestamp jump that resyncs the buffer (ms)
    #[arg(long, default_value = "1000")]
    jb_resync: i64,

    /// Buffer even if a leg handles jitter itself
    #[arg(long)]
    jb_force: bool,

    /// Write frame log files
    #[arg(long)]
    jb_log: bool,

    /// Stop after this many seconds
    #[arg(long)]
    duration: Option<u64>,
}

fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    if find_impl(&args.jb_impl).is_none() {
        let known: Vec<&str> = implementation_names().collect();
        eprintln!("Unknown jitter buffer {:?}, expected one of {:?}", args.jb_impl, known);
        return Err(Error::UnknownImplementation(args.jb_impl).into());
    }

    let maxsize = args.jb_maxsize.to_string();
    let resync = args.jb_resync.to_string();
    let jb = JitterBufferConfig::from_pairs([
        ("jb.enable", "yes"),
        ("jb.impl", args.jb_impl.as_str()),
        ("jb.maxsize", maxsize.as_str()),
        ("jb.resyncthreshold", resync.as_str()),
        ("jb.force", if args.jb_force { "yes" } else { "no" }),
        ("jb.log", if args.jb_log { "yes" } else { "no" }),
    ])?;

    let rtp = RtpConfig {
        bind_addr: args.bind,
        ..Default::default()
    };

    let mut io = IoContext::new()?;
    let mut session_a = RtpSession::create(rtp.clone(), &mut io)?;
    session_a.set_peer(args.peer_a)?;
    let mut session_b = RtpSession::create(rtp, &mut io)?;
    session_b.set_peer(args.peer_b)?;

    for (name, session, peer) in [("A", &session_a, args.peer_a), ("B", &session_b, args.peer_b)] {
        if let Some(local) = session.local_addr() {
            println!("Leg {}: listening on {}, sending to {}", name, local, peer);
        }
    }

    let mut a = BridgeChannel::new(format!("RTP/{}", args.peer_a), session_a, jb.clone());
    let mut b = BridgeChannel::new(format!("RTP/{}", args.peer_b), session_b, jb);

    let mut driver = BridgeDriver::new(BridgeConfig {
        time_limit: args.duration.map(Duration::from_secs),
        ..Default::default()
    });

    let mut on_event = |event: &BridgeEvent, side: Side| {
        if let BridgeEvent::Digit(digit) = event {
            println!("DTMF {} from leg {}", digit, side);
        }
        EventResponse::Continue
    };

    let outcome = driver.run(&mut a, &mut b, &mut io, &mut on_event)?;
    println!("Bridge ended: {:?}", outcome);
    println!("{:?}", driver.stats());

    for chan in [&mut a, &mut b] {
        println!("{}: {}", chan.name(), chan.session().stats());
        chan.session_mut().destroy(&mut io);
    }
    Ok(())
}
