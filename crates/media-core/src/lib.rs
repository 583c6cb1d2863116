//! # Media Core library for rtpjb
//!
//! `media-core` buffers the audio of bridged RTP legs and drives the bridge
//! loop between them.
//!
//! This crate provides:
//!
//! - A frame queue ordered by playout time
//! - Fixed and adaptive jitter buffer implementations behind one trait
//! - The per-channel jitter buffer engine used by a two-leg bridge
//! - A single-threaded bridge driver with DTMF event callbacks
//!
//! ## Quick Start
//!
//! ```no_run
//! use rtpjb_media_core::prelude::*;
//! use rtpjb_rtp_core::{IoContext, RtpConfig, RtpSession};
//!
//! # fn main() -> rtpjb_media_core::Result<()> {
//! let mut io = IoContext::new()?;
//! let jb = JitterBufferConfig::from_pairs([("jb.enable", "yes"), ("jb.impl", "adaptive")])?;
//!
//! let mut a = BridgeChannel::new("RTP/a", RtpSession::create(RtpConfig::default(), &mut io)?, jb.clone());
//! let mut b = BridgeChannel::new("RTP/b", RtpSession::create(RtpConfig::default(), &mut io)?, jb);
//! a.session_mut().set_peer("192.0.2.10:4000".parse().unwrap())?;
//! b.session_mut().set_peer("192.0.2.20:4000".parse().unwrap())?;
//!
//! let mut driver = BridgeDriver::new(BridgeConfig::default());
//! let outcome = driver.run(&mut a, &mut b, &mut io, &mut |event: &BridgeEvent, side: Side| {
//!     println!("{:?} from {}", event, side);
//!     EventResponse::Continue
//! })?;
//! println!("bridge ended: {:?}", outcome);
//! # Ok(())
//! # }
//! ```

// Error handling
mod error;

// Working modules
pub mod bridge;
pub mod buffer;

// Re-export common types
pub use error::{Error, Result};

pub use buffer::{
    AdaptiveJitterBuffer, ChannelCaps, ChannelJitterBuffer, FixedJitterBuffer, FrameQueue,
    GetResult, JbChannel, JitterBufferConfig, JitterBufferImpl, JitterBufferState,
    JitterBufferStats, PutOutcome, PutResult,
};

pub use bridge::{
    BridgeChannel, BridgeConfig, BridgeDriver, BridgeEvent, BridgeEventHandler, BridgeOutcome,
    BridgeStats, EventResponse, Side, StopHandle,
};

/// Prelude module with commonly used types
pub mod prelude {
    pub use crate::buffer::channel::{
        empty_and_reset, get_and_deliver, usecheck, when_to_wakeup,
    };
    pub use crate::{
        BridgeChannel, BridgeConfig, BridgeDriver, BridgeEvent, BridgeEventHandler,
        BridgeOutcome, ChannelCaps, ChannelJitterBuffer, Error, EventResponse, JbChannel,
        JitterBufferConfig, JitterBufferImpl, PutOutcome, Result, Side,
    };
}
