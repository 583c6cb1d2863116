//! RTP Packet module
//!
//! This module provides structures for handling RTP packets as defined in RFC 3550,
//! and the RFC2833 telephone-event payload carried inside them.

pub mod dtmf;
pub mod header;
pub mod rtp;

pub use dtmf::*;
pub use header::*;
pub use rtp::*;
