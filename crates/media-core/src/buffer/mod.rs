//! Jitter buffer module for the media-core library
//!
//! This module holds the frame queue, the two jitter buffer implementations
//! and the per-channel engine a bridge drives.

// Ordered playout queue
pub mod queue;
pub use queue::FrameQueue;

// Configuration keys and defaults
pub mod config;
pub use config::{parse_bool, JitterBufferConfig};

// Implementation interface and registry
pub mod jitter;
pub use jitter::{
    choose_impl, create_impl, find_impl, implementation_names, GetResult, ImplRegistration,
    JitterBufferImpl, JitterBufferState, JitterBufferStats, PutResult, IMPLEMENTATIONS,
};

// Shared timeline logic
pub mod common;
pub use common::{BufferCore, JitterCalculator};

// Constant delay variant
pub mod fixed;
pub use fixed::FixedJitterBuffer;

// Jitter-following variant
pub mod adaptive;
pub use adaptive::AdaptiveJitterBuffer;

// Frame timestamp trace files
pub mod framelog;
pub use framelog::FrameLog;

// Per-channel engine and pair operations
pub mod channel;
pub use channel::{ChannelCaps, ChannelJitterBuffer, JbChannel, PutOutcome};
