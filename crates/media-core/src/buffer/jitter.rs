//! Jitter buffer implementation interface
//!
//! A jitter buffer implementation owns the frames of one direction of a call
//! and decides when each is released. Times are milliseconds on the owning
//! channel's timebase.

use std::fmt;

use serde::Serialize;
use tracing::warn;

use rtpjb_rtp_core::MediaFrame;

use super::adaptive::AdaptiveJitterBuffer;
use super::config::{JitterBufferConfig, DEFAULT_IMPL};
use super::fixed::FixedJitterBuffer;

/// Buffer lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum JitterBufferState {
    /// No timeline yet
    Empty,
    /// Timeline anchored, nothing released yet
    Filling,
    /// Releasing frames
    Steady,
    /// Timeline discarded and re-anchored, nothing released since
    Resyncing,
}

impl fmt::Display for JitterBufferState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Empty => "EMPTY",
            Self::Filling => "FILLING",
            Self::Steady => "STEADY",
            Self::Resyncing => "RESYNCING",
        };
        f.write_str(name)
    }
}

/// Result of handing a frame to an implementation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutResult {
    /// Frame queued
    Ok,
    /// Frame discarded (late, duplicate, or too long)
    Dropped,
    /// Timeline reset; the frame starts the new one
    Resynced,
}

/// Result of asking an implementation for a frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GetResult {
    /// Frame to play now
    Frame(MediaFrame),
    /// Due frame that overlaps audio already released; not to be played
    Dropped(MediaFrame),
    /// Nothing due
    NoFrame,
}

/// Counters exposed by every implementation
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct JitterBufferStats {
    /// Frames handed to the buffer
    pub frames_in: u64,
    /// Frames released for playout
    pub frames_out: u64,
    /// Frames discarded because their slot was already played
    pub dropped_late: u64,
    /// Frames evicted to stay within the size limit
    pub dropped_overflow: u64,
    /// Frames discarded because their slot was already queued
    pub dropped_duplicate: u64,
    /// Frames discarded by a resync
    pub dropped_resync: u64,
    /// Number of resyncs
    pub resyncs: u64,
    /// Current playout delay in ms
    pub current_delay_ms: i64,
    /// Queued audio in ms
    pub depth_ms: i64,
    /// Smoothed inter-arrival jitter in ms
    pub jitter_ms: f64,
}

/// Capability set of a jitter buffer implementation
pub trait JitterBufferImpl: Send {
    /// Registered name
    fn name(&self) -> &'static str;

    /// Queue the first frame and anchor the timeline on it
    fn put_first(&mut self, frame: MediaFrame, now: i64) -> PutResult;

    /// Queue a frame
    fn put(&mut self, frame: MediaFrame, now: i64) -> PutResult;

    /// Take the next frame due at `now`
    fn get(&mut self, now: i64) -> GetResult;

    /// Playout time of the next queued frame
    fn next(&self) -> Option<i64>;

    /// Take any queued frame, used to drain the buffer on teardown
    fn remove(&mut self) -> Option<MediaFrame>;

    /// Drop queued frames and re-anchor on the next frame
    fn force_resync(&mut self);

    /// Drop queued frames and return to [`JitterBufferState::Empty`]
    fn empty_and_reset(&mut self);

    /// Current lifecycle state
    fn state(&self) -> JitterBufferState;

    /// Queued audio in ms
    fn depth_ms(&self) -> i64;

    /// Counters
    fn stats(&self) -> JitterBufferStats;
}

/// Constructor of a registered implementation
pub type ImplFactory = fn(&JitterBufferConfig) -> Box<dyn JitterBufferImpl>;

/// A named jitter buffer implementation
pub struct ImplRegistration {
    /// Name selected by `jb.impl`
    pub name: &'static str,
    /// Constructor
    pub create: ImplFactory,
}

impl fmt::Debug for ImplRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImplRegistration").field("name", &self.name).finish()
    }
}

fn create_fixed(config: &JitterBufferConfig) -> Box<dyn JitterBufferImpl> {
    Box::new(FixedJitterBuffer::new(config))
}

fn create_adaptive(config: &JitterBufferConfig) -> Box<dyn JitterBufferImpl> {
    Box::new(AdaptiveJitterBuffer::new(config))
}

/// Available implementations; the first is the fallback
pub static IMPLEMENTATIONS: &[ImplRegistration] = &[
    ImplRegistration {
        name: "fixed",
        create: create_fixed,
    },
    ImplRegistration {
        name: "adaptive",
        create: create_adaptive,
    },
];

/// Look up an implementation by name (case-insensitive)
pub fn find_impl(name: &str) -> Option<&'static ImplRegistration> {
    IMPLEMENTATIONS
        .iter()
        .find(|registration| registration.name.eq_ignore_ascii_case(name))
}

/// Names of all registered implementations
pub fn implementation_names() -> impl Iterator<Item = &'static str> {
    IMPLEMENTATIONS.iter().map(|registration| registration.name)
}

/// Resolve `config.impl_name`, falling back to the default implementation
pub fn choose_impl(config: &JitterBufferConfig) -> &'static ImplRegistration {
    match find_impl(&config.impl_name) {
        Some(registration) => registration,
        None => {
            warn!(
                "Jitter buffer implementation {:?} not found, using {:?}",
                config.impl_name, DEFAULT_IMPL
            );
            &IMPLEMENTATIONS[0]
        }
    }
}

/// Create the implementation selected by `config`
pub fn create_impl(config: &JitterBufferConfig) -> Box<dyn JitterBufferImpl> {
    (choose_impl(config).create)(config)
}
