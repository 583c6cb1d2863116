//! Network transport for RTP
//!
//! [`IoContext`] is the poller a bridge loop waits on. Sessions register their
//! socket once when bound and get back an [`IoHandle`] identifying them in the
//! readiness list returned by [`IoContext::wait`].

mod socket;

pub use socket::BoundSocket;

use std::io;
use std::time::Duration;

use mio::net::UdpSocket;
use mio::{Events, Interest, Poll, Token};
use tracing::{debug, trace};

use crate::Result;

/// Default number of readiness events collected per wait
const DEFAULT_EVENT_CAPACITY: usize = 64;

/// Registration handle returned by [`IoContext::register`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IoHandle(Token);

impl IoHandle {
    /// Numeric identifier of the registration
    pub fn id(&self) -> usize {
        self.0 .0
    }
}

/// Readiness poller shared by the sessions of one bridge loop
pub struct IoContext {
    poll: Poll,
    events: Events,
    next_token: usize,
}

impl IoContext {
    /// Create a new poller
    pub fn new() -> Result<Self> {
        Ok(Self {
            poll: Poll::new()?,
            events: Events::with_capacity(DEFAULT_EVENT_CAPACITY),
            next_token: 0,
        })
    }

    /// Register a socket for readability
    pub fn register(&mut self, socket: &mut UdpSocket) -> Result<IoHandle> {
        let token = Token(self.next_token);
        self.next_token += 1;
        self.poll
            .registry()
            .register(socket, token, Interest::READABLE)?;
        debug!("Registered socket as I/O handle {}", token.0);
        Ok(IoHandle(token))
    }

    /// Remove a socket registration
    pub fn deregister(&mut self, handle: IoHandle, socket: &mut UdpSocket) -> Result<()> {
        self.poll.registry().deregister(socket)?;
        debug!("Deregistered I/O handle {}", handle.id());
        Ok(())
    }

    /// Wait for readability
    ///
    /// `timeout_ms` of `-1` (or any negative value) blocks until a socket is
    /// readable. Readiness is edge triggered: a returned handle's socket must
    /// be read until it would block.
    pub fn wait(&mut self, timeout_ms: i64) -> Result<Vec<IoHandle>> {
        let timeout = (timeout_ms >= 0).then(|| Duration::from_millis(timeout_ms as u64));

        match self.poll.poll(&mut self.events, timeout) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::Interrupted => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        }

        let ready: Vec<IoHandle> = self
            .events
            .iter()
            .filter(|event| event.is_readable())
            .map(|event| IoHandle(event.token()))
            .collect();
        trace!("Poll returned {} readable handles", ready.len());
        Ok(ready)
    }
}
