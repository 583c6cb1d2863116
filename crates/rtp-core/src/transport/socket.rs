use std::io;
use std::net::{IpAddr, SocketAddr};
use std::ops::RangeInclusive;

use mio::net::UdpSocket;
use rand::Rng;
use tracing::{debug, trace, warn};

use crate::error::Error;
use crate::Result;

/// A non-blocking UDP socket bound to an even RTP port
///
/// The port is released when the value is dropped, including on error paths
/// while a session is still being set up.
#[derive(Debug)]
pub struct BoundSocket {
    socket: UdpSocket,
    local_addr: SocketAddr,
}

impl BoundSocket {
    /// Bind to an even port in `range` on `ip`
    ///
    /// The search starts at a random even port and steps by two, wrapping
    /// inside the range, while ports are in use. `port + 1` always lies in the
    /// range so the RTCP companion port stays available to the caller.
    pub fn bind_even(ip: IpAddr, range: RangeInclusive<u16>) -> Result<Self> {
        let ports = even_ports(&range)?;
        let start = rand::thread_rng().gen_range(0..ports.len());

        for i in 0..ports.len() {
            let port = ports.port_at((start + i) % ports.len());
            let addr = SocketAddr::new(ip, port);
            match UdpSocket::bind(addr) {
                Ok(socket) => {
                    let local_addr = socket.local_addr()?;
                    debug!("Bound RTP socket on {}", local_addr);
                    return Ok(Self { socket, local_addr });
                }
                Err(e) if e.kind() == io::ErrorKind::AddrInUse => {
                    trace!("Port {} in use, trying the next one", port);
                }
                Err(e) => {
                    return Err(Error::Resource(format!("Failed to bind RTP socket on {}: {}", addr, e)));
                }
            }
        }

        warn!("No free even port in {}-{}", range.start(), range.end());
        Err(Error::Resource(format!(
            "No free even port in {}-{}",
            range.start(),
            range.end()
        )))
    }

    /// Bind to an explicit address
    pub fn bind(addr: SocketAddr) -> Result<Self> {
        let socket = UdpSocket::bind(addr)
            .map_err(|e| Error::Resource(format!("Failed to bind RTP socket on {}: {}", addr, e)))?;
        let local_addr = socket.local_addr()?;
        Ok(Self { socket, local_addr })
    }

    /// Local address the socket is bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Send a datagram
    pub fn send_to(&self, data: &[u8], addr: SocketAddr) -> Result<usize> {
        let sent = self.socket.send_to(data, addr)?;
        if sent != data.len() {
            return Err(Error::TransientIo(format!(
                "Partial write to {}: {} of {} bytes",
                addr,
                sent,
                data.len()
            )));
        }
        Ok(sent)
    }

    /// Receive a datagram, `Ok(None)` when the socket would block
    pub fn recv_from(&self, buf: &mut [u8]) -> Result<Option<(usize, SocketAddr)>> {
        match self.socket.recv_from(buf) {
            Ok(received) => Ok(Some(received)),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Underlying socket, for poller registration
    pub fn socket_mut(&mut self) -> &mut UdpSocket {
        &mut self.socket
    }
}

/// Even ports usable as an RTP base port inside a range
struct EvenPorts {
    first: u16,
    count: usize,
}

impl EvenPorts {
    fn len(&self) -> usize {
        self.count
    }

    fn port_at(&self, index: usize) -> u16 {
        self.first + (index as u16) * 2
    }
}

fn even_ports(range: &RangeInclusive<u16>) -> Result<EvenPorts> {
    let first = range.start().saturating_add(range.start() & 1);
    // Largest even port whose companion (port + 1) is still in range
    let last = match range.end().checked_sub(1) {
        Some(top) => top & !1,
        None => 0,
    };

    if *range.start() == 0 || first > last {
        return Err(Error::InvalidParameter(format!(
            "Port range {}-{} has no usable even port",
            range.start(),
            range.end()
        )));
    }

    Ok(EvenPorts {
        first,
        count: usize::from((last - first) / 2) + 1,
    })
}
