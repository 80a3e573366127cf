//! Blocking datagram socket abstraction.
//!
//! The endpoint is generic over the transport so that tests and embedded
//! ports can substitute their own socket. The transport is assumed to be a
//! best-effort, unordered, length-preserving datagram channel; everything
//! above (acknowledgment, ordering, liveness) is this crate's job.

use core::{net::SocketAddr, time::Duration};

/// A blocking datagram socket.
///
/// The I/O worker polls the socket with a receive timeout; implementations
/// must report an elapsed timeout as [`WouldBlock`](std::io::ErrorKind::WouldBlock)
/// or [`TimedOut`](std::io::ErrorKind::TimedOut), which the worker treats as
/// its timer tick rather than as a failure.
pub trait SyncUdpSock {
    /// Sends one datagram to `dest`. Fire-and-forget: delivery is not
    /// guaranteed, but a sent datagram arrives whole or not at all.
    fn send(&self, buf: &[u8], dest: SocketAddr) -> std::io::Result<()>;

    /// Receives one datagram into `buf`, blocking up to the configured
    /// receive timeout. Returns the datagram's length.
    fn recv(&self, buf: &mut [u8]) -> std::io::Result<usize>;

    /// Sets the receive timeout for subsequent [`recv`](Self::recv) calls.
    /// `None` blocks indefinitely.
    fn set_recv_timeout(&self, timeout: Option<Duration>) -> std::io::Result<()>;
}

impl SyncUdpSock for std::net::UdpSocket {
    #[inline(always)]
    fn send(&self, buf: &[u8], dest: SocketAddr) -> std::io::Result<()> {
        self.send_to(buf, dest).and_then(|n| {
            (n == buf.len())
                .then_some(())
                .ok_or(std::io::ErrorKind::FileTooLarge.into())
        })
    }

    #[inline(always)]
    fn recv(&self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.recv_from(buf).map(|(n, _peer)| n)
    }

    #[inline(always)]
    fn set_recv_timeout(&self, timeout: Option<Duration>) -> std::io::Result<()> {
        self.set_read_timeout(timeout)
    }
}
