//! Client endpoint of the rudp reliable datagram protocol.
//!
//! This crate layers a reliable, connection-oriented session on top of a
//! best-effort, unordered, length-preserving datagram transport (typically a
//! UDP socket). A session targets exactly one remote peer and provides:
//!
//! - connection establishment (SYN / SYNACK handshake),
//! - stop-and-wait reliable delivery with retransmission,
//! - in-order receipt of the peer's payloads,
//! - liveness probing and dead-peer detection,
//! - orderly teardown.
//!
//! The endpoint is driven by three cooperating threads: an application
//! sender blocking in [`Conn::send`], an application receiver blocking in
//! [`Conn::recv`], and an I/O worker running [`Conn::run`] that owns the
//! transport read path. See [`Conn`] for the locking protocol that
//! coordinates them.

pub mod config;
mod conn;
mod session;
pub mod sock;
mod worker;

pub use config::Config;
pub use conn::{Conn, SendSession};
pub use rudp_proto as proto;

/// Errors surfaced by the blocking connection operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The operation's time budget elapsed. A send timeout also tears the
    /// session down; re-establish it with [`Conn::connect`].
    #[error("operation timed out")]
    Timeout,
    /// The destination buffer is smaller than the pending payload. The
    /// payload stays resident; retry with a larger buffer.
    #[error("buffer too small for the pending payload")]
    NoSpace,
    /// The session was torn down while the operation was in flight: the
    /// peer reset it, went silent past the dead-peer threshold, or replied
    /// from a stale session.
    #[error("connection lost")]
    ConnectionLost,
    /// The operation requires an established session.
    #[error("not connected")]
    InvalidState,
    /// The payload does not fit in a single packet.
    #[error("payload exceeds {} bytes", proto::MAX_PAYLOAD)]
    TooBig,
    /// The underlying transport failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Checks if a [`std::io::Error`] represents a receive timeout.
#[inline(always)]
pub(crate) fn io_err_is_timeout(e: std::io::ErrorKind) -> bool {
    use std::io::ErrorKind::*;
    [WouldBlock, TimedOut].contains(&e)
}
