//! The connection endpoint and its blocking application API.
//!
//! # Locking protocol
//!
//! Two locks guard the endpoint:
//!
//! - the **access lock** (`session`) protects the whole session record and
//!   both condition variables;
//! - the **send lock** (`sender`) serializes application senders and
//!   protects the outbound buffer and send-id counter for the duration of
//!   a `send` or `connect` call.
//!
//! Lock order is send lock first, then access lock; the access lock is
//! never held while acquiring the send lock. The I/O worker only ever takes
//! the access lock. This precludes deadlock.
//!
//! Two condition variables are bound to the access lock: `send_cv` is
//! signalled when the worker observes a relevant ACK, a SYNACK, or a
//! connection loss; `recv_cv` when it deposits a payload or the connection
//! is lost. Waiters re-check their predicate on every wakeup, so spurious
//! wakes are harmless.

use core::{net::SocketAddr, time::Duration};
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::Instant;

use log::{debug, trace, warn};
use rudp_proto::{FLAG_DATA, FLAG_SYN, Header, MAX_PAYLOAD};

use crate::{
    Error,
    config::Config,
    session::{InBufState, SendState, Session},
    sock::SyncUdpSock,
};

/// A reliable, connection-oriented session over a datagram transport.
///
/// One `Conn` talks to exactly one peer at a time. The I/O worker must be
/// running ([`run`](Conn::run), typically on a dedicated thread) for any of
/// the blocking operations to make progress.
///
/// All blocking operations take a timeout; pass [`Duration::MAX`] to wait
/// effectively forever.
pub struct Conn<T> {
    pub(crate) sock: T,
    pub(crate) config: Config,
    /// Access lock.
    pub(crate) session: Mutex<Session>,
    pub(crate) send_cv: Condvar,
    pub(crate) recv_cv: Condvar,
    /// Send lock.
    sender: Mutex<SendState>,
}

impl Conn<std::net::UdpSocket> {
    /// Opens a UDP transport bound to `addr` and wraps it in a new,
    /// disconnected endpoint.
    pub fn bind(addr: impl std::net::ToSocketAddrs) -> std::io::Result<Self> {
        std::net::UdpSocket::bind(addr).map(Self::new)
    }
}

impl<T: SyncUdpSock> Conn<T> {
    pub fn new(sock: T) -> Self {
        Self::with_config(sock, Config::default())
    }

    pub fn with_config(sock: T, config: Config) -> Self {
        Self {
            sock,
            config,
            session: Mutex::new(Session::new()),
            send_cv: Condvar::new(),
            recv_cv: Condvar::new(),
            sender: Mutex::new(SendState::new()),
        }
    }

    #[inline(always)]
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn is_connected(&self) -> bool {
        self.session.lock().unwrap().sess_id != 0
    }

    /// Establishes a session with `peer`.
    ///
    /// Replaces any previous session state, emits a SYN (re-sent every
    /// ACK-wait interval) and blocks until the peer's SYNACK installs the
    /// server-assigned session id, or `timeout` elapses. Concurrent
    /// connects and sends serialize behind the send lock.
    pub fn connect(&self, peer: SocketAddr, timeout: Duration) -> Result<(), Error> {
        let mut st = self.sender.lock().unwrap();

        debug!("connecting to {peer}");
        self.session.lock().unwrap().reset_for_connect(peer);
        st.last_send_id = 0;

        st.begin_packet();
        let syn = Header::new(0, 0, FLAG_SYN);
        st.seal(syn);

        let start = Instant::now();
        while start.elapsed() < timeout {
            trace!("sending {syn}");
            self.sock.send(&st.out_buf, peer)?;

            let wait = self
                .config
                .ack_wait()
                .min(timeout.saturating_sub(start.elapsed()));

            let session = self.session.lock().unwrap();
            let (session, _) = self
                .send_cv
                .wait_timeout_while(session, wait, |s| s.sess_id == 0)
                .unwrap();

            if session.sess_id != 0 {
                debug!("connected, session {}", session.sess_id);
                return Ok(());
            }
            // timed out or spurious wake: re-send the SYN
        }

        debug!("connect to {peer} timed out");
        Err(Error::Timeout)
    }

    /// Sends `data` reliably, blocking until the peer acknowledges it or
    /// `timeout` elapses.
    ///
    /// Stop-and-wait: at most one payload is in flight, and concurrent
    /// senders serialize behind the send lock. A timeout exhausts the retry
    /// budget and tears the session down.
    pub fn send(&self, data: &[u8], timeout: Duration) -> Result<(), Error> {
        if data.len() > MAX_PAYLOAD {
            return Err(Error::TooBig);
        }

        let mut st = self.sender.lock().unwrap();
        st.begin_packet();
        st.write(data);
        self.send_outbound(&mut st, timeout)
    }

    /// The retransmission loop shared by [`send`](Conn::send) and
    /// [`SendSession::send`]. The send lock is held via `st`; the payload
    /// sits behind the blank header region of `st.out_buf`.
    fn send_outbound(&self, st: &mut SendState, timeout: Duration) -> Result<(), Error> {
        let (sess_id, peer) = {
            let session = self.session.lock().unwrap();
            let Some(peer) = session.peer else {
                return Err(Error::InvalidState);
            };
            if session.sess_id == 0 {
                return Err(Error::InvalidState);
            }
            (session.sess_id, peer)
        };

        let id = st.next_send_id();
        let header = Header::new(sess_id, id, FLAG_DATA);
        st.seal(header);

        let start = Instant::now();
        while start.elapsed() < timeout {
            trace!("sending {header} ({} payload bytes)", st.payload_len());
            self.sock.send(&st.out_buf, peer)?;

            let session = self.session.lock().unwrap();
            let (session, _) = self
                .send_cv
                .wait_timeout_while(session, self.config.ack_wait(), |s| {
                    s.last_send_acked != id && s.sess_id != 0
                })
                .unwrap();

            if session.last_send_acked == id {
                trace!("DATA {id} acknowledged");
                return Ok(());
            }
            if session.sess_id == 0 {
                debug!("connection lost while waiting for ACK of {id}");
                return Err(Error::ConnectionLost);
            }

            trace!("no ACK for {id} within {:?}, retransmitting", self.config.ack_wait());
        }

        warn!("send of {id} timed out, closing session");
        self.close_locked(&mut self.session.lock().unwrap());
        Err(Error::Timeout)
    }

    /// Receives the next in-order payload into `buf`, blocking up to
    /// `timeout`.
    ///
    /// Returns the payload length on success. [`Error::NoSpace`] leaves the
    /// payload resident so the call can be retried with a larger buffer.
    pub fn recv(&self, buf: &mut [u8], timeout: Duration) -> Result<usize, Error> {
        let (mut session, outcome) = self.await_inbound(timeout)?;

        match outcome {
            Inbound::Payload => {
                if buf.len() < session.in_buf.len() {
                    return Err(Error::NoSpace);
                }

                let n = session.in_buf.len();
                buf[..n].copy_from_slice(&session.in_buf);
                session.in_buf_state = InBufState::Empty;
                trace!("recv delivered {n} bytes");
                Ok(n)
            }
            Inbound::Lost => Err(Error::ConnectionLost),
        }
    }

    /// Zero-copy variant of [`recv`](Conn::recv): runs `f` over the payload
    /// in place, without copying it out.
    ///
    /// The payload stays resident afterwards (further deposits are held off)
    /// until [`release_in_buf`](Conn::release_in_buf) frees the slot. `f`
    /// runs under the access lock, so it should be short.
    pub fn recv_with<R>(
        &self,
        timeout: Duration,
        f: impl FnOnce(&[u8]) -> R,
    ) -> Result<R, Error> {
        let (mut session, outcome) = self.await_inbound(timeout)?;

        match outcome {
            Inbound::Payload => {
                let value = f(&session.in_buf);
                session.in_buf_state = InBufState::Delivered;
                Ok(value)
            }
            Inbound::Lost => Err(Error::ConnectionLost),
        }
    }

    /// Blocks until the mailbox holds a pending payload or the session
    /// dies. Factored out of the two receive flavors.
    fn await_inbound(
        &self,
        timeout: Duration,
    ) -> Result<(MutexGuard<'_, Session>, Inbound), Error> {
        let session = self.session.lock().unwrap();
        if session.sess_id == 0 {
            return Err(Error::InvalidState);
        }

        let (session, _) = self
            .recv_cv
            .wait_timeout_while(session, timeout, |s| {
                s.in_buf_state != InBufState::Pending && s.sess_id != 0
            })
            .unwrap();

        if session.in_buf_state == InBufState::Pending {
            Ok((session, Inbound::Payload))
        } else if session.sess_id == 0 {
            debug!("connection lost while waiting for data");
            Ok((session, Inbound::Lost))
        } else {
            Err(Error::Timeout)
        }
    }

    /// Frees the mailbox slot after an in-place receive, allowing the
    /// worker to accept the peer's next payload. Idempotent.
    pub fn release_in_buf(&self) {
        let mut session = self.session.lock().unwrap();
        session.in_buf_state = InBufState::Empty;
    }

    /// Tears the session down. Safe to call at any time; a no-op when
    /// already disconnected. Blocked senders and receivers wake with
    /// [`Error::ConnectionLost`].
    pub fn close(&self) {
        self.close_locked(&mut self.session.lock().unwrap());
    }

    /// Teardown with the access lock already held, for the I/O worker
    /// calling in from packet dispatch.
    pub(crate) fn close_locked(&self, session: &mut Session) {
        if session.sess_id != 0 {
            debug!("closing session {}", session.sess_id);
            session.sess_id = 0;
            session.in_buf_state = InBufState::Empty;
            self.send_cv.notify_all();
            self.recv_cv.notify_all();
        }
    }

    /// Starts a zero-copy send: write payload bytes directly into the
    /// outbound packet buffer, then finalize with [`SendSession::send`].
    ///
    /// The returned session holds the send lock, so it serializes against
    /// `send`, `connect`, and other send sessions for as long as it lives.
    pub fn send_session(&self) -> SendSession<'_, T> {
        let mut st = self.sender.lock().unwrap();
        st.begin_packet();
        SendSession { conn: self, st }
    }
}

/// Outcome of a successful wait for inbound state.
enum Inbound {
    Payload,
    Lost,
}

/// A streaming writer over the outbound packet buffer.
///
/// Obtained from [`Conn::send_session`]. Holds the connection's send lock
/// for its whole lifetime, which is what makes writing into the shared
/// buffer sound; drop it promptly if you decide not to send. Dropping
/// without calling [`send`](SendSession::send) discards the payload.
pub struct SendSession<'a, T> {
    conn: &'a Conn<T>,
    st: MutexGuard<'a, SendState>,
}

impl<T: SyncUdpSock> SendSession<'_, T> {
    /// Appends payload bytes, bounded by the remaining packet capacity.
    /// Returns how many bytes were taken; partial writes are normal once
    /// the packet fills up.
    pub fn write(&mut self, data: &[u8]) -> usize {
        self.st.write(data)
    }

    /// Payload bytes written so far.
    #[inline(always)]
    pub fn written(&self) -> usize {
        self.st.payload_len()
    }

    /// Payload bytes that still fit.
    #[inline(always)]
    pub fn remaining(&self) -> usize {
        self.st.out_buf.remaining_capacity()
    }

    /// Sends the accumulated payload through the reliable stop-and-wait
    /// path, consuming the session and releasing the send lock.
    pub fn send(mut self, timeout: Duration) -> Result<(), Error> {
        self.conn.send_outbound(&mut self.st, timeout)
    }
}
