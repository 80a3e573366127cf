//! The I/O worker: transport read path, inbound packet dispatch,
//! acknowledgment generation, and the liveness timer.
//!
//! The worker owns the transport's receive side. It polls with a timeout of
//! half the ping interval; an elapsed poll is the timer tick that drives
//! liveness probing and dead-peer detection. All session mutation happens
//! under the access lock, and the worker never takes the send lock: it
//! emits its header-only packets (ACK, PING) from its own stack.

use core::convert::Infallible;
use std::time::Instant;

use log::{debug, trace, warn};
use rudp_proto::{
    FLAG_ACK, FLAG_DATA, FLAG_PING, FLAG_RST, FLAG_SYNACK, Header, MAX_PACKET_SIZE,
};

use crate::{Conn, io_err_is_timeout, session::Session, sock::SyncUdpSock};

impl<T: SyncUdpSock> Conn<T> {
    /// The worker loop entry point. Blocks forever, reading datagrams and
    /// running the protocol state machine; run it on a dedicated thread.
    ///
    /// Only returns on a non-recoverable transport error.
    pub fn run(&self) -> std::io::Result<Infallible> {
        self.sock
            .set_recv_timeout(Some(self.config.ping_interval() / 2))?;

        let mut buf = [0u8; MAX_PACKET_SIZE];

        loop {
            match self.sock.recv(&mut buf) {
                Ok(n) => match Header::parse(&buf[..n]) {
                    Some((header, payload)) => self.process_packet(header, payload),
                    None => trace!("dropping malformed {n}-byte datagram"),
                },
                Err(e) if io_err_is_timeout(e.kind()) => self.tick(),
                Err(e) => return Err(e),
            }
        }
    }

    /// Classifies and handles one inbound packet.
    ///
    /// Flags are independent bits: after the session-level gates, the PING,
    /// DATA and ACK arms can all apply to a single packet, even though the
    /// reference peers never combine them.
    fn process_packet(&self, header: Header, payload: &[u8]) {
        trace!("received {header} ({} payload bytes)", payload.len());

        let mut session = self.session.lock().unwrap();
        let now = Instant::now();

        if header.has(FLAG_RST) {
            debug!("peer reset the connection");
            self.close_locked(&mut session);
            return;
        }

        if header.has(FLAG_SYNACK) {
            session.sess_id = header.sess_id;
            session.last_received_id = header.id;
            session.last_packet_recv = now;
            session.last_ping_send = now;
            debug!("session {} established", session.sess_id);
            self.send_cv.notify_one();
            return;
        }

        if session.sess_id == 0 {
            trace!("no session, dropping packet");
            return;
        }

        if header.sess_id != session.sess_id {
            warn!(
                "packet from stale session {} (current {}), closing",
                header.sess_id, session.sess_id
            );
            self.close_locked(&mut session);
            return;
        }

        if header.has(FLAG_PING) {
            session.last_packet_recv = now;
        }

        if header.has(FLAG_DATA) {
            if session.is_next(header.id) {
                if !payload.is_empty() {
                    if session.deposit(header.id, payload) {
                        trace!("stored {} bytes as id {}", payload.len(), header.id);
                        self.recv_cv.notify_one();
                    } else {
                        // mailbox occupied: drop, ACK the old id, let the
                        // peer retransmit once the application frees it
                        trace!("inbound buffer occupied, discarding id {}", header.id);
                    }
                }
            } else {
                trace!(
                    "skipping packet, got {} last {} ({})",
                    header.id,
                    session.last_received_id,
                    rudp_proto::seq_delta(header.id, session.last_received_id)
                );
            }
            session.last_packet_recv = now;
            self.send_ack(&session);
        }

        if header.has(FLAG_ACK) {
            session.last_send_acked = header.id;
            session.last_packet_recv = now;
            self.send_cv.notify_one();
        }
    }

    /// The timer tick, run whenever the transport poll comes back empty:
    /// probes a quiet peer and declares it dead after the threshold.
    fn tick(&self) {
        let mut session = self.session.lock().unwrap();
        if session.sess_id == 0 {
            return;
        }

        let now = Instant::now();
        let quiet = now.duration_since(session.last_packet_recv);

        if now.duration_since(session.last_ping_send) >= self.config.ping_interval()
            && quiet >= self.config.ping_interval()
        {
            self.send_ping(&session);
            session.last_ping_send = now;
        }

        if quiet >= self.config.dead_peer_timeout() {
            warn!("no packet from peer within {quiet:?}, connection lost");
            self.close_locked(&mut session);
        }
    }

    /// Acknowledges the current `last_received_id`. Every in-session DATA
    /// packet is answered, accepted or not, so the peer can recover from a
    /// lost ACK without wedging the transfer.
    fn send_ack(&self, session: &Session) {
        let Some(peer) = session.peer else { return };

        let header = Header::new(session.sess_id, session.last_received_id, FLAG_ACK);
        trace!("sending {header}");
        if let Err(e) = self.sock.send(&header.to_bytes(), peer) {
            warn!("failed to send ACK: {e}");
        }
    }

    /// Emits a header-only liveness probe. PINGs are never acknowledged;
    /// they exist to refresh the peer's receive timestamp and ours.
    fn send_ping(&self, session: &Session) {
        if session.sess_id == 0 {
            return;
        }
        let Some(peer) = session.peer else { return };

        let header = Header::new(session.sess_id, 0, FLAG_PING);
        trace!("sending {header}");
        if let Err(e) = self.sock.send(&header.to_bytes(), peer) {
            warn!("failed to send PING: {e}");
        }
    }
}
