//! The shared session record and the sender-side packet buffer.
//!
//! Two structs mirror the two locks of the endpoint: [`Session`] lives
//! under the access lock and is touched by all three threads; [`SendState`]
//! lives under the send lock and is touched only by the application sender
//! holding it.

use core::net::SocketAddr;
use std::time::Instant;

use arrayvec::ArrayVec;
use rudp_proto::{HEADER_LEN, Header, MAX_PACKET_SIZE, MAX_PAYLOAD, seq_delta};

/// State of the single-slot inbound mailbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum InBufState {
    /// No payload held; the I/O worker may deposit.
    #[default]
    Empty,
    /// A payload is held and not yet handed to the application.
    Pending,
    /// The payload was handed out in place and is still resident; the slot
    /// stays occupied until released.
    Delivered,
}

/// The session record. Every field is read and written only under the
/// access lock.
pub(crate) struct Session {
    /// Remote endpoint, set at connect.
    pub peer: Option<SocketAddr>,
    /// 0 means disconnected; the peer assigns a non-zero id at SYNACK.
    pub sess_id: u16,
    /// Most recently observed remote ACK id.
    pub last_send_acked: u8,
    /// Last in-order inbound DATA id accepted.
    pub last_received_id: u8,
    /// When the last packet of the current session arrived.
    pub last_packet_recv: Instant,
    /// When the last liveness probe went out.
    pub last_ping_send: Instant,
    /// Payload of the packet currently held in the mailbox.
    pub in_buf: ArrayVec<u8, MAX_PAYLOAD>,
    pub in_buf_state: InBufState,
}

impl Session {
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            peer: None,
            sess_id: 0,
            last_send_acked: 0,
            last_received_id: 0,
            last_packet_recv: now,
            last_ping_send: now,
            in_buf: ArrayVec::new(),
            in_buf_state: InBufState::Empty,
        }
    }

    /// Whether `id` is the next in-order inbound sequence number.
    #[inline(always)]
    pub fn is_next(&self, id: u8) -> bool {
        seq_delta(id, self.last_received_id) == 1
    }

    /// Deposits an in-order payload into the mailbox, advancing
    /// `last_received_id`. Returns `false` without side effects when the
    /// slot is occupied; the peer will retransmit once the application
    /// frees it.
    pub fn deposit(&mut self, id: u8, payload: &[u8]) -> bool {
        if self.in_buf_state != InBufState::Empty {
            return false;
        }

        self.in_buf.clear();
        if self.in_buf.try_extend_from_slice(payload).is_err() {
            // unreachable for packets that passed Header::parse
            return false;
        }

        self.last_received_id = id;
        self.in_buf_state = InBufState::Pending;
        true
    }

    /// Clears per-session state ahead of a (re)connect, leaving the
    /// endpoint disconnected and the mailbox free.
    pub fn reset_for_connect(&mut self, peer: SocketAddr) {
        self.peer = Some(peer);
        self.sess_id = 0;
        self.last_send_acked = 0;
        self.last_received_id = 0;
        self.in_buf.clear();
        self.in_buf_state = InBufState::Empty;
    }
}

/// Sender-side state: the outbound packet buffer and the send-id counter.
///
/// The buffer always starts with a [`HEADER_LEN`]-byte header region; the
/// payload is appended behind it and the header is written last, so the
/// same bytes are retransmitted verbatim on every attempt.
pub(crate) struct SendState {
    pub out_buf: ArrayVec<u8, MAX_PACKET_SIZE>,
    /// Last sequence number assigned to a locally originated DATA packet.
    pub last_send_id: u8,
}

impl SendState {
    pub fn new() -> Self {
        Self {
            out_buf: ArrayVec::new(),
            last_send_id: 0,
        }
    }

    /// Resets the buffer to a blank header region with no payload.
    pub fn begin_packet(&mut self) {
        self.out_buf.clear();
        self.out_buf.extend([0; HEADER_LEN]);
    }

    /// Appends up to `data.len()` payload bytes, bounded by the remaining
    /// packet capacity. Returns how many bytes were taken.
    pub fn write(&mut self, data: &[u8]) -> usize {
        let n = data.len().min(self.out_buf.remaining_capacity());
        let _ = self.out_buf.try_extend_from_slice(&data[..n]);
        n
    }

    #[inline(always)]
    pub fn payload_len(&self) -> usize {
        self.out_buf.len() - HEADER_LEN
    }

    /// Stamps `header` over the reserved header region.
    pub fn seal(&mut self, header: Header) {
        self.out_buf[..HEADER_LEN].copy_from_slice(&header.to_bytes());
    }

    /// Assigns the next outbound sequence number.
    #[inline(always)]
    pub fn next_send_id(&mut self) -> u8 {
        self.last_send_id = self.last_send_id.wrapping_add(1);
        self.last_send_id
    }
}
