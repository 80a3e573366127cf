#![no_std]
//! Wire format of the rudp reliable datagram protocol.
//!
//! Every datagram starts with a fixed 4-byte header, optionally followed by
//! payload bytes. The header names the session the packet belongs to, the
//! sequence number of the packet (or of the packet being acknowledged), and
//! a set of flag bits describing what the packet is.
//!
//! All packet packing and parsing lives here; endpoints never touch raw
//! header bytes themselves.

#[cfg(test)]
extern crate alloc;

use core::fmt;

// Header layout, in wire order:
//
//   sess_id: 2 bytes (u16, little endian). 0 means "no session".
//   id:      1 byte. Sequence number, wraps modulo 256.
//   flags:   1 byte. Bitwise OR of the FLAG_* constants below.

/// The packet carries payload bytes with sequence number `id`.
pub const FLAG_DATA: u8 = 1;
/// The packet acknowledges the peer's DATA with sequence number `id`.
pub const FLAG_ACK: u8 = 2;
/// Session request. Sent with `sess_id` 0 and `id` 0.
pub const FLAG_SYN: u8 = 4;
/// Session grant. Carries the chosen `sess_id` and the initial receive id.
pub const FLAG_SYNACK: u8 = 8;
/// Unconditional teardown of the session named by `sess_id`.
pub const FLAG_RST: u8 = 16;
/// Liveness probe. Header-only, `id` 0, never acknowledged.
pub const FLAG_PING: u8 = 32;

/// Packed size of the header on the wire.
pub const HEADER_LEN: usize = 4;

/// Upper bound on a whole datagram, header included.
pub const MAX_PACKET_SIZE: usize = 1200;

/// Upper bound on the payload of a single DATA packet.
pub const MAX_PAYLOAD: usize = MAX_PACKET_SIZE - HEADER_LEN;

/// The fixed per-packet header.
///
/// A parsed view of the first [`HEADER_LEN`] bytes of a datagram. Use
/// [`Header::parse`] to split an inbound datagram into header and payload,
/// and [`Header::to_bytes`] to produce the wire image of an outbound one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub sess_id: u16,
    pub id: u8,
    pub flags: u8,
}

impl Header {
    #[inline(always)]
    pub const fn new(sess_id: u16, id: u8, flags: u8) -> Self {
        Self { sess_id, id, flags }
    }

    /// Splits a received datagram into its header and payload.
    ///
    /// Returns `None` for datagrams that are not valid packets of this
    /// protocol: shorter than a header, or longer than [`MAX_PACKET_SIZE`].
    #[inline]
    pub fn parse(packet: &[u8]) -> Option<(Self, &[u8])> {
        if packet.len() > MAX_PACKET_SIZE {
            return None;
        }

        let Some((&[s0, s1, id, flags], payload)) = packet.split_first_chunk() else {
            return None;
        };

        Some((
            Self {
                sess_id: u16::from_le_bytes([s0, s1]),
                id,
                flags,
            },
            payload,
        ))
    }

    /// The wire image of this header.
    #[inline(always)]
    pub const fn to_bytes(self) -> [u8; HEADER_LEN] {
        let [s0, s1] = self.sess_id.to_le_bytes();
        [s0, s1, self.id, self.flags]
    }

    /// Whether `flag` (one of the `FLAG_*` constants) is set.
    ///
    /// Flags are independent bits and may coexist in one packet; receivers
    /// must tolerate combinations even if the reference peers never emit
    /// them.
    #[inline(always)]
    pub const fn has(self, flag: u8) -> bool {
        self.flags & flag != 0
    }
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sess {} id {} flags:", self.sess_id, self.id)?;

        const NAMES: [(u8, &str); 6] = [
            (FLAG_DATA, "DATA"),
            (FLAG_ACK, "ACK"),
            (FLAG_SYN, "SYN"),
            (FLAG_SYNACK, "SYNACK"),
            (FLAG_RST, "RST"),
            (FLAG_PING, "PING"),
        ];

        for (bit, name) in NAMES {
            if self.flags & bit != 0 {
                write!(f, " {name}")?;
            }
        }

        if self.flags == 0 {
            write!(f, " (none)")?;
        }

        Ok(())
    }
}

/// Wrapping distance from `b` to `a` in sequence-number space.
///
/// A packet with id `a` is the next in-order packet after `b` iff the
/// delta is exactly 1. Sequence numbers wrap modulo 256, so this holds
/// across the 255 to 0 boundary as well.
#[inline(always)]
pub const fn seq_delta(a: u8, b: u8) -> u8 {
    a.wrapping_sub(b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::format;

    #[test]
    fn test_parse_header_only() {
        let (header, payload) = Header::parse(&[0x07, 0x00, 0x01, FLAG_ACK]).unwrap();

        assert_eq!(header, Header::new(7, 1, FLAG_ACK));
        assert!(payload.is_empty());
    }

    #[test]
    fn test_parse_with_payload() {
        // sess_id 0x1234 on the wire is 0x34 0x12
        let packet = [0x34, 0x12, 0xff, FLAG_DATA, b'h', b'i'];
        let (header, payload) = Header::parse(&packet).unwrap();

        assert_eq!(header.sess_id, 0x1234);
        assert_eq!(header.id, 255);
        assert_eq!(payload, b"hi");
    }

    #[test]
    fn test_parse_rejects_short_and_overlong() {
        assert!(Header::parse(&[]).is_none());
        assert!(Header::parse(&[1, 2, 3]).is_none());

        let oversized = [0u8; MAX_PACKET_SIZE + 1];
        assert!(Header::parse(&oversized).is_none());

        let max = [0u8; MAX_PACKET_SIZE];
        let (_, payload) = Header::parse(&max).unwrap();
        assert_eq!(payload.len(), MAX_PAYLOAD);
    }

    #[test]
    fn test_wire_image_round_trip() {
        let header = Header::new(0xbeef, 42, FLAG_DATA);
        let bytes = header.to_bytes();

        assert_eq!(bytes, [0xef, 0xbe, 42, FLAG_DATA]);
        assert_eq!(Header::parse(&bytes), Some((header, &[][..])));
    }

    #[test]
    fn test_flag_query() {
        let header = Header::new(1, 0, FLAG_DATA | FLAG_ACK);

        assert!(header.has(FLAG_DATA));
        assert!(header.has(FLAG_ACK));
        assert!(!header.has(FLAG_RST));
    }

    #[test]
    fn test_flag_formatter() {
        let s = format!("{}", Header::new(9, 3, FLAG_SYNACK));
        assert_eq!(s, "sess 9 id 3 flags: SYNACK");

        let s = format!("{}", Header::new(0, 0, 0));
        assert_eq!(s, "sess 0 id 0 flags: (none)");
    }

    #[test]
    fn test_seq_delta_wraps() {
        assert_eq!(seq_delta(1, 0), 1);
        assert_eq!(seq_delta(0, 255), 1);
        assert_eq!(seq_delta(255, 0), 255);
        assert_eq!(seq_delta(5, 5), 0);
        assert_eq!(seq_delta(4, 5), 255);
    }
}
