//! Go-Back-N receive-side state machine.
//!
//! [`GbnReceiver`] implements the receiver side of Go-Back-N:
//!
//! - Only **in-order** data packets are accepted (seq == `expected_seq`).
//! - Out-of-order or duplicate packets are discarded and answered with a
//!   duplicate ACK of the last in-order sequence number.
//! - Datagrams that fail to decode or verify are dropped with **no** ACK; the
//!   sender's timeout recovers them exactly like a lost packet.
//!
//! This module only manages state; all channel I/O is the caller's
//! responsibility.

use crate::packet::{Frame, Packet, PacketError};
use crate::state::ReceiverState;

/// Why a datagram produced no response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Discard {
    /// Digest mismatch.
    Corrupt,
    /// Not a well-formed packet at all.
    Malformed(PacketError),
    /// A verified ACK; the receiver never expects one.
    UnexpectedAck(u32),
    /// The connection is already closed.
    Closed,
}

/// What the caller must do after [`GbnReceiver::on_datagram`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// In-order data: the payload was delivered; send `ack`.
    Accepted { seq: u32, ack: Packet },
    /// Out-of-order or duplicate data: nothing delivered; send `ack` again.
    OutOfOrder { seq: u32, ack: Packet },
    /// The peer asked to close; the receiver is now `Closed`.
    CloseRequested,
    /// Drop silently.
    Discarded(Discard),
}

/// Go-Back-N receive-side state for one connection.
#[derive(Debug)]
pub struct GbnReceiver {
    /// Next expected sequence number.  Never decreases.
    expected_seq: u32,

    /// In-order payloads delivered so far.
    delivered: Vec<Vec<u8>>,

    state: ReceiverState,
}

impl Default for GbnReceiver {
    fn default() -> Self {
        Self::new()
    }
}

impl GbnReceiver {
    pub fn new() -> Self {
        Self {
            expected_seq: 1,
            delivered: Vec::new(),
            state: ReceiverState::Open,
        }
    }

    pub fn expected_seq(&self) -> u32 {
        self.expected_seq
    }

    /// Cumulative ACK number: the last in-order sequence number received
    /// (`0` before anything arrived).
    pub fn ack_number(&self) -> u32 {
        self.expected_seq - 1
    }

    pub fn state(&self) -> ReceiverState {
        self.state
    }

    pub fn delivered(&self) -> &[Vec<u8>] {
        &self.delivered
    }

    /// Hand the delivered payloads to the caller, leaving the buffer empty.
    pub fn take_delivered(&mut self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.delivered)
    }

    /// Force the receiver closed (idle timeout).
    pub fn close(&mut self) {
        self.state = ReceiverState::Closed;
    }

    /// Decode, verify and process one raw datagram.
    pub fn on_datagram(&mut self, bytes: &[u8]) -> Verdict {
        if self.state == ReceiverState::Closed {
            return Verdict::Discarded(Discard::Closed);
        }
        let frame = match Frame::decode(bytes) {
            Ok(frame) => frame,
            Err(e) => return Verdict::Discarded(Discard::Malformed(e)),
        };
        if !frame.verify() {
            return Verdict::Discarded(Discard::Corrupt);
        }
        self.on_packet(frame.packet)
    }

    /// Process a packet whose digest already verified.
    pub fn on_packet(&mut self, packet: Packet) -> Verdict {
        if self.state == ReceiverState::Closed {
            return Verdict::Discarded(Discard::Closed);
        }
        match packet {
            Packet::Data { seq, payload } if seq == self.expected_seq => {
                self.delivered.push(payload);
                let ack = Packet::Ack(self.expected_seq);
                self.expected_seq += 1;
                Verdict::Accepted { seq, ack }
            }
            Packet::Close => {
                self.state = ReceiverState::Closed;
                Verdict::CloseRequested
            }
            Packet::Data { seq, .. } => Verdict::OutOfOrder {
                seq,
                ack: Packet::Ack(self.ack_number()),
            },
            Packet::Ack(n) => Verdict::Discarded(Discard::UnexpectedAck(n)),
        }
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn data(seq: u32, payload: &[u8]) -> Vec<u8> {
        Packet::Data {
            seq,
            payload: payload.to_vec(),
        }
        .encode()
        .unwrap()
    }

    #[test]
    fn initial_state() {
        let r = GbnReceiver::new();
        assert_eq!(r.expected_seq(), 1);
        assert_eq!(r.ack_number(), 0);
        assert_eq!(r.state(), ReceiverState::Open);
        assert!(r.delivered().is_empty());
    }

    #[test]
    fn in_order_packet_accepted_and_acked() {
        let mut r = GbnReceiver::new();
        let verdict = r.on_datagram(&data(1, b"hello"));
        assert_eq!(
            verdict,
            Verdict::Accepted {
                seq: 1,
                ack: Packet::Ack(1)
            }
        );
        assert_eq!(r.expected_seq(), 2);
        assert_eq!(r.delivered(), &[b"hello".to_vec()]);
    }

    #[test]
    fn out_of_order_packet_gets_duplicate_ack() {
        let mut r = GbnReceiver::new();
        r.on_datagram(&data(1, b"a"));
        let verdict = r.on_datagram(&data(3, b"c"));
        assert_eq!(
            verdict,
            Verdict::OutOfOrder {
                seq: 3,
                ack: Packet::Ack(1)
            }
        );
        assert_eq!(r.expected_seq(), 2);
        assert_eq!(r.delivered().len(), 1);
    }

    #[test]
    fn duplicate_packet_not_delivered_twice() {
        let mut r = GbnReceiver::new();
        r.on_datagram(&data(1, b"a"));
        r.on_datagram(&data(2, b"b"));
        let verdict = r.on_datagram(&data(1, b"a"));
        assert_eq!(
            verdict,
            Verdict::OutOfOrder {
                seq: 1,
                ack: Packet::Ack(2)
            }
        );
        assert_eq!(r.delivered(), &[b"a".to_vec(), b"b".to_vec()]);
    }

    #[test]
    fn first_packet_lost_yields_ack_zero() {
        let mut r = GbnReceiver::new();
        let verdict = r.on_datagram(&data(2, b"b"));
        assert_eq!(
            verdict,
            Verdict::OutOfOrder {
                seq: 2,
                ack: Packet::Ack(0)
            }
        );
    }

    #[test]
    fn corrupt_packet_dropped_without_ack() {
        let mut r = GbnReceiver::new();
        let bytes = Packet::Data {
            seq: 1,
            payload: b"hello".to_vec(),
        }
        .encode_corrupted()
        .unwrap();
        assert_eq!(r.on_datagram(&bytes), Verdict::Discarded(Discard::Corrupt));
        assert_eq!(r.expected_seq(), 1);
        assert!(r.delivered().is_empty());
    }

    #[test]
    fn malformed_datagram_dropped() {
        let mut r = GbnReceiver::new();
        assert_eq!(
            r.on_datagram(b"junk"),
            Verdict::Discarded(Discard::Malformed(PacketError::Truncated))
        );
    }

    #[test]
    fn close_request_closes() {
        let mut r = GbnReceiver::new();
        r.on_datagram(&data(1, b"a"));
        let close = Packet::Close.encode().unwrap();
        assert_eq!(r.on_datagram(&close), Verdict::CloseRequested);
        assert_eq!(r.state(), ReceiverState::Closed);
        assert_eq!(
            r.on_datagram(&data(2, b"b")),
            Verdict::Discarded(Discard::Closed)
        );
        assert_eq!(r.take_delivered(), vec![b"a".to_vec()]);
        assert!(r.delivered().is_empty());
    }

    #[test]
    fn stray_ack_is_ignored() {
        let mut r = GbnReceiver::new();
        let ack = Packet::Ack(1).encode().unwrap();
        assert_eq!(
            r.on_datagram(&ack),
            Verdict::Discarded(Discard::UnexpectedAck(1))
        );
        assert_eq!(r.expected_seq(), 1);
    }

    #[test]
    fn expected_seq_is_monotonic() {
        let mut r = GbnReceiver::new();
        let arrivals = [1, 3, 2, 2, 5, 3, 4, 1, 5, 6];
        let mut last = r.expected_seq();
        for seq in arrivals {
            r.on_datagram(&data(seq, &[seq as u8]));
            assert!(r.expected_seq() >= last);
            last = r.expected_seq();
        }
        assert_eq!(r.expected_seq(), 7);
        let got: Vec<u8> = r.delivered().iter().map(|p| p[0]).collect();
        assert_eq!(got, vec![1, 2, 3, 4, 5, 6]);
    }
}
