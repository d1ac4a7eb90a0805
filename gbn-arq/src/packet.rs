//! Wire-format definitions for Go-Back-N packets.
//!
//! Every datagram exchanged between the endpoints is one [`Packet`] followed
//! by a 128-bit integrity digest.  This module is responsible for:
//! - Defining the on-wire binary layout of the three packet kinds.
//! - Serialising a [`Packet`] and appending the digest of the serialised
//!   fields (optionally a deliberately wrong digest, for fault injection).
//! - Parsing raw bytes back into a [`Frame`] *without* checking the digest;
//!   [`Frame::verify`] is the separate, explicit corruption check.
//!
//! No I/O happens here.
//!
//! # Wire format
//!
//! All multi-byte integers are **big-endian**.  The digest is BLAKE2b with a
//! 16-byte output, computed over every byte that precedes it.
//!
//! ```text
//! data  : | kind=0x01 | seq (u32) | payload_len (u16) | payload ... | digest (16) |
//! ack   : | kind=0x02 | ack (u32) |                                 digest (16) |
//! close : | kind=0x03 |                                             digest (16) |
//! ```
//!
//! The close sentinel has its own kind byte, so it can never be mistaken for
//! an ACK number.

use blake2::digest::consts::U16;
use blake2::{Blake2b, Digest};
use thiserror::Error;

/// Kind byte constants for the first field of every packet.
pub mod kind {
    /// Data packet: sequence number + payload.
    pub const DATA: u8 = 0x01;
    /// Cumulative acknowledgement.
    pub const ACK: u8 = 0x02;
    /// Orderly connection close.
    pub const CLOSE: u8 = 0x03;
}

/// Byte length of the trailing digest.
pub const DIGEST_LEN: usize = 16;

/// Fixed bytes in front of a data packet's payload: kind(1) + seq(4) + len(2).
pub const DATA_HEADER_LEN: usize = 7;

/// Bytes of an ACK packet before its digest: kind(1) + ack(4).
const ACK_FIELDS_LEN: usize = 5;

/// Largest payload the `u16` length field can describe.
pub const MAX_PAYLOAD: usize = u16::MAX as usize;

/// Extra input mixed into the digest by [`Packet::encode_corrupted`].
const CORRUPTION_SALT: &[u8] = b"This Hash will corrupt packet.";

type Blake2b128 = Blake2b<U16>;

/// A protocol packet, without its digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    /// Application data carried under sequence number `seq` (≥ 1).
    Data { seq: u32, payload: Vec<u8> },
    /// Cumulative ACK: every data packet up to and including `n` arrived.
    Ack(u32),
    /// The peer is closing the connection.
    Close,
}

impl Packet {
    /// Serialise this packet and append the digest of its fields.
    pub fn encode(&self) -> Result<Vec<u8>, PacketError> {
        let mut buf = self.encode_fields()?;
        let digest = digest_of(&[&buf[..]]);
        buf.extend_from_slice(&digest);
        Ok(buf)
    }

    /// Serialise this packet with a digest that will not verify.
    ///
    /// The fields are written unchanged; only the digest is computed over a
    /// different input, which is what the peer sees when the datagram was
    /// damaged in flight.
    pub fn encode_corrupted(&self) -> Result<Vec<u8>, PacketError> {
        let mut buf = self.encode_fields()?;
        let digest = digest_of(&[&buf[..], CORRUPTION_SALT]);
        buf.extend_from_slice(&digest);
        Ok(buf)
    }

    /// Sequence number of a data packet, `None` for control packets.
    pub fn seq(&self) -> Option<u32> {
        match self {
            Packet::Data { seq, .. } => Some(*seq),
            _ => None,
        }
    }

    /// Serialise every field that precedes the digest.
    fn encode_fields(&self) -> Result<Vec<u8>, PacketError> {
        match self {
            Packet::Data { seq, payload } => {
                if payload.len() > MAX_PAYLOAD {
                    return Err(PacketError::PayloadTooLarge(payload.len()));
                }
                let mut buf = Vec::with_capacity(DATA_HEADER_LEN + payload.len() + DIGEST_LEN);
                buf.push(kind::DATA);
                buf.extend_from_slice(&seq.to_be_bytes());
                buf.extend_from_slice(&(payload.len() as u16).to_be_bytes());
                buf.extend_from_slice(payload);
                Ok(buf)
            }
            Packet::Ack(n) => {
                let mut buf = Vec::with_capacity(ACK_FIELDS_LEN + DIGEST_LEN);
                buf.push(kind::ACK);
                buf.extend_from_slice(&n.to_be_bytes());
                Ok(buf)
            }
            Packet::Close => {
                let mut buf = Vec::with_capacity(1 + DIGEST_LEN);
                buf.push(kind::CLOSE);
                Ok(buf)
            }
        }
    }
}

/// A decoded datagram: the packet fields plus the digest that travelled with
/// them.  The digest has not been checked yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub packet: Packet,
    pub digest: [u8; DIGEST_LEN],
}

impl Frame {
    /// Parse a [`Frame`] from a raw datagram.
    ///
    /// Returns [`Err`] only for structurally malformed input.  A frame whose
    /// digest is wrong decodes fine; call [`Frame::verify`] to find out.
    pub fn decode(buf: &[u8]) -> Result<Self, PacketError> {
        if buf.len() < 1 + DIGEST_LEN {
            return Err(PacketError::Truncated);
        }
        let (fields, digest_bytes) = buf.split_at(buf.len() - DIGEST_LEN);
        let mut digest = [0u8; DIGEST_LEN];
        digest.copy_from_slice(digest_bytes);

        let packet = match fields[0] {
            kind::DATA => {
                if fields.len() < DATA_HEADER_LEN {
                    return Err(PacketError::Truncated);
                }
                let seq = u32::from_be_bytes([fields[1], fields[2], fields[3], fields[4]]);
                let payload_len = u16::from_be_bytes([fields[5], fields[6]]) as usize;
                if fields.len() != DATA_HEADER_LEN + payload_len {
                    return Err(PacketError::LengthMismatch);
                }
                Packet::Data {
                    seq,
                    payload: fields[DATA_HEADER_LEN..].to_vec(),
                }
            }
            kind::ACK => {
                if fields.len() != ACK_FIELDS_LEN {
                    return Err(PacketError::LengthMismatch);
                }
                Packet::Ack(u32::from_be_bytes([fields[1], fields[2], fields[3], fields[4]]))
            }
            kind::CLOSE => {
                if fields.len() != 1 {
                    return Err(PacketError::LengthMismatch);
                }
                Packet::Close
            }
            other => return Err(PacketError::UnknownKind(other)),
        };

        Ok(Frame { packet, digest })
    }

    /// Recompute the digest over the packet fields and compare it with the
    /// one that arrived.  This is the only corruption check.
    pub fn verify(&self) -> bool {
        match self.packet.encode_fields() {
            Ok(fields) => digest_of(&[&fields[..]]) == self.digest,
            Err(_) => false,
        }
    }
}

/// Errors that can arise when encoding or parsing a datagram.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PacketError {
    #[error("datagram too short to hold a packet")]
    Truncated,
    #[error("unknown packet kind 0x{0:02x}")]
    UnknownKind(u8),
    #[error("packet length does not match its fields")]
    LengthMismatch,
    #[error("payload of {0} bytes exceeds the 65535-byte limit")]
    PayloadTooLarge(usize),
}

/// BLAKE2b-128 over the concatenation of `parts`.
fn digest_of(parts: &[&[u8]]) -> [u8; DIGEST_LEN] {
    let mut hasher = Blake2b128::new();
    for part in parts {
        hasher.update(part);
    }
    let mut out = [0u8; DIGEST_LEN];
    out.copy_from_slice(&hasher.finalize());
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(seq: u32, payload: &[u8]) -> Packet {
        Packet::Data {
            seq,
            payload: payload.to_vec(),
        }
    }

    #[test]
    fn data_packet_verifies_after_decode() {
        let pkt = data(3, b"hello");
        let frame = Frame::decode(&pkt.encode().unwrap()).unwrap();
        assert_eq!(frame.packet, pkt);
        assert!(frame.verify());
    }

    #[test]
    fn ack_and_close_verify_after_decode() {
        for pkt in [Packet::Ack(0), Packet::Ack(10), Packet::Close] {
            let frame = Frame::decode(&pkt.encode().unwrap()).unwrap();
            assert_eq!(frame.packet, pkt);
            assert!(frame.verify(), "{pkt:?} failed to verify");
        }
    }

    #[test]
    fn corrupted_encoding_keeps_fields_but_fails_verify() {
        let pkt = data(5, b"hello");
        let frame = Frame::decode(&pkt.encode_corrupted().unwrap()).unwrap();
        assert_eq!(frame.packet, pkt);
        assert!(!frame.verify());
    }

    #[test]
    fn every_single_bit_flip_is_detected() {
        let bytes = data(7, b"payload bytes").encode().unwrap();
        let fields_len = bytes.len() - DIGEST_LEN;
        for byte in 0..fields_len {
            for bit in 0..8 {
                let mut damaged = bytes.clone();
                damaged[byte] ^= 1 << bit;
                // A flip in kind/length is caught by decode, anything else by verify.
                if let Ok(frame) = Frame::decode(&damaged) {
                    assert!(!frame.verify(), "flip at byte {byte} bit {bit} went unnoticed");
                }
            }
        }
    }

    #[test]
    fn flip_in_digest_is_detected() {
        let mut bytes = Packet::Ack(4).encode().unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;
        assert!(!Frame::decode(&bytes).unwrap().verify());
    }

    #[test]
    fn close_is_distinct_from_every_ack() {
        let close = Packet::Close.encode().unwrap();
        assert_eq!(close[0], kind::CLOSE);
        assert_ne!(Packet::Ack(u32::MAX).encode().unwrap()[0], kind::CLOSE);
    }

    #[test]
    fn data_layout_is_big_endian() {
        let bytes = data(0x0102_0304, b"ab").encode().unwrap();
        assert_eq!(bytes[0], kind::DATA);
        assert_eq!(&bytes[1..5], &[0x01, 0x02, 0x03, 0x04]);
        assert_eq!(&bytes[5..7], &[0x00, 0x02]);
        assert_eq!(bytes.len(), DATA_HEADER_LEN + 2 + DIGEST_LEN);
    }

    #[test]
    fn empty_payload_roundtrip() {
        let pkt = data(1, b"");
        let frame = Frame::decode(&pkt.encode().unwrap()).unwrap();
        assert_eq!(frame.packet, pkt);
        assert!(frame.verify());
    }

    #[test]
    fn decode_empty_buffer_returns_error() {
        assert_eq!(Frame::decode(&[]), Err(PacketError::Truncated));
    }

    #[test]
    fn decode_truncated_payload_returns_error() {
        let mut bytes = data(1, b"data").encode().unwrap();
        bytes.remove(DATA_HEADER_LEN);
        assert_eq!(Frame::decode(&bytes), Err(PacketError::LengthMismatch));
    }

    #[test]
    fn decode_unknown_kind_returns_error() {
        let mut bytes = Packet::Close.encode().unwrap();
        bytes[0] = 0x7f;
        assert_eq!(Frame::decode(&bytes), Err(PacketError::UnknownKind(0x7f)));
    }

    #[test]
    fn oversized_payload_is_rejected() {
        let pkt = data(1, &vec![0u8; MAX_PAYLOAD + 1]);
        assert_eq!(pkt.encode(), Err(PacketError::PayloadTooLarge(MAX_PAYLOAD + 1)));
    }

    #[test]
    fn seq_is_only_defined_for_data() {
        assert_eq!(data(9, b"x").seq(), Some(9));
        assert_eq!(Packet::Ack(9).seq(), None);
        assert_eq!(Packet::Close.seq(), None);
    }
}
