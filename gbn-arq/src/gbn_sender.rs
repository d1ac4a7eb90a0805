//! Go-Back-N send-side state machine.
//!
//! [`GbnSender`] maintains a sliding window of up to `window_size` in-flight
//! data packets.
//!
//! # Protocol contract
//!
//! - Sequence numbers run `1..=total`; `total` is the number of payloads the
//!   caller intends to send.
//! - At most `window_size` packets may be in flight at once:
//!   `base ≤ next_seq ≤ base + window_size` always holds.
//! - ACKs are **cumulative**: `Ack(k)` means the receiver has accepted every
//!   packet with sequence number ≤ `k`.
//! - On timeout, the caller retransmits **all** packets from `base` onwards
//!   (go back N).
//!
//! This module only manages state; all channel I/O is the caller's
//! responsibility.

use std::collections::VecDeque;

use crate::packet::Packet;

// ---------------------------------------------------------------------------
// GbnEntry
// ---------------------------------------------------------------------------

/// A single in-flight packet occupying one slot in the retransmit window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GbnEntry {
    pub seq: u32,
    /// The packet exactly as it must be retransmitted.
    pub packet: Packet,
    /// Total number of times this packet has been transmitted.
    pub tx_count: u32,
}

/// Why [`GbnSender::submit`] refused a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejected {
    /// `window_size` packets are already unacknowledged.
    WindowFull,
    /// All `total` sequence numbers have been used.
    Exhausted,
    /// The connection is closed; only the endpoint reports this.
    Closed,
    /// The encoded packet would not fit in the peer's receive buffer; only
    /// the endpoint reports this.
    PayloadTooLarge,
}

/// Effect of an ACK on the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckOutcome {
    /// The window slid past this many packets.
    Slid(usize),
    /// ACK below `base`: already covered, nothing changes.
    Stale,
    /// ACK for a sequence number that was never sent; ignored.
    Unsent,
}

// ---------------------------------------------------------------------------
// GbnSender
// ---------------------------------------------------------------------------

/// Go-Back-N send-side state for one connection.
///
/// # Sequence-number layout
///
/// ```text
///    base             next_seq        base + window_size
///      │                  │                  │
///  ────┼──────────────────┼──────────────────┼────▶ seq space
///      │ <── in flight ──▶│ <── sendable ───▶│
/// ```
#[derive(Debug)]
pub struct GbnSender {
    /// Sequence number of the **oldest** unacked packet (left window edge).
    pub base: u32,

    /// Sequence number to use for the **next** new packet.
    pub next_seq: u32,

    /// Maximum number of packets that may be in flight simultaneously (N).
    window_size: usize,

    /// Highest sequence number that will ever be used.
    total: u32,

    /// In-flight packets ordered by sequence number (front = oldest).
    window: VecDeque<GbnEntry>,
}

impl GbnSender {
    /// Create a sender for `total` payloads with a window of `window_size`.
    pub fn new(total: u32, window_size: usize) -> Self {
        assert!(window_size >= 1, "window_size must be at least 1");
        Self {
            base: 1,
            next_seq: 1,
            window_size,
            total,
            window: VecDeque::with_capacity(window_size),
        }
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn total(&self) -> u32 {
        self.total
    }

    /// `Some(reason)` when the next [`submit`](Self::submit) would be refused.
    pub fn rejection(&self) -> Option<Rejected> {
        if self.next_seq > self.total {
            Some(Rejected::Exhausted)
        } else if self.window.len() >= self.window_size {
            Some(Rejected::WindowFull)
        } else {
            None
        }
    }

    /// `true` when there is room for one more packet and sequence numbers left.
    pub fn can_send(&self) -> bool {
        self.rejection().is_none()
    }

    /// Number of packets currently awaiting acknowledgement.
    pub fn in_flight(&self) -> usize {
        self.window.len()
    }

    pub fn has_unacked(&self) -> bool {
        !self.window.is_empty()
    }

    /// `true` once every sequence number up to `total` has been acknowledged.
    pub fn is_complete(&self) -> bool {
        self.base > self.total
    }

    /// End the sequence space at the last submitted packet.
    ///
    /// Used when the caller runs out of payloads before `total`.
    pub fn seal(&mut self) {
        self.total = self.total.min(self.next_seq - 1);
    }

    /// Place a new data packet into the window and advance `next_seq`.
    ///
    /// Returns the packet to transmit.  The window keeps its own copy for
    /// retransmission.
    pub fn submit(&mut self, payload: Vec<u8>) -> Result<Packet, Rejected> {
        if let Some(reason) = self.rejection() {
            return Err(reason);
        }
        let seq = self.next_seq;
        let packet = Packet::Data { seq, payload };
        self.window.push_back(GbnEntry {
            seq,
            packet: packet.clone(),
            tx_count: 1,
        });
        self.next_seq += 1;
        Ok(packet)
    }

    /// Process a cumulative ACK.
    ///
    /// Removes every window entry with a sequence number ≤ `ack_num` and sets
    /// `base = ack_num + 1`.  A repeated or stale ACK changes nothing, so the
    /// same value can never slide the window twice.
    pub fn on_ack(&mut self, ack_num: u32) -> AckOutcome {
        if ack_num < self.base {
            return AckOutcome::Stale;
        }
        if ack_num >= self.next_seq {
            return AckOutcome::Unsent;
        }

        let mut acked = 0usize;
        while let Some(front) = self.window.front() {
            if front.seq > ack_num {
                break;
            }
            self.window.pop_front();
            acked += 1;
        }
        self.base = ack_num + 1;
        AckOutcome::Slid(acked)
    }

    /// Iterate over all in-flight packets from oldest to newest.
    pub fn window_entries(&self) -> impl Iterator<Item = &GbnEntry> {
        self.window.iter()
    }

    /// Copy of the window contents for a Go-Back-N retransmission.
    ///
    /// Taken as a snapshot so the caller can send without holding a borrow.
    pub fn retransmit_snapshot(&self) -> Vec<Packet> {
        self.window.iter().map(|e| e.packet.clone()).collect()
    }

    /// Increment the transmission count of every in-flight packet.
    ///
    /// Call this immediately after retransmitting the entire window.
    pub fn on_retransmit(&mut self) {
        for entry in self.window.iter_mut() {
            entry.tx_count += 1;
        }
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
