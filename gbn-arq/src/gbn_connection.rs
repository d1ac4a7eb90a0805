//! Go-Back-N endpoints: the send loop and the receive loop.
//!
//! # Architecture
//!
//! ```text
//!  Application
//!      │ payloads                          delivered payloads ▲
//!      ▼                                                      │
//!  Sender ──────────── data packets ─────────────▶ Receiver
//!    ├── GbnSender      (window, base, next_seq)     ├── GbnReceiver (expected_seq)
//!    ├── RetransmitTimer                             └── IdleClock
//!    ├── IdleClock
//!    └── C: Channel   ◀───── ACKs / close ─────────── C: Channel
//! ```
//!
//! Each endpoint is a single loop on one task.  An iteration fills the
//! window (sender only), then blocks on the channel until the nearest
//! deadline, then checks its timers.  A timeout is a [`Recv::TimedOut`]
//! value, so timer handling and window mutation never interleave.

use std::net::SocketAddr;

use tokio::time::Instant;

use crate::channel::{Channel, Recv};
use crate::config::ArqConfig;
use crate::error::{ArqError, Result};
use crate::gbn_receiver::{Discard, GbnReceiver, Verdict};
use crate::gbn_sender::{AckOutcome, GbnSender, Rejected};
use crate::packet::{Frame, Packet};
use crate::state::{ReceiverState, SenderState, TerminationReason};
use crate::timer::{self, IdleClock, RetransmitTimer};

// ---------------------------------------------------------------------------
// Sender
// ---------------------------------------------------------------------------

/// Result of [`Sender::submit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    /// Sent under this sequence number.
    Accepted(u32),
    /// Not sent; the caller has to wait (or stop).
    Rejected(Rejected),
}

/// Send-side counters, logged when the loop ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SenderStats {
    /// Data packets put on the channel, first transmissions and retransmissions.
    pub packets_sent: u64,
    pub retransmissions: u64,
    pub timeouts: u64,
    pub acks_received: u64,
    pub duplicate_acks: u64,
    /// Inbound datagrams dropped for a bad digest or malformed layout.
    pub dropped_inbound: u64,
}

/// The sending endpoint of one Go-Back-N connection.
pub struct Sender<C> {
    channel: C,
    peer: SocketAddr,
    config: ArqConfig,
    gbn: GbnSender,
    state: SenderState,
    timer: RetransmitTimer,
    idle: IdleClock,
    close_attempts: u32,
    outcome: Option<TerminationReason>,
    stats: SenderStats,
}

impl<C: Channel> Sender<C> {
    /// Create a sender that will deliver `total` payloads to `peer`.
    pub fn new(channel: C, peer: SocketAddr, total: u32, config: ArqConfig) -> Self {
        let gbn = GbnSender::new(total, config.window_size);
        let timer = RetransmitTimer::new(config.timers.retransmit_after);
        Self {
            channel,
            peer,
            config,
            gbn,
            state: SenderState::Idle,
            timer,
            idle: IdleClock::new(Instant::now()),
            close_attempts: 0,
            outcome: None,
            stats: SenderStats::default(),
        }
    }

    pub fn state(&self) -> SenderState {
        self.state
    }

    pub fn base(&self) -> u32 {
        self.gbn.base
    }

    pub fn next_seq(&self) -> u32 {
        self.gbn.next_seq
    }

    pub fn in_flight(&self) -> usize {
        self.gbn.in_flight()
    }

    pub fn stats(&self) -> SenderStats {
        self.stats
    }

    /// Send one payload if the window has room.
    ///
    /// A full window, an exhausted sequence space or a payload larger than
    /// [`ArqConfig::max_payload`] is reported as [`Submission::Rejected`] and
    /// changes nothing.
    pub async fn submit(&mut self, payload: Vec<u8>) -> Result<Submission> {
        if matches!(self.state, SenderState::Closing | SenderState::Closed) {
            return Ok(Submission::Rejected(Rejected::Closed));
        }
        if payload.len() > self.config.max_payload() {
            return Ok(Submission::Rejected(Rejected::PayloadTooLarge));
        }
        let was_empty = !self.gbn.has_unacked();
        let packet = match self.gbn.submit(payload) {
            Ok(packet) => packet,
            Err(reason) => return Ok(Submission::Rejected(reason)),
        };
        let seq = self.gbn.next_seq - 1;

        let bytes = if self.config.corrupt_first.contains(&seq) {
            log::debug!("[gbn:send] → DATA seq={seq} (corrupted on purpose)");
            packet.encode_corrupted()?
        } else {
            log::debug!("[gbn:send] → DATA seq={seq}");
            packet.encode()?
        };
        self.channel.send_to(&bytes, self.peer).await?;
        self.stats.packets_sent += 1;

        if was_empty {
            self.timer.start(Instant::now());
        }
        self.state = SenderState::Sending;
        Ok(Submission::Accepted(seq))
    }

    /// Drive the connection until it closes.
    ///
    /// Payloads are pulled from `payloads` whenever the window has room.  If
    /// the iterator ends before `total` payloads were sent, the transfer
    /// ends at the last one.  A payload over [`ArqConfig::max_payload`]
    /// ends the run with [`ArqError::PayloadTooLarge`].
    pub async fn run<I>(&mut self, payloads: I) -> Result<TerminationReason>
    where
        I: IntoIterator<Item = Vec<u8>>,
    {
        let mut payloads = payloads.into_iter();
        log::info!(
            "[gbn:send] sending {} packet(s) to {} (window {})",
            self.gbn.total(),
            self.peer,
            self.gbn.window_size()
        );

        loop {
            if let Some(reason) = self.outcome {
                log::info!("[gbn:send] connection closed: {reason} ({:?})", self.stats);
                return Ok(reason);
            }

            if self.state != SenderState::Closing {
                while self.gbn.can_send() {
                    match payloads.next() {
                        Some(payload) => {
                            let len = payload.len();
                            if let Submission::Rejected(Rejected::PayloadTooLarge) =
                                self.submit(payload).await?
                            {
                                let max = self.config.max_payload();
                                log::error!("[gbn:send] {len} byte payload exceeds {max} bytes");
                                return Err(ArqError::PayloadTooLarge { len, max });
                            }
                        }
                        None => {
                            self.gbn.seal();
                            break;
                        }
                    }
                }
                if self.gbn.is_complete() {
                    self.begin_close().await?;
                }
            }

            let wait = timer::until(self.next_deadline(), Instant::now());
            match self
                .channel
                .recv_timeout(self.config.max_datagram, wait)
                .await?
            {
                Recv::Datagram(bytes, from) => self.on_datagram(&bytes, from).await?,
                Recv::TimedOut => {}
            }
            self.check_timers().await?;
        }
    }

    /// Handle one inbound datagram: verify it, then act on ACK or close.
    ///
    /// Datagrams from other addresses, malformed datagrams and digest
    /// failures are dropped without any other effect.
    pub async fn on_datagram(&mut self, bytes: &[u8], from: SocketAddr) -> Result<()> {
        if from != self.peer {
            log::debug!("[gbn:send] ignoring datagram from stranger {from}");
            return Ok(());
        }
        let frame = match Frame::decode(bytes) {
            Ok(frame) if frame.verify() => frame,
            Ok(_) => {
                self.stats.dropped_inbound += 1;
                log::debug!("[gbn:send] ← corrupt datagram dropped");
                return Ok(());
            }
            Err(e) => {
                self.stats.dropped_inbound += 1;
                log::debug!("[gbn:send] ← malformed datagram dropped: {e}");
                return Ok(());
            }
        };
        self.idle.touch(Instant::now());

        match frame.packet {
            Packet::Ack(n) => self.on_ack(n).await,
            Packet::Close => {
                let reason = if self.state == SenderState::Closing {
                    log::info!("[gbn:send] ← CLOSE echo");
                    TerminationReason::Completed
                } else {
                    log::info!("[gbn:send] ← CLOSE from receiver");
                    TerminationReason::ClosedByPeer
                };
                self.finish(reason);
                Ok(())
            }
            Packet::Data { seq, .. } => {
                log::debug!("[gbn:send] ignoring data packet seq={seq}");
                Ok(())
            }
        }
    }

    /// Apply a verified cumulative ACK.
    pub async fn on_ack(&mut self, ack_num: u32) -> Result<()> {
        if self.state != SenderState::Sending && self.state != SenderState::Idle {
            return Ok(());
        }
        self.stats.acks_received += 1;
        match self.gbn.on_ack(ack_num) {
            AckOutcome::Slid(n) => {
                log::debug!(
                    "[gbn:send] ← ACK {ack_num} (slid {n}, base={}, next_seq={})",
                    self.gbn.base,
                    self.gbn.next_seq
                );
                if self.gbn.has_unacked() {
                    self.timer.restart(Instant::now());
                } else {
                    self.timer.stop();
                    self.state = SenderState::Idle;
                }
                if self.gbn.is_complete() {
                    self.begin_close().await?;
                }
            }
            AckOutcome::Stale => {
                self.stats.duplicate_acks += 1;
                log::debug!("[gbn:send] ← duplicate ACK {ack_num} (base={})", self.gbn.base);
            }
            AckOutcome::Unsent => {
                log::warn!(
                    "[gbn:send] ← ACK {ack_num} for unsent data (next_seq={})",
                    self.gbn.next_seq
                );
            }
        }
        Ok(())
    }

    /// Go-Back-N step: retransmit every packet in the window, then restart
    /// the timer.
    pub async fn on_timeout(&mut self) -> Result<()> {
        self.stats.timeouts += 1;
        let snapshot = self.gbn.retransmit_snapshot();
        if let (Some(first), Some(last)) = (snapshot.first(), snapshot.last()) {
            log::warn!(
                "[gbn:send] no ACK for {}; resending {} through {}",
                self.gbn.base,
                first.seq().unwrap_or_default(),
                last.seq().unwrap_or_default()
            );
        }
        for packet in &snapshot {
            self.channel.send_to(&packet.encode()?, self.peer).await?;
        }
        self.stats.packets_sent += snapshot.len() as u64;
        self.stats.retransmissions += snapshot.len() as u64;
        self.gbn.on_retransmit();
        self.timer.restart(Instant::now());
        Ok(())
    }

    fn next_deadline(&self) -> Instant {
        let abort = self.idle.deadline(self.config.timers.sender_abort_after);
        match self.timer.deadline() {
            Some(rto) if self.state == SenderState::Closing => rto,
            Some(rto) => rto.min(abort),
            None => abort,
        }
    }

    async fn check_timers(&mut self) -> Result<()> {
        if self.outcome.is_some() {
            return Ok(());
        }
        let now = Instant::now();
        // While closing, the close retries bound the wait instead.
        if self.state != SenderState::Closing
            && self
                .idle
                .exceeded(self.config.timers.sender_abort_after, now)
        {
            log::warn!(
                "[gbn:send] receiver is not responding; giving up at base={} next_seq={}",
                self.gbn.base,
                self.gbn.next_seq
            );
            self.finish(TerminationReason::PeerUnresponsive);
            return Ok(());
        }
        if !self.timer.expired(now) {
            return Ok(());
        }
        if self.state == SenderState::Closing {
            if self.close_attempts < self.config.close_retries {
                self.close_attempts += 1;
                log::debug!("[gbn:send] → CLOSE (retry {})", self.close_attempts);
                self.channel
                    .send_to(&Packet::Close.encode()?, self.peer)
                    .await?;
                self.timer.restart(now);
            } else {
                log::warn!("[gbn:send] close was never echoed; closing anyway");
                self.finish(TerminationReason::Completed);
            }
            return Ok(());
        }
        self.on_timeout().await
    }

    async fn begin_close(&mut self) -> Result<()> {
        if self.state == SenderState::Closing || self.outcome.is_some() {
            return Ok(());
        }
        log::info!("[gbn:send] all packets acknowledged; → CLOSE");
        self.channel
            .send_to(&Packet::Close.encode()?, self.peer)
            .await?;
        self.state = SenderState::Closing;
        self.close_attempts = 0;
        self.timer.restart(Instant::now());
        Ok(())
    }

    fn finish(&mut self, reason: TerminationReason) {
        self.timer.stop();
        self.state = SenderState::Closed;
        self.outcome = Some(reason);
    }
}

// ---------------------------------------------------------------------------
// Receiver
// ---------------------------------------------------------------------------

/// Receive-side counters, logged when the loop ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReceiverStats {
    pub accepted: u64,
    pub duplicate_acks_sent: u64,
    pub corrupt_dropped: u64,
    pub malformed_dropped: u64,
}

/// The receiving endpoint of one Go-Back-N connection.
pub struct Receiver<C> {
    channel: C,
    config: ArqConfig,
    gbn: GbnReceiver,
    peer: Option<SocketAddr>,
    idle: IdleClock,
    stats: ReceiverStats,
}

impl<C: Channel> Receiver<C> {
    /// Create a receiver that adopts the first verified sender as its peer.
    pub fn new(channel: C, config: ArqConfig) -> Self {
        Self {
            channel,
            config,
            gbn: GbnReceiver::new(),
            peer: None,
            idle: IdleClock::new(Instant::now()),
            stats: ReceiverStats::default(),
        }
    }

    /// Only accept traffic from `peer`.
    pub fn with_peer(mut self, peer: SocketAddr) -> Self {
        self.peer = Some(peer);
        self
    }

    pub fn state(&self) -> ReceiverState {
        self.gbn.state()
    }

    pub fn expected_seq(&self) -> u32 {
        self.gbn.expected_seq()
    }

    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    pub fn stats(&self) -> ReceiverStats {
        self.stats
    }

    /// Receive until the peer closes or an idle threshold passes, then hand
    /// back every payload delivered in order.
    pub async fn run(&mut self) -> Result<(Vec<Vec<u8>>, TerminationReason)> {
        let reason = self.receive_loop().await?;
        log::info!(
            "[gbn:recv] connection closed: {reason}; {} payload(s) delivered ({:?})",
            self.gbn.delivered().len(),
            self.stats
        );
        Ok((self.gbn.take_delivered(), reason))
    }

    async fn receive_loop(&mut self) -> Result<TerminationReason> {
        loop {
            let now = Instant::now();
            let timers = &self.config.timers;
            match self.peer {
                Some(peer) if self.idle.exceeded(timers.receiver_close_after, now) => {
                    log::warn!("[gbn:recv] nothing heard for {:?}; → CLOSE", timers.receiver_close_after);
                    self.channel
                        .send_to(&Packet::Close.encode()?, peer)
                        .await?;
                    self.gbn.close();
                    return Ok(TerminationReason::IdleTimeout);
                }
                None if self.idle.exceeded(timers.receiver_abandon_after, now) => {
                    log::warn!("[gbn:recv] no sender ever showed up; giving up");
                    self.gbn.close();
                    return Ok(TerminationReason::PeerUnresponsive);
                }
                _ => {}
            }

            let threshold = match self.peer {
                Some(_) => timers.receiver_close_after,
                None => timers.receiver_abandon_after,
            };
            let wait = timer::until(self.idle.deadline(threshold), now);
            let (bytes, from) = match self
                .channel
                .recv_timeout(self.config.max_datagram, wait)
                .await?
            {
                Recv::Datagram(bytes, from) => (bytes, from),
                Recv::TimedOut => continue,
            };
            if self.peer.is_some_and(|peer| peer != from) {
                log::debug!("[gbn:recv] ignoring datagram from stranger {from}");
                continue;
            }

            match self.gbn.on_datagram(&bytes) {
                Verdict::Accepted { seq, ack } => {
                    self.heard_from(from);
                    self.stats.accepted += 1;
                    log::debug!("[gbn:recv] ← DATA seq={seq} ({} bytes); → ACK {seq}", bytes.len());
                    self.channel.send_to(&ack.encode()?, from).await?;
                }
                Verdict::OutOfOrder { seq, ack } => {
                    self.heard_from(from);
                    self.stats.duplicate_acks_sent += 1;
                    log::debug!(
                        "[gbn:recv] ← DATA seq={seq}, expected {}; → ACK {}",
                        self.gbn.expected_seq(),
                        self.gbn.ack_number()
                    );
                    self.channel.send_to(&ack.encode()?, from).await?;
                }
                Verdict::CloseRequested => {
                    self.heard_from(from);
                    log::info!("[gbn:recv] ← CLOSE; → CLOSE");
                    self.channel
                        .send_to(&Packet::Close.encode()?, from)
                        .await?;
                    return Ok(TerminationReason::ClosedByPeer);
                }
                Verdict::Discarded(Discard::Corrupt) => {
                    self.stats.corrupt_dropped += 1;
                    log::debug!("[gbn:recv] ← invalid digest, dropped");
                }
                Verdict::Discarded(Discard::Malformed(e)) => {
                    self.stats.malformed_dropped += 1;
                    log::debug!("[gbn:recv] ← malformed datagram dropped: {e}");
                }
                Verdict::Discarded(Discard::UnexpectedAck(n)) => {
                    self.heard_from(from);
                    log::debug!("[gbn:recv] ignoring ACK {n}");
                }
                Verdict::Discarded(Discard::Closed) => {
                    return Ok(TerminationReason::ClosedByPeer);
                }
            }
        }
    }

    fn heard_from(&mut self, from: SocketAddr) {
        if self.peer.is_none() {
            log::info!("[gbn:recv] sender is {from}");
            self.peer = Some(from);
        }
        self.idle.touch(Instant::now());
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
