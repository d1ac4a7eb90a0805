//! Fault-injecting channel for exercising the protocol.
//!
//! Real networks drop, reorder, duplicate and damage datagrams.  To exercise
//! the reliability mechanisms without depending on actual network
//! conditions, [`Simulator`] wraps another [`Channel`] and applies a seeded
//! fault model to every outbound datagram:
//!
//! | Fault       | Description                                              |
//! |-------------|----------------------------------------------------------|
//! | Loss        | Drop the datagram with probability `loss_rate`.          |
//! | Corruption  | Flip one random bit with probability `corrupt_rate`.     |
//! | Duplication | Deliver the datagram twice with `duplicate_rate`.        |
//! | Reordering  | Hold the datagram back until after the next one.         |
//!
//! `max_faults` caps the total number of injected faults, which turns the
//! random process into the bounded-loss model the protocol guarantees
//! delivery under.  Inbound traffic passes through untouched.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::channel::{Channel, Recv};

/// Configuration for the fault-injection model.
///
/// All probabilities are in the range `[0.0, 1.0]`.
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    pub loss_rate: f64,
    pub corrupt_rate: f64,
    pub duplicate_rate: f64,
    pub reorder_rate: f64,
    /// Stop injecting faults after this many (`None` = never stop).
    pub max_faults: Option<usize>,
    /// Seed for the RNG so runs are reproducible.
    pub seed: u64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        // No faults: a transparent pass-through.
        Self {
            loss_rate: 0.0,
            corrupt_rate: 0.0,
            duplicate_rate: 0.0,
            reorder_rate: 0.0,
            max_faults: None,
            seed: 0,
        }
    }
}

/// Counters for the faults actually injected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FaultStats {
    pub dropped: usize,
    pub corrupted: usize,
    pub duplicated: usize,
    pub reordered: usize,
}

impl FaultStats {
    pub fn total(&self) -> usize {
        self.dropped + self.corrupted + self.duplicated + self.reordered
    }
}

/// A fault-injecting wrapper around another channel.
pub struct Simulator<C> {
    inner: C,
    config: SimulatorConfig,
    rng: StdRng,
    held: Option<(Vec<u8>, SocketAddr)>,
    stats: FaultStats,
}

impl<C: Channel> Simulator<C> {
    pub fn new(inner: C, config: SimulatorConfig) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        Self {
            inner,
            config,
            rng,
            held: None,
            stats: FaultStats::default(),
        }
    }

    pub fn stats(&self) -> FaultStats {
        self.stats
    }

    fn budget_left(&self) -> bool {
        self.config
            .max_faults
            .map_or(true, |max| self.stats.total() < max)
    }

    /// Roll the dice for one fault kind, respecting the fault budget.
    fn roll(&mut self, rate: f64) -> bool {
        rate > 0.0 && self.budget_left() && self.rng.random::<f64>() < rate
    }
}

impl<C: Channel> Channel for Simulator<C> {
    async fn send_to(&mut self, bytes: &[u8], dest: SocketAddr) -> io::Result<()> {
        if self.roll(self.config.loss_rate) {
            self.stats.dropped += 1;
            log::debug!("[sim] dropped {} byte datagram", bytes.len());
            return self.flush_held().await;
        }

        let mut bytes = bytes.to_vec();
        if !bytes.is_empty() && self.roll(self.config.corrupt_rate) {
            let byte = self.rng.random_range(0..bytes.len());
            let bit = self.rng.random_range(0..8u8);
            bytes[byte] ^= 1 << bit;
            self.stats.corrupted += 1;
            log::debug!("[sim] flipped bit {bit} of byte {byte}");
        }

        if self.held.is_none() && self.roll(self.config.reorder_rate) {
            self.stats.reordered += 1;
            log::debug!("[sim] holding datagram back for reordering");
            self.held = Some((bytes, dest));
            return Ok(());
        }

        self.inner.send_to(&bytes, dest).await?;
        if self.roll(self.config.duplicate_rate) {
            self.stats.duplicated += 1;
            log::debug!("[sim] duplicating datagram");
            self.inner.send_to(&bytes, dest).await?;
        }
        self.flush_held().await
    }

    async fn recv_timeout(&mut self, max_size: usize, wait: Duration) -> io::Result<Recv> {
        self.inner.recv_timeout(max_size, wait).await
    }
}

impl<C: Channel> Simulator<C> {
    async fn flush_held(&mut self) -> io::Result<()> {
        if let Some((bytes, dest)) = self.held.take() {
            self.inner.send_to(&bytes, dest).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::MemoryChannel;

    fn link(config: SimulatorConfig) -> (Simulator<MemoryChannel>, MemoryChannel, SocketAddr) {
        let a: SocketAddr = "127.0.0.1:1000".parse().unwrap();
        let b: SocketAddr = "127.0.0.1:2000".parse().unwrap();
        let (left, right) = MemoryChannel::pair(a, b);
        (Simulator::new(left, config), right, b)
    }

    async fn drain(rx: &mut MemoryChannel) -> Vec<Vec<u8>> {
        let mut out = Vec::new();
        while let Recv::Datagram(bytes, _) = rx
            .recv_timeout(4096, Duration::from_millis(1))
            .await
            .unwrap()
        {
            out.push(bytes);
        }
        out
    }

    #[tokio::test]
    async fn default_config_is_transparent() {
        let (mut sim, mut rx, dest) = link(SimulatorConfig::default());
        for i in 0..20u8 {
            sim.send_to(&[i], dest).await.unwrap();
        }
        let got = drain(&mut rx).await;
        assert_eq!(got, (0..20u8).map(|i| vec![i]).collect::<Vec<_>>());
        assert_eq!(sim.stats(), FaultStats::default());
    }

    #[tokio::test]
    async fn full_loss_drops_everything() {
        let (mut sim, mut rx, dest) = link(SimulatorConfig {
            loss_rate: 1.0,
            ..Default::default()
        });
        for _ in 0..5 {
            sim.send_to(b"x", dest).await.unwrap();
        }
        assert!(drain(&mut rx).await.is_empty());
        assert_eq!(sim.stats().dropped, 5);
    }

    #[tokio::test]
    async fn fault_budget_bounds_loss() {
        let (mut sim, mut rx, dest) = link(SimulatorConfig {
            loss_rate: 1.0,
            max_faults: Some(3),
            ..Default::default()
        });
        for _ in 0..10 {
            sim.send_to(b"x", dest).await.unwrap();
        }
        assert_eq!(drain(&mut rx).await.len(), 7);
        assert_eq!(sim.stats().dropped, 3);
    }

    #[tokio::test]
    async fn corruption_flips_exactly_one_bit() {
        let (mut sim, mut rx, dest) = link(SimulatorConfig {
            corrupt_rate: 1.0,
            seed: 42,
            ..Default::default()
        });
        let original = vec![0u8; 16];
        sim.send_to(&original, dest).await.unwrap();
        let got = drain(&mut rx).await;
        assert_eq!(got.len(), 1);
        let flipped: u32 = got[0].iter().map(|b| b.count_ones()).sum();
        assert_eq!(flipped, 1);
    }

    #[tokio::test]
    async fn reordering_swaps_adjacent_datagrams() {
        let (mut sim, mut rx, dest) = link(SimulatorConfig {
            reorder_rate: 1.0,
            max_faults: Some(1),
            ..Default::default()
        });
        sim.send_to(b"first", dest).await.unwrap();
        sim.send_to(b"second", dest).await.unwrap();
        let got = drain(&mut rx).await;
        assert_eq!(got, vec![b"second".to_vec(), b"first".to_vec()]);
    }

    #[tokio::test]
    async fn duplication_delivers_twice() {
        let (mut sim, mut rx, dest) = link(SimulatorConfig {
            duplicate_rate: 1.0,
            max_faults: Some(1),
            ..Default::default()
        });
        sim.send_to(b"dup", dest).await.unwrap();
        assert_eq!(drain(&mut rx).await, vec![b"dup".to_vec(), b"dup".to_vec()]);
    }

    #[tokio::test]
    async fn same_seed_same_faults() {
        let config = SimulatorConfig {
            loss_rate: 0.5,
            seed: 7,
            ..Default::default()
        };
        let (mut s1, mut r1, d1) = link(config.clone());
        let (mut s2, mut r2, d2) = link(config);
        for i in 0..50u8 {
            s1.send_to(&[i], d1).await.unwrap();
            s2.send_to(&[i], d2).await.unwrap();
        }
        assert_eq!(drain(&mut r1).await, drain(&mut r2).await);
    }
}
