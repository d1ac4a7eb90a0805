//! The unreliable datagram channel both endpoints talk through.
//!
//! [`Channel`] is the seam between the protocol and the network.  It carries
//! opaque byte payloads between two fixed addresses and reports a timed-out
//! receive as [`Recv::TimedOut`] instead of an error, so a lost packet, a
//! corrupted packet and a silent peer all look the same at this layer.
//!
//! Implementations:
//! - [`crate::socket::Socket`] — a real UDP socket.
//! - [`MemoryChannel`] — an in-process pair, used by tests.
//! - [`crate::simulator::Simulator`] — wraps another channel and injects
//!   loss and corruption.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::sync::mpsc;

/// Outcome of a timed receive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recv {
    /// A datagram and the address it came from.
    Datagram(Vec<u8>, SocketAddr),
    /// Nothing arrived within the wait.
    TimedOut,
}

/// Unreliable send/receive of opaque datagrams.
#[allow(async_fn_in_trait)]
pub trait Channel {
    /// Hand `bytes` to the network for delivery to `dest`.
    async fn send_to(&mut self, bytes: &[u8], dest: SocketAddr) -> io::Result<()>;

    /// Wait up to `wait` for the next datagram of at most `max_size` bytes.
    async fn recv_timeout(&mut self, max_size: usize, wait: Duration) -> io::Result<Recv>;
}

/// One end of an in-process datagram link.
///
/// Whatever one end sends, the other end receives, in order and intact; wrap
/// it in a [`crate::simulator::Simulator`] to make it lossy.  The `dest`
/// address passed to [`Channel::send_to`] is ignored.
#[derive(Debug)]
pub struct MemoryChannel {
    local_addr: SocketAddr,
    tx: mpsc::UnboundedSender<(Vec<u8>, SocketAddr)>,
    rx: mpsc::UnboundedReceiver<(Vec<u8>, SocketAddr)>,
}

impl MemoryChannel {
    /// Create two connected ends, claiming addresses `a` and `b`.
    pub fn pair(a: SocketAddr, b: SocketAddr) -> (Self, Self) {
        let (a_tx, b_rx) = mpsc::unbounded_channel();
        let (b_tx, a_rx) = mpsc::unbounded_channel();
        (
            Self {
                local_addr: a,
                tx: a_tx,
                rx: a_rx,
            },
            Self {
                local_addr: b,
                tx: b_tx,
                rx: b_rx,
            },
        )
    }
}

impl Channel for MemoryChannel {
    async fn send_to(&mut self, bytes: &[u8], _dest: SocketAddr) -> io::Result<()> {
        // Like UDP, sending to a peer that has gone away silently succeeds.
        let _ = self.tx.send((bytes.to_vec(), self.local_addr));
        Ok(())
    }

    async fn recv_timeout(&mut self, max_size: usize, wait: Duration) -> io::Result<Recv> {
        match tokio::time::timeout(wait, self.rx.recv()).await {
            Ok(Some((mut bytes, from))) => {
                bytes.truncate(max_size);
                Ok(Recv::Datagram(bytes, from))
            }
            Ok(None) => {
                // Peer dropped: nothing will ever arrive, so just wait out the timeout.
                tokio::time::sleep(wait).await;
                Ok(Recv::TimedOut)
            }
            Err(_elapsed) => Ok(Recv::TimedOut),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addrs() -> (SocketAddr, SocketAddr) {
        (
            "127.0.0.1:1000".parse().unwrap(),
            "127.0.0.1:2000".parse().unwrap(),
        )
    }

    #[tokio::test]
    async fn datagram_reaches_other_end_with_source() {
        let (a, b) = addrs();
        let (mut left, mut right) = MemoryChannel::pair(a, b);

        left.send_to(b"ping", b).await.unwrap();
        let got = right.recv_timeout(64, Duration::from_secs(1)).await.unwrap();
        assert_eq!(got, Recv::Datagram(b"ping".to_vec(), a));
    }

    #[tokio::test(start_paused = true)]
    async fn empty_link_times_out() {
        let (a, b) = addrs();
        let (_left, mut right) = MemoryChannel::pair(a, b);
        let got = right.recv_timeout(64, Duration::from_secs(5)).await.unwrap();
        assert_eq!(got, Recv::TimedOut);
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_peer_times_out_after_full_wait() {
        let (a, b) = addrs();
        let (left, mut right) = MemoryChannel::pair(a, b);
        drop(left);

        let start = tokio::time::Instant::now();
        let got = right.recv_timeout(64, Duration::from_secs(5)).await.unwrap();
        assert_eq!(got, Recv::TimedOut);
        assert!(start.elapsed() >= Duration::from_secs(5));
    }

    #[tokio::test]
    async fn oversized_datagram_is_truncated() {
        let (a, b) = addrs();
        let (mut left, mut right) = MemoryChannel::pair(a, b);
        left.send_to(&[7u8; 32], b).await.unwrap();
        match right.recv_timeout(8, Duration::from_secs(1)).await.unwrap() {
            Recv::Datagram(bytes, _) => assert_eq!(bytes.len(), 8),
            Recv::TimedOut => panic!("expected a datagram"),
        }
    }
}
