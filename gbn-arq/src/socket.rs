//! Async UDP socket channel.
//!
//! [`Socket`] is a thin wrapper around `tokio::net::UdpSocket` that
//! implements [`Channel`].  All protocol logic lives elsewhere; this module
//! owns only byte I/O.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::time::Instant;

use crate::channel::{Channel, Recv};

/// A UDP socket speaking raw datagrams.
#[derive(Debug)]
pub struct Socket {
    /// Address this socket is bound to (filled in after OS assigns ephemeral port).
    pub local_addr: SocketAddr,
    inner: UdpSocket,
}

impl Socket {
    /// Bind a new socket to `local_addr`.
    ///
    /// Passing `127.0.0.1:0` lets the OS choose an ephemeral port.
    pub async fn bind(local_addr: SocketAddr) -> io::Result<Self> {
        let inner = UdpSocket::bind(local_addr).await?;
        let local_addr = inner.local_addr()?;
        Ok(Self { local_addr, inner })
    }
}

impl Channel for Socket {
    async fn send_to(&mut self, bytes: &[u8], dest: SocketAddr) -> io::Result<()> {
        self.inner.send_to(bytes, dest).await?;
        Ok(())
    }

    async fn recv_timeout(&mut self, max_size: usize, wait: Duration) -> io::Result<Recv> {
        let deadline = Instant::now() + wait;
        let mut buf = vec![0u8; max_size];
        loop {
            match tokio::time::timeout_at(deadline, self.inner.recv_from(&mut buf)).await {
                Ok(Ok((n, addr))) => {
                    buf.truncate(n);
                    return Ok(Recv::Datagram(buf, addr));
                }
                // ICMP port-unreachable from a peer that is not listening
                // (yet) surfaces as ConnectionReset on some platforms.  It is
                // just loss, so keep waiting out the same deadline.
                Ok(Err(e)) if e.kind() == io::ErrorKind::ConnectionReset => {
                    log::trace!("[socket] ignoring connection reset");
                }
                Ok(Err(e)) => return Err(e),
                Err(_elapsed) => return Ok(Recv::TimedOut),
            }
        }
    }
}
