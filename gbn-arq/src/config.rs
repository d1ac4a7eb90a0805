//! Endpoint configuration.

use crate::packet::{DATA_HEADER_LEN, DIGEST_LEN};
use crate::timer::TimerConfig;

/// Default Go-Back-N window size.
pub const DEFAULT_WINDOW: usize = 7;

/// Default receive buffer size for one datagram.
pub const DEFAULT_MAX_DATAGRAM: usize = 4096;

/// Settings shared by [`crate::gbn_connection::Sender`] and
/// [`crate::gbn_connection::Receiver`].
#[derive(Debug, Clone)]
pub struct ArqConfig {
    /// Maximum number of unacknowledged data packets (N in Go-Back-N).
    pub window_size: usize,
    pub timers: TimerConfig,
    /// Receive buffer size; longer datagrams are truncated by the channel.
    pub max_datagram: usize,
    /// Close notices the sender re-sends while waiting for the echo.
    pub close_retries: u32,
    /// Sequence numbers whose *first* transmission is deliberately sent with
    /// a bad digest.  Retransmissions are always clean.
    pub corrupt_first: Vec<u32>,
}

impl Default for ArqConfig {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_WINDOW,
            timers: TimerConfig::default(),
            max_datagram: DEFAULT_MAX_DATAGRAM,
            close_retries: 3,
            corrupt_first: Vec::new(),
        }
    }
}

impl ArqConfig {
    /// Largest payload whose data packet still fits in `max_datagram`.
    pub fn max_payload(&self) -> usize {
        self.max_datagram
            .saturating_sub(DATA_HEADER_LEN + DIGEST_LEN)
            .min(crate::packet::MAX_PAYLOAD)
    }
}
