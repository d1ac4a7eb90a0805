//! Endpoint finite-state-machine types.
//!
//! ```text
//!  Sender:    Idle ──submit──▶ Sending ──window drained──▶ Idle
//!                                 │
//!                final ACK (N)    │        close echo / retries spent
//!                                 ▼
//!                              Closing ─────────────────────▶ Closed
//!
//!  Receiver:  Open ──close / idle threshold──▶ Closed
//! ```
//!
//! Any sender state moves straight to `Closed` on a peer close notice or on
//! the abort threshold.

use std::fmt;

/// Send-side connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SenderState {
    /// Window empty, no timer running.
    #[default]
    Idle,
    /// At least one packet awaits acknowledgement; the timer is running.
    Sending,
    /// Final ACK received and close notice sent; waiting for the echo.
    Closing,
    Closed,
}

/// Receive-side connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReceiverState {
    #[default]
    Open,
    Closed,
}

/// Why an endpoint's run loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    /// Every payload was acknowledged and the close exchange finished.
    Completed,
    /// The peer sent a close notice.
    ClosedByPeer,
    /// Receiver went quiet for the close threshold and told the peer so.
    IdleTimeout,
    /// No verified traffic for the long threshold; the connection was abandoned.
    PeerUnresponsive,
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            TerminationReason::Completed => "all data acknowledged",
            TerminationReason::ClosedByPeer => "connection closed by peer",
            TerminationReason::IdleTimeout => "idle timeout, close sent to peer",
            TerminationReason::PeerUnresponsive => "peer unresponsive",
        };
        f.write_str(text)
    }
}
