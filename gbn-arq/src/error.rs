//! Errors surfaced by the endpoint loops.

use thiserror::Error;

use crate::packet::PacketError;

/// Failures that end an endpoint's run loop with an error.
///
/// Lost, corrupted and reordered packets never show up here; the protocol
/// recovers from those on its own.
#[derive(Error, Debug)]
pub enum ArqError {
    #[error("channel I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("packet encoding failed: {0}")]
    Packet(#[from] PacketError),
    #[error("payload of {len} bytes exceeds the {max} byte limit")]
    PayloadTooLarge { len: usize, max: usize },
}

pub type Result<T> = std::result::Result<T, ArqError>;
