//! `gbn-arq` — reliable one-way transfer over UDP with Go-Back-N ARQ.
//!
//! # Architecture
//!
//! ```text
//!  ┌──────────┐  data packets  ┌──────────┐
//!  │  Sender  │───────────────▶│ Receiver │
//!  └────┬─────┘                └─────┬────┘
//!       │     cumulative ACKs        │
//!       │◀───────────────────────────┘
//!       │
//!  ┌────▼──────────────────────────────┐
//!  │     Channel (trait)               │
//!  │  Socket | MemoryChannel           │
//!  │  Simulator<C> (fault injection)   │
//!  └───────────────────────────────────┘
//! ```
//!
//! Each module has a single responsibility:
//! - [`packet`]          — wire format and BLAKE2b-128 digest
//! - [`gbn_connection`]  — sender and receiver endpoint loops
//! - [`gbn_sender`]      — GBN outbound window state machine
//! - [`gbn_receiver`]    — GBN inbound cumulative-ACK state machine
//! - [`state`]           — endpoint states and termination reasons
//! - [`timer`]           — retransmission timer and idle thresholds
//! - [`config`]          — endpoint settings
//! - [`channel`]         — datagram channel trait and in-memory link
//! - [`simulator`]       — seeded lossy/corrupting channel wrapper
//! - [`socket`]          — async UDP socket channel
//! - [`error`]           — error type for the endpoint loops

pub mod channel;
pub mod config;
pub mod error;
pub mod gbn_connection;
pub mod gbn_receiver;
pub mod gbn_sender;
pub mod packet;
pub mod simulator;
pub mod socket;
pub mod state;
pub mod timer;

pub use channel::{Channel, MemoryChannel, Recv};
pub use config::ArqConfig;
pub use error::{ArqError, Result};
pub use gbn_connection::{Receiver, ReceiverStats, Sender, SenderStats, Submission};
pub use packet::Packet;
pub use simulator::{Simulator, SimulatorConfig};
pub use socket::Socket;
pub use state::{ReceiverState, SenderState, TerminationReason};
pub use timer::TimerConfig;
