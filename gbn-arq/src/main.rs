//! Entry point for `gbn-arq`.
//!
//! Parses CLI arguments and dispatches into either **receive** or **send**
//! mode.  All protocol work is delegated to library modules; `main.rs` owns
//! only process setup (logging, argument parsing, socket binding).

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};

use gbn_arq::{
    ArqConfig, Channel, Receiver, Sender, Simulator, SimulatorConfig, Socket, TimerConfig,
};

/// Reliable one-way transfer over UDP with Go-Back-N ARQ.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    mode: Mode,

    #[command(flatten)]
    timers: TimerArgs,
}

#[derive(Subcommand)]
enum Mode {
    /// Wait for a sender and print what it delivers.
    Receive {
        /// Local address to bind.
        #[arg(short, long, default_value = "127.0.0.1:10000")]
        bind: SocketAddr,
    },
    /// Send `count` copies of `message` to a receiver.
    Send {
        /// Receiver address.
        #[arg(short, long, default_value = "127.0.0.1:10000")]
        peer: SocketAddr,
        /// Local address to bind.
        #[arg(short, long, default_value = "0.0.0.0:0")]
        bind: SocketAddr,
        /// Number of data packets.
        #[arg(short = 'n', long, default_value_t = 10)]
        count: u32,
        #[arg(short, long, default_value = "hello")]
        message: String,
        #[arg(short, long, default_value_t = gbn_arq::config::DEFAULT_WINDOW)]
        window: usize,
        /// Send this sequence number with a bad digest the first time.
        #[arg(long = "corrupt", value_name = "SEQ")]
        corrupt: Vec<u32>,
        /// Probability of dropping an outbound datagram.
        #[arg(long, default_value_t = 0.0)]
        loss_rate: f64,
        /// Probability of flipping a bit in an outbound datagram.
        #[arg(long, default_value_t = 0.0)]
        corrupt_rate: f64,
        #[arg(long, default_value_t = 0)]
        seed: u64,
    },
}

/// Timer thresholds, in milliseconds.
#[derive(Args)]
struct TimerArgs {
    #[arg(long, global = true, default_value_t = 5_000)]
    retransmit_ms: u64,
    #[arg(long, global = true, default_value_t = 20_000)]
    abort_ms: u64,
    #[arg(long, global = true, default_value_t = 10_000)]
    idle_close_ms: u64,
    #[arg(long, global = true, default_value_t = 50_000)]
    abandon_ms: u64,
}

impl From<&TimerArgs> for TimerConfig {
    fn from(args: &TimerArgs) -> Self {
        Self {
            retransmit_after: Duration::from_millis(args.retransmit_ms),
            sender_abort_after: Duration::from_millis(args.abort_ms),
            receiver_close_after: Duration::from_millis(args.idle_close_ms),
            receiver_abandon_after: Duration::from_millis(args.abandon_ms),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Set RUST_LOG to control verbosity.
    env_logger::init();

    let cli = Cli::parse();
    let timers = TimerConfig::from(&cli.timers);

    match cli.mode {
        Mode::Receive { bind } => {
            let socket = Socket::bind(bind)
                .await
                .with_context(|| format!("binding {bind}"))?;
            log::info!("listening on {}", socket.local_addr);

            let config = ArqConfig {
                timers,
                ..Default::default()
            };
            let mut receiver = Receiver::new(socket, config);
            let (delivered, reason) = receiver.run().await?;
            for (i, payload) in delivered.iter().enumerate() {
                println!("{:>3}: {}", i + 1, String::from_utf8_lossy(payload));
            }
            println!("connection closed: {reason}");
        }
        Mode::Send {
            peer,
            bind,
            count,
            message,
            window,
            corrupt,
            loss_rate,
            corrupt_rate,
            seed,
        } => {
            anyhow::ensure!(window >= 1, "window must be at least 1");
            let socket = Socket::bind(bind)
                .await
                .with_context(|| format!("binding {bind}"))?;
            log::info!("bound to {}", socket.local_addr);

            let config = ArqConfig {
                window_size: window,
                timers,
                corrupt_first: corrupt,
                ..Default::default()
            };
            let payloads = (0..count).map(|_| message.clone().into_bytes());

            if loss_rate > 0.0 || corrupt_rate > 0.0 {
                let sim = Simulator::new(
                    socket,
                    SimulatorConfig {
                        loss_rate,
                        corrupt_rate,
                        seed,
                        ..Default::default()
                    },
                );
                send(sim, peer, count, config, payloads).await?;
            } else {
                send(socket, peer, count, config, payloads).await?;
            }
        }
    }
    Ok(())
}

async fn send<C: Channel>(
    channel: C,
    peer: SocketAddr,
    count: u32,
    config: ArqConfig,
    payloads: impl Iterator<Item = Vec<u8>>,
) -> anyhow::Result<()> {
    let mut sender = Sender::new(channel, peer, count, config);
    let reason = sender.run(payloads).await?;
    let stats = sender.stats();
    println!(
        "connection closed: {reason} ({} packets sent, {} retransmitted)",
        stats.packets_sent, stats.retransmissions
    );
    Ok(())
}
