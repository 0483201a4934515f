//! Entry point for `sr-datalink`.
//!
//! Runs two stations against each other over the simulated channel and
//! reports whether every packet arrived, in order, on both sides.  All
//! protocol work lives in the library; `main.rs` only owns process setup
//! (logging, argument parsing).

use std::time::Duration;

use anyhow::{bail, ensure, Result};
use clap::Parser;

use sr_datalink::config::{LinkConfig, DEFAULT_MAX_SEQ, DEFAULT_PKT_LEN};
use sr_datalink::simulator::{Simulator, SimulatorConfig};

/// Selective-repeat data link over a lossy simulated channel.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// Packets each station sends to the other.
    #[arg(short, long, default_value_t = 1000)]
    packets: u32,

    /// Probability that a frame is lost on the wire.
    #[arg(long, default_value_t = 0.0)]
    loss: f64,

    /// Probability that a frame has a bit flipped on the wire.
    #[arg(long, default_value_t = 0.0)]
    corrupt: f64,

    /// RNG seed for the fault model.
    #[arg(short, long, default_value_t = 0)]
    seed: u64,

    /// Highest sequence number (odd, below 255).
    #[arg(long, default_value_t = DEFAULT_MAX_SEQ)]
    max_seq: u8,

    /// Payload bytes per data frame.
    #[arg(long, default_value_t = DEFAULT_PKT_LEN)]
    pkt_len: usize,

    /// Retransmission timeout in milliseconds.
    #[arg(long, default_value_t = 2000)]
    data_timer_ms: u64,

    /// ACK coalescing delay in milliseconds.
    #[arg(long, default_value_t = 300)]
    ack_timer_ms: u64,

    /// Give up after this much simulated time, in seconds.
    #[arg(long, default_value_t = 3600)]
    time_limit_s: u64,
}

fn main() -> Result<()> {
    // Initialise env_logger; set RUST_LOG to control verbosity.
    env_logger::init();

    let cli = Cli::parse();
    // Generated packets carry their number in the first four bytes.
    ensure!(cli.pkt_len >= 4, "--pkt-len must be at least 4");

    let link = LinkConfig {
        max_seq: cli.max_seq,
        pkt_len: cli.pkt_len,
        data_timer: Duration::from_millis(cli.data_timer_ms),
        ack_timer: Duration::from_millis(cli.ack_timer_ms),
        ..LinkConfig::default()
    };
    let sim = SimulatorConfig {
        packets: cli.packets,
        loss_rate: cli.loss,
        corrupt_rate: cli.corrupt,
        seed: cli.seed,
        time_limit: Duration::from_secs(cli.time_limit_s),
        ..SimulatorConfig::default()
    };

    log::info!(
        "Simulating {} packets each way (max_seq={}, loss={}, corrupt={}, seed={})",
        sim.packets,
        link.max_seq,
        sim.loss_rate,
        sim.corrupt_rate,
        sim.seed
    );
    let report = Simulator::new(link, sim)?.run()?;

    for (name, stats) in [("A", &report.stats_a), ("B", &report.stats_b)] {
        log::info!(
            "station {name}: sent {} frames ({} data, {} timeout resends, {} NAK resends, \
             {} ACKs, {} NAKs, {} piggybacked), {} corrupt in, {} duplicates",
            stats.frames_sent,
            stats.data_frames_sent,
            stats.timeout_retransmits,
            stats.nak_retransmits,
            stats.acks_sent,
            stats.naks_sent,
            stats.piggybacked_acks,
            stats.corrupt_received,
            stats.duplicates_received
        );
    }
    println!(
        "{:?} simulated: A received {}/{}, B received {}/{}",
        report.elapsed,
        report.delivered_at_a.len(),
        report.packets,
        report.delivered_at_b.len(),
        report.packets
    );

    if !report.is_complete() {
        bail!("delivery incomplete or out of order");
    }
    Ok(())
}
