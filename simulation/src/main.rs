//! Floodnet - flooding-broadcast network simulation
//!
//! Runs canned scenarios over group topologies: TTL-bounded flooding,
//! name resolution with timeout retry, and reliable datagrams with
//! NACK-driven retransmission.

use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use floodnet_simulation::scenarios;

#[derive(Parser)]
#[command(
    name = "floodnet",
    about = "Flooding-broadcast network simulation with overlapping groups",
    version
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Seed for the run RNG
    #[arg(short, long, global = true, default_value = "0")]
    seed: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the canonical two-groups-plus-router demo (16 ticks)
    Demo,

    /// Flood one broadcast across a chain of bridged groups
    Flood {
        /// Number of groups in the chain
        #[arg(short, long, default_value = "3")]
        groups: usize,

        /// Nodes per group
        #[arg(short, long, default_value = "4")]
        nodes: usize,

        /// Number of ticks to run
        #[arg(short, long, default_value = "16")]
        ticks: u64,
    },

    /// Resolve a name across a bridge, optionally under loss
    Resolve {
        /// Percentage of delivery attempts to lose
        #[arg(short, long, default_value = "0")]
        loss: u32,

        /// Number of ticks to run
        #[arg(short, long, default_value = "32")]
        ticks: u64,
    },

    /// Send a multi-fragment datagram across a bridge
    Datagram {
        /// Payload size in bytes
        #[arg(short, long, default_value = "224")]
        bytes: usize,

        /// Percentage of delivery attempts to lose
        #[arg(short, long, default_value = "0")]
        loss: u32,

        /// Number of ticks to run
        #[arg(short, long, default_value = "32")]
        ticks: u64,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    match cli.command {
        Commands::Demo => {
            scenarios::run_demo(cli.seed);
        }
        Commands::Flood {
            groups,
            nodes,
            ticks,
        } => {
            scenarios::run_flood(groups, nodes, ticks, cli.seed);
        }
        Commands::Resolve { loss, ticks } => {
            scenarios::run_resolve(loss, ticks, cli.seed);
        }
        Commands::Datagram { loss, bytes, ticks } => {
            scenarios::run_datagram(bytes, loss, ticks, cli.seed);
        }
    }

    Ok(())
}
