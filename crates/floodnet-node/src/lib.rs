//! # Floodnet Node
//!
//! Per-node protocol logic for the floodnet simulator.
//!
//! A [`Node`] is the flood engine plus two overlays attached by
//! composition:
//!
//! - the **name-resolution overlay** ([`Node::resolve_names`]): a flooded
//!   request/response pair matched by a response identifier, retried on
//!   timeout with fresh packet ids
//! - the **reliable transport overlay** ([`Node::send_datagram`]):
//!   fragmentation into bounded packets, reassembly keyed by datagram id,
//!   gap detection via NACK retransmission requests
//!
//! Nodes never touch each other directly; the scheduler in
//! `floodnet-simulation` moves packets between them. Timers are plain
//! `(fire_at, token, event)` records polled from [`Node::update`], so all
//! temporal interleaving is deterministic under a fixed seed.

pub mod datagram;
pub mod flood;
pub mod resolve;
pub mod timer;

pub use datagram::MAX_FRAGMENT_DATA;
pub use flood::{Delivered, Node, NodeConfig, NodeStats};
pub use timer::{TimerEvent, TimerToken, TimerWheel};
