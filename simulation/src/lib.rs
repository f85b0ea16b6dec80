//! # Floodnet Simulation
//!
//! Discrete-event driver for floodnet nodes: a group topology (overlapping
//! direct-broadcast domains), a fixed-increment scheduler that updates
//! every node once per tick and fans transmissions out to group neighbors,
//! a seeded per-attempt loss model, and an event log for inspection.
//!
//! The protocol itself lives in `floodnet-node`; this crate only moves
//! packets between nodes and keeps score.

pub mod event;
pub mod scenarios;
pub mod simulation;
pub mod topology;

pub use event::{NetworkEvent, SimStats};
pub use simulation::{LossConfig, SimConfig, Simulator};
pub use topology::Topology;
