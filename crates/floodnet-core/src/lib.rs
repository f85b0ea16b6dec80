//! # Floodnet Core
//!
//! Core types for the floodnet broadcast network simulator.
//!
//! This crate provides the value types shared by the per-node protocol
//! logic (`floodnet-node`) and the discrete-event driver
//! (`floodnet-simulation`):
//!
//! - [`NodeId`], [`GroupId`], [`Address`], [`KeyPair`]: identities and
//!   opaque key material (a node's address is the digest of its public key)
//! - [`Packet`], [`PacketKind`]: value-type packets with tagged kind
//!   variants instead of a subclass chain
//! - [`SeenCache`]: bounded, insertion-ordered dedup cache
//! - [`Cipher`] / [`IdentityCipher`]: pluggable confidentiality transform
//! - [`NameTable`]: process-wide name -> key table, cleared only by reset

pub mod cache;
pub mod codec;
pub mod error;
pub mod identity;
pub mod nametable;
pub mod packet;

// Re-export main types
pub use cache::*;
pub use codec::*;
pub use error::*;
pub use identity::*;
pub use nametable::*;
pub use packet::*;

/// Simulated time in milliseconds. Purely logical; never coupled to
/// wall-clock time.
pub type SimTime = u64;
