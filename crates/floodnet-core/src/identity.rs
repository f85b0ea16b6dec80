//! Node, group and address identities
//!
//! A node's network address is the one-way digest of its public key, so
//! a packet can be addressed to a node without carrying the key itself.
//! Randomly drawn addresses double as response identifiers in the
//! name-resolution overlay.

use std::fmt::Display;

use rand::RngCore;
use serde::{Deserialize, Serialize};

/// Unique identifier for a node. Scheduler iteration follows `NodeId` order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// Unique identifier for a broadcast group
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GroupId(pub u32);

impl Display for GroupId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "g{}", self.0)
    }
}

/// A 32-byte network address
///
/// Either the blake3 digest of a public key (a node's own address) or a
/// randomly drawn response identifier registered as "awaiting a response".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Address(pub [u8; 32]);

impl Address {
    /// Derive the address for a public key
    pub fn for_key(public_key: &[u8]) -> Self {
        Self(*blake3::hash(public_key).as_bytes())
    }

    /// Draw a fresh random address (used as a response identifier)
    pub fn random(rng: &mut impl RngCore) -> Self {
        let mut bytes = [0u8; 32];
        rng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Get the underlying bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex::encode(&self.0[..4]))
    }
}

/// Opaque key material for a node
///
/// The simulator implements no real cryptography; keys are opaque byte
/// strings fed to the pluggable [`Cipher`](crate::codec::Cipher) transform.
#[derive(Debug, Clone)]
pub struct KeyPair {
    pub public: Vec<u8>,
    pub secret: Vec<u8>,
}

impl KeyPair {
    /// Generate a fresh random key pair
    pub fn generate(rng: &mut impl RngCore) -> Self {
        let mut public = vec![0u8; 32];
        let mut secret = vec![0u8; 32];
        rng.fill_bytes(&mut public);
        rng.fill_bytes(&mut secret);
        Self { public, secret }
    }

    /// The network address derived from the public key
    pub fn address(&self) -> Address {
        Address::for_key(&self.public)
    }
}
