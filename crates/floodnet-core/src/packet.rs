//! Packet types for flood dissemination
//!
//! Packets are value types: every hop gets an independent copy, so one
//! node's TTL decrement never affects another's in-flight copy. The
//! overlays share one structural shape and differ only in the tagged
//! [`PacketKind`] header fields.

use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;
use crate::identity::{Address, NodeId};

/// Maximum payload size in bytes; exceeding it is a construction-time error
pub const MAX_PAYLOAD: usize = 256;

/// Unique identifier for a packet (source + per-source counter)
///
/// Retries and retransmissions always draw a fresh id, since the stale one
/// may already sit in downstream dedup caches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PacketId {
    pub source: NodeId,
    pub sequence: u64,
}

impl Display for PacketId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.source, self.sequence)
    }
}

/// Identifier shared by all fragments of one application payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DatagramId(pub u64);

impl Display for DatagramId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "d{:08x}", self.0)
    }
}

/// Kind-specific header fields
///
/// Tagged variants replace the deep subclass chain of the original design:
/// overlays are mixed by composition, not inheritance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PacketKind {
    /// True broadcast; handled by every node after dedup
    Broadcast,
    /// Name-resolution request addressed to digest(service public key)
    Request { recipient: Address },
    /// Name-resolution response addressed to the request's response id
    Response { recipient: Address },
    /// One fragment of a datagram
    Fragment {
        recipient: Address,
        /// Address of the datagram's original sender (NACK target)
        source: Address,
        datagram: DatagramId,
        index: u32,
        count: u32,
    },
    /// Retransmission request naming the missing fragment indices
    Nack {
        recipient: Address,
        datagram: DatagramId,
        missing: Vec<u32>,
    },
}

impl PacketKind {
    /// The recipient address, if this kind is addressed at all
    pub fn recipient(&self) -> Option<Address> {
        match self {
            PacketKind::Broadcast => None,
            PacketKind::Request { recipient }
            | PacketKind::Response { recipient }
            | PacketKind::Fragment { recipient, .. }
            | PacketKind::Nack { recipient, .. } => Some(*recipient),
        }
    }
}

/// A packet in flight
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Packet {
    /// Unique packet identifier
    pub id: PacketId,
    /// Remaining hop budget; decremented once per relay
    pub ttl: u8,
    /// Kind-specific header fields
    pub kind: PacketKind,
    /// Opaque payload, bounded to [`MAX_PAYLOAD`]
    pub payload: Vec<u8>,
}

impl Packet {
    /// Create a new packet
    ///
    /// Fails with [`ProtocolError::PayloadTooLarge`] rather than silently
    /// truncating an oversized payload.
    pub fn new(
        id: PacketId,
        ttl: u8,
        kind: PacketKind,
        payload: Vec<u8>,
    ) -> Result<Self, ProtocolError> {
        if payload.len() > MAX_PAYLOAD {
            return Err(ProtocolError::PayloadTooLarge {
                max: MAX_PAYLOAD,
                actual: payload.len(),
            });
        }
        Ok(Self {
            id,
            ttl,
            kind,
            payload,
        })
    }
}
