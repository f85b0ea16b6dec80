//! Event log and run statistics
//!
//! Informational only; nothing in the protocol reads these back.

use floodnet_core::{NodeId, PacketId, SimTime};

/// Something observable that happened on the simulated network
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkEvent {
    /// A node drained a packet from its queue and put it on the air
    Transmitted {
        at: SimTime,
        node: NodeId,
        packet: PacketId,
    },
    /// A copy reached a neighbor
    Delivered {
        at: SimTime,
        from: NodeId,
        to: NodeId,
        packet: PacketId,
    },
    /// A copy was dropped by the loss model
    Lost {
        at: SimTime,
        from: NodeId,
        to: NodeId,
        packet: PacketId,
    },
    /// A copy arrived with no hop budget left; sender misbehaved
    TtlViolation {
        at: SimTime,
        from: NodeId,
        to: NodeId,
        packet: PacketId,
    },
}

/// Whole-run counters
#[derive(Debug, Clone, Default)]
pub struct SimStats {
    /// Ticks executed
    pub ticks: u64,
    /// Packets put on the air (one per drained packet, not per copy)
    pub transmissions: u64,
    /// Copies delivered to a neighbor
    pub deliveries: u64,
    /// Copies dropped by the loss model
    pub losses: u64,
    /// Copies rejected for arriving with zero TTL
    pub ttl_violations: u64,
}
