//! The flood engine
//!
//! Each node holds a send-cadence timer, a bounded outgoing queue and two
//! independent dedup caches. On its cadence the node drains the queue; the
//! scheduler fans each drained packet out to the node's neighbors. On
//! receipt the node decrements TTL, re-enqueues the packet for further
//! flooding if its hop budget and the `transmitted` cache allow, and
//! dispatches it to the overlay layer at most once per packet id.

use std::collections::VecDeque;
use std::sync::Arc;

use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{debug, trace, warn};

use floodnet_core::{
    Address, Cipher, DatagramId, KeyPair, NameTable, NodeId, Packet, PacketId, PacketKind,
    ProtocolError, SeenCache, SimTime,
};

use crate::datagram::DatagramState;
use crate::resolve::Resolver;
use crate::timer::{TimerEvent, TimerWheel};

/// Configuration for a node
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Send cadence: how often the outgoing queue is drained
    pub latency: SimTime,
    /// Hop budget for locally created packets
    pub ttl: u8,
    /// Capacity of the outgoing queue
    pub outbox_capacity: usize,
    /// Capacity of each dedup cache
    pub cache_capacity: usize,
    /// How long to wait for a resolve response before re-issuing
    pub resolve_timeout: SimTime,
    /// How long to wait for missing fragments before NACKing
    pub nack_delay: SimTime,
    /// Optional human-readable name for logs
    pub name: Option<String>,
    /// Seed for the node's private random source
    pub seed: u64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            latency: 100,
            ttl: 8,
            outbox_capacity: 64,
            cache_capacity: 128,
            resolve_timeout: 400,
            nack_delay: 50,
            name: None,
            seed: 0,
        }
    }
}

impl NodeConfig {
    /// Fast cadence preset (25 time units)
    pub fn fast() -> Self {
        Self {
            latency: 25,
            ..Default::default()
        }
    }

    /// Normal cadence preset (100 time units)
    pub fn normal() -> Self {
        Self::default()
    }

    /// Slow cadence preset (750 time units)
    pub fn slow() -> Self {
        Self {
            latency: 750,
            ..Default::default()
        }
    }

    /// Set the node's display name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the hop budget for locally created packets
    pub fn with_ttl(mut self, ttl: u8) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set the node's RNG seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// Per-node counters
#[derive(Debug, Clone, Default)]
pub struct NodeStats {
    /// Packets handled by the local application layer
    pub handled: u64,
    /// Duplicate deliveries suppressed by the `handled` cache
    pub duplicates_suppressed: u64,
    /// Packets re-enqueued for further flooding
    pub relayed: u64,
    /// Relay packets dropped because the outbox was full
    pub relay_dropped: u64,
    /// Resolve requests completed (response merged)
    pub resolves_completed: u64,
    /// Resolve requests re-issued on timeout
    pub resolve_retries: u64,
    /// Retransmission requests sent
    pub nacks_sent: u64,
    /// Fragments re-sent in answer to a NACK
    pub retransmissions: u64,
    /// Datagrams fully reassembled and delivered
    pub datagrams_delivered: u64,
}

/// A payload delivered to the application layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivered {
    pub data: Vec<u8>,
    /// Set when the payload was reassembled from a datagram
    pub datagram: Option<DatagramId>,
}

/// A node in the broadcast network
pub struct Node {
    pub(crate) id: NodeId,
    name: Option<String>,
    pub(crate) keys: KeyPair,
    pub(crate) address: Address,
    pub(crate) clock: SimTime,
    latency: SimTime,
    next_send_at: SimTime,
    default_ttl: u8,
    sequence: u64,
    outbox: VecDeque<Packet>,
    outbox_capacity: usize,
    transmitted: SeenCache,
    handled: SeenCache,
    pub(crate) timers: TimerWheel,
    pub(crate) resolver: Resolver,
    pub(crate) datagrams: DatagramState,
    pub(crate) names: Arc<NameTable>,
    pub(crate) cipher: Arc<dyn Cipher>,
    pub(crate) rng: StdRng,
    pub(crate) resolve_timeout: SimTime,
    pub(crate) nack_delay: SimTime,
    inbox: Vec<Delivered>,
    pub(crate) stats: NodeStats,
}

impl Node {
    /// Create a node bound to the shared name table and cipher
    pub fn new(
        id: NodeId,
        keys: KeyPair,
        names: Arc<NameTable>,
        cipher: Arc<dyn Cipher>,
        config: NodeConfig,
    ) -> Self {
        let address = keys.address();
        Self {
            id,
            name: config.name,
            keys,
            address,
            clock: 0,
            latency: config.latency.max(1),
            next_send_at: 0,
            default_ttl: config.ttl,
            sequence: 0,
            outbox: VecDeque::new(),
            outbox_capacity: config.outbox_capacity.max(1),
            transmitted: SeenCache::new(config.cache_capacity),
            handled: SeenCache::new(config.cache_capacity),
            timers: TimerWheel::new(),
            resolver: Resolver::default(),
            datagrams: DatagramState::default(),
            names,
            cipher,
            rng: StdRng::seed_from_u64(config.seed),
            resolve_timeout: config.resolve_timeout,
            nack_delay: config.nack_delay,
            inbox: Vec::new(),
            stats: NodeStats::default(),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Digest of the node's public key; how packets are addressed to it
    pub fn address(&self) -> Address {
        self.address
    }

    pub fn public_key(&self) -> &[u8] {
        &self.keys.public
    }

    pub fn stats(&self) -> &NodeStats {
        &self.stats
    }

    pub fn clock(&self) -> SimTime {
        self.clock
    }

    /// Display name for logs: the configured name or the numeric id
    pub fn display_name(&self) -> String {
        self.name.clone().unwrap_or_else(|| self.id.to_string())
    }

    /// Payloads delivered to the application layer so far
    pub fn delivered(&self) -> &[Delivered] {
        &self.inbox
    }

    /// Drain the delivered-payload inbox
    pub fn take_delivered(&mut self) -> Vec<Delivered> {
        std::mem::take(&mut self.inbox)
    }

    pub(crate) fn push_delivered(&mut self, delivered: Delivered) {
        self.inbox.push(delivered);
    }

    pub(crate) fn next_packet_id(&mut self) -> PacketId {
        let id = PacketId {
            source: self.id,
            sequence: self.sequence,
        };
        self.sequence += 1;
        id
    }

    /// Create a packet with a fresh id and this node's default TTL
    pub(crate) fn create_packet(
        &mut self,
        kind: PacketKind,
        payload: Vec<u8>,
    ) -> Result<Packet, ProtocolError> {
        let id = self.next_packet_id();
        Packet::new(id, self.default_ttl, kind, payload)
    }

    /// Enqueue a locally originated packet; the queue bound is an error here
    pub(crate) fn enqueue_local(&mut self, packet: Packet) -> Result<(), ProtocolError> {
        if self.outbox.len() >= self.outbox_capacity {
            return Err(ProtocolError::QueueFull {
                capacity: self.outbox_capacity,
            });
        }
        self.outbox.push_back(packet);
        Ok(())
    }

    /// Enqueue a relayed packet; overflow drops it and bumps a counter
    fn enqueue_relay(&mut self, packet: Packet) {
        if self.outbox.len() >= self.outbox_capacity {
            self.stats.relay_dropped += 1;
            debug!(node = %self.display_name(), packet = %packet.id, "relay dropped, outbox full");
            return;
        }
        self.stats.relayed += 1;
        self.outbox.push_back(packet);
    }

    /// Flood an application payload to the whole network
    pub fn broadcast(&mut self, payload: Vec<u8>) -> Result<PacketId, ProtocolError> {
        let packet = self.create_packet(PacketKind::Broadcast, payload)?;
        let id = packet.id;
        self.enqueue_local(packet)?;
        // Neighbors will echo the flood back; never re-deliver our own send
        self.handled.insert(id);
        Ok(id)
    }

    /// Advance the node to `now`; returns the packets to flood this tick
    ///
    /// Fires due timers first (which may enqueue packets), then drains the
    /// outgoing queue if the send cadence is due. The `transmitted` cache
    /// is consulted and updated at drain time, so a packet id is broadcast
    /// at most once per cache lifetime.
    pub fn update(&mut self, now: SimTime) -> Vec<Packet> {
        self.clock = now;

        for event in self.timers.fire(now) {
            match event {
                TimerEvent::ResolveRetry(response_id) => self.retry_resolve(response_id),
                TimerEvent::NackDelay(datagram) => self.fire_nack(datagram),
            }
        }

        if now < self.next_send_at {
            return Vec::new();
        }
        self.next_send_at = now + self.latency;

        let mut outgoing = Vec::new();
        while let Some(packet) = self.outbox.pop_front() {
            if self.transmitted.insert(packet.id) {
                trace!(node = %self.display_name(), packet = %packet.id, "broadcasting");
                outgoing.push(packet);
            }
        }
        outgoing
    }

    /// Accept a packet from a neighbor
    ///
    /// A packet that arrives with no hop budget left is a protocol
    /// violation: its TTL was already zero before this hop, so the sender
    /// should never have relayed it.
    pub fn receive_packet(&mut self, mut packet: Packet, now: SimTime) -> Result<(), ProtocolError> {
        if packet.ttl == 0 {
            return Err(ProtocolError::TtlExhausted);
        }
        packet.ttl -= 1;

        // Loop suppression: keep flooding only while this node has not
        // itself broadcast this id.
        if packet.ttl > 0 && !self.transmitted.contains(&packet.id) {
            self.enqueue_relay(packet.clone());
        }

        // Duplicate suppression at the application boundary; unroutable
        // packets still count in the bookkeeping.
        if self.handled.insert(packet.id) {
            self.dispatch(packet, now);
        } else {
            self.stats.duplicates_suppressed += 1;
        }
        Ok(())
    }

    /// Dispatch by recipient: handle locally only if the packet targets
    /// this node's address, a registered awaiting-response id, or nothing
    /// at all (true broadcast).
    fn dispatch(&mut self, packet: Packet, now: SimTime) {
        match &packet.kind {
            PacketKind::Broadcast => {
                self.stats.handled += 1;
                self.inbox.push(Delivered {
                    data: packet.payload.clone(),
                    datagram: None,
                });
            }
            PacketKind::Request { recipient } if *recipient == self.address => {
                self.stats.handled += 1;
                self.handle_resolve_request(&packet);
            }
            PacketKind::Response { recipient } if self.resolver.awaiting(recipient) => {
                self.stats.handled += 1;
                self.handle_resolve_response(*recipient, &packet);
            }
            PacketKind::Fragment { recipient, .. } if *recipient == self.address => {
                self.stats.handled += 1;
                self.handle_fragment(&packet, now);
            }
            PacketKind::Nack { recipient, .. } if *recipient == self.address => {
                self.stats.handled += 1;
                self.handle_nack(&packet);
            }
            _ => {
                trace!(node = %self.display_name(), packet = %packet.id, "not addressed to us");
            }
        }
    }

    /// Enqueue a protocol-generated packet, logging instead of failing
    pub(crate) fn enqueue_or_warn(&mut self, packet: Packet) {
        let id = packet.id;
        if let Err(err) = self.enqueue_local(packet) {
            warn!(node = %self.display_name(), packet = %id, %err, "dropping protocol packet");
        }
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("address", &self.address.to_string())
            .field("clock", &self.clock)
            .field("outbox", &self.outbox.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use floodnet_core::IdentityCipher;
    use rand::SeedableRng;

    fn test_node(id: u32, config: NodeConfig) -> Node {
        let mut rng = StdRng::seed_from_u64(id as u64);
        Node::new(
            NodeId(id),
            KeyPair::generate(&mut rng),
            Arc::new(NameTable::new()),
            Arc::new(IdentityCipher),
            config.with_seed(id as u64),
        )
    }

    fn broadcast_packet(source: u32, sequence: u64, ttl: u8) -> Packet {
        Packet::new(
            PacketId {
                source: NodeId(source),
                sequence,
            },
            ttl,
            PacketKind::Broadcast,
            vec![1, 2, 3],
        )
        .unwrap()
    }

    #[test]
    fn test_zero_ttl_receive_is_a_violation() {
        let mut node = test_node(1, NodeConfig::default());
        let err = node
            .receive_packet(broadcast_packet(2, 0, 0), 5)
            .unwrap_err();
        assert_eq!(err, ProtocolError::TtlExhausted);
    }

    #[test]
    fn test_ttl_one_is_handled_but_not_relayed() {
        let mut node = test_node(1, NodeConfig::default());
        node.receive_packet(broadcast_packet(2, 0, 1), 5).unwrap();

        assert_eq!(node.stats().handled, 1);
        assert_eq!(node.stats().relayed, 0);
        // Nothing to flood on the next cadence
        assert!(node.update(100).is_empty());
    }

    #[test]
    fn test_duplicates_handled_exactly_once() {
        let mut node = test_node(1, NodeConfig::default());
        for _ in 0..4 {
            node.receive_packet(broadcast_packet(2, 0, 5), 5).unwrap();
        }

        assert_eq!(node.stats().handled, 1);
        assert_eq!(node.stats().duplicates_suppressed, 3);
        assert_eq!(node.delivered().len(), 1);
    }

    #[test]
    fn test_received_packet_is_reflooded_once() {
        let mut node = test_node(1, NodeConfig::default());
        node.receive_packet(broadcast_packet(2, 0, 5), 5).unwrap();

        let outgoing = node.update(100);
        assert_eq!(outgoing.len(), 1);
        // The relayed copy lost one hop
        assert_eq!(outgoing[0].ttl, 4);

        // A late duplicate must not re-enter the flood
        node.receive_packet(broadcast_packet(2, 0, 5), 150).unwrap();
        assert!(node.update(300).is_empty());
    }

    #[test]
    fn test_send_cadence_gates_draining() {
        let mut node = test_node(1, NodeConfig::default());
        node.broadcast(vec![9]).unwrap();

        // First update is due immediately (next_send_at starts at 0)
        assert_eq!(node.update(5).len(), 1);

        node.broadcast(vec![8]).unwrap();
        // Cadence re-armed to 5 + 100; not due yet
        assert!(node.update(10).is_empty());
        assert_eq!(node.update(105).len(), 1);
    }

    #[test]
    fn test_directed_packet_for_someone_else_is_ignored() {
        let mut node = test_node(1, NodeConfig::default());
        let elsewhere = Address::for_key(b"someone else");
        let packet = Packet::new(
            PacketId {
                source: NodeId(2),
                sequence: 0,
            },
            5,
            PacketKind::Request {
                recipient: elsewhere,
            },
            vec![],
        )
        .unwrap();

        node.receive_packet(packet.clone(), 5).unwrap();
        assert_eq!(node.stats().handled, 0);
        // Still relayed, and still dedup-bookkept
        assert_eq!(node.stats().relayed, 1);
        node.receive_packet(packet, 6).unwrap();
        assert_eq!(node.stats().duplicates_suppressed, 1);
    }

    #[test]
    fn test_local_send_queue_bound_is_an_error() {
        let mut config = NodeConfig::default();
        config.outbox_capacity = 2;
        let mut node = test_node(1, config);

        node.broadcast(vec![0]).unwrap();
        node.broadcast(vec![1]).unwrap();
        let err = node.broadcast(vec![2]).unwrap_err();
        assert_eq!(err, ProtocolError::QueueFull { capacity: 2 });
    }
}
