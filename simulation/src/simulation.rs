//! The fixed-increment scheduler
//!
//! One logical thread: the scheduler advances the shared clock by a fixed
//! step, updates every node exactly once per tick in id order, and fans
//! each drained packet out to the node's group neighbors as independent
//! clones. Loss is decided per delivery attempt by a uniform draw from the
//! run's seeded RNG, so a given seed always replays the same run.

use std::collections::BTreeMap;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{info, trace, warn};

use floodnet_core::{
    Address, Cipher, DatagramId, FloodnetError, GroupId, IdentityCipher, KeyPair, NameTable,
    NodeId, PacketId, ProtocolError, SimTime,
};
use floodnet_node::{Node, NodeConfig};

use crate::event::{NetworkEvent, SimStats};
use crate::topology::Topology;

/// Random-loss model for delivery attempts
///
/// Each (packet, neighbor) pair draws uniformly from `1..=range`; the copy
/// is delivered iff the draw exceeds `threshold`. With `range` 100 the
/// threshold reads as a loss percentage.
#[derive(Debug, Clone, Copy)]
pub struct LossConfig {
    pub range: u32,
    pub threshold: u32,
}

impl Default for LossConfig {
    fn default() -> Self {
        Self::lossless()
    }
}

impl LossConfig {
    /// Every delivery attempt succeeds
    pub fn lossless() -> Self {
        Self {
            range: 100,
            threshold: 0,
        }
    }

    /// Every delivery attempt fails
    pub fn total() -> Self {
        Self {
            range: 100,
            threshold: 100,
        }
    }

    /// Lose roughly `percent` of delivery attempts
    pub fn percent(percent: u32) -> Self {
        Self {
            range: 100,
            threshold: percent.min(100),
        }
    }

    fn delivers(&self, rng: &mut StdRng) -> bool {
        rng.random_range(1..=self.range.max(1)) > self.threshold
    }
}

/// Configuration for a simulation run
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Clock increment per tick, in simulated time units
    pub step: SimTime,
    /// Seed for the run RNG; node keys and loss draws derive from it
    pub seed: u64,
    /// Loss model applied to every delivery attempt
    pub loss: LossConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            step: 5,
            seed: 0,
            loss: LossConfig::lossless(),
        }
    }
}

impl SimConfig {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_step(mut self, step: SimTime) -> Self {
        self.step = step.max(1);
        self
    }

    pub fn with_loss(mut self, loss: LossConfig) -> Self {
        self.loss = loss;
        self
    }
}

/// The simulation state: topology, nodes, shared clock, loss model
pub struct Simulator {
    /// Group membership relation
    pub topology: Topology,
    nodes: BTreeMap<NodeId, Node>,
    clock: SimTime,
    config: SimConfig,
    rng: StdRng,
    names: Arc<NameTable>,
    cipher: Arc<dyn Cipher>,
    next_node: u32,
    next_group: u32,
    /// Global event log (all events)
    pub event_log: Vec<NetworkEvent>,
    /// Statistics
    pub stats: SimStats,
}

impl Simulator {
    /// Create an empty simulation with the default no-op cipher
    pub fn new(config: SimConfig) -> Self {
        Self::with_cipher(config, Arc::new(IdentityCipher))
    }

    /// Create an empty simulation with an injected confidentiality
    /// transform; every node seals and opens overlay bodies through it
    pub fn with_cipher(config: SimConfig, cipher: Arc<dyn Cipher>) -> Self {
        Self {
            topology: Topology::new(),
            nodes: BTreeMap::new(),
            clock: 0,
            rng: StdRng::seed_from_u64(config.seed),
            config,
            names: Arc::new(NameTable::new()),
            cipher,
            next_node: 0,
            next_group: 0,
            event_log: Vec::new(),
            stats: SimStats::default(),
        }
    }

    /// Add a node; keys and the node's private RNG derive from the run seed
    pub fn add_node(&mut self, config: NodeConfig) -> NodeId {
        let id = NodeId(self.next_node);
        self.next_node += 1;
        let keys = KeyPair::generate(&mut self.rng);
        let seed: u64 = self.rng.random();
        let node = Node::new(
            id,
            keys,
            Arc::clone(&self.names),
            Arc::clone(&self.cipher),
            config.with_seed(seed),
        );
        trace!(node = %node.display_name(), "node added");
        self.nodes.insert(id, node);
        id
    }

    /// Create a fresh empty group
    pub fn add_group(&mut self) -> GroupId {
        let group = GroupId(self.next_group);
        self.next_group += 1;
        self.topology.add_group(group);
        group
    }

    pub fn join(&mut self, node: NodeId, group: GroupId) {
        self.topology.join(node, group);
    }

    pub fn leave(&mut self, node: NodeId, group: GroupId) {
        self.topology.leave(node, group);
    }

    pub fn remove_group(&mut self, group: GroupId) {
        self.topology.remove_group(group);
    }

    pub fn node(&self, id: NodeId) -> &Node {
        self.nodes.get(&id).expect("unknown node id")
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        self.nodes.get_mut(&id).expect("unknown node id")
    }

    pub fn address_of(&self, id: NodeId) -> Address {
        self.node(id).address()
    }

    pub fn public_key_of(&self, id: NodeId) -> Vec<u8> {
        self.node(id).public_key().to_vec()
    }

    /// The shared name table all nodes read and write
    pub fn names(&self) -> &NameTable {
        &self.names
    }

    pub fn clock(&self) -> SimTime {
        self.clock
    }

    /// Swap the loss model mid-run (e.g. a loss window in a scenario)
    pub fn set_loss(&mut self, loss: LossConfig) {
        self.config.loss = loss;
    }

    /// Queue an application broadcast at `node`
    pub fn broadcast(&mut self, node: NodeId, payload: Vec<u8>) -> Result<PacketId, ProtocolError> {
        self.node_mut(node).broadcast(payload)
    }

    /// Queue a reliable datagram from one node to another
    pub fn send_datagram(
        &mut self,
        from: NodeId,
        to: NodeId,
        payload: &[u8],
    ) -> Result<DatagramId, FloodnetError> {
        let recipient = self.address_of(to);
        self.node_mut(from).send_datagram(payload, recipient)
    }

    /// Issue a name lookup from `requester` against `service`
    pub fn resolve(
        &mut self,
        requester: NodeId,
        service: NodeId,
        names: Vec<String>,
    ) -> Result<Address, FloodnetError> {
        let service_key = self.public_key_of(service);
        self.node_mut(requester).resolve_names(&service_key, names)
    }

    /// Run a single simulation tick
    ///
    /// Every node with at least one group membership is updated exactly
    /// once, in id order. A TTL violation at a receiver is counted and
    /// logged, never propagated; the rest of the tick proceeds.
    pub fn step(&mut self) {
        self.clock += self.config.step;
        self.stats.ticks += 1;
        trace!(clock = self.clock, "tick");

        for node_id in self.topology.nodes() {
            let Some(node) = self.nodes.get_mut(&node_id) else {
                continue;
            };
            let outgoing = node.update(self.clock);
            if outgoing.is_empty() {
                continue;
            }

            let neighbors = self.topology.neighbors_of(node_id);
            for packet in outgoing {
                self.stats.transmissions += 1;
                self.event_log.push(NetworkEvent::Transmitted {
                    at: self.clock,
                    node: node_id,
                    packet: packet.id,
                });

                for &neighbor in &neighbors {
                    if !self.config.loss.delivers(&mut self.rng) {
                        self.stats.losses += 1;
                        self.event_log.push(NetworkEvent::Lost {
                            at: self.clock,
                            from: node_id,
                            to: neighbor,
                            packet: packet.id,
                        });
                        continue;
                    }

                    // A membership may name an id with no backing node;
                    // skip it like the update loop does
                    let Some(receiver) = self.nodes.get_mut(&neighbor) else {
                        continue;
                    };
                    match receiver.receive_packet(packet.clone(), self.clock) {
                        Ok(()) => {
                            self.stats.deliveries += 1;
                            self.event_log.push(NetworkEvent::Delivered {
                                at: self.clock,
                                from: node_id,
                                to: neighbor,
                                packet: packet.id,
                            });
                        }
                        Err(err) => {
                            self.stats.ttl_violations += 1;
                            warn!(from = %node_id, to = %neighbor, %err, "delivery rejected");
                            self.event_log.push(NetworkEvent::TtlViolation {
                                at: self.clock,
                                from: node_id,
                                to: neighbor,
                                packet: packet.id,
                            });
                        }
                    }
                }
            }
        }
    }

    /// Run for a specific number of ticks
    pub fn run_ticks(&mut self, ticks: u64) {
        for _ in 0..ticks {
            self.step();
        }
        info!(
            ticks,
            clock = self.clock,
            transmissions = self.stats.transmissions,
            deliveries = self.stats.deliveries,
            "run complete"
        );
    }

    /// One-line status for interactive output
    pub fn state_summary(&self) -> String {
        format!(
            "tick {} (t={}): {} transmissions, {} deliveries, {} lost, {} ttl violations",
            self.stats.ticks,
            self.clock,
            self.stats.transmissions,
            self.stats.deliveries,
            self.stats.losses,
            self.stats.ttl_violations
        )
    }

    /// Fixture: a chain of groups where the last member of each group also
    /// joins the next, acting as the bridge. Returns nodes in id order.
    pub fn chain_of_groups(&mut self, groups: usize, per_group: usize) -> Vec<NodeId> {
        let mut all = Vec::new();
        let mut previous: Option<GroupId> = None;
        for _ in 0..groups {
            let group = self.add_group();
            for _ in 0..per_group {
                let node = self.add_node(NodeConfig::default());
                self.join(node, group);
                all.push(node);
            }
            if let Some(previous) = previous
                && let Some(&bridge) = all.last()
            {
                self.join(bridge, previous);
            }
            previous = Some(group);
        }
        all
    }

    /// Fixture: `groups` leaf groups of `per_group` nodes, all bridged by
    /// one hub node. Returns the hub.
    pub fn star_of_groups(&mut self, groups: usize, per_group: usize) -> NodeId {
        let hub = self.add_node(NodeConfig::fast());
        for _ in 0..groups {
            let group = self.add_group();
            self.join(hub, group);
            for _ in 0..per_group {
                let node = self.add_node(NodeConfig::default());
                self.join(node, group);
            }
        }
        hub
    }
}

impl std::fmt::Debug for Simulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulator")
            .field("nodes", &self.nodes.len())
            .field("groups", &self.topology.group_count())
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}
