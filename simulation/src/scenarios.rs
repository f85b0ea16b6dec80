//! Pre-defined simulation scenarios
//!
//! Each scenario builds a topology, injects traffic and prints a short
//! report. The step is 50 time units so the cadence presets read naturally:
//! fast nodes transmit every tick, normal every other, slow rarely.

use tracing::info;

use floodnet_node::NodeConfig;

use crate::simulation::{LossConfig, SimConfig, Simulator};

/// The canonical demo: two groups bridged by a fast router
///
/// The left group floods a broadcast across the bridge while one left node
/// resolves two names hosted on the right, all within 16 ticks.
pub fn run_demo(seed: u64) -> Simulator {
    info!("=== Two groups bridged by a router ===");

    let mut sim = Simulator::new(SimConfig::default().with_step(50).with_seed(seed));
    let left = sim.add_group();
    let right = sim.add_group();

    let alice = sim.add_node(NodeConfig::fast().with_name("alice"));
    let bob = sim.add_node(NodeConfig::normal().with_name("bob"));
    let carol = sim.add_node(NodeConfig::normal().with_name("carol"));
    for node in [alice, bob, carol] {
        sim.join(node, left);
    }

    let dave = sim.add_node(NodeConfig::normal().with_name("dave"));
    let erin = sim.add_node(NodeConfig::slow().with_name("erin"));
    let frank = sim.add_node(NodeConfig::normal().with_name("frank"));
    for node in [dave, erin, frank] {
        sim.join(node, right);
    }

    let router = sim.add_node(NodeConfig::fast().with_name("router"));
    sim.join(router, left);
    sim.join(router, right);

    // dave answers lookups for the two right-side services
    let erin_key = sim.public_key_of(erin);
    let frank_key = sim.public_key_of(frank);
    sim.node_mut(dave).register_name("Service0", erin_key);
    sim.node_mut(dave).register_name("Service1", frank_key);

    sim.broadcast(alice, b"hello from the left".to_vec())
        .expect("fresh outbox");
    let lookup = sim
        .resolve(
            alice,
            dave,
            vec!["Service0".to_string(), "Service1".to_string()],
        )
        .expect("fresh outbox");

    for tick in 1..=16 {
        sim.step();
        println!("--- tick {:2}: {}", tick, sim.state_summary());
    }

    if sim.node(alice).outstanding_resolves() > 0 {
        sim.node_mut(alice).cancel_resolve(lookup);
    }

    println!("\n=== Final state ===");
    for node in [bob, carol, dave, erin, frank, router] {
        println!(
            "  {:6} handled {:2} packets, delivered {}",
            sim.node(node).display_name(),
            sim.node(node).stats().handled,
            sim.node(node).delivered().len()
        );
    }
    for name in ["Service0", "Service1"] {
        println!("  {} resolved: {}", name, sim.names().contains(name));
    }
    sim
}

/// Flood one broadcast across a chain of bridged groups
pub fn run_flood(groups: usize, per_group: usize, ticks: u64, seed: u64) -> Simulator {
    info!(groups, per_group, "=== Chained-groups flood ===");

    let mut sim = Simulator::new(SimConfig::default().with_step(50).with_seed(seed));
    let nodes = sim.chain_of_groups(groups, per_group);

    sim.broadcast(nodes[0], b"flood me".to_vec())
        .expect("fresh outbox");
    sim.run_ticks(ticks);

    let reached = nodes[1..]
        .iter()
        .filter(|&&node| !sim.node(node).delivered().is_empty())
        .count();
    println!(
        "reached {}/{} nodes in {} ticks; {}",
        reached,
        nodes.len() - 1,
        ticks,
        sim.state_summary()
    );
    sim
}

/// Resolve a name across a bridge under a configurable loss rate
///
/// With loss high enough to eat the first request, the timeout machinery
/// re-issues it until a response gets through.
pub fn run_resolve(loss_percent: u32, ticks: u64, seed: u64) -> Simulator {
    info!(loss_percent, "=== Name resolution under loss ===");

    let mut sim = Simulator::new(
        SimConfig::default()
            .with_step(50)
            .with_seed(seed)
            .with_loss(LossConfig::percent(loss_percent)),
    );
    let left = sim.add_group();
    let right = sim.add_group();
    let requester = sim.add_node(NodeConfig::fast().with_name("requester"));
    let bridge = sim.add_node(NodeConfig::fast().with_name("bridge"));
    let service = sim.add_node(NodeConfig::fast().with_name("service"));
    sim.join(requester, left);
    sim.join(bridge, left);
    sim.join(bridge, right);
    sim.join(service, right);

    let service_key = sim.public_key_of(service);
    sim.node_mut(service)
        .register_name("Service0", service_key);

    sim.resolve(requester, service, vec!["Service0".to_string()])
        .expect("fresh outbox");
    sim.run_ticks(ticks);

    let stats = sim.node(requester).stats();
    println!(
        "resolved: {} after {} retries; {}",
        sim.names().contains("Service0"),
        stats.resolve_retries,
        sim.state_summary()
    );
    sim
}

/// Send a multi-fragment datagram across a bridge
pub fn run_datagram(bytes: usize, loss_percent: u32, ticks: u64, seed: u64) -> Simulator {
    info!(bytes, loss_percent, "=== Reliable datagram ===");

    let mut sim = Simulator::new(
        SimConfig::default()
            .with_step(50)
            .with_seed(seed)
            .with_loss(LossConfig::percent(loss_percent)),
    );
    let left = sim.add_group();
    let right = sim.add_group();
    let sender = sim.add_node(NodeConfig::fast().with_name("sender"));
    let bridge = sim.add_node(NodeConfig::fast().with_name("bridge"));
    let receiver = sim.add_node(NodeConfig::fast().with_name("receiver"));
    sim.join(sender, left);
    sim.join(bridge, left);
    sim.join(bridge, right);
    sim.join(receiver, right);

    let payload: Vec<u8> = (0..bytes).map(|i| (i % 251) as u8).collect();
    sim.send_datagram(sender, receiver, &payload)
        .expect("payload fits");
    sim.run_ticks(ticks);

    let delivered = sim.node(receiver).delivered();
    let intact = delivered.iter().any(|d| d.data == payload);
    println!(
        "delivered intact: {intact}; {} NACKs, {} retransmissions; {}",
        sim.node(receiver).stats().nacks_sent,
        sim.node(sender).stats().retransmissions,
        sim.state_summary()
    );
    sim
}
