//! End-to-end properties of the simulated network

use floodnet_node::NodeConfig;
use floodnet_simulation::{LossConfig, SimConfig, Simulator};

fn sim() -> Simulator {
    // Step 50 keeps the cadence presets meaningful: fast nodes transmit
    // every tick, normal every other tick.
    Simulator::new(SimConfig::default().with_step(50).with_seed(1))
}

/// A bridged-group topology: requester | bridge | responder
fn bridged_trio(sim: &mut Simulator) -> (floodnet_core::NodeId, floodnet_core::NodeId, floodnet_core::NodeId) {
    let left = sim.add_group();
    let right = sim.add_group();
    let a = sim.add_node(NodeConfig::fast());
    let bridge = sim.add_node(NodeConfig::fast());
    let b = sim.add_node(NodeConfig::fast());
    sim.join(a, left);
    sim.join(bridge, left);
    sim.join(bridge, right);
    sim.join(b, right);
    (a, bridge, b)
}

#[test]
fn test_flood_reaches_every_node_exactly_once() {
    let mut sim = sim();
    // Three groups of three, bridged into a chain; hop budget 8 covers
    // the three group hops comfortably
    let nodes = sim.chain_of_groups(3, 3);

    sim.broadcast(nodes[0], b"reach everyone".to_vec()).unwrap();
    sim.run_ticks(6);

    for &node in &nodes[1..] {
        let delivered = sim.node(node).delivered();
        assert_eq!(delivered.len(), 1, "{} delivered wrong count", node);
        assert_eq!(delivered[0].data, b"reach everyone");
    }
    // The flood echoes back but never re-delivers to the sender
    assert!(sim.node(nodes[0]).delivered().is_empty());
    assert_eq!(sim.stats.ttl_violations, 0);
}

#[test]
fn test_duplicate_deliveries_are_suppressed() {
    let mut sim = sim();
    let group = sim.add_group();
    let nodes: Vec<_> = (0..4)
        .map(|_| {
            let node = sim.add_node(NodeConfig::fast());
            sim.join(node, group);
            node
        })
        .collect();

    sim.broadcast(nodes[0], b"once".to_vec()).unwrap();
    sim.run_ticks(4);

    // Everyone relays, so every receiver sees several copies; each handles
    // the payload exactly once
    let mut suppressed = 0;
    for &node in &nodes[1..] {
        assert_eq!(sim.node(node).delivered().len(), 1);
        suppressed += sim.node(node).stats().duplicates_suppressed;
    }
    assert!(suppressed > 0, "expected relayed duplicates to be suppressed");
}

#[test]
fn test_name_resolution_round_trip_across_bridge() {
    let mut sim = sim();
    let (requester, _bridge, service) = bridged_trio(&mut sim);

    sim.node_mut(service)
        .register_name("Service0", b"key-zero".to_vec());
    sim.node_mut(service)
        .register_name("Service1", b"key-one".to_vec());

    sim.resolve(
        requester,
        service,
        vec!["Service0".to_string(), "Service1".to_string()],
    )
    .unwrap();
    sim.run_ticks(4);

    assert_eq!(sim.names().get("Service0"), Some(b"key-zero".to_vec()));
    assert_eq!(sim.names().get("Service1"), Some(b"key-one".to_vec()));
    assert_eq!(sim.node(requester).outstanding_resolves(), 0);
    assert_eq!(sim.node(requester).stats().resolves_completed, 1);
    assert_eq!(sim.node(requester).stats().resolve_retries, 0);
}

#[test]
fn test_lost_request_is_retried_until_answered() {
    let mut sim = sim();
    let (requester, _bridge, service) = bridged_trio(&mut sim);
    sim.node_mut(service)
        .register_name("Service0", b"key-zero".to_vec());

    sim.resolve(requester, service, vec!["Service0".to_string()])
        .unwrap();

    // The first issue falls into a total-loss window
    sim.set_loss(LossConfig::total());
    sim.run_ticks(6);
    assert!(!sim.names().contains("Service0"));
    assert_eq!(sim.node(requester).outstanding_resolves(), 1);

    // Once the network heals, the timeout re-issue gets through
    sim.set_loss(LossConfig::lossless());
    sim.run_ticks(8);

    assert!(sim.names().contains("Service0"));
    assert!(sim.node(requester).stats().resolve_retries >= 1);
    assert_eq!(sim.node(requester).stats().resolves_completed, 1);
    assert_eq!(sim.node(requester).outstanding_resolves(), 0);
}

#[test]
fn test_datagram_reassembles_byte_identical() {
    let mut sim = sim();
    let (sender, _bridge, receiver) = bridged_trio(&mut sim);

    // 3.5 fragments worth of distinguishable bytes
    let payload: Vec<u8> = (0..224).map(|i| (i % 251) as u8).collect();
    let datagram = sim.send_datagram(sender, receiver, &payload).unwrap();
    sim.run_ticks(4);

    let delivered = sim.node(receiver).delivered();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].data, payload);
    assert_eq!(delivered[0].datagram, Some(datagram));
    // Reassembly state is gone once the payload is handed up
    assert_eq!(sim.node(receiver).pending_datagrams(), 0);
    assert_eq!(sim.node(receiver).stats().nacks_sent, 0);
}

#[test]
fn test_bridge_node_updates_once_per_tick() {
    let mut sim = sim();
    let (_a, bridge, _b) = bridged_trio(&mut sim);

    for tick in 1..=5u64 {
        sim.step();
        // One update per tick even though the bridge sits in two groups
        assert_eq!(sim.node(bridge).clock(), tick * 50);
    }
}
