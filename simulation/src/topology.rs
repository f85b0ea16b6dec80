//! Group topology
//!
//! A group is a direct-broadcast domain: every member hears every other
//! member's transmissions. A node in more than one group bridges them. The
//! node/group relation is many-to-many, so both directions live in one
//! struct and are mutated together; the two maps can never disagree.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use floodnet_core::{GroupId, NodeId};

/// The group membership relation, indexed from both sides
#[derive(Debug, Clone, Default)]
pub struct Topology {
    /// Members of each group
    groups: BTreeMap<GroupId, BTreeSet<NodeId>>,
    /// Groups each node belongs to
    memberships: BTreeMap<NodeId, BTreeSet<GroupId>>,
}

impl Topology {
    /// Create an empty topology
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a group with no members; a no-op if it already exists
    pub fn add_group(&mut self, group: GroupId) {
        self.groups.entry(group).or_default();
    }

    /// Add a node to a group, creating the group if needed; idempotent
    pub fn join(&mut self, node: NodeId, group: GroupId) {
        self.groups.entry(group).or_default().insert(node);
        self.memberships.entry(node).or_default().insert(group);
        debug!(%node, %group, "joined group");
    }

    /// Remove a node from a group; a no-op if it was not a member
    pub fn leave(&mut self, node: NodeId, group: GroupId) {
        if let Some(members) = self.groups.get_mut(&group) {
            members.remove(&node);
        }
        if let Some(groups) = self.memberships.get_mut(&node) {
            groups.remove(&group);
        }
        debug!(%node, %group, "left group");
    }

    /// Dissolve a group, detaching every member first
    pub fn remove_group(&mut self, group: GroupId) {
        let Some(members) = self.groups.remove(&group) else {
            return;
        };
        for node in members {
            if let Some(groups) = self.memberships.get_mut(&node) {
                groups.remove(&group);
            }
        }
        debug!(%group, "group removed");
    }

    /// Everyone who hears this node's transmissions, excluding itself
    ///
    /// The union of the node's groups. A bridge node appears once even
    /// when it shares more than one group with a neighbor.
    pub fn neighbors_of(&self, node: NodeId) -> BTreeSet<NodeId> {
        let mut neighbors = BTreeSet::new();
        if let Some(groups) = self.memberships.get(&node) {
            for group in groups {
                if let Some(members) = self.groups.get(group) {
                    neighbors.extend(members.iter().copied());
                }
            }
        }
        neighbors.remove(&node);
        neighbors
    }

    /// Every node with at least one membership, in id order
    pub fn nodes(&self) -> Vec<NodeId> {
        self.memberships
            .iter()
            .filter(|(_, groups)| !groups.is_empty())
            .map(|(node, _)| *node)
            .collect()
    }

    /// Members of a group
    pub fn members(&self, group: GroupId) -> Option<&BTreeSet<NodeId>> {
        self.groups.get(&group)
    }

    /// Groups a node belongs to
    pub fn groups_of(&self, node: NodeId) -> Option<&BTreeSet<GroupId>> {
        self.memberships.get(&node)
    }

    /// Whether two distinct nodes share at least one group
    pub fn are_neighbors(&self, a: NodeId, b: NodeId) -> bool {
        a != b && self.neighbors_of(a).contains(&b)
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    pub fn node_count(&self) -> usize {
        self.nodes().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_updates_both_sides() {
        let mut topo = Topology::new();
        topo.join(NodeId(1), GroupId(0));

        assert!(topo.members(GroupId(0)).unwrap().contains(&NodeId(1)));
        assert!(topo.groups_of(NodeId(1)).unwrap().contains(&GroupId(0)));

        // Joining again changes nothing
        topo.join(NodeId(1), GroupId(0));
        assert_eq!(topo.members(GroupId(0)).unwrap().len(), 1);
    }

    #[test]
    fn test_leave_is_idempotent() {
        let mut topo = Topology::new();
        topo.join(NodeId(1), GroupId(0));
        topo.leave(NodeId(1), GroupId(0));
        topo.leave(NodeId(1), GroupId(0));

        assert!(topo.members(GroupId(0)).unwrap().is_empty());
        assert!(topo.nodes().is_empty());
        // Leaving a group that never existed is also fine
        topo.leave(NodeId(9), GroupId(9));
    }

    #[test]
    fn test_bridge_neighbors_are_the_union() {
        let mut topo = Topology::new();
        for n in 0..3 {
            topo.join(NodeId(n), GroupId(0));
        }
        for n in 3..6 {
            topo.join(NodeId(n), GroupId(1));
        }
        // Node 2 bridges both groups
        topo.join(NodeId(2), GroupId(1));

        let bridge = topo.neighbors_of(NodeId(2));
        assert_eq!(
            bridge,
            [0, 1, 3, 4, 5].map(NodeId).into_iter().collect()
        );
        // A single-group node only hears its own group
        assert_eq!(
            topo.neighbors_of(NodeId(0)),
            [1, 2].map(NodeId).into_iter().collect()
        );
        assert!(topo.are_neighbors(NodeId(2), NodeId(5)));
        assert!(!topo.are_neighbors(NodeId(0), NodeId(5)));
    }

    #[test]
    fn test_remove_group_detaches_members() {
        let mut topo = Topology::new();
        topo.join(NodeId(1), GroupId(0));
        topo.join(NodeId(1), GroupId(1));
        topo.join(NodeId(2), GroupId(1));

        topo.remove_group(GroupId(1));
        assert!(topo.members(GroupId(1)).is_none());
        assert_eq!(topo.groups_of(NodeId(1)).unwrap().len(), 1);
        // Node 2 lost its only group and drops out of the schedule
        assert_eq!(topo.nodes(), vec![NodeId(1)]);
    }

    #[test]
    fn test_nodes_in_id_order() {
        let mut topo = Topology::new();
        topo.join(NodeId(5), GroupId(0));
        topo.join(NodeId(1), GroupId(0));
        topo.join(NodeId(3), GroupId(1));

        assert_eq!(topo.nodes(), vec![NodeId(1), NodeId(3), NodeId(5)]);
    }
}
