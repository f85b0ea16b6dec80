//! Bounded dedup cache for recently seen packet identifiers
//!
//! Insertion order determines eviction: once capacity is exceeded the
//! oldest entry is dropped first. Every node carries two independent
//! instances; one bounds re-transmission across the flood, the other
//! bounds re-delivery to the application layer.

use std::collections::{HashSet, VecDeque};

use crate::packet::PacketId;

/// Fixed-capacity, insertion-ordered cache of seen packet identifiers
#[derive(Debug, Clone)]
pub struct SeenCache {
    capacity: usize,
    order: VecDeque<PacketId>,
    seen: HashSet<PacketId>,
}

impl SeenCache {
    /// Create a cache holding at most `capacity` identifiers
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            order: VecDeque::with_capacity(capacity),
            seen: HashSet::with_capacity(capacity),
        }
    }

    /// Check whether an identifier is currently cached
    pub fn contains(&self, id: &PacketId) -> bool {
        self.seen.contains(id)
    }

    /// Record an identifier; returns `true` if it was new
    ///
    /// Evicts the oldest entry once capacity is exceeded. Re-inserting a
    /// cached identifier does not refresh its position.
    pub fn insert(&mut self, id: PacketId) -> bool {
        if !self.seen.insert(id) {
            return false;
        }
        self.order.push_back(id);
        if self.order.len() > self.capacity
            && let Some(oldest) = self.order.pop_front()
        {
            self.seen.remove(&oldest);
        }
        true
    }

    /// Number of identifiers currently cached
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
