//! Process-wide name resolution table
//!
//! Explicit shared state with an injected handle, not an implicit global:
//! the driver creates one table at simulation start and hands an `Arc` to
//! every node. The table outlives a single run and is cleared only by
//! [`NameTable::reset`], never implicitly.

use dashmap::DashMap;

/// Shared `name -> public key` table populated by completed resolutions
#[derive(Debug, Default)]
pub struct NameTable {
    entries: DashMap<String, Vec<u8>>,
}

impl NameTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a resolved name
    pub fn insert(&self, name: impl Into<String>, key: Vec<u8>) {
        self.entries.insert(name.into(), key);
    }

    /// Look up a resolved name
    pub fn get(&self, name: &str) -> Option<Vec<u8>> {
        self.entries.get(name).map(|entry| entry.clone())
    }

    /// Check whether a name has been resolved
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Merge resolved pairs; returns how many entries were written
    pub fn merge(&self, pairs: impl IntoIterator<Item = (String, Vec<u8>)>) -> usize {
        let mut written = 0;
        for (name, key) in pairs {
            self.entries.insert(name, key);
            written += 1;
        }
        written
    }

    /// Number of resolved names
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the table is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Explicitly clear the table; the only way entries are ever removed
    pub fn reset(&self) {
        self.entries.clear();
    }
}
