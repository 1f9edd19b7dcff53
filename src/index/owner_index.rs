//! Owner index: maps each character id to the sorted record ids it owns.

use std::collections::HashMap;

/// Maps each character id to a sorted list of record ids (memories or
/// knowledge events) belonging to that character.
pub struct OwnerIndex {
    index: HashMap<String, Vec<u64>>,
}

impl OwnerIndex {
    /// Create a new, empty owner index.
    pub fn new() -> Self {
        Self {
            index: HashMap::new(),
        }
    }

    /// Get all record ids owned by a character.
    pub fn get(&self, owner: &str) -> &[u64] {
        self.index.get(owner).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Count records owned by a character.
    pub fn count(&self, owner: &str) -> usize {
        self.index.get(owner).map(|v| v.len()).unwrap_or(0)
    }

    /// Rebuild the entire index from (owner, id) pairs.
    pub fn rebuild<'a>(&mut self, records: impl IntoIterator<Item = (&'a str, u64)>) {
        self.index.clear();
        for (owner, id) in records {
            self.index.entry(owner.to_string()).or_default().push(id);
        }
        for list in self.index.values_mut() {
            list.sort_unstable();
        }
    }

    /// Incrementally add a record.
    pub fn add(&mut self, owner: &str, id: u64) {
        let list = self.index.entry(owner.to_string()).or_default();
        let pos = list.binary_search(&id).unwrap_or_else(|p| p);
        list.insert(pos, id);
    }

    /// Remove a record from the index.
    pub fn remove(&mut self, owner: &str, id: u64) {
        if let Some(list) = self.index.get_mut(owner) {
            if let Ok(pos) = list.binary_search(&id) {
                list.remove(pos);
            }
            if list.is_empty() {
                self.index.remove(owner);
            }
        }
    }

    /// Drop every record of an owner, returning the removed ids.
    pub fn remove_owner(&mut self, owner: &str) -> Vec<u64> {
        self.index.remove(owner).unwrap_or_default()
    }

    /// Number of total entries across all owners.
    pub fn len(&self) -> usize {
        self.index.values().map(|v| v.len()).sum()
    }

    /// Whether the index is empty.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

impl Default for OwnerIndex {
    fn default() -> Self {
        Self::new()
    }
}
