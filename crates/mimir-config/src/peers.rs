//! Cluster membership as seen from one unit.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Mapping from unit identifier to network address.
///
/// A `PeerSet` always contains the local unit. It has no removal API, so that
/// invariant holds for the whole lifetime of the value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerSet {
    local_unit: String,
    members: BTreeMap<String, String>,
}

impl PeerSet {
    /// Creates a peer set holding only the local unit.
    #[must_use]
    pub fn new(local_unit: impl Into<String>, local_address: impl Into<String>) -> Self {
        let local_unit = local_unit.into();
        let mut members = BTreeMap::new();
        members.insert(local_unit.clone(), local_address.into());
        Self {
            local_unit,
            members,
        }
    }

    /// Adds or replaces a remote unit's address.
    ///
    /// The local unit's own entry is never replaced.
    pub fn insert(&mut self, unit: impl Into<String>, address: impl Into<String>) {
        let unit = unit.into();
        if unit == self.local_unit {
            return;
        }
        self.members.insert(unit, address.into());
    }

    /// Adds a remote unit, builder style.
    #[must_use]
    pub fn with_peer(mut self, unit: impl Into<String>, address: impl Into<String>) -> Self {
        self.insert(unit, address);
        self
    }

    /// The local unit identifier.
    #[must_use]
    pub fn local_unit(&self) -> &str {
        &self.local_unit
    }

    /// The local unit's address.
    #[must_use]
    pub fn local_address(&self) -> &str {
        self.members
            .get(&self.local_unit)
            .map_or("", String::as_str)
    }

    /// Looks up the address of a unit.
    #[must_use]
    pub fn get(&self, unit: &str) -> Option<&str> {
        self.members.get(unit).map(String::as_str)
    }

    /// Every address in the set, local unit included, ordered by unit id.
    pub fn addresses(&self) -> impl Iterator<Item = &str> {
        self.members.values().map(String::as_str)
    }

    /// Iterates `(unit, address)` pairs ordered by unit id.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.members.iter().map(|(u, a)| (u.as_str(), a.as_str()))
    }

    /// Number of members, local unit included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Always false; kept for API symmetry with collections.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_set_contains_only_local_unit() {
        let peers = PeerSet::new("mimir-writer/0", "mimir-writer-0.example");
        assert_eq!(peers.len(), 1);
        assert_eq!(peers.local_unit(), "mimir-writer/0");
        assert_eq!(peers.local_address(), "mimir-writer-0.example");
        assert!(!peers.is_empty());
    }

    #[test]
    fn local_entry_cannot_be_replaced() {
        let peers = PeerSet::new("u/0", "self.example").with_peer("u/0", "impostor.example");
        assert_eq!(peers.len(), 1);
        assert_eq!(peers.local_address(), "self.example");
    }

    #[test]
    fn addresses_are_ordered_by_unit() {
        let peers = PeerSet::new("u/1", "h1")
            .with_peer("u/2", "h2")
            .with_peer("u/0", "h0");
        let addrs: Vec<_> = peers.addresses().collect();
        assert_eq!(addrs, vec!["h0", "h1", "h2"]);
    }

    #[test]
    fn remote_address_can_be_updated() {
        let mut peers = PeerSet::new("u/0", "h0").with_peer("u/1", "old");
        peers.insert("u/1", "new");
        assert_eq!(peers.get("u/1"), Some("new"));
        assert_eq!(peers.len(), 2);
    }
}
