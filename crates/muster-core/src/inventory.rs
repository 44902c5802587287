use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// HostRecord
// ---------------------------------------------------------------------------

/// One cluster member: a unique id plus optional transport parameters
/// discovered from a live provider query (`HostName`, `Port`, `User`,
/// `IdentityFile`, …).
///
/// The connection map is a `BTreeMap` so the serialized form is
/// deterministic — resolving the same cluster twice must produce
/// byte-identical cache files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostRecord {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection: Option<BTreeMap<String, String>>,
}

impl HostRecord {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            connection: None,
        }
    }

    pub fn with_connection(id: impl Into<String>, connection: BTreeMap<String, String>) -> Self {
        Self {
            id: id.into(),
            connection: Some(connection),
        }
    }

    /// Look up one connection parameter, if provider metadata is present.
    pub fn conn(&self, key: &str) -> Option<&str> {
        self.connection
            .as_ref()
            .and_then(|m| m.get(key))
            .map(String::as_str)
    }
}

// ---------------------------------------------------------------------------
// Inventory
// ---------------------------------------------------------------------------

/// The resolved, ordered membership of one cluster.
///
/// Ordering is significant: position 0 is the primary/master role, position
/// 1 the secondary (etcd) role, the rest are general workers. Hosts whose
/// ids end in a numeric suffix are ordered by that suffix (`node2` before
/// `node10`); when any id lacks a suffix, the discovery order is kept as
/// reported.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inventory {
    hosts: Vec<HostRecord>,
}

impl Inventory {
    pub fn new(mut hosts: Vec<HostRecord>) -> Self {
        if hosts.iter().all(|h| numeric_suffix(&h.id).is_some()) {
            hosts.sort_by_key(|h| numeric_suffix(&h.id).unwrap_or(u64::MAX));
        }
        Self { hosts }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    pub fn hosts(&self) -> &[HostRecord] {
        &self.hosts
    }

    pub fn iter(&self) -> std::slice::Iter<'_, HostRecord> {
        self.hosts.iter()
    }

    pub fn ids(&self) -> Vec<&str> {
        self.hosts.iter().map(|h| h.id.as_str()).collect()
    }

    /// Position 0: conventionally the master.
    pub fn primary(&self) -> Option<&HostRecord> {
        self.hosts.first()
    }

    /// Position 1: conventionally the etcd member.
    pub fn secondary(&self) -> Option<&HostRecord> {
        self.hosts.get(1)
    }

    /// All but the first host.
    pub fn workers(&self) -> &[HostRecord] {
        if self.hosts.is_empty() {
            &[]
        } else {
            &self.hosts[1..]
        }
    }

    pub fn get(&self, id: &str) -> Option<&HostRecord> {
        self.hosts.iter().find(|h| h.id == id)
    }

    /// Resolve an operator-supplied target: an exact host id, or a 1-based
    /// positional index into the inventory.
    pub fn find(&self, target: &str) -> Option<&HostRecord> {
        if let Some(h) = self.get(target) {
            return Some(h);
        }
        match target.parse::<usize>() {
            Ok(n) if n >= 1 && n <= self.hosts.len() => Some(&self.hosts[n - 1]),
            _ => None,
        }
    }
}

impl<'a> IntoIterator for &'a Inventory {
    type Item = &'a HostRecord;
    type IntoIter = std::slice::Iter<'a, HostRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.hosts.iter()
    }
}

/// Trailing decimal digits of an id, if any (`node12` → `12`).
fn numeric_suffix(id: &str) -> Option<u64> {
    let digits: String = id
        .chars()
        .rev()
        .take_while(|c| c.is_ascii_digit())
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    if digits.is_empty() {
        None
    } else {
        digits.parse().ok()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn inv(ids: &[&str]) -> Inventory {
        Inventory::new(ids.iter().map(|i| HostRecord::new(*i)).collect())
    }

    #[test]
    fn orders_by_numeric_suffix() {
        let inv = inv(&["node10", "node2", "node1"]);
        assert_eq!(inv.ids(), vec!["node1", "node2", "node10"]);
    }

    #[test]
    fn keeps_provider_order_without_suffixes() {
        let inv = inv(&["beta", "alpha", "gamma"]);
        assert_eq!(inv.ids(), vec!["beta", "alpha", "gamma"]);
    }

    #[test]
    fn role_positions() {
        let inv = inv(&["node1", "node2", "node3"]);
        assert_eq!(inv.primary().unwrap().id, "node1");
        assert_eq!(inv.secondary().unwrap().id, "node2");
        let worker_ids: Vec<&str> = inv.workers().iter().map(|h| h.id.as_str()).collect();
        assert_eq!(worker_ids, vec!["node2", "node3"]);
    }

    #[test]
    fn workers_of_empty_inventory() {
        assert!(Inventory::empty().workers().is_empty());
        assert!(Inventory::empty().primary().is_none());
    }

    #[test]
    fn find_by_id_and_index() {
        let inv = inv(&["core1", "core2", "core3"]);
        assert_eq!(inv.find("core2").unwrap().id, "core2");
        assert_eq!(inv.find("1").unwrap().id, "core1");
        assert_eq!(inv.find("3").unwrap().id, "core3");
        assert!(inv.find("0").is_none());
        assert!(inv.find("4").is_none());
        assert!(inv.find("missing").is_none());
    }

    #[test]
    fn conn_lookup() {
        let mut m = BTreeMap::new();
        m.insert("HostName".to_string(), "10.0.0.5".to_string());
        let rec = HostRecord::with_connection("node1", m);
        assert_eq!(rec.conn("HostName"), Some("10.0.0.5"));
        assert_eq!(rec.conn("Port"), None);
        assert_eq!(HostRecord::new("node2").conn("HostName"), None);
    }

    #[test]
    fn serde_skips_empty_connection() {
        let rec = HostRecord::new("node1");
        let json = serde_json::to_string(&rec).unwrap();
        assert_eq!(json, r#"{"id":"node1"}"#);
        let back: HostRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, rec);
    }
}
