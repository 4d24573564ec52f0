//! Relay message wire type and the per-session dedup cache.

use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};

/// A message stored by the mediator for one recipient.
///
/// `body` is the base64 ciphertext produced by the sending peer; `hash`
/// identifies the message for dedup and deletion; `sequence_no` orders
/// messages within a poll batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayMessage {
    #[serde(default)]
    pub session_id: String,
    pub from: String,
    pub to: Vec<String>,
    pub body: String,
    pub hash: String,
    #[serde(default)]
    pub sequence_no: u64,
}

/// Bounded first-in-first-out set of applied message keys.
///
/// Owned by one signing session; there is no cross-session sharing and no
/// process-wide state. Once full, the oldest entry is evicted, which is safe
/// because the relay deletes acknowledged messages long before the cache
/// wraps.
#[derive(Debug)]
pub struct DedupCache {
    seen: HashSet<String>,
    order: VecDeque<String>,
    capacity: usize,
}

impl DedupCache {
    /// Default capacity, comfortably above any real session's message count
    pub const DEFAULT_CAPACITY: usize = 1024;

    pub fn new(capacity: usize) -> Self {
        Self {
            seen: HashSet::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.seen.contains(key)
    }

    /// Record `key`; returns false if it was already present
    pub fn insert(&mut self, key: impl Into<String>) -> bool {
        let key = key.into();
        if !self.seen.insert(key.clone()) {
            return false;
        }
        self.order.push_back(key);
        if self.order.len() > self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.seen.remove(&evicted);
            }
        }
        true
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    pub fn clear(&mut self) {
        self.seen.clear();
        self.order.clear();
    }
}

impl Default for DedupCache {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

/// Cache key for one applied message: scoped to session and recipient, with
/// the optional keysign message id mixed in.
pub fn dedup_key(
    session_id: &str,
    local_party_id: &str,
    message_id: Option<&str>,
    hash: &str,
) -> String {
    match message_id {
        Some(id) => format!("{session_id}-{local_party_id}-{id}-{hash}"),
        None => format!("{session_id}-{local_party_id}-{hash}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_is_idempotent() {
        let mut cache = DedupCache::default();
        assert!(cache.insert("a"));
        assert!(!cache.insert("a"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_bounded_eviction() {
        let mut cache = DedupCache::new(3);
        for key in ["a", "b", "c", "d"] {
            cache.insert(key);
        }
        assert_eq!(cache.len(), 3);
        assert!(!cache.contains("a")); // oldest evicted
        assert!(cache.contains("d"));
    }

    #[test]
    fn test_clear() {
        let mut cache = DedupCache::default();
        cache.insert("a");
        cache.clear();
        assert!(cache.is_empty());
        assert!(cache.insert("a"));
    }

    #[test]
    fn test_dedup_key_scopes() {
        let plain = dedup_key("s", "p", None, "h");
        let keyed = dedup_key("s", "p", Some("m"), "h");
        assert_ne!(plain, keyed);
        assert_ne!(dedup_key("s", "p1", None, "h"), dedup_key("s", "p2", None, "h"));
    }

    #[test]
    fn test_message_json_shape() {
        let json = r#"{
            "session_id": "abc",
            "from": "device-1",
            "to": ["device-2"],
            "body": "aGVsbG8=",
            "hash": "deadbeef",
            "sequence_no": 4
        }"#;
        let msg: RelayMessage = serde_json::from_str(json).unwrap();
        assert_eq!(msg.from, "device-1");
        assert_eq!(msg.sequence_no, 4);
    }
}
