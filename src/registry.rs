//! Registry of currently blocked domains keyed by record id.

use ahash::RandomState;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

use crate::feed::ActionKind;

/// Stable identifier of a blocklist entry, shared by the snapshot and the action log.
pub type RecordId = u64;

/// Authoritative mapping from record id to domain.
///
/// Two ids may carry the same domain; [`snapshot_domains`](Self::snapshot_domains)
/// collapses them. Serializes as a JSON object keyed by the decimal id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DomainRegistry {
    entries: HashMap<RecordId, String, RandomState>,
}

impl DomainRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Discard all content and install `entries`.
    ///
    /// A later entry with a repeated id wins.
    pub fn replace_all<I>(&mut self, entries: I)
    where
        I: IntoIterator<Item = (RecordId, String)>,
    {
        self.entries = entries.into_iter().collect();
    }

    /// Apply one action: `Block` upserts, `Unblock` removes.
    ///
    /// Unblocking an id that is not present does nothing.
    pub fn apply(&mut self, id: RecordId, domain: &str, action: ActionKind) {
        match action {
            ActionKind::Block => {
                self.entries.insert(id, domain.to_string());
            }
            ActionKind::Unblock => {
                self.entries.remove(&id);
            }
        }
    }

    /// Distinct domains, sorted by byte-wise ordinal comparison.
    pub fn snapshot_domains(&self) -> Vec<String> {
        self.entries
            .values()
            .map(String::as_str)
            .collect::<BTreeSet<&str>>()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    /// Check whether a record id is present.
    pub fn contains_id(&self, id: RecordId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Domain currently registered under `id`.
    pub fn get(&self, id: RecordId) -> Option<&str> {
        self.entries.get(&id).map(String::as_str)
    }

    /// Number of records (not distinct domains).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (RecordId, &str)> {
        self.entries.iter().map(|(id, d)| (*id, d.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry(entries: &[(RecordId, &str)]) -> DomainRegistry {
        let mut r = DomainRegistry::new();
        r.replace_all(entries.iter().map(|(id, d)| (*id, d.to_string())));
        r
    }

    #[test]
    fn test_replace_all_discards_previous() {
        let mut r = registry(&[(1, "old.example")]);
        r.replace_all(vec![(2, "new.example".to_string())]);

        assert!(!r.contains_id(1));
        assert_eq!(r.get(2), Some("new.example"));
        assert_eq!(r.len(), 1);
    }

    #[test]
    fn test_snapshot_sorted_and_distinct() {
        let r = registry(&[
            (5, "zeta.example"),
            (1, "alpha.example"),
            (2, "Beta.example"),
            (3, "alpha.example"),
        ]);

        // Ordinal comparison puts uppercase before lowercase.
        assert_eq!(
            r.snapshot_domains(),
            vec!["Beta.example", "alpha.example", "zeta.example"]
        );
    }

    #[test]
    fn test_block_overwrites_existing_id() {
        let mut r = registry(&[(7, "first.example")]);
        r.apply(7, "second.example", ActionKind::Block);

        assert_eq!(r.get(7), Some("second.example"));
        assert_eq!(r.snapshot_domains(), vec!["second.example"]);
    }

    #[test]
    fn test_unblock_absent_is_noop() {
        let mut r = registry(&[(1, "evil.example")]);
        r.apply(99, "whatever.example", ActionKind::Unblock);

        assert_eq!(r, registry(&[(1, "evil.example")]));
    }

    #[test]
    fn test_unblock_removes_by_id_not_domain() {
        let mut r = registry(&[(1, "dup.example"), (2, "dup.example")]);
        r.apply(1, "dup.example", ActionKind::Unblock);

        // Still blocked through id 2.
        assert_eq!(r.snapshot_domains(), vec!["dup.example"]);
        r.apply(2, "ignored", ActionKind::Unblock);
        assert!(r.snapshot_domains().is_empty());
    }

    #[test]
    fn test_json_shape_keyed_by_id() {
        let r = registry(&[(42, "evil.example")]);
        let json = serde_json::to_string(&r).unwrap();
        assert_eq!(json, r#"{"42":"evil.example"}"#);

        let back: DomainRegistry = serde_json::from_str(&json).unwrap();
        assert_eq!(back, r);
    }
}
