//! In-memory snapshot of the last observed slots per key.
//!
//! Owned by the poll loop for the lifetime of one monitoring run.

use std::collections::BTreeMap;

use crate::models::{SlotKey, SlotSet};

static EMPTY: SlotSet = SlotSet::new();

/// Last successfully fetched `SlotSet` per (facility, date) key.
#[derive(Debug, Default)]
pub struct SnapshotStore {
    entries: BTreeMap<SlotKey, SlotSet>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored set for `key`, or an empty set if the key was never observed.
    pub fn get(&self, key: &SlotKey) -> &SlotSet {
        self.entries.get(key).unwrap_or(&EMPTY)
    }

    /// Replace the stored set for `key`.
    pub fn put(&mut self, key: SlotKey, slots: SlotSet) {
        self.entries.insert(key, slots);
    }

    /// True once `put` has been called for `key`.
    pub fn is_known(&self, key: &SlotKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Slot;
    use chrono::{NaiveDate, NaiveTime};

    fn key() -> SlotKey {
        SlotKey::new("frogner", NaiveDate::from_ymd_opt(2025, 8, 20).unwrap())
    }

    fn slots(start: u32) -> SlotSet {
        vec![Slot::new(
            "frogner",
            "Court 1",
            NaiveDate::from_ymd_opt(2025, 8, 20).unwrap(),
            NaiveTime::from_hms_opt(start, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(start + 1, 0, 0).unwrap(),
        )]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_unseen_key_is_empty() {
        let store = SnapshotStore::new();
        assert!(store.get(&key()).is_empty());
        assert!(!store.is_known(&key()));
    }

    #[test]
    fn test_put_replaces() {
        let mut store = SnapshotStore::new();
        store.put(key(), slots(17));
        store.put(key(), slots(18));

        assert_eq!(store.len(), 1);
        assert_eq!(store.get(&key()), &slots(18));
        assert!(store.is_known(&key()));
    }

    #[test]
    fn test_empty_set_is_still_known() {
        let mut store = SnapshotStore::new();
        store.put(key(), SlotSet::new());
        assert!(store.is_known(&key()));
        assert!(store.get(&key()).is_empty());
    }
}
