//! The two shared in-memory registries of the gateway.
//!
//! Both are cheap cloneable handles over interior-locked state. The waiting list is written by the order flow
//! (register on creation, deregister on match) and by the countdown worker (the periodic tick); the whitelist is
//! written only by the reconciliation loop. Locks are held for the duration of a single operation and nothing is
//! awaited while holding one.
use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex, PoisonError},
};

use crate::db_types::{PaymentId, WaitingEntry};

//--------------------------------------     WaitingList       -------------------------------------------------------
/// The countdown on unpaid payment offers. One entry per actively-waiting order, holding the milliseconds left
/// before the offer lapses. This registry is the sole authority on remaining offer time.
#[derive(Clone, Default)]
pub struct WaitingList {
    entries: Arc<Mutex<HashMap<PaymentId, i64>>>,
}

impl WaitingList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, payment_id: PaymentId, remaining_millis: i64) {
        self.lock().insert(payment_id, remaining_millis.max(0));
    }

    /// Removes the entry for `payment_id`. Returns true if it was present.
    pub fn deregister(&self, payment_id: &PaymentId) -> bool {
        self.lock().remove(payment_id).is_some()
    }

    pub fn contains(&self, payment_id: &PaymentId) -> bool {
        self.lock().contains_key(payment_id)
    }

    /// The live remaining time, or `None` if the order is not waiting. Never negative.
    pub fn time_left(&self, payment_id: &PaymentId) -> Option<i64> {
        self.lock().get(payment_id).map(|v| (*v).max(0))
    }

    /// One countdown tick: decrement every entry by `decrement` ms and drop the ones that reach zero.
    /// Returns the payment ids whose offers lapsed on this tick.
    pub fn tick(&self, decrement: i64) -> Vec<PaymentId> {
        let mut entries = self.lock();
        let mut lapsed = Vec::new();
        entries.retain(|id, remaining| {
            *remaining -= decrement;
            if *remaining <= 0 {
                lapsed.push(id.clone());
                false
            } else {
                true
            }
        });
        lapsed
    }

    pub fn snapshot(&self) -> Vec<WaitingEntry> {
        self.lock()
            .iter()
            .map(|(id, remaining)| WaitingEntry { payment_id: id.clone(), remaining_millis: (*remaining).max(0) })
            .collect()
    }

    /// Re-seeds the list from a snapshot. Entries that already lapsed are skipped.
    pub fn restore(&self, entries: Vec<WaitingEntry>) {
        let mut map = self.lock();
        for entry in entries {
            if entry.remaining_millis > 0 {
                map.insert(entry.payment_id, entry.remaining_millis);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<PaymentId, i64>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

//--------------------------------------      Whitelist        -------------------------------------------------------
/// Transfer hashes the gateway has matched to an order and approved for acknowledgement. A confirmed transfer whose
/// hash is not in here is never accepted.
#[derive(Clone, Default)]
pub struct Whitelist {
    hashes: Arc<Mutex<HashSet<String>>>,
}

impl Whitelist {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<S: Into<String>>(&self, hash: S) -> bool {
        self.lock().insert(hash.into())
    }

    pub fn contains(&self, hash: &str) -> bool {
        self.lock().contains(hash)
    }

    /// Drops a hash once its transfer has been settled, keeping the set bounded.
    pub fn remove(&self, hash: &str) -> bool {
        self.lock().remove(hash)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashSet<String>> {
        self.hashes.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn id(s: &str) -> PaymentId {
        PaymentId(s.to_string())
    }

    #[test]
    fn ticks_decrement_by_exactly_the_tick_size() {
        let list = WaitingList::new();
        list.register(id("1000001"), 300);
        assert!(list.tick(100).is_empty());
        assert_eq!(list.time_left(&id("1000001")), Some(200));
        assert!(list.tick(100).is_empty());
        assert_eq!(list.time_left(&id("1000001")), Some(100));
    }

    #[test]
    fn entries_lapse_exactly_once_at_zero() {
        let list = WaitingList::new();
        list.register(id("1000002"), 200);
        assert!(list.tick(100).is_empty());
        let lapsed = list.tick(100);
        assert_eq!(lapsed, vec![id("1000002")]);
        assert!(!list.contains(&id("1000002")));
        // the entry is gone, so a further tick reports nothing
        assert!(list.tick(100).is_empty());
    }

    #[test]
    fn time_left_is_never_negative() {
        let list = WaitingList::new();
        list.register(id("1000003"), 50);
        let lapsed = list.tick(100);
        assert_eq!(lapsed, vec![id("1000003")]);
        assert_eq!(list.time_left(&id("1000003")), None);
    }

    #[test]
    fn snapshot_and_restore_round_trip() {
        let list = WaitingList::new();
        list.register(id("1000004"), 5000);
        list.register(id("1000005"), 100);
        let mut snapshot = list.snapshot();
        snapshot.push(WaitingEntry { payment_id: id("1000006"), remaining_millis: 0 });

        let restored = WaitingList::new();
        restored.restore(snapshot);
        assert_eq!(restored.len(), 2);
        assert_eq!(restored.time_left(&id("1000004")), Some(5000));
        // already-lapsed entries are not resurrected
        assert!(!restored.contains(&id("1000006")));
    }

    #[test]
    fn whitelist_add_contains_remove() {
        let wl = Whitelist::new();
        assert!(wl.add("abc123"));
        assert!(!wl.add("abc123"));
        assert!(wl.contains("abc123"));
        assert!(wl.remove("abc123"));
        assert!(!wl.contains("abc123"));
        assert!(wl.is_empty());
    }
}
