//! Shard Store
//!
//! One independently locked partition of the cache. A shard owns:
//!
//! - an **index** from key to the entry's slot in the write-order list
//! - a **write-order list** of entries, oldest write at the head
//! - a **capacity**: the maximum number of entries the shard may hold
//!
//! ## Recency
//!
//! Order is only changed by writes. A `set` of a new key appends at the
//! tail, a `set` of an existing key moves it to the tail, and `get` leaves
//! the order alone. Capacity eviction therefore removes the entry with the
//! oldest *write*, not the least recently *read* one.
//!
//! ## Locking
//!
//! ```text
//!   get     read lock ──hit──> clone value
//!              │
//!              └─expired──> drop read lock ─> write lock ─> re-validate id + expiry ─> unlink
//!   set     write lock (lookup + insert/update/evict)
//!   remove  write lock (lookup + unlink)
//!   sweep   read lock (collect expired ids) ─> per candidate: write lock ─> re-validate ─> unlink
//! ```
//!
//! Every unlink that happens after a lock was dropped and re-acquired checks
//! that the key still maps to the *same* entry (by id) and that it is *still*
//! expired. Anything else means a concurrent operation got there first, and
//! the removal quietly does nothing.
//!
//! Eviction callbacks are queued only after the write lock is released.

use crate::notify::Notifier;
use crate::storage::entry::{Entry, EntryId};
use crate::storage::list::{Slot, WriteOrderList};
use parking_lot::RwLock;
use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::trace;

/// The data guarded by a shard's lock.
struct ShardInner<K, V> {
    index: HashMap<K, Slot>,
    order: WriteOrderList<Entry<K, V>>,
    next_id: EntryId,
}

impl<K, V> ShardInner<K, V>
where
    K: Hash + Eq + Clone,
{
    fn new(capacity: usize) -> Self {
        let reserve = capacity.min(64);
        Self {
            index: HashMap::with_capacity(reserve),
            order: WriteOrderList::with_capacity(reserve),
            next_id: 0,
        }
    }

    fn entry<Q>(&self, key: &Q) -> Option<&Entry<K, V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let slot = *self.index.get(key)?;
        self.order.get(slot)
    }

    fn unlink<Q>(&mut self, key: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let slot = self.index.remove(key)?;
        let entry = self.order.remove(slot)?;
        Some((entry.key, entry.value))
    }

    fn evict_oldest(&mut self) -> Option<(K, V)> {
        let entry = self.order.pop_front()?;
        self.index.remove(&entry.key);
        Some((entry.key, entry.value))
    }

    fn insert(&mut self, key: K, value: V, ttl: Duration, now: Instant) {
        let id = self.next_id;
        self.next_id += 1;
        let slot = self
            .order
            .push_back(Entry::new(key.clone(), value, ttl, now, id));
        self.index.insert(key, slot);
    }
}

/// A single shard containing a portion of the key-value pairs.
pub struct Shard<K, V> {
    inner: RwLock<ShardInner<K, V>>,
    capacity: usize,
    notifier: Arc<Notifier<K, V>>,
}

impl<K, V> fmt::Debug for Shard<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shard")
            .field("len", &self.inner.read().index.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}

impl<K, V> Shard<K, V>
where
    K: Hash + Eq + Clone + Send + 'static,
    V: Clone + Send + 'static,
{
    /// Creates an empty shard holding at most `capacity` entries.
    ///
    /// A capacity of zero is raised to one.
    pub fn new(capacity: usize, notifier: Arc<Notifier<K, V>>) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: RwLock::new(ShardInner::new(capacity)),
            capacity,
            notifier,
        }
    }

    /// Gets the value for a key.
    ///
    /// Returns `None` if the key doesn't exist or has expired. An expired
    /// entry found here is removed and reported to the eviction callback.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let now = Instant::now();

        // Fast path: shared lock only
        let stale = {
            let inner = self.inner.read();
            let entry = inner.entry(key)?;
            if !entry.is_expired_at(now) {
                return Some(entry.value.clone());
            }
            entry.id
        };

        if let Some((key, value)) = self.remove_expired(key, stale) {
            trace!("Expired entry removed on read");
            self.notifier.notify(key, value);
        }
        None
    }

    /// Sets a key-value pair with a TTL. `Duration::ZERO` never expires.
    ///
    /// Overwriting a key keeps it as a single entry and makes it the most
    /// recently written one. Inserting a new key into a full shard evicts the
    /// oldest write first.
    pub fn set(&self, key: K, value: V, ttl: Duration) {
        let now = Instant::now();

        let evicted = {
            let mut inner = self.inner.write();

            if let Some(&slot) = inner.index.get(&key) {
                if let Some(entry) = inner.order.get_mut(slot) {
                    entry.refresh(value, ttl, now);
                }
                inner.order.move_to_back(slot);
                return;
            }

            let evicted = if inner.order.len() >= self.capacity {
                inner.evict_oldest()
            } else {
                None
            };
            inner.insert(key, value, ttl, now);
            evicted
        };

        if let Some((key, value)) = evicted {
            trace!(capacity = self.capacity, "Evicted oldest write");
            self.notifier.notify(key, value);
        }
    }

    /// Removes a key, returning its previous value.
    ///
    /// Removing an absent key returns `None` and notifies nobody.
    pub fn remove<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let (key, value) = self.inner.write().unlink(key)?;

        if self.notifier.is_enabled() {
            self.notifier.notify(key, value.clone());
        }
        Some(value)
    }

    /// Removes every entry that is expired right now.
    ///
    /// Returns the number of entries this call actually removed. Candidates
    /// that a concurrent `get`, `remove` or `set` dealt with in the meantime
    /// are skipped.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();

        let candidates: Vec<(K, EntryId)> = {
            let inner = self.inner.read();
            inner
                .order
                .iter()
                .filter(|(_, entry)| entry.is_expired_at(now))
                .map(|(_, entry)| (entry.key.clone(), entry.id))
                .collect()
        };

        let mut removed = 0;
        for (key, id) in candidates {
            if let Some((key, value)) = self.remove_expired(&key, id) {
                removed += 1;
                self.notifier.notify(key, value);
            }
        }
        removed
    }

    /// Unlinks `key` only if it still refers to entry `id` and that entry is
    /// still expired.
    fn remove_expired<Q>(&self, key: &Q, id: EntryId) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let mut inner = self.inner.write();
        let entry = inner.entry(key)?;
        if entry.id != id || !entry.is_expired_at(Instant::now()) {
            return None;
        }
        inner.unlink(key)
    }

    /// Number of entries held, including expired ones not yet reclaimed.
    pub fn len(&self) -> usize {
        self.inner.read().index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drops every entry and releases the shard's memory.
    ///
    /// No eviction callbacks fire. Callers must not race other operations
    /// against `close`.
    pub fn close(&self) {
        let mut inner = self.inner.write();
        inner.index = HashMap::new();
        inner.order.clear();
    }

    #[cfg(test)]
    pub(crate) fn keys_in_write_order(&self) -> Vec<K> {
        self.inner
            .read()
            .order
            .iter()
            .map(|(_, entry)| entry.key.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::{EvictionCallback, NotifyConfig};
    use std::sync::mpsc;
    use std::thread;

    const NEVER: Duration = Duration::ZERO;

    fn shard(capacity: usize) -> Shard<String, i32> {
        Shard::new(capacity, Arc::new(Notifier::disabled()))
    }

    fn shard_with_events(capacity: usize) -> (Shard<String, i32>, mpsc::Receiver<(String, i32)>) {
        let (tx, rx) = mpsc::channel();
        let tx = std::sync::Mutex::new(tx);
        let callback: EvictionCallback<String, i32> = Arc::new(move |k, v| {
            let _ = tx.lock().unwrap().send((k, v));
        });
        let notifier = Notifier::spawn(callback, &NotifyConfig::default()).unwrap();
        (Shard::new(capacity, Arc::new(notifier)), rx)
    }

    fn next_event(rx: &mpsc::Receiver<(String, i32)>) -> (String, i32) {
        rx.recv_timeout(Duration::from_secs(1)).unwrap()
    }

    fn assert_no_event(rx: &mpsc::Receiver<(String, i32)>) {
        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
    }

    #[test]
    fn test_set_and_get() {
        let shard = shard(10);
        shard.set("name".to_string(), 1, NEVER);

        assert_eq!(shard.get("name"), Some(1));
        assert_eq!(shard.len(), 1);
    }

    #[test]
    fn test_get_nonexistent() {
        let shard = shard(10);
        assert_eq!(shard.get("nonexistent"), None);
    }

    #[test]
    fn test_capacity_evicts_oldest_write() {
        let (shard, rx) = shard_with_events(2);
        shard.set("a".to_string(), 1, NEVER);
        shard.set("b".to_string(), 2, NEVER);
        shard.set("c".to_string(), 3, NEVER);

        assert_eq!(next_event(&rx), ("a".to_string(), 1));
        assert_no_event(&rx);

        assert_eq!(shard.get("a"), None);
        assert_eq!(shard.get("b"), Some(2));
        assert_eq!(shard.get("c"), Some(3));
        assert_eq!(shard.len(), 2);
    }

    #[test]
    fn test_get_does_not_reorder() {
        let (shard, rx) = shard_with_events(2);
        shard.set("a".to_string(), 1, NEVER);
        shard.set("b".to_string(), 2, NEVER);

        // Reading "a" does not protect it from eviction
        assert_eq!(shard.get("a"), Some(1));
        shard.set("c".to_string(), 3, NEVER);

        assert_eq!(next_event(&rx), ("a".to_string(), 1));
        assert_eq!(shard.keys_in_write_order(), vec!["b", "c"]);
    }

    #[test]
    fn test_overwrite_moves_to_newest() {
        let (shard, rx) = shard_with_events(2);
        shard.set("a".to_string(), 1, NEVER);
        shard.set("b".to_string(), 2, NEVER);
        shard.set("a".to_string(), 10, NEVER);

        assert_eq!(shard.len(), 2);
        assert_eq!(shard.keys_in_write_order(), vec!["b", "a"]);
        assert_no_event(&rx);

        // "b" is now the oldest write
        shard.set("c".to_string(), 3, NEVER);
        assert_eq!(next_event(&rx), ("b".to_string(), 2));
        assert_eq!(shard.get("a"), Some(10));
    }

    #[test]
    fn test_overwrite_keeps_single_entry() {
        let shard = shard(10);
        shard.set("k".to_string(), 1, NEVER);
        shard.set("k".to_string(), 2, NEVER);

        assert_eq!(shard.get("k"), Some(2));
        assert_eq!(shard.len(), 1);
    }

    #[test]
    fn test_overwrite_clears_ttl() {
        let shard = shard(10);
        shard.set("k".to_string(), 1, Duration::from_millis(10));
        shard.set("k".to_string(), 2, NEVER);

        thread::sleep(Duration::from_millis(30));
        assert_eq!(shard.get("k"), Some(2));
    }

    #[test]
    fn test_remove() {
        let (shard, rx) = shard_with_events(10);
        shard.set("k".to_string(), 7, NEVER);

        assert_eq!(shard.remove("k"), Some(7));
        assert_eq!(next_event(&rx), ("k".to_string(), 7));
        assert_eq!(shard.get("k"), None);
        assert!(shard.is_empty());

        // Second remove is a silent miss
        assert_eq!(shard.remove("k"), None);
        assert_no_event(&rx);
    }

    #[test]
    fn test_remove_never_set_fires_nothing() {
        let (shard, rx) = shard_with_events(10);
        assert_eq!(shard.remove("z"), None);
        assert_no_event(&rx);
    }

    #[test]
    fn test_lazy_expiry_on_get() {
        let (shard, rx) = shard_with_events(10);
        shard.set("x".to_string(), 5, Duration::from_millis(5));
        assert_eq!(shard.get("x"), Some(5));

        thread::sleep(Duration::from_millis(20));

        // Still counted until something touches it
        assert_eq!(shard.len(), 1);
        assert_eq!(shard.get("x"), None);
        assert_eq!(shard.len(), 0);
        assert_eq!(next_event(&rx), ("x".to_string(), 5));
    }

    #[test]
    fn test_sweep_removes_only_expired() {
        let (shard, rx) = shard_with_events(10);
        shard.set("key1".to_string(), 1, Duration::from_millis(10));
        shard.set("key2".to_string(), 2, Duration::from_millis(10));
        shard.set("key3".to_string(), 3, NEVER);

        thread::sleep(Duration::from_millis(50));

        assert_eq!(shard.sweep(), 2);
        assert_eq!(shard.len(), 1);
        assert_eq!(shard.get("key3"), Some(3));

        let mut events = vec![next_event(&rx), next_event(&rx)];
        events.sort();
        assert_eq!(events, vec![("key1".to_string(), 1), ("key2".to_string(), 2)]);

        assert_eq!(shard.sweep(), 0);
    }

    #[test]
    fn test_stale_removal_is_a_noop() {
        let shard = shard(10);
        shard.set("k".to_string(), 1, Duration::from_millis(5));
        let old_id = shard.inner.read().entry("k").unwrap().id;
        thread::sleep(Duration::from_millis(20));

        // Another caller removed and re-created the key in the window
        // between the read lock and the write lock.
        shard.remove("k");
        shard.set("k".to_string(), 2, Duration::from_millis(5));
        thread::sleep(Duration::from_millis(20));

        assert!(shard.remove_expired("k", old_id).is_none());
        assert_eq!(shard.len(), 1);
    }

    #[test]
    fn test_refreshed_entry_survives_stale_removal() {
        let shard = shard(10);
        shard.set("k".to_string(), 1, Duration::from_millis(5));
        let id = shard.inner.read().entry("k").unwrap().id;
        thread::sleep(Duration::from_millis(20));

        // Same entry (same id) but refreshed, so no longer expired
        shard.set("k".to_string(), 2, NEVER);

        assert!(shard.remove_expired("k", id).is_none());
        assert_eq!(shard.get("k"), Some(2));
    }

    #[test]
    fn test_zero_capacity_is_raised_to_one() {
        let shard = shard(0);
        assert_eq!(shard.capacity(), 1);
        shard.set("a".to_string(), 1, NEVER);
        shard.set("b".to_string(), 2, NEVER);
        assert_eq!(shard.len(), 1);
        assert_eq!(shard.get("b"), Some(2));
    }

    #[test]
    fn test_close_releases_entries_without_callbacks() {
        let (shard, rx) = shard_with_events(10);
        shard.set("a".to_string(), 1, NEVER);
        shard.set("b".to_string(), 2, NEVER);

        shard.close();

        assert_eq!(shard.len(), 0);
        assert_eq!(shard.get("a"), None);
        assert_no_event(&rx);
    }

    #[test]
    fn test_concurrent_expired_gets_remove_once() {
        let (shard, rx) = shard_with_events(100);
        let shard = Arc::new(shard);
        for i in 0..50 {
            shard.set(format!("k{}", i), i, Duration::from_millis(5));
        }
        thread::sleep(Duration::from_millis(20));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let shard = Arc::clone(&shard);
                thread::spawn(move || {
                    for i in 0..50 {
                        assert_eq!(shard.get(format!("k{}", i).as_str()), None);
                    }
                    shard.sweep()
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(shard.len(), 0);
        let events: Vec<_> = (0..50).map(|_| next_event(&rx)).collect();
        assert_eq!(events.len(), 50);
        assert_no_event(&rx);
    }

    #[test]
    fn test_concurrent_access() {
        let shard = Arc::new(shard(10_000));
        let mut handles = vec![];

        for t in 0..8 {
            let shard = Arc::clone(&shard);
            handles.push(thread::spawn(move || {
                for j in 0..500 {
                    let key = format!("key-{}-{}", t, j);
                    shard.set(key.clone(), j, NEVER);
                    assert_eq!(shard.get(key.as_str()), Some(j));
                    if j % 5 == 0 {
                        assert_eq!(shard.remove(key.as_str()), Some(j));
                    }
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        // 8 threads * (500 - 100 removed)
        assert_eq!(shard.len(), 3_200);
        assert_eq!(shard.keys_in_write_order().len(), 3_200);
    }
}
