//! Expiring Key-Value Store
//!
//! This module implements the store behind every connection. Each key maps to
//! an [`Entry`] holding the value and an optional absolute expiry instant in
//! milliseconds.
//!
//! ## Lazy Expiry
//!
//! There is no background sweep. An entry whose expiry has passed is simply
//! treated as absent by [`ExpiringStore::get`], which also drops it from the
//! map while it is there. Entries that expire and are never read again stay
//! in memory until they are overwritten.
//!
//! ## Concurrency Model
//!
//! ```text
//! ┌──────────────────────────────────────┐
//! │            ExpiringStore             │
//! │  ┌────────────────────────────────┐  │
//! │  │ RwLock<HashMap<String, Entry>> │  │
//! │  └────────────────────────────────┘  │
//! │                 ▲                    │
//! │                 │ now_ms()           │
//! │            ┌────┴────┐               │
//! │            │  Clock  │               │
//! │            └─────────┘               │
//! └──────────────────────────────────────┘
//! ```
//!
//! Connection tasks run on a multi-threaded runtime, so every access goes
//! through one coarse `RwLock`. An overwrite replaces value and expiry with a
//! single insert under the write lock, so readers never observe a half-updated
//! entry.

use crate::storage::clock::{Clock, SystemClock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

/// A stored value with an optional absolute expiry time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// The stored value
    pub value: String,
    /// Expiry instant in clock milliseconds (None = never expires)
    pub expire_at: Option<u64>,
}

impl Entry {
    /// Creates an entry that expires at `expire_at`, or never if `None`.
    pub fn new(value: impl Into<String>, expire_at: Option<u64>) -> Self {
        Self {
            value: value.into(),
            expire_at,
        }
    }

    /// Checks whether this entry is logically gone at `now_ms`.
    #[inline]
    pub fn is_expired_at(&self, now_ms: u64) -> bool {
        self.expire_at.is_some_and(|at| now_ms >= at)
    }

    /// Returns the remaining lifetime at `now_ms`, or None if no expiry is set.
    pub fn remaining_ms(&self, now_ms: u64) -> Option<u64> {
        self.expire_at.map(|at| at.saturating_sub(now_ms))
    }
}

/// Snapshot of store counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StorageStats {
    /// Entries physically present (expired ones included until read)
    pub keys: u64,
    /// Total `put` calls
    pub puts: u64,
    /// Total `get` calls
    pub gets: u64,
    /// `get` calls that returned a value
    pub hits: u64,
    /// `get` calls that returned nothing
    pub misses: u64,
    /// Entries removed because a read found them expired
    pub expired: u64,
}

/// The in-memory store shared by all connections.
///
/// Wrap it in an `Arc` and hand a clone to each connection's command handler.
///
/// # Example
///
/// ```
/// use lazykv::storage::{ExpiringStore, ManualClock};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let clock = ManualClock::new(0);
/// let store = ExpiringStore::with_clock(Arc::new(clock.clone()));
///
/// store.put("session", "abc123", Some(Duration::from_millis(100)));
/// assert_eq!(store.get("session").as_deref(), Some("abc123"));
///
/// clock.advance(Duration::from_millis(150));
/// assert_eq!(store.get("session"), None);
/// ```
pub struct ExpiringStore {
    entries: RwLock<HashMap<String, Entry>>,
    clock: Arc<dyn Clock>,

    put_count: AtomicU64,
    get_count: AtomicU64,
    hit_count: AtomicU64,
    expired_count: AtomicU64,
}

impl std::fmt::Debug for ExpiringStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExpiringStore")
            .field("keys", &self.len())
            .field("put_count", &self.put_count.load(Ordering::Relaxed))
            .field("get_count", &self.get_count.load(Ordering::Relaxed))
            .finish()
    }
}

impl Default for ExpiringStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ExpiringStore {
    /// Creates an empty store reading the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock::new()))
    }

    /// Creates an empty store reading the given clock.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            clock,
            put_count: AtomicU64::new(0),
            get_count: AtomicU64::new(0),
            hit_count: AtomicU64::new(0),
            expired_count: AtomicU64::new(0),
        }
    }

    // A panic while holding the lock cannot leave a half-written entry behind,
    // so a poisoned lock is still safe to use.
    fn read_entries(&self) -> RwLockReadGuard<'_, HashMap<String, Entry>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_entries(&self) -> RwLockWriteGuard<'_, HashMap<String, Entry>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Inserts or overwrites `key`.
    ///
    /// With `ttl` set to a non-zero duration the entry expires `ttl` after the
    /// current clock reading. `None` and a zero duration both mean the entry
    /// never expires.
    pub fn put(&self, key: impl Into<String>, value: impl Into<String>, ttl: Option<Duration>) {
        self.put_count.fetch_add(1, Ordering::Relaxed);

        let expire_at = ttl
            .filter(|ttl| !ttl.is_zero())
            .map(|ttl| {
                let ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
                self.clock.now_ms().saturating_add(ms)
            });

        self.write_entries()
            .insert(key.into(), Entry::new(value, expire_at));
    }

    /// Returns the live value for `key`.
    ///
    /// The clock is read once; an entry whose expiry is at or before that
    /// reading is reported as absent and removed.
    pub fn get(&self, key: &str) -> Option<String> {
        self.get_count.fetch_add(1, Ordering::Relaxed);
        let now = self.clock.now_ms();

        let value = self.get_at(key, now);
        if value.is_some() {
            self.hit_count.fetch_add(1, Ordering::Relaxed);
        }
        value
    }

    fn get_at(&self, key: &str, now: u64) -> Option<String> {
        {
            let entries = self.read_entries();
            match entries.get(key) {
                Some(entry) if !entry.is_expired_at(now) => return Some(entry.value.clone()),
                Some(_) => {}
                None => return None,
            }
        }

        // Expired under the read lock. Another task may have overwritten the
        // key before we got the write lock, so check again against `now`.
        let mut entries = self.write_entries();
        match entries.get(key) {
            Some(entry) if entry.is_expired_at(now) => {
                entries.remove(key);
                self.expired_count.fetch_add(1, Ordering::Relaxed);
                None
            }
            Some(entry) => Some(entry.value.clone()),
            None => None,
        }
    }

    /// Returns a copy of the raw entry for `key`, expired or not.
    pub fn entry(&self, key: &str) -> Option<Entry> {
        self.read_entries().get(key).cloned()
    }

    /// Returns the number of entries physically held.
    pub fn len(&self) -> usize {
        self.read_entries().len()
    }

    /// Returns true if no entries are held.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns store statistics.
    pub fn stats(&self) -> StorageStats {
        let gets = self.get_count.load(Ordering::Relaxed);
        let hits = self.hit_count.load(Ordering::Relaxed);
        StorageStats {
            keys: self.len() as u64,
            puts: self.put_count.load(Ordering::Relaxed),
            gets,
            hits,
            misses: gets.saturating_sub(hits),
            expired: self.expired_count.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::clock::ManualClock;

    fn store_with_clock() -> (ExpiringStore, ManualClock) {
        let clock = ManualClock::new(1_000_000);
        let store = ExpiringStore::with_clock(Arc::new(clock.clone()));
        (store, clock)
    }

    #[test]
    fn test_put_and_get() {
        let store = ExpiringStore::new();

        store.put("key", "value", None);
        assert_eq!(store.get("key").as_deref(), Some("value"));
    }

    #[test]
    fn test_get_nonexistent() {
        let store = ExpiringStore::new();
        assert_eq!(store.get("nonexistent"), None);
    }

    #[test]
    fn test_ttl_expiry() {
        let (store, clock) = store_with_clock();

        for ttl in [1u64, 50, 100, 86_400_000] {
            let key = format!("key-{}", ttl);
            store.put(key.as_str(), "v", Some(Duration::from_millis(ttl)));
            assert_eq!(store.get(&key).as_deref(), Some("v"));

            clock.advance(Duration::from_millis(ttl + 1));
            assert_eq!(store.get(&key), None);
        }
    }

    #[test]
    fn test_expiry_boundary_is_inclusive() {
        let (store, clock) = store_with_clock();

        store.put("key", "value", Some(Duration::from_millis(100)));

        clock.advance(Duration::from_millis(99));
        assert_eq!(store.get("key").as_deref(), Some("value"));

        clock.advance(Duration::from_millis(1));
        assert_eq!(store.get("key"), None);
    }

    #[test]
    fn test_no_ttl_persists() {
        let (store, clock) = store_with_clock();

        store.put("key", "value", None);
        clock.advance(Duration::from_secs(10 * 365 * 24 * 3600));

        assert_eq!(store.get("key").as_deref(), Some("value"));
    }

    #[test]
    fn test_zero_ttl_means_no_expiry() {
        let (store, clock) = store_with_clock();

        store.put("key", "value", Some(Duration::ZERO));
        assert_eq!(store.entry("key").unwrap().expire_at, None);

        clock.advance(Duration::from_secs(3600));
        assert_eq!(store.get("key").as_deref(), Some("value"));
    }

    #[test]
    fn test_overwrite_replaces_expiry() {
        let (store, clock) = store_with_clock();

        store.put("key", "v1", Some(Duration::from_millis(10)));
        store.put("key", "v2", None);

        clock.advance(Duration::from_secs(60));
        assert_eq!(store.get("key").as_deref(), Some("v2"));
    }

    #[test]
    fn test_overwrite_adds_expiry() {
        let (store, clock) = store_with_clock();

        store.put("key", "v1", None);
        store.put("key", "v2", Some(Duration::from_millis(10)));

        clock.advance(Duration::from_millis(20));
        assert_eq!(store.get("key"), None);
    }

    #[test]
    fn test_expired_entry_removed_on_read() {
        let (store, clock) = store_with_clock();

        store.put("short", "a", Some(Duration::from_millis(10)));
        store.put("forever", "b", None);
        clock.advance(Duration::from_millis(50));

        // Nothing removes the entry until it is read.
        assert_eq!(store.len(), 2);

        assert_eq!(store.get("short"), None);
        assert_eq!(store.len(), 1);
        assert_eq!(store.stats().expired, 1);
    }

    #[test]
    fn test_entry_helpers() {
        let entry = Entry::new("v", Some(1_500));
        assert!(!entry.is_expired_at(1_499));
        assert!(entry.is_expired_at(1_500));
        assert_eq!(entry.remaining_ms(1_200), Some(300));
        assert_eq!(entry.remaining_ms(2_000), Some(0));

        let forever = Entry::new("v", None);
        assert!(!forever.is_expired_at(u64::MAX));
        assert_eq!(forever.remaining_ms(0), None);
    }

    #[test]
    fn test_huge_ttl_saturates() {
        let (store, _clock) = store_with_clock();

        store.put("key", "value", Some(Duration::MAX));
        assert_eq!(store.entry("key").unwrap().expire_at, Some(u64::MAX));
        assert_eq!(store.get("key").as_deref(), Some("value"));
    }

    #[test]
    fn test_stats() {
        let store = ExpiringStore::new();

        store.put("a", "1", None);
        store.put("b", "2", None);
        store.get("a");
        store.get("missing");

        let stats = store.stats();
        assert_eq!(stats.keys, 2);
        assert_eq!(stats.puts, 2);
        assert_eq!(stats.gets, 2);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn test_concurrent_access() {
        use std::thread;

        let store = Arc::new(ExpiringStore::new());
        let mut handles = vec![];

        for i in 0..10 {
            let store = Arc::clone(&store);
            handles.push(thread::spawn(move || {
                for j in 0..100 {
                    let key = format!("key-{}-{}", i, j);
                    store.put(key.as_str(), "value", None);
                    assert_eq!(store.get(&key).as_deref(), Some("value"));
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.len(), 1000);
    }

    #[test]
    fn test_overwrite_racing_expired_read_survives() {
        use std::sync::atomic::AtomicBool;
        use std::sync::Barrier;
        use std::thread;

        const READERS: usize = 4;
        const ROUNDS: usize = 200;

        let (store, clock) = store_with_clock();

        for round in 0..ROUNDS {
            let key = format!("key-{}", round);
            store.put(key.as_str(), "stale", Some(Duration::from_millis(1)));
            clock.advance(Duration::from_millis(1));

            let written = AtomicBool::new(false);
            let start = Barrier::new(READERS + 1);

            // Readers find the stale entry expired while the writer replaces
            // it. Removal of the stale entry must never take the new one.
            thread::scope(|s| {
                for _ in 0..READERS {
                    s.spawn(|| {
                        start.wait();
                        for _ in 0..50 {
                            let after_write = written.load(Ordering::Acquire);
                            let value = store.get(&key);
                            assert_ne!(value.as_deref(), Some("stale"));
                            if after_write {
                                assert_eq!(value.as_deref(), Some("fresh"));
                            }
                        }
                    });
                }

                s.spawn(|| {
                    start.wait();
                    store.put(key.as_str(), "fresh", None);
                    written.store(true, Ordering::Release);
                });
            });

            assert_eq!(store.get(&key).as_deref(), Some("fresh"));
        }

        assert_eq!(store.len(), ROUNDS);
    }

    #[test]
    fn test_real_clock_expiry() {
        let store = ExpiringStore::new();

        store.put("key", "value", Some(Duration::from_millis(50)));
        assert_eq!(store.get("key").as_deref(), Some("value"));

        std::thread::sleep(Duration::from_millis(100));
        assert_eq!(store.get("key"), None);
    }
}
