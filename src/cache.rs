//! Byte-size-bounded key-value cache stores.
//!
//! The pipeline talks to its caches through the [`CacheStore`] trait and
//! never assumes an entry persists — stores own their eviction policy.
//! [`MemoryStore`] is the bundled implementation; deployments with an
//! external store implement the trait instead.

use crate::error::{Error, Result};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use tracing::{debug, warn};

/// A byte-size-bounded key-value store. Implementations must be internally
/// thread-safe; the pipeline never wraps a store in its own lock.
pub trait CacheStore: Send + Sync {
    /// Look up a value by key.
    fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Insert or replace a value. The store may decline to retain it.
    fn set(&self, key: &str, value: Value) -> Result<()>;

    /// Remove a key. Removing an absent key is not an error.
    fn delete(&self, key: &str) -> Result<()>;

    /// Check whether a key is present.
    fn contains(&self, key: &str) -> Result<bool>;
}

/// Cache get with the miss-on-failure policy applied: a store error is
/// logged and treated as if the key were absent.
pub fn get_or_miss(store: &dyn CacheStore, key: &str) -> Option<Value> {
    match store.get(key) {
        Ok(value) => value,
        Err(e) => {
            warn!(key, error = %e, "cache get failed, treating as miss");
            None
        }
    }
}

/// Cache set that logs failures instead of propagating them.
pub fn set_or_log(store: &dyn CacheStore, key: &str, value: Value) {
    if let Err(e) = store.set(key, value) {
        warn!(key, error = %e, "cache set failed");
    }
}

/// Cache delete that logs failures instead of propagating them.
pub fn delete_or_log(store: &dyn CacheStore, key: &str) {
    if let Err(e) = store.delete(key) {
        warn!(key, error = %e, "cache delete failed");
    }
}

struct Entry {
    value: Value,
    cost: usize,
    seq: u64,
}

struct StoreInner {
    entries: HashMap<String, Entry>,
    // Insertion order for eviction. Deletes and re-sets leave stale slots
    // behind; a slot only counts when its sequence matches the live entry.
    order: VecDeque<(String, u64)>,
    used_bytes: usize,
    next_seq: u64,
}

impl StoreInner {
    fn slot_is_live(&self, key: &str, seq: u64) -> bool {
        self.entries.get(key).map(|e| e.seq) == Some(seq)
    }
}

/// In-memory [`CacheStore`] bounded by an approximate byte budget.
///
/// Entry cost is the serialized JSON length plus the key length. When the
/// budget is exceeded the oldest inserted entries are evicted first.
pub struct MemoryStore {
    max_bytes: usize,
    inner: Mutex<StoreInner>,
}

impl MemoryStore {
    /// Create a store with the given byte budget.
    pub fn new(max_bytes: usize) -> Self {
        Self {
            max_bytes,
            inner: Mutex::new(StoreInner {
                entries: HashMap::new(),
                order: VecDeque::new(),
                used_bytes: 0,
                next_seq: 0,
            }),
        }
    }

    /// Current approximate size of all retained entries.
    pub fn used_bytes(&self) -> usize {
        self.inner.lock().used_bytes
    }

    /// Number of retained entries.
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Whether the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[cfg(test)]
    fn order_len(&self) -> usize {
        self.inner.lock().order.len()
    }
}

impl CacheStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        let inner = self.inner.lock();
        Ok(inner.entries.get(key).map(|e| e.value.clone()))
    }

    fn set(&self, key: &str, value: Value) -> Result<()> {
        let cost = key.len()
            + serde_json::to_string(&value)
                .map_err(|e| Error::cache(format!("unserializable value: {e}")))?
                .len();

        let mut inner = self.inner.lock();

        if let Some(old) = inner.entries.remove(key) {
            inner.used_bytes -= old.cost;
        }

        if cost > self.max_bytes {
            debug!(key, cost, budget = self.max_bytes, "value exceeds cache budget, not retained");
            return Ok(());
        }

        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.used_bytes += cost;
        inner
            .entries
            .insert(key.to_string(), Entry { value, cost, seq });
        inner.order.push_back((key.to_string(), seq));

        while inner.used_bytes > self.max_bytes {
            let Some((oldest, oldest_seq)) = inner.order.pop_front() else {
                break;
            };
            if !inner.slot_is_live(&oldest, oldest_seq) {
                continue;
            }
            if let Some(evicted) = inner.entries.remove(&oldest) {
                inner.used_bytes -= evicted.cost;
                debug!(key = %oldest, "evicted cache entry over byte budget");
            }
        }

        // Under-budget workloads never reach the eviction loop, so drop
        // accumulated stale slots here to keep the queue proportional to
        // the live entry count.
        if inner.order.len() > inner.entries.len() * 2 + 16 {
            let StoreInner { entries, order, .. } = &mut *inner;
            order.retain(|(k, seq)| entries.get(k).map(|e| e.seq) == Some(*seq));
        }

        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        let mut inner = self.inner.lock();
        if let Some(entry) = inner.entries.remove(key) {
            inner.used_bytes -= entry.cost;
        }
        Ok(())
    }

    fn contains(&self, key: &str) -> Result<bool> {
        Ok(self.inner.lock().entries.contains_key(key))
    }
}
