//! In-memory TTL caches.
//!
//! Two independent caches share this store: raw provider payloads keyed by
//! `(kind, latitude, longitude)` and the aggregated bulk metrics list.

use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::types::DistrictMetrics;

/// Key/value store with a per-entry time-to-live.
///
/// Reads and writes are synchronous; callers never hold a lock across an await.
pub trait CacheStore<V>: Send + Sync {
    /// Return the stored value if present and not expired
    fn get(&self, key: &str) -> Option<V>;

    /// Store `value` under `key` for `ttl`, replacing any previous entry
    fn set(&self, key: &str, value: V, ttl: Duration);
}

/// Shared cache of raw provider payloads
pub type PayloadCache = Arc<dyn CacheStore<Value>>;

/// Shared cache of aggregated bulk output
pub type MetricsCache = Arc<dyn CacheStore<Vec<DistrictMetrics>>>;

#[derive(Debug)]
struct CacheEntry<V> {
    value: V,
    /// `None` when the TTL is too large to represent; the entry never expires
    expires_at: Option<Instant>,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// Process-local `CacheStore` backed by a mutex-guarded map
#[derive(Debug)]
pub struct MemoryCache<V> {
    entries: Mutex<HashMap<String, CacheEntry<V>>>,
}

impl<V> Default for MemoryCache<V> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl<V> MemoryCache<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, including ones that expired but were not yet read
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Drop every expired entry, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        before - entries.len()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

impl<V> CacheStore<V> for MemoryCache<V>
where
    V: Clone + Send,
{
    fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        let mut entries = self.entries.lock();

        match entries.get(key) {
            Some(entry) if entry.is_expired(now) => {
                entries.remove(key);
                None
            }
            Some(entry) => Some(entry.value.clone()),
            None => None,
        }
    }

    fn set(&self, key: &str, value: V, ttl: Duration) {
        let entry = CacheEntry {
            value,
            expires_at: Instant::now().checked_add(ttl),
        };
        self.entries.lock().insert(key.to_string(), entry);
    }
}
