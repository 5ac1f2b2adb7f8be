//! In-process aggregation cache: an LRU keyed by `(endpoint, canonical
//! params JSON)`, bounded by both entry-count (via `lru::LruCache`) and a
//! running byte budget, with a TTL on top. Mirrors the rate limiter's
//! `parking_lot::Mutex`-guarded shared-state idiom elsewhere in this
//! codebase rather than reaching for an external cache service -- this
//! cache is process-local and does not survive a restart or coordinate
//! across replicas.

use lru::LruCache;
use parking_lot::Mutex;
use serde_json::Value;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

struct CachedEntry {
    payload: Value,
    inserted_at: Instant,
    size_bytes: u64,
}

struct Inner {
    entries: LruCache<String, CachedEntry>,
    current_bytes: u64,
}

pub struct AggregateCache {
    inner: Mutex<Inner>,
    max_bytes: u64,
    ttl: Duration,
}

impl AggregateCache {
    pub fn new(max_bytes: u64, ttl_seconds: u64) -> Self {
        Self {
            // Count-unbounded (capped by byte budget instead); a cap this
            // large never triggers `lru`'s own count-based eviction first.
            inner: Mutex::new(Inner {
                entries: LruCache::new(NonZeroUsize::new(1_000_000).unwrap()),
                current_bytes: 0,
            }),
            max_bytes,
            ttl: Duration::from_secs(ttl_seconds),
        }
    }

    /// Stable cache key: `endpoint` plus the sorted-key JSON serialization
    /// of the already-canonicalized params (empty/null fields must already
    /// be stripped by the caller -- see `AggregateParams::canonical_json`).
    pub fn build_key(endpoint: &str, canonical_params: &Value) -> String {
        format!("{endpoint}:{canonical_params}")
    }

    /// Returns the cached payload if present and not expired. An expired
    /// entry is evicted on lookup rather than waiting for the next `put`.
    pub fn get(&self, key: &str) -> Option<Value> {
        let mut inner = self.inner.lock();
        let expired = match inner.entries.peek(key) {
            Some(entry) => entry.inserted_at.elapsed() >= self.ttl,
            None => return None,
        };
        if expired {
            if let Some(entry) = inner.entries.pop(key) {
                inner.current_bytes = inner.current_bytes.saturating_sub(entry.size_bytes);
            }
            return None;
        }
        inner.entries.get(key).map(|entry| entry.payload.clone())
    }

    /// Inserts a computed payload, then evicts least-recently-used entries
    /// until the running byte budget is back under `max_bytes`.
    pub fn put(&self, key: String, payload: Value) {
        let size_bytes = serde_json::to_vec(&payload).map(|v| v.len() as u64).unwrap_or(0);
        let mut inner = self.inner.lock();

        if let Some(old) = inner.entries.put(
            key,
            CachedEntry {
                payload,
                inserted_at: Instant::now(),
                size_bytes,
            },
        ) {
            inner.current_bytes = inner.current_bytes.saturating_sub(old.size_bytes);
        }
        inner.current_bytes += size_bytes;

        while inner.current_bytes > self.max_bytes {
            match inner.entries.pop_lru() {
                Some((_, evicted)) => {
                    inner.current_bytes = inner.current_bytes.saturating_sub(evicted.size_bytes);
                }
                None => break,
            }
        }
    }

    /// Drops every cached entry. Called by the promoter after a successful
    /// promotion, since any cached aggregate result may now be stale.
    pub fn flush(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.current_bytes = 0;
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn put_then_get_round_trips() {
        let cache = AggregateCache::new(1024 * 1024, 300);
        cache.put("aggregate:{}".to_string(), json!({"data": [1, 2, 3]}));
        assert_eq!(cache.get("aggregate:{}"), Some(json!({"data": [1, 2, 3]})));
    }

    #[test]
    fn miss_returns_none() {
        let cache = AggregateCache::new(1024, 300);
        assert_eq!(cache.get("nonexistent"), None);
    }

    #[test]
    fn ttl_zero_expires_immediately() {
        let cache = AggregateCache::new(1024, 0);
        cache.put("k".to_string(), json!({"a": 1}));
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(cache.get("k"), None);
    }

    #[test]
    fn flush_clears_everything() {
        let cache = AggregateCache::new(1024 * 1024, 300);
        cache.put("k1".to_string(), json!(1));
        cache.put("k2".to_string(), json!(2));
        cache.flush();
        assert!(cache.is_empty());
    }

    #[test]
    fn byte_budget_evicts_least_recently_used() {
        let big_value = json!("x".repeat(200));
        // Budget fits roughly one entry; inserting a second should evict the first.
        let cache = AggregateCache::new(250, 300);
        cache.put("first".to_string(), big_value.clone());
        cache.put("second".to_string(), big_value);
        assert!(cache.get("first").is_none());
        assert!(cache.get("second").is_some());
    }
}
