//! Caches (spec.md §4.11): a generic `{get, set, evict, stats}` capability
//! new relative to the teacher (the teacher inlines its LRUs), grounded on
//! the `lru` crate usage in the example repo pack, with in-process
//! LRU/TTL default implementations for the embedding, rerank, type-snapshot,
//! and AST caches named by spec §4.11.

mod change_detector;

pub use change_detector::{calculate_hash, ChangeDetector, ChangeSet};

use std::collections::hash_map::RandomState;
use std::hash::{BuildHasher, Hash};
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use lru::LruCache;
use parking_lot::Mutex;

#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub len: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

pub trait Cache<K, V> {
    fn get(&self, key: &K) -> Option<V>;
    fn set(&self, key: K, value: V);
    fn evict(&self, key: &K) -> Option<V>;
    fn stats(&self) -> CacheStats;
}

struct Entry<V> {
    value: V,
    inserted_at: Instant,
}

/// Bounded LRU with an optional TTL, guarded by a single lock (spec.md §5:
/// "in-process caches... must not hold locks across suspension points" —
/// every method here is synchronous and returns before any `.await`).
pub struct LruTtlCache<K: Hash + Eq, V: Clone, S = RandomState> {
    inner: Mutex<LruCache<K, Entry<V>, S>>,
    ttl: Option<Duration>,
    hits: std::sync::atomic::AtomicU64,
    misses: std::sync::atomic::AtomicU64,
}

impl<K: Hash + Eq, V: Clone> LruTtlCache<K, V, RandomState> {
    pub fn new(capacity: usize, ttl: Option<Duration>) -> Self {
        let cap = NonZeroUsize::new(capacity.max(1)).expect("capacity clamped to at least 1");
        Self {
            inner: Mutex::new(LruCache::new(cap)),
            ttl,
            hits: std::sync::atomic::AtomicU64::new(0),
            misses: std::sync::atomic::AtomicU64::new(0),
        }
    }
}

impl<K: Hash + Eq, V: Clone, S: BuildHasher> Cache<K, V> for LruTtlCache<K, V, S> {
    fn get(&self, key: &K) -> Option<V> {
        let mut inner = self.inner.lock();
        let Some(entry) = inner.get(key) else {
            self.misses.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            return None;
        };
        if let Some(ttl) = self.ttl {
            if entry.inserted_at.elapsed() > ttl {
                inner.pop(key);
                self.misses.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                return None;
            }
        }
        self.hits.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        Some(entry.value.clone())
    }

    fn set(&self, key: K, value: V) {
        self.inner.lock().put(key, Entry { value, inserted_at: Instant::now() });
    }

    fn evict(&self, key: &K) -> Option<V> {
        self.inner.lock().pop(key).map(|e| e.value)
    }

    fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(std::sync::atomic::Ordering::Relaxed),
            misses: self.misses.load(std::sync::atomic::Ordering::Relaxed),
            len: self.inner.lock().len(),
        }
    }
}

/// `hash(text) → vector` (spec.md §4.11). Keyed by the text itself; callers
/// that want a smaller key should hash upstream.
pub type EmbeddingCache = LruTtlCache<String, Vec<f32>>;

/// `(normalized_query, chunk_id, content_hash, prompt_version) → score`,
/// default TTL 1 hour (spec.md §4.11).
pub type RerankCache = LruTtlCache<(String, String, String, String), f64>;

/// `file_path → ast`, bounded per indexing run (spec.md §4.11). Keyed by
/// path only; holding a parsed tree alive this way only makes sense within
/// one orchestrator run, never across runs.
pub type AstCache = LruTtlCache<String, std::sync::Arc<crate::parsing::AstTree>>;

/// Lowercase + collapse whitespace (spec.md §4.11's cache-key normalization).
pub fn normalize_query(query: &str) -> String {
    query.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_query_collapses_whitespace_and_case() {
        assert_eq!(normalize_query("  Who   Calls Foo  "), "who calls foo");
    }

    #[test]
    fn lru_ttl_cache_hits_before_expiry() {
        let cache: LruTtlCache<String, i32> = LruTtlCache::new(4, Some(Duration::from_secs(60)));
        cache.set("a".to_string(), 1);
        assert_eq!(cache.get(&"a".to_string()), Some(1));
        assert_eq!(cache.stats().hits, 1);
    }

    #[test]
    fn lru_ttl_cache_expires_entries() {
        let cache: LruTtlCache<String, i32> = LruTtlCache::new(4, Some(Duration::from_millis(1)));
        cache.set("a".to_string(), 1);
        std::thread::sleep(Duration::from_millis(10));
        assert_eq!(cache.get(&"a".to_string()), None);
    }

    #[test]
    fn evict_removes_entry() {
        let cache: LruTtlCache<String, i32> = LruTtlCache::new(4, None);
        cache.set("a".to_string(), 1);
        assert_eq!(cache.evict(&"a".to_string()), Some(1));
        assert_eq!(cache.get(&"a".to_string()), None);
    }
}
