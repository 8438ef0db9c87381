//! LRU + TTL cache for embedding vectors.
//!
//! Entries are keyed by `(text, model_key)` so the same text embedded by two
//! models occupies two independent slots. Default: 1000 entries, 1-hour TTL.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::backend::Embedding;

/// Time source for expiry decisions.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall clock.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Cached embedding entry with timestamps.
struct CacheEntry {
    embedding: Embedding,
    created_at: Instant,
}

/// Cache statistics.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub size: usize,
    pub max_size: usize,
    pub ttl_seconds: u64,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expired: u64,
}

/// Thread-safe embedding cache.
pub struct EmbeddingCache {
    inner: Mutex<CacheInner>,
    clock: Arc<dyn Clock>,
}

struct CacheInner {
    entries: HashMap<String, CacheEntry>,
    /// Keys from least to most recently accessed.
    order: Vec<String>,
    max_size: usize,
    ttl: Duration,
    hits: u64,
    misses: u64,
    evictions: u64,
    expired: u64,
}

impl CacheInner {
    fn touch(&mut self, key: &str) {
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            let key = self.order.remove(pos);
            self.order.push(key);
        }
    }

    fn remove(&mut self, key: &str) {
        self.entries.remove(key);
        self.order.retain(|k| k != key);
    }

    fn sweep_expired(&mut self, now: Instant) {
        let ttl = self.ttl;
        let before = self.entries.len();
        self.entries
            .retain(|_, e| now.saturating_duration_since(e.created_at) <= ttl);
        let removed = before - self.entries.len();
        if removed > 0 {
            let entries = &self.entries;
            self.order.retain(|k| entries.contains_key(k));
            self.expired += removed as u64;
            debug!("Swept {} expired cache entries", removed);
        }
    }
}

/// Cache key for a text under a model: hex SHA-256 of `model_key:text`.
pub fn cache_key(text: &str, model_key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(model_key.as_bytes());
    hasher.update(b":");
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

impl EmbeddingCache {
    /// Create a new cache with the given capacity and TTL.
    pub fn new(max_size: usize, ttl: Duration) -> Self {
        Self::with_clock(max_size, ttl, Arc::new(SystemClock))
    }

    /// Create a cache driven by a custom time source.
    pub fn with_clock(max_size: usize, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                entries: HashMap::with_capacity(max_size.min(4096)),
                order: Vec::with_capacity(max_size.min(4096)),
                max_size,
                ttl,
                hits: 0,
                misses: 0,
                evictions: 0,
                expired: 0,
            }),
            clock,
        }
    }

    /// Get a cached embedding. Returns None on miss or expired entry.
    pub fn get(&self, text: &str, model_key: &str) -> Option<Embedding> {
        let key = cache_key(text, model_key);
        let now = self.clock.now();
        let mut inner = self.inner.lock();

        let expired = inner
            .entries
            .get(&key)
            .map(|e| now.saturating_duration_since(e.created_at) > inner.ttl);

        match expired {
            Some(false) => {
                let embedding = inner.entries.get(&key).map(|e| e.embedding.clone());
                inner.touch(&key);
                inner.hits += 1;
                embedding
            }
            Some(true) => {
                inner.remove(&key);
                inner.expired += 1;
                inner.misses += 1;
                None
            }
            None => {
                inner.misses += 1;
                None
            }
        }
    }

    /// Insert an embedding, evicting the least recently accessed entry when full.
    pub fn put(&self, text: &str, model_key: &str, embedding: Embedding) {
        let key = cache_key(text, model_key);
        let now = self.clock.now();
        let mut inner = self.inner.lock();

        if inner.max_size == 0 {
            return;
        }

        inner.sweep_expired(now);

        let entry = CacheEntry {
            embedding,
            created_at: now,
        };

        // If already present, overwrite and move to end
        if inner.entries.contains_key(&key) {
            inner.entries.insert(key.clone(), entry);
            inner.touch(&key);
            return;
        }

        while inner.entries.len() >= inner.max_size && !inner.order.is_empty() {
            let oldest = inner.order.remove(0);
            inner.entries.remove(&oldest);
            inner.evictions += 1;
        }

        inner.order.push(key.clone());
        inner.entries.insert(key, entry);
    }

    /// Drop the entry for `text` under `model_key`, if any.
    pub fn remove(&self, text: &str, model_key: &str) {
        let key = cache_key(text, model_key);
        self.inner.lock().remove(&key);
    }

    /// Number of entries in the cache (expired ones included until swept).
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clear all entries.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.order.clear();
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        CacheStats {
            size: inner.entries.len(),
            max_size: inner.max_size,
            ttl_seconds: inner.ttl.as_secs(),
            hits: inner.hits,
            misses: inner.misses,
            evictions: inner.evictions,
            expired: inner.expired,
        }
    }
}
