//! Bounded LRU cache from exact input text to its embedding.
//!
//! Consulted before calling the embedding model and written through on
//! misses. Single owner: callers that share it across threads must wrap it
//! in a mutex.
use lru::LruCache;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;

pub const DEFAULT_CAPACITY: usize = 500;

/// `cache` config section.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub capacity: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self { capacity: DEFAULT_CAPACITY }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub size: usize,
    pub capacity: usize,
}

pub struct EmbeddingCache {
    entries: LruCache<String, Vec<f32>>,
    hits: u64,
    misses: u64,
}

impl EmbeddingCache {
    /// A capacity of zero is clamped to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self { entries: LruCache::new(capacity), hits: 0, misses: 0 }
    }

    pub fn from_settings(settings: &CacheSettings) -> Self {
        Self::new(settings.capacity)
    }

    /// Look up `text`; a hit becomes the most recently used entry.
    pub fn get(&mut self, text: &str) -> Option<&[f32]> {
        match self.entries.get(text) {
            Some(v) => {
                self.hits += 1;
                Some(v.as_slice())
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    /// Insert `text`, evicting the least recently used entry when full.
    /// An existing entry only has its recency refreshed.
    pub fn put(&mut self, text: &str, embedding: Vec<f32>) {
        if self.entries.contains(text) {
            self.entries.promote(text);
            return;
        }
        if let Some((evicted, _)) = self.entries.push(text.to_string(), embedding) {
            tracing::trace!(len = evicted.len(), "evicted least recently used embedding");
        }
    }

    /// Membership test that leaves recency and counters untouched.
    pub fn contains(&self, text: &str) -> bool {
        self.entries.contains(text)
    }

    pub fn len(&self) -> usize { self.entries.len() }
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }
    pub fn capacity(&self) -> usize { self.entries.cap().get() }

    pub fn stats(&self) -> CacheStats {
        let total = self.hits + self.misses;
        let hit_rate = if total > 0 { self.hits as f64 / total as f64 } else { 0.0 };
        CacheStats { hits: self.hits, misses: self.misses, hit_rate, size: self.entries.len(), capacity: self.capacity() }
    }
}

impl Default for EmbeddingCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl std::fmt::Debug for EmbeddingCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingCache")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .field("hits", &self.hits)
            .field("misses", &self.misses)
            .finish()
    }
}
