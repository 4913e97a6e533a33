//! LRU cache for decoded daily layers.

use lru::LruCache;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::layer::GridLayer;
use crate::types::CacheStats;

/// LRU cache of layers keyed by time index, with memory-bounded eviction.
///
/// A limit of zero disables caching: every lookup misses and inserts are
/// dropped.
pub struct LayerCache {
    cache: LruCache<usize, Arc<GridLayer>>,
    memory_limit: usize,
    current_memory: usize,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl LayerCache {
    /// Create a new layer cache with the given memory limit in bytes.
    pub fn new(memory_limit: usize) -> Self {
        Self {
            cache: LruCache::unbounded(),
            memory_limit,
            current_memory: 0,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Try to get a layer from the cache.
    pub fn get(&mut self, time_index: usize) -> Option<Arc<GridLayer>> {
        if let Some(layer) = self.cache.get(&time_index) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            Some(Arc::clone(layer))
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            None
        }
    }

    /// Check if a key exists in the cache without updating LRU order.
    pub fn contains(&self, time_index: usize) -> bool {
        self.cache.contains(&time_index)
    }

    /// Insert a layer, evicting least recently used layers to make room.
    pub fn insert(&mut self, time_index: usize, layer: Arc<GridLayer>) {
        let size = layer.memory_bytes();
        if size > self.memory_limit {
            return;
        }

        if let Some(old) = self.cache.pop(&time_index) {
            self.current_memory = self.current_memory.saturating_sub(old.memory_bytes());
        }

        while self.current_memory + size > self.memory_limit && !self.cache.is_empty() {
            if let Some((_, evicted)) = self.cache.pop_lru() {
                self.current_memory = self.current_memory.saturating_sub(evicted.memory_bytes());
                self.evictions.fetch_add(1, Ordering::Relaxed);
            }
        }

        self.cache.put(time_index, layer);
        self.current_memory += size;
    }

    /// Get cache statistics.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.cache.len(),
            memory_bytes: self.current_memory as u64,
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }

    /// Clear all entries from the cache.
    pub fn clear(&mut self) {
        self.cache.clear();
        self.current_memory = 0;
    }

    pub fn memory_usage(&self) -> usize {
        self.current_memory
    }

    pub fn memory_limit(&self) -> usize {
        self.memory_limit
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Affine;

    fn layer(value: f32) -> Arc<GridLayer> {
        // 4 values = 16 bytes
        Arc::new(GridLayer::new(vec![value; 4], 2, 2, Affine::identity(), None).unwrap())
    }

    #[test]
    fn test_cache_insert_and_get() {
        let mut cache = LayerCache::new(1024);
        assert!(cache.get(0).is_none());
        cache.insert(0, layer(1.0));
        assert_eq!(cache.get(0).unwrap().data(), &[1.0; 4]);
    }

    #[test]
    fn test_cache_lru_eviction() {
        let mut cache = LayerCache::new(48); // three layers
        for i in 0..10 {
            cache.insert(i, layer(i as f32));
        }
        assert!(cache.get(0).is_none());
        assert!(cache.get(9).is_some());
        assert_eq!(cache.len(), 3);
        assert_eq!(cache.memory_usage(), 48);
        assert_eq!(cache.stats().evictions, 7);
    }

    #[test]
    fn test_cache_recently_used_survives() {
        let mut cache = LayerCache::new(32);
        cache.insert(0, layer(0.0));
        cache.insert(1, layer(1.0));
        cache.get(0);
        cache.insert(2, layer(2.0));
        assert!(cache.contains(0));
        assert!(!cache.contains(1));
    }

    #[test]
    fn test_zero_budget_disables() {
        let mut cache = LayerCache::new(0);
        cache.insert(0, layer(1.0));
        assert!(cache.is_empty());
        assert!(cache.get(0).is_none());
    }

    #[test]
    fn test_cache_stats() {
        let mut cache = LayerCache::new(1024);
        cache.insert(0, layer(1.0));
        cache.get(0);
        cache.get(1);
        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.memory_bytes, 16);
        assert!((stats.hit_rate() - 0.5).abs() < 0.001);
    }
}
