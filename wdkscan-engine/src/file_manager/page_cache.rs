//! LRU page cache for an open container
//!
//! A container is read by a single owner, so the cache is a plain
//! `LruCache` keyed by page number. Pages hold `Bytes`, so a hit is a
//! reference-count bump rather than a copy.

use lru::LruCache;
use std::num::NonZeroUsize;

use crate::storage::page::Page;

/// Smallest cache the container will run with
pub const MIN_CAPACITY: usize = 16;

/// Default cache size in pages
pub const DEFAULT_CAPACITY: usize = 256;

/// Cache statistics
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

/// LRU page cache
pub struct PageCache {
    cache: LruCache<u32, Page>,
    stats: CacheStats,
}

impl PageCache {
    /// Create a cache holding up to `capacity` pages
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(MIN_CAPACITY)).unwrap_or(NonZeroUsize::MIN);
        PageCache {
            cache: LruCache::new(capacity),
            stats: CacheStats::default(),
        }
    }

    /// Look up a page
    pub fn get(&mut self, page_number: u32) -> Option<Page> {
        match self.cache.get(&page_number) {
            Some(page) => {
                self.stats.hits += 1;
                Some(page.clone())
            }
            None => {
                self.stats.misses += 1;
                None
            }
        }
    }

    /// Insert a page, evicting the least recently used one when full
    pub fn put(&mut self, page: Page) {
        if let Some((evicted, _)) = self.cache.push(page.page_number(), page) {
            if self.cache.contains(&evicted) {
                // Same key replaced, not an eviction
                return;
            }
            self.stats.evictions += 1;
        }
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.clone()
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.cache.cap().get()
    }

    /// Drop every cached page
    pub fn clear(&mut self) {
        self.cache.clear();
    }
}

impl Default for PageCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
