//! Bounded least-recently-used cache for per-image state.

use std::hash::Hash;
use std::num::NonZeroUsize;

use lru::LruCache;

pub const DEFAULT_CACHE_SIZE: usize = 100;

/// Strict LRU with a fixed capacity.
///
/// `get` and updating `put`s count as uses. Inserting a new key into a full
/// cache evicts exactly one entry, the least recently used. The cache knows
/// nothing about models; owners clear it when its contents go stale.
#[derive(Debug)]
pub struct ResultCache<K: Hash + Eq, V> {
    inner: LruCache<K, V>,
}

impl<K: Hash + Eq, V> ResultCache<K, V> {
    /// A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: LruCache::new(capacity),
        }
    }

    /// Look up `key`, promoting it to most recently used on a hit
    pub fn get(&mut self, key: &K) -> Option<&V> {
        self.inner.get(key)
    }

    /// Look up `key` without touching recency
    pub fn peek(&self, key: &K) -> Option<&V> {
        self.inner.peek(key)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.inner.contains(key)
    }

    /// Insert or update `key`. Returns the evicted entry when the insertion
    /// pushed the least recently used key out.
    pub fn put(&mut self, key: K, value: V) -> Option<(K, V)> {
        if self.inner.contains(&key) {
            // Updating promotes and never evicts.
            self.inner.put(key, value);
            return None;
        }
        self.inner.push(key, value)
    }

    pub fn clear(&mut self) {
        self.inner.clear();
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.inner.cap().get()
    }

    /// Keys from most to least recently used
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.inner.iter().map(|(key, _)| key)
    }
}

impl<K: Hash + Eq, V> Default for ResultCache<K, V> {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_SIZE)
    }
}
