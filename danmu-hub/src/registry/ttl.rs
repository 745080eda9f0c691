//! TTL cache for search results and comment tracks.
//!
//! These caches are purely in-memory: they are cheap to reconstruct from
//! upstream, so they are never mirrored. An expired entry is treated as
//! absent and transparently refreshed by the caller.

use std::time::{Duration, Instant};

use dashmap::DashMap;

#[derive(Clone)]
struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

impl<V> CacheEntry<V> {
    fn new(value: V, ttl: Duration) -> Self {
        Self {
            value,
            expires_at: Instant::now() + ttl,
        }
    }

    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// Thread-safe TTL cache keyed by string.
pub struct TtlCache<V: Clone> {
    entries: DashMap<String, CacheEntry<V>>,
    ttl: Duration,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    /// Returns None if not cached or expired.
    pub fn get(&self, key: &str) -> Option<V> {
        let entry = self.entries.get(key)?;
        if entry.is_expired() {
            drop(entry); // Release the shard lock before removing.
            self.entries.remove(key);
            return None;
        }
        Some(entry.value.clone())
    }

    pub fn insert(&self, key: String, value: V) {
        self.entries.insert(key, CacheEntry::new(value, self.ttl));
    }

    pub fn invalidate_all(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove all expired entries, returning how many were dropped.
    pub fn cleanup_expired(&self) -> usize {
        let before = self.len();
        self.entries.retain(|_, entry| !entry.is_expired());
        before - self.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_get() {
        let cache: TtlCache<Vec<u32>> = TtlCache::new(Duration::from_secs(60));
        cache.insert("key".into(), vec![1, 2, 3]);
        assert_eq!(cache.get("key"), Some(vec![1, 2, 3]));
        assert!(cache.get("missing").is_none());
    }

    #[test]
    fn test_expiry() {
        let cache: TtlCache<u32> = TtlCache::new(Duration::from_millis(10));
        cache.insert("key".into(), 7);
        assert_eq!(cache.get("key"), Some(7));

        std::thread::sleep(Duration::from_millis(20));
        assert!(cache.get("key").is_none());
        // The expired read also removed the entry.
        assert!(cache.is_empty());
    }

    #[test]
    fn test_cleanup_expired() {
        let cache: TtlCache<u32> = TtlCache::new(Duration::from_millis(10));
        cache.insert("a".into(), 1);
        cache.insert("b".into(), 2);

        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(cache.cleanup_expired(), 2);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_invalidate_all() {
        let cache: TtlCache<u32> = TtlCache::new(Duration::from_secs(60));
        cache.insert("a".into(), 1);
        cache.invalidate_all();
        assert!(cache.is_empty());
    }
}
