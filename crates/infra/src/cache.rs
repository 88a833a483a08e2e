//! Tagged read-through cache.
//!
//! Read operations store their result under a key and register it against
//! one or more tags; write operations invalidate tags, dropping every entry
//! registered under them. Entries also expire after a fixed TTL.

use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use serde::Serialize;

struct Entry {
    value: Arc<dyn Any + Send + Sync>,
    tags: Vec<String>,
    expires_at: Instant,
}

#[derive(Default)]
struct Inner {
    entries: HashMap<String, Entry>,
    by_tag: HashMap<String, HashSet<String>>,
}

impl Inner {
    fn remove(&mut self, key: &str) {
        if let Some(entry) = self.entries.remove(key) {
            for tag in entry.tags {
                if let Some(keys) = self.by_tag.get_mut(&tag) {
                    keys.remove(key);
                    if keys.is_empty() {
                        self.by_tag.remove(&tag);
                    }
                }
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub tags: usize,
    pub hits: u64,
    pub misses: u64,
}

pub struct TagCache {
    inner: RwLock<Inner>,
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl TagCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Cached value for `key`, if present, unexpired and of type `T`.
    pub fn get<T: Clone + 'static>(&self, key: &str) -> Option<T> {
        let found = {
            let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
            inner
                .entries
                .get(key)
                .filter(|e| e.expires_at > Instant::now())
                .and_then(|e| e.value.downcast_ref::<T>().cloned())
        };
        match found {
            Some(v) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(v)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    pub fn put<T: Send + Sync + 'static>(&self, key: String, value: T, tags: Vec<String>) {
        if self.ttl.is_zero() {
            return;
        }
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        inner.remove(&key);
        for tag in &tags {
            inner.by_tag.entry(tag.clone()).or_default().insert(key.clone());
        }
        inner.entries.insert(
            key,
            Entry {
                value: Arc::new(value),
                tags,
                expires_at: Instant::now() + self.ttl,
            },
        );
    }

    /// Drop every entry registered under any of `tags`. Returns how many
    /// entries were removed.
    pub fn invalidate(&self, tags: &[String]) -> usize {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        let keys: HashSet<String> = tags
            .iter()
            .filter_map(|t| inner.by_tag.get(t))
            .flat_map(|keys| keys.iter().cloned())
            .collect();
        for key in &keys {
            inner.remove(key);
        }
        keys.len()
    }

    pub fn invalidate_all(&self) {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        inner.entries.clear();
        inner.by_tag.clear();
    }

    /// Remove expired entries.
    pub fn purge_expired(&self) -> usize {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();
        let expired: Vec<String> = inner
            .entries
            .iter()
            .filter(|(_, e)| e.expires_at <= now)
            .map(|(k, _)| k.clone())
            .collect();
        for key in &expired {
            inner.remove(key);
        }
        expired.len()
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        CacheStats {
            entries: inner.entries.len(),
            tags: inner.by_tag.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(t: &[&str]) -> Vec<String> {
        t.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn hit_then_invalidate() {
        let cache = TagCache::new(Duration::from_secs(60));
        cache.put("k1".into(), vec![1, 2, 3], tags(&["properties-a"]));
        cache.put("k2".into(), 7u32, tags(&["properties-b"]));

        assert_eq!(cache.get::<Vec<i32>>("k1"), Some(vec![1, 2, 3]));
        assert_eq!(cache.invalidate(&tags(&["properties-a"])), 1);
        assert_eq!(cache.get::<Vec<i32>>("k1"), None);
        assert_eq!(cache.get::<u32>("k2"), Some(7));

        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses, stats.entries), (2, 1, 1));
    }

    #[test]
    fn wrong_type_is_a_miss() {
        let cache = TagCache::new(Duration::from_secs(60));
        cache.put("k".into(), 1u8, vec![]);
        assert_eq!(cache.get::<String>("k"), None);
    }

    #[test]
    fn entries_expire() {
        let cache = TagCache::new(Duration::from_millis(1));
        cache.put("k".into(), 1u8, tags(&["t"]));
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(cache.get::<u8>("k"), None);
        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.stats().tags, 0);
    }

    #[test]
    fn zero_ttl_disables_caching() {
        let cache = TagCache::new(Duration::ZERO);
        cache.put("k".into(), 1u8, vec![]);
        assert_eq!(cache.stats().entries, 0);
    }
}
