use std::{
    sync::{Mutex, PoisonError},
    time::Duration,
};

use dashmap::DashMap;
use log::{debug, trace};
use tokio::time::Instant;

struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

/// Value cache for resilient proxies.
///
/// Expired entries are evicted when read, and inserts sweep the whole map
/// at most once per TTL, so no entry outlives twice its TTL.
pub struct TtlCache<V> {
    entries: DashMap<String, CacheEntry<V>>,
    ttl: Duration,
    next_sweep: Mutex<Option<Instant>>,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            next_sweep: Mutex::new(None),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        if let Some(entry) = self.entries.get(key) {
            if entry.expires_at > now {
                return Some(entry.value.clone());
            }
        }

        // the read guard above must be released before removing from the same shard
        if self
            .entries
            .remove_if(key, |_, entry| entry.expires_at <= now)
            .is_some()
        {
            trace!("Evicted expired cache entry {key}");
        }
        None
    }

    pub fn insert(&self, key: String, value: V) {
        let now = Instant::now();
        self.entries.insert(
            key,
            CacheEntry {
                value,
                expires_at: now + self.ttl,
            },
        );
        self.sweep_if_due(now);
    }

    fn sweep_if_due(&self, now: Instant) {
        let due = {
            let mut next_sweep = self.next_sweep.lock().unwrap_or_else(PoisonError::into_inner);
            match *next_sweep {
                Some(at) if now < at => false,
                Some(_) => {
                    *next_sweep = Some(now + self.ttl);
                    true
                }
                None => {
                    *next_sweep = Some(now + self.ttl);
                    false
                }
            }
        };

        if due {
            let removed = self.purge_expired();
            if removed > 0 {
                debug!("Swept {removed} expired cache entries, {} left", self.len());
            }
        }
    }

    pub fn remove(&self, key: &str) -> Option<V> {
        self.entries.remove(key).map(|(_, entry)| entry.value)
    }

    /// Drop every expired entry, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > now);
        before.saturating_sub(self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_entries_expire_after_ttl() {
        let cache = TtlCache::new(Duration::from_secs(10));
        cache.insert("k".to_string(), 1);

        tokio::time::advance(Duration::from_secs(9)).await;
        assert_eq!(cache.get("k"), Some(1));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(cache.get("k"), None);
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_insert_sweeps_unread_expired_entries() {
        let cache = TtlCache::new(Duration::from_secs(60));
        for i in 0..50 {
            cache.insert(format!("k{i}"), i);
        }
        assert_eq!(cache.len(), 50);

        // none of the old keys is ever read again
        tokio::time::advance(Duration::from_secs(61)).await;
        cache.insert("fresh".to_string(), 99);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("fresh"), Some(99));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_runs_at_most_once_per_ttl() {
        let cache = TtlCache::new(Duration::from_secs(60));
        cache.insert("a".to_string(), 1);
        tokio::time::advance(Duration::from_secs(30)).await;
        cache.insert("b".to_string(), 2);

        // first sweep is due 60s after the first insert and takes "a"
        tokio::time::advance(Duration::from_secs(31)).await;
        cache.insert("c".to_string(), 3);
        assert_eq!(cache.len(), 2);

        // "b" has expired, but the next sweep is not due before 121s
        tokio::time::advance(Duration::from_secs(30)).await;
        cache.insert("d".to_string(), 4);
        assert_eq!(cache.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_expired() {
        let cache = TtlCache::new(Duration::from_secs(5));
        cache.insert("old".to_string(), "a");
        tokio::time::advance(Duration::from_secs(3)).await;
        cache.insert("new".to_string(), "b");
        tokio::time::advance(Duration::from_secs(3)).await;

        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.remove("new"), Some("b"));
    }
}
