//! Small TTL cache for tool results.

use std::time::{Duration, Instant};

use dashmap::DashMap;

/// Cache entry with TTL.
#[derive(Clone)]
struct CacheEntry<T> {
    data: T,
    expires_at: Instant,
}

impl<T: Clone> CacheEntry<T> {
    fn new(data: T, ttl: Duration) -> Self {
        Self {
            data,
            expires_at: Instant::now() + ttl,
        }
    }

    fn is_expired(&self) -> bool {
        Instant::now() > self.expires_at
    }
}

/// Thread-safe string-keyed cache with a fixed TTL and entry cap.
pub struct TtlCache<T> {
    enabled: bool,
    ttl: Duration,
    max_entries: usize,
    entries: DashMap<String, CacheEntry<T>>,
}

impl<T: Clone> TtlCache<T> {
    /// Create a cache. A zero `max_entries` or `!enabled` turns it into a no-op.
    #[must_use]
    pub fn new(enabled: bool, ttl: Duration, max_entries: usize) -> Self {
        Self {
            enabled: enabled && max_entries > 0,
            ttl,
            max_entries,
            entries: DashMap::new(),
        }
    }

    /// Look up a live entry.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<T> {
        if !self.enabled {
            return None;
        }

        self.entries.get(key).and_then(|entry| {
            if entry.is_expired() {
                drop(entry);
                self.entries.remove(key);
                None
            } else {
                Some(entry.data.clone())
            }
        })
    }

    /// Store a value.
    pub fn insert(&self, key: &str, value: T) {
        if !self.enabled {
            return;
        }

        self.enforce_max_entries();
        self.entries
            .insert(key.to_string(), CacheEntry::new(value, self.ttl));
    }

    /// Number of stored entries, expired ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove expired entries.
    pub fn cleanup_expired(&self) {
        self.entries.retain(|_, entry| !entry.is_expired());
    }

    fn enforce_max_entries(&self) {
        if self.entries.len() < self.max_entries {
            return;
        }
        self.cleanup_expired();

        if self.entries.len() >= self.max_entries {
            let to_remove = self.entries.len() - self.max_entries + 1;
            let keys: Vec<String> = self
                .entries
                .iter()
                .take(to_remove)
                .map(|entry| entry.key().clone())
                .collect();
            for key in keys {
                self.entries.remove(&key);
            }
        }
    }
}
