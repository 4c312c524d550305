//! Concurrent URL → body cache with time-based expiration.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use dashmap::DashMap;

use crate::observability::metrics;

/// Milliseconds since the Unix epoch.
pub fn now_epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// A cached origin response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// Response text, CR/LF-normalized and newline-joined.
    pub body: String,
    /// Origin `Last-Modified` time, or the fetch time when the origin
    /// did not send one. Epoch milliseconds.
    pub last_modified: u64,
}

impl CacheEntry {
    /// True when the entry has outlived the freshness window.
    pub fn is_expired(&self, ttl: Duration) -> bool {
        now_epoch_millis().saturating_sub(self.last_modified) > ttl.as_millis() as u64
    }
}

/// A thread-safe cache keyed by request URL, exactly as presented.
#[derive(Clone)]
pub struct CacheStore {
    entries: Arc<DashMap<String, CacheEntry>>,
    ttl: Duration,
}

impl CacheStore {
    /// Create an empty cache with the given freshness window.
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            ttl,
        }
    }

    /// Look up an entry. Returns a clone so the shard lock is not held
    /// across awaits in the caller.
    pub fn get(&self, url: &str) -> Option<CacheEntry> {
        self.entries.get(url).map(|r| r.value().clone())
    }

    /// The stored last-modified timestamp for a URL, if any. Used to build
    /// conditional origin requests.
    pub fn last_modified(&self, url: &str) -> Option<u64> {
        self.entries.get(url).map(|r| r.value().last_modified)
    }

    /// Insert or overwrite an entry.
    pub fn put(&self, url: String, body: String, last_modified: u64) {
        self.entries.insert(
            url,
            CacheEntry {
                body,
                last_modified,
            },
        );
        metrics::record_cache_size(self.entries.len());
    }

    /// True when the entry is past the configured freshness window.
    pub fn is_expired(&self, entry: &CacheEntry) -> bool {
        entry.is_expired(self.ttl)
    }

    /// Number of cached entries.
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

    const DAY: Duration = Duration::from_secs(86_400);

    #[test]
    fn get_returns_what_put_stored() {
        let cache = CacheStore::new(DAY);
        assert!(cache.get("http://example.com/").is_none());

        cache.put("http://example.com/".to_string(), "hello\n".to_string(), 1);
        let entry = cache.get("http://example.com/").unwrap();
        assert_eq!(entry.body, "hello\n");
        assert_eq!(entry.last_modified, 1);
        assert_eq!(cache.last_modified("http://example.com/"), Some(1));
    }

    #[test]
    fn keys_are_case_sensitive() {
        let cache = CacheStore::new(DAY);
        cache.put("http://example.com/A".to_string(), "a\n".to_string(), 1);
        assert!(cache.get("http://example.com/a").is_none());
    }

    #[test]
    fn put_overwrites_existing_entry() {
        let cache = CacheStore::new(DAY);
        cache.put("http://example.com/".to_string(), "old\n".to_string(), 1);
        cache.put("http://example.com/".to_string(), "new\n".to_string(), 2);

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("http://example.com/").unwrap().body, "new\n");
    }

    #[test]
    fn fresh_entry_is_not_expired() {
        let cache = CacheStore::new(DAY);
        cache.put(
            "http://example.com/".to_string(),
            "hi\n".to_string(),
            now_epoch_millis(),
        );
        let entry = cache.get("http://example.com/").unwrap();
        assert!(!cache.is_expired(&entry));
    }

    #[test]
    fn day_old_entry_is_expired() {
        let cache = CacheStore::new(DAY);
        let two_days_ago = now_epoch_millis() - 2 * 86_400_000;
        cache.put(
            "http://example.com/".to_string(),
            "hi\n".to_string(),
            two_days_ago,
        );
        let entry = cache.get("http://example.com/").unwrap();
        assert!(cache.is_expired(&entry));
    }

    #[test]
    fn expiry_straddles_the_window() {
        let just_inside = CacheEntry {
            body: String::new(),
            last_modified: now_epoch_millis() - (DAY.as_millis() as u64 - 60_000),
        };
        assert!(!just_inside.is_expired(DAY));

        let just_outside = CacheEntry {
            body: String::new(),
            last_modified: now_epoch_millis() - (DAY.as_millis() as u64 + 60_000),
        };
        assert!(just_outside.is_expired(DAY));
    }
}
