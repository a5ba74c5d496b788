//! In-process speed cache backends.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use lru::LruCache;

use crate::domain::books::Book;

use super::config::CacheConfig;
use super::lock::recover;
use super::{CacheError, SpeedCache, decode_snapshot, encode_snapshot};

const SOURCE: &str = "cache::store";

struct Entry {
    payload: String,
    /// `None` when the TTL runs past what `Instant` can represent.
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|expires_at| expires_at > now)
    }
}

/// LRU-bounded snapshot store with per-entry expiry.
///
/// Expired entries are dropped lazily on read. Snapshots are stored serialized so
/// the backend behaves like a remote cache: callers always get an independent copy.
pub struct MemorySpeedCache {
    entries: Mutex<LruCache<String, Entry>>,
}

impl MemorySpeedCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(config.memory_capacity_non_zero())),
        }
    }

    pub fn len(&self) -> usize {
        recover(self.entries.lock(), SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SpeedCache for MemorySpeedCache {
    async fn get_book(&self, key: &str) -> Result<Option<Book>, CacheError> {
        let now = Instant::now();
        let mut entries = recover(self.entries.lock(), SOURCE, "get_book");
        let live = match entries.get(key) {
            Some(entry) if entry.is_live(now) => Some(entry.payload.clone()),
            Some(_) => None,
            None => return Ok(None),
        };

        match live {
            Some(payload) => {
                drop(entries);
                decode_snapshot(&payload).map(Some)
            }
            None => {
                entries.pop(key);
                Ok(None)
            }
        }
    }

    async fn set_book(&self, key: &str, book: &Book, ttl: Duration) -> Result<(), CacheError> {
        let payload = encode_snapshot(book)?;
        let expires_at = Instant::now().checked_add(ttl);
        recover(self.entries.lock(), SOURCE, "set_book").put(
            key.to_string(),
            Entry {
                payload,
                expires_at,
            },
        );
        Ok(())
    }

    async fn invalidate_book(&self, key: &str) -> Result<(), CacheError> {
        recover(self.entries.lock(), SOURCE, "invalidate_book").pop(key);
        Ok(())
    }
}

/// Backend used when caching is disabled: every read misses, every write is dropped.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSpeedCache;

#[async_trait]
impl SpeedCache for NoopSpeedCache {
    async fn get_book(&self, _key: &str) -> Result<Option<Book>, CacheError> {
        Ok(None)
    }

    async fn set_book(&self, _key: &str, _book: &Book, _ttl: Duration) -> Result<(), CacheError> {
        Ok(())
    }

    async fn invalidate_book(&self, _key: &str) -> Result<(), CacheError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_book(id: &str) -> Book {
        Book {
            id: id.to_string(),
            title: "The Left Hand of Darkness".to_string(),
            author: "Ursula K. Le Guin".to_string(),
            publication_year: 1969,
            genre: "sf".to_string(),
        }
    }

    fn store_with_capacity(capacity: usize) -> MemorySpeedCache {
        MemorySpeedCache::new(&CacheConfig {
            memory_capacity: capacity,
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn memory_cache_roundtrip() {
        let store = store_with_capacity(8);
        let book = sample_book("1");

        assert!(store.get_book("book:1").await.unwrap().is_none());

        store
            .set_book("book:1", &book, Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(store.get_book("book:1").await.unwrap(), Some(book));

        store.invalidate_book("book:1").await.unwrap();
        assert!(store.get_book("book:1").await.unwrap().is_none());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn expired_entries_read_as_misses_and_are_dropped() {
        let store = store_with_capacity(8);
        store
            .set_book("book:1", &sample_book("1"), Duration::ZERO)
            .await
            .unwrap();
        assert_eq!(store.len(), 1);

        assert!(store.get_book("book:1").await.unwrap().is_none());
        assert_eq!(store.len(), 0);
    }

    #[tokio::test]
    async fn unrepresentable_ttl_never_expires() {
        let store = store_with_capacity(8);
        let book = sample_book("1");
        store
            .set_book("book:1", &book, Duration::MAX)
            .await
            .unwrap();
        assert_eq!(store.get_book("book:1").await.unwrap(), Some(book));
    }

    #[tokio::test]
    async fn capacity_evicts_least_recently_used() {
        let store = store_with_capacity(2);
        let ttl = Duration::from_secs(60);
        store.set_book("book:1", &sample_book("1"), ttl).await.unwrap();
        store.set_book("book:2", &sample_book("2"), ttl).await.unwrap();

        // Touch 1 so 2 becomes the eviction candidate.
        assert!(store.get_book("book:1").await.unwrap().is_some());
        store.set_book("book:3", &sample_book("3"), ttl).await.unwrap();

        assert!(store.get_book("book:1").await.unwrap().is_some());
        assert!(store.get_book("book:2").await.unwrap().is_none());
        assert!(store.get_book("book:3").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn invalidating_absent_key_succeeds() {
        let store = store_with_capacity(2);
        assert!(store.invalidate_book("book:missing").await.is_ok());
    }

    #[tokio::test]
    async fn noop_cache_never_hits() {
        let cache = NoopSpeedCache;
        cache
            .set_book("book:1", &sample_book("1"), Duration::from_secs(60))
            .await
            .unwrap();
        assert!(cache.get_book("book:1").await.unwrap().is_none());
    }
}
