//! Bookshelf speed cache
//!
//! A derived, expendable copy of book records keyed by `book:<id>`. Entries carry
//! a TTL set at write time and may disappear at any moment; a missing entry is a
//! normal miss, never a fault.
//!
//! Backends are selected through `[cache]` in `bookshelf.toml`:
//!
//! ```toml
//! [cache]
//! backend = "redis"        # redis | memory | disabled
//! redis_url = "redis://127.0.0.1:6379/0"
//! ttl_seconds = 600
//! memory_capacity = 1000
//! ```

mod config;
mod keys;
mod lock;
mod store;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::books::Book;

pub use config::{CacheBackend, CacheConfig};
pub use keys::{BOOK_KEY_PREFIX, book_cache_key};
pub use store::{MemorySpeedCache, NoopSpeedCache};

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend error: {0}")]
    Backend(String),
    #[error("cache snapshot codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

impl CacheError {
    pub fn backend(err: impl std::fmt::Display) -> Self {
        Self::Backend(err.to_string())
    }
}

/// Key-value store holding serialized book snapshots.
#[async_trait]
pub trait SpeedCache: Send + Sync {
    /// `Ok(None)` on a miss or an expired entry.
    async fn get_book(&self, key: &str) -> Result<Option<Book>, CacheError>;

    async fn set_book(&self, key: &str, book: &Book, ttl: Duration) -> Result<(), CacheError>;

    /// Removing an absent key succeeds.
    async fn invalidate_book(&self, key: &str) -> Result<(), CacheError>;
}

pub(crate) fn encode_snapshot(book: &Book) -> Result<String, CacheError> {
    serde_json::to_string(book).map_err(CacheError::from)
}

pub(crate) fn decode_snapshot(payload: &str) -> Result<Book, CacheError> {
    serde_json::from_str(payload).map_err(CacheError::from)
}
