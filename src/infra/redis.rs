//! Redis speed cache backend.

use std::time::Duration;

use async_trait::async_trait;
use ::redis::{AsyncCommands, aio::ConnectionManager};

use crate::cache::{CacheError, SpeedCache, decode_snapshot, encode_snapshot};
use crate::domain::books::Book;

use super::error::InfraError;

/// Book snapshots stored as JSON strings with `SET .. EX`.
///
/// Every call clones the connection manager; clones share one multiplexed,
/// self-reconnecting connection.
#[derive(Clone)]
pub struct RedisSpeedCache {
    connection: ConnectionManager,
}

impl RedisSpeedCache {
    /// Connect and `PING` once. An unreachable server is an error here, not on first use.
    pub async fn connect(url: &str) -> Result<Self, InfraError> {
        let client = ::redis::Client::open(url)
            .map_err(|err| InfraError::cache(format!("invalid redis url: {err}")))?;
        let mut connection = ConnectionManager::new(client)
            .await
            .map_err(|err| InfraError::cache(format!("failed to connect to redis: {err}")))?;

        let pong: String = ::redis::cmd("PING")
            .query_async(&mut connection)
            .await
            .map_err(|err| InfraError::cache(format!("redis ping failed: {err}")))?;
        tracing::debug!(reply = %pong, "redis reachable");

        Ok(Self { connection })
    }
}

/// Redis rejects `EX 0`; sub-second TTLs round up to one second.
fn expiry_seconds(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}

#[async_trait]
impl SpeedCache for RedisSpeedCache {
    async fn get_book(&self, key: &str) -> Result<Option<Book>, CacheError> {
        let mut connection = self.connection.clone();
        let payload: Option<String> = connection.get(key).await.map_err(CacheError::backend)?;
        payload.as_deref().map(decode_snapshot).transpose()
    }

    async fn set_book(&self, key: &str, book: &Book, ttl: Duration) -> Result<(), CacheError> {
        let payload = encode_snapshot(book)?;
        let mut connection = self.connection.clone();
        connection
            .set_ex::<_, _, ()>(key, payload, expiry_seconds(ttl))
            .await
            .map_err(CacheError::backend)
    }

    async fn invalidate_book(&self, key: &str) -> Result<(), CacheError> {
        let mut connection = self.connection.clone();
        connection
            .del::<_, ()>(key)
            .await
            .map_err(CacheError::backend)
    }
}
