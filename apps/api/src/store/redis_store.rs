use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use tracing::info;

use crate::store::{KvStore, StoreError};

/// Redis-backed session store. Every write refreshes the key's TTL, so keys
/// live as long as the session keeps writing them.
#[derive(Clone)]
pub struct RedisStore {
    conn: MultiplexedConnection,
    ttl_secs: u64,
}

impl RedisStore {
    pub async fn connect(url: &str, ttl_secs: u64) -> Result<Self, StoreError> {
        let client = redis::Client::open(url)?;
        let conn = client.get_multiplexed_async_connection().await?;
        info!("Redis session store connected (ttl {ttl_secs}s)");
        Ok(Self { conn, ttl_secs })
    }
}

#[async_trait]
impl KvStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(key, value, self.ttl_secs).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(key).await?;
        Ok(())
    }
}
