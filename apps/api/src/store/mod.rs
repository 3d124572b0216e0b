//! Session-durable key/value storage used by the result cache.
//!
//! Redis in deployment (keys expire with the session TTL), an in-process map
//! when no Redis URL is configured and in tests.

use async_trait::async_trait;
use thiserror::Error;

pub mod memory;
pub mod redis_store;

pub use memory::MemoryStore;
pub use redis_store::RedisStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

/// Values are opaque strings; callers own the encoding. A `set` replaces the
/// whole value in one operation.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}
