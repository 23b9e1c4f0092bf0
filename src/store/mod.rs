//! TTL-aware key/value storage for serialized approval records.
//!
//! Stores never interpret the bytes they hold. Expired entries must read as
//! absent; whether they are purged lazily or by a sweep is up to the backend.

pub mod memory;
pub mod redis_store;

use std::time::Duration;

use async_trait::async_trait;

pub use self::memory::MemoryStore;
pub use self::redis_store::RedisStore;

#[async_trait]
pub trait ApprovalStore: Send + Sync {
    /// Store or overwrite `key`. Expiry is reset to `ttl` from now.
    async fn put(&self, key: &str, value: Vec<u8>, ttl: Duration) -> anyhow::Result<()>;

    /// Returns `None` for missing and expired keys alike.
    async fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>>;

    async fn delete(&self, key: &str) -> anyhow::Result<()>;

    /// All keys that have not yet expired.
    async fn keys(&self) -> anyhow::Result<Vec<String>>;
}
