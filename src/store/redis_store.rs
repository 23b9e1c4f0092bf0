use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use super::ApprovalStore;

const DEFAULT_PREFIX: &str = "promogate:approvals:";

/// Redis-backed approval store. Redis owns expiry through `SET EX`, so
/// expired keys simply disappear and no sweep is needed.
#[derive(Clone)]
pub struct RedisStore {
    redis: ConnectionManager,
    prefix: String,
}

impl RedisStore {
    pub fn new(redis: ConnectionManager) -> Self {
        Self {
            redis,
            prefix: DEFAULT_PREFIX.to_string(),
        }
    }

    pub async fn connect(url: &str) -> anyhow::Result<Self> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self::new(conn))
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    fn key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }
}

#[async_trait]
impl ApprovalStore for RedisStore {
    async fn put(&self, key: &str, value: Vec<u8>, ttl: Duration) -> anyhow::Result<()> {
        let mut conn = self.redis.clone();
        // SET EX has second granularity; never round a live entry down to 0.
        let ttl_secs = ttl.as_secs().max(1);
        conn.set_ex::<_, _, ()>(self.key(key), value, ttl_secs).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>> {
        let mut conn = self.redis.clone();
        let value: Option<Vec<u8>> = conn.get(self.key(key)).await?;
        Ok(value)
    }

    async fn delete(&self, key: &str) -> anyhow::Result<()> {
        let mut conn = self.redis.clone();
        conn.del::<_, ()>(self.key(key)).await?;
        Ok(())
    }

    /// Walks the keyspace with `SCAN MATCH` so large databases are never
    /// blocked by a single `KEYS`.
    async fn keys(&self) -> anyhow::Result<Vec<String>> {
        let mut conn = self.redis.clone();
        let mut found = Vec::new();
        {
            let mut iter = conn
                .scan_match::<_, String>(scan_pattern(&self.prefix))
                .await?;
            while let Some(key) = iter.next_item().await {
                if let Some(stripped) = key.strip_prefix(&self.prefix) {
                    found.push(stripped.to_string());
                }
            }
        }
        // SCAN may return a key more than once
        found.sort();
        found.dedup();
        Ok(found)
    }
}

/// `MATCH` pattern for every key under `prefix`, with glob characters in the
/// prefix escaped.
fn scan_pattern(prefix: &str) -> String {
    let mut pattern = String::with_capacity(prefix.len() + 1);
    for c in prefix.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('*');
    pattern
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_pattern_escapes_globs() {
        assert_eq!(scan_pattern(DEFAULT_PREFIX), "promogate:approvals:*");
        assert_eq!(scan_pattern("team[a]*:"), "team\\[a\\]\\*:*");
    }

    /// Needs a live server: `PROMOGATE_TEST_REDIS_URL=redis://127.0.0.1/`.
    #[tokio::test]
    async fn test_keys_lists_only_prefixed_entries() {
        let Ok(url) = std::env::var("PROMOGATE_TEST_REDIS_URL") else {
            return;
        };
        let prefix = format!("promogate:test:{}:", uuid::Uuid::new_v4());
        let store = RedisStore::connect(&url).await.unwrap().with_prefix(&prefix);
        let other = RedisStore::connect(&url)
            .await
            .unwrap()
            .with_prefix(format!("{}other:", prefix.trim_end_matches(':')));

        for id in ["p/a:1", "p/b:1", "p/c:1"] {
            store.put(id, b"{}".to_vec(), Duration::from_secs(30)).await.unwrap();
        }
        other.put("p/x:1", b"{}".to_vec(), Duration::from_secs(30)).await.unwrap();

        let keys = store.keys().await.unwrap();
        assert_eq!(keys, vec!["p/a:1", "p/b:1", "p/c:1"]);

        for id in ["p/a:1", "p/b:1", "p/c:1"] {
            store.delete(id).await.unwrap();
        }
        other.delete("p/x:1").await.unwrap();
    }
}
