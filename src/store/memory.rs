use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

use super::ApprovalStore;

/// Entry stored in the DashMap with an expiry timestamp.
#[derive(Clone)]
pub(crate) struct StoreEntry {
    value: Vec<u8>,
    pub(crate) expires_at: Instant,
}

/// In-process approval store.
///
/// Entries are checked on read and evicted lazily. A background sweep can be
/// triggered with `evict_expired()` to bound memory for keys nobody reads.
#[derive(Clone, Default)]
pub struct MemoryStore {
    pub(crate) entries: Arc<DashMap<String, StoreEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove all expired entries. Returns how many were dropped.
    pub fn evict_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > now);
        before - self.entries.len()
    }

    /// Number of entries held, expired or not.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl ApprovalStore for MemoryStore {
    async fn put(&self, key: &str, value: Vec<u8>, ttl: Duration) -> anyhow::Result<()> {
        self.entries.insert(
            key.to_string(),
            StoreEntry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>> {
        if let Some(entry) = self.entries.get(key) {
            if Instant::now() < entry.expires_at {
                return Ok(Some(entry.value.clone()));
            }
            // expired, drop the ref before removing
            drop(entry);
            self.entries
                .remove_if(key, |_, entry| Instant::now() >= entry.expires_at);
        }
        Ok(None)
    }

    async fn delete(&self, key: &str) -> anyhow::Result<()> {
        self.entries.remove(key);
        Ok(())
    }

    async fn keys(&self) -> anyhow::Result<Vec<String>> {
        let now = Instant::now();
        Ok(self
            .entries
            .iter()
            .filter(|entry| entry.value().expires_at > now)
            .map(|entry| entry.key().clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_then_get() {
        let store = MemoryStore::new();
        store
            .put("p/r:1", b"one".to_vec(), Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(store.get("p/r:1").await.unwrap(), Some(b"one".to_vec()));
        assert_eq!(store.get("p/r:2").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_put_overwrites_value() {
        let store = MemoryStore::new();
        store.put("k", b"a".to_vec(), Duration::from_secs(60)).await.unwrap();
        store.put("k", b"b".to_vec(), Duration::from_secs(60)).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(b"b".to_vec()));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_expired_entry_reads_as_absent_and_is_purged() {
        let store = MemoryStore::new();
        store
            .put("k", b"v".to_vec(), Duration::from_millis(20))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;

        assert_eq!(store.get("k").await.unwrap(), None);
        assert!(store.is_empty(), "lazy read should purge the entry");
    }

    #[tokio::test]
    async fn test_evict_expired_sweeps_unread_keys() {
        let store = MemoryStore::new();
        store.put("short", b"v".to_vec(), Duration::from_millis(10)).await.unwrap();
        store.put("long", b"v".to_vec(), Duration::from_secs(60)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert_eq!(store.evict_expired(), 1);
        assert_eq!(store.keys().await.unwrap(), vec!["long".to_string()]);
    }

    #[tokio::test]
    async fn test_delete_removes_entry() {
        let store = MemoryStore::new();
        store.put("k", b"v".to_vec(), Duration::from_secs(60)).await.unwrap();
        store.delete("k").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
    }
}
