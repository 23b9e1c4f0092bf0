//! Background job: evict expired approvals from the in-memory store.
//!
//! Expired entries already read as absent; the sweep only bounds memory for
//! identifiers nobody looks up again. Redis expires keys on its own and needs
//! no sweep.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::store::MemoryStore;

/// Spawn the sweep task. Runs until `cancel` fires.
pub fn spawn(store: MemoryStore, every: Duration, cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = time::interval(every);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {
                    let evicted = store.evict_expired();
                    if evicted > 0 {
                        tracing::info!(evicted, remaining = store.len(), "swept expired approvals");
                    }
                }
            }
        }
        tracing::debug!("sweep job stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ApprovalStore;

    #[tokio::test]
    async fn test_sweep_evicts_and_stops_on_cancel() {
        let store = MemoryStore::new();
        store
            .put("p/r:1", b"v".to_vec(), Duration::from_millis(10))
            .await
            .unwrap();

        let cancel = CancellationToken::new();
        let handle = spawn(store.clone(), Duration::from_millis(20), cancel.clone());
        time::sleep(Duration::from_millis(80)).await;
        assert!(store.is_empty());

        cancel.cancel();
        time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("sweep should stop")
            .unwrap();
    }
}
