//! In-process fallback store, scoped to the current instance.
//!
//! Mirrors the TTL semantics of the Redis store so callers cannot tell which
//! side of the failover they landed on. No cross-instance sharing.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::StateStore;
use crate::error::OrchestratorResult;

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Instant,
}

impl Entry {
    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// TTL'd key-value map behind an async lock.
pub struct LocalStateStore {
    entries: RwLock<HashMap<String, Entry>>,
}

impl LocalStateStore {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Drop expired entries. Called opportunistically on writes.
    fn purge(entries: &mut HashMap<String, Entry>) {
        entries.retain(|_, entry| !entry.is_expired());
    }
}

impl Default for LocalStateStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StateStore for LocalStateStore {
    async fn get(&self, key: &str) -> OrchestratorResult<Option<String>> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(key)
            .filter(|entry| !entry.is_expired())
            .map(|entry| entry.value.clone()))
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> OrchestratorResult<()> {
        let mut entries = self.entries.write().await;
        Self::purge(&mut entries);
        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn incr_ex(&self, key: &str, ttl: Duration) -> OrchestratorResult<u64> {
        let mut entries = self.entries.write().await;
        Self::purge(&mut entries);

        // The expiry is armed on creation and left untouched on increment,
        // matching the Redis fixed-window behavior.
        match entries.get_mut(key) {
            Some(entry) => {
                let count = entry.value.parse::<u64>().unwrap_or(0) + 1;
                entry.value = count.to_string();
                Ok(count)
            }
            None => {
                entries.insert(
                    key.to_string(),
                    Entry {
                        value: "1".to_string(),
                        expires_at: Instant::now() + ttl,
                    },
                );
                Ok(1)
            }
        }
    }

    async fn delete(&self, key: &str) -> OrchestratorResult<()> {
        let mut entries = self.entries.write().await;
        entries.remove(key);
        Ok(())
    }

    async fn ping(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_roundtrip() {
        let store = LocalStateStore::new();
        store
            .set_ex("k", "v", Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some("v".to_string()));
    }

    #[tokio::test]
    async fn test_get_missing() {
        let store = LocalStateStore::new();
        assert_eq!(store.get("absent").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_expiry() {
        let store = LocalStateStore::new();
        store
            .set_ex("k", "v", Duration::from_millis(10))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(25)).await;
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_incr_counts_up() {
        let store = LocalStateStore::new();
        for expected in 1..=5 {
            let count = store.incr_ex("counter", Duration::from_secs(60)).await.unwrap();
            assert_eq!(count, expected);
        }
    }

    #[tokio::test]
    async fn test_incr_window_resets_after_expiry() {
        let store = LocalStateStore::new();
        store
            .incr_ex("counter", Duration::from_millis(10))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(25)).await;
        let count = store
            .incr_ex("counter", Duration::from_millis(10))
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_delete() {
        let store = LocalStateStore::new();
        store
            .set_ex("k", "v", Duration::from_secs(60))
            .await
            .unwrap();
        store.delete("k").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
    }
}
