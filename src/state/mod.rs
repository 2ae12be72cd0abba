//! Distributed state layer with degraded-mode fallback.
//!
//! Holds the short-lived, TTL-bounded shared state of the orchestrator:
//! voice-persona assignments and rate-limit counters. Backed by Redis when
//! reachable; transparently routed to an in-process store otherwise. Both
//! use cases are single-key and TTL-scoped, so no cross-key transactions
//! are needed.

mod local;
mod redis;

pub use local::LocalStateStore;
pub use redis::RedisStateStore;

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use crate::error::OrchestratorResult;

/// Key prefix for all orchestrator state.
pub const KEY_PREFIX: &str = "dialflow:";

/// Capability interface over a TTL'd key-value store.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn get(&self, key: &str) -> OrchestratorResult<Option<String>>;

    /// Set a value that expires after `ttl`.
    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> OrchestratorResult<()>;

    /// Atomically increment a counter, arming `ttl` when the key is created.
    /// Returns the post-increment value.
    async fn incr_ex(&self, key: &str, ttl: Duration) -> OrchestratorResult<u64>;

    async fn delete(&self, key: &str) -> OrchestratorResult<()>;

    /// Whether the store is reachable right now.
    async fn ping(&self) -> bool;
}

/// Routing mode the failover store last operated in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateMode {
    /// Operations target the remote store.
    Remote,
    /// The remote store is configured but unreachable; operations target the
    /// in-process fallback.
    Fallback,
    /// No remote store is configured.
    LocalOnly,
}

/// Routes each operation to the remote store when reachable and to the local
/// fallback otherwise.
///
/// Fallback entries are never migrated back: both use cases are short-lived
/// and TTL-bounded, and a call lives on one instance. Once the remote store
/// answers again, new operations target it directly.
pub struct FailoverStateStore {
    remote: Option<RedisStateStore>,
    local: LocalStateStore,
    remote_healthy: AtomicBool,
}

impl FailoverStateStore {
    /// Connect to the remote store if a URL is configured.
    ///
    /// A remote that is down at startup leaves the process in local-only
    /// mode; an established connection reconnects on its own afterwards.
    pub async fn connect(redis_url: Option<&str>) -> Self {
        let remote = match redis_url {
            Some(url) => match RedisStateStore::connect(url).await {
                Ok(store) => Some(store),
                Err(e) => {
                    warn!("state store unreachable at startup, using local fallback: {}", e);
                    None
                }
            },
            None => None,
        };
        let remote_healthy = AtomicBool::new(remote.is_some());
        Self {
            remote,
            local: LocalStateStore::new(),
            remote_healthy,
        }
    }

    /// A store with no remote configured. Used by tests and local-only runs.
    pub fn local_only() -> Self {
        Self {
            remote: None,
            local: LocalStateStore::new(),
            remote_healthy: AtomicBool::new(false),
        }
    }

    /// The routing mode as of the last operation or probe.
    pub fn mode(&self) -> StateMode {
        match (&self.remote, self.remote_healthy.load(Ordering::Relaxed)) {
            (None, _) => StateMode::LocalOnly,
            (Some(_), true) => StateMode::Remote,
            (Some(_), false) => StateMode::Fallback,
        }
    }

    /// Probe the remote store. None if no remote is configured.
    pub async fn probe_remote(&self) -> Option<bool> {
        match &self.remote {
            Some(remote) => {
                let up = remote.ping().await;
                self.remote_healthy.store(up, Ordering::Relaxed);
                Some(up)
            }
            None => None,
        }
    }

    fn note_remote(&self, healthy: bool) {
        self.remote_healthy.store(healthy, Ordering::Relaxed);
    }
}

#[async_trait]
impl StateStore for FailoverStateStore {
    async fn get(&self, key: &str) -> OrchestratorResult<Option<String>> {
        if let Some(remote) = &self.remote {
            match remote.get(key).await {
                Ok(value) => {
                    self.note_remote(true);
                    return Ok(value);
                }
                Err(e) => {
                    self.note_remote(false);
                    warn!("state store get failed, falling back to local: {}", e);
                }
            }
        }
        self.local.get(key).await
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> OrchestratorResult<()> {
        if let Some(remote) = &self.remote {
            match remote.set_ex(key, value, ttl).await {
                Ok(()) => {
                    self.note_remote(true);
                    return Ok(());
                }
                Err(e) => {
                    self.note_remote(false);
                    warn!("state store set failed, falling back to local: {}", e);
                }
            }
        }
        self.local.set_ex(key, value, ttl).await
    }

    async fn incr_ex(&self, key: &str, ttl: Duration) -> OrchestratorResult<u64> {
        if let Some(remote) = &self.remote {
            match remote.incr_ex(key, ttl).await {
                Ok(count) => {
                    self.note_remote(true);
                    return Ok(count);
                }
                Err(e) => {
                    self.note_remote(false);
                    warn!("state store incr failed, falling back to local: {}", e);
                }
            }
        }
        self.local.incr_ex(key, ttl).await
    }

    async fn delete(&self, key: &str) -> OrchestratorResult<()> {
        if let Some(remote) = &self.remote {
            match remote.delete(key).await {
                Ok(()) => {
                    self.note_remote(true);
                    return Ok(());
                }
                Err(e) => {
                    self.note_remote(false);
                    warn!("state store delete failed, falling back to local: {}", e);
                }
            }
        }
        self.local.delete(key).await
    }

    async fn ping(&self) -> bool {
        // The layer as a whole is always available; the local fallback
        // cannot fail.
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_local_only_routes_to_fallback() {
        let store = FailoverStateStore::local_only();
        assert_eq!(store.mode(), StateMode::LocalOnly);

        store
            .set_ex("dialflow:test:k", "v", Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(
            store.get("dialflow:test:k").await.unwrap(),
            Some("v".to_string())
        );
    }

    #[tokio::test]
    async fn test_local_only_has_no_remote_probe() {
        let store = FailoverStateStore::local_only();
        assert_eq!(store.probe_remote().await, None);
        assert!(store.ping().await);
    }

    #[tokio::test]
    async fn test_unreachable_remote_degrades_silently() {
        // Nothing listens on this port; connect fails and the store starts
        // in local-only routing without surfacing an error.
        let store = FailoverStateStore::connect(Some("redis://127.0.0.1:1/")).await;

        store
            .set_ex("dialflow:test:deg", "v", Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(
            store.get("dialflow:test:deg").await.unwrap(),
            Some("v".to_string())
        );
        assert_ne!(store.mode(), StateMode::Remote);
    }
}
