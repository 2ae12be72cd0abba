//! Live-call registry.
//!
//! Holds the in-flight record of every active call, addressable by call id.
//! Injected into the state machine and scheduler rather than accessed as
//! ambient state, so concurrent instances can be tested in isolation.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{watch, Mutex, RwLock};

use crate::models::{CallRecord, CallStatus};

/// One in-flight call.
///
/// The record sits behind a per-call mutex: provider events for one call id
/// are serialized through it, so the monotonic state-machine invariant
/// cannot be raced. Status changes are mirrored onto a watch channel for
/// awaiters.
pub struct LiveCall {
    pub(crate) record: Mutex<CallRecord>,
    status_tx: watch::Sender<CallStatus>,
}

impl LiveCall {
    fn new(record: CallRecord) -> Self {
        let (status_tx, _) = watch::channel(record.status);
        Self {
            record: Mutex::new(record),
            status_tx,
        }
    }

    /// Subscribe to status changes for this call.
    pub fn subscribe(&self) -> watch::Receiver<CallStatus> {
        self.status_tx.subscribe()
    }

    pub(crate) fn publish(&self, status: CallStatus) {
        self.status_tx.send_replace(status);
    }
}

/// Registry of live calls, keyed by call id.
#[derive(Default)]
pub struct CallRegistry {
    calls: RwLock<HashMap<String, Arc<LiveCall>>>,
}

impl CallRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a call, returning its live handle.
    pub async fn insert(&self, record: CallRecord) -> Arc<LiveCall> {
        let id = record.id.clone();
        let live = Arc::new(LiveCall::new(record));
        self.calls.write().await.insert(id, live.clone());
        live
    }

    pub async fn get(&self, call_id: &str) -> Option<Arc<LiveCall>> {
        self.calls.read().await.get(call_id).cloned()
    }

    /// Drop a call from the registry once ownership has transferred to
    /// durable storage.
    pub async fn remove(&self, call_id: &str) -> Option<Arc<LiveCall>> {
        self.calls.write().await.remove(call_id)
    }

    /// A point-in-time copy of a live call's record.
    pub async fn snapshot(&self, call_id: &str) -> Option<CallRecord> {
        let live = self.get(call_id).await?;
        let record = live.record.lock().await;
        Some(record.clone())
    }

    pub async fn live_count(&self) -> usize {
        self.calls.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_insert_and_snapshot() {
        let registry = CallRegistry::new();
        let record = CallRecord::new("lead-1", "script-1");
        let id = record.id.clone();
        registry.insert(record).await;

        let snapshot = registry.snapshot(&id).await.unwrap();
        assert_eq!(snapshot.status, CallStatus::Initiated);
        assert_eq!(registry.live_count().await, 1);
    }

    #[tokio::test]
    async fn test_remove() {
        let registry = CallRegistry::new();
        let record = CallRecord::new("lead-1", "script-1");
        let id = record.id.clone();
        registry.insert(record).await;

        assert!(registry.remove(&id).await.is_some());
        assert!(registry.get(&id).await.is_none());
        assert_eq!(registry.live_count().await, 0);
    }

    #[tokio::test]
    async fn test_watch_publishes_status() {
        let registry = CallRegistry::new();
        let record = CallRecord::new("lead-1", "script-1");
        let id = record.id.clone();
        let live = registry.insert(record).await;

        let mut rx = live.subscribe();
        assert_eq!(*rx.borrow(), CallStatus::Initiated);

        {
            let mut record = live.record.lock().await;
            record.transition_to(CallStatus::Ringing);
            live.publish(record.status);
        }
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), CallStatus::Ringing);
        assert_eq!(
            registry.snapshot(&id).await.unwrap().status,
            CallStatus::Ringing
        );
    }
}
