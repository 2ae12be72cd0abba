//! Voice persona assignment.
//!
//! Each call draws one synthesized voice at random and keeps it for the
//! whole conversation, so the persona never shifts between utterances. The
//! assignment lives in the distributed state layer under a TTL longer than
//! any plausible call.

use std::sync::Arc;
use std::time::Duration;

use crate::error::OrchestratorResult;
use crate::state::{StateStore, KEY_PREFIX};

/// Synthesized voice personas available to outbound calls.
pub const VOICE_POOL: &[&str] = &["amber", "cedar", "juniper", "marin", "sloane", "vesper"];

/// Pick a random voice from the pool.
fn random_voice() -> &'static str {
    use std::time::SystemTime;
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_nanos() as usize)
        .unwrap_or(0);
    VOICE_POOL[nanos % VOICE_POOL.len()]
}

/// Records which voice a call speaks with.
pub struct VoiceAssigner {
    store: Arc<dyn StateStore>,
    ttl: Duration,
}

impl VoiceAssigner {
    pub fn new(store: Arc<dyn StateStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    fn key(call_id: &str) -> String {
        format!("{}voice:{}", KEY_PREFIX, call_id)
    }

    /// Draw a voice for a new call and record the assignment.
    pub async fn assign(&self, call_id: &str) -> OrchestratorResult<String> {
        let voice = random_voice();
        self.store
            .set_ex(&Self::key(call_id), voice, self.ttl)
            .await?;
        Ok(voice.to_string())
    }

    /// The voice assigned to a call, if still within its TTL.
    pub async fn lookup(&self, call_id: &str) -> OrchestratorResult<Option<String>> {
        self.store.get(&Self::key(call_id)).await
    }

    /// Drop an assignment once the call has ended.
    pub async fn release(&self, call_id: &str) -> OrchestratorResult<()> {
        self.store.delete(&Self::key(call_id)).await
    }
}
