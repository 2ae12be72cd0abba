//! Telephony provider contract.
//!
//! The core only needs the call contract: place a call, receive lifecycle
//! webhooks on the callback URL it hands over. Signaling internals stay on
//! the provider side.

mod http;

pub use http::HttpTelephonyProvider;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::OrchestratorResult;

/// Outbound telephony capability.
#[async_trait]
pub trait TelephonyProvider: Send + Sync {
    /// Place an outbound call.
    ///
    /// Lifecycle events (ringing, answered, speech, hangup) for the placed
    /// call arrive as webhooks on `callback_url`. Returns the provider's
    /// call id.
    ///
    /// Errors are classified: `ProviderTransport` for transient transport
    /// failures (retryable with backoff) and `ProviderRejected` for
    /// permanent rejections.
    async fn place_call(&self, to_number: &str, callback_url: &str) -> OrchestratorResult<String>;

    /// Whether the provider is reachable right now.
    async fn ping(&self) -> bool;
}

/// Telephony provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelephonyConfig {
    /// Base URL of the provider API.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Bearer token, if the provider requires one.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Retries for transient transport failures during call placement.
    #[serde(default = "default_place_retries")]
    pub place_retries: u32,
    /// Base backoff between placement retries, in milliseconds.
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

fn default_base_url() -> String {
    "http://localhost:9400".to_string()
}
fn default_request_timeout_secs() -> u64 {
    10
}
fn default_place_retries() -> u32 {
    3
}
fn default_retry_backoff_ms() -> u64 {
    500
}

impl Default for TelephonyConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            request_timeout_secs: default_request_timeout_secs(),
            place_retries: default_place_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}
