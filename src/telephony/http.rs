//! HTTP telephony provider client.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{TelephonyConfig, TelephonyProvider};
use crate::error::{OrchestratorError, OrchestratorResult};

#[derive(Debug, Serialize)]
struct PlaceCallRequest<'a> {
    to: &'a str,
    callback_url: &'a str,
}

#[derive(Debug, Deserialize)]
struct PlaceCallResponse {
    call_id: String,
}

/// Webhook-driven provider speaking a JSON call-placement API.
pub struct HttpTelephonyProvider {
    client: Client,
    config: TelephonyConfig,
}

impl HttpTelephonyProvider {
    pub fn new(config: TelephonyConfig) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.request_timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self { client, config }
    }

    fn calls_url(&self) -> String {
        format!("{}/v1/calls", self.config.base_url.trim_end_matches('/'))
    }

    /// Whether an HTTP status marks a transient failure worth retrying.
    fn is_transient(status: StatusCode) -> bool {
        status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
    }
}

#[async_trait]
impl TelephonyProvider for HttpTelephonyProvider {
    async fn place_call(&self, to_number: &str, callback_url: &str) -> OrchestratorResult<String> {
        debug!("Placing call to {} via {}", to_number, self.config.base_url);

        let mut request = self.client.post(self.calls_url()).json(&PlaceCallRequest {
            to: to_number,
            callback_url,
        });
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| OrchestratorError::ProviderTransport(e.to_string()))?;

        let status = response.status();
        if Self::is_transient(status) {
            let body = response.text().await.unwrap_or_default();
            return Err(OrchestratorError::ProviderTransport(format!(
                "HTTP {}: {}",
                status, body
            )));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OrchestratorError::ProviderRejected(format!(
                "HTTP {}: {}",
                status, body
            )));
        }

        let placed: PlaceCallResponse = response
            .json()
            .await
            .map_err(|e| OrchestratorError::ProviderTransport(e.to_string()))?;

        Ok(placed.call_id)
    }

    async fn ping(&self) -> bool {
        let url = format!("{}/health", self.config.base_url.trim_end_matches('/'));
        match self.client.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(HttpTelephonyProvider::is_transient(
            StatusCode::INTERNAL_SERVER_ERROR
        ));
        assert!(HttpTelephonyProvider::is_transient(
            StatusCode::SERVICE_UNAVAILABLE
        ));
        assert!(HttpTelephonyProvider::is_transient(
            StatusCode::TOO_MANY_REQUESTS
        ));
        assert!(!HttpTelephonyProvider::is_transient(StatusCode::FORBIDDEN));
        assert!(!HttpTelephonyProvider::is_transient(StatusCode::BAD_REQUEST));
    }

    #[test]
    fn test_calls_url_trims_trailing_slash() {
        let provider = HttpTelephonyProvider::new(TelephonyConfig {
            base_url: "http://voice.example.com/".to_string(),
            ..Default::default()
        });
        assert_eq!(provider.calls_url(), "http://voice.example.com/v1/calls");
    }

    #[tokio::test]
    async fn test_unreachable_provider_is_transport_error() {
        // Nothing listens on this port.
        let provider = HttpTelephonyProvider::new(TelephonyConfig {
            base_url: "http://127.0.0.1:1".to_string(),
            request_timeout_secs: 1,
            ..Default::default()
        });
        match provider.place_call("+15550102030", "http://cb").await {
            Err(OrchestratorError::ProviderTransport(_)) => {}
            other => panic!("expected transport error, got {:?}", other.map(|_| ())),
        }
        assert!(!provider.ping().await);
    }
}
