//! Health and readiness reporting.
//!
//! Probes each external dependency and aggregates the results into one
//! readiness signal: healthy only if every dependency is reachable. A state
//! layer running on its local fallback is reported unhealthy so operators
//! see the degradation, even though call processing continues.

use std::sync::Arc;

use serde::Serialize;

use crate::llm::LlmClient;
use crate::repository::CallRepository;
use crate::state::{FailoverStateStore, StateMode};
use crate::telephony::TelephonyProvider;

/// Point-in-time dependency reachability.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub healthy: bool,
    /// Remote state store reachability. True in local-only deployments.
    pub state_store: bool,
    /// Current state routing: "remote", "fallback" or "local_only".
    pub state_mode: &'static str,
    pub repository: bool,
    pub telephony: bool,
    /// Present only when post-call analysis is configured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm: Option<bool>,
}

/// Aggregates dependency probes for the health endpoint.
pub struct HealthReporter {
    state: Arc<FailoverStateStore>,
    calls_repo: Arc<dyn CallRepository>,
    provider: Arc<dyn TelephonyProvider>,
    llm: Option<Arc<LlmClient>>,
}

impl HealthReporter {
    pub fn new(
        state: Arc<FailoverStateStore>,
        calls_repo: Arc<dyn CallRepository>,
        provider: Arc<dyn TelephonyProvider>,
        llm: Option<Arc<LlmClient>>,
    ) -> Self {
        Self {
            state,
            calls_repo,
            provider,
            llm,
        }
    }

    /// Probe every dependency and aggregate.
    pub async fn check(&self) -> HealthReport {
        let (remote, repository, telephony) = tokio::join!(
            self.state.probe_remote(),
            self.calls_repo.ping(),
            self.provider.ping()
        );

        // No remote configured means local-only by choice, not degradation.
        let state_store = remote.unwrap_or(true);

        let llm = match &self.llm {
            Some(client) => Some(client.is_available().await),
            None => None,
        };

        let state_mode = match self.state.mode() {
            StateMode::Remote => "remote",
            StateMode::Fallback => "fallback",
            StateMode::LocalOnly => "local_only",
        };

        HealthReport {
            healthy: state_store && repository && telephony && llm.unwrap_or(true),
            state_store,
            state_mode,
            repository,
            telephony,
            llm,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;

    use crate::error::OrchestratorResult;
    use crate::repository::MemoryRepository;

    struct StubProvider {
        up: bool,
    }

    #[async_trait]
    impl TelephonyProvider for StubProvider {
        async fn place_call(&self, _to: &str, _cb: &str) -> OrchestratorResult<String> {
            Ok("pc-1".to_string())
        }
        async fn ping(&self) -> bool {
            self.up
        }
    }

    #[tokio::test]
    async fn test_all_reachable_is_healthy() {
        let reporter = HealthReporter::new(
            Arc::new(FailoverStateStore::local_only()),
            Arc::new(MemoryRepository::new()),
            Arc::new(StubProvider { up: true }),
            None,
        );
        let report = reporter.check().await;
        assert!(report.healthy);
        assert!(report.state_store);
        assert_eq!(report.state_mode, "local_only");
        assert_eq!(report.llm, None);
    }

    #[tokio::test]
    async fn test_provider_down_is_unhealthy() {
        let reporter = HealthReporter::new(
            Arc::new(FailoverStateStore::local_only()),
            Arc::new(MemoryRepository::new()),
            Arc::new(StubProvider { up: false }),
            None,
        );
        let report = reporter.check().await;
        assert!(!report.healthy);
        assert!(!report.telephony);
        assert!(report.repository);
    }

    #[tokio::test]
    async fn test_llm_omitted_from_serialized_report_when_unconfigured() {
        let reporter = HealthReporter::new(
            Arc::new(FailoverStateStore::local_only()),
            Arc::new(MemoryRepository::new()),
            Arc::new(StubProvider { up: true }),
            None,
        );
        let report = reporter.check().await;
        let json = serde_json::to_string(&report).unwrap();
        assert!(!json.contains("llm"));
    }
}
