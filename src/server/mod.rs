//! HTTP surface of the orchestration core.
//!
//! Serves the dashboard polling API (campaign status, per-call detail),
//! ingests provider lifecycle webhooks, and exposes readiness. Clients poll
//! at a fixed interval; every response reflects persisted state.

mod handlers;
mod routes;

pub use routes::create_router;

use std::net::SocketAddr;
use std::sync::Arc;

use crate::calls::{CallEngine, CallRegistry};
use crate::campaigns::CampaignScheduler;
use crate::config::Settings;
use crate::health::HealthReporter;
use crate::llm::LlmClient;
use crate::rate_limit::RateLimiter;
use crate::repository::{CallRepository, CampaignRepository, MemoryRepository};
use crate::state::{FailoverStateStore, StateStore};
use crate::telephony::{HttpTelephonyProvider, TelephonyProvider};

/// Shared state for the orchestration server.
#[derive(Clone)]
pub struct AppState {
    pub scheduler: Arc<CampaignScheduler>,
    pub engine: Arc<CallEngine>,
    pub registry: Arc<CallRegistry>,
    pub campaigns: Arc<dyn CampaignRepository>,
    pub calls: Arc<dyn CallRepository>,
    pub health: Arc<HealthReporter>,
}

impl AppState {
    /// Wire the full orchestration core from settings.
    pub async fn new(settings: &Settings) -> anyhow::Result<Self> {
        let failover =
            Arc::new(FailoverStateStore::connect(settings.state.redis_url.as_deref()).await);
        let store: Arc<dyn StateStore> = failover.clone();

        let repo = Arc::new(MemoryRepository::new());
        let provider: Arc<dyn TelephonyProvider> =
            Arc::new(HttpTelephonyProvider::new(settings.telephony.clone()));
        let analyst = settings
            .llm
            .enabled
            .then(|| Arc::new(LlmClient::new(settings.llm.clone())));

        let registry = Arc::new(CallRegistry::new());
        let limiter = Arc::new(RateLimiter::new(store.clone(), settings.limits.clone()));

        let engine = Arc::new(CallEngine::new(
            registry.clone(),
            store,
            limiter,
            provider.clone(),
            repo.clone(),
            analyst.clone(),
            settings.call_engine_config(),
        ));

        let scheduler = Arc::new(CampaignScheduler::new(
            repo.clone(),
            repo.clone(),
            engine.clone(),
            settings.scheduler_config(),
        ));

        let health = Arc::new(HealthReporter::new(
            failover,
            repo.clone(),
            provider,
            analyst,
        ));

        Ok(Self {
            scheduler,
            engine,
            registry,
            campaigns: repo.clone(),
            calls: repo,
            health,
        })
    }
}

/// Start the orchestration server.
pub async fn serve(settings: &Settings, host: &str, port: u16) -> anyhow::Result<()> {
    let state = AppState::new(settings).await?;

    // Campaigns left running by a previous process resume from their
    // last checkpoint.
    let resumed = state.scheduler.recover().await?;
    if resumed > 0 {
        tracing::info!("resumed {} interrupted campaign(s)", resumed);
    }

    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    tracing::info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use crate::campaigns::SchedulerConfig;
    use crate::error::OrchestratorResult;
    use crate::models::{Lead, Script};
    use crate::rate_limit::RateLimitSettings;
    use crate::state::LocalStateStore;

    /// Provider stub that records placed call ids.
    struct RecordingProvider {
        placed: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl TelephonyProvider for RecordingProvider {
        async fn place_call(&self, _to: &str, callback_url: &str) -> OrchestratorResult<String> {
            let call_id = callback_url
                .rsplit('/')
                .next()
                .unwrap_or_default()
                .to_string();
            self.placed.lock().unwrap().push(call_id.clone());
            Ok(format!("pc-{}", call_id))
        }

        async fn ping(&self) -> bool {
            true
        }
    }

    async fn setup_test_app() -> (axum::Router, Arc<RecordingProvider>) {
        let failover = Arc::new(FailoverStateStore::local_only());
        let store: Arc<dyn StateStore> = Arc::new(LocalStateStore::new());

        let repo = Arc::new(MemoryRepository::new());
        repo.insert_script(Script::new("s1", "intro", "Hi, this is Dana..."))
            .await;
        repo.insert_lead(Lead::new("a", Some("+15550000001"))).await;
        repo.insert_lead(Lead::new("b", Some("+15550000002"))).await;

        let provider = Arc::new(RecordingProvider {
            placed: Mutex::new(Vec::new()),
        });

        let registry = Arc::new(CallRegistry::new());
        let limiter = Arc::new(RateLimiter::new(
            store.clone(),
            RateLimitSettings::default(),
        ));
        let engine = Arc::new(CallEngine::new(
            registry.clone(),
            store,
            limiter,
            provider.clone(),
            repo.clone(),
            None,
            Default::default(),
        ));
        let scheduler = Arc::new(CampaignScheduler::new(
            repo.clone(),
            repo.clone(),
            engine.clone(),
            SchedulerConfig {
                max_call: std::time::Duration::from_secs(5),
                admission_retries: 0,
            },
        ));
        let health = Arc::new(HealthReporter::new(
            failover,
            repo.clone(),
            provider.clone(),
            None,
        ));

        let state = AppState {
            scheduler,
            engine,
            registry,
            campaigns: repo.clone(),
            calls: repo,
            health,
        };

        (create_router(state), provider)
    }

    fn json_post(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    async fn await_placement(provider: &Arc<RecordingProvider>, count: usize) -> String {
        tokio::time::timeout(std::time::Duration::from_secs(5), async {
            loop {
                {
                    let placed = provider.placed.lock().unwrap();
                    if placed.len() >= count {
                        return placed[count - 1].clone();
                    }
                }
                tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("call was never placed")
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _provider) = setup_test_app().await;

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["healthy"], true);
        assert_eq!(json["state_mode"], "local_only");
    }

    #[tokio::test]
    async fn test_list_campaigns_empty() {
        let (app, _provider) = setup_test_app().await;

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/campaigns")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json.as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_campaign_lifecycle_over_http() {
        let (app, provider) = setup_test_app().await;

        let response = app
            .clone()
            .oneshot(json_post(
                "/api/campaigns",
                serde_json::json!({
                    "name": "smoke",
                    "script_id": "s1",
                    "lead_ids": ["a"],
                    "delay_between_calls_secs": 0
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let created = body_json(response).await;
        assert_eq!(created["status"], "running");
        let campaign_id = created["id"].as_str().unwrap().to_string();

        // The loop places the call; drive it to completion via webhooks.
        let call_id = await_placement(&provider, 1).await;
        for event in [
            serde_json::json!({"event": "answered"}),
            serde_json::json!({"event": "speech", "speaker": "lead", "text": "hello?"}),
            serde_json::json!({"event": "hangup", "reason": "hangup"}),
        ] {
            let response = app
                .clone()
                .oneshot(json_post(&format!("/webhooks/calls/{}", call_id), event))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::NO_CONTENT);
        }

        // Poll until the checkpointed terminal state is visible.
        let done = tokio::time::timeout(std::time::Duration::from_secs(5), async {
            loop {
                let response = app
                    .clone()
                    .oneshot(
                        Request::builder()
                            .uri(format!("/api/campaigns/{}", campaign_id))
                            .body(Body::empty())
                            .unwrap(),
                    )
                    .await
                    .unwrap();
                let json = body_json(response).await;
                if json["status"] == "completed" {
                    return json;
                }
                tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("campaign never completed");

        assert_eq!(done["completed_calls"], 1);
        assert_eq!(done["successful_calls"], 1);
        assert_eq!(done["failed_calls"], 0);

        // The resolved call is durable and exposed with its transcript.
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri(format!("/api/calls/{}", call_id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let call = body_json(response).await;
        assert_eq!(call["status"], "completed");
        assert_eq!(call["transcript"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_create_campaign_without_leads_is_rejected() {
        let (app, _provider) = setup_test_app().await;

        let response = app
            .oneshot(json_post(
                "/api/campaigns",
                serde_json::json!({
                    "name": "empty",
                    "script_id": "s1",
                    "lead_ids": []
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_campaign_not_found() {
        let (app, _provider) = setup_test_app().await;

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/campaigns/missing")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app
            .oneshot(json_post(
                "/api/campaigns/missing/pause",
                serde_json::json!({}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_invalid_transition_is_conflict() {
        let (app, _provider) = setup_test_app().await;

        let response = app
            .clone()
            .oneshot(json_post(
                "/api/campaigns",
                serde_json::json!({
                    "name": "smoke",
                    "script_id": "s1",
                    "lead_ids": ["a", "b"],
                    "delay_between_calls_secs": 0
                }),
            ))
            .await
            .unwrap();
        let created = body_json(response).await;
        let campaign_id = created["id"].as_str().unwrap();

        // Resuming a running campaign is invalid.
        let response = app
            .oneshot(json_post(
                &format!("/api/campaigns/{}/resume", campaign_id),
                serde_json::json!({}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_call_not_found() {
        let (app, _provider) = setup_test_app().await;

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/calls/missing")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_webhook_for_unknown_call_is_404() {
        let (app, _provider) = setup_test_app().await;

        let response = app
            .oneshot(json_post(
                "/webhooks/calls/missing",
                serde_json::json!({"event": "ringing"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_recent_calls() {
        let (app, _provider) = setup_test_app().await;

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/calls/recent?limit=5")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert!(json.is_array());
    }
}
