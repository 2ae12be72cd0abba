//! Router configuration for the orchestration API.

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;

use super::handlers;
use super::AppState;

/// Create the main router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Campaign control and polling
        .route(
            "/api/campaigns",
            get(handlers::list_campaigns).post(handlers::create_campaign),
        )
        .route("/api/campaigns/:id", get(handlers::campaign_detail))
        .route("/api/campaigns/:id/pause", post(handlers::pause_campaign))
        .route("/api/campaigns/:id/resume", post(handlers::resume_campaign))
        .route("/api/campaigns/:id/cancel", post(handlers::cancel_campaign))
        // Per-call detail
        .route("/api/calls/recent", get(handlers::recent_calls))
        .route("/api/calls/:id", get(handlers::call_detail))
        // Provider lifecycle webhooks
        .route("/webhooks/calls/:id", post(handlers::provider_webhook))
        // Readiness
        .route("/health", get(handlers::health))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
