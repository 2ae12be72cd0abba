//! HTTP request handlers for the orchestration API.
//!
//! Dashboard clients poll these endpoints every few seconds; responses
//! reflect the latest persisted checkpoint, never a partial update. The
//! webhook handler applies the event and acks immediately so the provider
//! does not retry.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;

use super::AppState;
use crate::calls::ProviderEvent;
use crate::campaigns::CreateCampaign;
use crate::error::OrchestratorError;

/// Map a core error onto an HTTP response.
fn error_response(err: OrchestratorError) -> Response {
    let (status, retry_after) = match &err {
        OrchestratorError::CampaignNotFound(_) | OrchestratorError::CallNotFound(_) => {
            (StatusCode::NOT_FOUND, None)
        }
        OrchestratorError::InvalidTransition(_) => (StatusCode::CONFLICT, None),
        OrchestratorError::AdmissionDenied { retry_after } => {
            (StatusCode::TOO_MANY_REQUESTS, Some(retry_after.as_secs()))
        }
        OrchestratorError::InvalidLead(_) => (StatusCode::UNPROCESSABLE_ENTITY, None),
        OrchestratorError::ProviderTransport(_) | OrchestratorError::ProviderRejected(_) => {
            (StatusCode::BAD_GATEWAY, None)
        }
        OrchestratorError::StateStoreUnavailable(_) | OrchestratorError::Repository(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, None)
        }
    };

    let mut body = serde_json::json!({ "error": err.to_string() });
    if let Some(secs) = retry_after {
        body["retry_after_secs"] = secs.into();
    }
    (status, Json(body)).into_response()
}

/// Readiness endpoint for orchestration and load balancers.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let report = state.health.check().await;
    let status = if report.healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(report))
}

pub async fn list_campaigns(State(state): State<AppState>) -> impl IntoResponse {
    match state.campaigns.list_campaigns().await {
        Ok(campaigns) => Json(campaigns).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn create_campaign(
    State(state): State<AppState>,
    Json(request): Json<CreateCampaign>,
) -> impl IntoResponse {
    match state.scheduler.create(request).await {
        Ok(campaign) => (StatusCode::CREATED, Json(campaign)).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn campaign_detail(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.campaigns.get_campaign(&id).await {
        Ok(Some(campaign)) => Json(campaign).into_response(),
        Ok(None) => error_response(OrchestratorError::CampaignNotFound(id)),
        Err(e) => error_response(e),
    }
}

pub async fn pause_campaign(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.scheduler.pause(&id).await {
        Ok(campaign) => Json(campaign).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn resume_campaign(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.scheduler.resume(&id).await {
        Ok(campaign) => Json(campaign).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn cancel_campaign(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.scheduler.cancel(&id).await {
        Ok(campaign) => Json(campaign).into_response(),
        Err(e) => error_response(e),
    }
}

/// Per-call detail: live calls come from the registry, resolved calls from
/// durable storage.
pub async fn call_detail(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    if let Some(live) = state.registry.snapshot(&id).await {
        return Json(live).into_response();
    }
    match state.calls.get_call(&id).await {
        Ok(Some(call)) => Json(call).into_response(),
        Ok(None) => error_response(OrchestratorError::CallNotFound(id)),
        Err(e) => error_response(e),
    }
}

/// Parameters for recent calls.
#[derive(Debug, Deserialize)]
pub struct RecentParams {
    pub limit: Option<usize>,
}

pub async fn recent_calls(
    State(state): State<AppState>,
    Query(params): Query<RecentParams>,
) -> impl IntoResponse {
    match state.calls.list_recent(params.limit.unwrap_or(20)).await {
        Ok(calls) => Json(calls).into_response(),
        Err(e) => error_response(e),
    }
}

/// Provider lifecycle webhook.
///
/// Applies the event and acks with 204 within the provider's retry budget.
/// Events for calls that already left the live registry are acked too, so
/// late duplicate deliveries stay silent.
pub async fn provider_webhook(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(event): Json<ProviderEvent>,
) -> impl IntoResponse {
    match state.engine.on_provider_event(&id, event).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(OrchestratorError::CallNotFound(_)) => match state.calls.get_call(&id).await {
            Ok(Some(_)) => StatusCode::NO_CONTENT.into_response(),
            Ok(None) => error_response(OrchestratorError::CallNotFound(id)),
            Err(e) => error_response(e),
        },
        Err(e) => error_response(e),
    }
}
