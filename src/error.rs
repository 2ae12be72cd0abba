//! Error taxonomy for the orchestration core.
//!
//! Per-call errors are absorbed by the campaign scheduler and converted into
//! failed-call outcomes; only campaign-control errors reach API callers.

use std::time::Duration;

use thiserror::Error;

/// Errors produced by the orchestration core.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Per-user quota exhausted. Retryable once the current window ends.
    #[error("admission denied, retry after {}s", retry_after.as_secs())]
    AdmissionDenied { retry_after: Duration },

    /// The lead has no callable phone number. Not retryable.
    #[error("invalid lead: {0}")]
    InvalidLead(String),

    /// Transient transport failure talking to the telephony provider.
    #[error("provider transport error: {0}")]
    ProviderTransport(String),

    /// The provider rejected the call permanently. No retry.
    #[error("provider rejected call: {0}")]
    ProviderRejected(String),

    /// The remote state store is unreachable. Never surfaced to callers;
    /// operations are rerouted to the local fallback instead.
    #[error("state store unavailable: {0}")]
    StateStoreUnavailable(String),

    #[error("campaign not found: {0}")]
    CampaignNotFound(String),

    #[error("call not found: {0}")]
    CallNotFound(String),

    /// The requested lifecycle transition is not valid from the current state.
    #[error("invalid transition: {0}")]
    InvalidTransition(String),

    /// The durable persistence collaborator failed.
    #[error("repository error: {0}")]
    Repository(String),
}

pub type OrchestratorResult<T> = Result<T, OrchestratorError>;
