//! The per-call state machine.
//!
//! Drives one call from `initiated` through to a terminal state. Inbound
//! provider events are the sole mutation path after placement; each call's
//! events are serialized behind its registry lock, and anything that cannot
//! apply from the current state is dropped rather than erroring, so
//! duplicate and out-of-order webhook deliveries are harmless.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::events::ProviderEvent;
use super::registry::{CallRegistry, LiveCall};
use super::voice::VoiceAssigner;
use crate::error::{OrchestratorError, OrchestratorResult};
use crate::llm::LlmClient;
use crate::models::{CallRecord, CallStatus, DisconnectReason, Lead, Script, Speaker};
use crate::rate_limit::{LimiterClass, RateLimiter};
use crate::repository::CallRepository;
use crate::state::StateStore;
use crate::telephony::TelephonyProvider;

/// Tunables for the call engine.
#[derive(Debug, Clone)]
pub struct CallEngineConfig {
    /// Externally reachable base URL for provider webhooks.
    pub public_url: String,
    /// Hard ceiling on call duration; exceeding it force-fails the call.
    pub max_call: Duration,
    /// TTL on voice assignments. Must outlive `max_call`.
    pub voice_ttl: Duration,
    /// Retries for transient placement failures.
    pub place_retries: u32,
    /// Base backoff between placement retries.
    pub retry_backoff: Duration,
}

impl Default for CallEngineConfig {
    fn default() -> Self {
        Self {
            public_url: "http://localhost:8088".to_string(),
            max_call: Duration::from_secs(3600),
            voice_ttl: Duration::from_secs(7200),
            place_retries: 3,
            retry_backoff: Duration::from_millis(500),
        }
    }
}

/// Handle returned from a successful `start`.
#[derive(Debug, Clone)]
pub struct CallHandle {
    pub call_id: String,
    pub voice_id: String,
}

/// Owns the lifecycle of every live call.
pub struct CallEngine {
    registry: Arc<CallRegistry>,
    voices: VoiceAssigner,
    limiter: Arc<RateLimiter>,
    provider: Arc<dyn TelephonyProvider>,
    calls_repo: Arc<dyn CallRepository>,
    analyst: Option<Arc<LlmClient>>,
    config: CallEngineConfig,
}

impl CallEngine {
    pub fn new(
        registry: Arc<CallRegistry>,
        store: Arc<dyn StateStore>,
        limiter: Arc<RateLimiter>,
        provider: Arc<dyn TelephonyProvider>,
        calls_repo: Arc<dyn CallRepository>,
        analyst: Option<Arc<LlmClient>>,
        config: CallEngineConfig,
    ) -> Self {
        let voices = VoiceAssigner::new(store, config.voice_ttl);
        Self {
            registry,
            voices,
            limiter,
            provider,
            calls_repo,
            analyst,
            config,
        }
    }

    pub fn registry(&self) -> &Arc<CallRegistry> {
        &self.registry
    }

    pub fn voices(&self) -> &VoiceAssigner {
        &self.voices
    }

    fn callback_url(&self, call_id: &str) -> String {
        format!(
            "{}/webhooks/calls/{}",
            self.config.public_url.trim_end_matches('/'),
            call_id
        )
    }

    /// Start a call to a lead.
    ///
    /// Validates the lead, requests strict admission, draws a voice persona,
    /// places the call and registers it in the `initiated` state. Fails with
    /// `InvalidLead` (no callable number), `AdmissionDenied` (quota), or the
    /// provider error if placement ultimately fails.
    pub async fn start(
        &self,
        owner_id: &str,
        lead: &Lead,
        script: &Script,
    ) -> OrchestratorResult<CallHandle> {
        let number = lead.callable_number().ok_or_else(|| {
            OrchestratorError::InvalidLead(format!("lead {} has no callable number", lead.id))
        })?;

        self.limiter.admit(owner_id, LimiterClass::Strict).await?;

        let record = CallRecord::new(&lead.id, &script.id);
        let call_id = record.id.clone();

        let voice_id = self.voices.assign(&call_id).await?;

        // Register before placing: the provider may deliver its first
        // webhook before place_call even returns.
        let live = self.registry.insert(record).await;

        let callback_url = self.callback_url(&call_id);
        match self.place_with_retry(&number, &callback_url).await {
            Ok(provider_call_id) => {
                let mut record = live.record.lock().await;
                record.provider_call_id = Some(provider_call_id);
            }
            Err(e) => {
                self.registry.remove(&call_id).await;
                let _ = self.voices.release(&call_id).await;
                return Err(e);
            }
        }

        info!(
            "call {} started for lead {} (voice {})",
            call_id, lead.id, voice_id
        );

        Ok(CallHandle { call_id, voice_id })
    }

    /// Place the call, retrying transient transport failures with bounded
    /// backoff. Permanent rejections fail immediately.
    async fn place_with_retry(
        &self,
        to_number: &str,
        callback_url: &str,
    ) -> OrchestratorResult<String> {
        let mut attempt = 0u32;
        loop {
            match self.provider.place_call(to_number, callback_url).await {
                Ok(provider_call_id) => return Ok(provider_call_id),
                Err(OrchestratorError::ProviderTransport(message))
                    if attempt < self.config.place_retries =>
                {
                    attempt += 1;
                    let backoff = self.config.retry_backoff * attempt;
                    warn!(
                        "transient placement failure (attempt {}): {}, retrying in {:?}",
                        attempt, message, backoff
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Apply one provider lifecycle event.
    ///
    /// The sole mutation path for inbound callbacks. Events that cannot
    /// apply from the current state are no-ops; events for already-terminal
    /// calls are ignored.
    pub async fn on_provider_event(
        &self,
        call_id: &str,
        event: ProviderEvent,
    ) -> OrchestratorResult<()> {
        let live = self
            .registry
            .get(call_id)
            .await
            .ok_or_else(|| OrchestratorError::CallNotFound(call_id.to_string()))?;
        let mut record = live.record.lock().await;

        if record.is_terminal() {
            debug!("ignoring {:?} for terminal call {}", event, call_id);
            return Ok(());
        }

        match event {
            ProviderEvent::Ringing => {
                if record.transition_to(CallStatus::Ringing) {
                    live.publish(record.status);
                }
            }
            ProviderEvent::Answered => {
                if record.transition_to(CallStatus::InProgress) {
                    live.publish(record.status);
                }
            }
            ProviderEvent::Speech { speaker, text } => {
                if let Err(e) = record.append_utterance(speaker, &text) {
                    debug!("dropping speech event: {}", e);
                }
            }
            ProviderEvent::Hangup { reason } => {
                return self.finalize_locked(&live, &mut record, reason).await;
            }
            ProviderEvent::Error { message } => {
                warn!("provider error on call {}: {}", call_id, message);
                return self
                    .finalize_locked(&live, &mut record, DisconnectReason::ProviderError)
                    .await;
            }
        }

        Ok(())
    }

    /// Append an utterance to a live call. Only valid while `in_progress`.
    pub async fn append_transcript(
        &self,
        call_id: &str,
        speaker: Speaker,
        text: &str,
    ) -> OrchestratorResult<()> {
        let live = self
            .registry
            .get(call_id)
            .await
            .ok_or_else(|| OrchestratorError::CallNotFound(call_id.to_string()))?;
        let mut record = live.record.lock().await;
        record.append_utterance(speaker, text)
    }

    /// Finalize a call with the terminal state implied by the disconnect
    /// reason. Idempotent under duplicate hangup signals.
    pub async fn finalize(
        &self,
        call_id: &str,
        reason: DisconnectReason,
    ) -> OrchestratorResult<()> {
        let live = self
            .registry
            .get(call_id)
            .await
            .ok_or_else(|| OrchestratorError::CallNotFound(call_id.to_string()))?;
        let mut record = live.record.lock().await;
        self.finalize_locked(&live, &mut record, reason).await
    }

    async fn finalize_locked(
        &self,
        live: &LiveCall,
        record: &mut CallRecord,
        reason: DisconnectReason,
    ) -> OrchestratorResult<()> {
        if record.is_terminal() {
            return Ok(());
        }

        record.duration_seconds = Some(record.elapsed_talk_seconds());
        record.disconnect_reason = Some(reason);
        record.transition_to(reason.terminal_status());
        live.publish(record.status);

        // The one durable emission for this call.
        self.calls_repo.save_call(record).await?;

        if let Err(e) = self.voices.release(&record.id).await {
            debug!("voice release failed for call {}: {}", record.id, e);
        }

        info!(
            "call {} ended: {} ({})",
            record.id,
            record.status.as_str(),
            reason.as_str()
        );

        if let Some(analyst) = &self.analyst {
            if !record.transcript.is_empty() {
                self.spawn_analysis(analyst.clone(), record.clone());
            }
        }

        Ok(())
    }

    /// Post-call analysis runs detached so a slow model never holds up the
    /// hangup path; results attach to the already-durable record.
    fn spawn_analysis(&self, analyst: Arc<LlmClient>, snapshot: CallRecord) {
        let repo = self.calls_repo.clone();
        tokio::spawn(async move {
            match analyst.analyze_call(&snapshot).await {
                Ok(analysis) => {
                    if let Err(e) = repo
                        .attach_analysis(
                            &snapshot.id,
                            &analysis.summary,
                            analysis.interest_level,
                            analysis.outcome,
                        )
                        .await
                    {
                        warn!("failed to attach analysis for call {}: {}", snapshot.id, e);
                    }
                }
                Err(e) => debug!("post-call analysis failed for {}: {}", snapshot.id, e),
            }
        });
    }

    /// Wait for the call to leave its live states.
    ///
    /// Bounded by `max_wait`: when the watchdog fires the call is finalized
    /// as `failed` so a wedged provider cannot stall a campaign.
    pub async fn await_terminal(
        &self,
        call_id: &str,
        max_wait: Duration,
    ) -> OrchestratorResult<CallStatus> {
        let live = self
            .registry
            .get(call_id)
            .await
            .ok_or_else(|| OrchestratorError::CallNotFound(call_id.to_string()))?;
        let mut rx = live.subscribe();

        let waited = tokio::time::timeout(max_wait, async {
            loop {
                let status = *rx.borrow_and_update();
                if status.is_terminal() {
                    return status;
                }
                if rx.changed().await.is_err() {
                    return *rx.borrow();
                }
            }
        })
        .await;

        match waited {
            Ok(status) => Ok(status),
            Err(_) => {
                warn!("call {} exceeded max duration, forcing failed", call_id);
                self.finalize(call_id, DisconnectReason::Timeout).await?;
                Ok(CallStatus::Failed)
            }
        }
    }

    /// Drop a resolved call from the live registry; its record now lives in
    /// durable storage only.
    pub async fn release(&self, call_id: &str) {
        self.registry.remove(call_id).await;
    }
}
