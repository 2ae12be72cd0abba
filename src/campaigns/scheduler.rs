//! The campaign scheduler.
//!
//! One asynchronous loop per running campaign dials its lead list strictly
//! sequentially: claim the lead at the cursor, start a call, await its
//! terminal state, checkpoint counters and cursor atomically, sleep the
//! configured delay, re-check status. Because the checkpoint lands before
//! the sleep, a crash resumes from the last resolved call without
//! re-dialing processed leads or losing counts.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::calls::{CallEngine, CallHandle};
use crate::error::{OrchestratorError, OrchestratorResult};
use crate::models::{CallStatus, Campaign, CampaignStatus, Lead, Script};
use crate::repository::{CampaignRepository, LeadRepository};

/// Tunables for campaign processing.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Upper bound on how long one call may stay unresolved.
    pub max_call: Duration,
    /// How many times a quota-denied dial waits out the window before the
    /// lead is counted as failed.
    pub admission_retries: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_call: Duration::from_secs(3600),
            admission_retries: 3,
        }
    }
}

/// Request to create a campaign.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateCampaign {
    #[serde(default = "default_owner")]
    pub owner_id: String,
    pub name: String,
    pub script_id: String,
    pub lead_ids: Vec<String>,
    #[serde(default = "default_delay_secs")]
    pub delay_between_calls_secs: u64,
}

fn default_owner() -> String {
    "dashboard".to_string()
}
fn default_delay_secs() -> u64 {
    30
}

/// Sequences the calls of every active campaign.
///
/// Exactly one call is in flight per campaign; campaigns run concurrently
/// on independent tasks and never block each other.
pub struct CampaignScheduler {
    campaigns: Arc<dyn CampaignRepository>,
    leads: Arc<dyn LeadRepository>,
    engine: Arc<CallEngine>,
    config: SchedulerConfig,
    /// Campaign ids with an attached loop, to prevent double-spawning.
    active: RwLock<HashSet<String>>,
}

impl CampaignScheduler {
    pub fn new(
        campaigns: Arc<dyn CampaignRepository>,
        leads: Arc<dyn LeadRepository>,
        engine: Arc<CallEngine>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            campaigns,
            leads,
            engine,
            config,
            active: RwLock::new(HashSet::new()),
        }
    }

    /// Create a campaign and begin processing it asynchronously.
    ///
    /// Returns as soon as the campaign is persisted; dialing happens on a
    /// spawned loop.
    pub async fn create(self: &Arc<Self>, request: CreateCampaign) -> OrchestratorResult<Campaign> {
        if request.lead_ids.is_empty() {
            return Err(OrchestratorError::InvalidLead(
                "campaign has no leads".to_string(),
            ));
        }

        let campaign = Campaign::new(
            &request.owner_id,
            &request.name,
            &request.script_id,
            request.lead_ids,
            request.delay_between_calls_secs,
        );
        self.campaigns.save_campaign(&campaign).await?;
        info!(
            "campaign {} created with {} leads",
            campaign.id,
            campaign.total_leads()
        );

        self.spawn_loop(campaign.id.clone()).await;
        Ok(campaign)
    }

    /// Pause a running campaign.
    ///
    /// An in-flight call is allowed to reach its terminal state; only
    /// cursor advancement is withheld.
    pub async fn pause(&self, id: &str) -> OrchestratorResult<Campaign> {
        self.transition(id, CampaignStatus::Paused).await
    }

    /// Resume a paused campaign from its persisted cursor.
    pub async fn resume(self: &Arc<Self>, id: &str) -> OrchestratorResult<Campaign> {
        let campaign = self.transition(id, CampaignStatus::Running).await?;
        self.spawn_loop(campaign.id.clone()).await;
        Ok(campaign)
    }

    /// Cancel a campaign. Stops future dials; an in-flight call finishes
    /// naturally.
    pub async fn cancel(&self, id: &str) -> OrchestratorResult<Campaign> {
        self.transition(id, CampaignStatus::Cancelled).await
    }

    /// Re-attach loops to campaigns left `running` by a previous process.
    ///
    /// Called once at startup. Returns how many campaigns were resumed.
    pub async fn recover(self: &Arc<Self>) -> OrchestratorResult<usize> {
        let campaigns = self.campaigns.list_campaigns().await?;
        let mut resumed = 0;
        for campaign in campaigns {
            if campaign.status == CampaignStatus::Running {
                info!(
                    "resuming interrupted campaign {} at lead index {}",
                    campaign.id, campaign.current_lead_index
                );
                self.spawn_loop(campaign.id).await;
                resumed += 1;
            }
        }
        Ok(resumed)
    }

    /// Validate and apply a status transition, returning the updated record.
    async fn transition(&self, id: &str, next: CampaignStatus) -> OrchestratorResult<Campaign> {
        let campaign = self
            .campaigns
            .get_campaign(id)
            .await?
            .ok_or_else(|| OrchestratorError::CampaignNotFound(id.to_string()))?;

        if !campaign.status.can_transition_to(next) {
            return Err(OrchestratorError::InvalidTransition(format!(
                "campaign {} cannot move from {} to {}",
                id,
                campaign.status.as_str(),
                next.as_str()
            )));
        }

        self.campaigns.update_status(id, next).await?;
        self.campaigns
            .get_campaign(id)
            .await?
            .ok_or_else(|| OrchestratorError::CampaignNotFound(id.to_string()))
    }

    /// Spawn the processing loop for a campaign unless one is attached.
    async fn spawn_loop(self: &Arc<Self>, id: String) {
        {
            let mut active = self.active.write().await;
            if !active.insert(id.clone()) {
                return;
            }
        }

        let scheduler = self.clone();
        tokio::spawn(async move {
            loop {
                scheduler.run_loop(&id).await;
                scheduler.active.write().await.remove(&id);

                // A resume may race the detach: it sees this loop still
                // attached and spawns nothing, while this loop has already
                // decided to exit. Re-check after dropping the claim.
                match scheduler.campaigns.get_campaign(&id).await {
                    Ok(Some(campaign)) if campaign.status == CampaignStatus::Running => {
                        let mut active = scheduler.active.write().await;
                        if !active.insert(id.clone()) {
                            return; // another loop claimed it first
                        }
                    }
                    _ => return,
                }
            }
        });
    }

    /// The per-campaign main loop. Re-entrant: all progress lives in the
    /// persisted checkpoint, never in task-local state.
    async fn run_loop(&self, id: &str) {
        debug!("campaign {} loop attached", id);
        loop {
            let campaign = match self.campaigns.get_campaign(id).await {
                Ok(Some(campaign)) => campaign,
                Ok(None) => {
                    warn!("campaign {} disappeared, stopping loop", id);
                    return;
                }
                Err(e) => {
                    error!("failed to read campaign {}: {}", id, e);
                    return;
                }
            };

            if campaign.status != CampaignStatus::Running {
                debug!(
                    "campaign {} loop detaching in state {}",
                    id,
                    campaign.status.as_str()
                );
                return;
            }

            let Some(lead_id) = campaign.current_lead().map(|s| s.to_string()) else {
                if let Err(e) = self
                    .campaigns
                    .update_status(id, CampaignStatus::Completed)
                    .await
                {
                    error!("failed to complete campaign {}: {}", id, e);
                }
                info!(
                    "campaign {} completed: {} calls, {} successful, {} failed",
                    id,
                    campaign.completed_calls,
                    campaign.successful_calls,
                    campaign.failed_calls
                );
                return;
            };

            let success = self.dial(&campaign, &lead_id).await;

            // Counters and cursor land as one checkpoint before the sleep,
            // which is what makes a crash here resumable.
            let next = campaign.checkpoint().advanced(success);
            if let Err(e) = self.campaigns.checkpoint(id, next).await {
                error!("failed to checkpoint campaign {}: {}", id, e);
                return;
            }

            tokio::time::sleep(Duration::from_secs(campaign.delay_between_calls_secs)).await;
            // Status is re-read at the top, which is where a pause or
            // cancel issued during the call or the sleep takes effect.
        }
    }

    /// Dial one lead and resolve it to success or failure.
    ///
    /// Every per-call error is absorbed here and converted into a failed
    /// outcome so one bad lead never stalls the campaign.
    async fn dial(&self, campaign: &Campaign, lead_id: &str) -> bool {
        let lead = match self.leads.get_lead(lead_id).await {
            Ok(Some(lead)) => lead,
            Ok(None) => {
                warn!("lead {} not found, counting call as failed", lead_id);
                return false;
            }
            Err(e) => {
                warn!("failed to load lead {}: {}", lead_id, e);
                return false;
            }
        };

        let script = match self.leads.get_script(&campaign.script_id).await {
            Ok(Some(script)) => script,
            _ => {
                warn!(
                    "script {} not found, counting call as failed",
                    campaign.script_id
                );
                return false;
            }
        };

        let handle = match self.start_with_admission(campaign, &lead, &script).await {
            Ok(handle) => handle,
            Err(e) => {
                warn!("call to lead {} not placed: {}", lead_id, e);
                return false;
            }
        };

        let status = match self
            .engine
            .await_terminal(&handle.call_id, self.config.max_call)
            .await
        {
            Ok(status) => status,
            Err(e) => {
                warn!("lost track of call {}: {}", handle.call_id, e);
                CallStatus::Failed
            }
        };

        // The call is durable now; drop it from the live registry.
        self.engine.release(&handle.call_id).await;

        status == CallStatus::Completed
    }

    /// Start a call, waiting out the rate-limit window when denied.
    ///
    /// A denial is backpressure rather than a call failure; the lead is
    /// only counted as failed once the retry budget is exhausted.
    async fn start_with_admission(
        &self,
        campaign: &Campaign,
        lead: &Lead,
        script: &Script,
    ) -> OrchestratorResult<CallHandle> {
        let mut attempt = 0u32;
        loop {
            match self.engine.start(&campaign.owner_id, lead, script).await {
                Err(OrchestratorError::AdmissionDenied { retry_after })
                    if attempt < self.config.admission_retries =>
                {
                    attempt += 1;
                    debug!(
                        "campaign {} over quota, waiting {:?} (attempt {})",
                        campaign.id, retry_after, attempt
                    );
                    tokio::time::sleep(retry_after).await;
                }
                other => return other,
            }
        }
    }
}
