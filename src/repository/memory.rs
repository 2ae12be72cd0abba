//! In-memory repository for tests and single-node runs.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{CallRepository, CampaignRepository, LeadRepository};
use crate::error::{OrchestratorError, OrchestratorResult};
use crate::models::{
    CallOutcome, CallRecord, Campaign, CampaignCheckpoint, CampaignStatus, InterestLevel, Lead,
    Script,
};

/// Hash-map-backed implementation of all repository contracts.
#[derive(Default)]
pub struct MemoryRepository {
    leads: RwLock<HashMap<String, Lead>>,
    scripts: RwLock<HashMap<String, Script>>,
    calls: RwLock<HashMap<String, CallRecord>>,
    campaigns: RwLock<HashMap<String, Campaign>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a lead. Used by tests and dev setups.
    pub async fn insert_lead(&self, lead: Lead) {
        self.leads.write().await.insert(lead.id.clone(), lead);
    }

    /// Seed a script. Used by tests and dev setups.
    pub async fn insert_script(&self, script: Script) {
        self.scripts
            .write()
            .await
            .insert(script.id.clone(), script);
    }
}

#[async_trait]
impl LeadRepository for MemoryRepository {
    async fn get_lead(&self, id: &str) -> OrchestratorResult<Option<Lead>> {
        Ok(self.leads.read().await.get(id).cloned())
    }

    async fn get_script(&self, id: &str) -> OrchestratorResult<Option<Script>> {
        Ok(self.scripts.read().await.get(id).cloned())
    }
}

#[async_trait]
impl CallRepository for MemoryRepository {
    async fn save_call(&self, call: &CallRecord) -> OrchestratorResult<()> {
        self.calls
            .write()
            .await
            .insert(call.id.clone(), call.clone());
        Ok(())
    }

    async fn get_call(&self, id: &str) -> OrchestratorResult<Option<CallRecord>> {
        Ok(self.calls.read().await.get(id).cloned())
    }

    async fn list_recent(&self, limit: usize) -> OrchestratorResult<Vec<CallRecord>> {
        let calls = self.calls.read().await;
        let mut recent: Vec<CallRecord> = calls.values().cloned().collect();
        recent.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        recent.truncate(limit);
        Ok(recent)
    }

    async fn attach_analysis(
        &self,
        call_id: &str,
        summary: &str,
        interest_level: InterestLevel,
        outcome: CallOutcome,
    ) -> OrchestratorResult<()> {
        let mut calls = self.calls.write().await;
        let call = calls
            .get_mut(call_id)
            .ok_or_else(|| OrchestratorError::CallNotFound(call_id.to_string()))?;
        call.ai_summary = Some(summary.to_string());
        call.interest_level = Some(interest_level);
        call.outcome = Some(outcome);
        call.updated_at = Utc::now();
        Ok(())
    }

    async fn ping(&self) -> bool {
        true
    }
}

#[async_trait]
impl CampaignRepository for MemoryRepository {
    async fn save_campaign(&self, campaign: &Campaign) -> OrchestratorResult<()> {
        self.campaigns
            .write()
            .await
            .insert(campaign.id.clone(), campaign.clone());
        Ok(())
    }

    async fn get_campaign(&self, id: &str) -> OrchestratorResult<Option<Campaign>> {
        Ok(self.campaigns.read().await.get(id).cloned())
    }

    async fn list_campaigns(&self) -> OrchestratorResult<Vec<Campaign>> {
        let campaigns = self.campaigns.read().await;
        let mut all: Vec<Campaign> = campaigns.values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(all)
    }

    async fn checkpoint(
        &self,
        id: &str,
        checkpoint: CampaignCheckpoint,
    ) -> OrchestratorResult<()> {
        let mut campaigns = self.campaigns.write().await;
        let campaign = campaigns
            .get_mut(id)
            .ok_or_else(|| OrchestratorError::CampaignNotFound(id.to_string()))?;
        if !campaign.apply_checkpoint(checkpoint) {
            return Err(OrchestratorError::Repository(format!(
                "checkpoint for campaign {} rejected (cursor {} -> {})",
                id, campaign.current_lead_index, checkpoint.current_lead_index
            )));
        }
        Ok(())
    }

    async fn update_status(&self, id: &str, status: CampaignStatus) -> OrchestratorResult<()> {
        let mut campaigns = self.campaigns.write().await;
        let campaign = campaigns
            .get_mut(id)
            .ok_or_else(|| OrchestratorError::CampaignNotFound(id.to_string()))?;
        campaign.status = status;
        if status.is_terminal() {
            campaign.completed_at = Some(Utc::now());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CallStatus, DisconnectReason};

    #[tokio::test]
    async fn test_lead_and_script_seed() {
        let repo = MemoryRepository::new();
        repo.insert_lead(Lead::new("l1", Some("+15550102030"))).await;
        repo.insert_script(Script::new("s1", "intro", "Hi, this is...")).await;

        assert!(repo.get_lead("l1").await.unwrap().is_some());
        assert!(repo.get_lead("l2").await.unwrap().is_none());
        assert!(repo.get_script("s1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_save_and_fetch_call() {
        let repo = MemoryRepository::new();
        let mut call = CallRecord::new("l1", "s1");
        call.transition_to(CallStatus::InProgress);
        call.transition_to(CallStatus::Completed);
        call.disconnect_reason = Some(DisconnectReason::Hangup);

        repo.save_call(&call).await.unwrap();
        let fetched = repo.get_call(&call.id).await.unwrap().unwrap();
        assert_eq!(fetched.status, CallStatus::Completed);
    }

    #[tokio::test]
    async fn test_attach_analysis() {
        let repo = MemoryRepository::new();
        let call = CallRecord::new("l1", "s1");
        repo.save_call(&call).await.unwrap();

        repo.attach_analysis(
            &call.id,
            "Lead asked for pricing details.",
            InterestLevel::Warm,
            CallOutcome::CallbackRequested,
        )
        .await
        .unwrap();

        let fetched = repo.get_call(&call.id).await.unwrap().unwrap();
        assert_eq!(fetched.interest_level, Some(InterestLevel::Warm));
        assert_eq!(fetched.outcome, Some(CallOutcome::CallbackRequested));
    }

    #[tokio::test]
    async fn test_attach_analysis_unknown_call() {
        let repo = MemoryRepository::new();
        let result = repo
            .attach_analysis("missing", "x", InterestLevel::Cold, CallOutcome::NoContact)
            .await;
        assert!(matches!(result, Err(OrchestratorError::CallNotFound(_))));
    }

    #[tokio::test]
    async fn test_checkpoint_updates_only_progress() {
        let repo = MemoryRepository::new();
        let campaign = Campaign::new("u1", "c", "s1", vec!["a".into(), "b".into()], 0);
        let id = campaign.id.clone();
        repo.save_campaign(&campaign).await.unwrap();

        // A status change between checkpoints must survive the checkpoint.
        repo.update_status(&id, CampaignStatus::Paused).await.unwrap();
        repo.checkpoint(&id, campaign.checkpoint().advanced(true))
            .await
            .unwrap();

        let fetched = repo.get_campaign(&id).await.unwrap().unwrap();
        assert_eq!(fetched.status, CampaignStatus::Paused);
        assert_eq!(fetched.current_lead_index, 1);
        assert_eq!(fetched.successful_calls, 1);
    }

    #[tokio::test]
    async fn test_checkpoint_rejects_backwards_cursor() {
        let repo = MemoryRepository::new();
        let campaign = Campaign::new("u1", "c", "s1", vec!["a".into(), "b".into()], 0);
        let id = campaign.id.clone();
        repo.save_campaign(&campaign).await.unwrap();

        let forward = campaign.checkpoint().advanced(true).advanced(false);
        repo.checkpoint(&id, forward).await.unwrap();

        let backwards = campaign.checkpoint().advanced(true);
        assert!(repo.checkpoint(&id, backwards).await.is_err());
    }

    #[tokio::test]
    async fn test_terminal_status_stamps_completed_at() {
        let repo = MemoryRepository::new();
        let campaign = Campaign::new("u1", "c", "s1", vec!["a".into()], 0);
        let id = campaign.id.clone();
        repo.save_campaign(&campaign).await.unwrap();

        repo.update_status(&id, CampaignStatus::Cancelled).await.unwrap();
        let fetched = repo.get_campaign(&id).await.unwrap().unwrap();
        assert!(fetched.completed_at.is_some());
    }
}
