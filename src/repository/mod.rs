//! Contracts for the persistence collaborator.
//!
//! The core reads lead contact fields and script content by id, and writes
//! durable call records and campaign checkpoints. The traits here are that
//! contract; the in-memory implementation backs tests and single-node runs.

mod memory;

pub use memory::MemoryRepository;

use async_trait::async_trait;

use crate::error::OrchestratorResult;
use crate::models::{
    CallOutcome, CallRecord, Campaign, CampaignCheckpoint, CampaignStatus, InterestLevel, Lead,
    Script,
};

/// Read access to leads and scripts.
#[async_trait]
pub trait LeadRepository: Send + Sync {
    async fn get_lead(&self, id: &str) -> OrchestratorResult<Option<Lead>>;
    async fn get_script(&self, id: &str) -> OrchestratorResult<Option<Script>>;
}

/// Durable storage for resolved calls.
#[async_trait]
pub trait CallRepository: Send + Sync {
    /// Persist a terminal call record. Saving the same call id again
    /// overwrites, so replays stay idempotent.
    async fn save_call(&self, call: &CallRecord) -> OrchestratorResult<()>;

    async fn get_call(&self, id: &str) -> OrchestratorResult<Option<CallRecord>>;

    /// Most recently updated calls, newest first.
    async fn list_recent(&self, limit: usize) -> OrchestratorResult<Vec<CallRecord>>;

    /// Attach post-call analysis fields to an already-persisted call.
    async fn attach_analysis(
        &self,
        call_id: &str,
        summary: &str,
        interest_level: InterestLevel,
        outcome: CallOutcome,
    ) -> OrchestratorResult<()>;

    /// Whether the durable store is reachable.
    async fn ping(&self) -> bool;
}

/// Durable storage for campaigns and their checkpoints.
#[async_trait]
pub trait CampaignRepository: Send + Sync {
    /// Persist a full campaign record (creation and recovery).
    async fn save_campaign(&self, campaign: &Campaign) -> OrchestratorResult<()>;

    async fn get_campaign(&self, id: &str) -> OrchestratorResult<Option<Campaign>>;

    async fn list_campaigns(&self) -> OrchestratorResult<Vec<Campaign>>;

    /// Atomically persist cursor and counters as one checkpoint, leaving
    /// every other field (status included) untouched.
    async fn checkpoint(
        &self,
        id: &str,
        checkpoint: CampaignCheckpoint,
    ) -> OrchestratorResult<()>;

    /// Update only the campaign status, stamping `completed_at` when the
    /// new status is terminal.
    async fn update_status(&self, id: &str, status: CampaignStatus) -> OrchestratorResult<()>;
}
