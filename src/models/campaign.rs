//! Campaign models for batched outbound dialing.
//!
//! A campaign is an ordered batch of calls against a fixed lead list,
//! processed strictly sequentially. The (cursor, counters) pair is the
//! checkpoint persisted after every resolved call, which is what makes a
//! restart resume without re-dialing processed leads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a campaign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    Draft,
    Running,
    Paused,
    Completed,
    Cancelled,
}

impl CampaignStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(Self::Draft),
            "running" => Some(Self::Running),
            "paused" => Some(Self::Paused),
            "completed" => Some(Self::Completed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Whether a transition to `next` is valid.
    ///
    /// `paused` is the only reversible state; `completed` is reached solely
    /// by cursor exhaustion and `cancelled` by an explicit cancel.
    pub fn can_transition_to(&self, next: CampaignStatus) -> bool {
        match (self, next) {
            (Self::Draft, Self::Running) => true,
            (Self::Running, Self::Paused) => true,
            (Self::Running, Self::Completed) => true,
            (Self::Running, Self::Cancelled) => true,
            (Self::Paused, Self::Running) => true,
            (Self::Paused, Self::Cancelled) => true,
            _ => false,
        }
    }
}

/// The atomically-persisted progress of a campaign: cursor plus counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignCheckpoint {
    pub current_lead_index: usize,
    pub completed_calls: u64,
    pub successful_calls: u64,
    pub failed_calls: u64,
}

impl CampaignCheckpoint {
    /// The checkpoint after one more call resolves.
    pub fn advanced(&self, success: bool) -> Self {
        Self {
            current_lead_index: self.current_lead_index + 1,
            completed_calls: self.completed_calls + 1,
            successful_calls: self.successful_calls + u64::from(success),
            failed_calls: self.failed_calls + u64::from(!success),
        }
    }
}

/// An ordered batch of calls against a lead list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Campaign {
    pub id: String,
    /// User owning this campaign; admission control is keyed by owner.
    pub owner_id: String,
    pub name: String,
    /// Script driving every call in the batch.
    pub script_id: String,
    /// Fixed, ordered lead list. Immutable after creation.
    pub lead_ids: Vec<String>,
    pub status: CampaignStatus,
    /// Index of the next lead to dial. Only ever increases.
    pub current_lead_index: usize,
    pub completed_calls: u64,
    pub successful_calls: u64,
    pub failed_calls: u64,
    /// Pause between consecutive calls.
    pub delay_between_calls_secs: u64,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Campaign {
    /// Create a campaign in the `running` state, cursor at zero.
    pub fn new(
        owner_id: &str,
        name: &str,
        script_id: &str,
        lead_ids: Vec<String>,
        delay_between_calls_secs: u64,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            owner_id: owner_id.to_string(),
            name: name.to_string(),
            script_id: script_id.to_string(),
            lead_ids,
            status: CampaignStatus::Running,
            current_lead_index: 0,
            completed_calls: 0,
            successful_calls: 0,
            failed_calls: 0,
            delay_between_calls_secs,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    pub fn total_leads(&self) -> usize {
        self.lead_ids.len()
    }

    /// Whether the cursor has passed the last lead.
    pub fn is_exhausted(&self) -> bool {
        self.current_lead_index >= self.lead_ids.len()
    }

    /// The lead id at the cursor, if any remain.
    pub fn current_lead(&self) -> Option<&str> {
        self.lead_ids.get(self.current_lead_index).map(|s| s.as_str())
    }

    /// Current progress as a checkpoint value.
    pub fn checkpoint(&self) -> CampaignCheckpoint {
        CampaignCheckpoint {
            current_lead_index: self.current_lead_index,
            completed_calls: self.completed_calls,
            successful_calls: self.successful_calls,
            failed_calls: self.failed_calls,
        }
    }

    /// Apply a checkpoint, preserving the cursor-only-increases invariant.
    ///
    /// Returns false (without applying) if the checkpoint would move the
    /// cursor backwards or break counter accounting.
    pub fn apply_checkpoint(&mut self, checkpoint: CampaignCheckpoint) -> bool {
        if checkpoint.current_lead_index < self.current_lead_index
            || checkpoint.current_lead_index > self.lead_ids.len()
            || checkpoint.completed_calls != checkpoint.successful_calls + checkpoint.failed_calls
        {
            return false;
        }
        self.current_lead_index = checkpoint.current_lead_index;
        self.completed_calls = checkpoint.completed_calls;
        self.successful_calls = checkpoint.successful_calls;
        self.failed_calls = checkpoint.failed_calls;
        true
    }
}
