//! Data models for dialflow.

mod call;
mod campaign;
mod lead;

pub use call::{
    CallOutcome, CallRecord, CallStatus, DisconnectReason, InterestLevel, Speaker, TranscriptEntry,
};
pub use campaign::{Campaign, CampaignCheckpoint, CampaignStatus};
pub use lead::{Lead, Script};
