//! Campaign scheduling: sequential dialing with pause/resume/cancel.

mod scheduler;

pub use scheduler::{CampaignScheduler, CreateCampaign, SchedulerConfig};
