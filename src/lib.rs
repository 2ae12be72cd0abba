//! dialflow - outbound AI-voice call campaign orchestration.
//!
//! The orchestration core of an outbound-sales automation product: a
//! per-call state machine, a sequential campaign scheduler with
//! pause/resume/cancel and crash-safe checkpoints, a distributed state
//! layer with an in-process fallback, and per-user admission control,
//! fronted by a polling dashboard API and provider webhooks.

pub mod calls;
pub mod campaigns;
pub mod cli;
pub mod config;
pub mod error;
pub mod health;
pub mod llm;
pub mod models;
pub mod rate_limit;
pub mod repository;
pub mod server;
pub mod state;
pub mod telephony;
