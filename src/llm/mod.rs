//! LLM-backed post-call analysis.

mod client;

pub use client::{AnalysisError, CallAnalysis, LlmClient, LlmConfig};
