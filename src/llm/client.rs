//! LLM client for post-call transcript analysis.
//!
//! Supports Ollama API for local LLM inference. Analysis runs after a call
//! reaches a terminal state and attaches a summary, an interest level and a
//! business outcome to the durable record.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::models::{CallOutcome, CallRecord, InterestLevel, TranscriptEntry};

/// Default prompt for post-call analysis.
pub const DEFAULT_ANALYSIS_PROMPT: &str = r#"You are reviewing the transcript of an outbound sales call placed by an AI agent.

Transcript:
{transcript}

Respond with ONLY a JSON object, no prose, with exactly these fields:
- "summary": 2-3 sentences covering what was discussed and how the lead responded
- "interest_level": one of "hot", "warm", "cold", "none"
- "outcome": one of "meeting_booked", "callback_requested", "not_interested", "no_contact"

Base the interest level on the lead's actual words, not the agent's pitch."#;

/// Configuration for the LLM client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Whether post-call analysis is enabled
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Ollama API endpoint (default: http://localhost:11434)
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Model to use for analysis
    #[serde(default = "default_model")]
    pub model: String,
    /// Maximum tokens in response
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Temperature for generation (0.0 - 1.0)
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Custom analysis prompt (uses {transcript} placeholder)
    #[serde(default)]
    pub analysis_prompt: Option<String>,
    /// Maximum characters of transcript to send to the model
    #[serde(default = "default_max_transcript_chars")]
    pub max_transcript_chars: usize,
    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_enabled() -> bool {
    true
}
fn default_endpoint() -> String {
    "http://localhost:11434".to_string()
}
fn default_model() -> String {
    "llama3.2:instruct".to_string()
}
fn default_max_tokens() -> u32 {
    512
}
fn default_temperature() -> f32 {
    0.2
}
fn default_max_transcript_chars() -> usize {
    12000
}
fn default_timeout_secs() -> u64 {
    120
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            endpoint: default_endpoint(),
            model: default_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            analysis_prompt: None,
            max_transcript_chars: default_max_transcript_chars(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl LlmConfig {
    /// Get the analysis prompt, using custom or default.
    pub fn get_analysis_prompt(&self) -> &str {
        self.analysis_prompt
            .as_deref()
            .unwrap_or(DEFAULT_ANALYSIS_PROMPT)
    }
}

/// Result of analyzing a call transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallAnalysis {
    pub summary: String,
    pub interest_level: InterestLevel,
    pub outcome: CallOutcome,
}

/// Errors that can occur during analysis.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("connection error: {0}")]
    Connection(String),
    #[error("API error: {0}")]
    Api(String),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("analysis is disabled")]
    Disabled,
}

/// LLM client for transcript analysis.
pub struct LlmClient {
    config: LlmConfig,
    client: Client,
}

/// Ollama API request format.
#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    prompt: String,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

/// Ollama API response format.
#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
}

#[derive(Debug, Deserialize)]
struct RawAnalysis {
    summary: String,
    interest_level: String,
    outcome: String,
}

impl LlmClient {
    /// Create a new LLM client with the given configuration.
    pub fn new(config: LlmConfig) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self { config, client }
    }

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    /// Check if the LLM service is available.
    pub async fn is_available(&self) -> bool {
        if !self.config.enabled {
            return false;
        }
        let url = format!("{}/api/tags", self.config.endpoint);
        match self.client.get(&url).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }

    /// Analyze a finished call's transcript.
    pub async fn analyze_call(&self, call: &CallRecord) -> Result<CallAnalysis, AnalysisError> {
        if !self.config.enabled {
            return Err(AnalysisError::Disabled);
        }

        let rendered = render_transcript(&call.transcript);
        let truncated = self.truncate_transcript(&rendered);
        let prompt = self
            .config
            .get_analysis_prompt()
            .replace("{transcript}", truncated);

        debug!("Analyzing transcript for call {}", call.id);
        let response = self.call_ollama(&prompt).await?;
        self.parse_analysis(&response)
    }

    /// Truncate a transcript to the configured maximum (UTF-8 safe).
    fn truncate_transcript<'a>(&self, text: &'a str) -> &'a str {
        if text.len() <= self.config.max_transcript_chars {
            return text;
        }
        let mut end = self.config.max_transcript_chars;
        while end > 0 && !text.is_char_boundary(end) {
            end -= 1;
        }
        &text[..end]
    }

    /// Call Ollama API with a prompt.
    async fn call_ollama(&self, prompt: &str) -> Result<String, AnalysisError> {
        let request = OllamaRequest {
            model: self.config.model.clone(),
            prompt: prompt.to_string(),
            stream: false,
            options: OllamaOptions {
                temperature: self.config.temperature,
                num_predict: self.config.max_tokens,
            },
        };

        let url = format!("{}/api/generate", self.config.endpoint);
        let resp = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| AnalysisError::Connection(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(AnalysisError::Api(format!("HTTP {}: {}", status, body)));
        }

        let ollama_resp: OllamaResponse = resp
            .json()
            .await
            .map_err(|e| AnalysisError::Parse(e.to_string()))?;

        Ok(ollama_resp.response)
    }

    /// Parse the model's JSON reply, tolerating code fences and stray prose.
    fn parse_analysis(&self, response: &str) -> Result<CallAnalysis, AnalysisError> {
        let json = extract_json_object(response)
            .ok_or_else(|| AnalysisError::Parse("no JSON object in response".to_string()))?;

        let raw: RawAnalysis =
            serde_json::from_str(json).map_err(|e| AnalysisError::Parse(e.to_string()))?;

        let summary = raw.summary.trim().to_string();
        if summary.is_empty() {
            return Err(AnalysisError::Parse("empty summary".to_string()));
        }

        let interest_level = InterestLevel::from_str(raw.interest_level.trim())
            .ok_or_else(|| {
                AnalysisError::Parse(format!("unknown interest level: {}", raw.interest_level))
            })?;
        let outcome = CallOutcome::from_str(raw.outcome.trim()).ok_or_else(|| {
            AnalysisError::Parse(format!("unknown outcome: {}", raw.outcome))
        })?;

        Ok(CallAnalysis {
            summary,
            interest_level,
            outcome,
        })
    }
}

/// Render transcript entries as "speaker: text" lines.
fn render_transcript(entries: &[TranscriptEntry]) -> String {
    entries
        .iter()
        .map(|entry| format!("{}: {}", entry.speaker.as_str(), entry.text))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Slice out the first balanced top-level JSON object in a string.
fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, c) in text[start..].char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + c.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}
