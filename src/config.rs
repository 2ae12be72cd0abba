//! Configuration management for dialflow.
//!
//! Settings load from an optional TOML file and are then overridden by
//! `DIALFLOW_*` environment variables, so deployments can keep secrets out
//! of the file.

use std::fs;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::calls::CallEngineConfig;
use crate::campaigns::SchedulerConfig;
use crate::llm::LlmConfig;
use crate::rate_limit::RateLimitSettings;
use crate::telephony::TelephonyConfig;

/// Config file looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "dialflow.toml";

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Externally reachable base URL, handed to the telephony provider as
    /// the webhook callback base.
    #[serde(default = "default_public_url")]
    pub public_url: String,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    8088
}
fn default_public_url() -> String {
    "http://localhost:8088".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            public_url: default_public_url(),
        }
    }
}

/// Distributed state layer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateConfig {
    /// Redis URL. Unset means local-only state, acceptable for single-node
    /// deployments.
    #[serde(default)]
    pub redis_url: Option<String>,
    /// TTL on voice assignments. Must cover the longest allowed call.
    #[serde(default = "default_voice_ttl_secs")]
    pub voice_ttl_secs: u64,
}

fn default_voice_ttl_secs() -> u64 {
    7200
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            redis_url: None,
            voice_ttl_secs: default_voice_ttl_secs(),
        }
    }
}

/// Campaign processing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignConfig {
    /// Hard ceiling on a single call's duration in seconds.
    #[serde(default = "default_max_call_secs")]
    pub max_call_secs: u64,
    /// How often a quota-denied dial waits out the window before failing.
    #[serde(default = "default_admission_retries")]
    pub admission_retries: u32,
}

fn default_max_call_secs() -> u64 {
    3600
}
fn default_admission_retries() -> u32 {
    3
}

impl Default for CampaignConfig {
    fn default() -> Self {
        Self {
            max_call_secs: default_max_call_secs(),
            admission_retries: default_admission_retries(),
        }
    }
}

/// Root settings tree.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub state: StateConfig,
    #[serde(default)]
    pub telephony: TelephonyConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub limits: RateLimitSettings,
    #[serde(default)]
    pub campaigns: CampaignConfig,
}

impl Settings {
    /// Load settings from a file (or the default location), then apply
    /// environment overrides and validate.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut settings = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default = Path::new(DEFAULT_CONFIG_FILE);
                if default.exists() {
                    Self::from_file(default)?
                } else {
                    Self::default()
                }
            }
        };
        settings.apply_env();
        settings.validate()?;
        Ok(settings)
    }

    fn from_file(path: &Path) -> anyhow::Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        toml::from_str(&raw)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }

    /// Environment variables win over file values.
    fn apply_env(&mut self) {
        if let Ok(value) = std::env::var("DIALFLOW_REDIS_URL") {
            if !value.is_empty() {
                self.state.redis_url = Some(value);
            }
        }
        if let Ok(value) = std::env::var("DIALFLOW_PUBLIC_URL") {
            if !value.is_empty() {
                self.server.public_url = value;
            }
        }
        if let Ok(value) = std::env::var("DIALFLOW_TELEPHONY_URL") {
            if !value.is_empty() {
                self.telephony.base_url = value;
            }
        }
        if let Ok(value) = std::env::var("DIALFLOW_TELEPHONY_API_KEY") {
            if !value.is_empty() {
                self.telephony.api_key = Some(value);
            }
        }
        if let Ok(value) = std::env::var("DIALFLOW_LLM_ENDPOINT") {
            if !value.is_empty() {
                self.llm.endpoint = value;
            }
        }
        if let Ok(value) = std::env::var("DIALFLOW_DISABLE_RATE_LIMITS") {
            if value == "1" || value.eq_ignore_ascii_case("true") {
                self.limits.enabled = false;
            }
        }
    }

    fn validate(&self) -> anyhow::Result<()> {
        Url::parse(&self.server.public_url).context("server.public_url is not a valid URL")?;
        Url::parse(&self.telephony.base_url).context("telephony.base_url is not a valid URL")?;
        anyhow::ensure!(
            self.state.voice_ttl_secs >= self.campaigns.max_call_secs,
            "state.voice_ttl_secs ({}) must cover campaigns.max_call_secs ({})",
            self.state.voice_ttl_secs,
            self.campaigns.max_call_secs
        );
        Ok(())
    }

    pub fn call_engine_config(&self) -> CallEngineConfig {
        CallEngineConfig {
            public_url: self.server.public_url.clone(),
            max_call: std::time::Duration::from_secs(self.campaigns.max_call_secs),
            voice_ttl: std::time::Duration::from_secs(self.state.voice_ttl_secs),
            place_retries: self.telephony.place_retries,
            retry_backoff: std::time::Duration::from_millis(self.telephony.retry_backoff_ms),
        }
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            max_call: std::time::Duration::from_secs(self.campaigns.max_call_secs),
            admission_retries: self.campaigns.admission_retries,
        }
    }
}
