//! Admission control for per-user operation quotas.
//!
//! Fixed one-minute-window counters keyed by (user, limiter class), stored
//! in the distributed state layer so limits hold across instances when the
//! remote store is reachable. Two classes: lenient for cheap reads, strict
//! for expensive operations like call placement.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::{OrchestratorError, OrchestratorResult};
use crate::state::{StateStore, KEY_PREFIX};

/// Length of the fixed counting window.
pub const WINDOW: Duration = Duration::from_secs(60);

/// Limiter class, selecting the ceiling applied to an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimiterClass {
    /// Cheap operations: status reads, listings.
    Lenient,
    /// Expensive operations: call placement, enrichment.
    Strict,
}

impl LimiterClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lenient => "lenient",
            Self::Strict => "strict",
        }
    }
}

/// Rate limit configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitSettings {
    /// Master switch; disabled outside production.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Ceiling for lenient operations per user per minute.
    #[serde(default = "default_lenient_per_minute")]
    pub lenient_per_minute: u64,
    /// Ceiling for strict operations per user per minute.
    #[serde(default = "default_strict_per_minute")]
    pub strict_per_minute: u64,
}

fn default_enabled() -> bool {
    true
}
fn default_lenient_per_minute() -> u64 {
    120
}
fn default_strict_per_minute() -> u64 {
    10
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            lenient_per_minute: default_lenient_per_minute(),
            strict_per_minute: default_strict_per_minute(),
        }
    }
}

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Granted,
    /// Over quota; retry once the current window ends.
    Denied { retry_after: Duration },
}

/// Per-user fixed-window rate limiter over the distributed state layer.
pub struct RateLimiter {
    store: Arc<dyn StateStore>,
    settings: RateLimitSettings,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn StateStore>, settings: RateLimitSettings) -> Self {
        Self { store, settings }
    }

    fn ceiling(&self, class: LimiterClass) -> u64 {
        match class {
            LimiterClass::Lenient => self.settings.lenient_per_minute,
            LimiterClass::Strict => self.settings.strict_per_minute,
        }
    }

    /// Atomically count this attempt and decide admission.
    ///
    /// The attempt is counted whether or not it is admitted; denials carry
    /// the time remaining in the current window.
    pub async fn check_and_increment(
        &self,
        user_id: &str,
        class: LimiterClass,
    ) -> OrchestratorResult<Admission> {
        if !self.settings.enabled {
            return Ok(Admission::Granted);
        }

        let now = Utc::now().timestamp();
        let window_secs = WINDOW.as_secs() as i64;
        let window_start = now - now.rem_euclid(window_secs);
        let key = format!(
            "{}rl:{}:{}:{}",
            KEY_PREFIX,
            user_id,
            class.as_str(),
            window_start
        );

        let count = self.store.incr_ex(&key, WINDOW).await?;
        if count <= self.ceiling(class) {
            Ok(Admission::Granted)
        } else {
            let remaining = (window_start + window_secs - now).clamp(1, window_secs);
            Ok(Admission::Denied {
                retry_after: Duration::from_secs(remaining as u64),
            })
        }
    }

    /// Admission check that maps a denial to `AdmissionDenied`.
    pub async fn admit(&self, user_id: &str, class: LimiterClass) -> OrchestratorResult<()> {
        match self.check_and_increment(user_id, class).await? {
            Admission::Granted => Ok(()),
            Admission::Denied { retry_after } => {
                Err(OrchestratorError::AdmissionDenied { retry_after })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::LocalStateStore;

    fn limiter(strict: u64) -> RateLimiter {
        RateLimiter::new(
            Arc::new(LocalStateStore::new()),
            RateLimitSettings {
                enabled: true,
                lenient_per_minute: 120,
                strict_per_minute: strict,
            },
        )
    }

    #[tokio::test]
    async fn test_under_ceiling_is_admitted() {
        let limiter = limiter(10);
        for _ in 0..10 {
            let admission = limiter
                .check_and_increment("user-1", LimiterClass::Strict)
                .await
                .unwrap();
            assert_eq!(admission, Admission::Granted);
        }
    }

    #[tokio::test]
    async fn test_eleventh_call_is_denied() {
        let limiter = limiter(10);
        for _ in 0..10 {
            limiter
                .check_and_increment("user-1", LimiterClass::Strict)
                .await
                .unwrap();
        }
        match limiter
            .check_and_increment("user-1", LimiterClass::Strict)
            .await
            .unwrap()
        {
            Admission::Denied { retry_after } => {
                assert!(retry_after <= WINDOW);
                assert!(retry_after >= Duration::from_secs(1));
            }
            Admission::Granted => panic!("11th attempt within the window must be denied"),
        }
    }

    #[tokio::test]
    async fn test_users_are_independent() {
        let limiter = limiter(1);
        limiter
            .check_and_increment("user-1", LimiterClass::Strict)
            .await
            .unwrap();
        let other = limiter
            .check_and_increment("user-2", LimiterClass::Strict)
            .await
            .unwrap();
        assert_eq!(other, Admission::Granted);
    }

    #[tokio::test]
    async fn test_classes_are_independent() {
        let limiter = limiter(1);
        limiter
            .check_and_increment("user-1", LimiterClass::Strict)
            .await
            .unwrap();
        let lenient = limiter
            .check_and_increment("user-1", LimiterClass::Lenient)
            .await
            .unwrap();
        assert_eq!(lenient, Admission::Granted);
    }

    #[tokio::test]
    async fn test_disabled_admits_everything() {
        let limiter = RateLimiter::new(
            Arc::new(LocalStateStore::new()),
            RateLimitSettings {
                enabled: false,
                lenient_per_minute: 1,
                strict_per_minute: 1,
            },
        );
        for _ in 0..50 {
            let admission = limiter
                .check_and_increment("user-1", LimiterClass::Strict)
                .await
                .unwrap();
            assert_eq!(admission, Admission::Granted);
        }
    }

    #[tokio::test]
    async fn test_admit_maps_denial_to_error() {
        let limiter = limiter(1);
        limiter.admit("user-1", LimiterClass::Strict).await.unwrap();
        match limiter.admit("user-1", LimiterClass::Strict).await {
            Err(OrchestratorError::AdmissionDenied { retry_after }) => {
                assert!(retry_after <= WINDOW);
            }
            other => panic!("expected AdmissionDenied, got {:?}", other.map(|_| ())),
        }
    }
}
