//! A `KeySlot` bundles one credential with its own [`AuthService`],
//! [`RateLimiter`], and health counters.

use crate::auth::AuthService;
use crate::config::Credential;
use crate::error::TraError;
use serde::Serialize;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};
use tra_ratelimiter::{RateLimiter, RateLimiterConfig};

const FAILURE_THRESHOLD: u32 = 3;
const FAILURE_COOLDOWN_MS: i64 = 30_000;
#[allow(dead_code)]
const RECOVERY_TIME_MS: i64 = 60_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotState {
    Active,
    Disabled,
    Cooldown,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SlotMetrics {
    pub consecutive_failures: u32,
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub last_used_epoch_ms: Option<i64>,
    pub last_error_message: Option<String>,
    pub disabled_until_epoch_ms: Option<i64>,
}

struct Health {
    state: SlotState,
    metrics: SlotMetrics,
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

/// Overridable token-bucket knobs (spec §9 Open Question 2: "operators
/// should be able to override both" max burst and steady-state refill).
/// Defaults match the upstream contract assumed by §4.1.
#[derive(Debug, Clone, Copy)]
pub struct RateLimiterParams {
    pub max_tokens: usize,
    pub refill_rate_per_sec: f64,
}

impl Default for RateLimiterParams {
    fn default() -> Self {
        Self {
            max_tokens: 50,
            refill_rate_per_sec: 5.0,
        }
    }
}

/// One credential plus its isolated auth/rate-limit/health state.
pub struct KeySlot {
    pub id: String,
    pub label: Option<String>,
    pub auth: AuthService,
    pub rate_limiter: RateLimiter,
    health: Mutex<Health>,
}

impl KeySlot {
    pub fn new(credential: Credential, http_client: reqwest::Client, rate_limiter_params: RateLimiterParams) -> Self {
        let auth = AuthService::new(http_client, credential.clone());
        let rate_limiter = RateLimiterConfig::builder()
            .max_tokens(rate_limiter_params.max_tokens)
            .refill_rate_per_sec(rate_limiter_params.refill_rate_per_sec)
            .retry_after(std::time::Duration::from_millis(100))
            .max_retries(50)
            .name(format!("tdx-slot-{}", credential.id))
            .build();

        Self {
            id: credential.id,
            label: credential.label,
            auth,
            rate_limiter,
            health: Mutex::new(Health {
                state: SlotState::Active,
                metrics: SlotMetrics::default(),
            }),
        }
    }

    /// Tokens currently available in this slot's rate limiter.
    pub fn available_tokens(&self) -> usize {
        self.rate_limiter.available_tokens()
    }

    /// Lazily transitions `DISABLED -> COOLDOWN` once the disable window has
    /// elapsed, then reports whether the slot may currently be selected.
    pub fn is_available(&self) -> bool {
        let mut health = self.health.lock().unwrap_or_else(|e| e.into_inner());
        self.maybe_recover(&mut health);
        !matches!(health.state, SlotState::Disabled)
    }

    pub fn state(&self) -> SlotState {
        let mut health = self.health.lock().unwrap_or_else(|e| e.into_inner());
        self.maybe_recover(&mut health);
        health.state
    }

    fn maybe_recover(&self, health: &mut Health) {
        if health.state == SlotState::Disabled {
            if let Some(until) = health.metrics.disabled_until_epoch_ms {
                if now_ms() >= until {
                    health.state = SlotState::Cooldown;
                }
            }
        }
    }

    pub fn metrics(&self) -> SlotMetrics {
        let mut health = self.health.lock().unwrap_or_else(|e| e.into_inner());
        self.maybe_recover(&mut health);
        health.metrics.clone()
    }

    pub fn record_success(&self) {
        let mut health = self.health.lock().unwrap_or_else(|e| e.into_inner());
        self.maybe_recover(&mut health);
        health.metrics.consecutive_failures = 0;
        health.metrics.total_requests += 1;
        health.metrics.successful_requests += 1;
        health.metrics.last_used_epoch_ms = Some(now_ms());
        if health.state == SlotState::Cooldown {
            health.state = SlotState::Active;
            health.metrics.disabled_until_epoch_ms = None;
        }
    }

    pub fn record_failure(&self, err: &TraError) {
        let mut health = self.health.lock().unwrap_or_else(|e| e.into_inner());
        self.maybe_recover(&mut health);
        health.metrics.consecutive_failures += 1;
        health.metrics.total_requests += 1;
        health.metrics.failed_requests += 1;
        health.metrics.last_used_epoch_ms = Some(now_ms());
        health.metrics.last_error_message = Some(err.to_string());

        if health.state == SlotState::Cooldown {
            // Any failure while recovering resets the disable window.
            health.state = SlotState::Disabled;
            health.metrics.disabled_until_epoch_ms = Some(now_ms() + FAILURE_COOLDOWN_MS);
        } else if health.metrics.consecutive_failures >= FAILURE_THRESHOLD {
            health.state = SlotState::Disabled;
            health.metrics.disabled_until_epoch_ms = Some(now_ms() + FAILURE_COOLDOWN_MS);
        }
    }

    #[cfg(test)]
    pub(crate) fn force_disabled_until(&self, until_epoch_ms: i64) {
        let mut health = self.health.lock().unwrap_or_else(|e| e.into_inner());
        health.state = SlotState::Disabled;
        health.metrics.disabled_until_epoch_ms = Some(until_epoch_ms);
    }
}
