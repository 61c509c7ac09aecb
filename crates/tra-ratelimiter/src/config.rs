use crate::events::RateLimiterEvent;
use std::time::Duration;
use tra_telemetry::{EventListeners, FnListener};

/// Configuration for a single credential's token bucket.
///
/// Defaults encode the upstream TDX contract: 5 requests/second per credential
/// with a small burst allowance.
pub struct RateLimiterConfig {
    pub(crate) max_tokens: usize,
    pub(crate) refill_rate_per_sec: f64,
    pub(crate) retry_after: Duration,
    pub(crate) max_retries: usize,
    pub(crate) event_listeners: EventListeners<RateLimiterEvent>,
    pub(crate) name: String,
}

/// Builder for [`RateLimiterConfig`].
pub struct RateLimiterConfigBuilder {
    max_tokens: usize,
    refill_rate_per_sec: f64,
    retry_after: Duration,
    max_retries: usize,
    event_listeners: EventListeners<RateLimiterEvent>,
    name: String,
}

impl Default for RateLimiterConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimiterConfigBuilder {
    /// Creates a new builder with defaults.
    ///
    /// Defaults:
    /// - `max_tokens`: 50
    /// - `refill_rate_per_sec`: 5
    /// - `retry_after`: 100ms
    /// - `max_retries`: 50
    pub fn new() -> Self {
        Self {
            max_tokens: 50,
            refill_rate_per_sec: 5.0,
            retry_after: Duration::from_millis(100),
            max_retries: 50,
            event_listeners: EventListeners::new(),
            name: "<unnamed>".to_string(),
        }
    }

    /// Sets the bucket capacity, i.e. the maximum burst size.
    pub fn max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Sets the steady-state refill rate, in tokens per second.
    pub fn refill_rate_per_sec(mut self, rate: f64) -> Self {
        self.refill_rate_per_sec = rate;
        self
    }

    /// Sets the polling interval used by `acquire` while waiting for a token.
    pub fn retry_after(mut self, duration: Duration) -> Self {
        self.retry_after = duration;
        self
    }

    /// Sets how many times `acquire` polls before giving up with `RATE_LIMITED`.
    pub fn max_retries(mut self, retries: usize) -> Self {
        self.max_retries = retries;
        self
    }

    /// Sets the name for this limiter instance (used in events and metrics labels).
    pub fn name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    /// Registers a callback invoked whenever a token is handed out.
    pub fn on_token_acquired<F>(mut self, f: F) -> Self
    where
        F: Fn(Duration) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let RateLimiterEvent::TokenAcquired { wait_duration, .. } = event {
                f(*wait_duration);
            }
        }));
        self
    }

    /// Registers a callback invoked when `acquire` exhausts its retries.
    pub fn on_token_exhausted<F>(mut self, f: F) -> Self
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let RateLimiterEvent::TokenExhausted { retries, .. } = event {
                f(*retries);
            }
        }));
        self
    }

    /// Builds the configured [`crate::RateLimiter`].
    pub fn build(self) -> crate::RateLimiter {
        crate::RateLimiter::new(RateLimiterConfig {
            max_tokens: self.max_tokens,
            refill_rate_per_sec: self.refill_rate_per_sec,
            retry_after: self.retry_after,
            max_retries: self.max_retries,
            event_listeners: self.event_listeners,
            name: self.name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let limiter = RateLimiterConfigBuilder::new().build();
        assert_eq!(limiter.available_tokens(), 50);
    }

    #[test]
    fn test_builder_custom_values() {
        let limiter = RateLimiterConfigBuilder::new()
            .max_tokens(10)
            .refill_rate_per_sec(2.0)
            .name("slot-1")
            .build();
        assert_eq!(limiter.available_tokens(), 10);
    }
}
