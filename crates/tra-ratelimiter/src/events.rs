//! Events emitted by the token bucket rate limiter.

use std::time::{Duration, Instant};
use tra_telemetry::ResilienceEvent;

/// An event emitted by a [`crate::RateLimiter`] as it admits or rejects callers.
#[derive(Debug, Clone)]
pub enum RateLimiterEvent {
    /// A token was handed out, possibly after waiting for a refill.
    TokenAcquired {
        pattern_name: String,
        timestamp: Instant,
        wait_duration: Duration,
        remaining_tokens: usize,
    },
    /// The caller gave up after `max_retries` polls with no token available.
    TokenExhausted {
        pattern_name: String,
        timestamp: Instant,
        retries: usize,
    },
    /// The bucket was refilled.
    BucketRefilled {
        pattern_name: String,
        timestamp: Instant,
        available_tokens: usize,
    },
}

impl ResilienceEvent for RateLimiterEvent {
    fn event_type(&self) -> &'static str {
        match self {
            RateLimiterEvent::TokenAcquired { .. } => "token_acquired",
            RateLimiterEvent::TokenExhausted { .. } => "token_exhausted",
            RateLimiterEvent::BucketRefilled { .. } => "bucket_refilled",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            RateLimiterEvent::TokenAcquired { timestamp, .. }
            | RateLimiterEvent::TokenExhausted { timestamp, .. }
            | RateLimiterEvent::BucketRefilled { timestamp, .. } => *timestamp,
        }
    }

    fn pattern_name(&self) -> &str {
        match self {
            RateLimiterEvent::TokenAcquired { pattern_name, .. }
            | RateLimiterEvent::TokenExhausted { pattern_name, .. }
            | RateLimiterEvent::BucketRefilled { pattern_name, .. } => pattern_name,
        }
    }
}
