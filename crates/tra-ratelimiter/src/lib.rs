//! Per-credential token bucket rate limiting.
//!
//! Each TDX credential is allotted its own bucket (`max_tokens` capacity,
//! refilling at `refill_rate_per_sec`). `acquire` polls the bucket every
//! `retry_after` until a token is available or `max_retries` polls have
//! passed, at which point it gives up with [`RateLimiterError::RateLimited`].
//!
//! # Examples
//!
//! ```
//! use tra_ratelimiter::RateLimiterConfig;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let limiter = RateLimiterConfig::builder()
//!     .max_tokens(50)
//!     .refill_rate_per_sec(5.0)
//!     .name("tdx-key-1")
//!     .build();
//!
//! limiter.acquire().await?;
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod events;
mod layer;
mod limiter;

pub use config::{RateLimiterConfig, RateLimiterConfigBuilder};
pub use error::RateLimiterError;
pub use events::RateLimiterEvent;
pub use layer::{RateLimiterLayer, RateLimiterService};

use crate::limiter::SharedRateLimiter;
use std::sync::Arc;
use std::time::Instant;

/// A standalone token bucket rate limiter.
///
/// Cheap to clone: the bucket itself lives behind an `Arc`, so every clone
/// shares the same counters.
#[derive(Clone)]
pub struct RateLimiter {
    config: Arc<RateLimiterConfig>,
    bucket: Arc<SharedRateLimiter>,
}

impl RateLimiter {
    pub(crate) fn new(config: RateLimiterConfig) -> Self {
        let bucket = Arc::new(SharedRateLimiter::new(
            config.max_tokens,
            config.refill_rate_per_sec,
        ));
        Self {
            config: Arc::new(config),
            bucket,
        }
    }

    /// Attempts to take a token without waiting.
    pub fn try_acquire(&self) -> bool {
        self.bucket.try_acquire()
    }

    /// Number of tokens currently available.
    pub fn available_tokens(&self) -> usize {
        self.bucket.available_tokens()
    }

    /// Restores the bucket to full capacity.
    pub fn reset(&self) {
        self.bucket.reset()
    }

    /// Waits for a token, polling every `retry_after` up to `max_retries`
    /// times, emitting [`RateLimiterEvent`]s along the way.
    pub async fn acquire(&self) -> Result<(), RateLimiterError> {
        let mut retries = 0usize;
        loop {
            if self.bucket.try_acquire() {
                let event = RateLimiterEvent::TokenAcquired {
                    pattern_name: self.config.name.clone(),
                    timestamp: Instant::now(),
                    wait_duration: self.config.retry_after * retries as u32,
                    remaining_tokens: self.bucket.available_tokens(),
                };
                self.config.event_listeners.emit(&event);
                return Ok(());
            }

            if retries >= self.config.max_retries {
                let event = RateLimiterEvent::TokenExhausted {
                    pattern_name: self.config.name.clone(),
                    timestamp: Instant::now(),
                    retries,
                };
                self.config.event_listeners.emit(&event);
                return Err(RateLimiterError::RateLimited { retries });
            }

            tokio::time::sleep(self.config.retry_after).await;
            retries += 1;
        }
    }

    /// Wraps this limiter in a Tower [`RateLimiterLayer`].
    pub fn layer(self) -> RateLimiterLayer {
        RateLimiterLayer::new(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn allows_bursts_up_to_capacity() {
        let limiter = RateLimiterConfig::builder()
            .max_tokens(5)
            .refill_rate_per_sec(0.0)
            .build();

        for _ in 0..5 {
            limiter.acquire().await.unwrap();
        }
        assert_eq!(limiter.available_tokens(), 0);
    }

    #[tokio::test]
    async fn exhausts_after_max_retries() {
        let limiter = RateLimiterConfig::builder()
            .max_tokens(1)
            .refill_rate_per_sec(0.0)
            .retry_after(Duration::from_millis(1))
            .max_retries(3)
            .build();

        limiter.acquire().await.unwrap();
        let result = limiter.acquire().await;
        assert_eq!(result, Err(RateLimiterError::RateLimited { retries: 3 }));
    }

    #[tokio::test]
    async fn refills_and_unblocks_a_waiting_caller() {
        let limiter = RateLimiterConfig::builder()
            .max_tokens(1)
            .refill_rate_per_sec(100.0)
            .retry_after(Duration::from_millis(5))
            .max_retries(50)
            .build();

        limiter.acquire().await.unwrap();
        // Should unblock well within max_retries once the bucket refills.
        limiter.acquire().await.unwrap();
    }

    #[tokio::test]
    async fn event_listeners_observe_acquire_and_exhaustion() {
        let acquired = Arc::new(AtomicUsize::new(0));
        let exhausted = Arc::new(AtomicUsize::new(0));
        let a = Arc::clone(&acquired);
        let e = Arc::clone(&exhausted);

        let limiter = RateLimiterConfig::builder()
            .max_tokens(1)
            .refill_rate_per_sec(0.0)
            .retry_after(Duration::from_millis(1))
            .max_retries(2)
            .on_token_acquired(move |_| {
                a.fetch_add(1, Ordering::SeqCst);
            })
            .on_token_exhausted(move |_| {
                e.fetch_add(1, Ordering::SeqCst);
            })
            .build();

        limiter.acquire().await.unwrap();
        assert_eq!(acquired.load(Ordering::SeqCst), 1);

        let _ = limiter.acquire().await;
        assert_eq!(exhausted.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn reset_restores_full_capacity() {
        let limiter = RateLimiterConfig::builder()
            .max_tokens(3)
            .refill_rate_per_sec(0.0)
            .build();

        limiter.try_acquire();
        limiter.try_acquire();
        limiter.reset();
        assert_eq!(limiter.available_tokens(), 3);
    }
}
