use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Token bucket counters.
///
/// `tokens` is tracked as a float so fractional refill progress is never lost
/// between polls; callers only ever observe whole tokens.
struct BucketState {
    tokens: f64,
    last_refill_at: Instant,
}

/// A single credential's token bucket.
///
/// Shared across every clone of the owning [`crate::RateLimiter`] via an
/// internal mutex; refill is computed lazily on each access rather than by a
/// background task.
#[derive(Debug)]
pub(crate) struct SharedRateLimiter {
    state: Mutex<BucketState>,
    max_tokens: usize,
    refill_rate_per_sec: f64,
}

impl std::fmt::Debug for BucketState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BucketState")
            .field("tokens", &self.tokens)
            .finish()
    }
}

impl SharedRateLimiter {
    pub(crate) fn new(max_tokens: usize, refill_rate_per_sec: f64) -> Self {
        Self {
            state: Mutex::new(BucketState {
                tokens: max_tokens as f64,
                last_refill_at: Instant::now(),
            }),
            max_tokens,
            refill_rate_per_sec,
        }
    }

    fn refill_locked(&self, state: &mut BucketState, now: Instant) {
        if state.tokens >= self.max_tokens as f64 {
            state.last_refill_at = now;
            return;
        }
        let elapsed = now.saturating_duration_since(state.last_refill_at);
        let earned = elapsed.as_secs_f64() * self.refill_rate_per_sec;
        if earned <= 0.0 {
            return;
        }
        let new_tokens = (state.tokens + earned).min(self.max_tokens as f64);
        let credited = new_tokens - state.tokens;
        // Advance the clock only by the duration that earned the credited
        // tokens, so leftover fractional progress survives into the next poll.
        if self.refill_rate_per_sec > 0.0 {
            let consumed_secs = credited / self.refill_rate_per_sec;
            state.last_refill_at += Duration::from_secs_f64(consumed_secs);
        } else {
            state.last_refill_at = now;
        }
        state.tokens = new_tokens;
    }

    /// Attempts to take a single token without waiting.
    pub(crate) fn try_acquire(&self) -> bool {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();
        self.refill_locked(&mut state, now);
        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Whole tokens available right now, after applying any refill owed.
    pub(crate) fn available_tokens(&self) -> usize {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();
        self.refill_locked(&mut state, now);
        state.tokens as usize
    }

    /// Restores the bucket to full capacity, discarding refill history.
    pub(crate) fn reset(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.tokens = self.max_tokens as f64;
        state.last_refill_at = Instant::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_full() {
        let bucket = SharedRateLimiter::new(5, 1.0);
        assert_eq!(bucket.available_tokens(), 5);
    }

    #[test]
    fn drains_to_zero() {
        let bucket = SharedRateLimiter::new(3, 0.0);
        assert!(bucket.try_acquire());
        assert!(bucket.try_acquire());
        assert!(bucket.try_acquire());
        assert!(!bucket.try_acquire());
    }

    #[test]
    fn refills_over_time() {
        let bucket = SharedRateLimiter::new(2, 1000.0);
        assert!(bucket.try_acquire());
        assert!(bucket.try_acquire());
        assert!(!bucket.try_acquire());
        std::thread::sleep(Duration::from_millis(20));
        assert!(bucket.try_acquire());
    }

    #[test]
    fn never_exceeds_capacity() {
        let bucket = SharedRateLimiter::new(2, 1000.0);
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(bucket.available_tokens(), 2);
    }

    #[test]
    fn reset_restores_capacity() {
        let bucket = SharedRateLimiter::new(2, 0.0);
        bucket.try_acquire();
        bucket.try_acquire();
        bucket.reset();
        assert_eq!(bucket.available_tokens(), 2);
    }

    #[test]
    fn fractional_progress_is_not_lost() {
        // At 5 tokens/sec a single 100ms poll earns half a token; three
        // consecutive polls should still add up to roughly one whole token,
        // not zero due to truncation each time.
        let bucket = SharedRateLimiter::new(1, 5.0);
        assert!(bucket.try_acquire());
        assert_eq!(bucket.available_tokens(), 0);
        std::thread::sleep(Duration::from_millis(70));
        std::thread::sleep(Duration::from_millis(70));
        std::thread::sleep(Duration::from_millis(70));
        assert_eq!(bucket.available_tokens(), 1);
    }
}
