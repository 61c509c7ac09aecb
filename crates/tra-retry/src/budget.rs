//! Retry budgets: a circuit breaker for retries themselves.
//!
//! Without a budget, a degraded dependency plus an aggressive retry policy
//! can multiply load on that dependency several-fold right when it can least
//! afford it. A budget caps how many retries may be spent regardless of how
//! many concurrent requests are failing.

use std::sync::Mutex;
use std::time::Instant;

pub trait RetryBudget: Send + Sync {
    /// Attempts to spend one retry. Returns `false` if the budget is exhausted.
    fn try_withdraw(&self) -> bool;
    /// Credits the budget after a successful call.
    fn deposit(&self);
}

/// Entry point for building a [`RetryBudget`].
pub struct RetryBudgetBuilder;

impl Default for RetryBudgetBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RetryBudgetBuilder {
    pub fn new() -> Self {
        Self
    }

    /// A token-bucket budget: retries drain tokens, successes have no effect
    /// on availability beyond the steady refill rate.
    pub fn token_bucket(self) -> TokenBucketBudgetBuilder {
        TokenBucketBudgetBuilder::default()
    }

    /// An additive-increase/multiplicative-decrease budget: the retry
    /// allowance scales with the volume of recent successes.
    pub fn aimd(self) -> AimdBudgetBuilder {
        AimdBudgetBuilder::default()
    }
}

pub struct TokenBucketBudgetBuilder {
    tokens_per_second: f64,
    max_tokens: usize,
}

impl Default for TokenBucketBudgetBuilder {
    fn default() -> Self {
        Self {
            tokens_per_second: 10.0,
            max_tokens: 100,
        }
    }
}

impl TokenBucketBudgetBuilder {
    pub fn tokens_per_second(mut self, rate: f64) -> Self {
        self.tokens_per_second = rate;
        self
    }

    pub fn max_tokens(mut self, max: usize) -> Self {
        self.max_tokens = max;
        self
    }

    pub fn build(self) -> std::sync::Arc<dyn RetryBudget> {
        std::sync::Arc::new(TokenBucketBudget::new(self.max_tokens, self.tokens_per_second))
    }
}

struct TokenBucketState {
    tokens: f64,
    last_refill: Instant,
}

/// A token bucket dedicated to retries, independent of the per-credential
/// rate limiter in `tra_ratelimiter`.
pub struct TokenBucketBudget {
    state: Mutex<TokenBucketState>,
    max_tokens: f64,
    rate: f64,
}

impl TokenBucketBudget {
    pub fn new(max_tokens: usize, rate_per_sec: f64) -> Self {
        Self {
            state: Mutex::new(TokenBucketState {
                tokens: max_tokens as f64,
                last_refill: Instant::now(),
            }),
            max_tokens: max_tokens as f64,
            rate: rate_per_sec,
        }
    }

    fn refill(&self, state: &mut TokenBucketState) {
        let now = Instant::now();
        let elapsed = now.saturating_duration_since(state.last_refill).as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.rate).min(self.max_tokens);
        state.last_refill = now;
    }
}

impl RetryBudget for TokenBucketBudget {
    fn try_withdraw(&self) -> bool {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        self.refill(&mut state);
        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    fn deposit(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        self.refill(&mut state);
        state.tokens = (state.tokens + 1.0).min(self.max_tokens);
    }
}

pub struct AimdBudgetBuilder {
    min_retries_per_second: f64,
    ratio: f64,
}

impl Default for AimdBudgetBuilder {
    fn default() -> Self {
        Self {
            min_retries_per_second: 1.0,
            ratio: 0.2,
        }
    }
}

impl AimdBudgetBuilder {
    /// Baseline retry allowance regardless of traffic volume.
    pub fn min_retries_per_second(mut self, rate: f64) -> Self {
        self.min_retries_per_second = rate;
        self
    }

    /// Retries allowed per successful call (e.g. 0.2 = one retry per five successes).
    pub fn ratio(mut self, ratio: f64) -> Self {
        self.ratio = ratio;
        self
    }

    pub fn build(self) -> std::sync::Arc<dyn RetryBudget> {
        std::sync::Arc::new(AimdBudget::new(self.min_retries_per_second, self.ratio))
    }
}

struct AimdState {
    successes: f64,
    retries: f64,
    window_start: Instant,
}

/// Tracks a rolling allowance of `min_retries_per_second + successes * ratio`.
pub struct AimdBudget {
    state: Mutex<AimdState>,
    min_per_sec: f64,
    ratio: f64,
}

impl AimdBudget {
    pub fn new(min_retries_per_second: f64, ratio: f64) -> Self {
        Self {
            state: Mutex::new(AimdState {
                successes: 0.0,
                retries: 0.0,
                window_start: Instant::now(),
            }),
            min_per_sec: min_retries_per_second,
            ratio,
        }
    }
}

impl RetryBudget for AimdBudget {
    fn try_withdraw(&self) -> bool {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let elapsed = state.window_start.elapsed().as_secs_f64().max(1.0);
        let allowance = self.min_per_sec * elapsed + state.successes * self.ratio;
        if state.retries < allowance {
            state.retries += 1.0;
            true
        } else {
            false
        }
    }

    fn deposit(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.successes += 1.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_bucket_exhausts_then_recovers() {
        let budget = TokenBucketBudget::new(2, 1000.0);
        assert!(budget.try_withdraw());
        assert!(budget.try_withdraw());
        assert!(!budget.try_withdraw());
        std::thread::sleep(std::time::Duration::from_millis(10));
        assert!(budget.try_withdraw());
    }

    #[test]
    fn token_bucket_deposit_restores_capacity() {
        let budget = TokenBucketBudget::new(1, 0.0);
        assert!(budget.try_withdraw());
        assert!(!budget.try_withdraw());
        budget.deposit();
        assert!(budget.try_withdraw());
    }

    #[test]
    fn aimd_allows_baseline_before_any_success() {
        let budget = AimdBudget::new(5.0, 0.2);
        for _ in 0..5 {
            assert!(budget.try_withdraw());
        }
    }

    #[test]
    fn aimd_scales_with_successes() {
        let budget = AimdBudget::new(0.0, 1.0);
        assert!(!budget.try_withdraw());
        budget.deposit();
        assert!(budget.try_withdraw());
    }
}
