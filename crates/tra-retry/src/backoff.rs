//! Backoff interval strategies used between retry attempts.

use rand::Rng;
use std::time::Duration;

/// Computes the delay to wait before a given retry attempt.
///
/// `attempt` is 0-indexed: the delay before the first retry is
/// `interval(0)`, before the second retry `interval(1)`, and so on.
pub trait IntervalFunction: Send + Sync {
    fn interval(&self, attempt: usize) -> Duration;
}

/// Always waits the same duration between attempts.
pub struct FixedInterval {
    duration: Duration,
}

impl FixedInterval {
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }
}

impl IntervalFunction for FixedInterval {
    fn interval(&self, _attempt: usize) -> Duration {
        self.duration
    }
}

/// Exponential backoff: `initial * multiplier^attempt`, capped at `max_delay`,
/// with optional additive jitter in `[0, jitter_fraction * delay)`.
///
/// Defaults: multiplier 2.0, max_delay 30s, jitter_fraction 0.1 (matches the
/// upstream retry contract's 10% jitter allowance).
pub struct ExponentialBackoff {
    initial: Duration,
    multiplier: f64,
    max_delay: Duration,
    jitter_fraction: f64,
}

impl ExponentialBackoff {
    pub fn new(initial: Duration) -> Self {
        Self {
            initial,
            multiplier: 2.0,
            max_delay: Duration::from_secs(30),
            jitter_fraction: 0.1,
        }
    }

    pub fn multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    pub fn max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Sets the additive jitter fraction. `0.0` disables jitter entirely.
    pub fn jitter(mut self, fraction: f64) -> Self {
        self.jitter_fraction = fraction;
        self
    }

    pub fn no_jitter(mut self) -> Self {
        self.jitter_fraction = 0.0;
        self
    }
}

impl IntervalFunction for ExponentialBackoff {
    fn interval(&self, attempt: usize) -> Duration {
        let base = self.initial.as_secs_f64() * self.multiplier.powi(attempt as i32);
        let capped = base.min(self.max_delay.as_secs_f64());
        let delay = if self.jitter_fraction > 0.0 {
            let jitter = capped * self.jitter_fraction * rand::rng().random::<f64>();
            capped + jitter
        } else {
            capped
        };
        Duration::from_secs_f64(delay.max(0.0))
    }
}

/// Exponential backoff with full randomization: `base * (1 ± randomization_factor)`.
///
/// Unlike [`ExponentialBackoff`]'s additive jitter, this can both shrink and
/// grow the nominal delay, spreading retries more widely to avoid thundering
/// herds of synchronized clients.
pub struct ExponentialRandomBackoff {
    initial: Duration,
    multiplier: f64,
    max_delay: Duration,
    randomization_factor: f64,
}

impl ExponentialRandomBackoff {
    pub fn new(initial: Duration) -> Self {
        Self {
            initial,
            multiplier: 2.0,
            max_delay: Duration::from_secs(30),
            randomization_factor: 0.5,
        }
    }

    pub fn multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    pub fn max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    pub fn randomization_factor(mut self, factor: f64) -> Self {
        self.randomization_factor = factor;
        self
    }
}

impl IntervalFunction for ExponentialRandomBackoff {
    fn interval(&self, attempt: usize) -> Duration {
        let base = self.initial.as_secs_f64() * self.multiplier.powi(attempt as i32);
        let capped = base.min(self.max_delay.as_secs_f64());
        let spread = capped * self.randomization_factor;
        let offset = rand::rng().random_range(-spread..=spread);
        Duration::from_secs_f64((capped + offset).max(0.0))
    }
}

/// A custom backoff strategy defined by an arbitrary function.
pub struct FnInterval<F> {
    f: F,
}

impl<F> FnInterval<F>
where
    F: Fn(usize) -> Duration + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> IntervalFunction for FnInterval<F>
where
    F: Fn(usize) -> Duration + Send + Sync,
{
    fn interval(&self, attempt: usize) -> Duration {
        (self.f)(attempt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_interval_is_constant() {
        let interval = FixedInterval::new(Duration::from_millis(50));
        assert_eq!(interval.interval(0), Duration::from_millis(50));
        assert_eq!(interval.interval(5), Duration::from_millis(50));
    }

    #[test]
    fn exponential_backoff_grows_and_caps() {
        let backoff = ExponentialBackoff::new(Duration::from_millis(100))
            .multiplier(2.0)
            .max_delay(Duration::from_millis(500))
            .no_jitter();
        assert_eq!(backoff.interval(0), Duration::from_millis(100));
        assert_eq!(backoff.interval(1), Duration::from_millis(200));
        assert_eq!(backoff.interval(2), Duration::from_millis(400));
        assert_eq!(backoff.interval(3), Duration::from_millis(500));
    }

    #[test]
    fn exponential_backoff_jitter_only_adds() {
        let backoff = ExponentialBackoff::new(Duration::from_millis(100))
            .max_delay(Duration::from_millis(100))
            .jitter(0.1);
        for attempt in 0..10 {
            let delay = backoff.interval(attempt);
            assert!(delay >= Duration::from_millis(100));
            assert!(delay <= Duration::from_millis(110));
        }
    }

    #[test]
    fn fn_interval_delegates() {
        let interval = FnInterval::new(|attempt: usize| Duration::from_millis(attempt as u64 * 10));
        assert_eq!(interval.interval(3), Duration::from_millis(30));
    }
}
