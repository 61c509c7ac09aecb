//! The decision of whether and how long to wait before a retry.

use crate::backoff::IntervalFunction;
use std::sync::Arc;
use std::time::Duration;

/// A predicate deciding whether a given error is worth retrying.
pub type RetryPredicate<E> = Arc<dyn Fn(&E) -> bool + Send + Sync>;

/// Combines a backoff strategy with an optional retryability predicate.
///
/// Without a predicate every error is considered retryable; callers that
/// need to distinguish transient from permanent failures (see the error
/// taxonomy in `tra_core`) install one via [`crate::RetryConfigBuilder::retry_on`].
pub struct RetryPolicy<E> {
    interval_fn: Arc<dyn IntervalFunction>,
    pub(crate) retry_predicate: Option<RetryPredicate<E>>,
}

impl<E> RetryPolicy<E> {
    pub fn new(interval_fn: Arc<dyn IntervalFunction>) -> Self {
        Self {
            interval_fn,
            retry_predicate: None,
        }
    }

    pub fn should_retry(&self, error: &E) -> bool {
        match &self.retry_predicate {
            Some(predicate) => predicate(error),
            None => true,
        }
    }

    pub fn next_backoff(&self, attempt: usize) -> Duration {
        self.interval_fn.interval(attempt)
    }
}
