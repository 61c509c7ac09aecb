use std::time::Duration;
use thiserror::Error;

/// Errors returned by the [`crate::CircuitBreaker`].
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CircuitBreakerError<E> {
    /// The circuit is open; calls are not permitted.
    #[error("circuit is open, retry after {retry_after:?}")]
    Open { retry_after: Duration },

    /// An error returned by the inner call.
    #[error("inner service error: {0}")]
    Inner(E),
}

impl<E> CircuitBreakerError<E> {
    /// Returns true if the error indicates the circuit is open.
    pub fn is_open(&self) -> bool {
        matches!(self, CircuitBreakerError::Open { .. })
    }

    /// Returns the inner error if present.
    pub fn into_inner(self) -> Option<E> {
        match self {
            CircuitBreakerError::Inner(e) => Some(e),
            _ => None,
        }
    }
}
