use std::fmt;

/// Errors that can occur when acquiring a token from the bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimiterError {
    /// `acquire` polled `maxRetries` times without the bucket refilling a token.
    RateLimited { retries: usize },
    /// The caller was cancelled before a token was taken; no token was consumed.
    Cancelled,
}

impl fmt::Display for RateLimiterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RateLimiterError::RateLimited { retries } => {
                write!(f, "rate limited after {retries} retries")
            }
            RateLimiterError::Cancelled => write!(f, "rate limit acquisition cancelled"),
        }
    }
}

impl std::error::Error for RateLimiterError {}
