//! The flat error taxonomy shared by every component of the access layer.
//!
//! Every fallible operation in this crate returns [`TraError`]. Each variant
//! carries a stable `code()` so CLI collaborators can render structured JSON
//! (`{success: false, error: {code, message, ...}}`) without matching on the
//! enum shape itself.

use std::time::Duration;
use thiserror::Error;

/// Unified error type for the TRA resilient access layer.
#[derive(Debug, Error, Clone)]
pub enum TraError {
    /// Argument validation, malformed date, unknown region.
    #[error("bad input: {message}")]
    BadInput { message: String },

    /// Returned by [`crate::station_resolver::StationResolver`] with suggestions.
    #[error("station not found: {message}")]
    StationNotFound {
        message: String,
        suggestion: Option<String>,
        candidates: Vec<String>,
    },

    /// Upstream returned an empty list where a unique record was expected.
    #[error("not found: {message}")]
    NotFound { message: String },

    /// Token request failed, or a data endpoint returned 401/403.
    #[error("auth error: {message}")]
    AuthError { message: String },

    /// `RateLimiter::acquire` exhausted its retry budget.
    #[error("rate limited after {retries} retries")]
    RateLimited { retries: usize },

    /// All KeySlots in the pool are `DISABLED`.
    #[error("no available key slots")]
    NoAvailableSlots,

    /// The circuit breaker short-circuited the call.
    #[error("circuit breaker open, retry after {retry_after:?}")]
    CircuitBreakerOpen { retry_after: Duration },

    /// Network error, or 5xx after exhausting retries.
    #[error("api error: {message}")]
    ApiError {
        message: String,
        status: Option<u16>,
    },

    /// Cooperative cancellation.
    #[error("cancelled")]
    Cancelled,
}

impl TraError {
    /// The stable discriminant used in structured JSON error output.
    pub fn code(&self) -> &'static str {
        match self {
            TraError::BadInput { .. } => "BAD_INPUT",
            TraError::StationNotFound { .. } => "STATION_NOT_FOUND",
            TraError::NotFound { .. } => "NOT_FOUND",
            TraError::AuthError { .. } => "AUTH_ERROR",
            TraError::RateLimited { .. } => "RATE_LIMITED",
            TraError::NoAvailableSlots => "NO_AVAILABLE_SLOTS",
            TraError::CircuitBreakerOpen { .. } => "CIRCUIT_BREAKER_OPEN",
            TraError::ApiError { .. } => "API_ERROR",
            TraError::Cancelled => "CANCELLED",
        }
    }

    /// `true` for the fixed set of transient conditions the retry runner
    /// should keep trying: listed 5xx/408/429 statuses and network-level
    /// timeouts/connection refusals. Permanent failures (4xx other than
    /// 408/429, decode errors, bad input) return `false`.
    pub fn is_transient(&self) -> bool {
        match self {
            TraError::ApiError {
                status: Some(status),
                ..
            } => matches!(status, 408 | 429 | 500 | 502 | 503 | 504),
            TraError::ApiError { status: None, message } => {
                let m = message.to_ascii_lowercase();
                m.contains("econnrefused") || m.contains("etimedout") || m.contains("timeout")
            }
            _ => false,
        }
    }

    pub fn bad_input(message: impl Into<String>) -> Self {
        TraError::BadInput {
            message: message.into(),
        }
    }

    pub fn api_error(message: impl Into<String>, status: Option<u16>) -> Self {
        TraError::ApiError {
            message: message.into(),
            status,
        }
    }
}
