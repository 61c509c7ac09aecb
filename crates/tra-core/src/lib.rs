//! Resilient access layer and domain engines for the Taiwan Railway (TDX)
//! API: OAuth2 token management, multi-key rate limiting, a global circuit
//! breaker with retry, a two-tier cache, and the station/journey/fare/alert
//! engines built on top of it.

pub mod alerts;
pub mod api_client;
pub mod auth;
pub mod branch_line;
pub mod cache_keys;
pub mod cache_store;
pub mod config;
pub mod error;
pub mod fare;
pub mod health;
pub mod http;
pub mod journey;
pub mod models;
pub mod normalize;
pub mod pool;
pub mod slot;
pub mod station_resolver;
pub mod timetable_matcher;
pub mod tpass_regions;

pub use api_client::{ApiClient, QueryOptions};
pub use error::TraError;

use crate::cache_store::CacheStore;
use crate::config::Credential;
use crate::http::{build_pipeline, CircuitParams, RetryParams};
use crate::pool::KeyPool;
use crate::slot::RateLimiterParams;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Tunables an embedder can override before building an [`ApiClient`];
/// every field defaults to the same value the access layer uses when run
/// from the CLI unconfigured.
#[derive(Debug, Clone)]
pub struct AccessLayerConfig {
    pub cache_dir: Option<PathBuf>,
    pub http_timeout: Duration,
    pub retry: RetryParams,
    pub circuit: CircuitParams,
    /// Per-slot token-bucket override (spec §9 Open Question 2), normally
    /// sourced from `~/.config/tra/config.json`'s `rate_limiter_max_tokens`
    /// / `rate_limiter_refill_rate_per_sec`.
    pub rate_limiter: RateLimiterParams,
}

impl Default for AccessLayerConfig {
    fn default() -> Self {
        Self {
            cache_dir: None,
            http_timeout: http::DEFAULT_PER_ATTEMPT_TIMEOUT,
            retry: RetryParams::default(),
            circuit: CircuitParams::default(),
            rate_limiter: RateLimiterParams::default(),
        }
    }
}

/// Assembles the pool, cache, and resilient HTTP pipeline into a ready
/// [`ApiClient`]. Does not fetch the branch-line table; call
/// [`ApiClient::load_branch_line_resolver`] and
/// [`ApiClient::with_branch_lines`] once credentials are confirmed live, or
/// skip it entirely if branch-line OD queries are out of scope.
pub fn build_api_client(credentials: Vec<Credential>, config: AccessLayerConfig) -> ApiClient {
    let http_client = reqwest::Client::new();
    let pool = Arc::new(KeyPool::with_rate_limiter_params(
        credentials,
        http_client.clone(),
        config.rate_limiter,
    ));
    let cache = Arc::new(match config.cache_dir {
        Some(dir) => CacheStore::new(dir),
        None => CacheStore::with_default_dir(),
    });
    let pipeline = build_pipeline(http_client, config.http_timeout, config.retry, config.circuit);
    ApiClient::new(pool, cache, pipeline)
}
