//! The single outbound HTTP call wrapped by the resilience stack:
//! `circuit_breaker.execute(|| retry.run(|| GET url with bearer token))`.
//!
//! This module owns only the bottom of the pipeline (§2, "inside that,
//! RetryRunner repeats on transient failures"). Slot selection, rate
//! limiting, and token acquisition happen above it in [`crate::api_client`].

use crate::error::TraError;
use std::time::Duration;
use tower::util::BoxCloneService;
use tower::{Layer, Service, ServiceExt};
use tra_circuitbreaker::{CircuitBreaker, CircuitBreakerError, CircuitBreakerLayer};
use tra_retry::{ExponentialBackoff, Retry, RetryLayer};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// A single GET request: URL plus bearer token. `Clone` so the retry layer
/// may reissue it on a transient failure.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub url: String,
    pub token: String,
}

type HttpBase = BoxCloneService<HttpRequest, serde_json::Value, TraError>;
type RetriedHttp = Retry<HttpBase, HttpRequest, TraError>;

/// The resilient HTTP pipeline: one global circuit breaker (§9 Open
/// Question 1) wrapping the retry runner wrapping the bare fetch.
pub type ResilientHttp = CircuitBreaker<RetriedHttp, serde_json::Value, TraError>;

#[derive(Debug, Clone, Copy)]
pub struct RetryParams {
    pub max_retries: usize,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
    pub jitter_fraction: f64,
}

impl Default for RetryParams {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
            jitter_fraction: 0.1,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CircuitParams {
    pub failure_threshold: usize,
    pub success_threshold: usize,
    pub open_timeout: Duration,
}

impl Default for CircuitParams {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            success_threshold: 2,
            open_timeout: Duration::from_secs(30),
        }
    }
}

async fn fetch_json(client: &reqwest::Client, req: &HttpRequest, timeout: Duration) -> Result<serde_json::Value, TraError> {
    let response = client
        .get(&req.url)
        .bearer_auth(&req.token)
        .timeout(timeout)
        .send()
        .await
        .map_err(|err| {
            let message = err.to_string();
            if err.is_timeout() {
                TraError::api_error(format!("request timeout: {message}"), None)
            } else if err.is_connect() {
                TraError::api_error(format!("ECONNREFUSED: {message}"), None)
            } else {
                TraError::api_error(message, None)
            }
        })?;

    let status = response.status();
    if status.as_u16() == 401 || status.as_u16() == 403 {
        return Err(TraError::AuthError {
            message: format!("{} returned HTTP {}", req.url, status.as_u16()),
        });
    }
    if !status.is_success() {
        return Err(TraError::api_error(
            format!("{} returned HTTP {}", req.url, status.as_u16()),
            Some(status.as_u16()),
        ));
    }

    response
        .json::<serde_json::Value>()
        .await
        .map_err(|err| TraError::api_error(format!("decode failed: {err}"), None))
}

/// Builds the resilient pipeline once; `ApiClient` clones `ResilientHttp`
/// (cheap — it's `Arc`-backed) per call.
pub fn build_pipeline(
    client: reqwest::Client,
    timeout: Duration,
    retry: RetryParams,
    circuit: CircuitParams,
) -> ResilientHttp {
    let base: HttpBase = BoxCloneService::new(tower::service_fn(move |req: HttpRequest| {
        let client = client.clone();
        async move { fetch_json(&client, &req, timeout).await }
    }));

    let retry_layer = RetryLayer::<HttpRequest, TraError>::builder()
        .max_attempts(retry.max_retries + 1)
        .backoff(
            ExponentialBackoff::new(retry.base_delay)
                .multiplier(retry.multiplier)
                .max_delay(retry.max_delay)
                .jitter(retry.jitter_fraction),
        )
        .retry_on(|err: &TraError| err.is_transient())
        .name("tdx-http")
        .build();

    let circuit_layer = CircuitBreakerLayer::<serde_json::Value, TraError>::builder()
        .failure_threshold(circuit.failure_threshold)
        .success_threshold(circuit.success_threshold)
        .open_timeout(circuit.open_timeout)
        .failure_classifier(|result: &Result<serde_json::Value, TraError>| {
            matches!(result, Err(err) if err.is_transient())
        })
        .name("tdx-api")
        .build();

    circuit_layer.layer(retry_layer.layer(base))
}

/// Runs one request through the resilient pipeline, translating the
/// breaker's wrapped error back into the flat [`TraError`] taxonomy.
pub async fn call(pipeline: &ResilientHttp, req: HttpRequest) -> Result<serde_json::Value, TraError> {
    let mut pipeline = pipeline.clone();
    let ready = pipeline.ready().await.map_err(cb_err_to_tra)?;
    ready.call(req).await.map_err(cb_err_to_tra)
}

fn cb_err_to_tra(err: CircuitBreakerError<TraError>) -> TraError {
    match err {
        CircuitBreakerError::Open { retry_after } => TraError::CircuitBreakerOpen { retry_after },
        CircuitBreakerError::Inner(inner) => inner,
    }
}

pub const DEFAULT_PER_ATTEMPT_TIMEOUT: Duration = DEFAULT_TIMEOUT;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn transient_failure_retries_then_succeeds() {
        let server = MockServer::start().await;
        let calls = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&calls);

        Mock::given(method("GET"))
            .respond_with(move |_: &wiremock::Request| {
                let n = c.fetch_add(1, Ordering::SeqCst);
                if n == 0 {
                    ResponseTemplate::new(503)
                } else {
                    ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true}))
                }
            })
            .mount(&server)
            .await;

        let pipeline = build_pipeline(
            reqwest::Client::new(),
            Duration::from_secs(5),
            RetryParams {
                max_retries: 2,
                base_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(10),
                multiplier: 2.0,
                jitter_fraction: 0.0,
            },
            CircuitParams::default(),
        );

        let result = call(
            &pipeline,
            HttpRequest {
                url: server.uri(),
                token: "tok".to_string(),
            },
        )
        .await
        .unwrap();
        assert_eq!(result, serde_json::json!({"ok": true}));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn permanent_failure_is_not_retried() {
        let server = MockServer::start().await;
        let calls = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&calls);

        Mock::given(method("GET"))
            .respond_with(move |_: &wiremock::Request| {
                c.fetch_add(1, Ordering::SeqCst);
                ResponseTemplate::new(404)
            })
            .mount(&server)
            .await;

        let pipeline = build_pipeline(
            reqwest::Client::new(),
            Duration::from_secs(5),
            RetryParams::default(),
            CircuitParams::default(),
        );

        let err = call(
            &pipeline,
            HttpRequest {
                url: server.uri(),
                token: "tok".to_string(),
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.code(), "API_ERROR");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn breaker_opens_after_repeated_transient_failures() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let pipeline = build_pipeline(
            reqwest::Client::new(),
            Duration::from_secs(5),
            RetryParams {
                max_retries: 0,
                base_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(1),
                multiplier: 1.0,
                jitter_fraction: 0.0,
            },
            CircuitParams {
                failure_threshold: 1,
                success_threshold: 1,
                open_timeout: Duration::from_secs(30),
            },
        );

        let first = call(
            &pipeline,
            HttpRequest {
                url: server.uri(),
                token: "tok".to_string(),
            },
        )
        .await
        .unwrap_err();
        assert_eq!(first.code(), "API_ERROR");

        let second = call(
            &pipeline,
            HttpRequest {
                url: server.uri(),
                token: "tok".to_string(),
            },
        )
        .await
        .unwrap_err();
        assert_eq!(second.code(), "CIRCUIT_BREAKER_OPEN");
    }
}
