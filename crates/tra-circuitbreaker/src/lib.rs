//! A consecutive-failure circuit breaker for Tower services.
//!
//! Unlike a sliding-window failure-rate breaker, this tracks *consecutive*
//! outcomes: the circuit opens after `failure_threshold` transient failures
//! in a row and closes again after `success_threshold` consecutive successes
//! while half-open. A single failure while half-open reopens it immediately.
//!
//! Permanent failures (4xx client errors, for example) can be excluded from
//! the failure count via a custom [`classifier::FailureClassifier`] so that
//! only outages of the downstream dependency trip the breaker.
//!
//! # Examples
//!
//! ```
//! use tower::{ServiceBuilder, service_fn};
//! use tra_circuitbreaker::CircuitBreakerLayer;
//!
//! # async fn example() {
//! let layer = CircuitBreakerLayer::<String, std::io::Error>::builder()
//!     .failure_threshold(3)
//!     .success_threshold(2)
//!     .build();
//!
//! let service = ServiceBuilder::new()
//!     .layer(layer)
//!     .service(service_fn(|req: String| async move { Ok::<_, std::io::Error>(req) }));
//! # }
//! ```

pub mod classifier;
mod circuit;
mod config;
mod error;
mod events;
mod layer;

pub use circuit::{CircuitMetrics, CircuitState, StateChange};
pub use config::{CircuitBreakerConfig, CircuitBreakerConfigBuilder};
pub use error::CircuitBreakerError;
pub use events::CircuitBreakerEvent;
pub use layer::CircuitBreakerLayer;

use crate::circuit::{Admission, Circuit};
use futures::future::BoxFuture;
use std::marker::PhantomData;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::Service;

pub(crate) type ClassifierFn<Res, Err> = dyn Fn(&Result<Res, Err>) -> bool + Send + Sync;
pub(crate) type SharedFailureClassifier<Res, Err> = Arc<ClassifierFn<Res, Err>>;

/// A Tower [`Service`] guarded by a circuit breaker.
pub struct CircuitBreaker<S, Res, Err> {
    inner: S,
    config: Arc<CircuitBreakerConfig<Res, Err>>,
    circuit: Arc<Circuit>,
    _marker: PhantomData<fn() -> (Res, Err)>,
}

impl<S, Res, Err> CircuitBreaker<S, Res, Err> {
    pub(crate) fn new(inner: S, config: Arc<CircuitBreakerConfig<Res, Err>>) -> Self {
        let circuit = Arc::new(Circuit::new(
            config.failure_threshold,
            config.success_threshold,
            config.open_timeout,
            config.half_open_max_calls,
            config.name.clone(),
        ));
        Self {
            inner,
            config,
            circuit,
            _marker: PhantomData,
        }
    }

    /// Current state of the circuit.
    pub fn state(&self) -> CircuitState {
        self.circuit.state()
    }

    /// Snapshot of call counters and recent transitions.
    pub fn metrics(&self) -> CircuitMetrics {
        self.circuit.metrics()
    }

    /// Forces the circuit back to closed. Intended for manual operator recovery.
    pub fn reset(&self) {
        self.circuit.reset()
    }
}

impl<S: Clone, Res, Err> Clone for CircuitBreaker<S, Res, Err> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            config: Arc::clone(&self.config),
            circuit: Arc::clone(&self.circuit),
            _marker: PhantomData,
        }
    }
}

impl<S, Req, Res, Err> Service<Req> for CircuitBreaker<S, Res, Err>
where
    S: Service<Req, Response = Res, Error = Err> + Clone + Send + 'static,
    Res: Send + 'static,
    Err: Send + 'static,
    S::Future: Send + 'static,
    Req: Send + 'static,
{
    type Response = Res;
    type Error = CircuitBreakerError<Err>;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Req) -> Self::Future {
        let circuit = Arc::clone(&self.circuit);
        let config = Arc::clone(&self.config);
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let (admission, events) = circuit.try_admit();
            for event in &events {
                config.event_listeners.emit(event);
            }

            let retry_after = match admission {
                Admission::Permitted(_) => None,
                Admission::Rejected { retry_after } => Some(retry_after),
            };
            if let Some(retry_after) = retry_after {
                return Err(CircuitBreakerError::Open { retry_after });
            }

            let result = inner.call(req).await;
            let is_failure = (config.failure_classifier)(&result);

            let events = if is_failure {
                circuit.record_failure()
            } else {
                circuit.record_success()
            };
            for event in &events {
                config.event_listeners.emit(event);
            }

            result.map_err(CircuitBreakerError::Inner)
        })
    }
}
