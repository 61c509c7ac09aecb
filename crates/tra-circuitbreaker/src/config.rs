use crate::events::CircuitBreakerEvent;
use crate::SharedFailureClassifier;
use std::sync::Arc;
use std::time::Duration;
use tra_telemetry::EventListeners;

/// Configuration for the circuit breaker.
///
/// Unlike a sliding-window/failure-rate breaker, this tracks *consecutive*
/// failures and successes: the circuit opens after `failure_threshold`
/// transient failures in a row, and closes again after `success_threshold`
/// consecutive successes while half-open.
pub struct CircuitBreakerConfig<Res, Err> {
    pub(crate) failure_threshold: usize,
    pub(crate) success_threshold: usize,
    pub(crate) open_timeout: Duration,
    pub(crate) half_open_max_calls: usize,
    pub(crate) failure_classifier: SharedFailureClassifier<Res, Err>,
    pub(crate) event_listeners: EventListeners<CircuitBreakerEvent>,
    pub(crate) name: String,
}

impl<Res, Err> CircuitBreakerConfig<Res, Err> {
    /// Creates a new configuration builder.
    pub fn builder() -> CircuitBreakerConfigBuilder<Res, Err> {
        CircuitBreakerConfigBuilder::new()
    }
}

/// Builder for [`CircuitBreakerConfig`].
pub struct CircuitBreakerConfigBuilder<Res, Err> {
    failure_threshold: usize,
    success_threshold: usize,
    open_timeout: Duration,
    half_open_max_calls: usize,
    failure_classifier: SharedFailureClassifier<Res, Err>,
    event_listeners: EventListeners<CircuitBreakerEvent>,
    name: String,
}

impl<Res, Err> CircuitBreakerConfigBuilder<Res, Err> {
    /// Creates a new builder with default values.
    ///
    /// Defaults: `failure_threshold` 3, `success_threshold` 2, `open_timeout`
    /// 60s, `half_open_max_calls` 1. All errors classify as failures unless
    /// overridden with [`Self::failure_classifier`].
    pub fn new() -> Self {
        Self {
            failure_threshold: 3,
            success_threshold: 2,
            open_timeout: Duration::from_secs(60),
            half_open_max_calls: 1,
            failure_classifier: Arc::new(|res| res.is_err()),
            event_listeners: EventListeners::new(),
            name: String::from("<unnamed>"),
        }
    }

    /// Sets the number of consecutive transient failures that opens the circuit.
    pub fn failure_threshold(mut self, n: usize) -> Self {
        self.failure_threshold = n;
        self
    }

    /// Sets the number of consecutive successes while half-open that closes the circuit.
    pub fn success_threshold(mut self, n: usize) -> Self {
        self.success_threshold = n;
        self
    }

    /// Sets how long the circuit stays open before allowing a half-open trial.
    pub fn open_timeout(mut self, duration: Duration) -> Self {
        self.open_timeout = duration;
        self
    }

    /// Sets the number of calls permitted concurrently while half-open.
    pub fn half_open_max_calls(mut self, n: usize) -> Self {
        self.half_open_max_calls = n;
        self
    }

    /// Sets a custom classifier distinguishing transient failures (which count
    /// toward `failure_threshold`) from permanent ones (which don't — e.g. a
    /// 4xx response is the caller's fault, not a sign the dependency is down).
    ///
    /// Default: every `Err` counts as a failure.
    pub fn failure_classifier<F>(mut self, classifier: F) -> Self
    where
        F: Fn(&Result<Res, Err>) -> bool + Send + Sync + 'static,
    {
        self.failure_classifier = Arc::new(classifier);
        self
    }

    /// Give this breaker a human-readable name for observability.
    pub fn name<N: Into<String>>(mut self, n: N) -> Self {
        self.name = n.into();
        self
    }

    /// Register a callback for state transition events.
    pub fn on_state_transition<F>(mut self, f: F) -> Self
    where
        F: Fn(crate::CircuitState, crate::CircuitState) + Send + Sync + 'static,
    {
        use tra_telemetry::FnListener;
        self.event_listeners
            .add(FnListener::new(move |event: &CircuitBreakerEvent| {
                if let CircuitBreakerEvent::StateTransition {
                    from_state,
                    to_state,
                    ..
                } = event
                {
                    f(*from_state, *to_state);
                }
            }));
        self
    }

    /// Register a callback invoked whenever a call is rejected outright.
    pub fn on_call_rejected<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        use tra_telemetry::FnListener;
        self.event_listeners
            .add(FnListener::new(move |event: &CircuitBreakerEvent| {
                if matches!(event, CircuitBreakerEvent::CallRejected { .. }) {
                    f();
                }
            }));
        self
    }

    /// Builds the configuration and returns a [`crate::CircuitBreakerLayer`].
    pub fn build(self) -> crate::layer::CircuitBreakerLayer<Res, Err> {
        let config = CircuitBreakerConfig {
            failure_threshold: self.failure_threshold,
            success_threshold: self.success_threshold,
            open_timeout: self.open_timeout,
            half_open_max_calls: self.half_open_max_calls,
            failure_classifier: self.failure_classifier,
            event_listeners: self.event_listeners,
            name: self.name,
        };

        crate::layer::CircuitBreakerLayer::new(config)
    }
}

impl<Res, Err> Default for CircuitBreakerConfigBuilder<Res, Err> {
    fn default() -> Self {
        Self::new()
    }
}
