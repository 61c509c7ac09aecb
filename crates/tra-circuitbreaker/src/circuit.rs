use crate::events::CircuitBreakerEvent;
#[cfg(feature = "metrics")]
use metrics::{counter, gauge};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::{Duration, Instant};

/// Represents the state of the circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CircuitState {
    /// The circuit is closed and calls are allowed.
    Closed = 0,
    /// The circuit is open and calls are rejected.
    Open = 1,
    /// The circuit is half-open and a limited number of calls are allowed.
    HalfOpen = 2,
}

impl CircuitState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => CircuitState::Closed,
            1 => CircuitState::Open,
            2 => CircuitState::HalfOpen,
            _ => CircuitState::Closed,
        }
    }
}

/// A single recorded state transition, for the bounded history exposed by
/// [`CircuitMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateChange {
    pub from: CircuitState,
    pub to: CircuitState,
    pub at: Instant,
}

/// Snapshot of circuit breaker counters and recent history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitMetrics {
    pub state: CircuitState,
    pub total_calls: u64,
    pub total_failures: u64,
    pub total_successes: u64,
    pub total_rejected: u64,
    pub consecutive_failures: usize,
    pub consecutive_successes: usize,
    /// Most recent state transitions, oldest first, capped at 20 entries.
    pub recent_transitions: Vec<StateChange>,
}

const MAX_TRANSITION_LOG: usize = 20;

struct Counters {
    state: CircuitState,
    consecutive_failures: usize,
    consecutive_successes: usize,
    opened_at: Instant,
    half_open_inflight: usize,
    total_calls: u64,
    total_failures: u64,
    total_successes: u64,
    total_rejected: u64,
    transitions: VecDeque<StateChange>,
}

/// The consecutive-failure/consecutive-success state machine backing
/// [`crate::CircuitBreaker`].
///
/// A single breaker instance is meant to be shared (behind an `Arc`) across
/// every caller that should trip together — callers choose the sharing
/// granularity by how widely they clone it.
pub(crate) struct Circuit {
    state_tag: AtomicU8,
    inner: std::sync::Mutex<Counters>,
    failure_threshold: usize,
    success_threshold: usize,
    open_timeout: Duration,
    half_open_max_calls: usize,
    name: String,
}

/// Outcome of a call-admission check.
pub(crate) enum Admission {
    Permitted(CircuitState),
    Rejected { retry_after: Duration },
}

impl Circuit {
    pub(crate) fn new(
        failure_threshold: usize,
        success_threshold: usize,
        open_timeout: Duration,
        half_open_max_calls: usize,
        name: String,
    ) -> Self {
        Self {
            state_tag: AtomicU8::new(CircuitState::Closed as u8),
            inner: std::sync::Mutex::new(Counters {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                consecutive_successes: 0,
                opened_at: Instant::now(),
                half_open_inflight: 0,
                total_calls: 0,
                total_failures: 0,
                total_successes: 0,
                total_rejected: 0,
                transitions: VecDeque::with_capacity(MAX_TRANSITION_LOG),
            }),
            failure_threshold: failure_threshold.max(1),
            success_threshold: success_threshold.max(1),
            open_timeout,
            half_open_max_calls: half_open_max_calls.max(1),
            name,
        }
    }

    pub(crate) fn state(&self) -> CircuitState {
        CircuitState::from_u8(self.state_tag.load(Ordering::Acquire))
    }

    fn transition(&self, counters: &mut Counters, to: CircuitState, events: &mut Vec<CircuitBreakerEvent>) {
        let from = counters.state;
        if from == to {
            return;
        }
        counters.state = to;
        self.state_tag.store(to as u8, Ordering::Release);
        if to == CircuitState::Open {
            counters.opened_at = Instant::now();
        }
        if to == CircuitState::HalfOpen {
            counters.half_open_inflight = 0;
        }
        counters.consecutive_failures = 0;
        counters.consecutive_successes = 0;

        let now = Instant::now();
        if counters.transitions.len() == MAX_TRANSITION_LOG {
            counters.transitions.pop_front();
        }
        counters.transitions.push_back(StateChange { from, to, at: now });

        #[cfg(feature = "metrics")]
        gauge!("circuitbreaker_state", "name" => self.name.clone()).set(to as u8 as f64);
        #[cfg(feature = "tracing")]
        tracing::info!(breaker = %self.name, ?from, ?to, "circuit breaker state transition");

        events.push(CircuitBreakerEvent::StateTransition {
            pattern_name: self.name.clone(),
            timestamp: now,
            from_state: from,
            to_state: to,
        });
    }

    /// Decides whether a call may proceed, lazily moving OPEN -> HALF_OPEN
    /// once `open_timeout` has elapsed.
    pub(crate) fn try_admit(&self) -> (Admission, Vec<CircuitBreakerEvent>) {
        let mut events = Vec::new();
        let mut counters = self.inner.lock().unwrap_or_else(|e| e.into_inner());

        match counters.state {
            CircuitState::Closed => {
                counters.total_calls += 1;
                let state = counters.state;
                (Admission::Permitted(state), events)
            }
            CircuitState::Open => {
                let elapsed = counters.opened_at.elapsed();
                if elapsed >= self.open_timeout {
                    self.transition(&mut counters, CircuitState::HalfOpen, &mut events);
                    counters.half_open_inflight += 1;
                    counters.total_calls += 1;
                    (Admission::Permitted(CircuitState::HalfOpen), events)
                } else {
                    counters.total_rejected += 1;
                    let retry_after = self.open_timeout - elapsed;
                    events.push(CircuitBreakerEvent::CallRejected {
                        pattern_name: self.name.clone(),
                        timestamp: Instant::now(),
                    });
                    #[cfg(feature = "metrics")]
                    counter!("circuitbreaker_calls_rejected_total", "name" => self.name.clone())
                        .increment(1);
                    (Admission::Rejected { retry_after }, events)
                }
            }
            CircuitState::HalfOpen => {
                if counters.half_open_inflight < self.half_open_max_calls {
                    counters.half_open_inflight += 1;
                    counters.total_calls += 1;
                    (Admission::Permitted(CircuitState::HalfOpen), events)
                } else {
                    counters.total_rejected += 1;
                    events.push(CircuitBreakerEvent::CallRejected {
                        pattern_name: self.name.clone(),
                        timestamp: Instant::now(),
                    });
                    (
                        Admission::Rejected {
                            retry_after: Duration::from_millis(50),
                        },
                        events,
                    )
                }
            }
        }
    }

    /// Records a successful (non-classified-as-failure) call outcome.
    pub(crate) fn record_success(&self) -> Vec<CircuitBreakerEvent> {
        let mut events = Vec::new();
        let mut counters = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        counters.total_successes += 1;
        counters.consecutive_failures = 0;

        match counters.state {
            CircuitState::Closed => {}
            CircuitState::HalfOpen => {
                counters.half_open_inflight = counters.half_open_inflight.saturating_sub(1);
                counters.consecutive_successes += 1;
                if counters.consecutive_successes >= self.success_threshold {
                    self.transition(&mut counters, CircuitState::Closed, &mut events);
                }
            }
            CircuitState::Open => {}
        }

        events.push(CircuitBreakerEvent::SuccessRecorded {
            pattern_name: self.name.clone(),
            timestamp: Instant::now(),
            state: counters.state,
        });
        #[cfg(feature = "metrics")]
        counter!("circuitbreaker_calls_success_total", "name" => self.name.clone()).increment(1);
        events
    }

    /// Records a failed call outcome classified as transient.
    pub(crate) fn record_failure(&self) -> Vec<CircuitBreakerEvent> {
        let mut events = Vec::new();
        let mut counters = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        counters.total_failures += 1;
        counters.consecutive_successes = 0;

        match counters.state {
            CircuitState::Closed => {
                counters.consecutive_failures += 1;
                let consecutive_failures = counters.consecutive_failures;
                if consecutive_failures >= self.failure_threshold {
                    self.transition(&mut counters, CircuitState::Open, &mut events);
                }
                events.push(CircuitBreakerEvent::FailureRecorded {
                    pattern_name: self.name.clone(),
                    timestamp: Instant::now(),
                    state: counters.state,
                    consecutive_failures,
                });
            }
            CircuitState::HalfOpen => {
                counters.half_open_inflight = counters.half_open_inflight.saturating_sub(1);
                events.push(CircuitBreakerEvent::FailureRecorded {
                    pattern_name: self.name.clone(),
                    timestamp: Instant::now(),
                    state: counters.state,
                    consecutive_failures: 1,
                });
                self.transition(&mut counters, CircuitState::Open, &mut events);
            }
            CircuitState::Open => {
                events.push(CircuitBreakerEvent::FailureRecorded {
                    pattern_name: self.name.clone(),
                    timestamp: Instant::now(),
                    state: counters.state,
                    consecutive_failures: counters.consecutive_failures,
                });
            }
        }

        #[cfg(feature = "metrics")]
        counter!("circuitbreaker_calls_failure_total", "name" => self.name.clone()).increment(1);
        events
    }

    pub(crate) fn metrics(&self) -> CircuitMetrics {
        let counters = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        CircuitMetrics {
            state: counters.state,
            total_calls: counters.total_calls,
            total_failures: counters.total_failures,
            total_successes: counters.total_successes,
            total_rejected: counters.total_rejected,
            consecutive_failures: counters.consecutive_failures,
            consecutive_successes: counters.consecutive_successes,
            recent_transitions: counters.transitions.iter().copied().collect(),
        }
    }

    /// Forces the circuit back to `Closed`, discarding counters. Intended for
    /// manual operator recovery.
    pub(crate) fn reset(&self) {
        let mut counters = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let mut events = Vec::new();
        self.transition(&mut counters, CircuitState::Closed, &mut events);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opens_after_consecutive_failures() {
        let circuit = Circuit::new(3, 2, Duration::from_secs(60), 1, "t".into());
        for _ in 0..3 {
            assert!(matches!(circuit.try_admit().0, Admission::Permitted(_)));
            circuit.record_failure();
        }
        assert_eq!(circuit.state(), CircuitState::Open);
    }

    #[test]
    fn success_resets_consecutive_failure_count() {
        let circuit = Circuit::new(3, 2, Duration::from_secs(60), 1, "t".into());
        circuit.record_failure();
        circuit.record_failure();
        circuit.record_success();
        circuit.record_failure();
        circuit.record_failure();
        assert_eq!(circuit.state(), CircuitState::Closed);
    }

    #[test]
    fn rejects_calls_while_open() {
        let circuit = Circuit::new(1, 1, Duration::from_secs(60), 1, "t".into());
        circuit.try_admit();
        circuit.record_failure();
        assert_eq!(circuit.state(), CircuitState::Open);
        let (admission, _) = circuit.try_admit();
        assert!(matches!(admission, Admission::Rejected { .. }));
    }

    #[test]
    fn moves_to_half_open_after_timeout_and_closes_on_success() {
        let circuit = Circuit::new(1, 1, Duration::from_millis(20), 1, "t".into());
        circuit.try_admit();
        circuit.record_failure();
        assert_eq!(circuit.state(), CircuitState::Open);

        std::thread::sleep(Duration::from_millis(30));
        let (admission, _) = circuit.try_admit();
        assert!(matches!(admission, Admission::Permitted(CircuitState::HalfOpen)));
        assert_eq!(circuit.state(), CircuitState::HalfOpen);

        circuit.record_success();
        assert_eq!(circuit.state(), CircuitState::Closed);
    }

    #[test]
    fn half_open_failure_reopens_immediately() {
        let circuit = Circuit::new(1, 2, Duration::from_millis(10), 1, "t".into());
        circuit.try_admit();
        circuit.record_failure();
        std::thread::sleep(Duration::from_millis(15));
        circuit.try_admit();
        assert_eq!(circuit.state(), CircuitState::HalfOpen);
        circuit.record_failure();
        assert_eq!(circuit.state(), CircuitState::Open);
    }

    #[test]
    fn metrics_report_bounded_transition_log() {
        let circuit = Circuit::new(1, 1, Duration::from_millis(1), 1, "t".into());
        for _ in 0..30 {
            circuit.try_admit();
            circuit.record_failure();
            std::thread::sleep(Duration::from_millis(2));
            circuit.try_admit();
            circuit.record_success();
        }
        let metrics = circuit.metrics();
        assert!(metrics.recent_transitions.len() <= MAX_TRANSITION_LOG);
    }
}
