//! Aggregates the access layer's component statuses into one report for
//! the `tra health` / metrics commands (§4, L5 `HealthCheck`).
//!
//! Unlike [`tra_healthcheck_support::HealthCheckWrapper`], which monitors a
//! pool of interchangeable resources of the same type, the components here
//! (key pool, circuit breaker, cache) are different in kind; this is a
//! small bespoke aggregator that reuses [`HealthStatus`] as its common
//! vocabulary.

use crate::pool::{KeyPool, PoolCapacity};
use tra_circuitbreaker::CircuitState;
use tra_healthcheck_support::HealthStatus;

#[derive(Debug, Clone)]
pub struct ComponentHealth {
    pub name: &'static str,
    pub status: HealthStatus,
    pub detail: String,
}

#[derive(Debug, Clone)]
pub struct HealthReport {
    pub overall: HealthStatus,
    pub components: Vec<ComponentHealth>,
    pub capacity: PoolCapacity,
    pub active_slot_count: usize,
}

pub struct HealthCheckService;

impl HealthCheckService {
    /// `circuit_state` is sampled from the single global breaker (§9 Open
    /// Question 1).
    pub fn perform_health_check(pool: &KeyPool, circuit_state: CircuitState) -> HealthReport {
        let capacity = pool.get_capacity();
        let active_slot_count = pool.get_active_slot_count();

        let pool_status = if active_slot_count == 0 {
            HealthStatus::Unhealthy
        } else if active_slot_count < pool.len() {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        };

        let breaker_status = match circuit_state {
            CircuitState::Closed => HealthStatus::Healthy,
            CircuitState::HalfOpen => HealthStatus::Degraded,
            CircuitState::Open => HealthStatus::Unhealthy,
        };

        let components = vec![
            ComponentHealth {
                name: "key_pool",
                status: pool_status,
                detail: format!("{active_slot_count}/{} slots active, {}/{} tokens available", pool.len(), capacity.available, capacity.max),
            },
            ComponentHealth {
                name: "circuit_breaker",
                status: breaker_status,
                detail: format!("state={circuit_state:?}"),
            },
        ];

        let overall = components
            .iter()
            .map(|c| c.status)
            .max_by_key(severity_rank)
            .unwrap_or(HealthStatus::Unknown);

        HealthReport {
            overall,
            components,
            capacity,
            active_slot_count,
        }
    }
}

fn severity_rank(status: &HealthStatus) -> u8 {
    match status {
        HealthStatus::Healthy => 0,
        HealthStatus::Degraded => 1,
        HealthStatus::Unknown => 2,
        HealthStatus::Unhealthy => 3,
    }
}
