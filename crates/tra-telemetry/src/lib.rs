//! Shared observability infrastructure for the `tra` resilience stack.
//!
//! Every layer in the stack (rate limiter, circuit breaker, retry runner, cache)
//! emits structured events through the same [`EventListeners`] mechanism so that
//! a single subscriber can observe the whole request pipeline.

pub mod events;

pub use events::{EventListener, EventListeners, FnListener, ResilienceEvent};
