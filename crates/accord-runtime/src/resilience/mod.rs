//! Resilience patterns for accord-runtime.
//!
//! This module provides:
//! - Per-provider circuit breakers to stop hammering unhealthy providers
//! - Failover ordering across providers

mod circuit_breaker;
mod failover;

pub use circuit_breaker::{
    CircuitBreakerConfig, CircuitState, HealthSnapshot, ProviderHealth, ProviderHealthStatus,
    ProviderHealthTracker,
};
pub use failover::FailoverSequencer;
