//! Per-provider circuit breakers.
//!
//! When a provider fails repeatedly its circuit opens and the orchestrator
//! skips it until the recovery timeout has passed. The deterministic fallback
//! is never tracked.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::time::Instant;

use accord_core::ProviderId;

use crate::config::duration_secs;

/// Circuit breaker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before opening the circuit
    pub failure_threshold: u32,

    /// Time after the last failure before a trial is allowed (in seconds)
    #[serde(with = "duration_secs")]
    pub recovery_timeout: Duration,

    /// Consecutive half-open successes needed to close the circuit
    pub success_threshold: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            recovery_timeout: Duration::from_secs(60),
            success_threshold: 2,
        }
    }
}

/// State of a circuit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Normal operation
    Closed,

    /// Provider presumed unhealthy, calls are skipped
    Open,

    /// Trial calls are allowed
    HalfOpen,
}

/// Health record for one provider.
#[derive(Debug, Clone)]
pub struct ProviderHealth {
    pub state: CircuitState,
    pub failure_count: u32,
    pub success_count: u32,
    pub last_failure: Option<Instant>,
}

impl ProviderHealth {
    fn closed() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            success_count: 0,
            last_failure: None,
        }
    }
}

/// Read-only view of one provider's health.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderHealthStatus {
    pub state: CircuitState,
    pub failure_count: u32,
    pub success_count: u32,
}

impl From<&ProviderHealth> for ProviderHealthStatus {
    fn from(health: &ProviderHealth) -> Self {
        Self {
            state: health.state,
            failure_count: health.failure_count,
            success_count: health.success_count,
        }
    }
}

/// Health of every tracked provider, keyed by provider.
pub type HealthSnapshot = BTreeMap<ProviderId, ProviderHealthStatus>;

/// Tracks provider health through a circuit-breaker state machine.
///
/// Each provider has its own lock. The map is built once and never resized,
/// so every check-and-transition runs under a single lock acquisition and
/// concurrent updates cannot be lost.
#[derive(Debug)]
pub struct ProviderHealthTracker {
    records: BTreeMap<ProviderId, Mutex<ProviderHealth>>,
    config: CircuitBreakerConfig,
}

impl ProviderHealthTracker {
    /// Create a tracker with every model-backed provider closed.
    pub fn new(config: CircuitBreakerConfig) -> Self {
        let records = ProviderId::TRACKED
            .iter()
            .map(|id| (*id, Mutex::new(ProviderHealth::closed())))
            .collect();

        Self { records, config }
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Whether a call to `provider` may be attempted now.
    ///
    /// An open circuit whose recovery timeout has strictly elapsed moves to
    /// half-open as part of this check.
    pub fn is_available(&self, provider: ProviderId) -> bool {
        let Some(record) = self.records.get(&provider) else {
            return true;
        };

        let mut health = record.lock();
        match health.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let recovered = health
                    .last_failure
                    .map_or(true, |at| at.elapsed() > self.config.recovery_timeout);

                if recovered {
                    health.state = CircuitState::HalfOpen;
                    tracing::info!(provider = %provider, "Circuit half-open, allowing trial calls");
                }
                recovered
            }
        }
    }

    /// Record a successful, accepted call.
    pub fn record_success(&self, provider: ProviderId) {
        let Some(record) = self.records.get(&provider) else {
            return;
        };

        let mut health = record.lock();
        health.success_count = health.success_count.saturating_add(1);
        health.failure_count = 0;

        if health.state == CircuitState::HalfOpen
            && health.success_count >= self.config.success_threshold
        {
            health.state = CircuitState::Closed;
            health.success_count = 0;
            health.failure_count = 0;
            tracing::info!(provider = %provider, "Circuit closed after successful recovery");
        }
    }

    /// Record a failed call, timeout or rejected output.
    pub fn record_failure(&self, provider: ProviderId) {
        let Some(record) = self.records.get(&provider) else {
            return;
        };

        let mut health = record.lock();
        health.failure_count = health.failure_count.saturating_add(1);
        health.success_count = 0;
        health.last_failure = Some(Instant::now());

        match health.state {
            CircuitState::Closed if health.failure_count >= self.config.failure_threshold => {
                health.state = CircuitState::Open;
                tracing::warn!(
                    provider = %provider,
                    failures = health.failure_count,
                    "Circuit opened after repeated failures"
                );
            }
            CircuitState::HalfOpen => {
                health.state = CircuitState::Open;
                tracing::warn!(provider = %provider, "Circuit reopened after failed recovery attempt");
            }
            _ => {}
        }
    }

    /// Current state of a provider's circuit. The fallback is always closed.
    pub fn state(&self, provider: ProviderId) -> CircuitState {
        self.records
            .get(&provider)
            .map(|record| record.lock().state)
            .unwrap_or(CircuitState::Closed)
    }

    /// Read-only view of every tracked provider.
    pub fn snapshot(&self) -> HealthSnapshot {
        self.records
            .iter()
            .map(|(id, record)| (*id, ProviderHealthStatus::from(&*record.lock())))
            .collect()
    }

    /// Reset all circuits to closed.
    pub fn reset(&self) {
        for record in self.records.values() {
            *record.lock() = ProviderHealth::closed();
        }
    }
}

impl Default for ProviderHealthTracker {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}
