//! # accord-runtime
//!
//! Resilient, multi-provider guidance generation for Accord.
//!
//! This crate drives model providers for the deterministic building blocks
//! in `accord-core`:
//! - Sequential failover across Gemini and OpenAI
//! - Per-provider circuit breakers and call timeouts
//! - Validated output or deterministic fallback guidance
//!
//! ## Important
//!
//! Provider clients are OPTIONAL. Enable the `gemini` and/or `openai`
//! features to compile them in. Without them the orchestrator still answers
//! every valid request with fallback guidance.
//!
//! ## Example
//!
//! ```rust,ignore
//! use accord_core::NegotiationContext;
//! use accord_runtime::{GuidanceOrchestrator, RuntimeConfig};
//!
//! let orchestrator = GuidanceOrchestrator::from_config(RuntimeConfig::load(None)?)?;
//!
//! let context = NegotiationContext::new(
//!     "SLA Enhancement", "c-1", "sla_enhancement", "99% uptime", "99.9% uptime",
//! );
//! let guidance = orchestrator.generate_guidance(context, None, None).await?;
//! println!("{} ({})", guidance.summary, guidance.model);
//! ```

use thiserror::Error;

pub mod cache;
pub mod config;
pub mod orchestrator;
pub mod providers;
pub mod resilience;

pub use cache::CachedCapability;
pub use config::{ConfigError, RuntimeConfig, DEFAULT_CALL_TIMEOUT};
pub use orchestrator::{AttemptError, GuidanceOrchestrator, GuidanceOrchestratorBuilder};
pub use providers::{
    ApiCredential, CapabilityFactory, CapabilityRegistry, CredentialSource, GuidanceCapability,
    ProviderError,
};
pub use resilience::{
    CircuitBreakerConfig, CircuitState, FailoverSequencer, HealthSnapshot, ProviderHealthStatus,
    ProviderHealthTracker,
};

/// Errors from assembling the runtime.
///
/// Guidance generation itself never fails with these; see
/// [`GuidanceOrchestrator::generate_guidance`].
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("Invalid capability: {0}")]
    InvalidCapability(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use accord_core::{NegotiationContext, FALLBACK_MODEL};

    #[tokio::test]
    async fn test_default_runtime_answers_with_fallback() {
        let mut config = RuntimeConfig::default();
        config.providers.gemini.enabled = false;
        config.providers.openai.enabled = false;

        let orchestrator = GuidanceOrchestrator::from_config(config).unwrap();
        let context = NegotiationContext::new(
            "Liability Cap",
            "c-9",
            "liability",
            "Unlimited liability",
            "Cap at 12 months fees",
        );

        let guidance = orchestrator
            .generate_guidance(context, None, None)
            .await
            .unwrap();
        assert_eq!(guidance.model, FALLBACK_MODEL);
        assert!(!guidance.talking_points.is_empty());
    }

    #[test]
    fn test_config_error_converts() {
        let err: RuntimeError = RuntimeConfig::from_yaml("call_timeout: [")
            .unwrap_err()
            .into();
        assert!(matches!(err, RuntimeError::Config(ConfigError::Parse(_))));
    }
}
