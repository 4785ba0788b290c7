//! Capability factories for building providers from configuration.
//!
//! Each compiled-in provider registers a factory. The registry turns a
//! [`RuntimeConfig`] into the set of capabilities the orchestrator can call;
//! providers that are disabled, not compiled in, or missing credentials are
//! left out and the orchestrator skips them.
//!
//! ## Usage
//!
//! ```ignore
//! let registry = CapabilityRegistry::with_defaults();
//! let capabilities = registry.build_all(&config);
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use accord_core::ProviderId;

use super::{GuidanceCapability, ProviderError};
use crate::cache::CachedCapability;
use crate::config::{ProviderSettings, RuntimeConfig};

/// Creates a capability for one provider from its settings.
pub trait CapabilityFactory: Send + Sync {
    /// The provider this factory builds.
    fn provider(&self) -> ProviderId;

    /// Build a capability, resolving credentials as needed.
    fn create(&self, settings: &ProviderSettings)
        -> Result<Arc<dyn GuidanceCapability>, ProviderError>;

    /// Human-readable description of this provider.
    fn description(&self) -> &'static str {
        "Guidance provider"
    }
}

/// Registry of available capability factories.
#[derive(Default)]
pub struct CapabilityRegistry {
    factories: BTreeMap<ProviderId, Arc<dyn CapabilityFactory>>,
}

impl CapabilityRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with every compiled-in provider registered.
    pub fn with_defaults() -> Self {
        #[allow(unused_mut)]
        let mut registry = Self::new();

        #[cfg(feature = "gemini")]
        registry.register(Arc::new(super::GeminiCapabilityFactory));

        #[cfg(feature = "openai")]
        registry.register(Arc::new(super::OpenAiCapabilityFactory));

        registry
    }

    /// Register a factory, replacing any existing one for the same provider.
    /// Factories claiming the fallback are ignored.
    pub fn register(&mut self, factory: Arc<dyn CapabilityFactory>) {
        let provider = factory.provider();
        if provider.is_fallback() {
            tracing::warn!("Ignoring factory for the fallback provider");
            return;
        }
        self.factories.insert(provider, factory);
    }

    /// Build one provider's capability.
    pub fn create(
        &self,
        provider: ProviderId,
        settings: &ProviderSettings,
    ) -> Result<Arc<dyn GuidanceCapability>, ProviderError> {
        self.factories
            .get(&provider)
            .ok_or_else(|| {
                ProviderError::NotConfigured(format!(
                    "Provider '{}' is not compiled in. Available: {:?}",
                    provider,
                    self.available()
                ))
            })?
            .create(settings)
    }

    /// Build every enabled provider that can be configured, wrapping each in
    /// the result cache when caching is enabled.
    pub fn build_all(&self, config: &RuntimeConfig) -> Vec<Arc<dyn GuidanceCapability>> {
        let mut capabilities = Vec::new();

        for provider in ProviderId::TRACKED {
            let settings = match provider {
                ProviderId::Gemini => &config.providers.gemini,
                _ => &config.providers.openai,
            };

            if !settings.enabled {
                tracing::info!(provider = %provider, "Provider disabled by configuration");
                continue;
            }

            match self.create(provider, settings) {
                Ok(capability) if config.cache.enabled => {
                    capabilities.push(Arc::new(CachedCapability::new(
                        capability,
                        config.cache.max_entries,
                        config.cache.ttl,
                    )) as Arc<dyn GuidanceCapability>);
                }
                Ok(capability) => capabilities.push(capability),
                Err(e) => {
                    tracing::info!(provider = %provider, reason = %e, "Provider not available");
                }
            }
        }

        capabilities
    }

    /// List registered providers.
    pub fn available(&self) -> Vec<ProviderId> {
        self.factories.keys().copied().collect()
    }

    /// Check if a provider is registered.
    pub fn has_provider(&self, provider: ProviderId) -> bool {
        self.factories.contains_key(&provider)
    }
}

impl std::fmt::Debug for CapabilityRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilityRegistry")
            .field("providers", &self.available())
            .finish()
    }
}
