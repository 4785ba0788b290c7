//! Caching layer for provider results.
//!
//! Wraps a capability so that repeated requests with identical inputs reuse
//! the provider's earlier candidate instead of calling it again. Cached
//! candidates still go through output validation in the orchestrator.

use async_trait::async_trait;
use moka::future::Cache;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;

use accord_core::{normalize_override, GuidanceCandidate, NegotiationContext, ProviderId};

use crate::providers::{GuidanceCapability, ProviderError};

/// Cache key for provider results.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    context_hash: u64,
    prompt_hash: u64,
    model_hash: u64,
}

impl CacheKey {
    /// Create a cache key from request inputs. A blank override keys the
    /// same as no override, matching the prompt the provider actually sends.
    pub fn new(context: &NegotiationContext, prompt_override: Option<&str>, model: &str) -> Self {
        let mut hasher = DefaultHasher::new();
        normalize_override(prompt_override).hash(&mut hasher);

        Self {
            context_hash: hash_context(context),
            prompt_hash: hasher.finish(),
            model_hash: hash_str(model),
        }
    }
}

/// A capability decorated with an in-memory result cache.
///
/// Only present candidates are cached; errors and empty answers always reach
/// the wrapped provider again.
pub struct CachedCapability<C: ?Sized = dyn GuidanceCapability> {
    inner: Arc<C>,
    cache: Cache<CacheKey, GuidanceCandidate>,
}

impl<C: GuidanceCapability + ?Sized> CachedCapability<C> {
    /// Wrap `inner` with a cache of at most `max_entries` kept for `ttl`.
    pub fn new(inner: Arc<C>, max_entries: u64, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_entries)
            .time_to_live(ttl)
            .build();

        Self { inner, cache }
    }

    /// Clear the cache.
    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }

    /// Approximate number of cached entries.
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }
}

#[async_trait]
impl<C: GuidanceCapability + ?Sized> GuidanceCapability for CachedCapability<C> {
    fn provider(&self) -> ProviderId {
        self.inner.provider()
    }

    fn model(&self) -> &str {
        self.inner.model()
    }

    async fn generate(
        &self,
        context: &NegotiationContext,
        prompt_override: Option<&str>,
    ) -> Result<Option<GuidanceCandidate>, ProviderError> {
        let key = CacheKey::new(context, prompt_override, self.inner.model());

        if let Some(mut hit) = self.cache.get(&key).await {
            tracing::debug!(provider = %self.provider(), "Guidance cache hit");
            hit.cached = true;
            return Ok(Some(hit));
        }

        let candidate = self.inner.generate(context, prompt_override).await?;
        if let Some(candidate) = &candidate {
            let mut entry = candidate.clone();
            entry.cached = false;
            self.cache.insert(key, entry).await;
        }

        Ok(candidate)
    }
}

// Hash helpers

fn hash_context(context: &NegotiationContext) -> u64 {
    let mut hasher = DefaultHasher::new();
    // Serialized form covers every field, including metadata
    match serde_json::to_string(context) {
        Ok(json) => json.hash(&mut hasher),
        Err(_) => context.topic.hash(&mut hasher),
    }
    hasher.finish()
}

fn hash_str(value: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}
