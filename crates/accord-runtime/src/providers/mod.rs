//! Guidance providers.
//!
//! This module defines the capability every provider implements and
//! includes HTTP clients for Gemini and OpenAI behind the `gemini` and
//! `openai` features.
//!
//! ## Security
//!
//! All providers use the [`secrets`] module for credential handling.
//! See [`ApiCredential`] for the recommended patterns.

use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

use accord_core::{GuidanceCandidate, NegotiationContext, ProviderId};

mod factory;
pub mod payload;
pub mod secrets;

#[cfg(any(feature = "gemini", feature = "openai"))]
mod http;

#[cfg(feature = "gemini")]
mod gemini;

#[cfg(feature = "openai")]
mod openai;

pub use factory::{CapabilityFactory, CapabilityRegistry};
pub use secrets::{ApiCredential, CredentialSource};

#[cfg(feature = "gemini")]
pub use gemini::{GeminiCapabilityFactory, GeminiProvider, DEFAULT_GEMINI_MODEL, GEMINI_API_KEY_ENVS};

#[cfg(feature = "openai")]
pub use openai::{OpenAiCapabilityFactory, OpenAiProvider, DEFAULT_OPENAI_MODEL, OPENAI_API_KEY_ENVS};

/// Errors from guidance providers.
///
/// These are recorded against the provider's health and never surfaced to
/// callers of the orchestrator.
#[derive(Error, Debug, Clone)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    HttpError(String),

    #[error("Rate limit exceeded, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    ParseError(String),

    #[error("Empty response from provider")]
    EmptyResponse,

    #[error("Authentication failed")]
    AuthError,

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),
}

impl ProviderError {
    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::HttpError(_)
            | ProviderError::RateLimited { .. }
            | ProviderError::Timeout(_) => true,
            ProviderError::ApiError { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// A provider able to produce a guidance candidate.
///
/// `Ok(None)` means the provider answered but returned no structured
/// payload. The orchestrator counts that against the provider like any
/// other rejected output.
#[async_trait]
pub trait GuidanceCapability: Send + Sync {
    /// Which provider this capability serves.
    fn provider(&self) -> ProviderId;

    /// Model identifier reported in produced guidance.
    fn model(&self) -> &str;

    /// Produce a candidate for a validated context.
    async fn generate(
        &self,
        context: &NegotiationContext,
        prompt_override: Option<&str>,
    ) -> Result<Option<GuidanceCandidate>, ProviderError>;
}

/// Transport retry for provider requests.
///
/// Transient errors (transport failures, rate limits, 5xx) are retried at
/// most twice with exponential backoff. Anything else is returned at once.
pub async fn retry_transient<T, F, Fut>(request: F) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let backoff = ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(250))
        .with_max_times(2);

    request
        .retry(backoff)
        .when(ProviderError::is_transient)
        .notify(|err: &ProviderError, after: Duration| {
            tracing::debug!(error = %err, retry_in = ?after, "Retrying provider request");
        })
        .await
}
