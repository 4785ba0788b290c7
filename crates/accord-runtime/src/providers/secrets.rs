//! Credential handling for guidance providers.
//!
//! API keys are wrapped in [`ApiCredential`] as soon as they are read, so
//! they cannot appear in `Debug` or `Display` output and are zeroed on drop.
//!
//! ## Usage
//!
//! ```ignore
//! use accord_runtime::providers::ApiCredential;
//!
//! // Configured key first, then the first non-empty environment variable
//! let cred = ApiCredential::resolve(
//!     settings.api_key.as_deref(),
//!     &["GEMINI_API_KEY", "GEMINI_FLASH_API_KEY"],
//!     "Gemini API key",
//! )?;
//!
//! // Use in HTTP header (explicit exposure)
//! request.header("x-goog-api-key", cred.expose());
//! ```

use secrecy::{ExposeSecret, SecretString};
use std::fmt;

use super::ProviderError;

/// Where a credential was loaded from.
///
/// Useful when debugging configuration without exposing the value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    /// Loaded from the configuration file
    Config,
    /// Loaded from an environment variable
    Environment,
    /// Provided programmatically
    Programmatic,
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialSource::Config => write!(f, "config"),
            CredentialSource::Environment => write!(f, "environment"),
            CredentialSource::Programmatic => write!(f, "programmatic"),
        }
    }
}

/// A securely-stored API credential.
///
/// - `Debug` and `Display` show `[REDACTED]`
/// - Memory is zeroed on drop via `secrecy`
/// - The value is only reachable through [`expose`](ApiCredential::expose)
pub struct ApiCredential {
    value: SecretString,
    source: CredentialSource,
    name: &'static str,
}

impl ApiCredential {
    /// Wrap a credential value.
    pub fn new(value: impl Into<String>, source: CredentialSource, name: &'static str) -> Self {
        Self {
            value: SecretString::from(value.into()),
            source,
            name,
        }
    }

    /// Resolve a credential from configuration, falling back to the process
    /// environment.
    ///
    /// `env_vars` are tried in order; blank values are ignored.
    pub fn resolve(
        configured: Option<&str>,
        env_vars: &[&str],
        name: &'static str,
    ) -> Result<Self, ProviderError> {
        Self::resolve_with(configured, env_vars, name, |var| std::env::var(var).ok())
    }

    /// Like [`resolve`](ApiCredential::resolve), reading variables through
    /// `lookup` instead of the process environment.
    pub fn resolve_with<F>(
        configured: Option<&str>,
        env_vars: &[&str],
        name: &'static str,
        lookup: F,
    ) -> Result<Self, ProviderError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = configured.map(str::trim).filter(|v| !v.is_empty()) {
            return Ok(Self::new(value, CredentialSource::Config, name));
        }

        for var in env_vars {
            if let Some(value) = lookup(*var).filter(|v| !v.trim().is_empty()) {
                return Ok(Self::new(value.trim(), CredentialSource::Environment, name));
            }
        }

        Err(ProviderError::NotConfigured(format!(
            "{} required: set 'api_key' in config or one of {} in the environment",
            name,
            env_vars.join(", ")
        )))
    }

    /// Expose the credential value for use in an API call.
    ///
    /// Only call this where the value is actually needed, e.g. when setting
    /// an HTTP header. Never store the exposed value.
    pub fn expose(&self) -> &str {
        self.value.expose_secret()
    }

    pub fn source(&self) -> CredentialSource {
        self.source
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Debug for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiCredential")
            .field("value", &"[REDACTED]")
            .field("source", &self.source)
            .field("name", &self.name)
            .finish()
    }
}

impl fmt::Display for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} from {} [REDACTED]", self.name, self.source)
    }
}
