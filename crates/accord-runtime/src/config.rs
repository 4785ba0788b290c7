//! Runtime configuration.
//!
//! Configuration is read from YAML, then selected values can be overridden
//! from the environment. Durations are whole seconds in files and
//! human-readable strings (`15s`, `2m`) in the environment.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::resilience::CircuitBreakerConfig;

/// Default bound on a single provider call.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(20);

/// Errors loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid value for {key} ({value:?}): {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
}

/// Top-level runtime configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Circuit breaker thresholds shared by every tracked provider
    pub circuit_breaker: CircuitBreakerConfig,

    /// Bound on a single provider call (in seconds)
    #[serde(with = "duration_secs")]
    pub call_timeout: Duration,

    /// Provider-local result cache
    pub cache: CacheConfig,

    /// Per-provider settings
    pub providers: ProvidersConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            circuit_breaker: CircuitBreakerConfig::default(),
            call_timeout: DEFAULT_CALL_TIMEOUT,
            cache: CacheConfig::default(),
            providers: ProvidersConfig::default(),
        }
    }
}

/// Cache settings for provider results.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,

    pub max_entries: u64,

    /// Entry lifetime (in seconds)
    #[serde(with = "duration_secs")]
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: 1_000,
            ttl: Duration::from_secs(300),
        }
    }
}

/// Settings for each model-backed provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub gemini: ProviderSettings,
    pub openai: ProviderSettings,
}

/// Settings for one provider. Unset fields fall back to the provider's own
/// defaults and, for the API key, to its environment variables.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    pub enabled: bool,

    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    pub model: Option<String>,

    pub base_url: Option<String>,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            api_key: None,
            model: None,
            base_url: None,
        }
    }
}

impl fmt::Debug for ProviderSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderSettings")
            .field("enabled", &self.enabled)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl RuntimeConfig {
    /// Parse configuration from YAML text.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Read configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&yaml)
    }

    /// Load from an optional file, then apply process environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup`, which maps a variable name to its value.
    ///
    /// Recognised variables: `ACCORD_CALL_TIMEOUT`, `ACCORD_RECOVERY_TIMEOUT`,
    /// `ACCORD_FAILURE_THRESHOLD`, `ACCORD_SUCCESS_THRESHOLD`,
    /// `ACCORD_CACHE_ENABLED`, `GEMINI_MODEL` (or `GEMINI_FLASH_MODEL`) and
    /// `OPENAI_MODEL`.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(value) = get("ACCORD_CALL_TIMEOUT") {
            self.call_timeout = parse_duration("ACCORD_CALL_TIMEOUT", &value)?;
        }
        if let Some(value) = get("ACCORD_RECOVERY_TIMEOUT") {
            self.circuit_breaker.recovery_timeout =
                parse_duration("ACCORD_RECOVERY_TIMEOUT", &value)?;
        }
        if let Some(value) = get("ACCORD_FAILURE_THRESHOLD") {
            self.circuit_breaker.failure_threshold = parse_value("ACCORD_FAILURE_THRESHOLD", &value)?;
        }
        if let Some(value) = get("ACCORD_SUCCESS_THRESHOLD") {
            self.circuit_breaker.success_threshold = parse_value("ACCORD_SUCCESS_THRESHOLD", &value)?;
        }
        if let Some(value) = get("ACCORD_CACHE_ENABLED") {
            self.cache.enabled = parse_value("ACCORD_CACHE_ENABLED", &value)?;
        }
        if let Some(model) = get("GEMINI_MODEL").or_else(|| get("GEMINI_FLASH_MODEL")) {
            self.providers.gemini.model = Some(model.trim().to_string());
        }
        if let Some(model) = get("OPENAI_MODEL") {
            self.providers.openai.model = Some(model.trim().to_string());
        }

        self.validate()?;
        Ok(self)
    }

    /// Reject settings that would make the breaker or the timeout meaningless.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let cb = &self.circuit_breaker;
        if cb.failure_threshold == 0 {
            return Err(invalid("circuit_breaker.failure_threshold", "0", "must be at least 1"));
        }
        if cb.success_threshold == 0 {
            return Err(invalid("circuit_breaker.success_threshold", "0", "must be at least 1"));
        }
        if self.call_timeout.is_zero() {
            return Err(invalid("call_timeout", "0", "must be greater than zero"));
        }
        Ok(())
    }
}

fn invalid(key: &str, value: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.into(),
    }
}

fn parse_duration(key: &str, value: &str) -> Result<Duration, ConfigError> {
    humantime::parse_duration(value.trim()).map_err(|e| invalid(key, value, e.to_string()))
}

fn parse_value<T>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| invalid(key, value, e.to_string()))
}

pub(crate) mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
