//! Provider identities.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// The closed set of guidance providers.
///
/// `Gemini` is the primary provider and `OpenAi` the secondary. `Fallback`
/// is the deterministic generator: always available and never health-tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderId {
    Gemini,
    #[serde(rename = "openai")]
    OpenAi,
    #[serde(alias = "stub")]
    Fallback,
}

impl ProviderId {
    /// Providers backed by a real model, in default try-order.
    pub const TRACKED: [ProviderId; 2] = [ProviderId::Gemini, ProviderId::OpenAi];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::Gemini => "gemini",
            ProviderId::OpenAi => "openai",
            ProviderId::Fallback => "fallback",
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, ProviderId::Fallback)
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown provider name.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown provider '{0}': expected gemini, openai or fallback")]
pub struct UnknownProvider(pub String);

impl FromStr for ProviderId {
    type Err = UnknownProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemini" => Ok(ProviderId::Gemini),
            "openai" | "chatgpt" => Ok(ProviderId::OpenAi),
            "fallback" | "stub" => Ok(ProviderId::Fallback),
            other => Err(UnknownProvider(other.to_string())),
        }
    }
}
