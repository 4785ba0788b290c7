//! Guidance values: unvalidated provider candidates and accepted guidance.

use serde::{de, Deserialize, Deserializer, Serialize};

/// Confidence assumed when a model omits the field.
pub const DEFAULT_PROVIDER_CONFIDENCE: f64 = 0.6;

fn default_confidence() -> f64 {
    DEFAULT_PROVIDER_CONFIDENCE
}

/// A guidance result as produced by a provider, before quality checks.
///
/// Deserializes from the JSON object models are asked to return
/// (`fallbackRecommendation`, `talkingPoints`, ...). Provenance fields are not
/// part of the model payload; providers fill them in with [`with_origin`].
///
/// [`with_origin`]: GuidanceCandidate::with_origin
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuidanceCandidate {
    #[serde(default)]
    pub summary: String,

    #[serde(default)]
    pub fallback_recommendation: String,

    #[serde(default, deserialize_with = "deserialize_text_items")]
    pub talking_points: Vec<String>,

    #[serde(default, deserialize_with = "deserialize_text_items")]
    pub risk_callouts: Vec<String>,

    #[serde(default = "default_confidence", deserialize_with = "deserialize_confidence")]
    pub confidence: f64,

    #[serde(default)]
    pub documentation_url: Option<String>,

    #[serde(skip)]
    pub model: String,

    #[serde(skip)]
    pub latency_ms: u64,

    #[serde(skip)]
    pub generated_prompt: String,

    #[serde(skip)]
    pub cached: bool,
}

impl GuidanceCandidate {
    /// Record which model produced this candidate, how long it took and the
    /// exact prompt that was sent.
    pub fn with_origin(
        mut self,
        model: impl Into<String>,
        latency_ms: u64,
        prompt: impl Into<String>,
    ) -> Self {
        self.model = model.into();
        self.latency_ms = latency_ms;
        self.generated_prompt = prompt.into();
        self
    }
}

/// Models sometimes emit numbers or booleans in string lists. Scalars are
/// rendered as text and `null` items are skipped.
fn deserialize_text_items<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let items: Option<Vec<serde_json::Value>> = Option::deserialize(deserializer)?;

    Ok(items
        .unwrap_or_default()
        .into_iter()
        .filter_map(|item| match item {
            serde_json::Value::Null => None,
            serde_json::Value::String(text) => Some(text),
            other => Some(other.to_string()),
        })
        .collect())
}

/// Accepts a number or a numeric string; `null` means the default.
fn deserialize_confidence<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrText {
        Number(f64),
        Text(String),
    }

    match Option::<NumberOrText>::deserialize(deserializer)? {
        None => Ok(DEFAULT_PROVIDER_CONFIDENCE),
        Some(NumberOrText::Number(value)) => Ok(value),
        Some(NumberOrText::Text(text)) => text
            .trim()
            .parse()
            .map_err(|_| de::Error::custom(format!("invalid confidence: {:?}", text))),
    }
}

/// Negotiation guidance returned to the caller.
///
/// The orchestrator only ever returns values produced by the
/// [`OutputValidator`](crate::validation::OutputValidator) or the
/// [`FallbackGenerator`](crate::fallback::FallbackGenerator), so the quality
/// contract (summary of at least 10 characters, at least one talking point,
/// confidence within `[0.0, 1.0]`) holds for every returned value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Guidance {
    /// High-level negotiation summary
    pub summary: String,

    /// Recommended fallback if the target position is unattainable
    pub fallback_recommendation: String,

    /// Ordered arguments to use in the negotiation
    pub talking_points: Vec<String>,

    /// Risks to monitor or escalate (may be empty)
    pub risk_callouts: Vec<String>,

    /// Confidence between 0 and 1
    pub confidence: f64,

    /// Originating model identifier (e.g. `gemini:gemini-1.5-flash-latest`)
    pub model: String,

    /// End-to-end provider latency
    pub latency_ms: u64,

    /// Whether the result was served from a provider-local cache
    pub cached: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documentation_url: Option<String>,

    /// The exact prompt used
    pub generated_prompt: String,
}
