//! Negotiation context: the input to guidance generation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Key contract positions and signals used to generate negotiation guidance.
///
/// Values arriving from callers are untrusted until they pass
/// [`InputValidator`](crate::validation::InputValidator); the validator
/// returns a fresh, sanitized context and never mutates its input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NegotiationContext {
    /// Clause or topic name
    pub topic: String,

    /// Unique identifier for the contract
    pub contract_id: String,

    /// Template reference powering guidance
    pub template_id: String,

    /// Industry vertical tag
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vertical: Option<String>,

    /// Current clause language or supplier position
    pub current_position: String,

    /// Preferred counter-position for the customer
    pub target_position: String,

    /// Minimum acceptable position if the target cannot be achieved
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_position: Option<String>,

    /// Stakeholders who should be informed about the guidance
    #[serde(default, deserialize_with = "deserialize_stakeholders")]
    pub stakeholders: Vec<String>,

    /// Business impact level (e.g. "High")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub impact: Option<String>,

    /// Risk signal classification (e.g. "Elevated")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_signal: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<NegotiationMetadata>,
}

impl NegotiationContext {
    /// Create a context with the required fields set and everything else empty.
    pub fn new(
        topic: impl Into<String>,
        contract_id: impl Into<String>,
        template_id: impl Into<String>,
        current_position: impl Into<String>,
        target_position: impl Into<String>,
    ) -> Self {
        Self {
            topic: topic.into(),
            contract_id: contract_id.into(),
            template_id: template_id.into(),
            vertical: None,
            current_position: current_position.into(),
            target_position: target_position.into(),
            fallback_position: None,
            stakeholders: Vec::new(),
            impact: None,
            risk_signal: None,
            metadata: None,
        }
    }

    pub fn with_fallback_position(mut self, position: impl Into<String>) -> Self {
        self.fallback_position = Some(position.into());
        self
    }

    pub fn with_stakeholders<I, S>(mut self, stakeholders: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.stakeholders = stakeholders.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_impact(mut self, impact: impl Into<String>) -> Self {
        self.impact = Some(impact.into());
        self
    }

    pub fn with_risk_signal(mut self, risk_signal: impl Into<String>) -> Self {
        self.risk_signal = Some(risk_signal.into());
        self
    }

    pub fn with_metadata(mut self, metadata: NegotiationMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Supplemental contract attributes that give providers extra context.
///
/// Unknown keys are preserved in [`extra`](Self::extra).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NegotiationMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counterparty: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effective_date: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub renewal_date: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jurisdiction: Option<String>,

    /// Arbitrary metadata that may influence guidance generation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_context: Option<serde_json::Map<String, serde_json::Value>>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl NegotiationMetadata {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Accepts `null`, a single string, or a list of strings; blanks are dropped.
fn deserialize_stakeholders<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    let raw: Option<OneOrMany> = Option::deserialize(deserializer)?;
    let names = match raw {
        None => Vec::new(),
        Some(OneOrMany::One(name)) => vec![name],
        Some(OneOrMany::Many(names)) => names,
    };

    Ok(names
        .into_iter()
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .collect())
}
