//! Prompt construction for guidance providers.
//!
//! Every provider receives the same structured prompt so that results are
//! comparable across failover, and so that the fallback can report the prompt
//! a model would have seen.

use crate::context::NegotiationContext;

/// System message for chat-style providers.
pub const SYSTEM_PROMPT: &str = "You are a negotiation co-pilot. Return ONLY valid JSON.";

/// Shape of the JSON object providers must return.
pub const RESPONSE_SCHEMA: &str = r#"{"summary": str, "fallbackRecommendation": str, "talkingPoints": [str], "riskCallouts": [str], "confidence": float, "documentationUrl": str | null}"#;

/// A caller's prompt override, trimmed. Blank overrides count as absent.
pub fn normalize_override(prompt_override: Option<&str>) -> Option<&str> {
    prompt_override.map(str::trim).filter(|p| !p.is_empty())
}

/// The prompt a provider sends: the override when one is given, else the
/// structured prompt for `context`.
pub fn resolve_prompt(context: &NegotiationContext, prompt_override: Option<&str>) -> String {
    normalize_override(prompt_override).map_or_else(|| build_prompt(context), str::to_string)
}

/// Build the structured prompt for a validated context.
pub fn build_prompt(context: &NegotiationContext) -> String {
    let stakeholders = if context.stakeholders.is_empty() {
        "None listed".to_string()
    } else {
        context.stakeholders.join(", ")
    };

    let mut sections = vec![
        "You are a contract negotiation co-pilot. Produce a JSON object matching the schema:"
            .to_string(),
        RESPONSE_SCHEMA.to_string(),
        "Context for the negotiation follows:".to_string(),
        format!("- Topic: {}", context.topic),
        format!("- Current Position: {}", context.current_position),
        format!("- Target Position: {}", context.target_position),
        format!(
            "- Fallback Position: {}",
            context.fallback_position.as_deref().unwrap_or("None provided")
        ),
        format!("- Stakeholders: {}", stakeholders),
        format!("- Impact: {}", context.impact.as_deref().unwrap_or("Unspecified")),
        format!(
            "- Risk Signal: {}",
            context.risk_signal.as_deref().unwrap_or("Not flagged")
        ),
    ];

    if let Some(vertical) = &context.vertical {
        sections.push(format!("- Vertical: {}", vertical));
    }

    if let Some(metadata) = context.metadata.as_ref().filter(|m| !m.is_empty()) {
        // Value maps serialize with sorted keys
        if let Ok(value) = serde_json::to_value(metadata) {
            sections.push(format!("- Additional Metadata: {}", value));
        }
    }

    sections.push(
        "Return only valid JSON. Confidence must be between 0 and 1. \
         Keep talkingPoints actionable and concise, favouring no more than 3 items."
            .to_string(),
    );

    sections.join("\n")
}
