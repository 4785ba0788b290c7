//! Deterministic fallback guidance.
//!
//! Used when every model-backed provider is skipped or fails. The generator
//! performs no I/O and cannot fail: its output is a pure function of the
//! validated context and the optional prompt override.

use crate::context::NegotiationContext;
use crate::guidance::Guidance;
use crate::prompts::resolve_prompt;
use crate::validation::MIN_FALLBACK_CHARS;

/// Confidence reported by fallback guidance.
pub const FALLBACK_CONFIDENCE: f64 = 0.55;

/// Model identifier reported by fallback guidance.
pub const FALLBACK_MODEL: &str = "fallback:deterministic";

/// Best-effort guidance that is never model-backed.
#[derive(Debug, Clone, Copy, Default)]
pub struct FallbackGenerator;

impl FallbackGenerator {
    pub fn new() -> Self {
        Self
    }

    /// Produce guidance for an already-validated context.
    pub fn generate(&self, context: &NegotiationContext, prompt_override: Option<&str>) -> Guidance {
        let topic = context.topic.to_lowercase();

        let summary = format!(
            "Position the conversation around {} by contrasting the current supplier stance \
             with the desired target outcome. Highlight business impact and align stakeholders \
             on the recommended fallback if resistance emerges.",
            topic
        );

        let mut talking_points = vec![
            format!("Reinforce target position: {}", context.target_position),
            "Clarify business impact and risk trade-offs".to_string(),
            "Offer data-backed precedent to support concessions".to_string(),
        ];
        if !context.stakeholders.is_empty() {
            talking_points.push(format!(
                "Align {} on the fallback position before the next round",
                context.stakeholders.join(", ")
            ));
        }

        let risk_callouts = match &context.risk_signal {
            Some(signal) => vec![
                format!("Monitor {} risk for {}", signal.to_lowercase(), topic),
                "Escalate to legal if supplier resists fallback".to_string(),
            ],
            None => vec!["Track negotiation outcome for playbook learning".to_string()],
        };

        Guidance {
            summary,
            fallback_recommendation: fallback_recommendation(context),
            talking_points,
            risk_callouts,
            confidence: FALLBACK_CONFIDENCE,
            model: FALLBACK_MODEL.to_string(),
            latency_ms: 0,
            cached: false,
            documentation_url: None,
            generated_prompt: resolve_prompt(context, prompt_override),
        }
    }
}

/// The stated fallback position, else the target position. Very short
/// positions (e.g. "99%") are phrased so the recommendation still meets the
/// minimum length every returned guidance honours.
fn fallback_recommendation(context: &NegotiationContext) -> String {
    let position = context
        .fallback_position
        .as_deref()
        .filter(|p| !p.trim().is_empty())
        .unwrap_or(context.target_position.as_str());

    if position.trim().chars().count() < MIN_FALLBACK_CHARS {
        format!("Fall back to {}", position.trim())
    } else {
        position.to_string()
    }
}
