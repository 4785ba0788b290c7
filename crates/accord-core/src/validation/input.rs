//! Input validation and sanitization for negotiation contexts.
//!
//! Sanitization here means trimming surrounding whitespace and bounding
//! length. Markup and control characters are passed through unchanged.

use thiserror::Error;

use super::schema::check_context_schema;
use crate::context::NegotiationContext;

/// Maximum length of any sanitized free-text field, in characters.
pub const MAX_FIELD_CHARS: usize = 10_000;

/// Errors raised for malformed or empty input. No provider is ever called
/// for a context that fails here.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InvalidInput {
    #[error("Invalid negotiation context: {}", .0.join("; "))]
    Schema(Vec<String>),

    #[error("Invalid negotiation context: {0}")]
    Malformed(String),

    #[error("Topic cannot be empty or whitespace")]
    EmptyTopic,

    #[error("Current position cannot be empty")]
    EmptyCurrentPosition,

    #[error("Target position cannot be empty")]
    EmptyTargetPosition,
}

/// Normalizes and rejects malformed requests before any provider is touched.
#[derive(Debug, Clone, Copy, Default)]
pub struct InputValidator;

impl InputValidator {
    pub fn new() -> Self {
        Self
    }

    /// Re-validate a typed context and return a sanitized copy.
    pub fn validate(&self, context: NegotiationContext) -> Result<NegotiationContext, InvalidInput> {
        let raw =
            serde_json::to_value(&context).map_err(|e| InvalidInput::Malformed(e.to_string()))?;
        check_context_schema(&raw).map_err(InvalidInput::Schema)?;

        if context.topic.trim().is_empty() {
            return Err(InvalidInput::EmptyTopic);
        }
        if context.current_position.trim().is_empty() {
            return Err(InvalidInput::EmptyCurrentPosition);
        }
        if context.target_position.trim().is_empty() {
            return Err(InvalidInput::EmptyTargetPosition);
        }

        Ok(sanitize_context(context))
    }

    /// Validate an untyped JSON value, e.g. a request body.
    pub fn validate_json(&self, raw: &serde_json::Value) -> Result<NegotiationContext, InvalidInput> {
        check_context_schema(raw).map_err(InvalidInput::Schema)?;
        let context: NegotiationContext = serde_json::from_value(raw.clone())
            .map_err(|e| InvalidInput::Malformed(e.to_string()))?;
        self.validate(context)
    }

    /// Validate a YAML document describing a context.
    pub fn validate_yaml(&self, yaml: &str) -> Result<NegotiationContext, InvalidInput> {
        let raw: serde_json::Value =
            serde_yaml::from_str(yaml).map_err(|e| InvalidInput::Malformed(e.to_string()))?;
        self.validate_json(&raw)
    }
}

fn sanitize_context(context: NegotiationContext) -> NegotiationContext {
    // Blank optionals mean "not provided"
    let sanitize_opt = |value: Option<String>| {
        value
            .map(|v| sanitize_text(&v))
            .filter(|v| !v.is_empty())
    };

    NegotiationContext {
        topic: sanitize_text(&context.topic),
        contract_id: sanitize_text(&context.contract_id),
        template_id: sanitize_text(&context.template_id),
        vertical: sanitize_opt(context.vertical),
        current_position: sanitize_text(&context.current_position),
        target_position: sanitize_text(&context.target_position),
        fallback_position: sanitize_opt(context.fallback_position),
        stakeholders: context
            .stakeholders
            .iter()
            .map(|name| sanitize_text(name))
            .filter(|name| !name.is_empty())
            .collect(),
        impact: sanitize_opt(context.impact),
        risk_signal: sanitize_opt(context.risk_signal),
        metadata: context.metadata,
    }
}

/// Trim surrounding whitespace and truncate to [`MAX_FIELD_CHARS`].
pub fn sanitize_text(text: &str) -> String {
    let trimmed = text.trim();

    match trimmed.char_indices().nth(MAX_FIELD_CHARS) {
        Some((cut, _)) => {
            tracing::warn!(
                original_chars = trimmed.chars().count(),
                max_chars = MAX_FIELD_CHARS,
                "Input truncated"
            );
            trimmed[..cut].to_string()
        }
        None => trimmed.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn valid_context() -> NegotiationContext {
        NegotiationContext::new(
            "SLA Enhancement",
            "test-123",
            "sla_enhancement",
            "99% uptime",
            "99.9% uptime",
        )
        .with_fallback_position("99.5% uptime")
    }

    #[test]
    fn test_valid_input_passes() {
        let validated = InputValidator::new().validate(valid_context()).unwrap();
        assert_eq!(validated.topic, "SLA Enhancement");
        assert_eq!(validated.current_position, "99% uptime");
        assert_eq!(validated.target_position, "99.9% uptime");
    }

    #[test]
    fn test_empty_topic_rejected() {
        let mut context = valid_context();
        context.topic = String::new();

        let err = InputValidator::new().validate(context).unwrap_err();
        assert_eq!(err, InvalidInput::EmptyTopic);
        assert!(err.to_string().contains("Topic cannot be empty"));
    }

    #[test]
    fn test_whitespace_topic_rejected() {
        let mut context = valid_context();
        context.topic = "   ".to_string();

        assert_eq!(
            InputValidator::new().validate(context),
            Err(InvalidInput::EmptyTopic)
        );
    }

    #[test]
    fn test_empty_positions_rejected() {
        let mut context = valid_context();
        context.current_position = "\t".to_string();
        assert_eq!(
            InputValidator::new().validate(context),
            Err(InvalidInput::EmptyCurrentPosition)
        );

        let mut context = valid_context();
        context.target_position = String::new();
        assert_eq!(
            InputValidator::new().validate(context),
            Err(InvalidInput::EmptyTargetPosition)
        );
    }

    #[test]
    fn test_trims_whitespace() {
        let mut context = valid_context();
        context.topic = "  SLA Enhancement  ".to_string();
        context.stakeholders = vec!["  Legal ".to_string(), "  ".to_string()];

        let validated = InputValidator::new().validate(context).unwrap();
        assert_eq!(validated.topic, "SLA Enhancement");
        assert_eq!(validated.stakeholders, vec!["Legal"]);
    }

    #[test]
    fn test_long_input_truncated() {
        let mut context = valid_context();
        context.current_position = "A".repeat(20_000);

        let validated = InputValidator::new().validate(context).unwrap();
        assert_eq!(validated.current_position.chars().count(), MAX_FIELD_CHARS);
    }

    #[test]
    fn test_markup_passes_through_unchanged() {
        let mut context = valid_context();
        context.topic = "SLA <script>alert('xss')</script>".to_string();
        context.current_position = "99% \n\r\t uptime".to_string();

        let validated = InputValidator::new().validate(context).unwrap();
        assert_eq!(validated.topic, "SLA <script>alert('xss')</script>");
        assert_eq!(validated.current_position, "99% \n\r\t uptime");
    }

    #[test]
    fn test_schema_violation_reported() {
        let mut context = valid_context();
        context.contract_id = String::new();
        context.topic = "T".repeat(200);

        match InputValidator::new().validate(context) {
            Err(InvalidInput::Schema(errors)) => assert_eq!(errors.len(), 2),
            other => panic!("expected schema error, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_json_rejects_wrong_types() {
        let raw = serde_json::json!({
            "topic": "SLA",
            "contract_id": "c-1",
            "template_id": "sla",
            "current_position": 99,
            "target_position": "99.9%"
        });

        assert!(matches!(
            InputValidator::new().validate_json(&raw),
            Err(InvalidInput::Schema(_))
        ));
    }

    #[test]
    fn test_validate_json_rejects_bad_dates() {
        let raw = serde_json::json!({
            "topic": "SLA",
            "contract_id": "c-1",
            "template_id": "sla",
            "current_position": "99%",
            "target_position": "99.9%",
            "metadata": { "renewal_date": "next spring" }
        });

        assert!(matches!(
            InputValidator::new().validate_json(&raw),
            Err(InvalidInput::Malformed(_))
        ));
    }

    #[test]
    fn test_validate_yaml() {
        let yaml = r#"
topic: "  Liability Caps "
contract_id: "c-77"
template_id: "liability_cap_negotiation"
current_position: "Uncapped"
target_position: "12 months of fees"
stakeholders: Legal
risk_signal: Elevated
"#;

        let validated = InputValidator::new().validate_yaml(yaml).unwrap();
        assert_eq!(validated.topic, "Liability Caps");
        assert_eq!(validated.stakeholders, vec!["Legal"]);
        assert_eq!(validated.risk_signal.as_deref(), Some("Elevated"));
    }

    #[test]
    fn test_blank_optionals_become_none() {
        let mut context = valid_context()
            .with_fallback_position("   ")
            .with_impact("  ")
            .with_risk_signal("\t");
        context.vertical = Some(" ".to_string());

        let validated = InputValidator::new().validate(context).unwrap();
        assert_eq!(validated.fallback_position, None);
        assert_eq!(validated.impact, None);
        assert_eq!(validated.risk_signal, None);
        assert_eq!(validated.vertical, None);

        let prompt = crate::build_prompt(&validated);
        assert!(prompt.contains("- Fallback Position: None provided"));
        assert!(prompt.contains("- Impact: Unspecified"));
    }

    #[test]
    fn test_truncation_counts_characters_not_bytes() {
        let text = "é".repeat(MAX_FIELD_CHARS + 5);
        let sanitized = sanitize_text(&text);
        assert_eq!(sanitized.chars().count(), MAX_FIELD_CHARS);
    }

    proptest! {
        #[test]
        fn prop_sanitized_text_is_bounded(text in "\\PC{0,200}", pad in 0usize..3) {
            let padded = format!("{}{}{}", " ".repeat(pad), text, "\n".repeat(pad));
            let sanitized = sanitize_text(&padded);

            prop_assert!(sanitized.chars().count() <= MAX_FIELD_CHARS);
            prop_assert_eq!(sanitized.as_str(), padded.trim());
        }

        #[test]
        fn prop_long_text_truncated(len in (MAX_FIELD_CHARS + 1)..(MAX_FIELD_CHARS + 500)) {
            let sanitized = sanitize_text(&"x".repeat(len));
            prop_assert_eq!(sanitized.chars().count(), MAX_FIELD_CHARS);
        }
    }
}
