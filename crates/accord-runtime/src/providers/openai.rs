//! OpenAI chat completions provider.
//!
//! Requests JSON mode, so the message content must be a JSON object. An
//! empty or unparsable answer is an error.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

use accord_core::{resolve_prompt, GuidanceCandidate, NegotiationContext, ProviderId, SYSTEM_PROMPT};

use super::{
    factory::CapabilityFactory, http, retry_transient, secrets::ApiCredential, GuidanceCapability,
    ProviderError,
};
use crate::config::ProviderSettings;

/// Environment variables checked for the API key, in order.
pub const OPENAI_API_KEY_ENVS: &[&str] = &["OPENAI_API_KEY"];

/// Model used when none is configured.
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// OpenAI guidance provider.
pub struct OpenAiProvider {
    credential: ApiCredential,
    model: String,
    model_id: String,
    base_url: String,
    temperature: f32,
    max_tokens: u32,
    client: reqwest::Client,
}

impl std::fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("credential", &self.credential)
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl OpenAiProvider {
    /// Create a provider with an explicit credential and the default model.
    pub fn new(credential: ApiCredential) -> Result<Self, ProviderError> {
        Ok(Self {
            credential,
            model: DEFAULT_OPENAI_MODEL.to_string(),
            model_id: model_id(DEFAULT_OPENAI_MODEL),
            base_url: DEFAULT_BASE_URL.to_string(),
            temperature: 0.2,
            max_tokens: 1024,
            client: http::build_client()?,
        })
    }

    /// Create from settings, falling back to the environment for the key.
    pub fn from_settings(settings: &ProviderSettings) -> Result<Self, ProviderError> {
        let credential = ApiCredential::resolve(
            settings.api_key.as_deref(),
            OPENAI_API_KEY_ENVS,
            "OpenAI API key",
        )?;

        let mut provider = Self::new(credential)?;
        if let Some(model) = &settings.model {
            provider = provider.with_model(model);
        }
        if let Some(url) = &settings.base_url {
            provider = provider.with_base_url(url);
        }
        Ok(provider)
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self.model_id = model_id(&self.model);
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    fn request(&self, prompt: &str) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(prompt)],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            response_format: ResponseFormat {
                type_: "json_object".to_string(),
            },
        }
    }

    async fn send(&self, request: &ChatRequest) -> Result<Option<String>, ProviderError> {
        // Only expose the credential here, at the point of use
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(self.credential.expose())
            .json(request)
            .send()
            .await
            .map_err(http::send_error)?;

        let body: ChatResponse = http::check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;

        Ok(body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content))
    }
}

fn model_id(model: &str) -> String {
    format!("openai:{}", model)
}

/// A chat message for completion requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatMessage {
    /// Role: "system", "user", or "assistant"
    role: String,

    #[serde(default)]
    content: Option<String>,
}

impl ChatMessage {
    fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: Some(content.into()),
        }
    }

    fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: Some(content.into()),
        }
    }
}

/// Chat completions request format.
#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    type_: String,
}

/// Chat completions response format.
#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
}

fn parse_content(content: Option<String>) -> Result<GuidanceCandidate, ProviderError> {
    let content = content
        .filter(|c| !c.trim().is_empty())
        .ok_or(ProviderError::EmptyResponse)?;

    serde_json::from_str(&content).map_err(|e| {
        tracing::error!(provider = "openai", error = %e, "Failed to parse JSON response");
        ProviderError::ParseError(format!("Invalid JSON from OpenAI: {}", e))
    })
}

#[async_trait]
impl GuidanceCapability for OpenAiProvider {
    fn provider(&self) -> ProviderId {
        ProviderId::OpenAi
    }

    fn model(&self) -> &str {
        &self.model_id
    }

    async fn generate(
        &self,
        context: &NegotiationContext,
        prompt_override: Option<&str>,
    ) -> Result<Option<GuidanceCandidate>, ProviderError> {
        let prompt = resolve_prompt(context, prompt_override);
        let request = self.request(&prompt);

        let started = Instant::now();
        let content = retry_transient(|| self.send(&request)).await?;
        let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        let candidate = parse_content(content)?;
        Ok(Some(candidate.with_origin(&self.model_id, latency_ms, prompt)))
    }
}

/// Factory registered under the `openai` feature.
pub struct OpenAiCapabilityFactory;

impl CapabilityFactory for OpenAiCapabilityFactory {
    fn provider(&self) -> ProviderId {
        ProviderId::OpenAi
    }

    fn create(
        &self,
        settings: &ProviderSettings,
    ) -> Result<Arc<dyn GuidanceCapability>, ProviderError> {
        Ok(Arc::new(OpenAiProvider::from_settings(settings)?))
    }

    fn description(&self) -> &'static str {
        "OpenAI chat completions in JSON mode"
    }
}
