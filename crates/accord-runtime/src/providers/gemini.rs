//! Google Gemini provider.
//!
//! Calls the `generateContent` REST endpoint. Gemini answers with free text,
//! so the guidance object is extracted from it; an answer without a readable
//! object yields no candidate rather than an error.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

use accord_core::{resolve_prompt, GuidanceCandidate, NegotiationContext, ProviderId};

use super::{
    factory::CapabilityFactory,
    http,
    payload::extract_candidate,
    retry_transient,
    secrets::ApiCredential,
    GuidanceCapability, ProviderError,
};
use crate::config::ProviderSettings;

/// Environment variables checked for the API key, in order.
pub const GEMINI_API_KEY_ENVS: &[&str] = &["GEMINI_API_KEY", "GEMINI_FLASH_API_KEY"];

/// Model used when none is configured.
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash-latest";

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Sampling parameters sent with every request.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    top_k: u32,
    max_output_tokens: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 0.35,
            top_p: 0.95,
            top_k: 40,
            max_output_tokens: 768,
        }
    }
}

/// Gemini guidance provider.
pub struct GeminiProvider {
    credential: ApiCredential,
    model: String,
    model_id: String,
    base_url: String,
    generation: GenerationConfig,
    client: reqwest::Client,
}

impl std::fmt::Debug for GeminiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiProvider")
            .field("credential", &self.credential)
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl GeminiProvider {
    /// Create a provider with an explicit credential and the default model.
    pub fn new(credential: ApiCredential) -> Result<Self, ProviderError> {
        Ok(Self {
            credential,
            model: DEFAULT_GEMINI_MODEL.to_string(),
            model_id: model_id(DEFAULT_GEMINI_MODEL),
            base_url: DEFAULT_BASE_URL.to_string(),
            generation: GenerationConfig::default(),
            client: http::build_client()?,
        })
    }

    /// Create from settings, falling back to the environment for the key.
    pub fn from_settings(settings: &ProviderSettings) -> Result<Self, ProviderError> {
        let credential = ApiCredential::resolve(
            settings.api_key.as_deref(),
            GEMINI_API_KEY_ENVS,
            "Gemini API key",
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

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    async fn send(&self, request: &GeminiRequest) -> Result<String, ProviderError> {
        // Only expose the credential here, at the point of use
        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", self.credential.expose())
            .json(request)
            .send()
            .await
            .map_err(http::send_error)?;

        let body: GeminiResponse = http::check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;

        Ok(body.text())
    }
}

fn model_id(model: &str) -> String {
    format!("gemini:{}", model)
}

/// Gemini API request format.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

impl GeminiRequest {
    fn new(prompt: &str, generation: GenerationConfig) -> Self {
        Self {
            contents: vec![Content {
                role: "user".to_string(),
                parts: vec![Part {
                    text: Some(prompt.to_string()),
                }],
            }],
            generation_config: generation,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    role: String,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

/// Gemini API response format.
#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

impl GeminiResponse {
    /// Text of the first candidate, parts concatenated.
    fn text(self) -> String {
        self.candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|part| part.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl GuidanceCapability for GeminiProvider {
    fn provider(&self) -> ProviderId {
        ProviderId::Gemini
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
        let request = GeminiRequest::new(&prompt, self.generation);

        let started = Instant::now();
        let text = retry_transient(|| self.send(&request)).await?;
        let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        let candidate = extract_candidate(&text);
        if candidate.is_none() {
            tracing::warn!(
                provider = "gemini",
                topic = %context.topic,
                "Response missing structured payload"
            );
        }

        Ok(candidate.map(|c| c.with_origin(&self.model_id, latency_ms, prompt)))
    }
}

/// Factory registered under the `gemini` feature.
pub struct GeminiCapabilityFactory;

impl CapabilityFactory for GeminiCapabilityFactory {
    fn provider(&self) -> ProviderId {
        ProviderId::Gemini
    }

    fn create(
        &self,
        settings: &ProviderSettings,
    ) -> Result<Arc<dyn GuidanceCapability>, ProviderError> {
        Ok(Arc::new(GeminiProvider::from_settings(settings)?))
    }

    fn description(&self) -> &'static str {
        "Google Gemini via the generateContent API"
    }
}
