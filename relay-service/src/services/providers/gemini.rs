//! Gemini provider implementation.
//!
//! Talks to the Gemini `generateContent` REST method. Each call to
//! [`TextProvider::generate`] opens a new [`ChatSession`] with an empty
//! history, so no context is ever shared between prompts.

use super::{FinishReason, GenerationParams, ProviderError, ProviderResponse, TextProvider};
use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use service_core::error::UpstreamPayload;
use service_core::observability::TracedClientExt;

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Gemini provider configuration.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
}

/// Gemini text provider.
pub struct GeminiTextProvider {
    config: GeminiConfig,
    client: Client,
}

impl GeminiTextProvider {
    pub fn new(config: GeminiConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { config, client })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Start a conversation with no prior turns.
    pub fn start_chat(&self, params: &GenerationParams) -> ChatSession<'_> {
        ChatSession {
            provider: self,
            generation_config: GenerationConfig::from(params),
            history: Vec::new(),
        }
    }

    /// Build the API URL for the given model and method.
    fn api_url(&self, method: &str) -> String {
        format!(
            "{}/models/{}:{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.model,
            method
        )
    }

    async fn generate_content(
        &self,
        request: &GenerateContentRequest<'_>,
    ) -> Result<GenerateContentResponse, ProviderError> {
        let response = self
            .client
            .traced_post(&self.api_url("generateContent"))
            .header(API_KEY_HEADER, &self.config.api_key)
            .json(request)
            .send()
            .await
            .map_err(classify_send_error)?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        if !status.is_success() {
            return Err(ProviderError::Upstream {
                status,
                payload: UpstreamPayload::from_body(body),
            });
        }

        serde_json::from_str(&body)
            .with_context(|| format!("Failed to parse Gemini response: {}", body))
            .map_err(ProviderError::Other)
    }
}

/// A single conversation with the model.
///
/// Turns are only recorded once the model has answered, so a failed
/// `send_message` leaves the history as it was.
pub struct ChatSession<'a> {
    provider: &'a GeminiTextProvider,
    generation_config: GenerationConfig,
    history: Vec<Content>,
}

impl ChatSession<'_> {
    /// Number of recorded turns, user and model combined.
    pub fn turns(&self) -> usize {
        self.history.len()
    }

    pub async fn send_message(&mut self, text: &str) -> Result<ProviderResponse, ProviderError> {
        let mut contents = self.history.clone();
        contents.push(Content::user(text));

        let request = GenerateContentRequest {
            contents: &contents,
            generation_config: &self.generation_config,
        };

        tracing::debug!(
            model = %self.provider.config.model,
            prompt_len = text.len(),
            turns = contents.len(),
            "Sending request to Gemini API"
        );

        let api_response = self.provider.generate_content(&request).await?;

        if let Some(reason) = api_response
            .prompt_feedback
            .as_ref()
            .and_then(|f| f.block_reason.as_deref())
        {
            return Err(ProviderError::Other(anyhow::anyhow!(
                "Prompt was blocked: {}",
                reason
            )));
        }

        let candidate = api_response
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::Other(anyhow::anyhow!("Gemini returned no candidates")))?;

        let finish_reason = match candidate.finish_reason.as_deref() {
            Some("STOP") | None => FinishReason::Complete,
            Some("MAX_TOKENS") => FinishReason::Length,
            Some("SAFETY") | Some("RECITATION") | Some("BLOCKLIST")
            | Some("PROHIBITED_CONTENT") | Some("SPII") => FinishReason::ContentFilter,
            Some(_) => FinishReason::Other,
        };

        if finish_reason == FinishReason::ContentFilter {
            return Err(ProviderError::Other(anyhow::anyhow!(
                "Candidate was blocked due to {}",
                candidate.finish_reason.unwrap_or_default()
            )));
        }

        let reply = candidate.content.unwrap_or_else(|| Content {
            role: Some("model".to_string()),
            parts: Vec::new(),
        });
        let text = reply.text();

        let usage = api_response.usage_metadata.unwrap_or_default();

        contents.push(reply);
        self.history = contents;

        Ok(ProviderResponse {
            text,
            input_tokens: usage.prompt_token_count.unwrap_or(0),
            output_tokens: usage.candidates_token_count.unwrap_or(0),
            finish_reason,
        })
    }
}

#[async_trait]
impl TextProvider for GeminiTextProvider {
    async fn generate(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<ProviderResponse, ProviderError> {
        self.start_chat(params).send_message(prompt).await
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        if self.config.api_key.is_empty() {
            return Err(ProviderError::Other(anyhow::anyhow!(
                "Gemini API key not configured"
            )));
        }

        // Listing models verifies both reachability and the key.
        let url = format!("{}/models", self.config.base_url.trim_end_matches('/'));

        let response = self
            .client
            .traced_get(&url)
            .header(API_KEY_HEADER, &self.config.api_key)
            .send()
            .await
            .map_err(classify_send_error)?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(ProviderError::Upstream {
                status,
                payload: UpstreamPayload::from_body(body),
            })
        }
    }
}

/// Requests that could not even be built point at bad configuration;
/// everything else failed on the wire.
fn classify_send_error(err: reqwest::Error) -> ProviderError {
    if err.is_builder() {
        ProviderError::Other(anyhow::Error::new(err).context("Invalid Gemini request"))
    } else {
        ProviderError::Network(err.to_string())
    }
}

// ============================================================================
// Gemini API Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: &'a [Content],
    generation_config: &'a GenerationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

impl Content {
    fn user(text: &str) -> Self {
        Self {
            role: Some("user".to_string()),
            parts: vec![Part {
                text: Some(text.to_string()),
            }],
        }
    }

    /// All text parts joined in order; non-text parts are skipped.
    fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    top_k: i32,
    max_output_tokens: i32,
    response_mime_type: String,
}

impl From<&GenerationParams> for GenerationConfig {
    fn from(params: &GenerationParams) -> Self {
        Self {
            temperature: params.temperature,
            top_p: params.top_p,
            top_k: params.top_k,
            max_output_tokens: params.max_output_tokens,
            response_mime_type: params.response_mime_type.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    prompt_token_count: Option<i32>,
    candidates_token_count: Option<i32>,
}
