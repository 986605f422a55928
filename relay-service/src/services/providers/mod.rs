//! Text generation provider abstraction.
//!
//! The relay talks to its model through [`TextProvider`], so the HTTP layer
//! can run against Gemini in production and a scripted mock in tests.

pub mod gemini;
pub mod mock;

use async_trait::async_trait;
use reqwest::StatusCode;
use service_core::error::{AppError, UpstreamPayload};
use thiserror::Error;

/// Failure of a provider call, classified at the point the call is made.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// The provider answered with a non-success status.
    #[error("API error {status}: {payload}")]
    Upstream {
        status: StatusCode,
        payload: UpstreamPayload,
    },

    /// No response was obtained from the provider.
    #[error("Network error: {0}")]
    Network(String),

    /// Anything else: unreadable responses, blocked prompts, bad setup.
    #[error("Unexpected error: {0}")]
    Other(#[from] anyhow::Error),
}

impl From<ProviderError> for AppError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Upstream { status, payload } => AppError::Upstream { status, payload },
            ProviderError::Network(msg) => AppError::NetworkError(msg),
            ProviderError::Other(err) => AppError::InternalError(err),
        }
    }
}

/// Result of a provider response.
#[derive(Debug, Clone)]
pub struct ProviderResponse {
    pub text: String,

    /// Input tokens consumed.
    pub input_tokens: i32,

    /// Output tokens generated.
    pub output_tokens: i32,

    pub finish_reason: FinishReason,
}

/// Reason why generation stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    Complete,
    Length,
    ContentFilter,
    Other,
}

/// Sampling parameters sent with every generation request.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationParams {
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: i32,
    pub max_output_tokens: i32,
    pub response_mime_type: String,
}

impl GenerationParams {
    /// The fixed parameters the relay uses for every prompt. Nothing in an
    /// incoming request can change them.
    pub fn relay_defaults() -> Self {
        Self {
            temperature: 1.0,
            top_p: 0.95,
            top_k: 64,
            max_output_tokens: 8192,
            response_mime_type: "text/plain".to_string(),
        }
    }
}

/// Trait for text generation providers (e.g., Gemini).
#[async_trait]
pub trait TextProvider: Send + Sync {
    /// Generate a reply to `prompt` in a fresh conversation with no history.
    async fn generate(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<ProviderResponse, ProviderError>;

    /// Health check.
    async fn health_check(&self) -> Result<(), ProviderError>;
}
