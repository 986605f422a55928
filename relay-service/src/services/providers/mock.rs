//! Mock provider implementation for testing.

use super::{FinishReason, GenerationParams, ProviderError, ProviderResponse, TextProvider};
use async_trait::async_trait;
use service_core::error::UpstreamPayload;
use reqwest::StatusCode;
use std::sync::Mutex;

/// What the mock does when asked to generate.
#[derive(Debug, Clone)]
pub enum MockOutcome {
    Reply(String),
    Upstream {
        status: StatusCode,
        payload: UpstreamPayload,
    },
    Network(String),
    Other(String),
}

/// Mock text provider that returns a scripted outcome and records every
/// prompt and parameter set it receives.
pub struct MockTextProvider {
    outcome: MockOutcome,
    calls: Mutex<Vec<(String, GenerationParams)>>,
}

impl MockTextProvider {
    pub fn new(outcome: MockOutcome) -> Self {
        Self {
            outcome,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn replying(text: impl Into<String>) -> Self {
        Self::new(MockOutcome::Reply(text.into()))
    }

    /// Prompts received so far, oldest first.
    pub fn prompts(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .map(|(prompt, _)| prompt)
            .collect()
    }

    fn scripted_error(&self) -> Option<ProviderError> {
        match &self.outcome {
            MockOutcome::Reply(_) => None,
            MockOutcome::Upstream { status, payload } => Some(ProviderError::Upstream {
                status: *status,
                payload: payload.clone(),
            }),
            MockOutcome::Network(msg) => Some(ProviderError::Network(msg.clone())),
            MockOutcome::Other(msg) => Some(ProviderError::Other(anyhow::anyhow!(msg.clone()))),
        }
    }

    pub fn calls(&self) -> Vec<(String, GenerationParams)> {
        match self.calls.lock() {
            Ok(calls) => calls.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl TextProvider for MockTextProvider {
    async fn generate(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<ProviderResponse, ProviderError> {
        match self.calls.lock() {
            Ok(mut calls) => calls.push((prompt.to_string(), params.clone())),
            Err(poisoned) => poisoned
                .into_inner()
                .push((prompt.to_string(), params.clone())),
        }

        if let Some(err) = self.scripted_error() {
            return Err(err);
        }

        let text = match &self.outcome {
            MockOutcome::Reply(text) => text.clone(),
            _ => String::new(),
        };

        Ok(ProviderResponse {
            input_tokens: prompt.len() as i32 / 4,
            output_tokens: text.len() as i32 / 4,
            text,
            finish_reason: FinishReason::Complete,
        })
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        match self.scripted_error() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
