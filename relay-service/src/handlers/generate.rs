use crate::services::providers::GenerationParams;
use crate::startup::AppState;
use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::{Deserialize, Serialize};
use service_core::error::AppError;

#[derive(Debug, Serialize, Deserialize)]
pub struct GenerateRequest {
    /// Forwarded as-is; an empty prompt is not rejected locally.
    pub prompt: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    pub generated_text: String,
}

/// `POST /generate-response`
///
/// Sends the prompt as the only message of a new chat and returns the
/// model's reply. Bodies that do not parse are treated like any other
/// unexpected failure.
pub async fn generate_response(
    State(state): State<AppState>,
    payload: Result<Json<GenerateRequest>, JsonRejection>,
) -> Result<Json<GenerateResponse>, AppError> {
    let Json(request) = payload.map_err(|rejection| {
        AppError::InternalError(anyhow::anyhow!(
            "Invalid request body: {}",
            rejection.body_text()
        ))
    })?;

    let params = GenerationParams::relay_defaults();
    let response = state
        .text_provider
        .generate(&request.prompt, &params)
        .await?;

    tracing::info!(
        generated_text = %response.text,
        input_tokens = response.input_tokens,
        output_tokens = response.output_tokens,
        finish_reason = ?response.finish_reason,
        "Generated response"
    );

    Ok(Json(GenerateResponse {
        generated_text: response.text,
    }))
}
