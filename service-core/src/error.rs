use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

pub const NETWORK_ERROR_MESSAGE: &str = "Network Error";
pub const INTERNAL_ERROR_MESSAGE: &str = "Internal Server Error";

/// Body of an upstream error response.
#[derive(Debug, Clone, PartialEq)]
pub enum UpstreamPayload {
    /// The body parsed as JSON; relayed as JSON, including bare strings.
    Json(serde_json::Value),
    /// The body was not JSON; relayed byte-for-byte as text.
    Text(String),
}

impl UpstreamPayload {
    /// Classify a raw upstream body.
    pub fn from_body(body: String) -> Self {
        match serde_json::from_str(&body) {
            Ok(value) => UpstreamPayload::Json(value),
            Err(_) => UpstreamPayload::Text(body),
        }
    }
}

impl From<serde_json::Value> for UpstreamPayload {
    fn from(value: serde_json::Value) -> Self {
        UpstreamPayload::Json(value)
    }
}

impl fmt::Display for UpstreamPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpstreamPayload::Json(value) => write!(f, "{}", value),
            UpstreamPayload::Text(text) => f.write_str(text),
        }
    }
}

impl IntoResponse for UpstreamPayload {
    fn into_response(self) -> Response {
        match self {
            UpstreamPayload::Json(value) => Json(value).into_response(),
            UpstreamPayload::Text(text) => text.into_response(),
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    /// An upstream service answered with an error of its own. The status and
    /// payload are relayed to the caller untouched.
    #[error("Upstream error {status}: {payload}")]
    Upstream {
        status: StatusCode,
        payload: UpstreamPayload,
    },

    /// The upstream call failed before any response was received.
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Internal server error: {0}")]
    InternalError(#[from] anyhow::Error),

    #[error("Configuration error: {0}")]
    ConfigError(anyhow::Error),
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(anyhow::Error::new(err))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::InternalError(anyhow::Error::new(err))
    }
}

#[derive(Serialize)]
struct MessageResponse {
    message: &'static str,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Upstream { status, payload } => {
                tracing::error!(status = %status, payload = %payload, "API error");
                (status, payload).into_response()
            }
            AppError::NetworkError(msg) => {
                tracing::error!(error = %msg, "Network error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(MessageResponse {
                        message: NETWORK_ERROR_MESSAGE,
                    }),
                )
                    .into_response()
            }
            AppError::InternalError(err) => {
                tracing::error!(error = %format!("{:#}", err), "Unexpected error");
                internal_error_response()
            }
            AppError::ConfigError(err) => {
                tracing::error!(error = %err, "Configuration error");
                internal_error_response()
            }
        }
    }
}

fn internal_error_response() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(MessageResponse {
            message: INTERNAL_ERROR_MESSAGE,
        }),
    )
        .into_response()
}
