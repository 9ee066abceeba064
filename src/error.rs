//! Error taxonomy for the payment service
//!
//! Configuration and auth failures abort the operation; initiation and query
//! failures are returned to the caller as structured responses so the UI can
//! render a message. Secrets and raw broker payloads never reach responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MpesaError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid payment request: {0}")]
    Validation(String),

    #[error("failed to get access token: {0}")]
    Auth(String),

    #[error("STK push failed: {0}")]
    Initiation(String),

    #[error("status query failed: {0}")]
    Query(String),

    #[error("malformed callback payload: {0}")]
    CallbackParse(String),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

impl IntoResponse for MpesaError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            MpesaError::Config(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Payment service is not configured".to_string(),
            ),
            MpesaError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            MpesaError::Auth(_) => (
                StatusCode::BAD_GATEWAY,
                "Failed to authenticate with payment provider".to_string(),
            ),
            MpesaError::Initiation(msg) => (
                StatusCode::BAD_GATEWAY,
                format!("Payment could not be started: {msg}"),
            ),
            MpesaError::Query(_) => (
                StatusCode::BAD_GATEWAY,
                "Payment status unavailable, try again".to_string(),
            ),
            // Never surfaced over HTTP; the callback handler always acks.
            MpesaError::CallbackParse(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Callback processing failed".to_string(),
            ),
            MpesaError::Transport(_) => (
                StatusCode::BAD_GATEWAY,
                "Payment provider unreachable".to_string(),
            ),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
