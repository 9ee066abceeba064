//! HTTP request handlers
//!
//! Handlers extract request data, call the services, and map outcomes to
//! responses. The callback handler is the one exception to normal error
//! mapping: it takes the raw body and always acknowledges success so the
//! broker never redelivers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde_json::json;

use crate::config::MpesaConfig;
use crate::error::MpesaError;
use crate::models::{AckResponse, PaymentRequest, QueryRequest, StkPushResponse};
use crate::services::{callback_service, mpesa_service::MpesaService};
use crate::state::AppState;

/// Liveness probe.
pub async fn root() -> &'static str {
    "mpesa-push"
}

/// Initiate an STK push and record the correlation pair for later
/// callback/reconciliation matching.
pub async fn stk_push(
    State(state): State<AppState>,
    Json(request): Json<PaymentRequest>,
) -> Result<Json<StkPushResponse>, MpesaError> {
    let service = MpesaService::new(state.config.clone());
    let response = service.initiate(&request).await?;

    state
        .payments
        .insert_initiated(
            &response.checkout_request_id,
            &response.merchant_request_id,
            &request.order_reference,
        )
        .await;

    Ok(Json(response))
}

/// Proxy a status query to the broker, returning its response verbatim.
pub async fn query_status(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<serde_json::Value>, MpesaError> {
    let service = MpesaService::new(state.config.clone());
    let status = service.query_status(&request.checkout_request_id).await?;
    Ok(Json(status))
}

/// Receive the broker's asynchronous result notification. The body is taken
/// raw rather than through a typed extractor so that a malformed payload
/// still gets the success acknowledgement instead of a 4xx.
pub async fn callback(
    State(state): State<AppState>,
    body: String,
) -> (StatusCode, Json<AckResponse>) {
    let ack = callback_service::process_callback(&state, &body).await;
    (StatusCode::OK, Json(ack))
}

/// Local view of a payment recorded by this service.
pub async fn payment_status(
    State(state): State<AppState>,
    Path(checkout_request_id): Path<String>,
) -> impl IntoResponse {
    match state.payments.get(&checkout_request_id).await {
        Some(record) => (StatusCode::OK, Json(json!(record))).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "unknown checkout request id" })),
        )
            .into_response(),
    }
}

/// Configuration health check: completeness report plus a masked summary.
/// Secret values never appear here, only presence flags.
pub async fn validate_setup(State(state): State<AppState>) -> Json<serde_json::Value> {
    let validation = MpesaConfig::validate_env();

    if validation.is_valid {
        Json(json!({
            "isValid": true,
            "message": "M-Pesa configuration is valid",
            "config": {
                "environment": state.config.environment,
                "businessShortCode": state.config.business_short_code,
                "callbackUrl": state.config.callback_url,
                "hasConsumerKey": !state.config.consumer_key.is_empty(),
                "hasConsumerSecret": !state.config.consumer_secret.is_empty(),
                "hasPasskey": !state.config.passkey.is_empty(),
            },
        }))
    } else {
        Json(json!({
            "isValid": false,
            "message": "M-Pesa configuration has issues",
            "errors": validation.errors,
        }))
    }
}

/// Fire a one-shilling push against the sandbox test subscriber, for
/// verifying credentials end to end.
pub async fn test_payment(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, MpesaError> {
    let request = PaymentRequest {
        phone_number: "254708374149".to_string(),
        amount: 1,
        order_reference: format!("TEST-{}", Utc::now().timestamp_millis()),
        description: Some("Test Payment".to_string()),
    };

    let service = MpesaService::new(state.config.clone());
    let response = service.initiate(&request).await?;

    state
        .payments
        .insert_initiated(
            &response.checkout_request_id,
            &response.merchant_request_id,
            &request.order_reference,
        )
        .await;

    Ok(Json(json!({
        "success": true,
        "message": "Test payment initiated",
        "data": response,
    })))
}
