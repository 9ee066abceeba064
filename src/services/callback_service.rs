//! Asynchronous result notifications from the broker
//!
//! The receiver is passive: it parses the nested callback envelope, settles
//! the matching payment record, and always acknowledges with a zero result
//! code. A negative acknowledgement (or a non-2xx status) would make the
//! broker redeliver, so parse and processing failures are logged and
//! swallowed here instead of propagated.

use serde_json::Value;
use tracing::{error, info, warn};

use crate::error::MpesaError;
use crate::models::{AckResponse, CallbackEnvelope, PaymentDetails, StkCallback};
use crate::state::{AppState, PaymentOutcome};

/// Handle one callback delivery. Infallible by contract: whatever happens
/// internally, the broker gets `{ ResultCode: 0, ResultDesc: "Success" }`.
pub async fn process_callback(state: &AppState, body: &str) -> AckResponse {
    match parse_callback(body) {
        Ok(envelope) => settle(state, envelope.body.stk_callback).await,
        Err(e) => error!("callback rejected: {e}"),
    }
    AckResponse::success()
}

pub fn parse_callback(body: &str) -> Result<CallbackEnvelope, MpesaError> {
    serde_json::from_str(body).map_err(|e| MpesaError::CallbackParse(e.to_string()))
}

async fn settle(state: &AppState, callback: StkCallback) {
    let checkout_request_id = callback.checkout_request_id.clone();

    let outcome = if callback.result_code == 0 {
        let details = extract_details(&callback);
        info!(
            checkout_request_id = %checkout_request_id,
            receipt = details.mpesa_receipt_number.as_deref().unwrap_or("-"),
            "payment succeeded"
        );
        PaymentOutcome::Succeeded {
            details,
            result_desc: callback.result_desc,
        }
    } else {
        info!(
            checkout_request_id = %checkout_request_id,
            result_code = callback.result_code,
            result_desc = %callback.result_desc,
            "payment failed"
        );
        PaymentOutcome::Failed {
            result_desc: callback.result_desc,
        }
    };

    if !state.payments.resolve(&checkout_request_id, outcome).await {
        // Unknown id (initiated elsewhere or before a restart) or a
        // redelivery of an already settled result.
        warn!(
            checkout_request_id = %checkout_request_id,
            "callback did not settle any pending payment"
        );
    }
}

/// Pull the structured fields out of a successful callback. Metadata items
/// are matched by name; the broker does not guarantee their order, and the
/// receipt may arrive as either a string or a number.
pub fn extract_details(callback: &StkCallback) -> PaymentDetails {
    PaymentDetails {
        merchant_request_id: callback.merchant_request_id.clone(),
        checkout_request_id: callback.checkout_request_id.clone(),
        amount: callback.metadata_value("Amount").and_then(as_number),
        mpesa_receipt_number: callback
            .metadata_value("MpesaReceiptNumber")
            .and_then(as_text),
        transaction_date: callback.metadata_value("TransactionDate").and_then(as_text),
        phone_number: callback.metadata_value("PhoneNumber").and_then(as_text),
    }
}

fn as_number(value: &Value) -> Option<f64> {
    value
        .as_f64()
        .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Environment, MpesaConfig};

    fn test_state() -> AppState {
        AppState::new(MpesaConfig {
            environment: Environment::Sandbox,
            consumer_key: "ck".to_string(),
            consumer_secret: "cs".to_string(),
            business_short_code: "174379".to_string(),
            passkey: "pk".to_string(),
            callback_url: "https://example.com/api/mpesa/callback".to_string(),
        })
    }

    fn success_body(items: &str) -> String {
        format!(
            r#"{{"Body":{{"stkCallback":{{
                "MerchantRequestID":"M1",
                "CheckoutRequestID":"C1",
                "ResultCode":0,
                "ResultDesc":"The service request is processed successfully.",
                "CallbackMetadata":{{"Item":[{items}]}}
            }}}}}}"#
        )
    }

    #[test]
    fn metadata_is_extracted_by_name_regardless_of_order() {
        // Items deliberately shuffled relative to the documented order.
        let body = success_body(
            r#"{"Name":"TransactionDate","Value":20240612104512},
               {"Name":"MpesaReceiptNumber","Value":"ABC123"},
               {"Name":"PhoneNumber","Value":254722683434},
               {"Name":"Amount","Value":500}"#,
        );
        let envelope = parse_callback(&body).unwrap();
        let details = extract_details(&envelope.body.stk_callback);

        assert_eq!(details.amount, Some(500.0));
        assert_eq!(details.mpesa_receipt_number.as_deref(), Some("ABC123"));
        assert_eq!(details.transaction_date.as_deref(), Some("20240612104512"));
        assert_eq!(details.phone_number.as_deref(), Some("254722683434"));
    }

    #[test]
    fn missing_items_yield_none() {
        let body = success_body(r#"{"Name":"Amount","Value":500}"#);
        let envelope = parse_callback(&body).unwrap();
        let details = extract_details(&envelope.body.stk_callback);

        assert_eq!(details.amount, Some(500.0));
        assert!(details.mpesa_receipt_number.is_none());
        assert!(details.phone_number.is_none());
    }

    #[tokio::test]
    async fn successful_callback_settles_pending_payment() {
        let state = test_state();
        state.payments.insert_initiated("C1", "M1", "ORD-1").await;

        let ack = process_callback(
            &state,
            &success_body(
                r#"{"Name":"Amount","Value":500},
                   {"Name":"MpesaReceiptNumber","Value":"ABC123"}"#,
            ),
        )
        .await;

        assert_eq!(ack.result_code, 0);
        assert_eq!(ack.result_desc, "Success");

        let record = state.payments.get("C1").await.unwrap();
        assert_eq!(record.state, crate::state::PaymentState::Succeeded);
        let details = record.details.unwrap();
        assert_eq!(details.amount, Some(500.0));
        assert_eq!(details.mpesa_receipt_number.as_deref(), Some("ABC123"));
    }

    #[tokio::test]
    async fn failed_callback_without_metadata_still_acks_success() {
        let state = test_state();
        state.payments.insert_initiated("C1", "M1", "ORD-1").await;

        let body = r#"{"Body":{"stkCallback":{
            "MerchantRequestID":"M1",
            "CheckoutRequestID":"C1",
            "ResultCode":1032,
            "ResultDesc":"Request cancelled by user"
        }}}"#;

        let ack = process_callback(&state, body).await;
        assert_eq!(ack.result_code, 0);
        assert_eq!(ack.result_desc, "Success");

        let record = state.payments.get("C1").await.unwrap();
        assert_eq!(record.state, crate::state::PaymentState::Failed);
        assert_eq!(
            record.result_desc.as_deref(),
            Some("Request cancelled by user")
        );
    }

    #[tokio::test]
    async fn malformed_payload_is_swallowed_and_acked() {
        let state = test_state();
        let ack = process_callback(&state, "{not json").await;
        assert_eq!(ack.result_code, 0);

        let ack = process_callback(&state, r#"{"Body":{}}"#).await;
        assert_eq!(ack.result_code, 0);
    }
}
