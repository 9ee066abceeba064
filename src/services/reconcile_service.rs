//! Reconciliation of payments whose callback never arrived
//!
//! Callbacks can be lost, so a background sweep periodically queries the
//! broker for any payment still awaiting its result past a threshold and
//! settles it from the synchronous status response. Query failures leave the
//! record pending for the next sweep.

use std::time::Duration;

use tokio::time;
use tracing::{info, warn};

use crate::services::mpesa_service::MpesaService;
use crate::state::{AppState, PaymentOutcome};

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);
const STALE_AFTER_SECS: i64 = 120;

/// Background task: one sweep per interval over the stale pending records.
pub async fn reconciliation_task(app_state: AppState) {
    let mut interval = time::interval(SWEEP_INTERVAL);
    // The first tick fires immediately; skip it so freshly started services
    // do not query before anything could have gone stale.
    interval.tick().await;

    loop {
        interval.tick().await;
        sweep(&app_state).await;
    }
}

async fn sweep(app_state: &AppState) {
    let stale = app_state
        .payments
        .stale_awaiting(chrono::Duration::seconds(STALE_AFTER_SECS))
        .await;
    if stale.is_empty() {
        return;
    }

    info!(count = stale.len(), "reconciling pending payments");
    let service = MpesaService::new(app_state.config.clone());

    for checkout_request_id in stale {
        match service.query_status(&checkout_request_id).await {
            Ok(status) => resolve_from_status(app_state, &checkout_request_id, &status).await,
            Err(e) => {
                warn!(
                    checkout_request_id = %checkout_request_id,
                    "status query failed, leaving pending: {e}"
                );
            }
        }
    }
}

/// Settle a pending record from the broker's status object. `ResultCode`
/// "0" means the payment went through; any other code is a terminal
/// failure. A response without a `ResultCode` (request still processing)
/// leaves the record pending.
async fn resolve_from_status(
    app_state: &AppState,
    checkout_request_id: &str,
    status: &serde_json::Value,
) {
    let Some(result_code) = status.get("ResultCode").and_then(code_as_i64) else {
        return;
    };
    let result_desc = status
        .get("ResultDesc")
        .and_then(|v| v.as_str())
        .unwrap_or("resolved by status query")
        .to_string();

    let outcome = if result_code == 0 {
        let record = app_state.payments.get(checkout_request_id).await;
        PaymentOutcome::Succeeded {
            details: crate::models::PaymentDetails {
                merchant_request_id: record
                    .map(|r| r.merchant_request_id)
                    .unwrap_or_default(),
                checkout_request_id: checkout_request_id.to_string(),
                amount: None,
                mpesa_receipt_number: None,
                transaction_date: None,
                phone_number: None,
            },
            result_desc,
        }
    } else {
        PaymentOutcome::Failed { result_desc }
    };

    if app_state.payments.resolve(checkout_request_id, outcome).await {
        info!(checkout_request_id = %checkout_request_id, "payment reconciled");
    }
}

// The broker returns ResultCode as a string on the query path and as a
// number in callbacks.
fn code_as_i64(value: &serde_json::Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Environment, MpesaConfig};
    use crate::state::PaymentState;
    use serde_json::json;

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

    #[tokio::test]
    async fn string_result_code_zero_settles_success() {
        let state = test_state();
        state.payments.insert_initiated("C1", "M1", "ORD-1").await;

        let status = json!({"ResultCode": "0", "ResultDesc": "Processed"});
        resolve_from_status(&state, "C1", &status).await;

        let record = state.payments.get("C1").await.unwrap();
        assert_eq!(record.state, PaymentState::Succeeded);
    }

    #[tokio::test]
    async fn nonzero_result_code_settles_failure() {
        let state = test_state();
        state.payments.insert_initiated("C1", "M1", "ORD-1").await;

        let status = json!({"ResultCode": "1032", "ResultDesc": "Request cancelled by user"});
        resolve_from_status(&state, "C1", &status).await;

        let record = state.payments.get("C1").await.unwrap();
        assert_eq!(record.state, PaymentState::Failed);
        assert_eq!(
            record.result_desc.as_deref(),
            Some("Request cancelled by user")
        );
    }

    #[tokio::test]
    async fn missing_result_code_leaves_record_pending() {
        let state = test_state();
        state.payments.insert_initiated("C1", "M1", "ORD-1").await;

        let status = json!({"errorCode": "500.001.1001", "errorMessage": "still processing"});
        resolve_from_status(&state, "C1", &status).await;

        let record = state.payments.get("C1").await.unwrap();
        assert_eq!(record.state, PaymentState::AwaitingResult);
    }
}
