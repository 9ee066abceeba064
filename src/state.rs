//! Application state management
//!
//! Shared state is the resolved broker configuration plus the correlation
//! store mapping `CheckoutRequestID` to the payment record written when an
//! STK push is accepted. The store makes callback redelivery idempotent: a
//! second delivery of a terminal result is a no-op.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tokio::sync::RwLock;

use crate::config::MpesaConfig;
use crate::models::PaymentDetails;

/// Global application state, cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<MpesaConfig>,
    pub payments: PaymentStore,
}

impl AppState {
    pub fn new(config: MpesaConfig) -> Self {
        Self {
            config: Arc::new(config),
            payments: PaymentStore::default(),
        }
    }
}

/// Lifecycle of one push-payment attempt.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentState {
    AwaitingResult,
    Succeeded,
    Failed,
}

/// Record kept per `CheckoutRequestID`.
#[derive(Clone, Debug, Serialize)]
pub struct PaymentRecord {
    #[serde(rename = "merchantRequestId")]
    pub merchant_request_id: String,
    #[serde(rename = "orderReference")]
    pub order_reference: String,
    pub state: PaymentState,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "resultDesc")]
    pub result_desc: Option<String>,
    pub details: Option<PaymentDetails>,
}

/// Terminal outcome applied to a pending record.
pub enum PaymentOutcome {
    Succeeded {
        details: PaymentDetails,
        result_desc: String,
    },
    Failed {
        result_desc: String,
    },
}

/// In-process keyed store of in-flight and settled payments.
#[derive(Clone, Default)]
pub struct PaymentStore {
    inner: Arc<RwLock<HashMap<String, PaymentRecord>>>,
}

impl PaymentStore {
    /// Record an accepted STK push as awaiting its asynchronous result.
    pub async fn insert_initiated(
        &self,
        checkout_request_id: &str,
        merchant_request_id: &str,
        order_reference: &str,
    ) {
        let mut payments = self.inner.write().await;
        payments.insert(
            checkout_request_id.to_string(),
            PaymentRecord {
                merchant_request_id: merchant_request_id.to_string(),
                order_reference: order_reference.to_string(),
                state: PaymentState::AwaitingResult,
                created_at: Utc::now(),
                result_desc: None,
                details: None,
            },
        );
    }

    /// Apply a terminal outcome. Returns `false` when the record is unknown
    /// or already terminal, which makes broker redelivery a no-op.
    pub async fn resolve(&self, checkout_request_id: &str, outcome: PaymentOutcome) -> bool {
        let mut payments = self.inner.write().await;
        let Some(record) = payments.get_mut(checkout_request_id) else {
            return false;
        };
        if record.state != PaymentState::AwaitingResult {
            return false;
        }

        match outcome {
            PaymentOutcome::Succeeded {
                details,
                result_desc,
            } => {
                record.state = PaymentState::Succeeded;
                record.result_desc = Some(result_desc);
                record.details = Some(details);
            }
            PaymentOutcome::Failed { result_desc } => {
                record.state = PaymentState::Failed;
                record.result_desc = Some(result_desc);
            }
        }
        true
    }

    pub async fn get(&self, checkout_request_id: &str) -> Option<PaymentRecord> {
        self.inner.read().await.get(checkout_request_id).cloned()
    }

    /// Checkout ids still awaiting a result after `age` has elapsed, for the
    /// reconciliation sweep.
    pub async fn stale_awaiting(&self, age: Duration) -> Vec<String> {
        let cutoff = Utc::now() - age;
        self.inner
            .read()
            .await
            .iter()
            .filter(|(_, record)| {
                record.state == PaymentState::AwaitingResult && record.created_at < cutoff
            })
            .map(|(id, _)| id.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn details(checkout_id: &str) -> PaymentDetails {
        PaymentDetails {
            merchant_request_id: "M1".to_string(),
            checkout_request_id: checkout_id.to_string(),
            amount: Some(100.0),
            mpesa_receipt_number: Some("NLJ7RT61SV".to_string()),
            transaction_date: None,
            phone_number: None,
        }
    }

    #[tokio::test]
    async fn resolve_is_idempotent_under_redelivery() {
        let store = PaymentStore::default();
        store.insert_initiated("C1", "M1", "ORD-1").await;

        let first = store
            .resolve(
                "C1",
                PaymentOutcome::Succeeded {
                    details: details("C1"),
                    result_desc: "Processed".to_string(),
                },
            )
            .await;
        assert!(first);

        // Redelivered failure must not overwrite the settled record.
        let second = store
            .resolve(
                "C1",
                PaymentOutcome::Failed {
                    result_desc: "Request cancelled by user".to_string(),
                },
            )
            .await;
        assert!(!second);

        let record = store.get("C1").await.unwrap();
        assert_eq!(record.state, PaymentState::Succeeded);
        assert_eq!(record.result_desc.as_deref(), Some("Processed"));
    }

    #[tokio::test]
    async fn resolve_unknown_checkout_is_noop() {
        let store = PaymentStore::default();
        let applied = store
            .resolve(
                "C404",
                PaymentOutcome::Failed {
                    result_desc: "whatever".to_string(),
                },
            )
            .await;
        assert!(!applied);
    }

    #[tokio::test]
    async fn stale_awaiting_skips_fresh_and_settled_records() {
        let store = PaymentStore::default();
        store.insert_initiated("C1", "M1", "ORD-1").await;
        store.insert_initiated("C2", "M2", "ORD-2").await;
        store
            .resolve(
                "C2",
                PaymentOutcome::Failed {
                    result_desc: "timeout".to_string(),
                },
            )
            .await;

        // Both records were created just now, so nothing is stale yet.
        assert!(store.stale_awaiting(Duration::seconds(60)).await.is_empty());

        // With a zero threshold only the pending record qualifies.
        let stale = store.stale_awaiting(Duration::seconds(-1)).await;
        assert_eq!(stale, vec!["C1".to_string()]);
    }
}
